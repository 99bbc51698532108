use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, BufReader},
    net::{TcpListener, TcpStream},
    select,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    protocol,
    registry::Registry,
    session::{self, Outbox, SessionId, read_line},
};

pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl Server {
    /// Binds every local interface on `port`. Failing to bind is fatal.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .with_context(|| format!("failed to listen on port {port}"))?;
        Ok(Self::new(listener))
    }

    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener,
            state: Arc::new(ServerState::new()),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle on the set of joined sessions.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.state.registry)
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Stopping only ends the accept loop; sessions already running are left
    /// alone and nobody is told the server went away.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server { listener, state } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("server stopped accepting connections");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &state);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    state: &Arc<ServerState>,
) {
    match result {
        Ok((stream, peer)) => spawn_client_handler(stream, peer, state),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_client_handler(stream: TcpStream, peer: SocketAddr, state: &Arc<ServerState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        handle_connection(stream, peer, state).await;
    });
}

struct ServerState {
    registry: Arc<Registry>,
    guest_counter: AtomicU64,
    next_session_id: AtomicU64,
}

impl ServerState {
    fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            guest_counter: AtomicU64::new(1),
            next_session_id: AtomicU64::new(1),
        }
    }

    fn next_session_id(&self) -> SessionId {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    fn next_guest_name(&self) -> String {
        protocol::guest_name(self.guest_counter.fetch_add(1, Ordering::Relaxed))
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<ServerState>) {
    info!(%peer, "client connected");
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let (outbox, writer_task) = session::spawn_writer(state.next_session_id(), writer);

    outbox.send(protocol::WELCOME);
    let nickname = match perform_handshake(&state, &mut reader).await {
        Ok(nickname) => nickname,
        Err(err) => {
            debug!(%peer, error = ?err, "connection closed during handshake");
            close_session(outbox, writer_task).await;
            return;
        }
    };

    outbox.send(&protocol::greeting(&nickname));
    state.registry.add(outbox.clone()).await;
    info!(%peer, %nickname, "client joined");
    state.registry.broadcast(&protocol::joined(&nickname)).await;

    if let Err(err) = run_client_session(&state, &mut reader, &outbox, &nickname).await {
        warn!(%peer, %nickname, error = ?err, "client connection closed with error");
    }

    cleanup_client_disconnect(&state, &outbox, &nickname, peer).await;
    close_session(outbox, writer_task).await;
}

async fn perform_handshake<R>(state: &ServerState, reader: &mut R) -> std::io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    let nickname = match protocol::proposed_nickname(line.as_deref()) {
        Some(nickname) => nickname,
        None => state.next_guest_name(),
    };
    Ok(nickname)
}

async fn run_client_session<R>(
    state: &ServerState,
    reader: &mut R,
    outbox: &Outbox,
    nickname: &str,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = read_line(reader).await? {
        if protocol::is_quit(&line) {
            outbox.send(protocol::GOODBYE);
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        state
            .registry
            .broadcast(&protocol::chat(nickname, &line))
            .await;
    }

    Ok(())
}

async fn cleanup_client_disconnect(
    state: &ServerState,
    outbox: &Outbox,
    nickname: &str,
    peer: SocketAddr,
) {
    state.registry.remove(outbox.id()).await;
    info!(%peer, %nickname, "client disconnected");
    state.registry.broadcast(&protocol::left(nickname)).await;
}

/// Drops the last outbox handle and waits for the writer to flush and close.
async fn close_session(outbox: Outbox, writer_task: JoinHandle<()>) {
    drop(outbox);
    if let Err(err) = writer_task.await {
        debug!(error = ?err, "session writer task failed");
    }
}
