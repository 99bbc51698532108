use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result, bail};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, info};

use crate::{
    protocol,
    session::{read_line, write_line},
};

/// What the receive task reports to whoever drives the presentation.
#[derive(Debug)]
pub enum ClientEvent {
    /// One line from the server, without its terminator.
    Line(String),
    /// Reading from the server failed; `Closed` follows.
    Error(io::Error),
    /// The receive task ended. Sent exactly once per connection.
    Closed,
}

pub type ClientEvents = mpsc::UnboundedReceiver<ClientEvent>;

/// Client side of one chat connection.
///
/// Outgoing lines are written by whoever calls [`ChatClient::send`]; incoming
/// lines are read by a background task started in [`ChatClient::connect`].
pub struct ChatClient {
    host: String,
    port: u16,
    nickname: Option<String>,
    writer: Option<OwnedWriteHalf>,
    stop_receiver: Option<oneshot::Sender<()>>,
    /// Cleared by the receive task when the connection ends.
    open: Arc<AtomicBool>,
}

impl ChatClient {
    pub fn new(host: impl Into<String>, port: u16, nickname: Option<String>) -> Self {
        Self {
            host: host.into(),
            port,
            nickname,
            writer: None,
            stop_receiver: None,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some() && self.open.load(Ordering::Acquire)
    }

    /// Opens the connection, sends the nickname if there is one, and starts
    /// the receive task. Returns without waiting for any server output.
    pub async fn connect(&mut self) -> Result<ClientEvents> {
        if self.stop_receiver.is_some() {
            bail!("already connected to {}:{}", self.host, self.port);
        }

        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("failed to connect to {}:{}", self.host, self.port))?;
        info!("connected to {}:{}", self.host, self.port);

        let (reader, mut writer) = stream.into_split();
        if let Some(nickname) = self
            .nickname
            .as_deref()
            .map(str::trim)
            .filter(|nickname| !nickname.is_empty())
        {
            write_line(&mut writer, nickname)
                .await
                .context("failed to send nickname")?;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let open = Arc::new(AtomicBool::new(true));
        tokio::spawn(receive_lines(
            BufReader::new(reader),
            events_tx,
            stop_rx,
            Arc::clone(&open),
        ));

        self.open = open;

        self.writer = Some(writer);
        self.stop_receiver = Some(stop_tx);
        Ok(events_rx)
    }

    /// Sends one line. Does nothing when never connected or once the
    /// connection has ended.
    ///
    /// Write failures are not returned: the receive task reports the broken
    /// connection through [`ClientEvent::Closed`], and the client stops writing.
    pub async fn send(&mut self, text: &str) {
        if !self.open.load(Ordering::Acquire) {
            self.writer = None;
            return;
        }
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(err) = write_line(writer, text).await {
            debug!(error = ?err, "failed to send line");
            self.writer = None;
        }
    }

    /// Stops the receive task, says `/quit` and closes the connection.
    /// Errors along the way are ignored.
    pub async fn close(&mut self) {
        if let Some(stop) = self.stop_receiver.take() {
            let _ = stop.send(());
        }
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = write_line(&mut writer, protocol::QUIT).await {
                debug!(error = ?err, "failed to send quit");
            }
            if let Err(err) = writer.shutdown().await {
                debug!(error = ?err, "failed to shutdown client writer");
            }
        }
    }
}

async fn receive_lines(
    mut reader: BufReader<OwnedReadHalf>,
    events: mpsc::UnboundedSender<ClientEvent>,
    mut stop: oneshot::Receiver<()>,
    open: Arc<AtomicBool>,
) {
    loop {
        select! {
            biased;

            _ = &mut stop => break,
            line = read_line(&mut reader) => match line {
                Ok(Some(line)) => {
                    let _ = events.send(ClientEvent::Line(line));
                }
                Ok(None) => break,
                Err(err) => {
                    let _ = events.send(ClientEvent::Error(err));
                    break;
                }
            },
        }
    }

    open.store(false, Ordering::Release);
    let _ = events.send(ClientEvent::Closed);
}
