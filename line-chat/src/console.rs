//! Terminal front end for [`ChatClient`]: stdin lines go out, server lines
//! are printed as received.

use anyhow::Result;
use tokio::{
    io::{self, AsyncBufRead, AsyncWriteExt, BufReader},
    select,
    task::JoinHandle,
};
use tracing::warn;

use crate::{
    cli::ClientArgs,
    client::{ChatClient, ClientEvent, ClientEvents},
    protocol,
    session::read_line,
};

enum InputOutcome {
    /// The user asked to leave; the server will answer and hang up.
    Quit,
    /// Stdin ran dry or ctrl-c was pressed.
    Interrupted,
    /// The connection ended on its own.
    ServerClosed,
}

pub async fn run(args: ClientArgs) -> Result<()> {
    write_stdout("Connecting to server...").await?;

    let mut client = ChatClient::new(args.host, args.port, args.nickname);
    let events = client.connect().await?;
    let mut printer = tokio::spawn(print_events(events));

    let mut stdin = BufReader::new(tokio::io::stdin());
    match forward_input(&mut client, &mut stdin, &mut printer).await? {
        InputOutcome::Quit => {
            await_printer(printer).await;
            client.close().await;
        }
        InputOutcome::Interrupted => {
            client.close().await;
            await_printer(printer).await;
        }
        InputOutcome::ServerClosed => client.close().await,
    }

    Ok(())
}

async fn forward_input<R>(
    client: &mut ChatClient,
    input: &mut R,
    printer: &mut JoinHandle<()>,
) -> Result<InputOutcome>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        select! {
            line = read_line(input) => {
                let Some(line) = line? else {
                    return Ok(InputOutcome::Interrupted);
                };
                client.send(&line).await;
                if protocol::is_quit(&line) {
                    return Ok(InputOutcome::Quit);
                }
            }
            _ = &mut *printer => return Ok(InputOutcome::ServerClosed),
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                return Ok(InputOutcome::Interrupted);
            }
        }
    }
}

async fn await_printer(printer: JoinHandle<()>) {
    if let Err(error) = printer.await {
        warn!(?error, "message printer failed");
    }
}

async fn print_events(mut events: ClientEvents) {
    while let Some(event) = events.recv().await {
        let closed = matches!(event, ClientEvent::Closed);
        let line = match event {
            ClientEvent::Line(line) => line,
            ClientEvent::Error(err) => format!("Connection error: {err}"),
            ClientEvent::Closed => "Connection closed.".to_string(),
        };
        if let Err(error) = write_stdout(&line).await {
            warn!(?error, "failed to write to stdout");
        }
        if closed {
            break;
        }
    }
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
