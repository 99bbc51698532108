use std::io;

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::debug;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

pub type SessionId = u64;

/// Reads one line, without its terminator. `Ok(None)` means the peer closed
/// the stream.
///
/// Bytes that are not valid UTF-8 fail with [`io::ErrorKind::InvalidData`]
/// rather than being replaced, so a peer sending them is treated like any
/// other broken connection.
pub async fn read_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let bytes = reader.read_line(&mut line).await?;
    if bytes == 0 {
        return Ok(None);
    }

    let end = line.trim_end_matches(LINE_ENDINGS).len();
    line.truncate(end);
    Ok(Some(line))
}

/// Writes `line` plus a newline delimiter and flushes so peers see it promptly.
pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = Vec::with_capacity(line.len() + 1);
    encoded.extend_from_slice(line.as_bytes());
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await
}

/// Outbound line queue of one server-side session.
///
/// Cloning gives out another sending handle; the registry keeps one so it can
/// broadcast without owning the socket. Lines are written by a single writer
/// task, so every line queued through any handle reaches the peer in the
/// order it was queued.
#[derive(Debug, Clone)]
pub struct Outbox {
    id: SessionId,
    tx: mpsc::UnboundedSender<String>,
}

impl Outbox {
    pub(crate) fn channel(id: SessionId) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queues `line` for delivery. Returns `false` once the writer has stopped.
    pub fn send(&self, line: &str) -> bool {
        self.tx.send(line.to_string()).is_ok()
    }
}

/// Starts the writer task for one connection's write half.
///
/// The task drains the outbox until every [`Outbox`] handle is dropped or a
/// write fails, then shuts the write half down.
pub fn spawn_writer<W>(id: SessionId, writer: W) -> (Outbox, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, mut rx) = Outbox::channel(id);
    let task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = rx.recv().await {
            if let Err(err) = write_line(&mut writer, &line).await {
                debug!(session = id, error = ?err, "failed to deliver line");
                break;
            }
        }
        if let Err(err) = writer.shutdown().await {
            debug!(session = id, error = ?err, "failed to close session writer");
        }
    });
    (outbox, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    #[tokio::test]
    async fn read_line_strips_terminators() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = BufReader::new(reader);

        writer
            .write_all(b"hello\r\n  spaced  \n\nlast")
            .await
            .expect("write");
        drop(writer);

        let mut lines = Vec::new();
        while let Some(line) = read_line(&mut reader).await.expect("read") {
            lines.push(line);
        }
        assert_eq!(lines, vec!["hello", "  spaced  ", "", "last"]);
    }

    #[tokio::test]
    async fn read_line_rejects_invalid_utf8() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut reader = BufReader::new(reader);
        writer.write_all(b"\xff\xfe\n").await.expect("write");

        let err = read_line(&mut reader).await.expect_err("invalid utf-8");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn writer_task_delivers_in_order_then_closes() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let (outbox, task) = spawn_writer(7, local);
        let other = outbox.clone();

        assert_eq!(outbox.id(), 7);
        assert!(outbox.send("one"));
        assert!(other.send("two"));
        assert!(outbox.send("three"));
        drop(outbox);
        drop(other);
        task.await.expect("writer task");

        let mut received = String::new();
        remote
            .read_to_string(&mut received)
            .await
            .expect("read to end");
        assert_eq!(received, "one\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn send_fails_after_writer_stops() {
        let (local, remote) = tokio::io::duplex(16);
        drop(remote);
        let (outbox, task) = spawn_writer(1, local);

        assert!(outbox.send("lost"));
        task.await.expect("writer task");
        assert!(!outbox.send("after close"));
    }
}
