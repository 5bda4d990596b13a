//! One TCP connection to the source
//!
//! A [`ConnectionHandle`] owns both halves of a socket: a buffered reader for
//! response lines and the raw writer for request lines. It never decides when
//! to connect or close; that is the manager's job.

use futures::FutureExt;
use linerpc_core::{Error, Result, MAX_LINE_BYTES};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Why a connection was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The keepalive elapsed with no activity
    Idle,
    /// A timeout or socket fault during an exchange
    Error,
    /// The peer hung up, left unread bytes, or still owes a reply
    Stale,
    /// Someone called `close()` / `shutdown()`
    Explicit,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Idle => "idle",
            CloseReason::Error => "error",
            CloseReason::Stale => "stale",
            CloseReason::Explicit => "explicit",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reader/writer pair bound to one TCP socket
pub(crate) struct ConnectionHandle {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    max_line: usize,
    /// Set once a request starts going out, cleared when its reply is read
    awaiting_reply: bool,
}

impl ConnectionHandle {
    /// Dial `address:port`, giving up after `timeout`
    pub(crate) async fn open(address: &str, port: u16, timeout: Duration) -> Result<Self> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::Transport(format!(
                    "failed to connect to {address}:{port}: {e}"
                )))
            }
            Err(_) => {
                return Err(Error::ConnectionTimeout {
                    endpoint: format!("{address}:{port}"),
                    timeout,
                })
            }
        };

        // Requests are single small lines; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Could not set TCP_NODELAY");
        }
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
            max_line: MAX_LINE_BYTES,
            awaiting_reply: false,
        })
    }

    /// Cap the length of a response line, newline included
    pub(crate) fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether a request was sent (or partly sent) without its reply being read
    pub(crate) fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Whether this connection must not carry another request
    ///
    /// An exchange that was abandoned midway leaves a reply owed on the
    /// socket, so the connection cannot be reused. Otherwise the read side is
    /// checked without waiting: end-of-stream or a socket error means the
    /// peer is gone. Bytes nobody asked for would be taken as the answer to
    /// the next request, so those make the connection stale too.
    pub(crate) fn is_stale(&mut self) -> bool {
        if self.awaiting_reply {
            tracing::warn!(peer = %self.peer, "Discarding connection with an unanswered request");
            return true;
        }

        match self.reader.fill_buf().now_or_never() {
            None => false,
            Some(Ok(buf)) if buf.is_empty() => {
                tracing::debug!(peer = %self.peer, "Peer closed the connection");
                true
            }
            Some(Ok(buf)) => {
                tracing::warn!(
                    peer = %self.peer,
                    unread = buf.len(),
                    "Discarding connection with unsolicited data"
                );
                true
            }
            Some(Err(e)) => {
                tracing::debug!(peer = %self.peer, error = %e, "Connection failed while idle");
                true
            }
        }
    }

    /// Write a full request line and flush it to the socket
    pub(crate) async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.awaiting_reply = true;
        self.writer.write_all(line).await?;
        self.writer.flush().await
    }

    /// Read up to and including the next `\n`
    ///
    /// Returns `None` if the peer closed before sending anything. A final
    /// line without a terminator is returned as-is. A line that reaches the
    /// length cap without a newline is a [`Error::MalformedResponse`], and the
    /// reply stays owed.
    pub(crate) async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let read = (&mut self.reader)
            .take(self.max_line as u64)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| Error::Transport(format!("read failed: {e}")))?;
        if read == 0 {
            return Ok(None);
        }
        if read >= self.max_line && !line.ends_with(b"\n") {
            return Err(Error::MalformedResponse(format!(
                "response line exceeds {} bytes",
                self.max_line
            )));
        }

        self.awaiting_reply = false;
        Ok(Some(line))
    }

    /// Shut down the write side, then release the socket
    ///
    /// Failures are logged and swallowed; the socket is dropped either way.
    pub(crate) async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            tracing::warn!(peer = %self.peer, error = %e, "Write shutdown failed");
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("peer", &self.peer)
            .field("awaiting_reply", &self.awaiting_reply)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_fresh_connection_is_not_stale() {
        let (listener, port) = listener().await;
        let mut handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        let (_server, _) = listener.accept().await.unwrap();

        assert!(!handle.is_stale());
        assert_eq!(handle.peer().port(), port);
    }

    #[tokio::test]
    async fn test_peer_eof_is_stale() {
        let (listener, port) = listener().await;
        let mut handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        let (server, _) = listener.accept().await.unwrap();

        drop(server);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(handle.is_stale());
    }

    #[tokio::test]
    async fn test_unsolicited_bytes_are_stale() {
        let (listener, port) = listener().await;
        let mut handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        server.write_all(b"{\"late\":true}\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(handle.is_stale());
    }

    #[tokio::test]
    async fn test_write_and_read_line() {
        let (listener, port) = listener().await;
        let mut handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        handle.write_line(b"hello\n").await.unwrap();
        let mut received = [0u8; 6];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"hello\n");

        server.write_all(b"first\nsecond\n").await.unwrap();
        assert_eq!(handle.read_line().await.unwrap().unwrap(), b"first\n");
        assert_eq!(handle.read_line().await.unwrap().unwrap(), b"second\n");
    }

    #[tokio::test]
    async fn test_unanswered_request_is_stale() {
        let (listener, port) = listener().await;
        let mut handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        handle.write_line(b"ping\n").await.unwrap();
        assert!(handle.awaiting_reply());
        assert!(handle.is_stale());

        server.write_all(b"pong\n").await.unwrap();
        assert_eq!(handle.read_line().await.unwrap().unwrap(), b"pong\n");
        assert!(!handle.awaiting_reply());
        assert!(!handle.is_stale());
    }

    #[tokio::test]
    async fn test_overlong_line_is_malformed() {
        let (listener, port) = listener().await;
        let mut handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap()
            .with_max_line(16);
        let (mut server, _) = listener.accept().await.unwrap();

        handle.write_line(b"ping\n").await.unwrap();
        server.write_all(&[b'x'; 64]).await.unwrap();

        let err = handle.read_line().await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert!(handle.awaiting_reply());
    }

    #[tokio::test]
    async fn test_line_at_cap_is_accepted() {
        let (listener, port) = listener().await;
        let mut handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap()
            .with_max_line(8);
        let (mut server, _) = listener.accept().await.unwrap();

        server.write_all(b"1234567\n").await.unwrap();
        assert_eq!(handle.read_line().await.unwrap().unwrap(), b"1234567\n");
    }

    #[tokio::test]
    async fn test_read_line_none_on_eof() {
        let (listener, port) = listener().await;
        let mut handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        let (server, _) = listener.accept().await.unwrap();
        drop(server);

        assert!(handle.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_signals_eof_to_peer() {
        let (listener, port) = listener().await;
        let handle = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        handle.close().await;

        let mut buf = Vec::new();
        let read = server.read_to_end(&mut buf).await.unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn test_refused_is_transport_error() {
        let (listener, port) = listener().await;
        drop(listener);

        let err = ConnectionHandle::open("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
