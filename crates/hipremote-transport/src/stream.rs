use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected worker/client stream; implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations. It wraps
/// a blocking TCP stream; Nagle's algorithm is disabled by the constructors in
/// [`crate::tcp`].
pub struct RemoteStream {
    inner: TcpStream,
    peer: Option<SocketAddr>,
}

impl Read for RemoteStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for RemoteStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl RemoteStream {
    /// Wrap an already-connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            inner: stream,
            peer,
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Apply the same timeout to reads and writes.
    pub fn set_io_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }

    /// Enable or disable `TCP_NODELAY`.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self {
            inner: cloned,
            peer: self.peer,
        })
    }

    /// Address of the connected peer, captured at construction.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Shut down both halves of the connection.
    ///
    /// Any clone of this stream observes the shutdown as well.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Non-blocking check for a session that can no longer carry a request.
    ///
    /// Returns `true` if the peer has closed its side, if the socket reports an
    /// error, or if unsolicited bytes are waiting (a request/response stream
    /// with no outstanding request must be silent). Never consumes data.
    pub fn is_stale(&self) -> bool {
        if self.inner.set_nonblocking(true).is_err() {
            return true;
        }

        let mut byte = [0u8; 1];
        let stale = loop {
            match self.inner.peek(&mut byte) {
                Ok(_) => break true,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break false,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break true,
            }
        };

        if self.inner.set_nonblocking(false).is_err() {
            return true;
        }
        stale
    }
}

impl std::fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream")
            .field("type", &"tcp")
            .field("peer", &self.peer)
            .finish()
    }
}
