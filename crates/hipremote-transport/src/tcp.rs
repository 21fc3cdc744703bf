use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::RemoteStream;

/// Well-known worker port.
pub const DEFAULT_PORT: u16 = 18515;

/// Socket options applied when a client connects to a worker.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Upper bound on the TCP connect itself. `None` blocks indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Read/write timeout applied to the connected stream.
    pub io_timeout: Option<Duration>,
    /// Disable Nagle's algorithm. Default: true.
    pub nodelay: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(30)),
            io_timeout: Some(Duration::from_secs(60)),
            nodelay: true,
        }
    }
}

/// Worker-side TCP listener.
pub struct WorkerSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl WorkerSocket {
    /// Bind and listen on `addr` (for example `0.0.0.0:18515`).
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let display = format!("{addr:?}");
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: display.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: display,
            source: e,
        })?;

        info!(%local_addr, "worker listening");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<RemoteStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        prepare_accepted(stream)
    }

    /// Accept while `running` stays set, polling every `poll` interval.
    ///
    /// Returns `Ok(None)` once `running` is cleared.
    pub fn accept_while(
        &self,
        running: &AtomicBool,
        poll: Duration,
    ) -> Result<Option<RemoteStream>> {
        self.listener
            .set_nonblocking(true)
            .map_err(TransportError::Accept)?;

        let accepted = loop {
            if !running.load(Ordering::SeqCst) {
                break None;
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted connection");
                    break Some(stream);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => std::thread::sleep(poll),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    let _ = self.listener.set_nonblocking(false);
                    return Err(TransportError::Accept(err));
                }
            }
        };

        self.listener
            .set_nonblocking(false)
            .map_err(TransportError::Accept)?;

        accepted.map(prepare_accepted).transpose()
    }

    /// Connect to a worker at `host:port`, trying each resolved address in turn.
    pub fn connect(host: &str, port: u16, options: &ConnectOptions) -> Result<RemoteStream> {
        let addr = format!("{host}:{port}");
        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve {
                addr: addr.clone(),
                source: e,
            })?
            .collect();

        if candidates.is_empty() {
            return Err(TransportError::Resolve {
                addr,
                source: std::io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
            });
        }

        let mut last_err = None;
        for candidate in candidates {
            let attempt = match options.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    let stream = RemoteStream::from_tcp(stream);
                    stream.set_nodelay(options.nodelay)?;
                    stream.set_io_timeout(options.io_timeout)?;
                    debug!(%candidate, "connected to worker");
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr,
            source: last_err
                .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no addresses")),
        })
    }

    /// The address this socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

fn prepare_accepted(stream: TcpStream) -> Result<RemoteStream> {
    // Accepted sockets inherit O_NONBLOCK from the listener on BSD-derived systems.
    stream.set_nonblocking(false)?;
    let stream = RemoteStream::from_tcp(stream);
    stream.set_nodelay(true)?;
    Ok(stream)
}
