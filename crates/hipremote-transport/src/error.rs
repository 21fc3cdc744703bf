/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Host/port did not resolve to any socket address.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to bind the worker listener.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to connect to the worker.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the stream (timeouts included).
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before the full transfer completed.
    #[error("connection closed after {transferred} of {expected} bytes")]
    ConnectionClosed { transferred: usize, expected: usize },
}

impl TransportError {
    /// The underlying I/O error, if any.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Resolve { source, .. }
            | TransportError::Bind { source, .. }
            | TransportError::Connect { source, .. }
            | TransportError::Accept(source)
            | TransportError::Io(source) => Some(source),
            TransportError::ConnectionClosed { .. } => None,
        }
    }

    /// Whether this error was produced by a socket timeout.
    pub fn is_timeout(&self) -> bool {
        self.io_source().is_some_and(|e| {
            matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
