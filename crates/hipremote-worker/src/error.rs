use hipremote_transport::TransportError;
use hipremote_wire::WireError;

/// Errors that end a session or stop the worker.
///
/// Remote API failures are not errors at this level: they travel back to
/// the client as response statuses.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The client broke a protocol rule the framing itself cannot catch.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("failed to load GPU runtime: {0}")]
    RuntimeLoad(#[from] crate::runtime::RuntimeLoadError),
}

impl WorkerError {
    /// Whether this error came from the peer rather than from I/O.
    pub fn is_protocol(&self) -> bool {
        match self {
            WorkerError::Wire(err) => err.is_protocol(),
            WorkerError::Protocol(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
