use hipremote_transport::TransportError;
use hipremote_wire::{SmiStatus, Status, WireError};

/// Errors returned by client calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The worker could not be reached or the stream failed mid-exchange.
    #[error("worker unreachable: {0}")]
    Unreachable(#[from] TransportError),

    /// The worker sent something that is not a valid message.
    #[error("protocol error: {0}")]
    Protocol(WireError),

    /// The response does not answer the request that was sent.
    #[error("unexpected response: sent {sent}, got op 0x{received:04X}")]
    UnexpectedResponse {
        sent: hipremote_wire::OpCode,
        received: u16,
    },

    /// The worker refused the session handshake.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The remote runtime call itself failed.
    #[error("remote call failed: {0}")]
    Api(Status),

    /// The remote telemetry call failed.
    #[error("telemetry call failed: {0}")]
    Smi(SmiStatus),

    /// Fewer bytes came back than the caller asked for.
    #[error("short transfer: expected {expected} bytes, received {received}")]
    ShortTransfer { expected: usize, received: usize },

    /// The call was rejected locally before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<WireError> for ClientError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Transport(err) => ClientError::Unreachable(err),
            other => ClientError::Protocol(other),
        }
    }
}

impl ClientError {
    /// Whether the connection must be discarded after this error.
    ///
    /// Remote failures leave the stream framed and the session usable.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Unreachable(_)
                | ClientError::Protocol(_)
                | ClientError::UnexpectedResponse { .. }
                | ClientError::HandshakeFailed(_)
        )
    }

    /// The status a native caller should see for this error.
    pub fn status(&self) -> Status {
        match self {
            ClientError::Api(status) => *status,
            ClientError::Config(_)
            | ClientError::Unreachable(_)
            | ClientError::HandshakeFailed(_) => Status::WORKER_UNREACHABLE,
            ClientError::Protocol(_)
            | ClientError::UnexpectedResponse { .. }
            | ClientError::ShortTransfer { .. }
            | ClientError::InvalidArgument(_) => Status::INVALID_VALUE,
            ClientError::Smi(_) => Status::UNKNOWN,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
