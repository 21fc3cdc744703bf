use std::fmt;
use std::io;

use hipremote_client::ClientError;
use hipremote_transport::TransportError;
use hipremote_worker::WorkerError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrInUse => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    if err.is_timeout() {
        return CliError::new(TIMEOUT, format!("{context}: {err}"));
    }
    match &err {
        TransportError::Bind { source, .. } | TransportError::Accept(source) => {
            io_error(context, source)
        }
        _ => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Unreachable(err) => transport_error(context, err),
        ClientError::Config(_) | ClientError::InvalidArgument(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        ClientError::HandshakeFailed(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        ClientError::Protocol(_)
        | ClientError::UnexpectedResponse { .. }
        | ClientError::ShortTransfer { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::Api(_) | ClientError::Smi(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn worker_error(context: &str, err: WorkerError) -> CliError {
    match err {
        WorkerError::Transport(err) => transport_error(context, err),
        WorkerError::RuntimeLoad(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_worker_is_a_transport_error() {
        let err = ClientError::Unreachable(TransportError::Connect {
            addr: "gpu-box:18515".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        assert_eq!(client_error("connect", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn timeouts_map_to_timeout_code() {
        let err = TransportError::Io(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(transport_error("recv", err).code, TIMEOUT);
    }

    #[test]
    fn missing_configuration_is_usage() {
        let err = ClientError::Config("HIP_REMOTE_HOST is not set".to_string());
        let cli = client_error("configure", err);
        assert_eq!(cli.code, USAGE);
        assert!(cli.message.contains("HIP_REMOTE_HOST"));
    }
}
