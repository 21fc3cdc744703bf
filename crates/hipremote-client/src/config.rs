use std::time::Duration;

use hipremote_transport::{ConnectOptions, DEFAULT_PORT};

use crate::error::{ClientError, Result};

/// Worker host name or address. Required.
pub const ENV_HOST: &str = "HIP_REMOTE_HOST";
/// Worker port. Default: 18515.
pub const ENV_PORT: &str = "HIP_REMOTE_PORT";
/// Enables verbose client logging when set to a truthy value.
pub const ENV_DEBUG: &str = "HIP_REMOTE_DEBUG";
/// Connect timeout in seconds. Default: 30.
pub const ENV_CONNECT_TIMEOUT: &str = "HIP_REMOTE_CONNECT_TIMEOUT";
/// Read/write timeout in seconds. Default: 60.
pub const ENV_IO_TIMEOUT: &str = "HIP_REMOTE_IO_TIMEOUT";
/// Set to `0` to force every asynchronous op to wait for its reply.
pub const ENV_FIRE_AND_FORGET: &str = "HIP_REMOTE_FIRE_AND_FORGET";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
    /// `None` disables read/write timeouts.
    pub io_timeout: Option<Duration>,
    pub debug: bool,
    /// Send eligible asynchronous ops without waiting for a reply.
    pub fire_and_forget: bool,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            connect_timeout: Some(Duration::from_secs(30)),
            io_timeout: Some(Duration::from_secs(60)),
            debug: false,
            fire_and_forget: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Read configuration from `HIP_REMOTE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup(ENV_HOST)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ClientError::Config(format!("{ENV_HOST} is not set")))?;

        let mut config = Self::new(host);
        if let Some(port) = lookup(ENV_PORT) {
            config.port = parse_number(ENV_PORT, &port)?;
        }
        if let Some(secs) = lookup(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = seconds(parse_number(ENV_CONNECT_TIMEOUT, &secs)?);
        }
        if let Some(secs) = lookup(ENV_IO_TIMEOUT) {
            config.io_timeout = seconds(parse_number(ENV_IO_TIMEOUT, &secs)?);
        }
        if let Some(debug) = lookup(ENV_DEBUG) {
            config.debug = is_truthy(&debug);
        }
        if let Some(ff) = lookup(ENV_FIRE_AND_FORGET) {
            config.fire_and_forget = is_truthy(&ff);
        }
        Ok(config)
    }

    pub(crate) fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            nodelay: true,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ClientError::Config(format!("{key}: invalid value {value:?}")))
}

/// Zero disables the timeout.
fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// `1`, `true`, `yes` or `on`, case-insensitively.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
