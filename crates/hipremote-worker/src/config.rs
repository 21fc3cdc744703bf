use std::time::Duration;

use hipremote_transport::DEFAULT_PORT;
use hipremote_wire::MessageConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Address to bind. Default: `0.0.0.0`.
    pub bind: String,
    pub port: u16,
    /// Device selected on every `INIT`.
    pub device: i32,
    /// Close a session that sends nothing for this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Upper bound on writing one response.
    pub write_timeout: Option<Duration>,
    pub message: MessageConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            device: 0,
            idle_timeout: None,
            write_timeout: Some(Duration::from_secs(60)),
            message: MessageConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// `bind:port`, for [`hipremote_transport::WorkerSocket::bind`].
    pub fn listen_addr(&self) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_addr_brackets_ipv6() {
        let mut config = WorkerConfig {
            port: 9000,
            ..WorkerConfig::default()
        };
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        config.bind = "::1".to_string();
        assert_eq!(config.listen_addr(), "[::1]:9000");
    }
}
