//! Process-wide client, configured from the environment on first use.

use std::sync::OnceLock;

use tracing::warn;

use crate::error::{ClientError, Result};
use crate::runtime::Client;

static GLOBAL: OnceLock<std::result::Result<Client, String>> = OnceLock::new();

/// The process-wide client.
///
/// Built from `HIP_REMOTE_*` variables on first access. A configuration
/// error is remembered and returned on every later access.
pub fn global() -> Result<&'static Client> {
    let slot = GLOBAL.get_or_init(|| {
        Client::from_env().map_err(|err| {
            warn!(error = %err, "remote client is not configured");
            match err {
                ClientError::Config(msg) => msg,
                other => other.to_string(),
            }
        })
    });
    match slot {
        Ok(client) => Ok(client),
        Err(msg) => Err(ClientError::Config(msg.clone())),
    }
}

/// Connect the process-wide client.
pub fn init() -> Result<()> {
    global()?.init()
}

/// Disconnect the process-wide client if it was ever created.
pub fn shutdown() {
    if let Some(Ok(client)) = GLOBAL.get() {
        client.shutdown();
    }
}
