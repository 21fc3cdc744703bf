use std::sync::Once;

use hipremote_client::config::{is_truthy, ENV_DEBUG};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a stderr subscriber once per process.
///
/// `HIP_REMOTE_DEBUG` selects debug output; otherwise only warnings and
/// errors are shown. A subscriber installed by the host program wins.
pub(crate) fn init() {
    INIT.call_once(|| {
        let debug = std::env::var(ENV_DEBUG).is_ok_and(|v| is_truthy(&v));
        let level = if debug { "debug" } else { "warn" };
        let directives = format!("hipremote_client={level},hipremote_ffi={level}");
        let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
