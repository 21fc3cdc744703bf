use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Crates whose events `--log-level` controls; everything else stays at warn.
const CRATES: [&str; 5] = [
    "hipremote",
    "hipremote_transport",
    "hipremote_wire",
    "hipremote_client",
    "hipremote_worker",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter for `level`; `RUST_LOG` wins when set.
fn filter(level: LogLevel) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directives = CRATES
        .iter()
        .map(|krate| format!("{krate}={}", level.as_str()))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(format!("warn,{directives}"))
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(level))
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
