use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use hipremote_client::ClientConfig;
use hipremote_transport::DEFAULT_PORT;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod smi;
pub mod version;
pub mod worker;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve HIP calls from remote clients on this machine's GPU.
    Worker(WorkerArgs),
    /// Connect to a worker and print its devices and versions.
    Info(InfoArgs),
    /// Print GPU telemetry from a worker.
    Smi(SmiArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Worker(args) => worker::run(args),
        Command::Info(args) => info::run(args, format),
        Command::Smi(args) => smi::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RuntimeKind {
    /// The installed HIP runtime (`libamdhip64.so`).
    Hip,
    /// Host-memory emulation, no GPU required.
    Host,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Port to listen on.
    #[arg(long, env = "HIP_REMOTE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Address to bind.
    #[arg(long, env = "HIP_REMOTE_BIND", default_value = "0.0.0.0")]
    pub bind: String,
    /// Device selected for every session.
    #[arg(long, env = "HIP_REMOTE_DEVICE", default_value_t = 0)]
    pub device: i32,
    /// Runtime backend.
    #[arg(long, value_enum, default_value = "hip")]
    pub runtime: RuntimeKind,
    /// Close sessions idle for this long (e.g. 300s, 500ms).
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

/// Where a client command connects.
#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Worker host name or address.
    pub host: String,
    /// Worker port.
    #[arg(long, env = "HIP_REMOTE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

impl RemoteArgs {
    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let timeout = parse_duration(&self.timeout)?;
        let mut config = ClientConfig::new(self.host.clone()).with_port(self.port);
        config.connect_timeout = Some(timeout);
        config.io_timeout = Some(timeout.max(Duration::from_secs(10)));
        config.fire_and_forget = false;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SmiQuery {
    Metrics,
    Power,
    Vram,
    Activity,
    Asic,
    Clock,
    Temp,
}

#[derive(Args, Debug)]
pub struct SmiArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
    /// What to read.
    #[arg(value_enum, default_value = "metrics")]
    pub query: SmiQuery,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// `5s`, `500ms` or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
