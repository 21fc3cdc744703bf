use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hipremote_transport::WorkerSocket;
use hipremote_worker::{
    GpuRuntime, HipRuntime, HostRuntime, SysfsTelemetry, Worker, WorkerConfig, WorkerError,
};
use tracing::info;

use crate::cmd::{parse_duration, RuntimeKind, WorkerArgs};
use crate::exit::{transport_error, worker_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: WorkerArgs) -> CliResult<i32> {
    let config = WorkerConfig {
        bind: args.bind.clone(),
        port: args.port,
        device: args.device,
        idle_timeout: args.idle_timeout.as_deref().map(parse_duration).transpose()?,
        ..WorkerConfig::default()
    };

    let runtime = load_runtime(args.runtime)?;
    let socket = WorkerSocket::bind(config.listen_addr())
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut worker = Worker::new(runtime, config);
    let stats = worker.stats();
    worker
        .serve(&socket, &running)
        .map_err(|err| worker_error("worker failed", err))?;

    info!(
        sessions = stats.sessions.load(Ordering::Relaxed),
        messages = stats.messages.load(Ordering::Relaxed),
        protocol_errors = stats.protocol_errors.load(Ordering::Relaxed),
        deferred_errors = stats.deferred_errors.load(Ordering::Relaxed),
        "worker summary"
    );
    Ok(SUCCESS)
}

fn load_runtime(kind: RuntimeKind) -> CliResult<Box<dyn GpuRuntime>> {
    match kind {
        RuntimeKind::Hip => {
            let runtime = HipRuntime::load()
                .map_err(|err| worker_error("runtime unavailable", WorkerError::from(err)))?;
            Ok(Box::new(runtime.with_telemetry(SysfsTelemetry::new())))
        }
        RuntimeKind::Host => Ok(Box::new(HostRuntime::new())),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
