use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hipremote_transport::{RemoteStream, WorkerSocket};
use hipremote_wire::{MessageReader, MessageWriter};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::param_cache::KernelParamCache;
use crate::runtime::GpuRuntime;
use crate::session::{Session, SessionEnd};

/// How often the accept loop rechecks its run flag.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Counters for the lifetime of one worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub sessions: AtomicU64,
    pub messages: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub deferred_errors: AtomicU64,
}

/// Serves one client connection at a time against a single GPU runtime.
///
/// Runtime state (allocations, streams, modules) outlives sessions: the
/// runtime belongs to the worker, not to a connection. Kernel layouts are
/// cached beside it so they live exactly as long as the modules they describe.
pub struct Worker {
    runtime: Box<dyn GpuRuntime>,
    params: KernelParamCache,
    config: WorkerConfig,
    stats: Arc<WorkerStats>,
}

impl Worker {
    pub fn new(runtime: Box<dyn GpuRuntime>, config: WorkerConfig) -> Self {
        Self {
            runtime,
            params: KernelParamCache::new(),
            config,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Shared handle to the worker's counters.
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Accept and serve connections until `running` is cleared, then shut
    /// the telemetry source down.
    ///
    /// Failed accepts and failed sessions are logged; neither stops the loop.
    pub fn serve(&mut self, socket: &WorkerSocket, running: &AtomicBool) -> Result<()> {
        info!(
            addr = %socket.local_addr(),
            runtime = self.runtime.name(),
            device = self.config.device,
            "worker serving"
        );
        while running.load(Ordering::SeqCst) {
            let stream = match socket.accept_while(running, ACCEPT_POLL) {
                Ok(Some(stream)) => stream,
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };
            if let Err(err) = self.serve_connection(stream) {
                error!(error = %err, "session failed");
            }
        }
        if let Some(source) = self.runtime.telemetry() {
            source.shutdown();
        }
        info!("worker stopped");
        Ok(())
    }

    /// Run one session to completion on `stream`.
    pub fn serve_connection(&mut self, stream: RemoteStream) -> Result<SessionEnd> {
        let peer = stream.peer_addr();
        stream.set_read_timeout(self.config.idle_timeout)?;
        stream.set_write_timeout(self.config.write_timeout)?;
        let sessions = self.stats.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        info!(?peer, session = sessions, "client connected");

        let mut reader =
            MessageReader::with_config(stream.try_clone()?, self.config.message.clone());
        let mut writer = MessageWriter::with_config(stream.try_clone()?, self.config.message.clone());

        let max_payload = self.config.message.max_payload_size;
        let mut session = Session::new(
            self.runtime.as_mut(),
            &mut self.params,
            &self.stats,
            self.config.device,
            max_payload,
        );
        let outcome = session.run(&mut reader, &mut writer);

        match &outcome {
            Ok(end) => info!(?peer, ?end, "client disconnected"),
            Err(err) if err.is_protocol() => {
                self.stats.protocol_errors.fetch_add(1, Ordering::Relaxed);
                warn!(?peer, error = %err, "closing connection after protocol violation");
            }
            Err(err) => debug!(?peer, error = %err, "session ended with error"),
        }
        if let Err(err) = stream.shutdown() {
            debug!(error = %err, "shutdown after session failed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::HostRuntime;

    #[test]
    fn test_stopping_shuts_telemetry_down() {
        let mut runtime = HostRuntime::new();
        runtime.telemetry().unwrap().init(0).unwrap();
        let mut worker = Worker::new(Box::new(runtime), WorkerConfig::default());
        let socket = WorkerSocket::bind("127.0.0.1:0").unwrap();

        let running = AtomicBool::new(false);
        worker.serve(&socket, &running).unwrap();

        let source = worker.runtime.telemetry().unwrap();
        assert!(!source.is_initialized());
    }
}
