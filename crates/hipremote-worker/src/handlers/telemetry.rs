use hipremote_wire::body::{
    ClockInfoRequest, ProcessorCountResponse, ProcessorRequest, SmiInitRequest, TempMetric,
    TempMetricRequest,
};
use hipremote_wire::{Message, OpCode, SmiStatus};
use tracing::debug;

use super::smi_request;
use crate::session::{Reply, Session, SmiHandled};

impl Session<'_> {
    /// Telemetry ops, answered with telemetry status codes.
    ///
    /// `SMI_SHUTDOWN` is acknowledged but leaves the source up: it is shared
    /// by every session on this worker.
    pub(crate) fn telemetry(&mut self, op: OpCode, msg: &Message) -> SmiHandled {
        let Some(source) = self.runtime.telemetry() else {
            debug!(%op, "no telemetry source");
            return Err(SmiStatus::NOT_INITIALIZED);
        };

        match op {
            OpCode::SmiInit => {
                let req = smi_request::<SmiInitRequest>(msg)?;
                source.init(req.init_flags)?;
                return Ok(Reply::smi(SmiStatus::SUCCESS));
            }
            OpCode::SmiShutdown => return Ok(Reply::smi(SmiStatus::SUCCESS)),
            _ => {}
        }

        if !source.is_initialized() {
            return Err(SmiStatus::NOT_INITIALIZED);
        }

        match op {
            OpCode::SmiGetProcessorCount => Ok(Reply::body(&ProcessorCountResponse {
                count: source.processor_count(),
            })),
            OpCode::SmiGetGpuMetrics => {
                let req = smi_request::<ProcessorRequest>(msg)?;
                Ok(Reply::body(&source.gpu_metrics(req.processor)?))
            }
            OpCode::SmiGetPowerInfo => {
                let req = smi_request::<ProcessorRequest>(msg)?;
                Ok(Reply::body(&source.power_info(req.processor)?))
            }
            OpCode::SmiGetClockInfo => {
                let req = smi_request::<ClockInfoRequest>(msg)?;
                Ok(Reply::body(&source.clock_info(req.processor, req.clock_type)?))
            }
            OpCode::SmiGetTempMetric => {
                let req = smi_request::<TempMetricRequest>(msg)?;
                let celsius = source.temperature(req.processor, req.sensor)?;
                Ok(Reply::body(&TempMetric { celsius }))
            }
            OpCode::SmiGetGpuActivity => {
                let req = smi_request::<ProcessorRequest>(msg)?;
                Ok(Reply::body(&source.gpu_activity(req.processor)?))
            }
            OpCode::SmiGetVramUsage => {
                let req = smi_request::<ProcessorRequest>(msg)?;
                Ok(Reply::body(&source.vram_usage(req.processor)?))
            }
            OpCode::SmiGetAsicInfo => {
                let req = smi_request::<ProcessorRequest>(msg)?;
                Ok(Reply::body(&source.asic_info(req.processor)?))
            }
            _ => {
                debug!(%op, "no telemetry handler");
                Err(SmiStatus::NOT_SUPPORTED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hipremote_wire::body::VramUsage;
    use hipremote_wire::WireBody;

    use super::*;
    use crate::handlers::test_message as message;
    use crate::runtime::HostRuntime;
    use crate::param_cache::KernelParamCache;
    use crate::worker::WorkerStats;

    #[test]
    fn test_queries_before_init_are_not_initialized() {
        let mut runtime = HostRuntime::new();
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();
        let mut session = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);

        let count = message(OpCode::SmiGetProcessorCount, &(), &[]);
        assert_eq!(
            session.telemetry(OpCode::SmiGetProcessorCount, &count).unwrap_err(),
            SmiStatus::NOT_INITIALIZED
        );

        let init = message(OpCode::SmiInit, &SmiInitRequest { init_flags: 0 }, &[]);
        assert!(session.telemetry(OpCode::SmiInit, &init).unwrap().is_success());
        let reply = session.telemetry(OpCode::SmiGetProcessorCount, &count).unwrap();
        let (resp, _) = ProcessorCountResponse::split(&reply.body).unwrap();
        assert_eq!(resp.count, 1);
    }

    #[test]
    fn test_shutdown_keeps_source_up() {
        let mut runtime = HostRuntime::new();
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();
        let mut session = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);

        let init = message(OpCode::SmiInit, &SmiInitRequest { init_flags: 0 }, &[]);
        session.telemetry(OpCode::SmiInit, &init).unwrap();
        let shutdown = message(OpCode::SmiShutdown, &(), &[]);
        session.telemetry(OpCode::SmiShutdown, &shutdown).unwrap();

        let vram = message(OpCode::SmiGetVramUsage, &ProcessorRequest { processor: 0 }, &[]);
        let reply = session.telemetry(OpCode::SmiGetVramUsage, &vram).unwrap();
        let (usage, _) = VramUsage::split(&reply.body).unwrap();
        assert!(usage.total > 0);
    }

    #[test]
    fn test_short_telemetry_body_is_invalid_args() {
        let mut runtime = HostRuntime::new();
        let stats = WorkerStats::default();
        let mut params = KernelParamCache::new();
        let mut session = Session::new(&mut runtime, &mut params, &stats, 0, 1 << 20);

        let init = message(OpCode::SmiInit, &SmiInitRequest { init_flags: 0 }, &[]);
        session.telemetry(OpCode::SmiInit, &init).unwrap();
        let temp = message(OpCode::SmiGetTempMetric, &(), &[]);
        assert_eq!(
            session.telemetry(OpCode::SmiGetTempMetric, &temp).unwrap_err(),
            SmiStatus::INVALID_ARGS
        );
    }
}
