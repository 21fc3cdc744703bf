//! Remote GPU telemetry.
//!
//! Telemetry shares the worker's port and framing but uses its own session
//! handshake (`SMI_INIT`) and its own status vocabulary ([`SmiStatus`]).
//! Processors are addressed by index; the worker keeps the native handles.

use hipremote_wire::body::{
    AsicInfo, ClockInfo, ClockInfoRequest, GpuActivity, GpuMetrics, PowerInfo,
    ProcessorCountResponse, ProcessorRequest, TempMetric, TempMetricRequest, VramUsage,
};
use hipremote_wire::{OpCode, SmiStatus, WireBody};
use tracing::debug;

use crate::config::ClientConfig;
use crate::connection::{Connection, Handshake};
use crate::error::{ClientError, Result};

/// `AMDSMI_INIT_AMD_GPUS`.
pub const INIT_AMD_GPUS: u64 = 1 << 1;

/// Clock domains accepted by [`TelemetryClient::clock_info`].
pub mod clock {
    pub const SYS: u32 = 0;
    pub const GFX: u32 = SYS;
    pub const DF: u32 = 1;
    pub const DCEF: u32 = 2;
    pub const SOC: u32 = 3;
    pub const MEM: u32 = 4;
}

/// Temperature sensors accepted by [`TelemetryClient::temperature`].
pub mod sensor {
    pub const EDGE: u32 = 0;
    pub const HOTSPOT: u32 = 1;
    pub const VRAM: u32 = 2;
}

/// Remote telemetry session.
#[derive(Debug)]
pub struct TelemetryClient {
    conn: Connection,
}

impl TelemetryClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_init_flags(config, INIT_AMD_GPUS)
    }

    pub fn with_init_flags(config: ClientConfig, init_flags: u64) -> Self {
        Self {
            conn: Connection::new(config, Handshake::Telemetry { init_flags }),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn init(&self) -> Result<()> {
        self.conn.ensure_connected()
    }

    /// Tell the worker to release its telemetry library, then disconnect.
    pub fn shutdown(&self) {
        if self.conn.is_connected() {
            if let Err(err) = self.call::<_, ()>(OpCode::SmiShutdown, &()) {
                debug!(error = %err, "telemetry shutdown failed");
            }
        }
        self.conn.disconnect();
    }

    pub fn processor_count(&self) -> Result<u32> {
        self.call::<_, ProcessorCountResponse>(OpCode::SmiGetProcessorCount, &())
            .map(|r| r.count)
    }

    pub fn gpu_metrics(&self, processor: u32) -> Result<GpuMetrics> {
        self.call(OpCode::SmiGetGpuMetrics, &ProcessorRequest { processor })
    }

    pub fn power_info(&self, processor: u32) -> Result<PowerInfo> {
        self.call(OpCode::SmiGetPowerInfo, &ProcessorRequest { processor })
    }

    pub fn clock_info(&self, processor: u32, clock_type: u32) -> Result<ClockInfo> {
        self.call(
            OpCode::SmiGetClockInfo,
            &ClockInfoRequest {
                processor,
                clock_type,
            },
        )
    }

    /// Temperature in degrees Celsius.
    pub fn temperature(&self, processor: u32, sensor: u32) -> Result<i32> {
        self.call::<_, TempMetric>(
            OpCode::SmiGetTempMetric,
            &TempMetricRequest { processor, sensor },
        )
        .map(|t| t.celsius)
    }

    pub fn gpu_activity(&self, processor: u32) -> Result<GpuActivity> {
        self.call(OpCode::SmiGetGpuActivity, &ProcessorRequest { processor })
    }

    pub fn vram_usage(&self, processor: u32) -> Result<VramUsage> {
        self.call(OpCode::SmiGetVramUsage, &ProcessorRequest { processor })
    }

    pub fn asic_info(&self, processor: u32) -> Result<AsicInfo> {
        self.call(OpCode::SmiGetAsicInfo, &ProcessorRequest { processor })
    }

    fn call<B: WireBody, R: WireBody>(&self, op: OpCode, body: &B) -> Result<R> {
        let response = self.conn.request(op, body, &[])?;
        let status = response.smi_status()?;
        if status != SmiStatus::SUCCESS {
            return Err(ClientError::Smi(status));
        }
        Ok(response.response::<R>()?.0)
    }
}
