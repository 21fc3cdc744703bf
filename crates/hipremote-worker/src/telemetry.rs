//! Telemetry seam.
//!
//! Processors are addressed by index in `0..processor_count()`.

use hipremote_wire::body::{AsicInfo, ClockInfo, GpuActivity, GpuMetrics, PowerInfo, VramUsage};
use hipremote_wire::SmiStatus;

pub type SmiResult<T> = std::result::Result<T, SmiStatus>;

/// A source of GPU telemetry.
pub trait TelemetrySource: Send {
    /// Bring the source up. Idempotent.
    fn init(&mut self, flags: u64) -> SmiResult<()>;

    fn shutdown(&mut self);

    fn is_initialized(&self) -> bool;

    fn processor_count(&mut self) -> u32;

    fn gpu_metrics(&mut self, processor: u32) -> SmiResult<GpuMetrics>;

    fn power_info(&mut self, processor: u32) -> SmiResult<PowerInfo>;

    fn clock_info(&mut self, processor: u32, clock_type: u32) -> SmiResult<ClockInfo>;

    /// Degrees Celsius.
    fn temperature(&mut self, processor: u32, sensor: u32) -> SmiResult<i32>;

    fn gpu_activity(&mut self, processor: u32) -> SmiResult<GpuActivity>;

    fn vram_usage(&mut self, processor: u32) -> SmiResult<VramUsage>;

    fn asic_info(&mut self, processor: u32) -> SmiResult<AsicInfo>;
}
