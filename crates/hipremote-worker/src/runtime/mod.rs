//! GPU runtime seam.
//!
//! The worker reaches the accelerator only through [`GpuRuntime`]. Handles
//! (device pointers, streams, events, modules, functions) are opaque `u64`
//! values owned by the runtime and passed through verbatim; `0` is the null
//! stream. Failures are native status codes.

mod hip;
mod host;
mod sysfs;

pub use hip::{HipRuntime, RuntimeLoadError, HIP_LIBRARY};
pub use host::{HostKernel, HostMemory, HostRuntime, HOST_RUNTIME_VERSION};
pub use sysfs::SysfsTelemetry;

use hipremote_wire::body::DeviceProperties;
use hipremote_wire::{ParamSlot, Status};

use crate::telemetry::TelemetrySource;

pub type RtResult<T> = std::result::Result<T, Status>;

/// Grid, block, dynamic shared memory and stream of one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub grid: [u32; 3],
    pub block: [u32; 3],
    pub shared_mem_bytes: u32,
    pub stream: u64,
}

/// Element width and value of a memset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPattern {
    U8(u8),
    U16(u16),
    U32(u32),
}

impl FillPattern {
    pub fn width(self) -> usize {
        match self {
            FillPattern::U8(_) => 1,
            FillPattern::U16(_) => 2,
            FillPattern::U32(_) => 4,
        }
    }
}

/// The accelerator API as seen by the worker.
pub trait GpuRuntime: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn device_count(&mut self) -> RtResult<i32>;
    fn set_device(&mut self, device: i32) -> RtResult<()>;
    fn device(&mut self) -> RtResult<i32>;
    fn device_properties(&mut self, device: i32) -> RtResult<DeviceProperties>;
    fn device_attribute(&mut self, attribute: i32, device: i32) -> RtResult<i32>;
    fn device_synchronize(&mut self) -> RtResult<()>;
    fn device_reset(&mut self) -> RtResult<()>;

    fn malloc(&mut self, size: u64) -> RtResult<u64>;
    fn free(&mut self, ptr: u64) -> RtResult<()>;
    /// `(free, total)` device memory in bytes.
    fn mem_get_info(&mut self) -> RtResult<(u64, u64)>;
    /// `src` only lives for the duration of the call.
    fn memcpy_htod(&mut self, dst: u64, src: &[u8], stream: u64) -> RtResult<()>;
    fn memcpy_dtoh(&mut self, dst: &mut [u8], src: u64, stream: u64) -> RtResult<()>;
    fn memcpy_dtod(&mut self, dst: u64, src: u64, size: u64, stream: u64) -> RtResult<()>;
    /// Fill `count` elements of the pattern's width.
    fn memset(&mut self, dst: u64, pattern: FillPattern, count: u64, stream: u64)
        -> RtResult<()>;

    fn stream_create(&mut self, flags: u32, priority: i32) -> RtResult<u64>;
    fn stream_destroy(&mut self, stream: u64) -> RtResult<()>;
    fn stream_synchronize(&mut self, stream: u64) -> RtResult<()>;
    /// `Err(NOT_READY)` while work is pending.
    fn stream_query(&mut self, stream: u64) -> RtResult<()>;
    fn stream_wait_event(&mut self, stream: u64, event: u64, flags: u32) -> RtResult<()>;

    fn event_create(&mut self, flags: u32) -> RtResult<u64>;
    fn event_destroy(&mut self, event: u64) -> RtResult<()>;
    fn event_record(&mut self, event: u64, stream: u64) -> RtResult<()>;
    fn event_synchronize(&mut self, event: u64) -> RtResult<()>;
    fn event_query(&mut self, event: u64) -> RtResult<()>;
    fn event_elapsed_time(&mut self, start: u64, end: u64) -> RtResult<f32>;

    fn module_load(&mut self, image: &[u8]) -> RtResult<u64>;
    fn module_unload(&mut self, module: u64) -> RtResult<()>;
    fn module_get_function(&mut self, module: u64, name: &str) -> RtResult<u64>;

    /// Compiler-embedded parameter layout of `function`, if available.
    fn kernel_param_layout(&mut self, function: u64) -> Option<Vec<ParamSlot>>;

    /// Launch with one byte range per formal parameter.
    fn launch(
        &mut self,
        function: u64,
        geometry: &LaunchGeometry,
        params: &[&[u8]],
    ) -> RtResult<()>;

    /// Launch with an opaque flat argument buffer.
    fn launch_flat(&mut self, function: u64, geometry: &LaunchGeometry, args: &[u8])
        -> RtResult<()>;

    fn runtime_version(&mut self) -> RtResult<i32>;
    fn driver_version(&mut self) -> RtResult<i32>;

    /// Return and clear the sticky error.
    fn get_last_error(&mut self) -> Status;
    /// Return the sticky error without clearing it.
    fn peek_last_error(&mut self) -> Status;

    fn telemetry(&mut self) -> Option<&mut dyn TelemetrySource> {
        None
    }
}
