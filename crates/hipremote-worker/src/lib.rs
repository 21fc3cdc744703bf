//! Worker side of HIP API remoting.
//!
//! A [`Worker`] listens on a TCP port and serves one client connection at a
//! time. Each message is fully executed against the GPU runtime before the
//! next one is read, so submission order on the client is execution order
//! here.
//!
//! Messages flagged `NO_REPLY` get no response; their failures are held in
//! the session and reported by the next synchronizing call. The runtime is
//! reached only through [`GpuRuntime`]: [`HipRuntime`] forwards to the real
//! HIP library, [`HostRuntime`] emulates a device in host memory for
//! development and tests.

pub mod config;
pub mod error;
mod handlers;
pub mod param_cache;
pub mod runtime;
pub mod session;
pub mod telemetry;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use param_cache::{KernelParamCache, LayoutError};
pub use runtime::{
    FillPattern, GpuRuntime, HipRuntime, HostKernel, HostMemory, HostRuntime, LaunchGeometry,
    RuntimeLoadError, SysfsTelemetry,
};
pub use session::{ReplyMode, SessionEnd};
pub use telemetry::TelemetrySource;
pub use worker::{Worker, WorkerStats};
