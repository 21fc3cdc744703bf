//! Client side of HIP API remoting.
//!
//! A [`Client`] owns one logical connection to a worker. The connection is
//! opened lazily on the first call (or by [`Client::init`]), serializes
//! every request behind a single mutex, and is dropped on any transport or
//! protocol failure; the next call reconnects with a fresh handshake.
//!
//! Natively asynchronous operations without a caller-visible result
//! (kernel launch, host-to-device and device-to-device copies, memset,
//! free, event record) are sent fire-and-forget: the call returns as soon
//! as the request is written. Their failures are reported by the worker at
//! the next synchronizing call, the same way the native runtime defers
//! asynchronous errors.
//!
//! Most programs use the process-wide instance from [`global`], configured
//! from `HIP_REMOTE_*` environment variables.

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod handles;
pub mod runtime;
pub mod telemetry;

pub use config::ClientConfig;
pub use connection::{Connection, Handshake};
pub use context::{global, init, shutdown};
pub use error::{ClientError, Result};
pub use handles::{Event, Function, LaunchDims, Module, Stream};
pub use hipremote_wire::{DevicePtr, KernelArgs, ParamSlot, SmiStatus, Status};
pub use runtime::Client;
pub use telemetry::TelemetryClient;
