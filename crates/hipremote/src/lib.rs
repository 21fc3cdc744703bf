//! Run HIP programs against a GPU on another machine.
//!
//! hipremote forwards HIP runtime calls over TCP to a worker process that
//! owns the GPU. Applications link the C-ABI library from `hipremote-ffi`;
//! Rust programs can use the typed [`client`] directly.
//!
//! # Crate Structure
//!
//! - [`transport`]: blocking TCP streams with full-transfer I/O
//! - [`wire`]: message header, op codes, request/response bodies
//! - [`client`]: connection management and the typed runtime API
//! - [`worker`]: accept loop, dispatch and GPU backends (behind `worker` feature)

/// Re-export transport types.
pub mod transport {
    pub use hipremote_transport::*;
}

/// Re-export wire protocol types.
pub mod wire {
    pub use hipremote_wire::*;
}

/// Re-export client types.
pub mod client {
    pub use hipremote_client::*;
}

/// Re-export worker types (requires `worker` feature).
#[cfg(feature = "worker")]
pub mod worker {
    pub use hipremote_worker::*;
}
