//! Blocking TCP transport for HIP remoting.
//!
//! This is the lowest layer of hipremote. It provides:
//! - [`RemoteStream`], a connected TCP stream with latency-oriented defaults
//! - [`WorkerSocket`], the worker-side listener
//! - [`send_all`] / [`recv_all`], full-transfer helpers that retry on
//!   interruption and treat a zero-byte read as the peer closing
//!
//! Everything above (framing, client, worker) builds on these.

pub mod error;
pub mod io;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use io::{recv_all, send_all};
pub use stream::RemoteStream;
pub use tcp::{ConnectOptions, WorkerSocket, DEFAULT_PORT};
