//! Request handlers, one `impl Session` block per API area.
//!
//! Handlers perform the native call and build a [`Reply`]; they never touch
//! the stream. Fire-and-forget and deferred errors are handled by the caller.

mod device;
mod memory;
mod module;
mod stream;
mod telemetry;

use bytes::Bytes;
use hipremote_wire::{Message, SmiStatus, Status, WireBody};
use tracing::debug;

/// Decode the fixed request body, answering `INVALID_VALUE` if it is short.
pub(crate) fn request<T: WireBody>(msg: &Message) -> Result<(T, Bytes), Status> {
    msg.request::<T>().map_err(|err| {
        debug!(error = %err, "malformed request body");
        Status::INVALID_VALUE
    })
}

/// As [`request`], for telemetry ops.
pub(crate) fn smi_request<T: WireBody>(msg: &Message) -> Result<T, SmiStatus> {
    msg.request::<T>().map(|(body, _)| body).map_err(|err| {
        debug!(error = %err, "malformed telemetry request body");
        SmiStatus::INVALID_ARGS
    })
}

/// Build a request message the way a client would send it.
#[cfg(test)]
pub(crate) fn test_message<B: WireBody>(op: hipremote_wire::OpCode, body: &B, inline: &[u8]) -> Message {
    let mut payload = body.encode();
    payload.extend_from_slice(inline);
    let payload = payload.freeze();
    Message {
        header: hipremote_wire::Header::new(
            op.code(),
            1,
            payload.len() as u32,
            hipremote_wire::Flags::NONE,
        ),
        payload,
    }
}
