//! Stream and event exports.

use std::os::raw::{c_int, c_uint};

use hipremote_client::{Event, Result, Status, Stream};

use crate::device::store;
use crate::types::{handle, hipError_t, raw, HipHandle};
use crate::{api_call, client};

/// Query results: `hipErrorNotReady` is an answer, not a failure.
fn ready(api: &'static str, query: impl FnOnce() -> Result<bool>) -> hipError_t {
    let mut complete = true;
    let code = api_call(api, || {
        complete = query()?;
        Ok(())
    });
    if code == Status::SUCCESS.code() && !complete {
        Status::NOT_READY.code()
    } else {
        code
    }
}

/// # Safety
///
/// `stream` must be null or valid for a write of `hipStream_t`.
#[no_mangle]
pub unsafe extern "C" fn hipStreamCreate(stream: *mut HipHandle) -> hipError_t {
    api_call("hipStreamCreate", || {
        let created = client()?.stream_create()?;
        // SAFETY: forwarded caller contract.
        unsafe { store(stream, handle(created.raw())) }
    })
}

/// # Safety
///
/// `stream` must be null or valid for a write of `hipStream_t`.
#[no_mangle]
pub unsafe extern "C" fn hipStreamCreateWithFlags(
    stream: *mut HipHandle,
    flags: c_uint,
) -> hipError_t {
    api_call("hipStreamCreateWithFlags", || {
        let created = client()?.stream_create_with_flags(flags)?;
        // SAFETY: forwarded caller contract.
        unsafe { store(stream, handle(created.raw())) }
    })
}

/// # Safety
///
/// `stream` must be null or valid for a write of `hipStream_t`.
#[no_mangle]
pub unsafe extern "C" fn hipStreamCreateWithPriority(
    stream: *mut HipHandle,
    flags: c_uint,
    priority: c_int,
) -> hipError_t {
    api_call("hipStreamCreateWithPriority", || {
        let created = client()?.stream_create_with_priority(flags, priority)?;
        // SAFETY: forwarded caller contract.
        unsafe { store(stream, handle(created.raw())) }
    })
}

#[no_mangle]
pub extern "C" fn hipStreamDestroy(stream: HipHandle) -> hipError_t {
    api_call("hipStreamDestroy", || client()?.stream_destroy(Stream(raw(stream))))
}

#[no_mangle]
pub extern "C" fn hipStreamSynchronize(stream: HipHandle) -> hipError_t {
    api_call("hipStreamSynchronize", || {
        client()?.stream_synchronize(Stream(raw(stream)))
    })
}

#[no_mangle]
pub extern "C" fn hipStreamQuery(stream: HipHandle) -> hipError_t {
    ready("hipStreamQuery", || client()?.stream_query(Stream(raw(stream))))
}

#[no_mangle]
pub extern "C" fn hipStreamWaitEvent(
    stream: HipHandle,
    event: HipHandle,
    _flags: c_uint,
) -> hipError_t {
    api_call("hipStreamWaitEvent", || {
        client()?.stream_wait_event(Stream(raw(stream)), Event(raw(event)))
    })
}

/// # Safety
///
/// `event` must be null or valid for a write of `hipEvent_t`.
#[no_mangle]
pub unsafe extern "C" fn hipEventCreate(event: *mut HipHandle) -> hipError_t {
    api_call("hipEventCreate", || {
        let created = client()?.event_create()?;
        // SAFETY: forwarded caller contract.
        unsafe { store(event, handle(created.raw())) }
    })
}

/// # Safety
///
/// `event` must be null or valid for a write of `hipEvent_t`.
#[no_mangle]
pub unsafe extern "C" fn hipEventCreateWithFlags(
    event: *mut HipHandle,
    flags: c_uint,
) -> hipError_t {
    api_call("hipEventCreateWithFlags", || {
        let created = client()?.event_create_with_flags(flags)?;
        // SAFETY: forwarded caller contract.
        unsafe { store(event, handle(created.raw())) }
    })
}

#[no_mangle]
pub extern "C" fn hipEventDestroy(event: HipHandle) -> hipError_t {
    api_call("hipEventDestroy", || client()?.event_destroy(Event(raw(event))))
}

#[no_mangle]
pub extern "C" fn hipEventRecord(event: HipHandle, stream: HipHandle) -> hipError_t {
    api_call("hipEventRecord", || {
        client()?.event_record(Event(raw(event)), Stream(raw(stream)))
    })
}

#[no_mangle]
pub extern "C" fn hipEventSynchronize(event: HipHandle) -> hipError_t {
    api_call("hipEventSynchronize", || {
        client()?.event_synchronize(Event(raw(event)))
    })
}

#[no_mangle]
pub extern "C" fn hipEventQuery(event: HipHandle) -> hipError_t {
    ready("hipEventQuery", || client()?.event_query(Event(raw(event))))
}

/// # Safety
///
/// `milliseconds` must be null or valid for a write of `float`.
#[no_mangle]
pub unsafe extern "C" fn hipEventElapsedTime(
    milliseconds: *mut f32,
    start: HipHandle,
    end: HipHandle,
) -> hipError_t {
    api_call("hipEventElapsedTime", || {
        let elapsed = client()?.event_elapsed_time(Event(raw(start)), Event(raw(end)))?;
        // SAFETY: forwarded caller contract.
        unsafe { store(milliseconds, elapsed) }
    })
}
