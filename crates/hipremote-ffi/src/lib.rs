//! hipremote-ffi: C-ABI HIP runtime exports backed by a remote worker.
//!
//! Linking (or preloading) this library in place of the native HIP runtime
//! sends every supported `hip*` call to the worker named by
//! `HIP_REMOTE_HOST`. Return codes, the per-thread last error and
//! `hipGetErrorName`/`hipGetErrorString` follow the native runtime.

mod device;
mod error;
mod image;
mod logging;
mod memory;
mod module;
mod stream;
mod types;

use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;

use hipremote_client::{Client, Result, Status};
use tracing::debug;

pub use device::{
    hipDeviceGetAttribute, hipDeviceReset, hipDeviceSynchronize, hipDriverGetVersion,
    hipGetDevice, hipGetDeviceCount, hipGetDeviceProperties, hipGetDevicePropertiesR0600,
    hipGetErrorName, hipGetErrorString, hipGetLastError, hipPeekAtLastError,
    hipRuntimeGetVersion, hipSetDevice,
};
pub use memory::{
    hipFree, hipMalloc, hipMemGetInfo, hipMemcpy, hipMemcpyAsync, hipMemcpyDtoD,
    hipMemcpyDtoH, hipMemcpyHtoD, hipMemset, hipMemsetAsync, hipMemsetD32, hipMemsetD8,
};
pub use module::{
    hipLaunchKernel, hipModuleGetFunction, hipModuleLaunchKernel, hipModuleLoadData,
    hipModuleLoadDataEx, hipModuleUnload,
};
pub use stream::{
    hipEventCreate, hipEventCreateWithFlags, hipEventDestroy, hipEventElapsedTime,
    hipEventQuery, hipEventRecord, hipEventSynchronize, hipStreamCreate,
    hipStreamCreateWithFlags, hipStreamCreateWithPriority, hipStreamDestroy, hipStreamQuery,
    hipStreamSynchronize, hipStreamWaitEvent,
};
pub use types::{hipError_t, Dim3, HipHandle};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// The process-wide client, with logging set up on first use.
fn client() -> Result<&'static Client> {
    logging::init();
    hipremote_client::global()
}

/// Run one API call: panic boundary, error recording and status mapping.
fn api_call(api: &'static str, f: impl FnOnce() -> Result<()>) -> hipError_t {
    ffi_boundary(Status::UNKNOWN.code(), || match f() {
        Ok(()) => Status::SUCCESS.code(),
        Err(err) => {
            let status = error::record_client_error(api, &err);
            debug!(api, error = %err, %status, "call failed");
            status.code()
        }
    })
}

/// Connect to the worker now instead of on the first call.
#[no_mangle]
pub extern "C" fn hipremote_init() -> hipError_t {
    api_call("hipremote_init", || client()?.init())
}

/// Tell the worker the session is over. A later call reconnects.
#[no_mangle]
pub extern "C" fn hipremote_shutdown() {
    ffi_boundary((), hipremote_client::shutdown);
}

/// Message of this thread's most recent failure; empty if none.
#[no_mangle]
pub extern "C" fn hipremote_last_error_message() -> *const c_char {
    ffi_boundary(std::ptr::null(), error::last_message_ptr)
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn panics_become_unknown() {
        let code = api_call("hipTest", || panic!("boom"));
        assert_eq!(code, Status::UNKNOWN.code());
        assert_eq!(error::take_status(), Status::UNKNOWN);
    }

    #[test]
    fn failures_are_recorded_with_message() {
        let code = api_call("hipTest", || Err(error::invalid("null out pointer")));
        assert_eq!(code, Status::INVALID_VALUE.code());

        let ptr = hipremote_last_error_message();
        assert!(!ptr.is_null());
        // SAFETY: points at this thread's message buffer.
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap();
        assert!(text.contains("hipTest"), "{text}");
        assert!(text.contains("null out pointer"), "{text}");
    }
}
