//! Device, version and error-query exports.

use std::os::raw::{c_char, c_int};

use hipremote_client::Status;
use hipremote_wire::abi::HipDeviceProp;

use crate::error::{self, invalid};
use crate::types::hipError_t;
use crate::{api_call, client, ffi_boundary};

/// Write `value` through `out` if it is non-null.
///
/// # Safety
///
/// `out` must be null or valid for a write of `T`.
pub(crate) unsafe fn store<T>(out: *mut T, value: T) -> hipremote_client::Result<()> {
    if out.is_null() {
        return Err(invalid("null output pointer"));
    }
    // SAFETY: non-null and valid for writes per the caller's contract.
    unsafe { out.write(value) };
    Ok(())
}

/// # Safety
///
/// `count` must be null or valid for a write of `int`.
#[no_mangle]
pub unsafe extern "C" fn hipGetDeviceCount(count: *mut c_int) -> hipError_t {
    api_call("hipGetDeviceCount", || {
        let value = client()?.device_count()?;
        // SAFETY: forwarded caller contract.
        unsafe { store(count, value) }
    })
}

#[no_mangle]
pub extern "C" fn hipSetDevice(device: c_int) -> hipError_t {
    api_call("hipSetDevice", || client()?.set_device(device))
}

/// # Safety
///
/// `device` must be null or valid for a write of `int`.
#[no_mangle]
pub unsafe extern "C" fn hipGetDevice(device: *mut c_int) -> hipError_t {
    api_call("hipGetDevice", || {
        let value = client()?.device()?;
        // SAFETY: forwarded caller contract.
        unsafe { store(device, value) }
    })
}

#[no_mangle]
pub extern "C" fn hipDeviceSynchronize() -> hipError_t {
    api_call("hipDeviceSynchronize", || client()?.device_synchronize())
}

#[no_mangle]
pub extern "C" fn hipDeviceReset() -> hipError_t {
    api_call("hipDeviceReset", || client()?.device_reset())
}

/// # Safety
///
/// `value` must be null or valid for a write of `int`.
#[no_mangle]
pub unsafe extern "C" fn hipDeviceGetAttribute(
    value: *mut c_int,
    attribute: c_int,
    device: c_int,
) -> hipError_t {
    api_call("hipDeviceGetAttribute", || {
        let result = client()?.device_attribute(attribute, device)?;
        // SAFETY: forwarded caller contract.
        unsafe { store(value, result) }
    })
}

/// # Safety
///
/// `props` must be null or point to a writable `hipDeviceProp_t` laid out
/// as in HIP 6.x (`hipDeviceProp_tR0600`).
#[no_mangle]
pub unsafe extern "C" fn hipGetDevicePropertiesR0600(
    props: *mut HipDeviceProp,
    device: c_int,
) -> hipError_t {
    api_call("hipGetDeviceProperties", || {
        let remote = client()?.device_properties(device)?;
        // SAFETY: forwarded caller contract.
        unsafe { store(props, HipDeviceProp::from(&remote)) }
    })
}

/// Unversioned alias of [`hipGetDevicePropertiesR0600`].
///
/// # Safety
///
/// Same as [`hipGetDevicePropertiesR0600`].
#[no_mangle]
pub unsafe extern "C" fn hipGetDeviceProperties(
    props: *mut HipDeviceProp,
    device: c_int,
) -> hipError_t {
    // SAFETY: forwarded caller contract.
    unsafe { hipGetDevicePropertiesR0600(props, device) }
}

/// # Safety
///
/// `version` must be null or valid for a write of `int`.
#[no_mangle]
pub unsafe extern "C" fn hipRuntimeGetVersion(version: *mut c_int) -> hipError_t {
    api_call("hipRuntimeGetVersion", || {
        let value = client()?.runtime_version()?;
        // SAFETY: forwarded caller contract.
        unsafe { store(version, value) }
    })
}

/// # Safety
///
/// `version` must be null or valid for a write of `int`.
#[no_mangle]
pub unsafe extern "C" fn hipDriverGetVersion(version: *mut c_int) -> hipError_t {
    api_call("hipDriverGetVersion", || {
        let value = client()?.driver_version()?;
        // SAFETY: forwarded caller contract.
        unsafe { store(version, value) }
    })
}

/// Last error of this thread, or else the worker's, cleared on return.
#[no_mangle]
pub extern "C" fn hipGetLastError() -> hipError_t {
    ffi_boundary(Status::UNKNOWN.code(), || {
        let local = error::take_status();
        if !local.is_success() {
            return local.code();
        }
        remote_status(|c| c.last_error())
    })
}

/// Like [`hipGetLastError`] without clearing anything.
#[no_mangle]
pub extern "C" fn hipPeekAtLastError() -> hipError_t {
    ffi_boundary(Status::UNKNOWN.code(), || {
        let local = error::peek_status();
        if !local.is_success() {
            return local.code();
        }
        remote_status(|c| c.peek_last_error())
    })
}

fn remote_status(
    query: impl FnOnce(&hipremote_client::Client) -> hipremote_client::Result<Status>,
) -> hipError_t {
    // Only ask the worker if this process already talks to one.
    match client() {
        Ok(c) if c.connection().is_connected() => match query(c) {
            Ok(status) => status.code(),
            Err(err) => err.status().code(),
        },
        _ => Status::SUCCESS.code(),
    }
}

#[no_mangle]
pub extern "C" fn hipGetErrorName(status: hipError_t) -> *const c_char {
    static_str(Status(status).name())
}

#[no_mangle]
pub extern "C" fn hipGetErrorString(status: hipError_t) -> *const c_char {
    static_str(Status(status).description())
}

/// Nul-terminated copy of a static string, interned per value.
fn static_str(text: &'static str) -> *const c_char {
    use std::collections::HashMap;
    use std::ffi::CString;
    use std::sync::{Mutex, OnceLock};

    static INTERNED: OnceLock<Mutex<HashMap<&'static str, CString>>> = OnceLock::new();

    ffi_boundary(std::ptr::null(), || {
        let mut map = INTERNED
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(text)
            .or_insert_with(|| CString::new(text).unwrap_or_default())
            .as_ptr()
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    fn read(ptr: *const c_char) -> &'static str {
        assert!(!ptr.is_null());
        // SAFETY: interned strings live for the whole process.
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap()
    }

    #[test]
    fn error_names_match_native_runtime() {
        assert_eq!(read(hipGetErrorName(0)), "hipSuccess");
        assert_eq!(read(hipGetErrorName(2)), "hipErrorOutOfMemory");
        assert_eq!(hipGetErrorName(1), hipGetErrorName(1));
    }

    #[test]
    fn null_output_is_invalid_value() {
        let err = unsafe { store::<c_int>(std::ptr::null_mut(), 1) }.unwrap_err();
        assert_eq!(err.status(), Status::INVALID_VALUE);
    }

    #[test]
    fn local_error_is_reported_once() {
        error::record(Status::INVALID_DEVICE, "hipSetDevice: bad ordinal");
        assert_eq!(hipPeekAtLastError(), Status::INVALID_DEVICE.code());
        assert_eq!(hipGetLastError(), Status::INVALID_DEVICE.code());
    }
}
