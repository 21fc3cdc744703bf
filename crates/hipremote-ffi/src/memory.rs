//! Memory exports.
//!
//! Device pointers are the worker's addresses carried in host pointer
//! types; they are never dereferenced here. Host pointers are only read or
//! written for the byte counts the caller passes.

use std::ffi::c_void;
use std::os::raw::c_int;

use hipremote_client::{Client, ClientError, DevicePtr, Result, Status, Stream};

use crate::device::store;
use crate::error::invalid;
use crate::types::{
    hipError_t, raw, HipHandle, HIP_MEMCPY_DEFAULT, HIP_MEMCPY_DEVICE_TO_DEVICE,
    HIP_MEMCPY_DEVICE_TO_HOST, HIP_MEMCPY_HOST_TO_DEVICE, HIP_MEMCPY_HOST_TO_HOST,
};
use crate::{api_call, client};

fn device_ptr(ptr: *const c_void) -> DevicePtr {
    DevicePtr(ptr as usize as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    HostToHost,
    HostToDevice,
    DeviceToHost,
    DeviceToDevice,
}

impl Direction {
    /// `hipMemcpyDefault` is taken as device-to-device: pointers are
    /// remote addresses the client cannot classify.
    fn from_kind(kind: c_int) -> Result<Self> {
        match kind {
            HIP_MEMCPY_HOST_TO_HOST => Ok(Direction::HostToHost),
            HIP_MEMCPY_HOST_TO_DEVICE => Ok(Direction::HostToDevice),
            HIP_MEMCPY_DEVICE_TO_HOST => Ok(Direction::DeviceToHost),
            HIP_MEMCPY_DEVICE_TO_DEVICE | HIP_MEMCPY_DEFAULT => Ok(Direction::DeviceToDevice),
            _ => Err(ClientError::Api(Status::INVALID_MEMCPY_DIRECTION)),
        }
    }
}

/// # Safety
///
/// Host-side pointers must be valid for `size` bytes in the direction of
/// the copy; `dst` and `src` must not overlap for a host-to-host copy.
unsafe fn copy(
    client: &Client,
    dst: *mut c_void,
    src: *const c_void,
    size: usize,
    direction: Direction,
    stream: Option<Stream>,
) -> Result<()> {
    if size == 0 {
        return Ok(());
    }
    if dst.is_null() || src.is_null() {
        return Err(invalid("null copy pointer"));
    }
    match direction {
        Direction::HostToHost => {
            // SAFETY: both valid for `size` bytes and disjoint per contract.
            unsafe { std::ptr::copy_nonoverlapping(src.cast::<u8>(), dst.cast::<u8>(), size) };
            Ok(())
        }
        Direction::HostToDevice => {
            // SAFETY: `src` readable for `size` bytes per contract.
            let bytes = unsafe { std::slice::from_raw_parts(src.cast::<u8>(), size) };
            match stream {
                Some(stream) => client.memcpy_htod_async(device_ptr(dst), bytes, stream),
                None => client.memcpy_htod(device_ptr(dst), bytes),
            }
        }
        Direction::DeviceToHost => {
            // SAFETY: `dst` writable for `size` bytes per contract.
            let bytes = unsafe { std::slice::from_raw_parts_mut(dst.cast::<u8>(), size) };
            match stream {
                Some(stream) => client.memcpy_dtoh_async(bytes, device_ptr(src), stream),
                None => client.memcpy_dtoh(bytes, device_ptr(src)),
            }
        }
        Direction::DeviceToDevice => match stream {
            Some(stream) => {
                client.memcpy_dtod_async(device_ptr(dst), device_ptr(src), size, stream)
            }
            None => client.memcpy_dtod(device_ptr(dst), device_ptr(src), size),
        },
    }
}

/// # Safety
///
/// `ptr` must be null or valid for a write of a pointer.
#[no_mangle]
pub unsafe extern "C" fn hipMalloc(ptr: *mut *mut c_void, size: usize) -> hipError_t {
    api_call("hipMalloc", || {
        if ptr.is_null() {
            return Err(invalid("null output pointer"));
        }
        let device = client()?.malloc(size)?;
        // SAFETY: forwarded caller contract.
        unsafe { store(ptr, device.0 as usize as *mut c_void) }
    })
}

#[no_mangle]
pub extern "C" fn hipFree(ptr: *mut c_void) -> hipError_t {
    api_call("hipFree", || {
        if ptr.is_null() {
            return Ok(());
        }
        client()?.free(device_ptr(ptr))
    })
}

/// # Safety
///
/// `free` and `total` must be null or valid for a write of `size_t`.
#[no_mangle]
pub unsafe extern "C" fn hipMemGetInfo(free: *mut usize, total: *mut usize) -> hipError_t {
    api_call("hipMemGetInfo", || {
        let (free_bytes, total_bytes) = client()?.mem_get_info()?;
        // SAFETY: forwarded caller contract.
        unsafe {
            store(free, free_bytes as usize)?;
            store(total, total_bytes as usize)
        }
    })
}

/// # Safety
///
/// See [`hipMemcpyAsync`].
#[no_mangle]
pub unsafe extern "C" fn hipMemcpy(
    dst: *mut c_void,
    src: *const c_void,
    size: usize,
    kind: c_int,
) -> hipError_t {
    api_call("hipMemcpy", || {
        let direction = Direction::from_kind(kind)?;
        // SAFETY: forwarded caller contract.
        unsafe { copy(client()?, dst, src, size, direction, None) }
    })
}

/// # Safety
///
/// The host side of the copy must be valid for `size` bytes. Unlike the
/// native call, a device-to-host copy has completed when this returns.
#[no_mangle]
pub unsafe extern "C" fn hipMemcpyAsync(
    dst: *mut c_void,
    src: *const c_void,
    size: usize,
    kind: c_int,
    stream: HipHandle,
) -> hipError_t {
    api_call("hipMemcpyAsync", || {
        let direction = Direction::from_kind(kind)?;
        let stream = Some(Stream(raw(stream)));
        // SAFETY: forwarded caller contract.
        unsafe { copy(client()?, dst, src, size, direction, stream) }
    })
}

/// # Safety
///
/// `src` must be valid for reads of `size` bytes.
#[no_mangle]
pub unsafe extern "C" fn hipMemcpyHtoD(
    dst: *mut c_void,
    src: *const c_void,
    size: usize,
) -> hipError_t {
    api_call("hipMemcpyHtoD", || {
        // SAFETY: forwarded caller contract.
        unsafe { copy(client()?, dst, src, size, Direction::HostToDevice, None) }
    })
}

/// # Safety
///
/// `dst` must be valid for writes of `size` bytes.
#[no_mangle]
pub unsafe extern "C" fn hipMemcpyDtoH(
    dst: *mut c_void,
    src: *const c_void,
    size: usize,
) -> hipError_t {
    api_call("hipMemcpyDtoH", || {
        // SAFETY: forwarded caller contract.
        unsafe { copy(client()?, dst, src, size, Direction::DeviceToHost, None) }
    })
}

#[no_mangle]
pub extern "C" fn hipMemcpyDtoD(dst: *mut c_void, src: *const c_void, size: usize) -> hipError_t {
    api_call("hipMemcpyDtoD", || {
        // SAFETY: no host memory is touched for device-to-device copies.
        unsafe { copy(client()?, dst, src, size, Direction::DeviceToDevice, None) }
    })
}

#[no_mangle]
pub extern "C" fn hipMemset(dst: *mut c_void, value: c_int, size: usize) -> hipError_t {
    api_call("hipMemset", || client()?.memset(device_ptr(dst), value as u8, size))
}

#[no_mangle]
pub extern "C" fn hipMemsetAsync(
    dst: *mut c_void,
    value: c_int,
    size: usize,
    stream: HipHandle,
) -> hipError_t {
    api_call("hipMemsetAsync", || {
        client()?.memset_async(device_ptr(dst), value as u8, size, Stream(raw(stream)))
    })
}

#[no_mangle]
pub extern "C" fn hipMemsetD8(dst: *mut c_void, value: u8, count: usize) -> hipError_t {
    api_call("hipMemsetD8", || client()?.memset(device_ptr(dst), value, count))
}

#[no_mangle]
pub extern "C" fn hipMemsetD32(dst: *mut c_void, value: c_int, count: usize) -> hipError_t {
    api_call("hipMemsetD32", || {
        client()?.memset_d32(device_ptr(dst), value as u32, count)
    })
}
