use std::ffi::c_void;

/// `hipError_t`.
#[allow(non_camel_case_types)]
pub type hipError_t = i32;

/// `hipStream_t`, `hipEvent_t`, `hipModule_t` and `hipFunction_t` are
/// opaque pointers carrying the worker's 64-bit handle.
pub type HipHandle = *mut c_void;

/// `dim3`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// `hipMemcpyKind`.
pub const HIP_MEMCPY_HOST_TO_HOST: i32 = 0;
pub const HIP_MEMCPY_HOST_TO_DEVICE: i32 = 1;
pub const HIP_MEMCPY_DEVICE_TO_HOST: i32 = 2;
pub const HIP_MEMCPY_DEVICE_TO_DEVICE: i32 = 3;
pub const HIP_MEMCPY_DEFAULT: i32 = 4;

/// Markers of the `extra` argument of `hipModuleLaunchKernel`.
pub const HIP_LAUNCH_PARAM_BUFFER_POINTER: usize = 0x01;
pub const HIP_LAUNCH_PARAM_BUFFER_SIZE: usize = 0x02;
pub const HIP_LAUNCH_PARAM_END: usize = 0x03;

pub(crate) fn raw(handle: HipHandle) -> u64 {
    handle as usize as u64
}

pub(crate) fn handle(value: u64) -> HipHandle {
    value as usize as HipHandle
}
