//! HIP runtime loaded from `libamdhip64.so` at startup.
//!
//! Symbols are resolved with `dlopen` so the worker binary does not link
//! against a particular ROCm release. Two symbols are optional:
//! `hipGetDevicePropertiesR0600` (older runtimes answer `NOT_SUPPORTED` for
//! device properties) and `hipKernelGetParamInfo` (without it every launch
//! takes the flat-buffer path).

use std::ffi::{c_char, c_int, c_uint, c_void, CString};
use std::path::{Path, PathBuf};

use hipremote_wire::abi::HipDeviceProp;
use hipremote_wire::body::DeviceProperties;
use hipremote_wire::{ParamSlot, Status};
use libloading::Library;
use thiserror::Error;
use tracing::{debug, info};

use super::{FillPattern, GpuRuntime, LaunchGeometry, RtResult};
use crate::telemetry::TelemetrySource;

/// Default library name searched on the loader path.
pub const HIP_LIBRARY: &str = "libamdhip64.so";

const MEMCPY_HOST_TO_DEVICE: c_int = 1;
const MEMCPY_DEVICE_TO_HOST: c_int = 2;
const MEMCPY_DEVICE_TO_DEVICE: c_int = 3;

const LAUNCH_PARAM_BUFFER_POINTER: usize = 0x01;
const LAUNCH_PARAM_BUFFER_SIZE: usize = 0x02;
const LAUNCH_PARAM_END: usize = 0x03;

/// Upper bound when probing parameter metadata.
const MAX_KERNEL_PARAMS: usize = 4096;

/// Failure to bring up the native runtime.
#[derive(Debug, Error)]
pub enum RuntimeLoadError {
    #[error("failed to load {path}: {source}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("missing HIP symbol {name}: {source}")]
    Symbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("HIP initialization failed: {0}")]
    Init(Status),
}

type HipError = c_int;
type Handle = *mut c_void;

type FnNoArgs = unsafe extern "C" fn() -> HipError;
type FnIntOut = unsafe extern "C" fn(*mut c_int) -> HipError;
type FnSetDevice = unsafe extern "C" fn(c_int) -> HipError;
type FnDeviceGetAttribute = unsafe extern "C" fn(*mut c_int, c_int, c_int) -> HipError;
type FnGetDeviceProperties = unsafe extern "C" fn(*mut HipDeviceProp, c_int) -> HipError;
type FnHandle = unsafe extern "C" fn(Handle) -> HipError;
type FnMalloc = unsafe extern "C" fn(*mut Handle, usize) -> HipError;
type FnMemGetInfo = unsafe extern "C" fn(*mut usize, *mut usize) -> HipError;
type FnMemcpy = unsafe extern "C" fn(Handle, *const c_void, usize, c_int) -> HipError;
type FnMemcpyAsync = unsafe extern "C" fn(Handle, *const c_void, usize, c_int, Handle) -> HipError;
type FnMemsetD8 = unsafe extern "C" fn(Handle, u8, usize) -> HipError;
type FnMemsetD16 = unsafe extern "C" fn(Handle, u16, usize) -> HipError;
type FnMemsetD32 = unsafe extern "C" fn(Handle, c_int, usize) -> HipError;
type FnMemsetD8Async = unsafe extern "C" fn(Handle, u8, usize, Handle) -> HipError;
type FnMemsetD16Async = unsafe extern "C" fn(Handle, u16, usize, Handle) -> HipError;
type FnMemsetD32Async = unsafe extern "C" fn(Handle, c_int, usize, Handle) -> HipError;
type FnStreamCreate = unsafe extern "C" fn(*mut Handle, c_uint, c_int) -> HipError;
type FnStreamWaitEvent = unsafe extern "C" fn(Handle, Handle, c_uint) -> HipError;
type FnEventCreate = unsafe extern "C" fn(*mut Handle, c_uint) -> HipError;
type FnEventRecord = unsafe extern "C" fn(Handle, Handle) -> HipError;
type FnEventElapsedTime = unsafe extern "C" fn(*mut f32, Handle, Handle) -> HipError;
type FnModuleLoadData = unsafe extern "C" fn(*mut Handle, *const c_void) -> HipError;
type FnModuleGetFunction = unsafe extern "C" fn(*mut Handle, Handle, *const c_char) -> HipError;
type FnModuleLaunchKernel = unsafe extern "C" fn(
    Handle,
    c_uint,
    c_uint,
    c_uint,
    c_uint,
    c_uint,
    c_uint,
    c_uint,
    Handle,
    *mut *mut c_void,
    *mut *mut c_void,
) -> HipError;
type FnKernelGetParamInfo = unsafe extern "C" fn(Handle, usize, *mut usize, *mut usize) -> HipError;

struct HipApi {
    get_device_count: FnIntOut,
    set_device: FnSetDevice,
    get_device: FnIntOut,
    device_get_attribute: FnDeviceGetAttribute,
    get_device_properties: Option<FnGetDeviceProperties>,
    device_synchronize: FnNoArgs,
    device_reset: FnNoArgs,
    malloc: FnMalloc,
    free: FnHandle,
    mem_get_info: FnMemGetInfo,
    memcpy: FnMemcpy,
    memcpy_async: FnMemcpyAsync,
    memset_d8: FnMemsetD8,
    memset_d16: FnMemsetD16,
    memset_d32: FnMemsetD32,
    memset_d8_async: FnMemsetD8Async,
    memset_d16_async: FnMemsetD16Async,
    memset_d32_async: FnMemsetD32Async,
    stream_create: FnStreamCreate,
    stream_destroy: FnHandle,
    stream_synchronize: FnHandle,
    stream_query: FnHandle,
    stream_wait_event: FnStreamWaitEvent,
    event_create: FnEventCreate,
    event_destroy: FnHandle,
    event_record: FnEventRecord,
    event_synchronize: FnHandle,
    event_query: FnHandle,
    event_elapsed_time: FnEventElapsedTime,
    module_load_data: FnModuleLoadData,
    module_unload: FnHandle,
    module_get_function: FnModuleGetFunction,
    module_launch_kernel: FnModuleLaunchKernel,
    kernel_get_param_info: Option<FnKernelGetParamInfo>,
    runtime_get_version: FnIntOut,
    driver_get_version: FnIntOut,
    get_last_error: FnNoArgs,
    peek_at_last_error: FnNoArgs,
    // Keeps the function pointers above valid.
    _lib: Library,
}

macro_rules! required {
    ($lib:expr, $ty:ty, $name:literal) => {
        // SAFETY: `$ty` matches the declaration in hip_runtime_api.h.
        *unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) }.map_err(|source| {
            RuntimeLoadError::Symbol {
                name: $name,
                source,
            }
        })?
    };
}

macro_rules! optional {
    ($lib:expr, $ty:ty, $name:literal) => {
        // SAFETY: `$ty` matches the declaration in hip_runtime_api.h.
        unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) }
            .ok()
            .map(|symbol| *symbol)
    };
}

impl HipApi {
    fn load(path: &Path) -> Result<Self, RuntimeLoadError> {
        // SAFETY: loading the HIP runtime runs its initializers, which have
        // no preconditions on the calling process.
        let lib = unsafe { Library::new(path) }.map_err(|source| RuntimeLoadError::Library {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            get_device_count: required!(lib, FnIntOut, "hipGetDeviceCount"),
            set_device: required!(lib, FnSetDevice, "hipSetDevice"),
            get_device: required!(lib, FnIntOut, "hipGetDevice"),
            device_get_attribute: required!(lib, FnDeviceGetAttribute, "hipDeviceGetAttribute"),
            get_device_properties: optional!(
                lib,
                FnGetDeviceProperties,
                "hipGetDevicePropertiesR0600"
            ),
            device_synchronize: required!(lib, FnNoArgs, "hipDeviceSynchronize"),
            device_reset: required!(lib, FnNoArgs, "hipDeviceReset"),
            malloc: required!(lib, FnMalloc, "hipMalloc"),
            free: required!(lib, FnHandle, "hipFree"),
            mem_get_info: required!(lib, FnMemGetInfo, "hipMemGetInfo"),
            memcpy: required!(lib, FnMemcpy, "hipMemcpy"),
            memcpy_async: required!(lib, FnMemcpyAsync, "hipMemcpyAsync"),
            memset_d8: required!(lib, FnMemsetD8, "hipMemsetD8"),
            memset_d16: required!(lib, FnMemsetD16, "hipMemsetD16"),
            memset_d32: required!(lib, FnMemsetD32, "hipMemsetD32"),
            memset_d8_async: required!(lib, FnMemsetD8Async, "hipMemsetD8Async"),
            memset_d16_async: required!(lib, FnMemsetD16Async, "hipMemsetD16Async"),
            memset_d32_async: required!(lib, FnMemsetD32Async, "hipMemsetD32Async"),
            stream_create: required!(lib, FnStreamCreate, "hipStreamCreateWithPriority"),
            stream_destroy: required!(lib, FnHandle, "hipStreamDestroy"),
            stream_synchronize: required!(lib, FnHandle, "hipStreamSynchronize"),
            stream_query: required!(lib, FnHandle, "hipStreamQuery"),
            stream_wait_event: required!(lib, FnStreamWaitEvent, "hipStreamWaitEvent"),
            event_create: required!(lib, FnEventCreate, "hipEventCreateWithFlags"),
            event_destroy: required!(lib, FnHandle, "hipEventDestroy"),
            event_record: required!(lib, FnEventRecord, "hipEventRecord"),
            event_synchronize: required!(lib, FnHandle, "hipEventSynchronize"),
            event_query: required!(lib, FnHandle, "hipEventQuery"),
            event_elapsed_time: required!(lib, FnEventElapsedTime, "hipEventElapsedTime"),
            module_load_data: required!(lib, FnModuleLoadData, "hipModuleLoadData"),
            module_unload: required!(lib, FnHandle, "hipModuleUnload"),
            module_get_function: required!(lib, FnModuleGetFunction, "hipModuleGetFunction"),
            module_launch_kernel: required!(lib, FnModuleLaunchKernel, "hipModuleLaunchKernel"),
            kernel_get_param_info: optional!(lib, FnKernelGetParamInfo, "hipKernelGetParamInfo"),
            runtime_get_version: required!(lib, FnIntOut, "hipRuntimeGetVersion"),
            driver_get_version: required!(lib, FnIntOut, "hipDriverGetVersion"),
            get_last_error: required!(lib, FnNoArgs, "hipGetLastError"),
            peek_at_last_error: required!(lib, FnNoArgs, "hipPeekAtLastError"),
            _lib: lib,
        })
    }
}

fn check(code: HipError) -> RtResult<()> {
    Status(code).ok()
}

fn handle(value: u64) -> Handle {
    value as usize as Handle
}

fn raw(handle: Handle) -> u64 {
    handle as usize as u64
}

/// The native HIP runtime.
pub struct HipRuntime {
    api: HipApi,
    telemetry: Option<Box<dyn TelemetrySource>>,
}

impl std::fmt::Debug for HipRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HipRuntime")
            .field("device_properties", &self.api.get_device_properties.is_some())
            .field("param_info", &self.api.kernel_get_param_info.is_some())
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

impl HipRuntime {
    /// Load [`HIP_LIBRARY`] from the default search path.
    pub fn load() -> Result<Self, RuntimeLoadError> {
        Self::load_from(Path::new(HIP_LIBRARY))
    }

    pub fn load_from(path: &Path) -> Result<Self, RuntimeLoadError> {
        let api = HipApi::load(path)?;
        let mut runtime = Self {
            api,
            telemetry: None,
        };
        let devices = runtime.device_count().map_err(RuntimeLoadError::Init)?;
        info!(
            path = %path.display(),
            devices,
            param_info = runtime.api.kernel_get_param_info.is_some(),
            "HIP runtime loaded"
        );
        Ok(runtime)
    }

    /// Answer telemetry ops from `source`.
    pub fn with_telemetry(mut self, source: impl TelemetrySource + 'static) -> Self {
        self.telemetry = Some(Box::new(source));
        self
    }

    fn int_out(&self, f: FnIntOut) -> RtResult<i32> {
        let mut value: c_int = 0;
        // SAFETY: `f` writes one int through the pointer.
        check(unsafe { f(&mut value) })?;
        Ok(value)
    }

    fn handle_out(&self, f: impl FnOnce(*mut Handle) -> HipError) -> RtResult<u64> {
        let mut out: Handle = std::ptr::null_mut();
        check(f(&mut out))?;
        Ok(raw(out))
    }
}

impl GpuRuntime for HipRuntime {
    fn name(&self) -> &'static str {
        "hip"
    }

    fn device_count(&mut self) -> RtResult<i32> {
        self.int_out(self.api.get_device_count)
    }

    fn set_device(&mut self, device: i32) -> RtResult<()> {
        // SAFETY: plain value argument.
        check(unsafe { (self.api.set_device)(device) })
    }

    fn device(&mut self) -> RtResult<i32> {
        self.int_out(self.api.get_device)
    }

    fn device_properties(&mut self, device: i32) -> RtResult<DeviceProperties> {
        let get = self.api.get_device_properties.ok_or(Status::NOT_SUPPORTED)?;
        let mut props = HipDeviceProp::zeroed();
        // SAFETY: the buffer is at least as large as hipDeviceProp_tR0600.
        check(unsafe { get(&mut props, device) })?;
        Ok(DeviceProperties::from(&props))
    }

    fn device_attribute(&mut self, attribute: i32, device: i32) -> RtResult<i32> {
        let mut value: c_int = 0;
        // SAFETY: writes one int through the pointer.
        check(unsafe { (self.api.device_get_attribute)(&mut value, attribute, device) })?;
        Ok(value)
    }

    fn device_synchronize(&mut self) -> RtResult<()> {
        // SAFETY: no arguments.
        check(unsafe { (self.api.device_synchronize)() })
    }

    fn device_reset(&mut self) -> RtResult<()> {
        // SAFETY: no arguments.
        check(unsafe { (self.api.device_reset)() })
    }

    fn malloc(&mut self, size: u64) -> RtResult<u64> {
        let size = usize::try_from(size).map_err(|_| Status::OUT_OF_MEMORY)?;
        let malloc = self.api.malloc;
        // SAFETY: writes one pointer through `out`.
        self.handle_out(|out| unsafe { malloc(out, size) })
    }

    fn free(&mut self, ptr: u64) -> RtResult<()> {
        // SAFETY: the runtime validates the pointer.
        check(unsafe { (self.api.free)(handle(ptr)) })
    }

    fn mem_get_info(&mut self) -> RtResult<(u64, u64)> {
        let (mut free, mut total) = (0usize, 0usize);
        // SAFETY: writes two size_t values.
        check(unsafe { (self.api.mem_get_info)(&mut free, &mut total) })?;
        Ok((free as u64, total as u64))
    }

    fn memcpy_htod(&mut self, dst: u64, src: &[u8], stream: u64) -> RtResult<()> {
        let src_ptr = src.as_ptr().cast::<c_void>();
        // SAFETY: `src` outlives the copy: the stream is drained before
        // returning.
        unsafe {
            if stream == 0 {
                check((self.api.memcpy)(handle(dst), src_ptr, src.len(), MEMCPY_HOST_TO_DEVICE))
            } else {
                check((self.api.memcpy_async)(
                    handle(dst),
                    src_ptr,
                    src.len(),
                    MEMCPY_HOST_TO_DEVICE,
                    handle(stream),
                ))?;
                check((self.api.stream_synchronize)(handle(stream)))
            }
        }
    }

    fn memcpy_dtoh(&mut self, dst: &mut [u8], src: u64, stream: u64) -> RtResult<()> {
        let dst_ptr = dst.as_mut_ptr().cast::<c_void>();
        // SAFETY: as for `memcpy_htod`, with `dst` written before returning.
        unsafe {
            if stream == 0 {
                check((self.api.memcpy)(dst_ptr, handle(src), dst.len(), MEMCPY_DEVICE_TO_HOST))
            } else {
                check((self.api.memcpy_async)(
                    dst_ptr,
                    handle(src),
                    dst.len(),
                    MEMCPY_DEVICE_TO_HOST,
                    handle(stream),
                ))?;
                check((self.api.stream_synchronize)(handle(stream)))
            }
        }
    }

    fn memcpy_dtod(&mut self, dst: u64, src: u64, size: u64, stream: u64) -> RtResult<()> {
        let size = usize::try_from(size).map_err(|_| Status::INVALID_VALUE)?;
        // SAFETY: device-to-device copies touch no host memory.
        unsafe {
            if stream == 0 {
                check((self.api.memcpy)(handle(dst), handle(src), size, MEMCPY_DEVICE_TO_DEVICE))
            } else {
                check((self.api.memcpy_async)(
                    handle(dst),
                    handle(src),
                    size,
                    MEMCPY_DEVICE_TO_DEVICE,
                    handle(stream),
                ))
            }
        }
    }

    fn memset(&mut self, dst: u64, pattern: FillPattern, count: u64, stream: u64) -> RtResult<()> {
        let count = usize::try_from(count).map_err(|_| Status::INVALID_VALUE)?;
        let (dst, s) = (handle(dst), handle(stream));
        // SAFETY: device memory only.
        let code = unsafe {
            match (pattern, stream) {
                (FillPattern::U8(v), 0) => (self.api.memset_d8)(dst, v, count),
                (FillPattern::U16(v), 0) => (self.api.memset_d16)(dst, v, count),
                (FillPattern::U32(v), 0) => (self.api.memset_d32)(dst, v as c_int, count),
                (FillPattern::U8(v), _) => (self.api.memset_d8_async)(dst, v, count, s),
                (FillPattern::U16(v), _) => (self.api.memset_d16_async)(dst, v, count, s),
                (FillPattern::U32(v), _) => {
                    (self.api.memset_d32_async)(dst, v as c_int, count, s)
                }
            }
        };
        check(code)
    }

    fn stream_create(&mut self, flags: u32, priority: i32) -> RtResult<u64> {
        let create = self.api.stream_create;
        // SAFETY: writes one stream handle.
        self.handle_out(|out| unsafe { create(out, flags, priority) })
    }

    fn stream_destroy(&mut self, stream: u64) -> RtResult<()> {
        // SAFETY: the runtime validates the handle.
        check(unsafe { (self.api.stream_destroy)(handle(stream)) })
    }

    fn stream_synchronize(&mut self, stream: u64) -> RtResult<()> {
        // SAFETY: the runtime validates the handle.
        check(unsafe { (self.api.stream_synchronize)(handle(stream)) })
    }

    fn stream_query(&mut self, stream: u64) -> RtResult<()> {
        // SAFETY: the runtime validates the handle.
        check(unsafe { (self.api.stream_query)(handle(stream)) })
    }

    fn stream_wait_event(&mut self, stream: u64, event: u64, flags: u32) -> RtResult<()> {
        // SAFETY: the runtime validates both handles.
        check(unsafe { (self.api.stream_wait_event)(handle(stream), handle(event), flags) })
    }

    fn event_create(&mut self, flags: u32) -> RtResult<u64> {
        let create = self.api.event_create;
        // SAFETY: writes one event handle.
        self.handle_out(|out| unsafe { create(out, flags) })
    }

    fn event_destroy(&mut self, event: u64) -> RtResult<()> {
        // SAFETY: the runtime validates the handle.
        check(unsafe { (self.api.event_destroy)(handle(event)) })
    }

    fn event_record(&mut self, event: u64, stream: u64) -> RtResult<()> {
        // SAFETY: the runtime validates both handles.
        check(unsafe { (self.api.event_record)(handle(event), handle(stream)) })
    }

    fn event_synchronize(&mut self, event: u64) -> RtResult<()> {
        // SAFETY: the runtime validates the handle.
        check(unsafe { (self.api.event_synchronize)(handle(event)) })
    }

    fn event_query(&mut self, event: u64) -> RtResult<()> {
        // SAFETY: the runtime validates the handle.
        check(unsafe { (self.api.event_query)(handle(event)) })
    }

    fn event_elapsed_time(&mut self, start: u64, end: u64) -> RtResult<f32> {
        let mut ms = 0f32;
        // SAFETY: writes one float.
        check(unsafe { (self.api.event_elapsed_time)(&mut ms, handle(start), handle(end)) })?;
        Ok(ms)
    }

    fn module_load(&mut self, image: &[u8]) -> RtResult<u64> {
        // Code objects are parsed in place; give the loader 8-byte alignment.
        let mut aligned = vec![0u64; image.len().div_ceil(8)];
        // SAFETY: `aligned` spans at least `image.len()` bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(
                image.as_ptr(),
                aligned.as_mut_ptr().cast::<u8>(),
                image.len(),
            );
        }
        let load = self.api.module_load_data;
        // SAFETY: the image stays alive for the duration of the call.
        let module = self.handle_out(|out| unsafe { load(out, aligned.as_ptr().cast()) })?;
        debug!(module, size = image.len(), "HIP module loaded");
        Ok(module)
    }

    fn module_unload(&mut self, module: u64) -> RtResult<()> {
        // SAFETY: the runtime validates the handle.
        check(unsafe { (self.api.module_unload)(handle(module)) })
    }

    fn module_get_function(&mut self, module: u64, name: &str) -> RtResult<u64> {
        let name = CString::new(name).map_err(|_| Status::INVALID_VALUE)?;
        let get = self.api.module_get_function;
        // SAFETY: `name` is NUL-terminated and outlives the call.
        self.handle_out(|out| unsafe { get(out, handle(module), name.as_ptr()) })
    }

    fn kernel_param_layout(&mut self, function: u64) -> Option<Vec<ParamSlot>> {
        let get = self.api.kernel_get_param_info?;
        let mut slots = Vec::new();
        for index in 0..MAX_KERNEL_PARAMS {
            let (mut offset, mut size) = (0usize, 0usize);
            // SAFETY: writes two size_t values; out-of-range indices fail.
            let code = unsafe { get(handle(function), index, &mut offset, &mut size) };
            if code != 0 {
                break;
            }
            slots.push(ParamSlot::new(
                u32::try_from(offset).ok()?,
                u32::try_from(size).ok()?,
            ));
        }
        (!slots.is_empty()).then_some(slots)
    }

    fn launch(
        &mut self,
        function: u64,
        geometry: &LaunchGeometry,
        params: &[&[u8]],
    ) -> RtResult<()> {
        let mut pointers: Vec<*mut c_void> =
            params.iter().map(|p| p.as_ptr() as *mut c_void).collect();
        let [gx, gy, gz] = geometry.grid;
        let [bx, by, bz] = geometry.block;
        // SAFETY: every pointer addresses a parameter value that outlives
        // the call; the runtime copies them before returning.
        check(unsafe {
            (self.api.module_launch_kernel)(
                handle(function),
                gx,
                gy,
                gz,
                bx,
                by,
                bz,
                geometry.shared_mem_bytes,
                handle(geometry.stream),
                pointers.as_mut_ptr(),
                std::ptr::null_mut(),
            )
        })
    }

    fn launch_flat(
        &mut self,
        function: u64,
        geometry: &LaunchGeometry,
        args: &[u8],
    ) -> RtResult<()> {
        let mut size = args.len();
        let mut extra: [*mut c_void; 5] = [
            LAUNCH_PARAM_BUFFER_POINTER as *mut c_void,
            args.as_ptr() as *mut c_void,
            LAUNCH_PARAM_BUFFER_SIZE as *mut c_void,
            (&mut size as *mut usize).cast(),
            LAUNCH_PARAM_END as *mut c_void,
        ];
        let [gx, gy, gz] = geometry.grid;
        let [bx, by, bz] = geometry.block;
        // SAFETY: `extra` follows the HIP_LAUNCH_PARAM_* protocol and all
        // referenced memory outlives the call.
        check(unsafe {
            (self.api.module_launch_kernel)(
                handle(function),
                gx,
                gy,
                gz,
                bx,
                by,
                bz,
                geometry.shared_mem_bytes,
                handle(geometry.stream),
                std::ptr::null_mut(),
                extra.as_mut_ptr(),
            )
        })
    }

    fn runtime_version(&mut self) -> RtResult<i32> {
        self.int_out(self.api.runtime_get_version)
    }

    fn driver_version(&mut self) -> RtResult<i32> {
        self.int_out(self.api.driver_get_version)
    }

    fn get_last_error(&mut self) -> Status {
        // SAFETY: no arguments.
        Status(unsafe { (self.api.get_last_error)() })
    }

    fn peek_last_error(&mut self) -> Status {
        // SAFETY: no arguments.
        Status(unsafe { (self.api.peek_at_last_error)() })
    }

    fn telemetry(&mut self) -> Option<&mut dyn TelemetrySource> {
        match self.telemetry.as_mut() {
            Some(source) => Some(source.as_mut()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_reported_with_path() {
        let err = HipRuntime::load_from(Path::new("/nonexistent/libamdhip64.so")).unwrap_err();
        match err {
            RuntimeLoadError::Library { path, .. } => {
                assert_eq!(path, Path::new("/nonexistent/libamdhip64.so"));
            }
            other => panic!("expected library error, got {other:?}"),
        }
    }
}
