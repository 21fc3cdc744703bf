//! Module and launch exports.
//!
//! Launch arguments are flattened here into one buffer following the
//! worker-reported parameter layout of each function. Layouts are fetched
//! once per function and dropped with their module.

use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_uint};
use std::sync::{Mutex, MutexGuard, OnceLock};

use hipremote_client::{
    Client, ClientError, Function, LaunchDims, Module, ParamSlot, Result, Status, Stream,
};
use tracing::debug;

use crate::device::store;
use crate::error::invalid;
use crate::image::{image_size, RawImage};
use crate::types::{
    handle, hipError_t, raw, Dim3, HipHandle, HIP_LAUNCH_PARAM_BUFFER_POINTER,
    HIP_LAUNCH_PARAM_BUFFER_SIZE, HIP_LAUNCH_PARAM_END,
};
use crate::{api_call, client};

/// Argument count cap for functions launched without a layout.
const LEGACY_MAX_ARGS: usize = 64;
const LEGACY_ARG_SIZE: usize = 8;

#[derive(Debug, Default)]
struct LayoutCache {
    layouts: HashMap<u64, Option<Vec<ParamSlot>>>,
    owners: HashMap<u64, u64>,
}

fn layouts() -> MutexGuard<'static, LayoutCache> {
    static CACHE: OnceLock<Mutex<LayoutCache>> = OnceLock::new();
    CACHE
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fetch_layout(client: &Client, function: Function) -> Option<Vec<ParamSlot>> {
    match client.function_param_layout(function) {
        Ok(layout) => Some(layout),
        Err(ClientError::Api(Status::NOT_SUPPORTED)) => None,
        Err(err) => {
            debug!(function = function.raw(), error = %err, "no parameter layout");
            None
        }
    }
}

fn load(module: *mut HipHandle, image: *const c_void) -> Result<()> {
    if module.is_null() || image.is_null() {
        return Err(invalid("null module or image pointer"));
    }
    let source = RawImage(image.cast());
    let size = image_size(&source)?;
    // SAFETY: the header says the image spans `size` bytes.
    let bytes = unsafe { std::slice::from_raw_parts(source.0, size) };
    let loaded = client()?.module_load_data(bytes)?;
    debug!(module = loaded.raw(), size, "module loaded");
    // SAFETY: checked non-null; caller provides a writable slot.
    unsafe { store(module, handle(loaded.raw())) }
}

/// # Safety
///
/// `module` must be null or writable; `image` must be null or point to a
/// complete ELF64 code object or clang offload bundle.
#[no_mangle]
pub unsafe extern "C" fn hipModuleLoadData(
    module: *mut HipHandle,
    image: *const c_void,
) -> hipError_t {
    api_call("hipModuleLoadData", || load(module, image))
}

/// JIT options are not forwarded.
///
/// # Safety
///
/// Same as [`hipModuleLoadData`].
#[no_mangle]
pub unsafe extern "C" fn hipModuleLoadDataEx(
    module: *mut HipHandle,
    image: *const c_void,
    _num_options: c_uint,
    _options: *mut c_void,
    _option_values: *mut *mut c_void,
) -> hipError_t {
    api_call("hipModuleLoadDataEx", || load(module, image))
}

#[no_mangle]
pub extern "C" fn hipModuleUnload(module: HipHandle) -> hipError_t {
    api_call("hipModuleUnload", || {
        let module = raw(module);
        client()?.module_unload(Module(module))?;
        let mut cache = layouts();
        let LayoutCache { layouts, owners } = &mut *cache;
        owners.retain(|function, owner| {
            let keep = *owner != module;
            if !keep {
                layouts.remove(function);
            }
            keep
        });
        Ok(())
    })
}

/// # Safety
///
/// `function` must be null or writable; `name` must be null or a
/// nul-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hipModuleGetFunction(
    function: *mut HipHandle,
    module: HipHandle,
    name: *const c_char,
) -> hipError_t {
    api_call("hipModuleGetFunction", || {
        if function.is_null() || name.is_null() {
            return Err(invalid("null function or name pointer"));
        }
        // SAFETY: non-null and nul-terminated per contract.
        let name = unsafe { CStr::from_ptr(name) }
            .to_str()
            .map_err(|_| invalid("kernel name is not UTF-8"))?;

        let client = client()?;
        let resolved = client.module_get_function(Module(raw(module)), name)?;
        let layout = fetch_layout(client, resolved);
        debug!(name, function = resolved.raw(), params = ?layout.as_ref().map(Vec::len), "function resolved");

        let mut cache = layouts();
        cache.owners.insert(resolved.raw(), raw(module));
        cache.layouts.insert(resolved.raw(), layout);
        drop(cache);

        // SAFETY: checked non-null above.
        unsafe { store(function, handle(resolved.raw())) }
    })
}

/// Flatten `kernelParams` (one pointer per argument) by `layout`.
///
/// # Safety
///
/// `params` must hold `layout.len()` pointers, each readable for its
/// slot's size.
unsafe fn flatten_by_layout(layout: &[ParamSlot], params: *const *const c_void) -> Result<Vec<u8>> {
    let mut len = 0usize;
    for slot in layout {
        len = len.max(slot.end().ok_or_else(|| invalid("parameter layout overflows"))?);
    }
    let mut buffer = vec![0u8; len];
    for (index, slot) in layout.iter().enumerate() {
        // SAFETY: `params` has one entry per slot.
        let arg = unsafe { *params.add(index) };
        if arg.is_null() {
            return Err(invalid("null kernel argument"));
        }
        let start = slot.offset as usize;
        let size = slot.size as usize;
        // SAFETY: `arg` readable for the slot's size per contract.
        let bytes = unsafe { std::slice::from_raw_parts(arg.cast::<u8>(), size) };
        buffer[start..start + size].copy_from_slice(bytes);
    }
    Ok(buffer)
}

/// Flatten a null-terminated `kernelParams` array of 8-byte arguments.
///
/// # Safety
///
/// Every pointer up to the terminator (or the first `LEGACY_MAX_ARGS`)
/// must be readable for eight bytes.
unsafe fn flatten_legacy(params: *const *const c_void) -> Vec<u8> {
    let mut buffer = Vec::new();
    for index in 0..LEGACY_MAX_ARGS {
        // SAFETY: entries up to the terminator exist per contract.
        let arg = unsafe { *params.add(index) };
        if arg.is_null() {
            break;
        }
        // SAFETY: readable for eight bytes per contract.
        let bytes = unsafe { std::slice::from_raw_parts(arg.cast::<u8>(), LEGACY_ARG_SIZE) };
        buffer.extend_from_slice(bytes);
    }
    buffer
}

/// Argument buffer from an `extra` array of marker/value pairs.
///
/// # Safety
///
/// `extra` must be terminated by `HIP_LAUNCH_PARAM_END`; the size entry
/// must point to a `size_t` and the buffer be readable for that many bytes.
unsafe fn flatten_extra(extra: *const *const c_void) -> Result<Vec<u8>> {
    let mut buffer: *const u8 = std::ptr::null();
    let mut size: Option<usize> = None;
    let mut index = 0;
    loop {
        // SAFETY: entries up to the end marker exist per contract.
        let marker = unsafe { *extra.add(index) } as usize;
        match marker {
            HIP_LAUNCH_PARAM_END => break,
            HIP_LAUNCH_PARAM_BUFFER_POINTER => {
                // SAFETY: a value follows every marker.
                buffer = unsafe { *extra.add(index + 1) }.cast();
            }
            HIP_LAUNCH_PARAM_BUFFER_SIZE => {
                // SAFETY: a value follows every marker.
                let ptr = unsafe { *extra.add(index + 1) }.cast::<usize>();
                if ptr.is_null() {
                    return Err(invalid("null launch buffer size"));
                }
                // SAFETY: points to a size_t per contract.
                size = Some(unsafe { ptr.read_unaligned() });
            }
            _ => return Err(invalid("unknown launch extra marker")),
        }
        index += 2;
    }

    match (buffer.is_null(), size) {
        (_, Some(0)) | (_, None) => Ok(Vec::new()),
        (true, Some(_)) => Err(invalid("launch buffer size without pointer")),
        // SAFETY: readable for `len` bytes per contract.
        (false, Some(len)) => Ok(unsafe { std::slice::from_raw_parts(buffer, len) }.to_vec()),
    }
}

/// # Safety
///
/// Exactly one of `kernel_params` and `extra` may be non-null, laid out as
/// the native runtime expects.
#[no_mangle]
pub unsafe extern "C" fn hipModuleLaunchKernel(
    function: HipHandle,
    grid_x: c_uint,
    grid_y: c_uint,
    grid_z: c_uint,
    block_x: c_uint,
    block_y: c_uint,
    block_z: c_uint,
    shared_mem_bytes: c_uint,
    stream: HipHandle,
    kernel_params: *mut *mut c_void,
    extra: *mut *mut c_void,
) -> hipError_t {
    api_call("hipModuleLaunchKernel", || {
        if !kernel_params.is_null() && !extra.is_null() {
            return Err(invalid("both kernelParams and extra given"));
        }
        let client = client()?;
        let function = Function(raw(function));
        let args = match (kernel_params.is_null(), extra.is_null()) {
            (false, false) | (true, true) => Vec::new(),
            // SAFETY: forwarded caller contract.
            (true, false) => unsafe { flatten_extra(extra.cast_const().cast())? },
            (false, true) => {
                let layout = {
                    let cached = layouts().layouts.get(&function.raw()).cloned();
                    match cached {
                        Some(layout) => layout,
                        None => {
                            let fetched = fetch_layout(client, function);
                            layouts().layouts.insert(function.raw(), fetched.clone());
                            fetched
                        }
                    }
                };
                let params: *const *const c_void = kernel_params.cast_const().cast();
                match layout {
                    // SAFETY: forwarded caller contract.
                    Some(layout) => unsafe { flatten_by_layout(&layout, params)? },
                    // SAFETY: forwarded caller contract.
                    None => unsafe { flatten_legacy(params) },
                }
            }
        };

        let dims = LaunchDims {
            grid: [grid_x, grid_y, grid_z],
            block: [block_x, block_y, block_z],
            shared_mem_bytes,
        };
        client.launch_kernel(function, dims, Stream(raw(stream)), &args)
    })
}

/// Host-stub launches need the fat binary registration this library does
/// not intercept.
#[no_mangle]
pub extern "C" fn hipLaunchKernel(
    _function_address: *const c_void,
    _grid: Dim3,
    _block: Dim3,
    _args: *mut *mut c_void,
    _shared_mem_bytes: usize,
    _stream: HipHandle,
) -> hipError_t {
    api_call("hipLaunchKernel", || Err(ClientError::Api(Status::NOT_SUPPORTED)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr<T>(value: &T) -> *const c_void {
        (value as *const T).cast()
    }

    #[test]
    fn kernel_params_flatten_into_layout() {
        let out = 0x7f00_0000_1000u64;
        let n = 7u32;
        let scale = 2.5f32;
        let params = [ptr(&out), ptr(&n), ptr(&scale)];
        let layout = [ParamSlot::new(0, 8), ParamSlot::new(8, 4), ParamSlot::new(16, 4)];

        let buffer = unsafe { flatten_by_layout(&layout, params.as_ptr()) }.unwrap();
        assert_eq!(buffer.len(), 20);
        assert_eq!(&buffer[0..8], &out.to_le_bytes());
        assert_eq!(&buffer[8..12], &n.to_le_bytes());
        assert_eq!(&buffer[12..16], &[0; 4]);
        assert_eq!(&buffer[16..20], &scale.to_le_bytes());
    }

    #[test]
    fn null_argument_is_rejected() {
        let params = [std::ptr::null::<c_void>()];
        let err = unsafe { flatten_by_layout(&[ParamSlot::new(0, 8)], params.as_ptr()) };
        assert_eq!(err.unwrap_err().status(), Status::INVALID_VALUE);
    }

    #[test]
    fn legacy_params_stop_at_terminator() {
        let a = 1u64;
        let b = 2u64;
        let params = [ptr(&a), ptr(&b), std::ptr::null()];
        let buffer = unsafe { flatten_legacy(params.as_ptr()) };
        assert_eq!(buffer.len(), 16);
        assert_eq!(&buffer[8..], &2u64.to_le_bytes());
    }

    #[test]
    fn extra_buffer_is_copied_verbatim() {
        let args = [9u8, 8, 7, 6, 5, 4];
        let size = args.len();
        let extra = [
            HIP_LAUNCH_PARAM_BUFFER_POINTER as *const c_void,
            args.as_ptr().cast(),
            HIP_LAUNCH_PARAM_BUFFER_SIZE as *const c_void,
            ptr(&size),
            HIP_LAUNCH_PARAM_END as *const c_void,
        ];
        let buffer = unsafe { flatten_extra(extra.as_ptr()) }.unwrap();
        assert_eq!(buffer, args);
    }

    #[test]
    fn both_argument_forms_are_rejected() {
        let mut slot: *mut c_void = std::ptr::null_mut();
        let args: *mut *mut c_void = &mut slot;
        let code = unsafe {
            hipModuleLaunchKernel(
                std::ptr::null_mut(),
                1,
                1,
                1,
                1,
                1,
                1,
                0,
                std::ptr::null_mut(),
                args,
                args,
            )
        };
        assert_eq!(code, Status::INVALID_VALUE.code());
    }

    #[test]
    fn host_stub_launch_is_not_supported() {
        let dim = Dim3 { x: 1, y: 1, z: 1 };
        let code = hipLaunchKernel(std::ptr::null(), dim, dim, std::ptr::null_mut(), 0, std::ptr::null_mut());
        assert_eq!(code, Status::NOT_SUPPORTED.code());
    }
}
