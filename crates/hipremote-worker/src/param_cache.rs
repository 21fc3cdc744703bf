//! Per-function kernel parameter layouts.
//!
//! Launches arrive as one flat argument buffer. When the runtime knows where
//! each formal parameter lives in that buffer, the worker slices it and
//! launches with one pointer per parameter; otherwise the buffer is handed to
//! the runtime opaquely.

use std::collections::HashMap;
use std::sync::Arc;

use hipremote_wire::ParamSlot;
use thiserror::Error;

use crate::runtime::GpuRuntime;

/// A layout that does not fit the argument buffer it is applied to.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("parameter {index} at offset {offset} size {size} exceeds {len}-byte argument buffer")]
    OutOfBounds {
        index: usize,
        offset: u32,
        size: u32,
        len: usize,
    },

    #[error("parameter {index} offset + size overflows")]
    Overflow { index: usize },
}

/// Layouts keyed by function handle.
///
/// A lookup miss asks the runtime once; "no metadata" is cached too so the
/// runtime is not asked again for the same function.
#[derive(Debug, Default)]
pub struct KernelParamCache {
    layouts: HashMap<u64, Option<Arc<[ParamSlot]>>>,
    owners: HashMap<u64, u64>,
}

impl KernelParamCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `function` belongs to `module`.
    pub fn register(&mut self, module: u64, function: u64) {
        self.owners.insert(function, module);
    }

    /// Cached layout of `function`, fetched from `runtime` on first use.
    pub fn layout(&mut self, runtime: &mut dyn GpuRuntime, function: u64) -> Option<Arc<[ParamSlot]>> {
        self.layouts
            .entry(function)
            .or_insert_with(|| runtime.kernel_param_layout(function).map(Arc::from))
            .clone()
    }

    /// Drop every layout of functions resolved from `module`.
    ///
    /// Layouts with no known owner go too: their function may have belonged
    /// to `module`, and its handle can be reused by a later load.
    pub fn forget_module(&mut self, module: u64) {
        self.owners.retain(|_, owner| *owner != module);
        let owners = &self.owners;
        self.layouts.retain(|function, _| owners.contains_key(function));
    }

    pub fn clear(&mut self) {
        self.layouts.clear();
        self.owners.clear();
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

/// Slice `args` into one range per parameter of `layout`.
pub fn slice_params<'a>(layout: &[ParamSlot], args: &'a [u8]) -> Result<Vec<&'a [u8]>, LayoutError> {
    layout
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let end = slot.end().ok_or(LayoutError::Overflow { index })?;
            if end > args.len() {
                return Err(LayoutError::OutOfBounds {
                    index,
                    offset: slot.offset,
                    size: slot.size,
                    len: args.len(),
                });
            }
            Ok(&args[slot.offset as usize..end])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use hipremote_wire::{DevicePtr, KernelArgs};

    use super::*;
    use crate::runtime::{HostKernel, HostRuntime};

    #[test]
    fn test_slices_match_builder_layout() {
        let mut args = KernelArgs::new();
        args.push(DevicePtr(0x7f00_0000_1000))
            .push(7u32)
            .push(DevicePtr(0x7f00_0000_2000))
            .push(2.5f32);

        let params = slice_params(args.layout(), args.as_bytes()).unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(params[0], &0x7f00_0000_1000u64.to_le_bytes());
        assert_eq!(params[1], &7u32.to_le_bytes());
        assert_eq!(params[2], &0x7f00_0000_2000u64.to_le_bytes());
        assert_eq!(params[3], &2.5f32.to_le_bytes());
    }

    #[test]
    fn test_out_of_range_metadata_is_rejected() {
        let layout = [ParamSlot::new(0, 8), ParamSlot::new(8, 8)];
        let err = slice_params(&layout, &[0u8; 12]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::OutOfBounds {
                index: 1,
                offset: 8,
                size: 8,
                len: 12
            }
        );
    }

    #[test]
    fn test_overflowing_metadata_is_rejected() {
        let layout = [ParamSlot::new(u32::MAX, u32::MAX)];
        let err = slice_params(&layout, &[0u8; 16]);
        if usize::BITS == 32 {
            assert_eq!(err.unwrap_err(), LayoutError::Overflow { index: 0 });
        } else {
            assert!(matches!(err, Err(LayoutError::OutOfBounds { index: 0, .. })));
        }
    }

    #[test]
    fn test_empty_layout_takes_nothing() {
        assert!(slice_params(&[], b"ignored").unwrap().is_empty());
    }

    #[test]
    fn test_cache_fetches_once_and_forgets_with_module() {
        let mut runtime = HostRuntime::new();
        runtime.register_kernel(
            "k",
            HostKernel::new(|_, _, _| Ok(())).with_layout(vec![ParamSlot::new(0, 4)]),
        );
        runtime.register_kernel("legacy", HostKernel::new(|_, _, _| Ok(())));
        let module = runtime.module_load(b"image").unwrap();
        let with_layout = runtime.module_get_function(module, "k").unwrap();
        let without = runtime.module_get_function(module, "legacy").unwrap();

        let mut cache = KernelParamCache::new();
        cache.register(module, with_layout);
        cache.register(module, without);

        let layout = cache.layout(&mut runtime, with_layout).unwrap();
        assert_eq!(&layout[..], &[ParamSlot::new(0, 4)]);
        assert!(cache.layout(&mut runtime, without).is_none());
        assert_eq!(cache.len(), 2);

        cache.forget_module(module);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unowned_layout_is_dropped_on_unload() {
        let mut runtime = HostRuntime::new();
        runtime.register_kernel(
            "k",
            HostKernel::new(|_, _, _| Ok(())).with_layout(vec![ParamSlot::new(0, 8)]),
        );
        let first = runtime.module_load(b"first").unwrap();
        let second = runtime.module_load(b"second").unwrap();
        let kept = runtime.module_get_function(second, "k").unwrap();
        let stray = runtime.module_get_function(first, "k").unwrap();

        let mut cache = KernelParamCache::new();
        cache.register(second, kept);
        assert!(cache.layout(&mut runtime, kept).is_some());
        // Looked up by handle alone, never resolved through this cache.
        assert!(cache.layout(&mut runtime, stray).is_some());
        assert_eq!(cache.len(), 2);

        cache.forget_module(first);
        assert_eq!(cache.len(), 1);
        assert!(cache.layout(&mut runtime, kept).is_some());
        assert_eq!(cache.len(), 1);
    }
}
