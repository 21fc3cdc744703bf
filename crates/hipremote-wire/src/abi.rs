//! Native structs shared by the worker and the interception library.
//!
//! These mirror the HIP C headers, not the wire format: they are read from
//! or written to caller memory as-is.

use std::ffi::{c_int, c_uint};

use crate::body::DeviceProperties;

/// `hipDeviceProp_tR0600`.
///
/// Only the named fields are meaningful here; the padding fields keep the
/// offsets of the native layout and the tail absorbs fields added after
/// `gcnArchName`.
#[repr(C)]
#[derive(Clone)]
pub struct HipDeviceProp {
    pub name: [u8; 256],
    _uuid_luid: [u8; 24],
    _luid_device_node_mask: c_uint,
    pub total_global_mem: usize,
    pub shared_mem_per_block: usize,
    pub regs_per_block: c_int,
    pub warp_size: c_int,
    _mem_pitch: usize,
    pub max_threads_per_block: c_int,
    pub max_threads_dim: [c_int; 3],
    pub max_grid_size: [c_int; 3],
    pub clock_rate: c_int,
    _total_const_mem: usize,
    pub major: c_int,
    pub minor: c_int,
    _texture_alignment: [usize; 2],
    _device_overlap: c_int,
    pub multi_processor_count: c_int,
    _kernel_exec_timeout_enabled: c_int,
    pub integrated: c_int,
    pub can_map_host_memory: c_int,
    pub compute_mode: c_int,
    _texture_surface_limits: [c_int; 40],
    _surface_alignment: usize,
    pub concurrent_kernels: c_int,
    _ecc_enabled: c_int,
    pub pci_bus_id: c_int,
    pub pci_device_id: c_int,
    pub pci_domain_id: c_int,
    _tcc_async_unified: [c_int; 3],
    pub memory_clock_rate: c_int,
    pub memory_bus_width: c_int,
    pub l2_cache_size: c_int,
    _persisting_l2_cache_max_size: c_int,
    pub max_threads_per_multi_processor: c_int,
    _cache_support: [c_int; 3],
    _shared_mem_per_multiprocessor: usize,
    _capabilities: [c_int; 12],
    _shared_mem_per_block_optin: usize,
    _managed_access: [c_int; 4],
    _reserved_shared_mem_per_block: usize,
    _interop_support: [c_int; 13],
    _reserved: [c_int; 63],
    _hip_reserved: [c_int; 32],
    pub gcn_arch_name: [u8; 256],
    _tail: [u8; 512],
}

impl HipDeviceProp {
    /// All fields zero.
    pub fn zeroed() -> Self {
        Self {
            name: [0; 256],
            _uuid_luid: [0; 24],
            _luid_device_node_mask: 0,
            total_global_mem: 0,
            shared_mem_per_block: 0,
            regs_per_block: 0,
            warp_size: 0,
            _mem_pitch: 0,
            max_threads_per_block: 0,
            max_threads_dim: [0; 3],
            max_grid_size: [0; 3],
            clock_rate: 0,
            _total_const_mem: 0,
            major: 0,
            minor: 0,
            _texture_alignment: [0; 2],
            _device_overlap: 0,
            multi_processor_count: 0,
            _kernel_exec_timeout_enabled: 0,
            integrated: 0,
            can_map_host_memory: 0,
            compute_mode: 0,
            _texture_surface_limits: [0; 40],
            _surface_alignment: 0,
            concurrent_kernels: 0,
            _ecc_enabled: 0,
            pci_bus_id: 0,
            pci_device_id: 0,
            pci_domain_id: 0,
            _tcc_async_unified: [0; 3],
            memory_clock_rate: 0,
            memory_bus_width: 0,
            l2_cache_size: 0,
            _persisting_l2_cache_max_size: 0,
            max_threads_per_multi_processor: 0,
            _cache_support: [0; 3],
            _shared_mem_per_multiprocessor: 0,
            _capabilities: [0; 12],
            _shared_mem_per_block_optin: 0,
            _managed_access: [0; 4],
            _reserved_shared_mem_per_block: 0,
            _interop_support: [0; 13],
            _reserved: [0; 63],
            _hip_reserved: [0; 32],
            gcn_arch_name: [0; 256],
            _tail: [0; 512],
        }
    }
}

/// Bytes of a NUL-terminated fixed buffer, lossily decoded.
pub fn c_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Copy `value` into `dst`, truncated to leave room for the NUL.
fn put_c_str(dst: &mut [u8], value: &str) {
    let len = value.len().min(dst.len().saturating_sub(1));
    dst[..len].copy_from_slice(&value.as_bytes()[..len]);
    dst[len..].fill(0);
}

impl From<&HipDeviceProp> for DeviceProperties {
    fn from(raw: &HipDeviceProp) -> Self {
        DeviceProperties {
            name: c_str(&raw.name),
            total_global_mem: raw.total_global_mem as u64,
            shared_mem_per_block: raw.shared_mem_per_block as u64,
            regs_per_block: raw.regs_per_block,
            warp_size: raw.warp_size,
            max_threads_per_block: raw.max_threads_per_block,
            max_threads_dim: raw.max_threads_dim,
            max_grid_size: raw.max_grid_size,
            clock_rate: raw.clock_rate,
            memory_clock_rate: raw.memory_clock_rate,
            memory_bus_width: raw.memory_bus_width,
            major: raw.major,
            minor: raw.minor,
            multi_processor_count: raw.multi_processor_count,
            l2_cache_size: raw.l2_cache_size,
            max_threads_per_multi_processor: raw.max_threads_per_multi_processor,
            compute_mode: raw.compute_mode,
            pci_bus_id: raw.pci_bus_id,
            pci_device_id: raw.pci_device_id,
            pci_domain_id: raw.pci_domain_id,
            integrated: raw.integrated,
            can_map_host_memory: raw.can_map_host_memory,
            concurrent_kernels: raw.concurrent_kernels,
            gcn_arch_name: c_str(&raw.gcn_arch_name),
        }
    }
}

impl From<&DeviceProperties> for HipDeviceProp {
    fn from(props: &DeviceProperties) -> Self {
        let mut raw = HipDeviceProp::zeroed();
        put_c_str(&mut raw.name, &props.name);
        raw.total_global_mem = props.total_global_mem as usize;
        raw.shared_mem_per_block = props.shared_mem_per_block as usize;
        raw.regs_per_block = props.regs_per_block;
        raw.warp_size = props.warp_size;
        raw.max_threads_per_block = props.max_threads_per_block;
        raw.max_threads_dim = props.max_threads_dim;
        raw.max_grid_size = props.max_grid_size;
        raw.clock_rate = props.clock_rate;
        raw.memory_clock_rate = props.memory_clock_rate;
        raw.memory_bus_width = props.memory_bus_width;
        raw.major = props.major;
        raw.minor = props.minor;
        raw.multi_processor_count = props.multi_processor_count;
        raw.l2_cache_size = props.l2_cache_size;
        raw.max_threads_per_multi_processor = props.max_threads_per_multi_processor;
        raw.compute_mode = props.compute_mode;
        raw.pci_bus_id = props.pci_bus_id;
        raw.pci_device_id = props.pci_device_id;
        raw.pci_domain_id = props.pci_domain_id;
        raw.integrated = props.integrated;
        raw.can_map_host_memory = props.can_map_host_memory;
        raw.concurrent_kernels = props.concurrent_kernels;
        put_c_str(&mut raw.gcn_arch_name, &props.gcn_arch_name);
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_field_offsets_match_native_layout() {
        assert_eq!(std::mem::offset_of!(HipDeviceProp, total_global_mem), 288);
        assert_eq!(std::mem::offset_of!(HipDeviceProp, gcn_arch_name) % 4, 0);
    }

    #[test]
    fn test_c_str_stops_at_nul() {
        assert_eq!(c_str(b"gfx90a\0junk"), "gfx90a");
        assert_eq!(c_str(b"full"), "full");
    }

    #[test]
    fn test_long_names_are_truncated_with_nul() {
        let props = DeviceProperties {
            name: "x".repeat(300),
            gcn_arch_name: "gfx942:sramecc+:xnack-".to_string(),
            total_global_mem: 1 << 34,
            ..DeviceProperties::default()
        };
        let raw = HipDeviceProp::from(&props);
        assert_eq!(raw.name[255], 0);
        assert_eq!(c_str(&raw.name).len(), 255);

        let back = DeviceProperties::from(&raw);
        assert_eq!(back.gcn_arch_name, props.gcn_arch_name);
        assert_eq!(back.total_global_mem, 1 << 34);
    }
}
