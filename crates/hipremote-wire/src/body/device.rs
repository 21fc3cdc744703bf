use bytes::{Buf, BufMut, BytesMut};

use super::{get_fixed_str, put_fixed_str, WireBody};

wire_body! {
    /// `SET_DEVICE`, `GET_DEVICE_PROPERTIES`.
    pub struct DeviceRequest {
        pub device: i32,
    }
}

wire_body! {
    /// `DEVICE_GET_ATTRIBUTE`.
    pub struct DeviceAttributeRequest {
        pub attribute: i32,
        pub device: i32,
    }
}

wire_body! {
    /// Single `i32` result: device count, current device, attribute value,
    /// runtime/driver version, or an error code argument.
    pub struct IntValue {
        pub value: i32,
    }
}

const NAME_LEN: usize = 256;
const ARCH_NAME_LEN: usize = 256;

/// `GET_DEVICE_PROPERTIES` response: the subset of `hipDeviceProp_t` that
/// remote callers rely on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceProperties {
    pub name: String,
    pub total_global_mem: u64,
    pub shared_mem_per_block: u64,
    pub regs_per_block: i32,
    pub warp_size: i32,
    pub max_threads_per_block: i32,
    pub max_threads_dim: [i32; 3],
    pub max_grid_size: [i32; 3],
    pub clock_rate: i32,
    pub memory_clock_rate: i32,
    pub memory_bus_width: i32,
    pub major: i32,
    pub minor: i32,
    pub multi_processor_count: i32,
    pub l2_cache_size: i32,
    pub max_threads_per_multi_processor: i32,
    pub compute_mode: i32,
    pub pci_bus_id: i32,
    pub pci_device_id: i32,
    pub pci_domain_id: i32,
    pub integrated: i32,
    pub can_map_host_memory: i32,
    pub concurrent_kernels: i32,
    pub gcn_arch_name: String,
}

impl WireBody for DeviceProperties {
    const NAME: &'static str = "DeviceProperties";
    const SIZE: usize = NAME_LEN + 8 + 8 + 4 * 24 + ARCH_NAME_LEN;

    fn put(&self, dst: &mut BytesMut) {
        put_fixed_str(dst, &self.name, NAME_LEN);
        dst.put_u64_le(self.total_global_mem);
        dst.put_u64_le(self.shared_mem_per_block);
        dst.put_i32_le(self.regs_per_block);
        dst.put_i32_le(self.warp_size);
        dst.put_i32_le(self.max_threads_per_block);
        for v in self.max_threads_dim {
            dst.put_i32_le(v);
        }
        for v in self.max_grid_size {
            dst.put_i32_le(v);
        }
        for v in [
            self.clock_rate,
            self.memory_clock_rate,
            self.memory_bus_width,
            self.major,
            self.minor,
            self.multi_processor_count,
            self.l2_cache_size,
            self.max_threads_per_multi_processor,
            self.compute_mode,
            self.pci_bus_id,
            self.pci_device_id,
            self.pci_domain_id,
            self.integrated,
            self.can_map_host_memory,
            self.concurrent_kernels,
        ] {
            dst.put_i32_le(v);
        }
        put_fixed_str(dst, &self.gcn_arch_name, ARCH_NAME_LEN);
    }

    fn get(src: &mut &[u8]) -> Self {
        let name = get_fixed_str(src, NAME_LEN);
        let total_global_mem = src.get_u64_le();
        let shared_mem_per_block = src.get_u64_le();
        let regs_per_block = src.get_i32_le();
        let warp_size = src.get_i32_le();
        let max_threads_per_block = src.get_i32_le();
        let max_threads_dim = [src.get_i32_le(), src.get_i32_le(), src.get_i32_le()];
        let max_grid_size = [src.get_i32_le(), src.get_i32_le(), src.get_i32_le()];
        Self {
            name,
            total_global_mem,
            shared_mem_per_block,
            regs_per_block,
            warp_size,
            max_threads_per_block,
            max_threads_dim,
            max_grid_size,
            clock_rate: src.get_i32_le(),
            memory_clock_rate: src.get_i32_le(),
            memory_bus_width: src.get_i32_le(),
            major: src.get_i32_le(),
            minor: src.get_i32_le(),
            multi_processor_count: src.get_i32_le(),
            l2_cache_size: src.get_i32_le(),
            max_threads_per_multi_processor: src.get_i32_le(),
            compute_mode: src.get_i32_le(),
            pci_bus_id: src.get_i32_le(),
            pci_device_id: src.get_i32_le(),
            pci_domain_id: src.get_i32_le(),
            integrated: src.get_i32_le(),
            can_map_host_memory: src.get_i32_le(),
            concurrent_kernels: src.get_i32_le(),
            gcn_arch_name: get_fixed_str(src, ARCH_NAME_LEN),
        }
    }
}
