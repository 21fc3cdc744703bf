//! Host-memory emulation of the GPU runtime.
//!
//! Device memory is ordinary heap memory behind fake device addresses, work
//! completes synchronously on submission, and kernels are Rust closures
//! registered by name. Useful for developing against the protocol without an
//! accelerator, and for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use hipremote_wire::body::{
    AsicInfo, ClockInfo, DeviceProperties, GpuActivity, GpuMetrics, PowerInfo, VramUsage,
};
use hipremote_wire::{ParamSlot, SmiStatus, Status};
use tracing::debug;

use super::{FillPattern, GpuRuntime, LaunchGeometry, RtResult};
use crate::telemetry::{SmiResult, TelemetrySource};

/// Reported by `hipRuntimeGetVersion`/`hipDriverGetVersion`.
pub const HOST_RUNTIME_VERSION: i32 = 60_300_000;

const BASE_ADDRESS: u64 = 0x7f00_0000_0000;
const ALLOC_ALIGN: u64 = 256;
const DEFAULT_CAPACITY: u64 = 16 << 30;

type KernelFn = dyn Fn(&mut HostMemory, &LaunchGeometry, &[&[u8]]) -> RtResult<()> + Send;

/// A kernel implemented on the host.
///
/// The closure receives the emulated device memory, the launch geometry and
/// the arguments: one range per parameter when the kernel has a layout,
/// otherwise a single range holding the whole flat buffer.
pub struct HostKernel {
    layout: Option<Vec<ParamSlot>>,
    body: Box<KernelFn>,
}

impl HostKernel {
    pub fn new(
        body: impl Fn(&mut HostMemory, &LaunchGeometry, &[&[u8]]) -> RtResult<()> + Send + 'static,
    ) -> Self {
        Self {
            layout: None,
            body: Box::new(body),
        }
    }

    /// Attach compiler-style parameter metadata.
    pub fn with_layout(mut self, layout: Vec<ParamSlot>) -> Self {
        self.layout = Some(layout);
        self
    }
}

impl std::fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostKernel")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Emulated device memory.
#[derive(Debug)]
pub struct HostMemory {
    allocations: BTreeMap<u64, Vec<u8>>,
    next_address: u64,
    capacity: u64,
    used: u64,
}

impl HostMemory {
    fn new(capacity: u64) -> Self {
        Self {
            allocations: BTreeMap::new(),
            next_address: BASE_ADDRESS,
            capacity,
            used: 0,
        }
    }

    /// Bytes at `ptr..ptr + len`, which must lie inside one allocation.
    pub fn read(&self, ptr: u64, len: usize) -> RtResult<&[u8]> {
        let (base, offset) = self.locate(ptr, len)?;
        let buf = self.allocations.get(&base).ok_or(Status::INVALID_VALUE)?;
        Ok(&buf[offset..offset + len])
    }

    pub fn bytes_mut(&mut self, ptr: u64, len: usize) -> RtResult<&mut [u8]> {
        let (base, offset) = self.locate(ptr, len)?;
        let buf = self.allocations.get_mut(&base).ok_or(Status::INVALID_VALUE)?;
        Ok(&mut buf[offset..offset + len])
    }

    pub fn write(&mut self, ptr: u64, data: &[u8]) -> RtResult<()> {
        self.bytes_mut(ptr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// Bytes currently allocated.
    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn allocate(&mut self, size: u64) -> RtResult<u64> {
        if size == 0 {
            return Ok(0);
        }
        if self.used.saturating_add(size) > self.capacity {
            return Err(Status::OUT_OF_MEMORY);
        }
        let len = usize::try_from(size).map_err(|_| Status::OUT_OF_MEMORY)?;
        let ptr = self.next_address;
        self.next_address = ptr
            .checked_add(size.next_multiple_of(ALLOC_ALIGN))
            .ok_or(Status::OUT_OF_MEMORY)?;
        self.allocations.insert(ptr, vec![0; len]);
        self.used += size;
        Ok(ptr)
    }

    fn release(&mut self, ptr: u64) -> RtResult<()> {
        if ptr == 0 {
            return Ok(());
        }
        let buf = self.allocations.remove(&ptr).ok_or(Status::INVALID_VALUE)?;
        self.used -= buf.len() as u64;
        Ok(())
    }

    fn locate(&self, ptr: u64, len: usize) -> RtResult<(u64, usize)> {
        let (&base, buf) = self
            .allocations
            .range(..=ptr)
            .next_back()
            .ok_or(Status::INVALID_VALUE)?;
        let offset = usize::try_from(ptr - base).map_err(|_| Status::INVALID_VALUE)?;
        match offset.checked_add(len) {
            Some(end) if end <= buf.len() => Ok((base, offset)),
            _ => Err(Status::INVALID_VALUE),
        }
    }
}

#[derive(Debug, Clone)]
struct FunctionEntry {
    module: u64,
    kernel: String,
}

/// Host-memory [`GpuRuntime`].
#[derive(Debug)]
pub struct HostRuntime {
    device_count: i32,
    current_device: i32,
    memory: HostMemory,
    attributes: HashMap<i32, i32>,
    kernels: HashMap<String, HostKernel>,
    streams: HashSet<u64>,
    /// Event handle to the time of its last record.
    events: HashMap<u64, Option<Instant>>,
    modules: HashSet<u64>,
    functions: HashMap<u64, FunctionEntry>,
    next_handle: u64,
    last_error: Status,
    telemetry_ready: bool,
}

impl Default for HostRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Emulate one device with `capacity` bytes of memory.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            device_count: 1,
            current_device: 0,
            memory: HostMemory::new(capacity),
            attributes: HashMap::new(),
            kernels: HashMap::new(),
            streams: HashSet::new(),
            events: HashMap::new(),
            modules: HashSet::new(),
            functions: HashMap::new(),
            next_handle: 0x1000,
            last_error: Status::SUCCESS,
            telemetry_ready: false,
        }
    }

    pub fn with_device_count(mut self, count: i32) -> Self {
        self.device_count = count.max(0);
        self
    }

    /// Make `name` resolvable through `module_get_function` in any module.
    pub fn register_kernel(&mut self, name: impl Into<String>, kernel: HostKernel) -> &mut Self {
        self.kernels.insert(name.into(), kernel);
        self
    }

    /// Value returned by `device_attribute(attribute, _)`.
    pub fn set_attribute(&mut self, attribute: i32, value: i32) -> &mut Self {
        self.attributes.insert(attribute, value);
        self
    }

    pub fn memory(&self) -> &HostMemory {
        &self.memory
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Record failures as the sticky error, like the native runtime.
    fn track<T>(&mut self, result: RtResult<T>) -> RtResult<T> {
        if let Err(status) = &result {
            self.last_error = *status;
        }
        result
    }

    fn check_device(&self, device: i32) -> RtResult<()> {
        if (0..self.device_count).contains(&device) {
            Ok(())
        } else {
            Err(Status::INVALID_DEVICE)
        }
    }

    fn check_stream(&self, stream: u64) -> RtResult<()> {
        if stream == 0 || self.streams.contains(&stream) {
            Ok(())
        } else {
            Err(Status::INVALID_HANDLE)
        }
    }

    fn run_kernel(
        &mut self,
        function: u64,
        geometry: &LaunchGeometry,
        params: &[&[u8]],
    ) -> RtResult<()> {
        self.check_stream(geometry.stream)?;
        if geometry.grid.contains(&0) || geometry.block.contains(&0) {
            return Err(Status::INVALID_VALUE);
        }
        let entry = self
            .functions
            .get(&function)
            .ok_or(Status::INVALID_HANDLE)?;
        let kernel = self.kernels.get(&entry.kernel).ok_or(Status::NOT_FOUND)?;
        debug!(kernel = %entry.kernel, params = params.len(), "host kernel launch");
        (kernel.body)(&mut self.memory, geometry, params)
    }

    fn check_processor(&self, processor: u32) -> SmiResult<()> {
        if !self.telemetry_ready {
            return Err(SmiStatus::NOT_INITIALIZED);
        }
        if processor as i64 >= i64::from(self.device_count) {
            return Err(SmiStatus::NOT_FOUND);
        }
        Ok(())
    }
}

impl GpuRuntime for HostRuntime {
    fn name(&self) -> &'static str {
        "host"
    }

    fn device_count(&mut self) -> RtResult<i32> {
        Ok(self.device_count)
    }

    fn set_device(&mut self, device: i32) -> RtResult<()> {
        let result = self.check_device(device);
        if result.is_ok() {
            self.current_device = device;
        }
        self.track(result)
    }

    fn device(&mut self) -> RtResult<i32> {
        Ok(self.current_device)
    }

    fn device_properties(&mut self, device: i32) -> RtResult<DeviceProperties> {
        let checked = self.check_device(device);
        self.track(checked)?;
        Ok(DeviceProperties {
            name: "hipremote host emulator".to_string(),
            total_global_mem: self.memory.capacity(),
            shared_mem_per_block: 64 * 1024,
            regs_per_block: 65536,
            warp_size: 64,
            max_threads_per_block: 1024,
            max_threads_dim: [1024, 1024, 1024],
            max_grid_size: [i32::MAX, 65535, 65535],
            clock_rate: 1_000_000,
            memory_clock_rate: 1_000_000,
            memory_bus_width: 64,
            major: 0,
            minor: 0,
            multi_processor_count: 1,
            l2_cache_size: 0,
            max_threads_per_multi_processor: 2048,
            compute_mode: 0,
            pci_bus_id: 0,
            pci_device_id: device,
            pci_domain_id: 0,
            integrated: 1,
            can_map_host_memory: 1,
            concurrent_kernels: 0,
            gcn_arch_name: "host".to_string(),
        })
    }

    fn device_attribute(&mut self, attribute: i32, device: i32) -> RtResult<i32> {
        let result = self
            .check_device(device)
            .and_then(|()| self.attributes.get(&attribute).copied().ok_or(Status::INVALID_VALUE));
        self.track(result)
    }

    fn device_synchronize(&mut self) -> RtResult<()> {
        Ok(())
    }

    fn device_reset(&mut self) -> RtResult<()> {
        let capacity = self.memory.capacity();
        self.memory = HostMemory::new(capacity);
        self.streams.clear();
        self.events.clear();
        self.modules.clear();
        self.functions.clear();
        self.last_error = Status::SUCCESS;
        Ok(())
    }

    fn malloc(&mut self, size: u64) -> RtResult<u64> {
        let result = self.memory.allocate(size);
        self.track(result)
    }

    fn free(&mut self, ptr: u64) -> RtResult<()> {
        let result = self.memory.release(ptr);
        self.track(result)
    }

    fn mem_get_info(&mut self) -> RtResult<(u64, u64)> {
        let total = self.memory.capacity();
        Ok((total - self.memory.used(), total))
    }

    fn memcpy_htod(&mut self, dst: u64, src: &[u8], stream: u64) -> RtResult<()> {
        let result = self
            .check_stream(stream)
            .and_then(|()| self.memory.write(dst, src));
        self.track(result)
    }

    fn memcpy_dtoh(&mut self, dst: &mut [u8], src: u64, stream: u64) -> RtResult<()> {
        let result = self.check_stream(stream).and_then(|()| {
            dst.copy_from_slice(self.memory.read(src, dst.len())?);
            Ok(())
        });
        self.track(result)
    }

    fn memcpy_dtod(&mut self, dst: u64, src: u64, size: u64, stream: u64) -> RtResult<()> {
        let result = self.check_stream(stream).and_then(|()| {
            let len = usize::try_from(size).map_err(|_| Status::INVALID_VALUE)?;
            let data = self.memory.read(src, len)?.to_vec();
            self.memory.write(dst, &data)
        });
        self.track(result)
    }

    fn memset(&mut self, dst: u64, pattern: FillPattern, count: u64, stream: u64) -> RtResult<()> {
        let result = self.check_stream(stream).and_then(|()| {
            let len = usize::try_from(count)
                .ok()
                .and_then(|n| n.checked_mul(pattern.width()))
                .ok_or(Status::INVALID_VALUE)?;
            let bytes = self.memory.bytes_mut(dst, len)?;
            match pattern {
                FillPattern::U8(v) => bytes.fill(v),
                FillPattern::U16(v) => bytes
                    .chunks_exact_mut(2)
                    .for_each(|c| c.copy_from_slice(&v.to_le_bytes())),
                FillPattern::U32(v) => bytes
                    .chunks_exact_mut(4)
                    .for_each(|c| c.copy_from_slice(&v.to_le_bytes())),
            }
            Ok(())
        });
        self.track(result)
    }

    fn stream_create(&mut self, flags: u32, priority: i32) -> RtResult<u64> {
        let stream = self.handle();
        self.streams.insert(stream);
        debug!(stream, flags, priority, "host stream created");
        Ok(stream)
    }

    fn stream_destroy(&mut self, stream: u64) -> RtResult<()> {
        let result = if self.streams.remove(&stream) {
            Ok(())
        } else {
            Err(Status::INVALID_HANDLE)
        };
        self.track(result)
    }

    fn stream_synchronize(&mut self, stream: u64) -> RtResult<()> {
        let result = self.check_stream(stream);
        self.track(result)
    }

    fn stream_query(&mut self, stream: u64) -> RtResult<()> {
        let result = self.check_stream(stream);
        self.track(result)
    }

    fn stream_wait_event(&mut self, stream: u64, event: u64, _flags: u32) -> RtResult<()> {
        let result = self.check_stream(stream).and_then(|()| {
            if self.events.contains_key(&event) {
                Ok(())
            } else {
                Err(Status::INVALID_HANDLE)
            }
        });
        self.track(result)
    }

    fn event_create(&mut self, _flags: u32) -> RtResult<u64> {
        let event = self.handle();
        self.events.insert(event, None);
        Ok(event)
    }

    fn event_destroy(&mut self, event: u64) -> RtResult<()> {
        let result = match self.events.remove(&event) {
            Some(_) => Ok(()),
            None => Err(Status::INVALID_HANDLE),
        };
        self.track(result)
    }

    fn event_record(&mut self, event: u64, stream: u64) -> RtResult<()> {
        let result = self.check_stream(stream).and_then(|()| {
            let recorded = self.events.get_mut(&event).ok_or(Status::INVALID_HANDLE)?;
            *recorded = Some(Instant::now());
            Ok(())
        });
        self.track(result)
    }

    fn event_synchronize(&mut self, event: u64) -> RtResult<()> {
        let result = self
            .events
            .get(&event)
            .map(|_| ())
            .ok_or(Status::INVALID_HANDLE);
        self.track(result)
    }

    fn event_query(&mut self, event: u64) -> RtResult<()> {
        self.event_synchronize(event)
    }

    fn event_elapsed_time(&mut self, start: u64, end: u64) -> RtResult<f32> {
        let recorded = |event: u64| -> RtResult<Instant> {
            let recorded = self.events.get(&event).ok_or(Status::INVALID_HANDLE)?;
            recorded.ok_or(Status::INVALID_HANDLE)
        };
        let result = recorded(start).and_then(|s| {
            let e = recorded(end)?;
            let millis = if e >= s {
                e.duration_since(s).as_secs_f32() * 1000.0
            } else {
                -(s.duration_since(e).as_secs_f32() * 1000.0)
            };
            Ok(millis)
        });
        self.track(result)
    }

    fn module_load(&mut self, image: &[u8]) -> RtResult<u64> {
        if image.is_empty() {
            return self.track(Err(Status::INVALID_IMAGE));
        }
        let module = self.handle();
        self.modules.insert(module);
        debug!(module, size = image.len(), "host module loaded");
        Ok(module)
    }

    fn module_unload(&mut self, module: u64) -> RtResult<()> {
        if !self.modules.remove(&module) {
            return self.track(Err(Status::INVALID_HANDLE));
        }
        self.functions.retain(|_, entry| entry.module != module);
        Ok(())
    }

    fn module_get_function(&mut self, module: u64, name: &str) -> RtResult<u64> {
        if !self.modules.contains(&module) {
            return self.track(Err(Status::INVALID_HANDLE));
        }
        if !self.kernels.contains_key(name) {
            return self.track(Err(Status::NOT_FOUND));
        }
        if let Some((&function, _)) = self
            .functions
            .iter()
            .find(|(_, entry)| entry.module == module && entry.kernel == name)
        {
            return Ok(function);
        }
        let function = self.handle();
        self.functions.insert(
            function,
            FunctionEntry {
                module,
                kernel: name.to_string(),
            },
        );
        Ok(function)
    }

    fn kernel_param_layout(&mut self, function: u64) -> Option<Vec<ParamSlot>> {
        let entry = self.functions.get(&function)?;
        self.kernels.get(&entry.kernel)?.layout.clone()
    }

    fn launch(
        &mut self,
        function: u64,
        geometry: &LaunchGeometry,
        params: &[&[u8]],
    ) -> RtResult<()> {
        let result = self.run_kernel(function, geometry, params);
        self.track(result)
    }

    fn launch_flat(
        &mut self,
        function: u64,
        geometry: &LaunchGeometry,
        args: &[u8],
    ) -> RtResult<()> {
        let result = self.run_kernel(function, geometry, &[args]);
        self.track(result)
    }

    fn runtime_version(&mut self) -> RtResult<i32> {
        Ok(HOST_RUNTIME_VERSION)
    }

    fn driver_version(&mut self) -> RtResult<i32> {
        Ok(HOST_RUNTIME_VERSION)
    }

    fn get_last_error(&mut self) -> Status {
        std::mem::replace(&mut self.last_error, Status::SUCCESS)
    }

    fn peek_last_error(&mut self) -> Status {
        self.last_error
    }

    fn telemetry(&mut self) -> Option<&mut dyn TelemetrySource> {
        Some(self)
    }
}

impl TelemetrySource for HostRuntime {
    fn init(&mut self, _flags: u64) -> SmiResult<()> {
        self.telemetry_ready = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.telemetry_ready = false;
    }

    fn is_initialized(&self) -> bool {
        self.telemetry_ready
    }

    fn processor_count(&mut self) -> u32 {
        self.device_count as u32
    }

    fn gpu_metrics(&mut self, processor: u32) -> SmiResult<GpuMetrics> {
        self.check_processor(processor)?;
        let vram = self.vram_usage(processor)?;
        Ok(GpuMetrics {
            temperature_edge: 40,
            temperature_hotspot: 45,
            temperature_mem: 42,
            average_socket_power: 25,
            current_gfxclk: 1000,
            current_uclk: 1000,
            current_socclk: 1000,
            vram_total: vram.total,
            vram_used: vram.used,
            ..GpuMetrics::default()
        })
    }

    fn power_info(&mut self, processor: u32) -> SmiResult<PowerInfo> {
        self.check_processor(processor)?;
        Ok(PowerInfo {
            current_socket_power: 25,
            average_socket_power: 25,
            gfx_voltage: 800,
            soc_voltage: 800,
            mem_voltage: 1200,
            power_limit: 300,
        })
    }

    fn clock_info(&mut self, processor: u32, clock_type: u32) -> SmiResult<ClockInfo> {
        self.check_processor(processor)?;
        if clock_type > 4 {
            return Err(SmiStatus::INVALID_ARGS);
        }
        Ok(ClockInfo {
            current: 1000,
            min: 500,
            max: 2000,
            ..ClockInfo::default()
        })
    }

    fn temperature(&mut self, processor: u32, sensor: u32) -> SmiResult<i32> {
        self.check_processor(processor)?;
        match sensor {
            0 => Ok(40),
            1 => Ok(45),
            2 => Ok(42),
            _ => Err(SmiStatus::INVALID_ARGS),
        }
    }

    fn gpu_activity(&mut self, processor: u32) -> SmiResult<GpuActivity> {
        self.check_processor(processor)?;
        Ok(GpuActivity::default())
    }

    fn vram_usage(&mut self, processor: u32) -> SmiResult<VramUsage> {
        self.check_processor(processor)?;
        Ok(VramUsage {
            total: self.memory.capacity(),
            used: self.memory.used(),
        })
    }

    fn asic_info(&mut self, processor: u32) -> SmiResult<AsicInfo> {
        self.check_processor(processor)?;
        Ok(AsicInfo {
            market_name: "hipremote host emulator".to_string(),
            vendor_id: 0x1002,
            device_id: 0,
            rev_id: 0,
            num_compute_units: 1,
            asic_serial: format!("HOST{processor:04}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> LaunchGeometry {
        LaunchGeometry {
            grid: [1, 1, 1],
            block: [64, 1, 1],
            shared_mem_bytes: 0,
            stream: 0,
        }
    }

    #[test]
    fn interior_pointers_resolve_to_their_allocation() {
        let mut rt = HostRuntime::new();
        let a = rt.malloc(64).unwrap();
        let b = rt.malloc(64).unwrap();
        assert_ne!(a, b);

        rt.memcpy_htod(a + 8, b"hello", 0).unwrap();
        let mut out = [0u8; 5];
        rt.memcpy_dtoh(&mut out, a + 8, 0).unwrap();
        assert_eq!(&out, b"hello");

        // Runs past the end of `a`.
        assert_eq!(rt.memcpy_htod(a + 60, &[0u8; 8], 0), Err(Status::INVALID_VALUE));
        assert_eq!(rt.get_last_error(), Status::INVALID_VALUE);
        assert_eq!(rt.get_last_error(), Status::SUCCESS);
    }

    #[test]
    fn free_rejects_unknown_pointers() {
        let mut rt = HostRuntime::new();
        let ptr = rt.malloc(16).unwrap();
        assert_eq!(rt.free(ptr + 1), Err(Status::INVALID_VALUE));
        rt.free(ptr).unwrap();
        assert_eq!(rt.free(ptr), Err(Status::INVALID_VALUE));
        assert_eq!(rt.peek_last_error(), Status::INVALID_VALUE);
        assert!(rt.free(0).is_ok());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut rt = HostRuntime::with_capacity(1024);
        let ptr = rt.malloc(1000).unwrap();
        assert_eq!(rt.malloc(100), Err(Status::OUT_OF_MEMORY));
        assert_eq!(rt.mem_get_info().unwrap(), (24, 1024));
        rt.free(ptr).unwrap();
        assert!(rt.malloc(100).is_ok());
    }

    #[test]
    fn memset_patterns() {
        let mut rt = HostRuntime::new();
        let ptr = rt.malloc(8).unwrap();
        rt.memset(ptr, FillPattern::U32(0xAABBCCDD), 2, 0).unwrap();
        let mut out = [0u8; 8];
        rt.memcpy_dtoh(&mut out, ptr, 0).unwrap();
        assert_eq!(out, [0xDD, 0xCC, 0xBB, 0xAA, 0xDD, 0xCC, 0xBB, 0xAA]);

        rt.memset(ptr + 2, FillPattern::U8(7), 3, 0).unwrap();
        rt.memcpy_dtoh(&mut out, ptr, 0).unwrap();
        assert_eq!(&out[2..5], &[7, 7, 7]);
        assert_eq!(
            rt.memset(ptr, FillPattern::U16(1), 5, 0),
            Err(Status::INVALID_VALUE)
        );
    }

    #[test]
    fn unknown_stream_is_invalid_handle() {
        let mut rt = HostRuntime::new();
        assert_eq!(rt.stream_synchronize(99), Err(Status::INVALID_HANDLE));
        let stream = rt.stream_create(0, 0).unwrap();
        rt.stream_synchronize(stream).unwrap();
        rt.stream_destroy(stream).unwrap();
        assert_eq!(rt.stream_query(stream), Err(Status::INVALID_HANDLE));
    }

    #[test]
    fn elapsed_time_requires_recorded_events() {
        let mut rt = HostRuntime::new();
        let start = rt.event_create(0).unwrap();
        let end = rt.event_create(0).unwrap();
        assert_eq!(rt.event_elapsed_time(start, end), Err(Status::INVALID_HANDLE));
        rt.event_record(start, 0).unwrap();
        rt.event_record(end, 0).unwrap();
        assert!(rt.event_elapsed_time(start, end).unwrap() >= 0.0);
    }

    #[test]
    fn kernels_resolve_by_name_and_run() {
        let mut rt = HostRuntime::new();
        rt.register_kernel(
            "fill",
            HostKernel::new(|mem, _, params| {
                let ptr = u64::from_le_bytes(params[0].try_into().map_err(|_| Status::INVALID_VALUE)?);
                let value = params[1][0];
                mem.bytes_mut(ptr, 4)?.fill(value);
                Ok(())
            })
            .with_layout(vec![ParamSlot::new(0, 8), ParamSlot::new(8, 1)]),
        );

        let module = rt.module_load(b"\x7fELF").unwrap();
        assert_eq!(rt.module_get_function(module, "missing"), Err(Status::NOT_FOUND));
        let function = rt.module_get_function(module, "fill").unwrap();
        assert_eq!(rt.module_get_function(module, "fill").unwrap(), function);
        assert_eq!(rt.kernel_param_layout(function).unwrap().len(), 2);

        let ptr = rt.malloc(4).unwrap();
        let ptr_bytes = ptr.to_le_bytes();
        rt.launch(function, &geometry(), &[&ptr_bytes, &[9]]).unwrap();
        let mut out = [0u8; 4];
        rt.memcpy_dtoh(&mut out, ptr, 0).unwrap();
        assert_eq!(out, [9; 4]);

        rt.module_unload(module).unwrap();
        assert_eq!(
            rt.launch(function, &geometry(), &[&ptr_bytes, &[9]]),
            Err(Status::INVALID_HANDLE)
        );
    }

    #[test]
    fn telemetry_requires_init() {
        let mut rt = HostRuntime::new();
        assert_eq!(rt.vram_usage(0), Err(SmiStatus::NOT_INITIALIZED));
        TelemetrySource::init(&mut rt, 0).unwrap();
        let ptr = rt.malloc(4096).unwrap();
        assert_eq!(rt.vram_usage(0).unwrap().used, 4096);
        assert_eq!(rt.gpu_metrics(1), Err(SmiStatus::NOT_FOUND));
        rt.free(ptr).unwrap();
    }
}
