use bytes::{Buf, BufMut, BytesMut};

use super::{get_fixed_str, put_fixed_str, WireBody};

wire_body! {
    /// `SMI_INIT`.
    pub struct SmiInitRequest {
        pub init_flags: u64,
    }
}

wire_body! {
    /// `GET_PROCESSOR_COUNT` response.
    pub struct ProcessorCountResponse {
        pub count: u32,
    }
}

wire_body! {
    /// Any per-processor telemetry query.
    pub struct ProcessorRequest {
        pub processor: u32,
    }
}

wire_body! {
    /// `GET_GPU_METRICS` response. Temperatures in degrees Celsius, power in
    /// watts, activity in percent, clocks in MHz, memory in bytes.
    pub struct GpuMetrics {
        pub temperature_edge: i32,
        pub temperature_hotspot: i32,
        pub temperature_mem: i32,
        pub average_socket_power: u32,
        pub gfx_activity: u32,
        pub umc_activity: u32,
        pub mm_activity: u32,
        pub current_gfxclk: u32,
        pub current_uclk: u32,
        pub current_socclk: u32,
        pub vram_total: u64,
        pub vram_used: u64,
        pub fan_rpm: u32,
        pub pcie_bandwidth: u32,
        pub throttle_status: u32,
        pub reserved: u32,
    }
}

wire_body! {
    /// `GET_POWER_INFO` response. Power in watts, voltages in millivolts.
    pub struct PowerInfo {
        pub current_socket_power: u32,
        pub average_socket_power: u32,
        pub gfx_voltage: u32,
        pub soc_voltage: u32,
        pub mem_voltage: u32,
        pub power_limit: u32,
    }
}

wire_body! {
    /// `GET_CLOCK_INFO`.
    pub struct ClockInfoRequest {
        pub processor: u32,
        pub clock_type: u32,
    }
}

wire_body! {
    /// `GET_CLOCK_INFO` response, in MHz.
    pub struct ClockInfo {
        pub current: u32,
        pub min: u32,
        pub max: u32,
        pub locked: u8,
        pub deep_sleep: u8,
        pub reserved: u16,
    }
}

wire_body! {
    /// `GET_TEMP_METRIC`.
    pub struct TempMetricRequest {
        pub processor: u32,
        pub sensor: u32,
    }
}

wire_body! {
    /// `GET_TEMP_METRIC` response, in degrees Celsius.
    pub struct TempMetric {
        pub celsius: i32,
    }
}

wire_body! {
    /// `GET_GPU_ACTIVITY` response, in percent.
    pub struct GpuActivity {
        pub gfx: u32,
        pub umc: u32,
        pub mm: u32,
        pub reserved: u32,
    }
}

wire_body! {
    /// `GET_VRAM_USAGE` response, in bytes.
    pub struct VramUsage {
        pub total: u64,
        pub used: u64,
    }
}

const MARKET_NAME_LEN: usize = 256;
const SERIAL_LEN: usize = 64;

/// `GET_ASIC_INFO` response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AsicInfo {
    pub market_name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub rev_id: u32,
    pub num_compute_units: u32,
    pub asic_serial: String,
}

impl WireBody for AsicInfo {
    const NAME: &'static str = "AsicInfo";
    const SIZE: usize = MARKET_NAME_LEN + 16 + SERIAL_LEN;

    fn put(&self, dst: &mut BytesMut) {
        put_fixed_str(dst, &self.market_name, MARKET_NAME_LEN);
        dst.put_u32_le(self.vendor_id);
        dst.put_u32_le(self.device_id);
        dst.put_u32_le(self.rev_id);
        dst.put_u32_le(self.num_compute_units);
        put_fixed_str(dst, &self.asic_serial, SERIAL_LEN);
    }

    fn get(src: &mut &[u8]) -> Self {
        let market_name = get_fixed_str(src, MARKET_NAME_LEN);
        Self {
            market_name,
            vendor_id: src.get_u32_le(),
            device_id: src.get_u32_le(),
            rev_id: src.get_u32_le(),
            num_compute_units: src.get_u32_le(),
            asic_serial: get_fixed_str(src, SERIAL_LEN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_metrics_size() {
        assert_eq!(GpuMetrics::SIZE, 3 * 4 + 7 * 4 + 2 * 8 + 4 * 4);
    }

    #[test]
    fn test_clock_info_packs_flags() {
        let info = ClockInfo {
            current: 2100,
            min: 500,
            max: 2100,
            locked: 1,
            deep_sleep: 0,
            reserved: 0,
        };
        let wire = info.encode();
        assert_eq!(wire.len(), 16);
        assert_eq!(wire[12], 1);
    }

    #[test]
    fn test_asic_info_serial_field() {
        let info = AsicInfo {
            market_name: "Radeon Pro W7900".to_string(),
            vendor_id: 0x1002,
            device_id: 0x7448,
            rev_id: 0,
            num_compute_units: 96,
            asic_serial: "0x1234abcd".to_string(),
        };
        let wire = info.encode();
        assert_eq!(wire.len(), AsicInfo::SIZE);
        assert_eq!(&wire[256..260], &0x1002u32.to_le_bytes());
        assert_eq!(AsicInfo::decode(&wire).unwrap(), info);
    }
}
