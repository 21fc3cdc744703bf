//! Telemetry read from the amdgpu driver's sysfs files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hipremote_wire::body::{AsicInfo, ClockInfo, GpuActivity, GpuMetrics, PowerInfo, VramUsage};
use hipremote_wire::SmiStatus;
use tracing::{debug, info};

use crate::telemetry::{SmiResult, TelemetrySource};

pub const DRM_ROOT: &str = "/sys/class/drm";

const AMD_VENDOR_ID: u32 = 0x1002;

/// Clock type index to the DPM table describing it.
const CLOCK_TABLES: [&str; 5] = [
    "pp_dpm_sclk",
    "pp_dpm_fclk",
    "pp_dpm_dcefclk",
    "pp_dpm_socclk",
    "pp_dpm_mclk",
];

/// Sensor index to hwmon input: edge, junction, memory.
const TEMP_INPUTS: [&str; 3] = ["temp1_input", "temp2_input", "temp3_input"];

/// [`TelemetrySource`] over `/sys/class/drm/card*/device`.
#[derive(Debug)]
pub struct SysfsTelemetry {
    root: PathBuf,
    devices: Vec<PathBuf>,
    initialized: bool,
}

impl Default for SysfsTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsTelemetry {
    pub fn new() -> Self {
        Self::with_root(DRM_ROOT)
    }

    /// Scan `root` instead of [`DRM_ROOT`].
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            devices: Vec::new(),
            initialized: false,
        }
    }

    fn scan(&self) -> io::Result<Vec<PathBuf>> {
        let mut cards = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(index) = name
                .to_str()
                .and_then(|n| n.strip_prefix("card"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            let device = entry.path().join("device");
            match read_hex(&device.join("vendor")) {
                Ok(AMD_VENDOR_ID) => cards.push((index, device)),
                _ => continue,
            }
        }
        cards.sort_by_key(|(index, _)| *index);
        Ok(cards.into_iter().map(|(_, path)| path).collect())
    }

    fn device(&self, processor: u32) -> SmiResult<&Path> {
        if !self.initialized {
            return Err(SmiStatus::NOT_INITIALIZED);
        }
        self.devices
            .get(processor as usize)
            .map(PathBuf::as_path)
            .ok_or(SmiStatus::NOT_FOUND)
    }

    fn hwmon(&self, processor: u32) -> SmiResult<PathBuf> {
        let dir = self.device(processor)?.join("hwmon");
        let entry = fs::read_dir(&dir)
            .map_err(io_status)?
            .filter_map(|e| e.ok())
            .find(|e| e.file_name().to_string_lossy().starts_with("hwmon"))
            .ok_or(SmiStatus::NOT_SUPPORTED)?;
        Ok(entry.path())
    }

    /// Optional hwmon value; absent files read as zero.
    fn hwmon_or_zero(&self, processor: u32, file: &str) -> u64 {
        self.hwmon(processor)
            .and_then(|dir| read_u64(&dir.join(file)))
            .unwrap_or(0)
    }
}

fn io_status(err: io::Error) -> SmiStatus {
    match err.kind() {
        io::ErrorKind::NotFound => SmiStatus::NOT_SUPPORTED,
        _ => SmiStatus::IO_ERROR,
    }
}

fn read_trimmed(path: &Path) -> SmiResult<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(io_status)
}

fn read_u64(path: &Path) -> SmiResult<u64> {
    read_trimmed(path)?
        .parse()
        .map_err(|_| SmiStatus::API_FAILED)
}

fn read_hex(path: &Path) -> SmiResult<u32> {
    let text = read_trimmed(path)?;
    u32::from_str_radix(text.trim_start_matches("0x"), 16).map_err(|_| SmiStatus::API_FAILED)
}

/// Parse a DPM table such as `0: 500Mhz\n1: 2100Mhz *` into
/// `(current, min, max)` in MHz.
fn parse_dpm_table(text: &str) -> Option<(u32, u32, u32)> {
    let mut levels = Vec::new();
    let mut current = None;
    for line in text.lines() {
        let Some((_, rest)) = line.split_once(':') else {
            continue;
        };
        let rest = rest.trim();
        let active = rest.ends_with('*');
        let mhz = rest
            .trim_end_matches('*')
            .trim()
            .to_ascii_lowercase()
            .strip_suffix("mhz")?
            .trim()
            .parse::<u32>()
            .ok()?;
        if active {
            current = Some(mhz);
        }
        levels.push(mhz);
    }
    let min = *levels.iter().min()?;
    let max = *levels.iter().max()?;
    Some((current.unwrap_or(min), min, max))
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl TelemetrySource for SysfsTelemetry {
    fn init(&mut self, flags: u64) -> SmiResult<()> {
        if self.initialized {
            return Ok(());
        }
        self.devices = self.scan().map_err(io_status)?;
        self.initialized = true;
        info!(
            root = %self.root.display(),
            devices = self.devices.len(),
            flags,
            "sysfs telemetry initialized"
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        self.devices.clear();
        self.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn processor_count(&mut self) -> u32 {
        self.devices.len() as u32
    }

    fn gpu_metrics(&mut self, processor: u32) -> SmiResult<GpuMetrics> {
        self.device(processor)?;
        let mut temps = [0i32; 3];
        for (sensor, slot) in temps.iter_mut().enumerate() {
            *slot = self.temperature(processor, sensor as u32).unwrap_or(0);
        }
        let mut clocks = [0u32; CLOCK_TABLES.len()];
        for (ty, slot) in clocks.iter_mut().enumerate() {
            *slot = self
                .clock_info(processor, ty as u32)
                .map(|c| c.current)
                .unwrap_or(0);
        }
        let activity = self.gpu_activity(processor).unwrap_or_default();
        let vram = self.vram_usage(processor).unwrap_or_default();
        Ok(GpuMetrics {
            temperature_edge: temps[0],
            temperature_hotspot: temps[1],
            temperature_mem: temps[2],
            average_socket_power: clamp_u32(
                self.hwmon_or_zero(processor, "power1_average") / 1_000_000,
            ),
            gfx_activity: activity.gfx,
            umc_activity: activity.umc,
            mm_activity: activity.mm,
            current_gfxclk: clocks[0],
            current_uclk: clocks[4],
            current_socclk: clocks[3],
            vram_total: vram.total,
            vram_used: vram.used,
            fan_rpm: clamp_u32(self.hwmon_or_zero(processor, "fan1_input")),
            ..GpuMetrics::default()
        })
    }

    fn power_info(&mut self, processor: u32) -> SmiResult<PowerInfo> {
        let hwmon = self.hwmon(processor)?;
        let average = read_u64(&hwmon.join("power1_average"))
            .or_else(|_| read_u64(&hwmon.join("power1_input")))?;
        let current = read_u64(&hwmon.join("power1_input")).unwrap_or(average);
        let optional = |file: &str| read_u64(&hwmon.join(file)).unwrap_or(0);
        Ok(PowerInfo {
            current_socket_power: clamp_u32(current / 1_000_000),
            average_socket_power: clamp_u32(average / 1_000_000),
            gfx_voltage: clamp_u32(optional("in0_input")),
            soc_voltage: clamp_u32(optional("in1_input")),
            mem_voltage: clamp_u32(optional("in2_input")),
            power_limit: clamp_u32(optional("power1_cap") / 1_000_000),
        })
    }

    fn clock_info(&mut self, processor: u32, clock_type: u32) -> SmiResult<ClockInfo> {
        let table = CLOCK_TABLES
            .get(clock_type as usize)
            .ok_or(SmiStatus::INVALID_ARGS)?;
        let text = read_trimmed(&self.device(processor)?.join(table))?;
        let (current, min, max) = parse_dpm_table(&text).ok_or(SmiStatus::API_FAILED)?;
        Ok(ClockInfo {
            current,
            min,
            max,
            ..ClockInfo::default()
        })
    }

    fn temperature(&mut self, processor: u32, sensor: u32) -> SmiResult<i32> {
        let input = TEMP_INPUTS
            .get(sensor as usize)
            .ok_or(SmiStatus::INVALID_ARGS)?;
        let millidegrees = read_u64(&self.hwmon(processor)?.join(input))?;
        Ok((millidegrees / 1000) as i32)
    }

    fn gpu_activity(&mut self, processor: u32) -> SmiResult<GpuActivity> {
        let device = self.device(processor)?;
        let gfx = read_u64(&device.join("gpu_busy_percent"))?;
        let umc = read_u64(&device.join("mem_busy_percent")).unwrap_or(0);
        Ok(GpuActivity {
            gfx: clamp_u32(gfx),
            umc: clamp_u32(umc),
            ..GpuActivity::default()
        })
    }

    fn vram_usage(&mut self, processor: u32) -> SmiResult<VramUsage> {
        let device = self.device(processor)?;
        Ok(VramUsage {
            total: read_u64(&device.join("mem_info_vram_total"))?,
            used: read_u64(&device.join("mem_info_vram_used"))?,
        })
    }

    fn asic_info(&mut self, processor: u32) -> SmiResult<AsicInfo> {
        let device = self.device(processor)?;
        let info = AsicInfo {
            market_name: read_trimmed(&device.join("product_name")).unwrap_or_default(),
            vendor_id: read_hex(&device.join("vendor"))?,
            device_id: read_hex(&device.join("device"))?,
            rev_id: read_hex(&device.join("revision")).unwrap_or(0),
            num_compute_units: 0,
            asic_serial: read_trimmed(&device.join("unique_id")).unwrap_or_default(),
        };
        debug!(processor, device_id = info.device_id, "asic info");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fake_card(root: &Path, name: &str, vendor: &str) -> PathBuf {
        let device = root.join(name).join("device");
        write(&device.join("vendor"), &format!("{vendor}\n"));
        write(&device.join("device"), "0x740f\n");
        write(&device.join("mem_info_vram_total"), "68702699520\n");
        write(&device.join("mem_info_vram_used"), "1048576\n");
        write(&device.join("gpu_busy_percent"), "37\n");
        write(&device.join("pp_dpm_sclk"), "0: 500Mhz\n1: 1700Mhz *\n2: 2100Mhz\n");
        let hwmon = device.join("hwmon").join("hwmon3");
        write(&hwmon.join("temp1_input"), "41000\n");
        write(&hwmon.join("temp2_input"), "55000\n");
        write(&hwmon.join("power1_average"), "152000000\n");
        write(&hwmon.join("power1_cap"), "300000000\n");
        device
    }

    fn telemetry() -> (tempfile::TempDir, SysfsTelemetry) {
        let root = tempfile::tempdir().unwrap();
        fake_card(root.path(), "card1", "0x1002");
        fake_card(root.path(), "card0", "0x10de");
        fake_card(root.path(), "card2", "0x1002");
        fs::create_dir_all(root.path().join("card1-DP-1")).unwrap();
        let mut smi = SysfsTelemetry::with_root(root.path());
        smi.init(0).unwrap();
        (root, smi)
    }

    #[test]
    fn only_amd_cards_are_enumerated() {
        let (_root, mut smi) = telemetry();
        assert_eq!(smi.processor_count(), 2);
        assert_eq!(smi.vram_usage(2), Err(SmiStatus::NOT_FOUND));
    }

    #[test]
    fn queries_before_init_fail() {
        let mut smi = SysfsTelemetry::with_root("/nonexistent");
        assert_eq!(smi.vram_usage(0), Err(SmiStatus::NOT_INITIALIZED));
        assert!(!smi.is_initialized());
    }

    #[test]
    fn reads_driver_files() {
        let (_root, mut smi) = telemetry();
        let vram = smi.vram_usage(0).unwrap();
        assert_eq!(vram.total, 68_702_699_520);
        assert_eq!(vram.used, 1_048_576);

        assert_eq!(smi.temperature(0, 0).unwrap(), 41);
        assert_eq!(smi.temperature(0, 1).unwrap(), 55);
        assert_eq!(smi.temperature(0, 9), Err(SmiStatus::INVALID_ARGS));

        let power = smi.power_info(0).unwrap();
        assert_eq!(power.average_socket_power, 152);
        assert_eq!(power.power_limit, 300);

        let clock = smi.clock_info(0, 0).unwrap();
        assert_eq!((clock.current, clock.min, clock.max), (1700, 500, 2100));
        assert_eq!(smi.clock_info(0, 4), Err(SmiStatus::NOT_SUPPORTED));

        let metrics = smi.gpu_metrics(1).unwrap();
        assert_eq!(metrics.gfx_activity, 37);
        assert_eq!(metrics.current_gfxclk, 1700);
        assert_eq!(metrics.temperature_mem, 0);
    }

    #[test]
    fn dpm_table_without_marker_uses_lowest_level() {
        assert_eq!(parse_dpm_table("0: 96Mhz\n1: 1000Mhz\n"), Some((96, 96, 1000)));
        assert_eq!(parse_dpm_table(""), None);
    }
}
