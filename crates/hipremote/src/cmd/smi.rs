use hipremote_client::telemetry::{clock, sensor};
use hipremote_client::{ClientError, Result, SmiStatus, TelemetryClient};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Value};

use crate::cmd::{SmiArgs, SmiQuery};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_json, print_pairs, print_table, OutputFormat};

/// One processor's answer to a query, fields in display order.
struct Reading {
    processor: u32,
    fields: Vec<(&'static str, Value)>,
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("processor", &self.processor)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

pub fn run(args: SmiArgs, format: OutputFormat) -> CliResult<i32> {
    let smi = TelemetryClient::new(args.remote.client_config()?);
    let result = collect(&smi, args.query);
    smi.shutdown();

    print_readings(&result?, format);
    Ok(SUCCESS)
}

fn collect(smi: &TelemetryClient, query: SmiQuery) -> CliResult<Vec<Reading>> {
    smi.init()
        .map_err(|err| client_error("connect failed", err))?;
    let count = smi
        .processor_count()
        .map_err(|err| client_error("processor count failed", err))?;

    (0..count)
        .map(|processor| {
            read(smi, processor, query)
                .map(|fields| Reading { processor, fields })
                .map_err(|err| client_error(&format!("processor {processor}"), err))
        })
        .collect()
}

/// `null` for readings the device does not provide.
fn optional<T: Into<Value>>(value: Result<T>) -> Result<Value> {
    match value {
        Ok(v) => Ok(v.into()),
        Err(ClientError::Smi(SmiStatus::NOT_SUPPORTED)) => Ok(Value::Null),
        Err(err) => Err(err),
    }
}

fn read(smi: &TelemetryClient, processor: u32, query: SmiQuery) -> Result<Vec<(&'static str, Value)>> {
    Ok(match query {
        SmiQuery::Metrics => {
            let m = smi.gpu_metrics(processor)?;
            vec![
                ("edge_c", json!(m.temperature_edge)),
                ("hotspot_c", json!(m.temperature_hotspot)),
                ("mem_c", json!(m.temperature_mem)),
                ("power_w", json!(m.average_socket_power)),
                ("gfx_pct", json!(m.gfx_activity)),
                ("umc_pct", json!(m.umc_activity)),
                ("gfxclk_mhz", json!(m.current_gfxclk)),
                ("uclk_mhz", json!(m.current_uclk)),
                ("vram_used", json!(m.vram_used)),
                ("vram_total", json!(m.vram_total)),
                ("fan_rpm", json!(m.fan_rpm)),
                ("throttle", json!(m.throttle_status)),
            ]
        }
        SmiQuery::Power => {
            let p = smi.power_info(processor)?;
            vec![
                ("current_w", json!(p.current_socket_power)),
                ("average_w", json!(p.average_socket_power)),
                ("limit_w", json!(p.power_limit)),
                ("gfx_mv", json!(p.gfx_voltage)),
                ("soc_mv", json!(p.soc_voltage)),
                ("mem_mv", json!(p.mem_voltage)),
            ]
        }
        SmiQuery::Vram => {
            let v = smi.vram_usage(processor)?;
            vec![("used", json!(v.used)), ("total", json!(v.total))]
        }
        SmiQuery::Activity => {
            let a = smi.gpu_activity(processor)?;
            vec![
                ("gfx_pct", json!(a.gfx)),
                ("umc_pct", json!(a.umc)),
                ("mm_pct", json!(a.mm)),
            ]
        }
        SmiQuery::Asic => {
            let a = smi.asic_info(processor)?;
            vec![
                ("market_name", json!(a.market_name)),
                ("vendor_id", json!(format!("0x{:04x}", a.vendor_id))),
                ("device_id", json!(format!("0x{:04x}", a.device_id))),
                ("rev_id", json!(a.rev_id)),
                ("compute_units", json!(a.num_compute_units)),
                ("serial", json!(a.asic_serial)),
            ]
        }
        SmiQuery::Clock => {
            let mut fields = Vec::new();
            for (name, domain) in [("gfx", clock::GFX), ("mem", clock::MEM), ("soc", clock::SOC)] {
                let value = optional(smi.clock_info(processor, domain).map(|c| {
                    json!({ "current_mhz": c.current, "min_mhz": c.min, "max_mhz": c.max })
                }))?;
                fields.push((name, value));
            }
            fields
        }
        SmiQuery::Temp => vec![
            ("edge_c", optional(smi.temperature(processor, sensor::EDGE))?),
            ("hotspot_c", optional(smi.temperature(processor, sensor::HOTSPOT))?),
            ("vram_c", optional(smi.temperature(processor, sensor::VRAM))?),
        ],
    })
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "n/a".to_string(),
        Value::String(s) => s.clone(),
        Value::Object(clock) => format!(
            "{} MHz ({}-{})",
            clock.get("current_mhz").unwrap_or(&Value::Null),
            clock.get("min_mhz").unwrap_or(&Value::Null),
            clock.get("max_mhz").unwrap_or(&Value::Null),
        ),
        other => other.to_string(),
    }
}

fn print_readings(readings: &[Reading], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&readings),
        OutputFormat::Table => {
            let Some(first) = readings.first() else {
                println!("no processors");
                return;
            };
            let mut header = vec!["PROCESSOR".to_string()];
            header.extend(first.fields.iter().map(|(name, _)| name.to_uppercase()));
            let rows = readings
                .iter()
                .map(|r| {
                    let mut row = vec![r.processor.to_string()];
                    row.extend(r.fields.iter().map(|(_, value)| cell(value)));
                    row
                })
                .collect();
            print_table(header, rows);
        }
        OutputFormat::Pretty => {
            for r in readings {
                let pairs: Vec<(&str, String)> =
                    r.fields.iter().map(|(name, value)| (*name, cell(value))).collect();
                print_pairs(&format!("Processor {}", r.processor), &pairs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_serializes_flat_with_processor_first() {
        let reading = Reading {
            processor: 1,
            fields: vec![("used", json!(4096)), ("total", json!(8192))],
        };
        let text = serde_json::to_string(&reading).unwrap();
        assert!(text.starts_with(r#"{"processor":1"#), "{text}");
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["used"], 4096);
        assert_eq!(parsed["total"], 8192);
    }

    #[test]
    fn unsupported_readings_become_null() {
        let missing: Result<i32> = Err(ClientError::Smi(SmiStatus::NOT_SUPPORTED));
        assert_eq!(optional(missing).unwrap(), Value::Null);
        let failed: Result<i32> = Err(ClientError::Smi(SmiStatus::NOT_FOUND));
        assert!(optional(failed).is_err());
        assert_eq!(cell(&Value::Null), "n/a");
    }
}
