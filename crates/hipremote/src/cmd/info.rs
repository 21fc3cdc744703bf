use hipremote_client::Client;
use hipremote_wire::body::DeviceProperties;
use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{hip_version, human_bytes, print_json, print_pairs, print_table, OutputFormat};

#[derive(Serialize)]
struct DeviceInfo {
    index: i32,
    name: String,
    arch: String,
    total_global_mem: u64,
    compute_units: i32,
    clock_khz: i32,
    warp_size: i32,
    max_threads_per_block: i32,
    pci_bus_id: i32,
}

impl DeviceInfo {
    fn new(index: i32, props: DeviceProperties) -> Self {
        Self {
            index,
            name: props.name,
            arch: props.gcn_arch_name,
            total_global_mem: props.total_global_mem,
            compute_units: props.multi_processor_count,
            clock_khz: props.clock_rate,
            warp_size: props.warp_size,
            max_threads_per_block: props.max_threads_per_block,
            pci_bus_id: props.pci_bus_id,
        }
    }
}

#[derive(Serialize)]
struct InfoOutput {
    host: String,
    port: u16,
    ping_latency_ms: Option<f64>,
    runtime_version: i32,
    driver_version: i32,
    device_count: i32,
    devices: Vec<DeviceInfo>,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let client = Client::new(args.remote.client_config()?);
    let result = collect(&client, &args);
    client.shutdown();

    print_info(&result?, format);
    Ok(SUCCESS)
}

fn collect(client: &Client, args: &InfoArgs) -> CliResult<InfoOutput> {
    client.init().map_err(|err| client_error("connect failed", err))?;

    let ping_latency_ms = client
        .ping()
        .ok()
        .map(|d| (d.as_secs_f64() * 1000.0 * 100.0).round() / 100.0);
    let device_count = client
        .device_count()
        .map_err(|err| client_error("device count failed", err))?;
    let devices = (0..device_count)
        .map(|index| {
            client
                .device_properties(index)
                .map(|props| DeviceInfo::new(index, props))
                .map_err(|err| client_error("device properties failed", err))
        })
        .collect::<CliResult<Vec<_>>>()?;

    Ok(InfoOutput {
        host: args.remote.host.clone(),
        port: args.remote.port,
        ping_latency_ms,
        runtime_version: client
            .runtime_version()
            .map_err(|err| client_error("runtime version failed", err))?,
        driver_version: client
            .driver_version()
            .map_err(|err| client_error("driver version failed", err))?,
        device_count,
        devices,
    })
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            print_summary(out);
            let rows = out
                .devices
                .iter()
                .map(|d| {
                    vec![
                        d.index.to_string(),
                        d.name.clone(),
                        d.arch.clone(),
                        human_bytes(d.total_global_mem),
                        d.compute_units.to_string(),
                        format!("{} MHz", d.clock_khz / 1000),
                    ]
                })
                .collect();
            print_table(
                ["DEVICE", "NAME", "ARCH", "MEMORY", "CUs", "CLOCK"]
                    .map(String::from)
                    .to_vec(),
                rows,
            );
        }
        OutputFormat::Pretty => {
            print_summary(out);
            for d in &out.devices {
                print_pairs(
                    &format!("Device {}", d.index),
                    &[
                        ("Name", d.name.clone()),
                        ("Arch", d.arch.clone()),
                        ("Memory", human_bytes(d.total_global_mem)),
                        ("Compute units", d.compute_units.to_string()),
                        ("Clock", format!("{} MHz", d.clock_khz / 1000)),
                        ("Warp size", d.warp_size.to_string()),
                        ("Max threads/block", d.max_threads_per_block.to_string()),
                        ("PCI bus", d.pci_bus_id.to_string()),
                    ],
                );
            }
        }
    }
}

fn print_summary(out: &InfoOutput) {
    let ping = match out.ping_latency_ms {
        Some(ms) => format!("{ms:.2}ms"),
        None => "unavailable".to_string(),
    };
    print_pairs(
        "Worker",
        &[
            ("Address", format!("{}:{}", out.host, out.port)),
            ("Ping", ping),
            ("Runtime", hip_version(out.runtime_version)),
            ("Driver", hip_version(out.driver_version)),
            ("Devices", out.device_count.to_string()),
        ],
    );
}
