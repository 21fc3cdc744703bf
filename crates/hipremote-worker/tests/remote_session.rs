use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hipremote_client::telemetry::sensor;
use hipremote_client::{
    Client, ClientConfig, ClientError, DevicePtr, KernelArgs, LaunchDims, ParamSlot, SmiStatus,
    Status, Stream, TelemetryClient,
};
use hipremote_transport::{ConnectOptions, WorkerSocket};
use hipremote_wire::body::MallocRequest;
use hipremote_wire::{Flags, MessageReader, MessageWriter, OpCode, DEFAULT_MAX_PAYLOAD};
use hipremote_worker::{HostKernel, HostRuntime, Worker, WorkerConfig, WorkerStats};

/// A worker serving a [`HostRuntime`] on an ephemeral loopback port.
struct TestWorker {
    port: u16,
    running: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
    handle: Option<JoinHandle<()>>,
}

impl TestWorker {
    fn start(runtime: HostRuntime) -> Self {
        Self::start_with(runtime, WorkerConfig::default())
    }

    fn start_with(runtime: HostRuntime, config: WorkerConfig) -> Self {
        let socket = WorkerSocket::bind("127.0.0.1:0").expect("loopback bind should succeed");
        let port = socket.local_addr().port();
        let running = Arc::new(AtomicBool::new(true));
        let mut worker = Worker::new(Box::new(runtime), config);
        let stats = worker.stats();

        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || {
            worker.serve(&socket, &flag).expect("worker loop should exit cleanly");
        });

        Self {
            port,
            running,
            stats,
            handle: Some(handle),
        }
    }

    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new("127.0.0.1").with_port(self.port);
        config.connect_timeout = Some(Duration::from_secs(5));
        config.io_timeout = Some(Duration::from_secs(10));
        config
    }

    fn client(&self) -> Client {
        Client::new(self.config())
    }
}

impl Drop for TestWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `fill(ptr, value, count)`: writes `count` copies of a u32.
fn fill_kernel() -> HostKernel {
    HostKernel::new(|mem, _, params| {
        let ptr = u64::from_le_bytes(params[0].try_into().map_err(|_| Status::INVALID_VALUE)?);
        let value: [u8; 4] = params[1].try_into().map_err(|_| Status::INVALID_VALUE)?;
        let count = u32::from_le_bytes(params[2].try_into().map_err(|_| Status::INVALID_VALUE)?);
        let bytes: Vec<u8> = value.iter().copied().cycle().take(4 * count as usize).collect();
        mem.write(ptr, &bytes)
    })
    .with_layout(vec![
        ParamSlot::new(0, 8),
        ParamSlot::new(8, 4),
        ParamSlot::new(12, 4),
    ])
}

/// `bump(ptr)` without metadata: the flat buffer is one pointer.
fn bump_kernel() -> HostKernel {
    HostKernel::new(|mem, _, params| {
        let ptr = u64::from_le_bytes(
            params[0]
                .get(..8)
                .and_then(|b| b.try_into().ok())
                .ok_or(Status::INVALID_VALUE)?,
        );
        let mut byte = [0u8; 1];
        byte.copy_from_slice(mem.read(ptr, 1)?);
        mem.write(ptr, &[byte[0].wrapping_add(1)])
    })
}

fn kernel_runtime() -> HostRuntime {
    let mut runtime = HostRuntime::new();
    runtime
        .register_kernel("fill", fill_kernel())
        .register_kernel("bump", bump_kernel());
    runtime
}

#[test]
fn fire_and_forget_ops_execute_in_submission_order() {
    let worker = TestWorker::start(HostRuntime::new());
    let client = worker.client();

    let a = client.malloc(256).expect("malloc should succeed");
    let b = client.malloc(256).expect("malloc should succeed");
    client.memset(a, 0x5a, 256).expect("memset should be sent");
    client.memcpy_dtod(b, a, 256).expect("copy should be sent");
    client.memset(DevicePtr(a.0 + 16), 0x11, 8).expect("memset should be sent");

    let mut out = vec![0u8; 256];
    client.memcpy_dtoh(&mut out, b).expect("device-to-host copy should succeed");
    assert!(out.iter().all(|&byte| byte == 0x5a));

    client.memcpy_dtoh(&mut out, a).expect("device-to-host copy should succeed");
    assert_eq!(&out[16..24], &[0x11; 8]);
    assert_eq!(out[24], 0x5a);

    client.shutdown();
}

#[test]
fn large_transfers_round_trip() {
    let worker = TestWorker::start(HostRuntime::new());
    let client = worker.client();

    let data: Vec<u8> = (0..1 << 20).map(|i: u32| (i % 251) as u8).collect();
    let ptr = client.malloc(data.len()).expect("malloc should succeed");
    client.memcpy_htod(ptr, &data).expect("upload should be sent");

    let mut back = vec![0u8; data.len()];
    client.memcpy_dtoh(&mut back, ptr).expect("download should succeed");
    assert_eq!(back, data);

    client.shutdown();
}

#[test]
fn deferred_error_surfaces_at_next_sync_point() {
    let worker = TestWorker::start(HostRuntime::new());
    let client = worker.client();

    client
        .free(DevicePtr(0xdead_beef))
        .expect("fire-and-forget free should return immediately");
    let err = client.device_synchronize().unwrap_err();
    assert!(matches!(err, ClientError::Api(Status::INVALID_VALUE)), "{err}");

    client.device_synchronize().expect("slot should be cleared after reporting");
    assert!(worker.stats.deferred_errors.load(Ordering::Relaxed) >= 1);

    client.shutdown();
}

#[test]
fn oversized_upload_keeps_pending_deferred_error() {
    let worker = TestWorker::start(HostRuntime::new());
    let client = worker.client();
    let dst = client.malloc(64).expect("malloc should succeed");

    client
        .free(DevicePtr(0xdead_beef))
        .expect("fire-and-forget free should return immediately");
    let upload = vec![0u8; DEFAULT_MAX_PAYLOAD + 1];
    let err = client.memcpy_htod(dst, &upload).unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)), "{err}");
    assert_eq!(client.connection().sessions_opened(), 1);

    let err = client.device_synchronize().unwrap_err();
    assert!(matches!(err, ClientError::Api(Status::INVALID_VALUE)), "{err}");
    assert_eq!(client.connection().sessions_opened(), 1);

    client.shutdown();
}

#[test]
fn synchronous_mode_reports_errors_immediately() {
    let worker = TestWorker::start(HostRuntime::new());
    let mut config = worker.config();
    config.fire_and_forget = false;
    let client = Client::new(config);

    let err = client.free(DevicePtr(0xdead_beef)).unwrap_err();
    assert!(matches!(err, ClientError::Api(Status::INVALID_VALUE)), "{err}");
    client.device_synchronize().expect("nothing should be deferred");

    client.shutdown();
}

#[test]
fn device_queries_answer() {
    let worker = TestWorker::start(HostRuntime::new().with_device_count(2));
    let client = worker.client();

    assert_eq!(client.device_count().expect("device count"), 2);
    client.set_device(1).expect("set device should succeed");
    assert_eq!(client.device().expect("current device"), 1);
    let err = client.set_device(5).unwrap_err();
    assert!(matches!(err, ClientError::Api(Status::INVALID_DEVICE)), "{err}");

    let props = client.device_properties(0).expect("properties");
    assert!(!props.name.is_empty());
    assert!(client.runtime_version().expect("runtime version") > 0);

    let (free, total) = client.mem_get_info().expect("memory info");
    assert_eq!(free, total);

    client.shutdown();
}

#[test]
fn launch_slices_arguments_with_layout() {
    let worker = TestWorker::start(kernel_runtime());
    let client = worker.client();

    let module = client.module_load_data(b"\x7fELF-test").expect("module load");
    let fill = client.module_get_function(module, "fill").expect("function lookup");
    assert_eq!(
        client.function_param_layout(fill).expect("layout query"),
        vec![ParamSlot::new(0, 8), ParamSlot::new(8, 4), ParamSlot::new(12, 4)]
    );

    let ptr = client.malloc(64).expect("malloc should succeed");
    let mut args = KernelArgs::new();
    args.push(ptr).push(0xcafe_f00du32).push(16u32);
    client
        .launch_kernel(fill, LaunchDims::linear(1, 64), Stream::NULL, args.as_bytes())
        .expect("launch should be sent");

    let mut out = [0u8; 64];
    client.memcpy_dtoh(&mut out, ptr).expect("download should succeed");
    assert!(out
        .chunks_exact(4)
        .all(|word| u32::from_le_bytes(word.try_into().unwrap()) == 0xcafe_f00d));

    client.shutdown();
}

#[test]
fn launch_with_truncated_arguments_is_rejected() {
    let worker = TestWorker::start(kernel_runtime());
    let client = worker.client();

    let module = client.module_load_data(b"\x7fELF-test").expect("module load");
    let fill = client.module_get_function(module, "fill").expect("function lookup");
    let ptr = client.malloc(64).expect("malloc should succeed");
    let mut args = KernelArgs::new();
    args.push(ptr).push(1u32);
    client
        .launch_kernel(fill, LaunchDims::linear(1, 1), Stream::NULL, args.as_bytes())
        .expect("launch should be sent");

    let err = client.device_synchronize().unwrap_err();
    assert!(matches!(err, ClientError::Api(Status::INVALID_VALUE)), "{err}");

    client.shutdown();
}

#[test]
fn launch_without_layout_passes_flat_buffer() {
    let worker = TestWorker::start(kernel_runtime());
    let client = worker.client();

    let module = client.module_load_data(b"\x7fELF-test").expect("module load");
    let bump = client.module_get_function(module, "bump").expect("function lookup");
    let err = client.function_param_layout(bump).unwrap_err();
    assert!(matches!(err, ClientError::Api(Status::NOT_SUPPORTED)), "{err}");

    let ptr = client.malloc(1).expect("malloc should succeed");
    client.memset(ptr, 41, 1).expect("memset should be sent");
    let mut args = KernelArgs::new();
    args.push(ptr);
    for _ in 0..2 {
        client
            .launch_kernel(bump, LaunchDims::linear(1, 1), Stream::NULL, args.as_bytes())
            .expect("launch should be sent");
    }

    let mut out = [0u8; 1];
    client.memcpy_dtoh(&mut out, ptr).expect("download should succeed");
    assert_eq!(out[0], 43);

    client.module_unload(module).expect("unload should succeed");
    client.shutdown();
}

#[test]
fn streams_and_events_time_work() {
    let worker = TestWorker::start(HostRuntime::new());
    let client = worker.client();

    let stream = client.stream_create().expect("stream create");
    let start = client.event_create().expect("event create");
    let end = client.event_create().expect("event create");
    client.event_record(start, stream).expect("record should be sent");
    let ptr = client.malloc(4096).expect("malloc should succeed");
    client.memset_async(ptr, 0, 4096, stream).expect("memset should be sent");
    client.event_record(end, stream).expect("record should be sent");

    client.event_synchronize(end).expect("event synchronize");
    assert!(client.stream_query(stream).expect("stream query"));
    assert!(client.event_query(end).expect("event query"));
    let elapsed = client.event_elapsed_time(start, end).expect("elapsed time");
    assert!(elapsed >= 0.0);

    client.stream_destroy(stream).expect("stream destroy");
    let err = client.stream_synchronize(stream).unwrap_err();
    assert!(matches!(err, ClientError::Api(Status::INVALID_HANDLE)), "{err}");

    client.shutdown();
}

#[test]
fn client_reconnects_after_worker_closes_idle_session() {
    let config = WorkerConfig {
        idle_timeout: Some(Duration::from_millis(200)),
        ..WorkerConfig::default()
    };
    let worker = TestWorker::start_with(HostRuntime::new(), config);
    let client = worker.client();

    assert_eq!(client.device_count().expect("device count"), 1);
    thread::sleep(Duration::from_millis(600));
    assert_eq!(client.device_count().expect("device count after idle close"), 1);
    assert_eq!(client.connection().sessions_opened(), 2);

    client.shutdown();
}

#[test]
fn no_reply_on_handle_returning_op_closes_connection() {
    let worker = TestWorker::start(HostRuntime::new());
    let stream = WorkerSocket::connect("127.0.0.1", worker.port, &ConnectOptions::default())
        .expect("raw connect should succeed");

    let mut writer = MessageWriter::new(stream.try_clone().expect("clone should succeed"));
    writer
        .send_request(
            OpCode::Malloc,
            1,
            Flags::NO_REPLY,
            &MallocRequest { size: 64, flags: 0 },
            &[],
        )
        .expect("request should be written");

    let mut reader = MessageReader::new(stream);
    assert!(reader.read_message().is_err(), "worker should close without replying");

    let client = worker.client();
    assert_eq!(client.device_count().expect("worker should accept again"), 1);
    client.shutdown();
    assert_eq!(worker.stats.protocol_errors.load(Ordering::Relaxed), 1);
}

#[test]
fn telemetry_session_reads_host_metrics() {
    let worker = TestWorker::start(HostRuntime::new());
    let smi = TelemetryClient::new(worker.config());

    assert_eq!(smi.processor_count().expect("processor count"), 1);
    let vram = smi.vram_usage(0).expect("vram usage");
    assert!(vram.total > 0);
    assert_eq!(smi.temperature(0, sensor::EDGE).expect("edge temperature"), 40);

    let err = smi.gpu_metrics(3).unwrap_err();
    assert!(matches!(err, ClientError::Smi(SmiStatus::NOT_FOUND)), "{err}");

    smi.shutdown();
}

#[test]
fn responses_never_leak_across_messages() {
    let mut script = MessageWriter::new(Cursor::new(Vec::new()));
    script
        .send_request(OpCode::Init, 1, Flags::NONE, &(), &[])
        .expect("script write");
    script
        .send_request(
            OpCode::Malloc,
            2,
            Flags::NONE,
            &MallocRequest { size: 8, flags: 0 },
            &[],
        )
        .expect("script write");
    let script = script.into_inner().into_inner();

    let worker = TestWorker::start(HostRuntime::new());
    let stream = WorkerSocket::connect("127.0.0.1", worker.port, &ConnectOptions::default())
        .expect("raw connect should succeed");
    let mut raw = stream.try_clone().expect("clone should succeed");
    std::io::Write::write_all(&mut raw, &script).expect("script should be written");

    let mut reader = MessageReader::new(stream);
    let init = reader.read_message().expect("INIT response");
    assert_eq!(init.header.request_id, 1);
    assert!(init.flags().contains(Flags::RESPONSE));
    let malloc = reader.read_message().expect("MALLOC response");
    assert_eq!(malloc.header.request_id, 2);
    assert_eq!(malloc.status().expect("status"), Status::SUCCESS);
}
