//! Typed HIP runtime API over a [`Connection`].

use std::time::{Duration, Instant};

use hipremote_wire::body::{
    DeviceAttributeRequest, DeviceProperties, DeviceRequest, ElapsedTimeRequest,
    ElapsedTimeResponse, EventCreateRequest, EventRecordRequest, GetFunctionRequest,
    GetFunctionResponse, HandleValue, IntValue, LaunchRequest, MallocRequest, MemGetInfoResponse,
    MemcpyKind, MemcpyRequest, MemsetRequest, ModuleLoadRequest, ParamLayoutResponse,
    StreamCreateRequest, StreamWaitEventRequest,
};
use hipremote_wire::{DevicePtr, OpCode, ParamSlot, Status, WireBody};

use crate::config::ClientConfig;
use crate::connection::{Connection, Handshake};
use crate::error::{ClientError, Result};
use crate::handles::{Event, Function, LaunchDims, Module, Stream};

/// Remote HIP runtime.
///
/// Cheap to share across threads by reference; calls are serialized on the
/// underlying connection.
#[derive(Debug)]
pub struct Client {
    conn: Connection,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            conn: Connection::new(config, Handshake::Runtime),
        }
    }

    /// Build a client from `HIP_REMOTE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        ClientConfig::from_env().map(Self::new)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Connect now instead of on the first call.
    pub fn init(&self) -> Result<()> {
        self.conn.ensure_connected()
    }

    /// Close the session. A later call reconnects.
    pub fn shutdown(&self) {
        self.conn.disconnect();
    }

    /// Round-trip time of an empty request.
    pub fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.call_status(OpCode::Ping, &())?;
        Ok(started.elapsed())
    }

    // ----- device -----

    pub fn device_count(&self) -> Result<i32> {
        self.call::<_, IntValue>(OpCode::GetDeviceCount, &())
            .map(|v| v.value)
    }

    pub fn set_device(&self, device: i32) -> Result<()> {
        self.call_status(OpCode::SetDevice, &DeviceRequest { device })
    }

    pub fn device(&self) -> Result<i32> {
        self.call::<_, IntValue>(OpCode::GetDevice, &()).map(|v| v.value)
    }

    pub fn device_properties(&self, device: i32) -> Result<DeviceProperties> {
        self.call(OpCode::GetDeviceProperties, &DeviceRequest { device })
    }

    pub fn device_attribute(&self, attribute: i32, device: i32) -> Result<i32> {
        self.call::<_, IntValue>(
            OpCode::DeviceGetAttribute,
            &DeviceAttributeRequest { attribute, device },
        )
        .map(|v| v.value)
    }

    /// Wait for all device work. Also reports any deferred error.
    pub fn device_synchronize(&self) -> Result<()> {
        self.call_status(OpCode::DeviceSynchronize, &())
    }

    pub fn device_reset(&self) -> Result<()> {
        self.call_status(OpCode::DeviceReset, &())
    }

    pub fn runtime_version(&self) -> Result<i32> {
        self.call::<_, IntValue>(OpCode::RuntimeGetVersion, &())
            .map(|v| v.value)
    }

    pub fn driver_version(&self) -> Result<i32> {
        self.call::<_, IntValue>(OpCode::DriverGetVersion, &())
            .map(|v| v.value)
    }

    /// Return and clear the worker's sticky error for this session.
    pub fn last_error(&self) -> Result<Status> {
        self.query_status(OpCode::GetLastError)
    }

    /// Return the worker's sticky error without clearing it.
    pub fn peek_last_error(&self) -> Result<Status> {
        self.query_status(OpCode::PeekAtLastError)
    }

    // ----- memory -----

    pub fn malloc(&self, size: usize) -> Result<DevicePtr> {
        self.call::<_, HandleValue>(
            OpCode::Malloc,
            &MallocRequest {
                size: size as u64,
                flags: 0,
            },
        )
        .map(|h| DevicePtr(h.value))
    }

    pub fn mem_get_info(&self) -> Result<(u64, u64)> {
        self.call::<_, MemGetInfoResponse>(OpCode::MemGetInfo, &())
            .map(|info| (info.free, info.total))
    }

    pub fn free(&self, ptr: DevicePtr) -> Result<()> {
        self.submit(OpCode::Free, &HandleValue { value: ptr.0 }, &[])
    }

    pub fn memcpy_htod(&self, dst: DevicePtr, src: &[u8]) -> Result<()> {
        self.submit(
            OpCode::MemcpyHtoD,
            &copy_request(dst.0, 0, src.len(), MemcpyKind::HostToDevice, Stream::NULL),
            src,
        )
    }

    pub fn memcpy_htod_async(&self, dst: DevicePtr, src: &[u8], stream: Stream) -> Result<()> {
        self.submit(
            OpCode::MemcpyHtoDAsync,
            &copy_request(dst.0, 0, src.len(), MemcpyKind::HostToDevice, stream),
            src,
        )
    }

    /// Copy device memory into `dst`.
    ///
    /// Synchronizing: also reports any deferred error.
    pub fn memcpy_dtoh(&self, dst: &mut [u8], src: DevicePtr) -> Result<()> {
        self.receive(OpCode::MemcpyDtoH, dst, src, Stream::NULL)
    }

    pub fn memcpy_dtoh_async(&self, dst: &mut [u8], src: DevicePtr, stream: Stream) -> Result<()> {
        self.receive(OpCode::MemcpyDtoHAsync, dst, src, stream)
    }

    pub fn memcpy_dtod(&self, dst: DevicePtr, src: DevicePtr, size: usize) -> Result<()> {
        self.submit(
            OpCode::MemcpyDtoD,
            &copy_request(dst.0, src.0, size, MemcpyKind::DeviceToDevice, Stream::NULL),
            &[],
        )
    }

    pub fn memcpy_dtod_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        size: usize,
        stream: Stream,
    ) -> Result<()> {
        self.submit(
            OpCode::MemcpyDtoDAsync,
            &copy_request(dst.0, src.0, size, MemcpyKind::DeviceToDevice, stream),
            &[],
        )
    }

    /// Fill `size` bytes with `value`.
    pub fn memset(&self, dst: DevicePtr, value: u8, size: usize) -> Result<()> {
        self.submit(
            OpCode::Memset,
            &fill_request(dst, i32::from(value), size, Stream::NULL),
            &[],
        )
    }

    pub fn memset_async(&self, dst: DevicePtr, value: u8, size: usize, stream: Stream) -> Result<()> {
        self.submit(
            OpCode::MemsetAsync,
            &fill_request(dst, i32::from(value), size, stream),
            &[],
        )
    }

    /// Fill `count` 32-bit words with `value`.
    pub fn memset_d32(&self, dst: DevicePtr, value: u32, count: usize) -> Result<()> {
        self.submit(
            OpCode::MemsetD32,
            &fill_request(dst, value as i32, count, Stream::NULL),
            &[],
        )
    }

    // ----- streams -----

    pub fn stream_create(&self) -> Result<Stream> {
        self.stream_create_with_priority(0, 0)
    }

    pub fn stream_create_with_flags(&self, flags: u32) -> Result<Stream> {
        self.call::<_, HandleValue>(
            OpCode::StreamCreateWithFlags,
            &StreamCreateRequest { flags, priority: 0 },
        )
        .map(|h| Stream(h.value))
    }

    pub fn stream_create_with_priority(&self, flags: u32, priority: i32) -> Result<Stream> {
        let op = if flags == 0 && priority == 0 {
            OpCode::StreamCreate
        } else {
            OpCode::StreamCreateWithPriority
        };
        self.call::<_, HandleValue>(op, &StreamCreateRequest { flags, priority })
            .map(|h| Stream(h.value))
    }

    pub fn stream_destroy(&self, stream: Stream) -> Result<()> {
        self.call_status(OpCode::StreamDestroy, &HandleValue { value: stream.0 })
    }

    pub fn stream_synchronize(&self, stream: Stream) -> Result<()> {
        self.call_status(OpCode::StreamSynchronize, &HandleValue { value: stream.0 })
    }

    /// `true` once all work on `stream` has completed.
    pub fn stream_query(&self, stream: Stream) -> Result<bool> {
        self.ready(OpCode::StreamQuery, &HandleValue { value: stream.0 })
    }

    pub fn stream_wait_event(&self, stream: Stream, event: Event) -> Result<()> {
        self.call_status(
            OpCode::StreamWaitEvent,
            &StreamWaitEventRequest {
                stream: stream.0,
                event: event.0,
                flags: 0,
            },
        )
    }

    // ----- events -----

    pub fn event_create(&self) -> Result<Event> {
        self.call::<_, HandleValue>(OpCode::EventCreate, &EventCreateRequest { flags: 0 })
            .map(|h| Event(h.value))
    }

    pub fn event_create_with_flags(&self, flags: u32) -> Result<Event> {
        self.call::<_, HandleValue>(
            OpCode::EventCreateWithFlags,
            &EventCreateRequest { flags },
        )
        .map(|h| Event(h.value))
    }

    pub fn event_destroy(&self, event: Event) -> Result<()> {
        self.call_status(OpCode::EventDestroy, &HandleValue { value: event.0 })
    }

    pub fn event_record(&self, event: Event, stream: Stream) -> Result<()> {
        self.submit(
            OpCode::EventRecord,
            &EventRecordRequest {
                event: event.0,
                stream: stream.0,
            },
            &[],
        )
    }

    pub fn event_synchronize(&self, event: Event) -> Result<()> {
        self.call_status(OpCode::EventSynchronize, &HandleValue { value: event.0 })
    }

    /// `true` once the work captured by `event` has completed.
    pub fn event_query(&self, event: Event) -> Result<bool> {
        self.ready(OpCode::EventQuery, &HandleValue { value: event.0 })
    }

    /// Milliseconds between two recorded events.
    pub fn event_elapsed_time(&self, start: Event, end: Event) -> Result<f32> {
        self.call::<_, ElapsedTimeResponse>(
            OpCode::EventElapsedTime,
            &ElapsedTimeRequest {
                start: start.0,
                end: end.0,
            },
        )
        .map(|r| r.milliseconds)
    }

    // ----- modules and launch -----

    /// Load a code object image onto the device.
    pub fn module_load_data(&self, image: &[u8]) -> Result<Module> {
        if image.is_empty() {
            return Err(ClientError::InvalidArgument("empty code object".to_string()));
        }
        let response = self.conn.request(
            OpCode::ModuleLoadData,
            &ModuleLoadRequest {
                data_size: image.len() as u64,
            },
            image,
        )?;
        Self::decode::<HandleValue>(&response).map(|h| Module(h.value))
    }

    pub fn module_unload(&self, module: Module) -> Result<()> {
        self.call_status(OpCode::ModuleUnload, &HandleValue { value: module.0 })
    }

    pub fn module_get_function(&self, module: Module, name: &str) -> Result<Function> {
        let request = GetFunctionRequest::new(module.0, name)
            .map_err(|err| ClientError::InvalidArgument(err.to_string()))?;
        self.call::<_, GetFunctionResponse>(OpCode::ModuleGetFunction, &request)
            .map(|r| Function(r.function))
    }

    /// Parameter layout the worker will use to slice flat argument buffers.
    ///
    /// Fails with `NOT_SUPPORTED` when the worker has no metadata for
    /// `function`.
    pub fn function_param_layout(&self, function: Function) -> Result<Vec<ParamSlot>> {
        let response = self.conn.request(
            OpCode::FunctionGetParamLayout,
            &HandleValue { value: function.0 },
            &[],
        )?;
        let header = Self::decode::<ParamLayoutResponse>(&response)?;
        let (_, tail) = response.response::<ParamLayoutResponse>()?;

        let mut rest: &[u8] = &tail;
        let mut slots = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let (slot, next) = ParamSlot::split(rest)?;
            slots.push(slot);
            rest = next;
        }
        Ok(slots)
    }

    /// Launch `function` with a flat argument buffer.
    ///
    /// `args` must follow the function's parameter layout; see
    /// [`hipremote_wire::KernelArgs`]. Fire-and-forget when enabled: launch
    /// failures surface at the next synchronizing call.
    pub fn launch_kernel(
        &self,
        function: Function,
        dims: LaunchDims,
        stream: Stream,
        args: &[u8],
    ) -> Result<()> {
        let request = LaunchRequest {
            function: function.0,
            grid_x: dims.grid[0],
            grid_y: dims.grid[1],
            grid_z: dims.grid[2],
            block_x: dims.block[0],
            block_y: dims.block[1],
            block_z: dims.block[2],
            shared_mem_bytes: dims.shared_mem_bytes,
            stream: stream.0,
            arg_size: args.len() as u32,
        };
        self.submit(OpCode::ModuleLaunchKernel, &request, args)
    }

    // ----- plumbing -----

    fn call<B: WireBody, R: WireBody>(&self, op: OpCode, body: &B) -> Result<R> {
        let response = self.conn.request(op, body, &[])?;
        Self::decode(&response)
    }

    fn call_status<B: WireBody>(&self, op: OpCode, body: &B) -> Result<()> {
        self.call::<B, ()>(op, body)
    }

    fn decode<R: WireBody>(response: &hipremote_wire::Message) -> Result<R> {
        response.status()?.ok().map_err(ClientError::Api)?;
        Ok(response.response::<R>()?.0)
    }

    /// Send an asynchronous op, fire-and-forget when configured.
    fn submit<B: WireBody>(&self, op: OpCode, body: &B, inline: &[u8]) -> Result<()> {
        if self.conn.config().fire_and_forget {
            self.conn.send_no_reply(op, body, inline)
        } else {
            let response = self.conn.request(op, body, inline)?;
            Self::decode::<()>(&response)
        }
    }

    fn receive(&self, op: OpCode, dst: &mut [u8], src: DevicePtr, stream: Stream) -> Result<()> {
        let request = copy_request(0, src.0, dst.len(), MemcpyKind::DeviceToHost, stream);
        let (response, copied) = self.conn.request_receive_data(op, &request, 0, dst)?;
        Self::decode::<()>(&response)?;
        if copied < dst.len() {
            return Err(ClientError::ShortTransfer {
                expected: dst.len(),
                received: copied,
            });
        }
        Ok(())
    }

    /// Queries answer `NOT_READY` while work is pending.
    fn ready<B: WireBody>(&self, op: OpCode, body: &B) -> Result<bool> {
        match self.call_status(op, body) {
            Ok(()) => Ok(true),
            Err(ClientError::Api(Status::NOT_READY)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Ops whose status is the result rather than the outcome.
    fn query_status(&self, op: OpCode) -> Result<Status> {
        let response = self.conn.request(op, &(), &[])?;
        Ok(response.status()?)
    }
}

fn copy_request(dst: u64, src: u64, size: usize, kind: MemcpyKind, stream: Stream) -> MemcpyRequest {
    MemcpyRequest {
        dst,
        src,
        size: size as u64,
        kind: kind as i32,
        stream: stream.0,
    }
}

fn fill_request(dst: DevicePtr, value: i32, size: usize, stream: Stream) -> MemsetRequest {
    MemsetRequest {
        dst: dst.0,
        value,
        size: size as u64,
        stream: stream.0,
    }
}
