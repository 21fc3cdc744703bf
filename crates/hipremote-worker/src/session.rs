use std::io::{Read, Write};
use std::sync::atomic::Ordering;

use bytes::BytesMut;
use hipremote_wire::body::{MemcpyKind, MemcpyRequest};
use hipremote_wire::{
    Flags, Message, MessageReader, MessageWriter, OpCode, SmiStatus, Status, WireBody, WireError,
};
use tracing::{debug, trace, warn};

use crate::error::{Result, WorkerError};
use crate::param_cache::KernelParamCache;
use crate::runtime::GpuRuntime;
use crate::worker::WorkerStats;

/// Whether the sender of a message is waiting for its response.
///
/// Decided per message from `NO_REPLY` and handed to the response path, so
/// a suppressed message can never leak into the next one's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Reply,
    Suppressed,
}

impl ReplyMode {
    /// `NO_REPLY` on an op that must be answered is a protocol violation,
    /// as is a generic device-to-host copy whose data would have nowhere to go.
    pub fn for_message(op: OpCode, msg: &Message) -> Result<Self> {
        if !msg.flags().contains(Flags::NO_REPLY) {
            return Ok(ReplyMode::Reply);
        }
        if !op.accepts_no_reply() {
            return Err(WorkerError::Protocol(format!("{op} sent with NO_REPLY")));
        }
        if matches!(op, OpCode::Memcpy | OpCode::MemcpyAsync) {
            let kind = MemcpyRequest::decode(&msg.payload).map(|req| MemcpyKind::from_raw(req.kind));
            if let Ok(Some(MemcpyKind::DeviceToHost)) = kind {
                return Err(WorkerError::Protocol(format!(
                    "{op} device-to-host sent with NO_REPLY"
                )));
            }
        }
        Ok(ReplyMode::Suppressed)
    }
}

/// Status, fixed body and inline tail of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: i32,
    pub body: BytesMut,
    pub inline: Vec<u8>,
}

impl Reply {
    pub fn ok() -> Self {
        Self::status(Status::SUCCESS)
    }

    pub fn status(status: Status) -> Self {
        Self::raw(status.code())
    }

    pub fn smi(status: SmiStatus) -> Self {
        Self::raw(status.code())
    }

    fn raw(status: i32) -> Self {
        Self {
            status,
            body: BytesMut::new(),
            inline: Vec::new(),
        }
    }

    /// Success carrying `body`.
    pub fn body<B: WireBody>(body: &B) -> Self {
        Self {
            status: 0,
            body: body.encode(),
            inline: Vec::new(),
        }
    }

    pub fn with_inline(mut self, inline: Vec<u8>) -> Self {
        self.inline = inline;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// Runtime handler outcome; `Err` becomes a status-only response.
pub(crate) type Handled = std::result::Result<Reply, Status>;

/// Telemetry handler outcome.
pub(crate) type SmiHandled = std::result::Result<Reply, SmiStatus>;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent `SHUTDOWN`.
    Shutdown,
    /// The client went away (EOF, reset or idle timeout).
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

/// State of one client connection.
///
/// Messages are executed strictly one at a time in arrival order. The
/// runtime and its kernel layouts are borrowed from the worker and outlive
/// the session.
pub struct Session<'a> {
    pub(crate) runtime: &'a mut dyn GpuRuntime,
    pub(crate) params: &'a mut KernelParamCache,
    pub(crate) device: i32,
    pub(crate) max_payload: usize,
    deferred: Option<Status>,
    stats: &'a WorkerStats,
}

impl<'a> Session<'a> {
    pub fn new(
        runtime: &'a mut dyn GpuRuntime,
        params: &'a mut KernelParamCache,
        stats: &'a WorkerStats,
        device: i32,
        max_payload: usize,
    ) -> Self {
        Self {
            runtime,
            params,
            device,
            max_payload,
            deferred: None,
            stats,
        }
    }

    /// Serve messages until `SHUTDOWN` or until the peer goes away.
    ///
    /// Protocol violations end the session with an error.
    pub fn run<R: Read, W: Write>(
        &mut self,
        reader: &mut MessageReader<R>,
        writer: &mut MessageWriter<W>,
    ) -> Result<SessionEnd> {
        loop {
            let msg = match reader.read_message() {
                Ok(msg) => msg,
                Err(WireError::Transport(err)) => {
                    debug!(error = %err, "session closed by peer");
                    return Ok(SessionEnd::Closed);
                }
                Err(err) => return Err(err.into()),
            };
            if self.process(msg, writer)? == Flow::Shutdown {
                return Ok(SessionEnd::Shutdown);
            }
        }
    }

    fn process<W: Write>(&mut self, msg: Message, writer: &mut MessageWriter<W>) -> Result<Flow> {
        self.stats.messages.fetch_add(1, Ordering::Relaxed);
        let op = msg.op()?;
        let mode = ReplyMode::for_message(op, &msg)?;
        let request_id = msg.header.request_id;
        trace!(%op, request_id, ?mode, len = msg.payload.len(), "dispatch");

        let mut reply = self.dispatch(op, &msg);
        self.settle(op, mode, &mut reply);
        send_response(writer, mode, op, request_id, &reply)?;

        Ok(if op == OpCode::Shutdown {
            Flow::Shutdown
        } else {
            Flow::Continue
        })
    }

    fn dispatch(&mut self, op: OpCode, msg: &Message) -> Reply {
        use OpCode::*;

        if op.is_telemetry() {
            return self.telemetry(op, msg).unwrap_or_else(Reply::smi);
        }

        let handled = match op {
            Init => self.init(),
            Shutdown | Ping => Ok(Reply::ok()),

            GetDeviceCount => self.get_device_count(),
            SetDevice => self.set_device(msg),
            GetDevice => self.get_device(),
            GetDeviceProperties => self.get_device_properties(msg),
            DeviceSynchronize => self.device_synchronize(),
            DeviceReset => self.device_reset(),
            DeviceGetAttribute => self.device_get_attribute(msg),
            RuntimeGetVersion => self.runtime_version(),
            DriverGetVersion => self.driver_version(),
            GetLastError => Ok(Reply::status(self.runtime.get_last_error())),
            PeekAtLastError => Ok(Reply::status(self.runtime.peek_last_error())),

            Malloc => self.malloc(msg),
            Free | FreeAsync => self.free(msg),
            Memcpy | MemcpyAsync => self.memcpy(msg),
            MemcpyHtoD | MemcpyHtoDAsync => self.memcpy_htod(msg),
            MemcpyDtoH | MemcpyDtoHAsync => self.memcpy_dtoh(msg),
            MemcpyDtoD | MemcpyDtoDAsync => self.memcpy_dtod(msg),
            Memset | MemsetAsync | MemsetD8 | MemsetD16 | MemsetD32 => self.memset(op, msg),
            MemGetInfo => self.mem_get_info(),

            StreamCreate | StreamCreateWithFlags | StreamCreateWithPriority => {
                self.stream_create(msg)
            }
            StreamDestroy => self.stream_destroy(msg),
            StreamSynchronize => self.stream_synchronize(msg),
            StreamQuery => self.stream_query(msg),
            StreamWaitEvent => self.stream_wait_event(msg),
            EventCreate | EventCreateWithFlags => self.event_create(msg),
            EventDestroy => self.event_destroy(msg),
            EventRecord => self.event_record(msg),
            EventSynchronize => self.event_synchronize(msg),
            EventQuery => self.event_query(msg),
            EventElapsedTime => self.event_elapsed_time(msg),

            ModuleLoadData | ModuleLoadDataEx => self.module_load(msg),
            ModuleUnload => self.module_unload(msg),
            ModuleGetFunction => self.module_get_function(msg),
            LaunchKernel | LaunchCooperativeKernel | ModuleLaunchKernel => self.launch(msg),
            FunctionGetParamLayout => self.function_param_layout(msg),

            _ => {
                debug!(%op, "no handler");
                Err(Status::NOT_SUPPORTED)
            }
        };
        handled.unwrap_or_else(Reply::status)
    }

    /// Apply the deferred-error rule to a reply about to be sent.
    fn settle(&mut self, op: OpCode, mode: ReplyMode, reply: &mut Reply) {
        match mode {
            ReplyMode::Suppressed => {
                if !reply.is_success() {
                    let status = Status(reply.status);
                    debug!(%op, %status, "deferring fire-and-forget error");
                    self.stats.deferred_errors.fetch_add(1, Ordering::Relaxed);
                    self.deferred.get_or_insert(status);
                }
            }
            ReplyMode::Reply if op.is_sync_point() && reply.is_success() => {
                let pending = if op == OpCode::PeekAtLastError {
                    self.deferred
                } else {
                    self.deferred.take()
                };
                if let Some(status) = pending {
                    debug!(%op, %status, "reporting deferred error");
                    *reply = Reply::status(status);
                }
            }
            ReplyMode::Reply => {}
        }
    }

    pub(crate) fn clear_deferred(&mut self) {
        self.deferred = None;
    }
}

/// Write `reply` unless the sender asked for no response.
pub fn send_response<W: Write>(
    writer: &mut MessageWriter<W>,
    mode: ReplyMode,
    op: OpCode,
    request_id: u32,
    reply: &Reply,
) -> Result<()> {
    if mode == ReplyMode::Suppressed {
        return Ok(());
    }
    if reply.status != 0 {
        warn!(%op, request_id, status = %Status(reply.status), "request failed");
    }
    writer.send_response(op.code(), request_id, reply.status, &reply.body, &reply.inline)?;
    Ok(())
}
