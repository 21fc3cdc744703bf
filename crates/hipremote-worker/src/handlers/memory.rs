use hipremote_wire::body::{
    HandleValue, MallocRequest, MemGetInfoResponse, MemcpyKind, MemcpyRequest, MemsetRequest,
};
use hipremote_wire::{Message, OpCode, Status};
use tracing::debug;

use super::request;
use crate::runtime::FillPattern;
use crate::session::{Handled, Reply, Session};

/// Bytes of a response payload taken by the leading status.
const STATUS_SIZE: usize = 4;

impl Session<'_> {
    pub(crate) fn malloc(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<MallocRequest>(msg)?;
        let ptr = self.runtime.malloc(req.size)?;
        Ok(Reply::body(&HandleValue { value: ptr }))
    }

    pub(crate) fn free(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<HandleValue>(msg)?;
        self.runtime.free(req.value)?;
        Ok(Reply::ok())
    }

    pub(crate) fn mem_get_info(&mut self) -> Handled {
        let (free, total) = self.runtime.mem_get_info()?;
        Ok(Reply::body(&MemGetInfoResponse { free, total }))
    }

    /// `MEMCPY`/`MEMCPY_ASYNC`: direction taken from the request's kind.
    pub(crate) fn memcpy(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<MemcpyRequest>(msg)?;
        match MemcpyKind::from_raw(req.kind) {
            Some(MemcpyKind::HostToDevice) => self.memcpy_htod(msg),
            Some(MemcpyKind::DeviceToHost) => self.memcpy_dtoh(msg),
            Some(MemcpyKind::DeviceToDevice) => self.memcpy_dtod(msg),
            kind => {
                debug!(raw = req.kind, ?kind, "unsupported memcpy direction");
                Err(Status::INVALID_MEMCPY_DIRECTION)
            }
        }
    }

    pub(crate) fn memcpy_htod(&mut self, msg: &Message) -> Handled {
        let (req, data) = request::<MemcpyRequest>(msg)?;
        let size = usize::try_from(req.size).map_err(|_| Status::INVALID_VALUE)?;
        if data.len() < size {
            debug!(size, inline = data.len(), "host-to-device copy short of data");
            return Err(Status::INVALID_VALUE);
        }
        self.runtime.memcpy_htod(req.dst, &data[..size], req.stream)?;
        Ok(Reply::ok())
    }

    /// The copied bytes travel back inline after the status.
    pub(crate) fn memcpy_dtoh(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<MemcpyRequest>(msg)?;
        let size = usize::try_from(req.size).map_err(|_| Status::INVALID_VALUE)?;
        if size.saturating_add(STATUS_SIZE) > self.max_payload {
            debug!(size, max = self.max_payload, "device-to-host copy exceeds payload limit");
            return Err(Status::INVALID_VALUE);
        }
        let mut data = vec![0u8; size];
        self.runtime.memcpy_dtoh(&mut data, req.src, req.stream)?;
        Ok(Reply::ok().with_inline(data))
    }

    pub(crate) fn memcpy_dtod(&mut self, msg: &Message) -> Handled {
        let (req, _) = request::<MemcpyRequest>(msg)?;
        self.runtime.memcpy_dtod(req.dst, req.src, req.size, req.stream)?;
        Ok(Reply::ok())
    }

    /// `MEMSET*`: byte fills count bytes, `D16`/`D32` count elements.
    pub(crate) fn memset(&mut self, op: OpCode, msg: &Message) -> Handled {
        let (req, _) = request::<MemsetRequest>(msg)?;
        let pattern = match op {
            OpCode::MemsetD16 => FillPattern::U16(req.value as u16),
            OpCode::MemsetD32 => FillPattern::U32(req.value as u32),
            _ => FillPattern::U8(req.value as u8),
        };
        self.runtime.memset(req.dst, pattern, req.size, req.stream)?;
        Ok(Reply::ok())
    }
}
