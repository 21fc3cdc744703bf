use bytes::Bytes;

use crate::body::WireBody;
use crate::error::{Result, WireError};
use crate::header::{Flags, Header, DEFAULT_MAX_PAYLOAD};
use crate::opcode::OpCode;
use crate::status::{SmiStatus, Status};

/// Configuration shared by [`crate::MessageReader`] and [`crate::MessageWriter`].
#[derive(Debug, Clone)]
pub struct MessageConfig {
    /// Maximum payload size in bytes. Default: 64 MiB.
    pub max_payload_size: usize,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// One complete message: validated header plus the whole payload.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub payload: Bytes,
}

impl Message {
    /// Resolve the op code; unknown codes are protocol errors.
    pub fn op(&self) -> Result<OpCode> {
        OpCode::try_from(self.header.op_code)
    }

    pub fn flags(&self) -> Flags {
        self.header.flags
    }

    /// Decode a request body and return the inline tail after it.
    pub fn request<T: WireBody>(&self) -> Result<(T, Bytes)> {
        let (body, tail) = T::split(&self.payload)?;
        let tail_start = self.payload.len() - tail.len();
        Ok((body, self.payload.slice(tail_start..)))
    }

    /// Leading `i32` status of a response.
    ///
    /// A response without any payload is treated as success.
    pub fn raw_status(&self) -> Result<i32> {
        match self.payload.len() {
            0 => Ok(0),
            n if n < 4 => Err(WireError::Truncated {
                what: "response status",
                needed: 4,
                available: n,
            }),
            _ => {
                let p = &self.payload;
                Ok(i32::from_le_bytes([p[0], p[1], p[2], p[3]]))
            }
        }
    }

    /// Runtime status of a response.
    pub fn status(&self) -> Result<Status> {
        self.raw_status().map(Status)
    }

    /// Telemetry status of a response.
    pub fn smi_status(&self) -> Result<SmiStatus> {
        self.raw_status().map(SmiStatus)
    }

    /// Decode a response body following the status, plus its inline tail.
    pub fn response<T: WireBody>(&self) -> Result<(T, Bytes)> {
        let after_status = self.payload.len().min(4);
        let (body, tail) = T::split(&self.payload[after_status..])?;
        let tail_start = self.payload.len() - tail.len();
        Ok((body, self.payload.slice(tail_start..)))
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::body::{HandleValue, MemcpyRequest};

    fn message(op: OpCode, payload: BytesMut) -> Message {
        Message {
            header: Header::new(op.code(), 1, payload.len() as u32, Flags::NONE),
            payload: payload.freeze(),
        }
    }

    #[test]
    fn test_request_splits_inline_tail() {
        let mut payload = MemcpyRequest {
            dst: 0x10,
            size: 3,
            kind: 1,
            ..MemcpyRequest::default()
        }
        .encode();
        payload.put_slice(b"abc");

        let msg = message(OpCode::Memcpy, payload);
        let (req, tail) = msg.request::<MemcpyRequest>().unwrap();
        assert_eq!(req.dst, 0x10);
        assert_eq!(tail.as_ref(), b"abc");
    }

    #[test]
    fn test_response_status_and_body() {
        let mut payload = BytesMut::new();
        payload.put_i32_le(0);
        payload.put_u64_le(0xfeed);

        let msg = message(OpCode::Malloc, payload);
        assert_eq!(msg.status().unwrap(), Status::SUCCESS);
        let (handle, tail) = msg.response::<HandleValue>().unwrap();
        assert_eq!(handle.value, 0xfeed);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_error_response_without_body() {
        let mut payload = BytesMut::new();
        payload.put_i32_le(Status::OUT_OF_MEMORY.code());

        let msg = message(OpCode::Malloc, payload);
        assert_eq!(msg.status().unwrap(), Status::OUT_OF_MEMORY);
        assert!(matches!(
            msg.response::<HandleValue>(),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn test_empty_response_is_success() {
        let msg = message(OpCode::Shutdown, BytesMut::new());
        assert_eq!(msg.status().unwrap(), Status::SUCCESS);
    }

    #[test]
    fn test_unknown_op_surfaces_on_access() {
        let msg = Message {
            header: Header::new(0x0999, 1, 0, Flags::NONE),
            payload: Bytes::new(),
        };
        assert!(matches!(msg.op(), Err(WireError::UnknownOpCode(0x0999))));
    }
}
