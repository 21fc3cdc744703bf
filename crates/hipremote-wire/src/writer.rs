use std::io::Write;

use bytes::{BufMut, BytesMut};
use hipremote_transport::send_all;

use crate::body::WireBody;
use crate::error::{Result, WireError};
use crate::header::{encode_header, Flags, Header, HEADER_SIZE};
use crate::message::MessageConfig;
use crate::opcode::OpCode;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Inline tails up to this size are coalesced with the header into one write.
const COALESCE_LIMIT: usize = 64 * 1024;

/// Writes complete messages to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: MessageConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, MessageConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: MessageConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Send a request: fixed body plus optional inline tail.
    pub fn send_request<B: WireBody>(
        &mut self,
        op: OpCode,
        request_id: u32,
        flags: Flags,
        body: &B,
        inline: &[u8],
    ) -> Result<()> {
        self.buf.clear();
        self.buf.reserve(HEADER_SIZE + B::SIZE);
        body.put(&mut self.buf);
        let fixed = self.buf.split();
        self.send_raw(op.code(), request_id, flags, &fixed, inline)
    }

    /// Send a response: status, fixed body, optional inline tail.
    ///
    /// `RESPONSE` is always set, `ERROR` when `status` is non-zero.
    pub fn send_response(
        &mut self,
        op_code: u16,
        request_id: u32,
        status: i32,
        body: &[u8],
        inline: &[u8],
    ) -> Result<()> {
        let mut flags = Flags::RESPONSE;
        if status != 0 {
            flags |= Flags::ERROR;
        }

        self.buf.clear();
        self.buf.reserve(HEADER_SIZE + 4 + body.len());
        self.buf.put_i32_le(status);
        self.buf.put_slice(body);
        let fixed = self.buf.split();
        self.send_raw(op_code, request_id, flags, &fixed, inline)
    }

    /// Encode and send one message.
    ///
    /// `HAS_INLINE_DATA` is set whenever `inline` is non-empty.
    pub fn send_raw(
        &mut self,
        op_code: u16,
        request_id: u32,
        mut flags: Flags,
        fixed: &[u8],
        inline: &[u8],
    ) -> Result<()> {
        let len = fixed.len() + inline.len();
        if len > self.config.max_payload_size || len > u32::MAX as usize {
            return Err(WireError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        if !inline.is_empty() {
            flags |= Flags::HAS_INLINE_DATA;
        }

        let header = Header::new(op_code, request_id, len as u32, flags);
        self.buf.clear();
        encode_header(&header, &mut self.buf);
        self.buf.put_slice(fixed);

        if inline.len() <= COALESCE_LIMIT {
            self.buf.put_slice(inline);
            send_all(&mut self.inner, &self.buf)?;
        } else {
            send_all(&mut self.inner, &self.buf)?;
            send_all(&mut self.inner, inline)?;
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &MessageConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::body::{HandleValue, MemcpyRequest};
    use crate::reader::MessageReader;
    use crate::status::Status;

    fn written(writer: MessageWriter<Cursor<Vec<u8>>>) -> MessageReader<Cursor<Vec<u8>>> {
        MessageReader::new(Cursor::new(writer.into_inner().into_inner()))
    }

    #[test]
    fn send_request_with_inline_tail() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::new()));
        let req = MemcpyRequest {
            dst: 0x4000,
            size: 5,
            kind: 1,
            ..MemcpyRequest::default()
        };
        writer
            .send_request(OpCode::Memcpy, 3, Flags::NO_REPLY, &req, b"bytes")
            .unwrap();

        let msg = written(writer).read_message().unwrap();
        assert_eq!(msg.op().unwrap(), OpCode::Memcpy);
        assert_eq!(msg.header.payload_length as usize, MemcpyRequest::SIZE + 5);
        assert!(msg.flags().contains(Flags::NO_REPLY | Flags::HAS_INLINE_DATA));
        let (decoded, tail) = msg.request::<MemcpyRequest>().unwrap();
        assert_eq!(decoded, req);
        assert_eq!(tail.as_ref(), b"bytes");
    }

    #[test]
    fn send_request_without_inline_has_no_inline_flag() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::new()));
        writer
            .send_request(OpCode::Init, 1, Flags::NONE, &(), &[])
            .unwrap();

        let msg = written(writer).read_message().unwrap();
        assert_eq!(msg.header.payload_length, 0);
        assert_eq!(msg.flags(), Flags::NONE);
    }

    #[test]
    fn send_response_sets_flags_and_status() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::new()));
        writer
            .send_response(OpCode::Malloc.code(), 9, 0, &HandleValue { value: 7 }.encode(), &[])
            .unwrap();
        writer
            .send_response(OpCode::Free.code(), 10, Status::INVALID_VALUE.code(), &[], &[])
            .unwrap();

        let mut reader = written(writer);
        let ok = reader.read_message().unwrap();
        assert_eq!(ok.flags(), Flags::RESPONSE);
        assert_eq!(ok.status().unwrap(), Status::SUCCESS);
        assert_eq!(ok.response::<HandleValue>().unwrap().0.value, 7);

        let failed = reader.read_message().unwrap();
        assert_eq!(failed.flags(), Flags::RESPONSE | Flags::ERROR);
        assert_eq!(failed.status().unwrap(), Status::INVALID_VALUE);
    }

    #[test]
    fn large_inline_tail_is_sent_separately() {
        let data = vec![0xC3; COALESCE_LIMIT * 2 + 17];
        let mut writer = MessageWriter::new(Cursor::new(Vec::new()));
        writer
            .send_response(OpCode::MemcpyDtoH.code(), 4, 0, &[], &data)
            .unwrap();

        let msg = written(writer).read_message().unwrap();
        assert_eq!(msg.payload.len(), 4 + data.len());
        assert_eq!(&msg.payload[4..], data.as_slice());
    }

    #[test]
    fn payload_too_large_rejected() {
        let config = MessageConfig {
            max_payload_size: 4,
        };
        let mut writer = MessageWriter::with_config(Cursor::new(Vec::new()), config);
        let err = writer
            .send_raw(0x0218, 1, Flags::NONE, &[], b"oversized")
            .unwrap_err();
        assert!(matches!(err, WireError::PayloadTooLarge { .. }));
        assert!(writer.get_ref().get_ref().is_empty());
    }
}
