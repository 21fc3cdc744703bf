use std::io::Read;

use bytes::BytesMut;
use hipremote_transport::recv_all;
use tracing::trace;

use crate::error::{Result, WireError};
use crate::header::{decode_header, HEADER_SIZE};
use crate::message::{Message, MessageConfig};

/// Reads complete messages from any `Read` stream.
///
/// Each call consumes exactly one header and `payload_length` payload bytes,
/// so the stream stays framed no matter how much of the payload a caller
/// ends up using.
pub struct MessageReader<T> {
    inner: T,
    config: MessageConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, MessageConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: MessageConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete message (blocking).
    ///
    /// The header is validated before its length is trusted.
    pub fn read_message(&mut self) -> Result<Message> {
        let mut raw = [0u8; HEADER_SIZE];
        recv_all(&mut self.inner, &mut raw)?;
        let header = decode_header(&raw)?;

        let len = header.payload_length as usize;
        if len > self.config.max_payload_size {
            return Err(WireError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }

        let mut payload = BytesMut::zeroed(len);
        recv_all(&mut self.inner, &mut payload)?;

        trace!(
            op_code = header.op_code,
            request_id = header.request_id,
            len,
            "message read"
        );
        Ok(Message {
            header,
            payload: payload.freeze(),
        })
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &MessageConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};

    use bytes::BufMut;
    use hipremote_transport::TransportError;

    use super::*;
    use crate::header::{encode_header, Flags, Header, MAGIC};
    use crate::writer::MessageWriter;

    fn wire(messages: &[(u16, &[u8])]) -> Vec<u8> {
        let mut writer = MessageWriter::new(Cursor::new(Vec::new()));
        for (i, (op, payload)) in messages.iter().enumerate() {
            writer
                .send_raw(*op, i as u32 + 1, Flags::NONE, payload, &[])
                .unwrap();
        }
        writer.into_inner().into_inner()
    }

    #[test]
    fn read_single_message() {
        let mut reader = MessageReader::new(Cursor::new(wire(&[(0x0003, &b"ping"[..])])));
        let msg = reader.read_message().unwrap();

        assert_eq!(msg.header.op_code, 0x0003);
        assert_eq!(msg.header.request_id, 1);
        assert_eq!(msg.payload.as_ref(), b"ping");
    }

    #[test]
    fn read_consumes_whole_payload_between_messages() {
        let big = vec![0x5A; 100_000];
        let bytes = wire(&[(0x0210, big.as_slice()), (0x0104, &b""[..])]);
        let mut reader = MessageReader::new(Cursor::new(bytes));

        let first = reader.read_message().unwrap();
        assert_eq!(first.payload.len(), big.len());
        // Using only a prefix of the first payload cannot skew the second header.
        let _prefix = &first.payload[..4];
        let second = reader.read_message().unwrap();
        assert_eq!(second.header.op_code, 0x0104);
        assert_eq!(second.header.request_id, 2);
    }

    #[test]
    fn partial_reads_are_reassembled() {
        struct Trickle(Cursor<Vec<u8>>);

        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = buf.len().min(3);
                self.0.read(&mut buf[..n])
            }
        }

        let mut reader = MessageReader::new(Trickle(Cursor::new(wire(&[(0x0100, &b"slow"[..])]))));
        let msg = reader.read_message().unwrap();
        assert_eq!(msg.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = MessageReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(
            err,
            WireError::Transport(TransportError::ConnectionClosed { transferred: 0, .. })
        ));
    }

    #[test]
    fn connection_closed_mid_payload() {
        let mut bytes = BytesMut::new();
        encode_header(&Header::new(0x0200, 1, 32, Flags::NONE), &mut bytes);
        bytes.put_slice(b"only-part");

        let mut reader = MessageReader::new(Cursor::new(bytes.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(
            err,
            WireError::Transport(TransportError::ConnectionClosed {
                transferred: 9,
                expected: 32
            })
        ));
    }

    #[test]
    fn invalid_magic_rejected_before_length() {
        let mut bytes = BytesMut::new();
        bytes.put_u32_le(MAGIC ^ 0xFF);
        bytes.put_u16_le(0x0100);
        bytes.put_u16_le(0x0200);
        bytes.put_u32_le(1);
        bytes.put_u32_le(u32::MAX);
        bytes.put_u32_le(0);

        let mut reader = MessageReader::new(Cursor::new(bytes.to_vec()));
        assert!(matches!(
            reader.read_message().unwrap_err(),
            WireError::InvalidMagic { .. }
        ));
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut bytes = BytesMut::new();
        encode_header(&Header::new(0x0200, 1, 1024, Flags::NONE), &mut bytes);

        let config = MessageConfig {
            max_payload_size: 16,
        };
        let mut reader = MessageReader::with_config(Cursor::new(bytes.to_vec()), config);
        assert!(matches!(
            reader.read_message().unwrap_err(),
            WireError::PayloadTooLarge {
                size: 1024,
                max: 16
            }
        ));
    }

    #[test]
    fn read_timeout_propagates_as_transport_error() {
        struct Stalled;

        impl Read for Stalled {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::TimedOut))
            }
        }

        let mut reader = MessageReader::new(Stalled);
        match reader.read_message().unwrap_err() {
            WireError::Transport(err) => assert!(err.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = MessageWriter::new(left);
        let mut reader = MessageReader::new(right);

        writer
            .send_raw(0x0218, 5, Flags::NO_REPLY, b"hdr", b"inline-bytes")
            .unwrap();
        let msg = reader.read_message().unwrap();

        assert_eq!(msg.header.request_id, 5);
        assert!(msg
            .flags()
            .contains(Flags::NO_REPLY | Flags::HAS_INLINE_DATA));
        assert_eq!(msg.payload.as_ref(), b"hdrinline-bytes");
    }
}
