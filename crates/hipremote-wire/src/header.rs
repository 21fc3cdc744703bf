use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};

/// Header: magic (4) + version (2) + op (2) + request id (4) + length (4) + flags (4).
pub const HEADER_SIZE: usize = 20;

/// Magic: "HIPR".
pub const MAGIC: u32 = 0x4849_5052;

/// Protocol version 1.0. The high byte is the major version.
pub const PROTOCOL_VERSION: u16 = 0x0100;

/// Default maximum payload size: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Message flag bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Set on every worker response.
    pub const RESPONSE: Flags = Flags(1 << 0);
    /// Set on responses whose status is not success.
    pub const ERROR: Flags = Flags(1 << 1);
    /// Payload is a fixed struct followed by a variable-length data tail.
    pub const HAS_INLINE_DATA: Flags = Flags(1 << 2);
    /// The sender will not read a response; the worker must not send one.
    pub const NO_REPLY: Flags = Flags(1 << 3);

    pub const fn from_bits(bits: u32) -> Self {
        Flags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Flags::RESPONSE, "RESPONSE"),
            (Flags::ERROR, "ERROR"),
            (Flags::HAS_INLINE_DATA, "HAS_INLINE_DATA"),
            (Flags::NO_REPLY, "NO_REPLY"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "Flags(0x{:x})", self.0)
        } else {
            write!(f, "Flags({})", set.join(" | "))
        }
    }
}

/// A decoded message header.
///
/// The op code is kept raw so a reader can report an unknown op code as a
/// protocol error at the dispatch layer rather than losing the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub op_code: u16,
    pub request_id: u32,
    pub payload_length: u32,
    pub flags: Flags,
}

impl Header {
    /// Build a header for the current protocol version.
    pub fn new(op_code: u16, request_id: u32, payload_length: u32, flags: Flags) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            op_code,
            request_id,
            payload_length,
            flags,
        }
    }
}

/// Encode a header into the wire format.
///
/// ```text
/// ┌────────────┬───────────┬──────────┬────────────┬────────────┬──────────┐
/// │ Magic (4B) │ Version   │ Op code  │ Request id │ Payload    │ Flags    │
/// │ "HIPR"     │ (2B LE)   │ (2B LE)  │ (4B LE)    │ len (4B LE)│ (4B LE)  │
/// └────────────┴───────────┴──────────┴────────────┴────────────┴──────────┘
/// ```
pub fn encode_header(header: &Header, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_u32_le(MAGIC);
    dst.put_u16_le(header.version);
    dst.put_u16_le(header.op_code);
    dst.put_u32_le(header.request_id);
    dst.put_u32_le(header.payload_length);
    dst.put_u32_le(header.flags.bits());
}

/// Decode and validate a header.
///
/// Magic and major version are checked before anything else is trusted.
pub fn decode_header(src: &[u8; HEADER_SIZE]) -> Result<Header> {
    let mut src = &src[..];

    let magic = src.get_u32_le();
    if magic != MAGIC {
        return Err(WireError::InvalidMagic { found: magic });
    }

    let version = src.get_u16_le();
    if version >> 8 != PROTOCOL_VERSION >> 8 {
        return Err(WireError::UnsupportedVersion { found: version });
    }

    Ok(Header {
        version,
        op_code: src.get_u16_le(),
        request_id: src.get_u32_le(),
        payload_length: src.get_u32_le(),
        flags: Flags::from_bits(src.get_u32_le()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(header: &Header) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::new();
        encode_header(header, &mut buf);
        buf.as_ref().try_into().unwrap()
    }

    #[test]
    fn test_header_layout_is_little_endian() {
        let header = Header::new(0x0210, 7, 44, Flags::HAS_INLINE_DATA | Flags::NO_REPLY);
        let wire = encode(&header);

        assert_eq!(&wire[0..4], &[0x52, 0x50, 0x49, 0x48]);
        assert_eq!(&wire[4..6], &[0x00, 0x01]);
        assert_eq!(&wire[6..8], &[0x10, 0x02]);
        assert_eq!(&wire[8..12], &[7, 0, 0, 0]);
        assert_eq!(&wire[12..16], &[44, 0, 0, 0]);
        assert_eq!(&wire[16..20], &[0x0C, 0, 0, 0]);
    }

    #[test]
    fn test_header_survives_encode_decode() {
        let samples = [
            Header::new(0x0001, 1, 0, Flags::NONE),
            Header::new(0x0824, u32::MAX, u32::MAX, Flags::RESPONSE | Flags::ERROR),
            Header::new(0xFFFF, 0, 16, Flags::from_bits(0xDEAD_BEEF)),
        ];
        for header in samples {
            assert_eq!(decode_header(&encode(&header)).unwrap(), header);
        }
    }

    #[test]
    fn test_corrupt_magic_rejected() {
        let header = Header::new(0x0104, 3, 0, Flags::NONE);
        for byte in 0..4 {
            let mut wire = encode(&header);
            wire[byte] ^= 0x01;
            let err = decode_header(&wire).unwrap_err();
            assert!(matches!(err, WireError::InvalidMagic { .. }), "byte {byte}");
        }
    }

    #[test]
    fn test_major_version_mismatch_rejected() {
        let mut header = Header::new(0x0104, 3, 0, Flags::NONE);
        header.version = 0x0200;
        let err = decode_header(&encode(&header)).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedVersion { found: 0x0200 }));
    }

    #[test]
    fn test_minor_version_accepted() {
        let mut header = Header::new(0x0104, 3, 0, Flags::NONE);
        header.version = 0x0107;
        assert_eq!(decode_header(&encode(&header)).unwrap().version, 0x0107);
    }

    #[test]
    fn test_flags_debug_and_contains() {
        let flags = Flags::RESPONSE | Flags::HAS_INLINE_DATA;
        assert!(flags.contains(Flags::RESPONSE));
        assert!(!flags.contains(Flags::NO_REPLY));
        assert_eq!(format!("{flags:?}"), "Flags(RESPONSE | HAS_INLINE_DATA)");
        assert_eq!(format!("{:?}", Flags::NONE), "Flags(0x0)");
    }
}
