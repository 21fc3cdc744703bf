use hipremote_transport::TransportError;

/// Errors that can occur while encoding, decoding or exchanging messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The header does not start with the protocol magic.
    #[error("invalid header magic 0x{found:08X} (expected 0x48495052 \"HIPR\")")]
    InvalidMagic { found: u32 },

    /// The header carries an incompatible major version.
    #[error("unsupported protocol version 0x{found:04X}")]
    UnsupportedVersion { found: u16 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The op code is not part of the protocol.
    #[error("unknown op code 0x{0:04X}")]
    UnknownOpCode(u16),

    /// A payload is shorter than the struct it must contain.
    #[error("truncated {what}: need {needed} bytes, got {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// A string does not fit its fixed-width wire field.
    #[error("{field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The underlying stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl WireError {
    /// Protocol errors invalidate the connection without being I/O failures.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, WireError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
