//! Wire protocol for HIP API remoting.
//!
//! Every message is a fixed 20-byte header followed by `payload_length`
//! bytes of payload. All integers are little-endian and structs are packed
//! with no padding; fixed-width strings are NUL-padded byte arrays.
//!
//! Response payloads always begin with an `i32` status. Requests and
//! responses flagged [`Flags::HAS_INLINE_DATA`] carry a variable-length tail
//! after their fixed struct.
//!
//! No partial reads, no manual draining in user code: [`MessageReader`]
//! always consumes a whole message.

pub mod abi;
pub mod body;
pub mod error;
pub mod header;
pub mod kernel;
pub mod message;
pub mod opcode;
pub mod reader;
pub mod status;
pub mod writer;

pub use body::WireBody;
pub use error::{Result, WireError};
pub use header::{
    decode_header, encode_header, Flags, Header, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
    PROTOCOL_VERSION,
};
pub use kernel::{DevicePtr, KernelArg, KernelArgs, ParamSlot};
pub use message::{Message, MessageConfig};
pub use opcode::OpCode;
pub use reader::MessageReader;
pub use status::{SmiStatus, Status};
pub use writer::MessageWriter;
