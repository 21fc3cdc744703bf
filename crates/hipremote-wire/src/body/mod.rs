//! Fixed-layout request and response bodies.
//!
//! Response bodies here exclude the leading `i32` status; [`crate::Message`]
//! strips it before decoding.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WireError};

/// A packed, little-endian struct with a fixed wire size.
pub trait WireBody: Sized {
    /// Name used in truncation errors.
    const NAME: &'static str;
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Append the encoded struct to `dst`.
    fn put(&self, dst: &mut BytesMut);

    /// Decode from the front of `src`, advancing it.
    ///
    /// `src` must hold at least [`Self::SIZE`] bytes.
    fn get(src: &mut &[u8]) -> Self;

    /// Encode into a fresh buffer.
    fn encode(&self) -> BytesMut {
        let mut dst = BytesMut::with_capacity(Self::SIZE);
        self.put(&mut dst);
        dst
    }

    /// Decode from the front of `src`, ignoring any trailing bytes.
    fn decode(src: &[u8]) -> Result<Self> {
        Self::split(src).map(|(body, _)| body)
    }

    /// Decode from the front of `src` and return the remaining tail.
    fn split(src: &[u8]) -> Result<(Self, &[u8])> {
        if src.len() < Self::SIZE {
            return Err(WireError::Truncated {
                what: Self::NAME,
                needed: Self::SIZE,
                available: src.len(),
            });
        }
        let (mut head, tail) = src.split_at(Self::SIZE);
        Ok((Self::get(&mut head), tail))
    }
}

impl WireBody for () {
    const NAME: &'static str = "empty body";
    const SIZE: usize = 0;

    fn put(&self, _dst: &mut BytesMut) {}

    fn get(_src: &mut &[u8]) -> Self {}
}

pub(crate) trait Scalar: Copy {
    const SIZE: usize;
    fn put(self, dst: &mut BytesMut);
    fn get(src: &mut &[u8]) -> Self;
}

macro_rules! scalar {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Scalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn put(self, dst: &mut BytesMut) {
                    dst.$put(self);
                }

                fn get(src: &mut &[u8]) -> Self {
                    src.$get()
                }
            }
        )*
    };
}

scalar! {
    u8 => put_u8, get_u8;
    u16 => put_u16_le, get_u16_le;
    u32 => put_u32_le, get_u32_le;
    u64 => put_u64_le, get_u64_le;
    i32 => put_i32_le, get_i32_le;
    f32 => put_f32_le, get_f32_le;
}

/// Declare a packed body made only of scalar fields.
macro_rules! wire_body {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$fmeta:meta])* pub $field:ident: $ty:ty,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: $ty,)*
        }

        impl $crate::body::WireBody for $name {
            const NAME: &'static str = stringify!($name);
            const SIZE: usize = 0 $(+ <$ty as $crate::body::Scalar>::SIZE)*;

            fn put(&self, dst: &mut bytes::BytesMut) {
                $($crate::body::Scalar::put(self.$field, dst);)*
            }

            fn get(src: &mut &[u8]) -> Self {
                Self {
                    $($field: <$ty as $crate::body::Scalar>::get(src),)*
                }
            }
        }
    };
}

pub mod device;
pub mod memory;
pub mod module;
pub mod stream;
pub mod telemetry;

pub use device::{DeviceAttributeRequest, DeviceProperties, DeviceRequest, IntValue};
pub use memory::{HandleValue, MallocRequest, MemGetInfoResponse, MemcpyKind, MemcpyRequest, MemsetRequest};
pub use module::{
    GetFunctionRequest, GetFunctionResponse, LaunchRequest, ModuleLoadRequest,
    ParamLayoutResponse, FUNCTION_NAME_LEN,
};
pub use stream::{
    ElapsedTimeRequest, ElapsedTimeResponse, EventCreateRequest, EventRecordRequest,
    StreamCreateRequest, StreamWaitEventRequest,
};
pub use telemetry::{
    AsicInfo, ClockInfo, ClockInfoRequest, GpuActivity, GpuMetrics, PowerInfo,
    ProcessorCountResponse, ProcessorRequest, SmiInitRequest, TempMetric, TempMetricRequest,
    VramUsage,
};

/// Write `value` into a NUL-padded field of `width` bytes.
///
/// Callers validate the length with [`check_fixed_str`] first; overlong input
/// is cut so the field always keeps a terminating NUL.
pub(crate) fn put_fixed_str(dst: &mut BytesMut, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(width.saturating_sub(1));
    dst.put_slice(&bytes[..len]);
    dst.put_bytes(0, width - len);
}

/// Read a NUL-padded field of `width` bytes.
pub(crate) fn get_fixed_str(src: &mut &[u8], width: usize) -> String {
    let field = &src[..width];
    let end = field.iter().position(|b| *b == 0).unwrap_or(width);
    let value = String::from_utf8_lossy(&field[..end]).into_owned();
    src.advance(width);
    value
}

/// Reject strings that would not fit a `width`-byte NUL-terminated field.
pub fn check_fixed_str(field: &'static str, value: &str, width: usize) -> Result<()> {
    if value.len() >= width || value.as_bytes().contains(&0) {
        return Err(WireError::FieldTooLong {
            field,
            len: value.len(),
            max: width - 1,
        });
    }
    Ok(())
}
