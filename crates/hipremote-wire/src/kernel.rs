//! Flat kernel argument buffers.
//!
//! A launch carries all arguments as one byte buffer laid out the way the
//! device compiler lays out the kernel's parameter block: each argument at
//! its natural alignment, in declaration order. [`ParamSlot`]s describe that
//! layout.

use bytes::{Buf, BufMut, BytesMut};

use crate::body::WireBody;

/// Byte range of one formal parameter inside a flat argument buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamSlot {
    pub offset: u32,
    pub size: u32,
}

impl ParamSlot {
    pub const fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    /// One past the last byte, or `None` on overflow.
    pub fn end(self) -> Option<usize> {
        (self.offset as usize).checked_add(self.size as usize)
    }
}

impl WireBody for ParamSlot {
    const NAME: &'static str = "ParamSlot";
    const SIZE: usize = 8;

    fn put(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.offset);
        dst.put_u32_le(self.size);
    }

    fn get(src: &mut &[u8]) -> Self {
        let offset = src.get_u32_le();
        Self {
            offset,
            size: src.get_u32_le(),
        }
    }
}

/// A value that can be passed to a kernel by value.
pub trait KernelArg {
    /// Required alignment inside the parameter block.
    const ALIGN: usize;

    /// Append the little-endian bytes of this value.
    fn write_to(&self, dst: &mut Vec<u8>);
}

macro_rules! kernel_arg {
    ($($ty:ty),*) => {
        $(
            impl KernelArg for $ty {
                const ALIGN: usize = std::mem::align_of::<$ty>();

                fn write_to(&self, dst: &mut Vec<u8>) {
                    dst.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

kernel_arg!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// A device address passed as a kernel argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePtr(pub u64);

impl KernelArg for DevicePtr {
    const ALIGN: usize = 8;

    fn write_to(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.0.to_le_bytes());
    }
}

/// Builder for a flat argument buffer with its layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelArgs {
    buf: Vec<u8>,
    slots: Vec<ParamSlot>,
}

impl KernelArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a typed argument at its natural alignment.
    pub fn push<T: KernelArg>(&mut self, value: T) -> &mut Self {
        let offset = self.align_to(T::ALIGN);
        value.write_to(&mut self.buf);
        self.record(offset);
        self
    }

    /// Append an opaque by-value struct with an explicit alignment.
    pub fn push_bytes(&mut self, bytes: &[u8], align: usize) -> &mut Self {
        let offset = self.align_to(align.max(1));
        self.buf.extend_from_slice(bytes);
        self.record(offset);
        self
    }

    /// The flat buffer as it goes on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Where each argument landed.
    pub fn layout(&self) -> &[ParamSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn align_to(&mut self, align: usize) -> usize {
        let padded = self.buf.len().next_multiple_of(align);
        self.buf.resize(padded, 0);
        padded
    }

    fn record(&mut self, offset: usize) {
        self.slots.push(ParamSlot::new(
            offset as u32,
            (self.buf.len() - offset) as u32,
        ));
    }
}
