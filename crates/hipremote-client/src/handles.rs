//! Opaque remote handles.
//!
//! Every handle is the worker's 64-bit value, passed back verbatim. Zero is
//! the null/default value.

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
            pub struct $name(pub u64);

            impl $name {
                pub const NULL: $name = $name(0);

                pub const fn raw(self) -> u64 {
                    self.0
                }

                pub const fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

handle! {
    /// A stream. [`Stream::NULL`] is the default stream.
    Stream;
    Event;
    Module;
    Function;
}

/// Launch geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchDims {
    pub grid: [u32; 3],
    pub block: [u32; 3],
    pub shared_mem_bytes: u32,
}

impl LaunchDims {
    /// One-dimensional launch with no dynamic shared memory.
    pub const fn linear(grid: u32, block: u32) -> Self {
        Self {
            grid: [grid, 1, 1],
            block: [block, 1, 1],
            shared_mem_bytes: 0,
        }
    }
}
