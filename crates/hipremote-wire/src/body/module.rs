use bytes::{Buf, BufMut, BytesMut};

use super::{check_fixed_str, get_fixed_str, put_fixed_str, WireBody};
use crate::error::Result;

/// Width of the kernel name field, including the terminating NUL.
pub const FUNCTION_NAME_LEN: usize = 256;

wire_body! {
    /// `MODULE_LOAD_DATA*`; the code object follows inline.
    pub struct ModuleLoadRequest {
        pub data_size: u64,
    }
}

/// `MODULE_GET_FUNCTION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFunctionRequest {
    pub module: u64,
    pub name: String,
}

impl GetFunctionRequest {
    /// Build a request, rejecting names that do not fit the wire field.
    pub fn new(module: u64, name: &str) -> Result<Self> {
        check_fixed_str("kernel name", name, FUNCTION_NAME_LEN)?;
        Ok(Self {
            module,
            name: name.to_string(),
        })
    }
}

impl WireBody for GetFunctionRequest {
    const NAME: &'static str = "GetFunctionRequest";
    const SIZE: usize = 8 + FUNCTION_NAME_LEN;

    fn put(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.module);
        put_fixed_str(dst, &self.name, FUNCTION_NAME_LEN);
    }

    fn get(src: &mut &[u8]) -> Self {
        let module = src.get_u64_le();
        Self {
            module,
            name: get_fixed_str(src, FUNCTION_NAME_LEN),
        }
    }
}

wire_body! {
    /// `MODULE_GET_FUNCTION` response. `num_params` is 0 when the function
    /// carries no parameter metadata.
    pub struct GetFunctionResponse {
        pub function: u64,
        pub num_params: u32,
        pub reserved: u32,
    }
}

wire_body! {
    /// `LAUNCH_KERNEL` / `MODULE_LAUNCH_KERNEL`; `arg_size` bytes of flat
    /// argument buffer follow inline.
    pub struct LaunchRequest {
        pub function: u64,
        pub grid_x: u32,
        pub grid_y: u32,
        pub grid_z: u32,
        pub block_x: u32,
        pub block_y: u32,
        pub block_z: u32,
        pub shared_mem_bytes: u32,
        pub stream: u64,
        pub arg_size: u32,
    }
}

wire_body! {
    /// `FUNCTION_GET_PARAM_LAYOUT` response; `count` [`crate::ParamSlot`]s
    /// follow inline.
    pub struct ParamLayoutResponse {
        pub count: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WireError;

    #[test]
    fn test_get_function_request_layout() {
        let req = GetFunctionRequest::new(0xABCD, "vector_add").unwrap();
        let wire = req.encode();
        assert_eq!(wire.len(), 264);
        assert_eq!(&wire[8..19], b"vector_add\0");
        assert_eq!(GetFunctionRequest::decode(&wire).unwrap(), req);
    }

    #[test]
    fn test_get_function_request_rejects_long_names() {
        let name = "k".repeat(FUNCTION_NAME_LEN);
        assert!(matches!(
            GetFunctionRequest::new(1, &name),
            Err(WireError::FieldTooLong { .. })
        ));
    }

    #[test]
    fn test_launch_request_size() {
        assert_eq!(LaunchRequest::SIZE, 48);
    }
}
