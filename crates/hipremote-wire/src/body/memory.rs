wire_body! {
    /// `MALLOC` and friends.
    pub struct MallocRequest {
        pub size: u64,
        pub flags: u32,
    }
}

wire_body! {
    /// A single opaque 64-bit handle: device pointer, stream, event, module.
    ///
    /// Used both as a request (`FREE`, `STREAM_DESTROY`, ...) and as a
    /// handle-returning response (`MALLOC`, `STREAM_CREATE`, ...).
    pub struct HandleValue {
        pub value: u64,
    }
}

wire_body! {
    /// `MEMCPY*`. For host-to-device the source bytes follow inline; for
    /// device-to-host the response carries `size` bytes inline.
    pub struct MemcpyRequest {
        pub dst: u64,
        pub src: u64,
        pub size: u64,
        pub kind: i32,
        pub stream: u64,
    }
}

wire_body! {
    /// `MEMSET*`. `value` is interpreted at the width implied by the op.
    pub struct MemsetRequest {
        pub dst: u64,
        pub value: i32,
        pub size: u64,
        pub stream: u64,
    }
}

wire_body! {
    /// `MEM_GET_INFO` response.
    pub struct MemGetInfoResponse {
        pub free: u64,
        pub total: u64,
    }
}

/// `hipMemcpyKind`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemcpyKind {
    HostToHost = 0,
    HostToDevice = 1,
    DeviceToHost = 2,
    DeviceToDevice = 3,
    Default = 4,
}

impl MemcpyKind {
    pub fn from_raw(kind: i32) -> Option<Self> {
        match kind {
            0 => Some(Self::HostToHost),
            1 => Some(Self::HostToDevice),
            2 => Some(Self::DeviceToHost),
            3 => Some(Self::DeviceToDevice),
            4 => Some(Self::Default),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::WireBody;

    #[test]
    fn test_memcpy_request_is_packed() {
        assert_eq!(MemcpyRequest::SIZE, 36);
        let req = MemcpyRequest {
            dst: 0x1000,
            src: 0x2000,
            size: 64,
            kind: MemcpyKind::DeviceToDevice as i32,
            stream: 0,
        };
        let wire = req.encode();
        assert_eq!(&wire[24..28], &3i32.to_le_bytes());
        assert_eq!(MemcpyRequest::decode(&wire).unwrap(), req);
    }

    #[test]
    fn test_memset_request_size() {
        assert_eq!(MemsetRequest::SIZE, 28);
    }

    #[test]
    fn test_memcpy_kind_from_raw() {
        assert_eq!(MemcpyKind::from_raw(2), Some(MemcpyKind::DeviceToHost));
        assert_eq!(MemcpyKind::from_raw(9), None);
    }
}
