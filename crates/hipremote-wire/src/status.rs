use std::fmt;

/// HIP runtime status code, carried verbatim in every runtime response.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const INVALID_VALUE: Status = Status(1);
    pub const OUT_OF_MEMORY: Status = Status(2);
    pub const NOT_INITIALIZED: Status = Status(3);
    pub const INVALID_DEVICE_POINTER: Status = Status(17);
    pub const INVALID_MEMCPY_DIRECTION: Status = Status(21);
    pub const INVALID_DEVICE: Status = Status(101);
    pub const INVALID_IMAGE: Status = Status(200);
    pub const INVALID_CONTEXT: Status = Status(201);
    pub const INVALID_HANDLE: Status = Status(400);
    pub const NOT_FOUND: Status = Status(500);
    pub const NOT_READY: Status = Status(600);
    pub const LAUNCH_FAILURE: Status = Status(719);
    pub const NOT_SUPPORTED: Status = Status(801);
    pub const UNKNOWN: Status = Status(999);

    /// Reported to C callers when the worker cannot be reached.
    ///
    /// The native vocabulary has no dedicated code, so transport failures
    /// surface as "not initialized", exactly like a runtime that never came up.
    pub const WORKER_UNREACHABLE: Status = Status::NOT_INITIALIZED;

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    /// Convert a success status into `Ok(())`.
    pub fn ok(self) -> Result<(), Status> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Native enumerator name, as returned by `hipGetErrorName`.
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "hipSuccess",
            1 => "hipErrorInvalidValue",
            2 => "hipErrorOutOfMemory",
            3 => "hipErrorNotInitialized",
            17 => "hipErrorInvalidDevicePointer",
            21 => "hipErrorInvalidMemcpyDirection",
            101 => "hipErrorInvalidDevice",
            200 => "hipErrorInvalidImage",
            201 => "hipErrorInvalidContext",
            400 => "hipErrorInvalidHandle",
            500 => "hipErrorNotFound",
            600 => "hipErrorNotReady",
            719 => "hipErrorLaunchFailure",
            801 => "hipErrorNotSupported",
            _ => "hipErrorUnknown",
        }
    }

    /// Human-readable description, as returned by `hipGetErrorString`.
    pub fn description(self) -> &'static str {
        match self.0 {
            0 => "no error",
            1 => "invalid argument",
            2 => "out of memory",
            3 => "initialization error (remote worker unreachable)",
            17 => "invalid device pointer",
            21 => "invalid copy direction for memcpy",
            101 => "invalid device ordinal",
            200 => "device kernel image is invalid",
            201 => "invalid device context",
            400 => "invalid resource handle",
            500 => "named symbol not found",
            600 => "device not ready",
            719 => "unspecified launch failure",
            801 => "operation not supported",
            _ => "unknown error",
        }
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.0, self.description())
    }
}

/// Telemetry status code, carried in every telemetry response.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmiStatus(pub i32);

impl SmiStatus {
    pub const SUCCESS: SmiStatus = SmiStatus(0);
    pub const INVALID_ARGS: SmiStatus = SmiStatus(1);
    pub const NOT_SUPPORTED: SmiStatus = SmiStatus(2);
    pub const NOT_FOUND: SmiStatus = SmiStatus(3);
    pub const NOT_INITIALIZED: SmiStatus = SmiStatus(4);
    pub const IO_ERROR: SmiStatus = SmiStatus(5);
    pub const API_FAILED: SmiStatus = SmiStatus(6);

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "SMI_SUCCESS",
            1 => "SMI_INVALID_ARGS",
            2 => "SMI_NOT_SUPPORTED",
            3 => "SMI_NOT_FOUND",
            4 => "SMI_NOT_INITIALIZED",
            5 => "SMI_IO_ERROR",
            6 => "SMI_API_FAILED",
            _ => "SMI_UNKNOWN",
        }
    }
}

impl fmt::Debug for SmiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

impl fmt::Display for SmiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(Status::SUCCESS.name(), "hipSuccess");
        assert_eq!(Status::INVALID_HANDLE.name(), "hipErrorInvalidHandle");
        assert_eq!(Status(12345).name(), "hipErrorUnknown");
        assert_eq!(Status::WORKER_UNREACHABLE, Status::NOT_INITIALIZED);
    }

    #[test]
    fn test_status_ok() {
        assert!(Status::SUCCESS.ok().is_ok());
        assert_eq!(Status::NOT_READY.ok(), Err(Status::NOT_READY));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            Status::OUT_OF_MEMORY.to_string(),
            "hipErrorOutOfMemory (2): out of memory"
        );
        assert_eq!(SmiStatus::NOT_FOUND.to_string(), "SMI_NOT_FOUND (3)");
    }
}
