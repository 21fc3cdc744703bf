use std::cell::{Cell, RefCell};
use std::ffi::CString;
use std::os::raw::c_char;

use hipremote_client::{ClientError, Status};

thread_local! {
    static LAST_STATUS: Cell<Status> = const { Cell::new(Status::SUCCESS) };
    static LAST_MESSAGE: RefCell<CString> = RefCell::new(CString::default());
}

/// Remember a failed call for `hipGetLastError` and the message accessor.
pub(crate) fn record(status: Status, message: impl Into<String>) {
    LAST_STATUS.with(|last| last.set(status));
    let sanitized = message.into().replace('\0', "?");
    LAST_MESSAGE.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn record_client_error(api: &str, err: &ClientError) -> Status {
    let status = err.status();
    record(status, format!("{api}: {err}"));
    status
}

pub(crate) fn set_panic_error() {
    record(Status::UNKNOWN, "panic across FFI boundary");
}

/// Return and clear this thread's last error.
pub(crate) fn take_status() -> Status {
    LAST_STATUS.with(|last| last.replace(Status::SUCCESS))
}

pub(crate) fn peek_status() -> Status {
    LAST_STATUS.with(Cell::get)
}

pub(crate) fn clear_error_state() {
    LAST_STATUS.with(|last| last.set(Status::SUCCESS));
    LAST_MESSAGE.with(|state| *state.borrow_mut() = CString::default());
}

pub(crate) fn last_message_ptr() -> *const c_char {
    LAST_MESSAGE.with(|state| state.borrow().as_ptr())
}

/// Local argument failure, reported the same way as a remote one.
pub(crate) fn invalid(message: &str) -> ClientError {
    ClientError::InvalidArgument(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_but_peek_keeps() {
        record(Status::NOT_READY, "pending");
        assert_eq!(peek_status(), Status::NOT_READY);
        assert_eq!(peek_status(), Status::NOT_READY);
        assert_eq!(take_status(), Status::NOT_READY);
        assert_eq!(take_status(), Status::SUCCESS);
    }

    #[test]
    fn client_errors_map_to_native_status() {
        let status = record_client_error("hipMalloc", &ClientError::Api(Status::OUT_OF_MEMORY));
        assert_eq!(status, Status::OUT_OF_MEMORY);
        assert_eq!(take_status(), Status::OUT_OF_MEMORY);
    }
}
