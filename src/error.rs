//! Defines the typed failure shared by every file-system operation.

use std::ffi::CStr;

/// Convenient result alias used by all core operations.
pub type FsResult<T> = Result<T, FsError>;

/// A failure carrying the POSIX errno that the mount adapter hands back to
/// the kernel verbatim (negated), plus a human readable description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fs error: [{code}] {message}")]
pub struct FsError {
    /// POSIX errno.
    pub code: i32,
    /// Description logged alongside the errno.
    pub message: String,
}

impl FsError {
    /// Returns an error for `code` with the system's `strerror` description.
    pub fn errno(code: i32) -> Self {
        Self { code, message: strerror(code) }
    }

    /// Returns an error for `code` carrying a caller supplied description.
    pub fn with_message(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        Self { code: err.raw_os_error().unwrap_or(libc::EIO), message: err.to_string() }
    }
}

fn strerror(code: i32) -> String {
    // SAFETY: strerror returns a pointer into a static table of NUL
    // terminated strings; it is never freed.
    unsafe {
        let ptr = libc::strerror(code);
        if ptr.is_null() {
            format!("errno {code}")
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}
