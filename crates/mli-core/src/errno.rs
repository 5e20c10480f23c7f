//! Error numbers and access to the thread-local `errno` slot.
//!
//! The slot read here is the host libc's own `errno`, so a value set by any
//! primitive (wrapped or not) is visible to [`get_errno`] on the same thread.

use std::ffi::{CStr, c_char, c_int};
use std::fmt;

use thiserror::Error;

/// Result of a wrapped call: the primitive's return value or its `errno`.
pub type SysResult<T> = Result<T, Errno>;

/// An OS error code exactly as a primitive left it in `errno`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Error)]
#[error("{}", self.description())]
pub struct Errno(c_int);

impl Errno {
    pub const EPERM: Self = Self(libc::EPERM);
    pub const ENOENT: Self = Self(libc::ENOENT);
    pub const EINTR: Self = Self(libc::EINTR);
    pub const EIO: Self = Self(libc::EIO);
    pub const EBADF: Self = Self(libc::EBADF);
    pub const EAGAIN: Self = Self(libc::EAGAIN);
    pub const ENOMEM: Self = Self(libc::ENOMEM);
    pub const EACCES: Self = Self(libc::EACCES);
    pub const EFAULT: Self = Self(libc::EFAULT);
    pub const EEXIST: Self = Self(libc::EEXIST);
    pub const ENOTDIR: Self = Self(libc::ENOTDIR);
    pub const EISDIR: Self = Self(libc::EISDIR);
    pub const EINVAL: Self = Self(libc::EINVAL);
    pub const EMFILE: Self = Self(libc::EMFILE);
    pub const ENOSPC: Self = Self(libc::ENOSPC);
    pub const ESPIPE: Self = Self(libc::ESPIPE);
    pub const EROFS: Self = Self(libc::EROFS);
    pub const ENAMETOOLONG: Self = Self(libc::ENAMETOOLONG);
    pub const ELOOP: Self = Self(libc::ELOOP);
    pub const EOVERFLOW: Self = Self(libc::EOVERFLOW);

    /// Wrap a raw code.
    #[must_use]
    pub const fn from_raw(code: c_int) -> Self {
        Self(code)
    }

    /// The raw numeric code.
    #[must_use]
    pub const fn raw(self) -> c_int {
        self.0
    }

    /// Snapshot the calling thread's current `errno`.
    #[must_use]
    pub fn last() -> Self {
        Self(get_errno())
    }

    /// Human-readable description, as `strerror` reports it.
    #[must_use]
    pub fn description(self) -> String {
        let mut buf = [0 as c_char; 256];
        // SAFETY: buf is writable for buf.len() bytes; the XSI strerror_r
        // always NUL-terminates on success.
        let rc = unsafe { libc::strerror_r(self.0, buf.as_mut_ptr(), buf.len()) };
        if rc != 0 {
            return format!("Unknown error {}", self.0);
        }
        // SAFETY: strerror_r succeeded, so buf holds a NUL-terminated string.
        unsafe { CStr::from_ptr(buf.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Errno({}: {})", self.0, self.description())
    }
}

impl From<Errno> for std::io::Error {
    fn from(e: Errno) -> Self {
        std::io::Error::from_raw_os_error(e.0)
    }
}

impl From<Errno> for c_int {
    fn from(e: Errno) -> Self {
        e.0
    }
}

#[inline]
fn errno_location() -> *mut c_int {
    // SAFETY: __errno_location has no preconditions and returns the calling
    // thread's errno slot, valid for the thread's lifetime.
    unsafe { libc::__errno_location() }
}

/// Returns the current thread-local errno value.
///
/// Equivalent to reading C `errno`.
#[inline]
pub fn get_errno() -> c_int {
    // SAFETY: errno_location points at this thread's live errno slot.
    unsafe { *errno_location() }
}

/// Sets the current thread-local errno value.
///
/// Equivalent to assigning to C `errno`.
#[inline]
pub fn set_errno(value: c_int) {
    // SAFETY: errno_location points at this thread's live errno slot.
    unsafe { *errno_location() = value };
}

/// Reset errno to "no error".
#[inline]
pub fn clear_errno() {
    set_errno(0);
}
