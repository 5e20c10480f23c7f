//! # mli-core
//!
//! Thin pass-through wrappers over the POSIX file, directory, and metadata
//! calls, plus a post-call error reporting hook.
//!
//! Every wrapper forwards its arguments to the host primitive unchanged and
//! returns the primitive's result as a [`SysResult`]: `Ok` carries the raw
//! return value, `Err` carries the exact `errno` the primitive set. Nothing is
//! validated, retried, buffered, or owned on the caller's behalf.
//!
//! # Architecture
//!
//! ```text
//! caller -> wrapper -> libc primitive -> report hook (feature "diagnostics") -> caller
//! ```
//!
//! The reporting hook is injected through [`report::ErrorReporter`]. It is a
//! no-op until a reporter is installed or `MLI_DIAGNOSTICS` selects one, and it
//! compiles away entirely when the `diagnostics` feature is disabled.

pub mod config;
pub mod dirent;
pub mod errno;
pub mod fcntl;
pub mod path;
pub mod report;
pub mod stat;
pub mod unistd;

mod ret;

pub use dirent::{DirEntry, DirStream, closedir, opendir, readdir};
pub use errno::{Errno, SysResult};
pub use fcntl::{creat, fcntl, open, openat};
pub use path::AsPath;
pub use report::{Diagnostic, DiagnosticKind, ErrorReporter, check_errno, check_sentinel};
pub use stat::{FileStat, FileType, fstat, fstatat, lstat, stat};
pub use unistd::{
    chdir, close, dup, dup2, fdatasync, fpathconf, fsync, lseek, pathconf, pread, pwrite, read,
    sync, sysconf, write,
};

/// Raw file descriptor as used by every wrapper.
pub type RawFd = std::os::fd::RawFd;
