//! Descriptor creation and control: `open`, `openat`, `creat`, `fcntl`.

use std::ffi::c_int;
use std::panic::Location;

use libc::mode_t;

use crate::RawFd;
use crate::errno::SysResult;
use crate::path::AsPath;
use crate::ret::cvt;

pub use libc::{
    AT_FDCWD, F_DUPFD, F_DUPFD_CLOEXEC, F_GETFD, F_GETFL, F_SETFD, F_SETFL, FD_CLOEXEC, O_ACCMODE,
    O_APPEND, O_CLOEXEC, O_CREAT, O_DIRECTORY, O_EXCL, O_NOFOLLOW, O_NONBLOCK, O_RDONLY, O_RDWR,
    O_SYNC, O_TRUNC, O_WRONLY,
};

/// `open(path, flags, mode)`: open or create `path`.
///
/// `flags` must contain exactly one of `O_RDONLY`, `O_WRONLY`, `O_RDWR`,
/// optionally OR-ed with other `O_*` bits. `mode` sets the permission bits of
/// a newly created file and is ignored unless `flags` requests creation.
/// Returns the lowest unused descriptor.
#[track_caller]
pub fn open<P: AsPath + ?Sized>(path: &P, flags: c_int, mode: mode_t) -> SysResult<RawFd> {
    let location = Location::caller();
    let ret = path.with_c_path(|p| {
        // SAFETY: p is NUL-terminated and outlives the call.
        Ok(unsafe { libc::open(p.as_ptr(), flags, libc::c_uint::from(mode)) })
    })?;
    cvt("open", ret, location)
}

/// `openat(dirfd, path, flags, mode)`: `open` relative to a directory.
///
/// An absolute `path` ignores `dirfd`. [`AT_FDCWD`] resolves relative paths
/// against the working directory, making this equivalent to [`open`].
#[track_caller]
pub fn openat<P: AsPath + ?Sized>(
    dirfd: RawFd,
    path: &P,
    flags: c_int,
    mode: mode_t,
) -> SysResult<RawFd> {
    let location = Location::caller();
    let ret = path.with_c_path(|p| {
        // SAFETY: p is NUL-terminated and outlives the call.
        Ok(unsafe { libc::openat(dirfd, p.as_ptr(), flags, libc::c_uint::from(mode)) })
    })?;
    cvt("openat", ret, location)
}

/// `creat(path, mode)`: same as `open(path, O_WRONLY|O_CREAT|O_TRUNC, mode)`.
///
/// The descriptor is write-only. Use [`open`] with `O_RDWR|O_CREAT|O_TRUNC`
/// when the file must also be read back.
#[track_caller]
pub fn creat<P: AsPath + ?Sized>(path: &P, mode: mode_t) -> SysResult<RawFd> {
    let location = Location::caller();
    let ret = path.with_c_path(|p| {
        // SAFETY: p is NUL-terminated and outlives the call.
        Ok(unsafe { libc::creat(p.as_ptr(), mode) })
    })?;
    cvt("creat", ret, location)
}

/// `fcntl(fd, cmd, arg)`: command-coded descriptor control.
///
/// The meaning of `arg` and of the returned value depend on `cmd`; commands
/// that take no argument ignore it. Only integer-argument commands are
/// supported (`F_GETFL`, `F_SETFL`, `F_GETFD`, `F_SETFD`, `F_DUPFD`, ...).
#[track_caller]
pub fn fcntl(fd: RawFd, cmd: c_int, arg: c_int) -> SysResult<c_int> {
    let location = Location::caller();
    // SAFETY: only integer-argument commands are reachable; the kernel
    // rejects invalid fds and commands with an errno.
    let ret = unsafe { libc::fcntl(fd, cmd, arg) };
    cvt("fcntl", ret, location)
}
