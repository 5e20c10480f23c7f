//! File status: `stat`, `fstat`, `lstat`, `fstatat`.

use std::ffi::c_int;
use std::mem::MaybeUninit;
use std::panic::Location;

use crate::RawFd;
use crate::errno::SysResult;
use crate::path::AsPath;
use crate::ret::cvt;

pub use libc::{
    AT_EMPTY_PATH, AT_SYMLINK_NOFOLLOW, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT,
    S_IFREG, S_IFSOCK, S_IRGRP, S_IROTH, S_IRUSR, S_IRWXG, S_IRWXO, S_IRWXU, S_ISGID, S_ISUID,
    S_ISVTX, S_IWGRP, S_IWOTH, S_IWUSR, S_IXGRP, S_IXOTH, S_IXUSR,
};

/// Status record filled by the `stat` family.
pub type FileStat = libc::stat;

/// File type encoded in the `S_IFMT` bits of `st_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
    Unknown,
}

impl FileType {
    /// Classify an `st_mode` value.
    #[must_use]
    pub fn from_mode(mode: libc::mode_t) -> Self {
        match mode & S_IFMT {
            S_IFREG => Self::Regular,
            S_IFDIR => Self::Directory,
            S_IFLNK => Self::Symlink,
            S_IFIFO => Self::Fifo,
            S_IFSOCK => Self::Socket,
            S_IFCHR => Self::CharDevice,
            S_IFBLK => Self::BlockDevice,
            _ => Self::Unknown,
        }
    }

    /// Classify a filled status record.
    #[must_use]
    pub fn of(st: &FileStat) -> Self {
        Self::from_mode(st.st_mode)
    }
}

/// Permission and special bits of `st_mode` (everything below `S_IFMT`).
#[must_use]
pub fn permission_bits(mode: libc::mode_t) -> libc::mode_t {
    mode & !S_IFMT
}

#[inline]
fn filled(
    op: &'static str,
    location: &'static Location<'static>,
    call: impl FnOnce(*mut FileStat) -> c_int,
) -> SysResult<FileStat> {
    let mut st = MaybeUninit::<FileStat>::uninit();
    cvt(op, call(st.as_mut_ptr()), location)?;
    // SAFETY: the primitive returned success, so it filled the whole record.
    Ok(unsafe { st.assume_init() })
}

/// `stat(path)`: status of `path`, following symbolic links.
#[track_caller]
pub fn stat<P: AsPath + ?Sized>(path: &P) -> SysResult<FileStat> {
    let location = Location::caller();
    path.with_c_path(|p| {
        filled("stat", location, |st| {
            // SAFETY: p is NUL-terminated; st points at writable storage.
            unsafe { libc::stat(p.as_ptr(), st) }
        })
    })
}

/// `fstat(fd)`: status of an open descriptor.
#[track_caller]
pub fn fstat(fd: RawFd) -> SysResult<FileStat> {
    let location = Location::caller();
    filled("fstat", location, |st| {
        // SAFETY: st points at writable storage.
        unsafe { libc::fstat(fd, st) }
    })
}

/// `lstat(path)`: like [`stat`], but a symbolic link describes itself.
#[track_caller]
pub fn lstat<P: AsPath + ?Sized>(path: &P) -> SysResult<FileStat> {
    let location = Location::caller();
    path.with_c_path(|p| {
        filled("lstat", location, |st| {
            // SAFETY: p is NUL-terminated; st points at writable storage.
            unsafe { libc::lstat(p.as_ptr(), st) }
        })
    })
}

/// `fstatat(dirfd, path, flags)`: [`stat`] relative to a directory.
///
/// `AT_SYMLINK_NOFOLLOW` in `flags` gives [`lstat`] semantics; `AT_FDCWD`
/// as `dirfd` resolves against the working directory.
#[track_caller]
pub fn fstatat<P: AsPath + ?Sized>(dirfd: RawFd, path: &P, flags: c_int) -> SysResult<FileStat> {
    let location = Location::caller();
    path.with_c_path(|p| {
        filled("fstatat", location, |st| {
            // SAFETY: p is NUL-terminated; st points at writable storage.
            unsafe { libc::fstatat(dirfd, p.as_ptr(), st, flags) }
        })
    })
}
