//! `<unistd.h>` pass-throughs: descriptor I/O, duplication, durability,
//! working directory, and runtime limit queries.
//!
//! Short reads and writes, `EINTR`, and partial transfers are returned to
//! the caller exactly as the kernel reported them; nothing is resumed.

use std::ffi::{c_int, c_long};
use std::panic::Location;


use crate::RawFd;
use crate::errno::{SysResult, clear_errno};
use crate::path::AsPath;
use crate::ret::{cvt, cvt_limit, cvt_unit};

pub use libc::{
    _PC_LINK_MAX, _PC_NAME_MAX, _PC_PATH_MAX, _PC_PIPE_BUF, _SC_ARG_MAX, _SC_CLK_TCK,
    _SC_NPROCESSORS_ONLN, _SC_OPEN_MAX, _SC_PAGESIZE, SEEK_CUR, SEEK_END, SEEK_SET, STDERR_FILENO,
    STDIN_FILENO, STDOUT_FILENO, off_t,
};

/// `close(fd)`.
///
/// Releases any record locks the process holds on the file. When `fd` is the
/// last reference to the open file description, its resources are freed.
#[track_caller]
pub fn close(fd: RawFd) -> SysResult<()> {
    let location = Location::caller();
    // SAFETY: close accepts any integer; invalid fds fail with EBADF.
    let ret = unsafe { libc::close(fd) };
    cvt_unit("close", ret, location)
}

/// `lseek(fd, offset, whence)`: set the file offset, returning the new one.
///
/// Seeking past end of file is allowed and does not change the file size.
#[track_caller]
pub fn lseek(fd: RawFd, offset: off_t, whence: c_int) -> SysResult<off_t> {
    let location = Location::caller();
    // SAFETY: lseek takes no pointers.
    let ret = unsafe { libc::lseek(fd, offset, whence) };
    cvt("lseek", ret, location)
}

/// `read(fd, buf)`: read up to `buf.len()` bytes at the current offset.
///
/// `Ok(0)` means end of file. Fewer bytes than requested is not an error.
#[track_caller]
pub fn read(fd: RawFd, buf: &mut [u8]) -> SysResult<usize> {
    let location = Location::caller();
    // SAFETY: buf is valid for writes of buf.len() bytes.
    let ret = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    cvt("read", ret, location).map(|n| n as usize)
}

/// `write(fd, buf)`: write up to `buf.len()` bytes at the current offset
/// (or at end of file under `O_APPEND`).
#[track_caller]
pub fn write(fd: RawFd, buf: &[u8]) -> SysResult<usize> {
    let location = Location::caller();
    // SAFETY: buf is valid for reads of buf.len() bytes.
    let ret = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
    cvt("write", ret, location).map(|n| n as usize)
}

/// `pread(fd, buf, offset)`: read at `offset` without moving the file offset.
#[track_caller]
pub fn pread(fd: RawFd, buf: &mut [u8], offset: off_t) -> SysResult<usize> {
    let location = Location::caller();
    // SAFETY: buf is valid for writes of buf.len() bytes.
    let ret = unsafe { libc::pread(fd, buf.as_mut_ptr().cast(), buf.len(), offset) };
    cvt("pread", ret, location).map(|n| n as usize)
}

/// `pwrite(fd, buf, offset)`: write at `offset` without moving the file offset.
#[track_caller]
pub fn pwrite(fd: RawFd, buf: &[u8], offset: off_t) -> SysResult<usize> {
    let location = Location::caller();
    // SAFETY: buf is valid for reads of buf.len() bytes.
    let ret = unsafe { libc::pwrite(fd, buf.as_ptr().cast(), buf.len(), offset) };
    cvt("pwrite", ret, location).map(|n| n as usize)
}

/// `dup(oldfd)`: duplicate onto the lowest unused descriptor.
///
/// Both descriptors share one open file description (offset and status
/// flags). The new descriptor has close-on-exec cleared.
#[track_caller]
pub fn dup(oldfd: RawFd) -> SysResult<RawFd> {
    let location = Location::caller();
    // SAFETY: dup takes no pointers.
    let ret = unsafe { libc::dup(oldfd) };
    cvt("dup", ret, location)
}

/// `dup2(oldfd, newfd)`: duplicate onto exactly `newfd`.
///
/// If `newfd` is open it is closed first, atomically with the duplication.
/// An invalid `oldfd` fails and leaves `newfd` open. When `oldfd == newfd`
/// and `oldfd` is valid, nothing happens and `newfd` is returned.
#[track_caller]
pub fn dup2(oldfd: RawFd, newfd: RawFd) -> SysResult<RawFd> {
    let location = Location::caller();
    // SAFETY: dup2 takes no pointers.
    let ret = unsafe { libc::dup2(oldfd, newfd) };
    cvt("dup2", ret, location)
}

/// `sync()`: schedule all modified filesystem data and metadata for writing.
///
/// Cannot fail, so no reporting happens.
pub fn sync() {
    // SAFETY: sync takes no arguments.
    unsafe { libc::sync() };
}

/// `fsync(fd)`: flush the file's data and metadata to storage, blocking
/// until the device reports completion.
#[track_caller]
pub fn fsync(fd: RawFd) -> SysResult<()> {
    let location = Location::caller();
    // SAFETY: fsync takes no pointers.
    let ret = unsafe { libc::fsync(fd) };
    cvt_unit("fsync", ret, location)
}

/// `fdatasync(fd)`: like [`fsync`] but skips metadata not needed to read
/// the data back.
#[track_caller]
pub fn fdatasync(fd: RawFd) -> SysResult<()> {
    let location = Location::caller();
    // SAFETY: fdatasync takes no pointers.
    let ret = unsafe { libc::fdatasync(fd) };
    cvt_unit("fdatasync", ret, location)
}

/// `chdir(path)`: change the process working directory.
#[track_caller]
pub fn chdir<P: AsPath + ?Sized>(path: &P) -> SysResult<()> {
    let location = Location::caller();
    let ret = path.with_c_path(|p| {
        // SAFETY: p is NUL-terminated and outlives the call.
        Ok(unsafe { libc::chdir(p.as_ptr()) })
    })?;
    cvt_unit("chdir", ret, location)
}

/// `sysconf(name)`: query a runtime system limit or option.
///
/// `Ok(None)` means the limit is indeterminate or the option unsupported
/// (`-1` without `errno`); an unknown `name` fails with `EINVAL`.
#[track_caller]
pub fn sysconf(name: c_int) -> SysResult<Option<c_long>> {
    let location = Location::caller();
    clear_errno();
    // SAFETY: sysconf takes no pointers.
    let ret = unsafe { libc::sysconf(name) };
    cvt_limit("sysconf", ret, location)
}

/// `pathconf(path, name)`: query a limit for the file system holding `path`.
#[track_caller]
pub fn pathconf<P: AsPath + ?Sized>(path: &P, name: c_int) -> SysResult<Option<c_long>> {
    let location = Location::caller();
    let ret = path.with_c_path(|p| {
        clear_errno();
        // SAFETY: p is NUL-terminated and outlives the call.
        Ok(unsafe { libc::pathconf(p.as_ptr(), name) })
    })?;
    cvt_limit("pathconf", ret, location)
}

/// `fpathconf(fd, name)`: [`pathconf`] for an open descriptor.
#[track_caller]
pub fn fpathconf(fd: RawFd, name: c_int) -> SysResult<Option<c_long>> {
    let location = Location::caller();
    clear_errno();
    // SAFETY: fpathconf takes no pointers.
    let ret = unsafe { libc::fpathconf(fd, name) };
    cvt_limit("fpathconf", ret, location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errno::Errno;
    use crate::fcntl::{O_CREAT, O_RDWR, O_TRUNC, open};

    fn scratch_fd(dir: &tempfile::TempDir, name: &str) -> RawFd {
        open(&dir.path().join(name), O_RDWR | O_CREAT | O_TRUNC, 0o600).unwrap()
    }

    #[test]
    fn close_bad_fd_returns_ebadf() {
        assert_eq!(close(-1), Err(Errno::EBADF));
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn failure_leaves_errno_cleared() {
        assert_eq!(close(-1), Err(Errno::EBADF));
        assert_eq!(crate::errno::get_errno(), 0, "reporting hook must reset errno");
    }

    #[test]
    fn write_seek_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fd = scratch_fd(&dir, "t.txt");
        assert_eq!(write(fd, b"abc"), Ok(3));
        assert_eq!(lseek(fd, 0, SEEK_SET), Ok(0));
        let mut buf = [0u8; 3];
        assert_eq!(read(fd, &mut buf), Ok(3));
        assert_eq!(&buf, b"abc");
        assert_eq!(lseek(fd, 0, SEEK_CUR), Ok(3));
        assert_eq!(read(fd, &mut buf), Ok(0), "at end of file read returns 0");
        close(fd).unwrap();
    }

    #[test]
    fn seek_end_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let fd = scratch_fd(&dir, "sized");
        write(fd, &[7u8; 100]).unwrap();
        assert_eq!(lseek(fd, 0, SEEK_END), Ok(100));
        assert_eq!(lseek(fd, -10, SEEK_END), Ok(90));
        close(fd).unwrap();
    }

    #[test]
    fn seek_on_pipe_is_espipe() {
        let mut fds = [0 as c_int; 2];
        // SAFETY: fds is a valid [c_int; 2].
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        assert_eq!(lseek(fds[0], 0, SEEK_SET), Err(Errno::ESPIPE));
        close(fds[0]).unwrap();
        close(fds[1]).unwrap();
    }

    #[test]
    fn positioned_io_keeps_offset() {
        let dir = tempfile::tempdir().unwrap();
        let fd = scratch_fd(&dir, "p");
        write(fd, b"0123456789").unwrap();
        lseek(fd, 2, SEEK_SET).unwrap();

        assert_eq!(pwrite(fd, b"XY", 7), Ok(2));
        assert_eq!(lseek(fd, 0, SEEK_CUR), Ok(2));

        let mut two = [0u8; 2];
        assert_eq!(pread(fd, &mut two, 7), Ok(2));
        assert_eq!(&two, b"XY");
        assert_eq!(lseek(fd, 0, SEEK_CUR), Ok(2));

        let mut rest = [0u8; 3];
        read(fd, &mut rest).unwrap();
        assert_eq!(&rest, b"234");
        close(fd).unwrap();
    }

    #[test]
    fn dup_shares_offset() {
        let dir = tempfile::tempdir().unwrap();
        let fd = scratch_fd(&dir, "d");
        let copy = dup(fd).unwrap();
        assert_ne!(copy, fd);
        write(copy, b"hello").unwrap();
        assert_eq!(lseek(fd, 0, SEEK_CUR), Ok(5));
        close(copy).unwrap();
        close(fd).unwrap();
    }

    #[test]
    fn dup2_same_fd_is_noop() {
        let fd = open("/dev/null", crate::fcntl::O_RDONLY, 0).unwrap();
        assert_eq!(dup2(fd, fd), Ok(fd));
        close(fd).unwrap();
    }

    #[test]
    fn dup2_bad_source_keeps_target_open() {
        let fd = open("/dev/null", crate::fcntl::O_RDONLY, 0).unwrap();
        assert_eq!(dup2(-1, fd), Err(Errno::EBADF));
        assert_eq!(lseek(fd, 0, SEEK_SET), Ok(0), "target must still be open");
        close(fd).unwrap();
    }

    #[test]
    fn durability_calls_succeed_on_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let fd = scratch_fd(&dir, "sync");
        write(fd, b"data").unwrap();
        assert_eq!(fsync(fd), Ok(()));
        assert_eq!(fdatasync(fd), Ok(()));
        sync();
        close(fd).unwrap();
    }

    #[test]
    fn sysconf_matches_raw_call() {
        // SAFETY: sysconf takes no pointers.
        let raw = unsafe { libc::sysconf(_SC_PAGESIZE) };
        assert_eq!(sysconf(_SC_PAGESIZE), Ok(Some(raw)));
    }

    #[test]
    fn sysconf_unknown_name_is_einval() {
        assert_eq!(sysconf(-1), Err(Errno::EINVAL));
    }

    #[test]
    fn pathconf_and_fpathconf_agree() {
        let dir = tempfile::tempdir().unwrap();
        let fd = open(dir.path(), crate::fcntl::O_RDONLY, 0).unwrap();
        let by_path = pathconf(dir.path(), _PC_NAME_MAX).unwrap();
        let by_fd = fpathconf(fd, _PC_NAME_MAX).unwrap();
        assert_eq!(by_path, by_fd);
        assert!(by_path.is_some_and(|n| n > 0));
        close(fd).unwrap();
    }

    #[test]
    fn fpathconf_bad_fd() {
        assert_eq!(fpathconf(-1, _PC_NAME_MAX), Err(Errno::EBADF));
    }

    #[test]
    fn chdir_missing_dir_is_enoent() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(chdir(&dir.path().join("absent")), Err(Errno::ENOENT));
    }
}
