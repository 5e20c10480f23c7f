//! Directory streams: `opendir`, `readdir`, `closedir`.
//!
//! A [`DirStream`] is a bare handle. It is never closed implicitly; pass it
//! to [`closedir`] when done or the underlying descriptor leaks.

use std::ffi::{CStr, c_int};
use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;
use std::ptr::NonNull;

use crate::errno::{Errno, SysResult, clear_errno};
use crate::path::AsPath;
use crate::ret::{cvt_unit, failure};

pub use libc::{DT_BLK, DT_CHR, DT_DIR, DT_FIFO, DT_LNK, DT_REG, DT_SOCK, DT_UNKNOWN};

/// Open directory stream handle.
pub struct DirStream {
    ptr: NonNull<libc::DIR>,
}

// SAFETY: a DIR* may be used from any thread as long as it is not used from
// two at once, which &mut access in readdir guarantees.
unsafe impl Send for DirStream {}

impl DirStream {
    /// The raw `DIR*`, for interop with other C APIs.
    #[must_use]
    pub fn as_raw(&self) -> *mut libc::DIR {
        self.ptr.as_ptr()
    }

    /// Descriptor backing this stream (`dirfd`).
    #[track_caller]
    pub fn fd(&self) -> SysResult<c_int> {
        let location = Location::caller();
        // SAFETY: ptr is a live DIR* owned by this handle.
        let ret = unsafe { libc::dirfd(self.ptr.as_ptr()) };
        crate::ret::cvt("dirfd", ret, location)
    }
}

impl fmt::Debug for DirStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirStream").field("ptr", &self.ptr).finish()
    }
}

/// One entry yielded by [`readdir`].
///
/// Borrowed from the stream's internal buffer; the next `readdir` call on the
/// same stream may overwrite it.
pub struct DirEntry<'a> {
    raw: &'a libc::dirent,
    _stream: PhantomData<&'a mut DirStream>,
}

impl<'a> DirEntry<'a> {
    /// Entry name, without any directory prefix.
    #[must_use]
    pub fn name(&self) -> &'a CStr {
        // SAFETY: d_name is NUL-terminated within the record the kernel filled.
        unsafe { CStr::from_ptr(self.raw.d_name.as_ptr()) }
    }

    /// Inode number.
    #[must_use]
    pub fn ino(&self) -> libc::ino_t {
        self.raw.d_ino
    }

    /// `d_type` byte, one of the `DT_*` constants (`DT_UNKNOWN` when the file
    /// system does not report it).
    #[must_use]
    pub fn file_type(&self) -> u8 {
        self.raw.d_type
    }

    /// True for the `.` and `..` entries.
    #[must_use]
    pub fn is_dot(&self) -> bool {
        matches!(self.name().to_bytes(), b"." | b"..")
    }

    /// The underlying `dirent` record.
    #[must_use]
    pub fn as_raw(&self) -> &'a libc::dirent {
        self.raw
    }
}

impl fmt::Debug for DirEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntry")
            .field("name", &self.name())
            .field("ino", &self.ino())
            .field("type", &self.file_type())
            .finish()
    }
}

/// `opendir(path)`: open a stream positioned at the first entry.
#[track_caller]
pub fn opendir<P: AsPath + ?Sized>(path: &P) -> SysResult<DirStream> {
    let location = Location::caller();
    let ptr = path.with_c_path(|p| {
        // SAFETY: p is NUL-terminated and outlives the call.
        Ok(unsafe { libc::opendir(p.as_ptr()) })
    })?;
    match NonNull::new(ptr) {
        Some(ptr) => Ok(DirStream { ptr }),
        None => Err(failure("opendir", location)),
    }
}

/// `readdir(stream)`: next entry, in file-system order.
///
/// `errno` is zeroed before the call so the two null outcomes stay apart:
/// `Ok(None)` is end of stream, `Err` is a read error.
#[track_caller]
pub fn readdir(stream: &mut DirStream) -> SysResult<Option<DirEntry<'_>>> {
    let location = Location::caller();
    clear_errno();
    // SAFETY: stream holds a live DIR* and &mut excludes concurrent use.
    let ent = unsafe { libc::readdir(stream.ptr.as_ptr()) };
    if ent.is_null() {
        return if Errno::last().raw() == 0 {
            Ok(None)
        } else {
            Err(failure("readdir", location))
        };
    }
    // SAFETY: non-null readdir results point at a record that stays valid
    // until the next readdir/closedir on this stream, which the borrow of
    // `stream` prevents.
    let raw = unsafe { &*ent };
    Ok(Some(DirEntry {
        raw,
        _stream: PhantomData,
    }))
}

/// `closedir(stream)`: close the stream and its descriptor.
///
/// The handle is consumed whether or not the call succeeds.
#[track_caller]
pub fn closedir(stream: DirStream) -> SysResult<()> {
    let location = Location::caller();
    // SAFETY: stream is a live DIR* and is consumed here, so it is never
    // used again.
    let ret = unsafe { libc::closedir(stream.ptr.as_ptr()) };
    cvt_unit("closedir", ret, location)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(dir: &std::path::Path) -> Vec<String> {
        let mut stream = opendir(dir).unwrap();
        let mut out = Vec::new();
        while let Some(entry) = readdir(&mut stream).unwrap() {
            out.push(entry.name().to_string_lossy().into_owned());
        }
        closedir(stream).unwrap();
        out.sort();
        out
    }

    #[test]
    fn lists_every_entry_once_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(names(dir.path()), [".", "..", "a", "b", "c", "sub"]);
    }

    #[test]
    fn end_of_stream_leaves_errno_zero_and_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = opendir(dir.path()).unwrap();
        let mut count = 0;
        while readdir(&mut stream).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2, "empty dir has only . and ..");
        assert_eq!(crate::errno::get_errno(), 0);
        assert!(readdir(&mut stream).unwrap().is_none());
        closedir(stream).unwrap();
    }

    #[test]
    fn entry_types_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("dir")).unwrap();
        let mut stream = opendir(dir.path()).unwrap();
        while let Some(entry) = readdir(&mut stream).unwrap() {
            let kind = entry.file_type();
            match entry.name().to_bytes() {
                b"file" => assert!(kind == DT_REG || kind == DT_UNKNOWN),
                b"dir" => assert!(kind == DT_DIR || kind == DT_UNKNOWN),
                _ => assert!(entry.is_dot()),
            }
            assert_ne!(entry.ino(), 0);
        }
        closedir(stream).unwrap();
    }

    #[test]
    fn entry_inode_matches_stat() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tracked");
        std::fs::write(&file, b"x").unwrap();
        let expected: libc::ino_t = crate::stat::stat(&file).unwrap().st_ino;

        let mut stream = opendir(dir.path()).unwrap();
        let mut found = None;
        while let Some(entry) = readdir(&mut stream).unwrap() {
            if entry.name().to_bytes() == b"tracked" {
                found = Some(entry.ino());
            }
        }
        closedir(stream).unwrap();
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn opendir_on_file_is_enotdir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"").unwrap();
        assert_eq!(opendir(&file).map(|_| ()), Err(Errno::ENOTDIR));
    }

    #[test]
    fn opendir_missing_is_enoent() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            opendir(&dir.path().join("gone")).map(|_| ()),
            Err(Errno::ENOENT)
        );
    }

    #[test]
    fn stream_exposes_its_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let stream = opendir(dir.path()).unwrap();
        assert!(stream.fd().unwrap() >= 0);
        assert!(!stream.as_raw().is_null());
        closedir(stream).unwrap();
    }
}
