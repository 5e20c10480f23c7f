//! Path arguments.
//!
//! Every path-taking wrapper is generic over [`AsPath`], so one definition
//! serves C strings, Rust strings, OS strings, `Path`s and raw bytes.
//! A `CStr` is handed to the OS as-is. Anything else is NUL-terminated on the
//! stack when short, or copied into a `CString` otherwise.

use std::ffi::{CStr, CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::errno::{Errno, SysResult};

/// Paths shorter than this are terminated in a stack buffer.
const MAX_STACK_PATH: usize = 256;

/// A value that can be presented to the OS as a NUL-terminated path.
pub trait AsPath {
    /// Call `f` with a NUL-terminated view of this path.
    ///
    /// Fails with `EINVAL`, without calling `f`, if the path contains an
    /// interior NUL byte.
    fn with_c_path<T, F>(&self, f: F) -> SysResult<T>
    where
        F: FnOnce(&CStr) -> SysResult<T>;
}

fn with_bytes<T, F>(bytes: &[u8], f: F) -> SysResult<T>
where
    F: FnOnce(&CStr) -> SysResult<T>,
{
    if bytes.len() < MAX_STACK_PATH {
        let mut buf = [0u8; MAX_STACK_PATH];
        buf[..bytes.len()].copy_from_slice(bytes);
        let c_path =
            CStr::from_bytes_with_nul(&buf[..=bytes.len()]).map_err(|_| Errno::EINVAL)?;
        f(c_path)
    } else {
        let c_path = CString::new(bytes).map_err(|_| Errno::EINVAL)?;
        f(&c_path)
    }
}

impl AsPath for CStr {
    #[inline]
    fn with_c_path<T, F>(&self, f: F) -> SysResult<T>
    where
        F: FnOnce(&CStr) -> SysResult<T>,
    {
        f(self)
    }
}

impl AsPath for CString {
    #[inline]
    fn with_c_path<T, F>(&self, f: F) -> SysResult<T>
    where
        F: FnOnce(&CStr) -> SysResult<T>,
    {
        f(self.as_c_str())
    }
}

impl AsPath for [u8] {
    #[inline]
    fn with_c_path<T, F>(&self, f: F) -> SysResult<T>
    where
        F: FnOnce(&CStr) -> SysResult<T>,
    {
        with_bytes(self, f)
    }
}

macro_rules! as_path_via_bytes {
    ($($ty:ty => $to_bytes:expr),* $(,)?) => {
        $(
            impl AsPath for $ty {
                #[inline]
                fn with_c_path<T, F>(&self, f: F) -> SysResult<T>
                where
                    F: FnOnce(&CStr) -> SysResult<T>,
                {
                    let to_bytes: fn(&$ty) -> &[u8] = $to_bytes;
                    with_bytes(to_bytes(self), f)
                }
            }
        )*
    };
}

as_path_via_bytes! {
    Vec<u8> => |v| v.as_slice(),
    str => |s| s.as_bytes(),
    String => |s| s.as_bytes(),
    OsStr => |s| s.as_bytes(),
    OsString => |s| s.as_bytes(),
    Path => |p| p.as_os_str().as_bytes(),
    PathBuf => |p| p.as_os_str().as_bytes(),
}

impl<P: AsPath + ?Sized> AsPath for &P {
    #[inline]
    fn with_c_path<T, F>(&self, f: F) -> SysResult<T>
    where
        F: FnOnce(&CStr) -> SysResult<T>,
    {
        (**self).with_c_path(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<P: AsPath + ?Sized>(p: &P) -> SysResult<Vec<u8>> {
        p.with_c_path(|c| Ok(c.to_bytes().to_vec()))
    }

    #[test]
    fn all_representations_agree() {
        let expected = b"dir/t.txt".to_vec();
        assert_eq!(collect("dir/t.txt"), Ok(expected.clone()));
        assert_eq!(collect(&String::from("dir/t.txt")), Ok(expected.clone()));
        assert_eq!(collect(OsStr::new("dir/t.txt")), Ok(expected.clone()));
        assert_eq!(collect(Path::new("dir/t.txt")), Ok(expected.clone()));
        assert_eq!(collect(&PathBuf::from("dir/t.txt")), Ok(expected.clone()));
        assert_eq!(collect(&b"dir/t.txt"[..]), Ok(expected.clone()));
        assert_eq!(collect(c"dir/t.txt"), Ok(expected.clone()));
        assert_eq!(collect(&&"dir/t.txt"), Ok(expected));
    }

    #[test]
    fn interior_nul_is_einval() {
        assert_eq!(collect("a\0b"), Err(Errno::EINVAL));
        let long = format!("{}\0tail", "x".repeat(MAX_STACK_PATH * 2));
        assert_eq!(collect(long.as_str()), Err(Errno::EINVAL));
    }

    #[test]
    fn long_paths_use_heap_copy() {
        let long = "y".repeat(MAX_STACK_PATH + 10);
        assert_eq!(collect(long.as_str()), Ok(long.into_bytes()));
    }

    #[test]
    fn boundary_length_fits() {
        let edge = "z".repeat(MAX_STACK_PATH - 1);
        assert_eq!(collect(edge.as_str()), Ok(edge.into_bytes()));
    }

    #[test]
    fn empty_path_is_passed_through() {
        assert_eq!(collect(""), Ok(Vec::new()));
    }

    #[test]
    fn cstr_is_not_copied() {
        let original = c"/tmp";
        let ptr = original
            .with_c_path(|c| Ok(c.as_ptr()))
            .expect("CStr path never fails");
        assert_eq!(ptr, original.as_ptr());
    }
}
