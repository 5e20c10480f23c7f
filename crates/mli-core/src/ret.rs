//! Sentinel-to-`Result` conversion shared by every wrapper.

use std::panic::Location;

use crate::errno::{Errno, SysResult};
use crate::report;

/// Capture the failing call's `errno`, then run the reporting hook.
///
/// A primitive that returned its sentinel without setting `errno` is
/// reported through the sentinel variant and surfaces as `Errno(0)`.
#[cold]
pub(crate) fn failure(op: &'static str, location: &'static Location<'static>) -> Errno {
    let errno = Errno::last();
    if errno.raw() == 0 {
        report::sentinel_at(op, location);
    } else {
        report::check_errno_at(op, location);
    }
    errno
}

/// Map a `-1`-on-failure return value to a [`SysResult`].
#[inline]
pub(crate) fn cvt<T>(op: &'static str, ret: T, location: &'static Location<'static>) -> SysResult<T>
where
    T: Copy + PartialEq + From<i8>,
{
    if ret == T::from(-1) {
        Err(failure(op, location))
    } else {
        Ok(ret)
    }
}

/// Like [`cvt`] for primitives whose success value carries no information.
#[inline]
pub(crate) fn cvt_unit(
    op: &'static str,
    ret: libc::c_int,
    location: &'static Location<'static>,
) -> SysResult<()> {
    cvt(op, ret, location).map(|_| ())
}

/// Map a `-1` return from a limit query.
///
/// The caller must zero `errno` before the call: `-1` with `errno` still 0
/// means "no limit" and becomes `Ok(None)`.
#[inline]
pub(crate) fn cvt_limit(
    op: &'static str,
    ret: libc::c_long,
    location: &'static Location<'static>,
) -> SysResult<Option<libc::c_long>> {
    if ret != -1 {
        return Ok(Some(ret));
    }
    if Errno::last().raw() == 0 {
        Ok(None)
    } else {
        Err(failure(op, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errno::{clear_errno, set_errno};

    #[test]
    fn success_values_pass_through_untouched() {
        let here = Location::caller();
        assert_eq!(cvt("x", 0i32, here), Ok(0));
        assert_eq!(cvt("x", 7isize, here), Ok(7));
        assert_eq!(cvt("x", -2i64, here), Ok(-2));
    }

    #[test]
    fn minus_one_becomes_current_errno() {
        let here = Location::caller();
        set_errno(libc::EBADF);
        assert_eq!(cvt("x", -1i32, here), Err(Errno::EBADF));
        clear_errno();
    }

    #[test]
    fn limit_without_errno_is_unbounded() {
        let here = Location::caller();
        clear_errno();
        assert_eq!(cvt_limit("sysconf", -1, here), Ok(None));
        assert_eq!(cvt_limit("sysconf", 4096, here), Ok(Some(4096)));
        set_errno(libc::EINVAL);
        assert_eq!(cvt_limit("sysconf", -1, here), Err(Errno::EINVAL));
        clear_errno();
    }
}
