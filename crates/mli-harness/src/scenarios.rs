//! Conformance scenarios.
//!
//! Each scenario drives the wrappers against a private scratch directory and
//! checks one observable property. Scenarios never touch paths outside that
//! directory, except for `/dev/null` and the process working directory, which
//! `chdir_round_trip` restores before returning.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use mli_core::config::DIAGNOSTICS_COMPILED;
use mli_core::errno::{clear_errno, get_errno, set_errno};
use mli_core::fcntl::{
    AT_FDCWD, F_GETFD, F_GETFL, F_SETFD, FD_CLOEXEC, O_ACCMODE, O_CREAT, O_DIRECTORY, O_RDONLY,
    O_RDWR, O_TRUNC, O_WRONLY,
};
use mli_core::report::{DiagnosticKind, MemoryReporter, with_reporter};
use mli_core::stat::AT_SYMLINK_NOFOLLOW;
use mli_core::unistd::{_PC_NAME_MAX, _SC_PAGESIZE, SEEK_CUR, SEEK_END, SEEK_SET, off_t};
use mli_core::{
    Errno, FileType, RawFd, check_errno, check_sentinel, chdir, close, closedir, creat, dup, dup2,
    fcntl, fdatasync, fpathconf, fstat, fstatat, fsync, lseek, lstat, open, openat, opendir,
    pathconf, pread, pwrite, read, readdir, stat, sync, sysconf, write,
};

use crate::error::{HarnessError, SysContext};

type ScenarioFn = fn(&Path) -> Result<(), HarnessError>;

/// One runnable property check.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    /// Wrappers the scenario exercises.
    pub symbols: &'static [&'static str],
    /// The property, in one sentence.
    pub property: &'static str,
    run: ScenarioFn,
}

impl Scenario {
    /// Build a scenario from a plain function.
    #[must_use]
    pub const fn from_fn(
        name: &'static str,
        symbols: &'static [&'static str],
        property: &'static str,
        run: ScenarioFn,
    ) -> Self {
        Self {
            name,
            symbols,
            property,
            run,
        }
    }

    /// Run against `dir`, which must exist and be empty.
    pub fn run(&self, dir: &Path) -> Result<(), HarnessError> {
        (self.run)(dir)
    }
}

/// Every scenario, in execution order.
#[must_use]
pub fn all() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "write_seek_read",
            symbols: &["open", "write", "lseek", "read", "close"],
            property: "bytes written then re-read after seeking to 0 match, leaving the offset at 3",
            run: write_seek_read,
        },
        Scenario {
            name: "seek_end_reports_size",
            symbols: &["open", "lseek", "fstat"],
            property: "lseek(SEEK_END) returns the size known independently",
            run: seek_end_reports_size,
        },
        Scenario {
            name: "creat_truncates_write_only",
            symbols: &["creat", "fcntl", "write", "fstat"],
            property: "creat truncates an existing file and yields a write-only descriptor",
            run: creat_truncates_write_only,
        },
        Scenario {
            name: "openat_matches_open",
            symbols: &["open", "openat", "fstat"],
            property: "openat relative to a directory fd or AT_FDCWD names the same file as open",
            run: openat_matches_open,
        },
        Scenario {
            name: "positioned_io_independent",
            symbols: &["pwrite", "pread", "lseek"],
            property: "pwrite and pread never move the descriptor offset",
            run: positioned_io_independent,
        },
        Scenario {
            name: "dup_shares_offset",
            symbols: &["dup", "write", "lseek"],
            property: "a dup'd descriptor shares the open file description",
            run: dup_shares_offset,
        },
        Scenario {
            name: "dup2_replaces_open_target",
            symbols: &["dup2", "write", "lseek", "fstat"],
            property: "dup2 onto an open descriptor closes it and aliases the source",
            run: dup2_replaces_open_target,
        },
        Scenario {
            name: "fcntl_fd_flags",
            symbols: &["fcntl"],
            property: "F_SETFD/F_GETFD round-trip FD_CLOEXEC",
            run: fcntl_fd_flags,
        },
        Scenario {
            name: "durability_calls",
            symbols: &["fsync", "fdatasync", "sync"],
            property: "flushes succeed on a regular file and fail with EBADF on a closed one",
            run: durability_calls,
        },
        Scenario {
            name: "directory_traversal",
            symbols: &["opendir", "readdir", "closedir"],
            property: "N entries plus . and .. are each yielded once, then end of stream",
            run: directory_traversal,
        },
        Scenario {
            name: "readdir_error_is_not_end",
            symbols: &["opendir", "readdir", "dup2", "closedir"],
            property: "a read error surfaces as Err, distinct from end of stream",
            run: readdir_error_is_not_end,
        },
        Scenario {
            name: "stat_family",
            symbols: &["stat", "lstat", "fstat", "fstatat"],
            property: "stat follows links, lstat and AT_SYMLINK_NOFOLLOW do not",
            run: stat_family,
        },
        Scenario {
            name: "limit_queries",
            symbols: &["sysconf", "pathconf", "fpathconf"],
            property: "limit queries agree across path and fd forms and reject bad names",
            run: limit_queries,
        },
        Scenario {
            name: "chdir_round_trip",
            symbols: &["chdir"],
            property: "chdir changes the directory relative paths resolve against",
            run: chdir_round_trip,
        },
        Scenario {
            name: "failure_returns_errno",
            symbols: &["open", "close", "stat", "opendir"],
            property: "a failing wrapper returns the primitive's errno and leaves errno cleared",
            run: failure_returns_errno,
        },
        Scenario {
            name: "check_errno_hook",
            symbols: &["check_errno"],
            property: "the errno hook is silent at 0, otherwise reports once and clears",
            run: check_errno_hook,
        },
        Scenario {
            name: "check_sentinel_hook",
            symbols: &["check_sentinel"],
            property: "the sentinel hook fires only on equality and leaves errno alone",
            run: check_sentinel_hook,
        },
    ]
}

/// Look up a scenario by name.
#[must_use]
pub fn find(name: &str) -> Option<Scenario> {
    all().into_iter().find(|s| s.name == name)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure(cond: bool, message: impl FnOnce() -> String) -> Result<(), HarnessError> {
    if cond {
        Ok(())
    } else {
        Err(HarnessError::Check(message()))
    }
}

fn ensure_eq<T: PartialEq + std::fmt::Debug>(
    what: &str,
    actual: T,
    expected: T,
) -> Result<(), HarnessError> {
    ensure(actual == expected, || {
        format!("{what}: expected {expected:?}, got {actual:?}")
    })
}

fn offset(fd: RawFd) -> Result<off_t, HarnessError> {
    lseek(fd, 0, SEEK_CUR).op("lseek")
}

/// Closes the descriptors it holds when dropped, so a failed check does not
/// leak them.
struct Fds(Vec<RawFd>);

impl Fds {
    fn track(&mut self, fd: RawFd) -> RawFd {
        self.0.push(fd);
        fd
    }
}

impl Drop for Fds {
    fn drop(&mut self) {
        for fd in self.0.drain(..) {
            let _ = close(fd);
        }
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

fn write_seek_read(dir: &Path) -> Result<(), HarnessError> {
    let mut fds = Fds(Vec::new());
    let fd = fds.track(open(&dir.join("t.txt"), O_RDWR | O_CREAT, 0o644).op("open")?);

    ensure_eq("write count", write(fd, b"abc").op("write")?, 3)?;
    ensure_eq("rewind", lseek(fd, 0, SEEK_SET).op("lseek")?, 0)?;
    let mut buf = [0u8; 3];
    ensure_eq("read count", read(fd, &mut buf).op("read")?, 3)?;
    ensure_eq("read bytes", &buf, b"abc")?;
    ensure_eq("offset after read", offset(fd)?, 3)?;
    let mut tail = [0u8; 1];
    ensure_eq("read at end of file", read(fd, &mut tail).op("read")?, 0)
}

fn seek_end_reports_size(dir: &Path) -> Result<(), HarnessError> {
    let path = dir.join("sized");
    let payload = vec![0x5au8; 12_345];
    std::fs::write(&path, &payload)?;

    let mut fds = Fds(Vec::new());
    let fd = fds.track(open(&path, O_RDONLY, 0).op("open")?);
    let end = lseek(fd, 0, SEEK_END).op("lseek")?;
    let size = payload.len() as off_t;
    ensure_eq("SEEK_END offset", end, size)?;
    ensure_eq("st_size", fstat(fd).op("fstat")?.st_size, size)?;
    ensure_eq(
        "metadata length",
        std::fs::metadata(&path)?.len(),
        payload.len() as u64,
    )
}

fn creat_truncates_write_only(dir: &Path) -> Result<(), HarnessError> {
    let path = dir.join("old");
    std::fs::write(&path, b"previous contents")?;

    let mut fds = Fds(Vec::new());
    let fd = fds.track(creat(&path, 0o600).op("creat")?);
    ensure_eq(
        "access mode",
        fcntl(fd, F_GETFL, 0).op("fcntl")? & O_ACCMODE,
        O_WRONLY,
    )?;
    ensure_eq("size after creat", fstat(fd).op("fstat")?.st_size, 0)?;
    write(fd, b"new").op("write")?;
    ensure_eq("contents", std::fs::read(&path)?, b"new".to_vec())
}

fn openat_matches_open(dir: &Path) -> Result<(), HarnessError> {
    std::fs::create_dir(dir.join("sub"))?;
    std::fs::write(dir.join("sub").join("leaf"), b"x")?;

    let mut fds = Fds(Vec::new());
    let dirfd = fds.track(open(&dir.join("sub"), O_RDONLY | O_DIRECTORY, 0).op("open")?);
    let via_dirfd = fds.track(openat(dirfd, "leaf", O_RDONLY, 0).op("openat")?);
    let via_cwd = fds.track(
        openat(AT_FDCWD, &dir.join("sub").join("leaf"), O_RDONLY, 0).op("openat")?,
    );
    let via_open = fds.track(open(&dir.join("sub").join("leaf"), O_RDONLY, 0).op("open")?);

    let ino = fstat(via_open).op("fstat")?.st_ino;
    ensure_eq("dirfd-relative inode", fstat(via_dirfd).op("fstat")?.st_ino, ino)?;
    ensure_eq("AT_FDCWD inode", fstat(via_cwd).op("fstat")?.st_ino, ino)?;
    ensure_eq(
        "missing relative name",
        openat(dirfd, "absent", O_RDONLY, 0),
        Err(Errno::ENOENT),
    )
}

fn positioned_io_independent(dir: &Path) -> Result<(), HarnessError> {
    let mut fds = Fds(Vec::new());
    let fd = fds.track(open(&dir.join("p"), O_RDWR | O_CREAT | O_TRUNC, 0o644).op("open")?);
    write(fd, b"0123456789").op("write")?;
    lseek(fd, 4, SEEK_SET).op("lseek")?;

    ensure_eq("pwrite count", pwrite(fd, b"AB", 8).op("pwrite")?, 2)?;
    ensure_eq("offset after pwrite", offset(fd)?, 4)?;

    let mut buf = [0u8; 3];
    ensure_eq("pread count", pread(fd, &mut buf, 7).op("pread")?, 3)?;
    ensure_eq("pread bytes", &buf, b"7AB")?;
    ensure_eq("offset after pread", offset(fd)?, 4)?;

    ensure_eq(
        "pwrite past end extends",
        pwrite(fd, b"Z", 20).op("pwrite")?,
        1,
    )?;
    ensure_eq("size", fstat(fd).op("fstat")?.st_size, 21)
}

fn dup_shares_offset(dir: &Path) -> Result<(), HarnessError> {
    let mut fds = Fds(Vec::new());
    let fd = fds.track(open(&dir.join("d"), O_RDWR | O_CREAT, 0o644).op("open")?);
    let copy = fds.track(dup(fd).op("dup")?);
    ensure(copy != fd, || format!("dup returned the source fd {fd}"))?;

    write(fd, b"hello").op("write")?;
    ensure_eq("offset seen through dup", offset(copy)?, 5)?;
    lseek(copy, 1, SEEK_SET).op("lseek")?;
    ensure_eq("offset seen through source", offset(fd)?, 1)
}

fn dup2_replaces_open_target(dir: &Path) -> Result<(), HarnessError> {
    let mut fds = Fds(Vec::new());
    let src = fds.track(open(&dir.join("src"), O_RDWR | O_CREAT, 0o644).op("open")?);
    let target = fds.track(open(&dir.join("target"), O_WRONLY | O_CREAT, 0o644).op("open")?);

    ensure_eq("dup2 result", dup2(src, target).op("dup2")?, target)?;
    ensure_eq(
        "same file",
        fstat(target).op("fstat")?.st_ino,
        fstat(src).op("fstat")?.st_ino,
    )?;
    write(target, b"via target").op("write")?;
    ensure_eq("shared offset", offset(src)?, 10)?;
    ensure_eq(
        "old target untouched",
        std::fs::read(dir.join("target"))?.len(),
        0,
    )?;
    ensure_eq("same fd is a no-op", dup2(src, src).op("dup2")?, src)?;
    ensure_eq("closed source", dup2(-1, target), Err(Errno::EBADF))
}

fn fcntl_fd_flags(_dir: &Path) -> Result<(), HarnessError> {
    let mut fds = Fds(Vec::new());
    let fd = fds.track(open("/dev/null", O_RDONLY, 0).op("open")?);
    fcntl(fd, F_SETFD, FD_CLOEXEC).op("fcntl")?;
    ensure_eq(
        "FD_CLOEXEC set",
        fcntl(fd, F_GETFD, 0).op("fcntl")? & FD_CLOEXEC,
        FD_CLOEXEC,
    )?;
    fcntl(fd, F_SETFD, 0).op("fcntl")?;
    ensure_eq(
        "FD_CLOEXEC cleared",
        fcntl(fd, F_GETFD, 0).op("fcntl")? & FD_CLOEXEC,
        0,
    )?;
    ensure_eq("bad fd", fcntl(-1, F_GETFD, 0), Err(Errno::EBADF))
}

fn durability_calls(dir: &Path) -> Result<(), HarnessError> {
    let mut fds = Fds(Vec::new());
    let fd = fds.track(open(&dir.join("durable"), O_RDWR | O_CREAT, 0o644).op("open")?);
    write(fd, b"persist").op("write")?;
    fsync(fd).op("fsync")?;
    fdatasync(fd).op("fdatasync")?;
    sync();
    ensure_eq("fsync on bad fd", fsync(-1), Err(Errno::EBADF))?;
    ensure_eq("fdatasync on bad fd", fdatasync(-1), Err(Errno::EBADF))
}

fn directory_traversal(dir: &Path) -> Result<(), HarnessError> {
    const N: usize = 12;
    let root = dir.join("tree");
    std::fs::create_dir(&root)?;
    for i in 0..N {
        std::fs::write(root.join(format!("f{i:02}")), b"")?;
    }

    let mut stream = opendir(&root).op("opendir")?;
    let mut names = Vec::new();
    let walked = loop {
        match readdir(&mut stream) {
            Ok(Some(entry)) => names.push(entry.name().to_string_lossy().into_owned()),
            Ok(None) => break Ok(()),
            Err(errno) => break Err(HarnessError::Sys { op: "readdir", errno }),
        }
    };
    let after_end = readdir(&mut stream).map(|entry| entry.is_none());
    closedir(stream).op("closedir")?;
    walked?;

    ensure_eq("end of stream repeats", after_end, Ok(true))?;
    ensure_eq("entry count", names.len(), N + 2)?;
    names.sort();
    names.dedup();
    ensure_eq("distinct entries", names.len(), N + 2)?;
    ensure(names.iter().any(|n| n == "."), || "missing '.'".into())?;
    ensure(names.iter().any(|n| n == ".."), || "missing '..'".into())
}

fn readdir_error_is_not_end(dir: &Path) -> Result<(), HarnessError> {
    let root = dir.join("stream");
    std::fs::create_dir(&root)?;
    std::fs::write(dir.join("plain"), b"not a directory")?;

    let mut fds = Fds(Vec::new());
    let plain = fds.track(open(&dir.join("plain"), O_RDONLY, 0).op("open")?);
    let mut stream = opendir(&root).op("opendir")?;

    // Swap a regular file in under the stream before its first read.
    let outcome = match stream.fd().op("dirfd") {
        Ok(stream_fd) => dup2(plain, stream_fd)
            .op("dup2")
            .map(|_| readdir(&mut stream).map(|entry| entry.is_some())),
        Err(err) => Err(err),
    };
    // closedir now closes the duplicated file descriptor.
    let _ = closedir(stream);

    ensure_eq("readdir on a non-directory", outcome?, Err(Errno::ENOTDIR))
}

fn stat_family(dir: &Path) -> Result<(), HarnessError> {
    std::fs::write(dir.join("target"), b"12345")?;
    std::os::unix::fs::symlink("target", dir.join("link"))?;

    let link = dir.join("link");
    ensure_eq(
        "stat follows",
        FileType::of(&stat(&link).op("stat")?),
        FileType::Regular,
    )?;
    ensure_eq("stat size", stat(&link).op("stat")?.st_size, 5)?;
    ensure_eq(
        "lstat does not follow",
        FileType::of(&lstat(&link).op("lstat")?),
        FileType::Symlink,
    )?;

    let mut fds = Fds(Vec::new());
    let dirfd = fds.track(open(dir, O_RDONLY | O_DIRECTORY, 0).op("open")?);
    ensure_eq(
        "fstatat follows by default",
        FileType::of(&fstatat(dirfd, "link", 0).op("fstatat")?),
        FileType::Regular,
    )?;
    ensure_eq(
        "fstatat AT_SYMLINK_NOFOLLOW",
        FileType::of(&fstatat(dirfd, "link", AT_SYMLINK_NOFOLLOW).op("fstatat")?),
        FileType::Symlink,
    )?;
    ensure_eq(
        "fstat on directory",
        FileType::of(&fstat(dirfd).op("fstat")?),
        FileType::Directory,
    )
}

fn limit_queries(dir: &Path) -> Result<(), HarnessError> {
    let page = sysconf(_SC_PAGESIZE).op("sysconf")?;
    ensure(
        page.is_some_and(|p| p > 0 && (p & (p - 1)) == 0),
        || format!("page size should be a positive power of two, got {page:?}"),
    )?;
    ensure_eq("unknown sysconf name", sysconf(-1), Err(Errno::EINVAL))?;

    let mut fds = Fds(Vec::new());
    let dirfd = fds.track(open(dir, O_RDONLY | O_DIRECTORY, 0).op("open")?);
    ensure_eq(
        "pathconf vs fpathconf",
        pathconf(dir, _PC_NAME_MAX).op("pathconf")?,
        fpathconf(dirfd, _PC_NAME_MAX).op("fpathconf")?,
    )?;
    ensure_eq(
        "pathconf on missing path",
        pathconf(&dir.join("absent"), _PC_NAME_MAX),
        Err(Errno::ENOENT),
    )
}

// The working directory is process-wide; runs on parallel threads take turns.
static CWD_LOCK: Mutex<()> = parking_lot::const_mutex(());

fn chdir_round_trip(dir: &Path) -> Result<(), HarnessError> {
    std::fs::write(dir.join("here"), b"")?;
    let _cwd = CWD_LOCK.lock();
    let original = std::env::current_dir()?;

    chdir(dir).op("chdir")?;
    let relative = stat("here").map(|st| FileType::of(&st));
    chdir(&original).op("chdir")?;

    ensure_eq("relative lookup", relative, Ok(FileType::Regular))?;
    ensure_eq(
        "chdir into a file",
        chdir(&dir.join("here")),
        Err(Errno::ENOTDIR),
    )
}

fn failure_returns_errno(dir: &Path) -> Result<(), HarnessError> {
    let missing = dir.join("missing");
    let checks = [
        ("open", open(&missing, O_RDONLY, 0).map(|_| ()), Errno::ENOENT),
        ("close", close(-1), Errno::EBADF),
        ("stat", stat(&missing).map(|_| ()), Errno::ENOENT),
        ("opendir", opendir(&missing).map(|_| ()), Errno::ENOENT),
    ];
    // The last failure above ran the hook most recently.
    let after = get_errno();
    for (op, result, expected) in checks {
        ensure_eq(op, result, Err(expected))?;
    }
    if DIAGNOSTICS_COMPILED {
        ensure_eq("errno after failures", after, 0)?;
    } else {
        ensure_eq("errno after failures", after, Errno::ENOENT.raw())?;
        clear_errno();
    }
    Ok(())
}

fn check_errno_hook(_dir: &Path) -> Result<(), HarnessError> {
    let sink = Arc::new(MemoryReporter::new());

    clear_errno();
    with_reporter(sink.clone(), || check_errno("quiet"));
    ensure_eq("reports at errno 0", sink.len(), 0)?;

    set_errno(Errno::EACCES.raw());
    let line = line!() + 1;
    with_reporter(sink.clone(), || check_errno("loud"));
    let seen = sink.drain();

    if !DIAGNOSTICS_COMPILED {
        clear_errno();
        return ensure_eq("reports without diagnostics", seen.len(), 0);
    }
    ensure_eq("errno after hook", get_errno(), 0)?;
    ensure_eq("reports", seen.len(), 1)?;
    ensure_eq("op", seen[0].op, "loud")?;
    ensure_eq("kind", seen[0].kind, DiagnosticKind::Errno(Errno::EACCES))?;
    ensure_eq("file", seen[0].file, file!())?;
    ensure_eq("line", seen[0].line, line)
}

fn check_sentinel_hook(_dir: &Path) -> Result<(), HarnessError> {
    let sink = Arc::new(MemoryReporter::new());
    set_errno(Errno::EIO.raw());
    let fired = with_reporter(sink.clone(), || {
        [
            check_sentinel("write", 5isize, -1),
            check_sentinel("write", -1isize, -1),
            check_sentinel("opendir", std::ptr::null::<u8>(), std::ptr::null()),
        ]
    });
    let errno_after = get_errno();
    clear_errno();

    ensure_eq("fired", fired, [false, true, true])?;
    ensure_eq("errno untouched", errno_after, Errno::EIO.raw())?;
    let expected = if DIAGNOSTICS_COMPILED { 2 } else { 0 };
    let seen = sink.drain();
    ensure_eq("reports", seen.len(), expected)?;
    ensure(seen.iter().all(|d| d.kind == DiagnosticKind::Sentinel), || {
        "sentinel reports must not carry an errno".into()
    })
}
