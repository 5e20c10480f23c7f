//! Post-call error reporting hook.
//!
//! Every wrapper runs [`check_errno`]'s logic on its failure path: the
//! thread's `errno` is packaged into a [`Diagnostic`], handed to the active
//! [`ErrorReporter`], and reset to 0 so later, unrelated calls are not
//! misattributed. [`check_sentinel`] is the variant for primitives that
//! signal failure through their return value without touching `errno`.
//!
//! Reporter resolution, first match wins:
//! 1. the thread-scoped reporter set by [`with_reporter`];
//! 2. the process-global reporter set by [`install`];
//! 3. the built-in reporter selected by [`crate::config::diagnostics_mode`].
//!
//! With the `diagnostics` feature disabled both hooks are empty and the
//! resolution machinery is never consulted.

use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::{DiagnosticsMode, diagnostics_mode};
use crate::errno::Errno;

/// What triggered a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// `errno` was non-zero after the call.
    Errno(Errno),
    /// The return value matched the caller-supplied failure sentinel.
    Sentinel,
}

/// One reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Kernel thread id of the calling thread.
    pub thread_id: i64,
    /// Name of the wrapped operation.
    pub op: &'static str,
    pub kind: DiagnosticKind,
    /// Source file of the call site.
    pub file: &'static str,
    /// Source line of the call site.
    pub line: u32,
}

impl Diagnostic {
    #[cfg_attr(not(feature = "diagnostics"), allow(dead_code))]
    fn new(op: &'static str, kind: DiagnosticKind, location: &'static Location<'static>) -> Self {
        Self {
            thread_id: current_thread_id(),
            op,
            kind,
            file: location.file(),
            line: location.line(),
        }
    }

    /// The errno carried by this diagnostic, if any.
    #[must_use]
    pub fn errno(&self) -> Option<Errno> {
        match self.kind {
            DiagnosticKind::Errno(e) => Some(e),
            DiagnosticKind::Sentinel => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DiagnosticKind::Errno(e) => write!(
                f,
                "thread({}): {} ({}) {}\n{} : {}",
                self.thread_id,
                self.op,
                e.raw(),
                e.description(),
                self.file,
                self.line
            ),
            DiagnosticKind::Sentinel => write!(
                f,
                "thread({}): {} : function fails\n{} : {}",
                self.thread_id, self.op, self.file, self.line
            ),
        }
    }
}

/// Sink for diagnostics produced by the reporting hook.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Drops every diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    #[inline]
    fn report(&self, _diagnostic: &Diagnostic) {}
}

/// Prints each diagnostic to stderr followed by a blank line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl ErrorReporter for StderrReporter {
    fn report(&self, diagnostic: &Diagnostic) {
        let mut err = std::io::stderr().lock();
        // Reporting must never alter program flow, so write failures are dropped.
        let _ = write!(err, "{diagnostic}\n\n");
    }
}

/// Collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemoryReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ErrorReporter for MemoryReporter {
    fn report(&self, diagnostic: &Diagnostic) {
        self.entries.lock().push(diagnostic.clone());
    }
}

static GLOBAL: RwLock<Option<Arc<dyn ErrorReporter>>> = parking_lot::const_rwlock(None);

thread_local! {
    static SCOPED: RefCell<Option<Arc<dyn ErrorReporter>>> = const { RefCell::new(None) };
}

/// Install a process-global reporter, returning the previous one.
pub fn install(reporter: Arc<dyn ErrorReporter>) -> Option<Arc<dyn ErrorReporter>> {
    GLOBAL.write().replace(reporter)
}

/// Remove the process-global reporter, returning it.
pub fn uninstall() -> Option<Arc<dyn ErrorReporter>> {
    GLOBAL.write().take()
}

struct ScopeGuard {
    previous: Option<Arc<dyn ErrorReporter>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        SCOPED.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Run `f` with `reporter` receiving every diagnostic raised on this thread.
///
/// Scopes nest; the previous scoped reporter is restored when `f` returns or
/// unwinds. Other threads are unaffected.
pub fn with_reporter<R>(reporter: Arc<dyn ErrorReporter>, f: impl FnOnce() -> R) -> R {
    let previous = SCOPED.with(|slot| slot.borrow_mut().replace(reporter));
    let _guard = ScopeGuard { previous };
    f()
}

#[cfg_attr(not(feature = "diagnostics"), allow(dead_code))]
fn dispatch(diagnostic: &Diagnostic) {
    let scoped = SCOPED.with(|slot| slot.borrow().clone());
    if let Some(reporter) = scoped {
        reporter.report(diagnostic);
        return;
    }
    let global = GLOBAL.read().clone();
    if let Some(reporter) = global {
        reporter.report(diagnostic);
        return;
    }
    match diagnostics_mode() {
        DiagnosticsMode::Stderr => StderrReporter.report(diagnostic),
        DiagnosticsMode::Off => {}
    }
}

/// Kernel thread id of the caller.
#[must_use]
pub fn current_thread_id() -> i64 {
    // SAFETY: gettid takes no arguments and cannot fail.
    i64::from(unsafe { libc::gettid() })
}

/// Report the thread's pending `errno`, if any, and reset it to 0.
///
/// Does nothing when `errno` is 0. The reported location is the caller's.
#[track_caller]
#[inline]
pub fn check_errno(op: &'static str) {
    check_errno_at(op, Location::caller());
}

/// Report a failure if `value` equals `sentinel`. `errno` is not consulted.
///
/// Returns whether the sentinel matched, regardless of whether diagnostics
/// are compiled in.
#[track_caller]
#[inline]
pub fn check_sentinel<T: PartialEq>(op: &'static str, value: T, sentinel: T) -> bool {
    let failed = value == sentinel;
    if failed {
        sentinel_at(op, Location::caller());
    }
    failed
}

#[cfg(feature = "diagnostics")]
pub(crate) fn check_errno_at(op: &'static str, location: &'static Location<'static>) {
    let code = crate::errno::get_errno();
    if code == 0 {
        return;
    }
    dispatch(&Diagnostic::new(
        op,
        DiagnosticKind::Errno(Errno::from_raw(code)),
        location,
    ));
    crate::errno::clear_errno();
}

#[cfg(not(feature = "diagnostics"))]
#[inline(always)]
pub(crate) fn check_errno_at(_op: &'static str, _location: &'static Location<'static>) {}

#[cfg(feature = "diagnostics")]
pub(crate) fn sentinel_at(op: &'static str, location: &'static Location<'static>) {
    dispatch(&Diagnostic::new(op, DiagnosticKind::Sentinel, location));
}

#[cfg(not(feature = "diagnostics"))]
#[inline(always)]
pub(crate) fn sentinel_at(_op: &'static str, _location: &'static Location<'static>) {}
