//! `MLI_DIAGNOSTICS` resolution. The mode is cached once per process, so
//! this binary holds a single test that owns the whole sequence.

use std::sync::Arc;

use mli_core::config::{DIAGNOSTICS_ENV, DiagnosticsMode, diagnostics_mode, set_diagnostics_mode};
use mli_core::report::{self, MemoryReporter};
use mli_core::{Errno, close};

#[test]
fn env_is_read_once_and_override_wins() {
    // SAFETY: the only test in this binary; no other thread reads the
    // environment concurrently.
    unsafe { std::env::set_var(DIAGNOSTICS_ENV, "stderr") };
    assert_eq!(diagnostics_mode(), DiagnosticsMode::Stderr);

    // SAFETY: as above.
    unsafe { std::env::set_var(DIAGNOSTICS_ENV, "off") };
    assert_eq!(
        diagnostics_mode(),
        DiagnosticsMode::Stderr,
        "mode is cached after first resolution"
    );

    // No scoped or global reporter: the stderr mode handles it.
    assert_eq!(close(-1), Err(Errno::EBADF));

    // A global reporter still takes precedence over the mode.
    let sink = Arc::new(MemoryReporter::new());
    let previous = report::install(sink.clone());
    assert!(previous.is_none());
    assert_eq!(close(-1), Err(Errno::EBADF));
    report::uninstall();
    let expected = usize::from(mli_core::config::DIAGNOSTICS_COMPILED);
    assert_eq!(sink.len(), expected);

    set_diagnostics_mode(DiagnosticsMode::Off);
    assert_eq!(diagnostics_mode(), DiagnosticsMode::Off);
    set_diagnostics_mode(DiagnosticsMode::Stderr);
    assert_eq!(diagnostics_mode(), DiagnosticsMode::Stderr);
    set_diagnostics_mode(DiagnosticsMode::Off);

    mli_core::errno::clear_errno();
}
