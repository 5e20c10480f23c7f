//! Diagnostics configuration.
//!
//! The default reporter is chosen by the `MLI_DIAGNOSTICS` environment
//! variable, read once on first use:
//! - `off` (default): failures are returned to the caller and nothing is printed.
//! - `stderr`: every failure is also printed to stderr in the classic
//!   `thread(<tid>): <op> (<code>) <description>` format.
//!
//! [`set_diagnostics_mode`] overrides the environment at initialization time.
//! A reporter installed through [`crate::report::install`] or
//! [`crate::report::with_reporter`] always takes precedence over the mode.

use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable consulted for the default diagnostics mode.
pub const DIAGNOSTICS_ENV: &str = "MLI_DIAGNOSTICS";

/// Whether the reporting hook was compiled in (cargo feature `diagnostics`).
///
/// When false, failing wrappers leave `errno` exactly as the OS set it and no
/// reporter is ever called.
pub const DIAGNOSTICS_COMPILED: bool = cfg!(feature = "diagnostics");

/// Which built-in reporter handles diagnostics when none is installed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticsMode {
    /// Drop every diagnostic.
    #[default]
    Off,
    /// Print diagnostics to stderr.
    Stderr,
}

impl DiagnosticsMode {
    /// Parse from string (case-insensitive). Unknown values mean `Off`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "stderr" | "on" | "1" | "print" | "true" => Self::Stderr,
            _ => Self::Off,
        }
    }

    /// Returns true if diagnostics are emitted at all.
    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::Stderr)
    }
}

// 0=unresolved, 1=Off, 2=Stderr, 255=resolving.
static CACHED_MODE: AtomicU8 = AtomicU8::new(0);

const MODE_UNRESOLVED: u8 = 0;
const MODE_OFF: u8 = 1;
const MODE_STDERR: u8 = 2;
const MODE_RESOLVING: u8 = 255;

fn mode_to_u8(mode: DiagnosticsMode) -> u8 {
    match mode {
        DiagnosticsMode::Off => MODE_OFF,
        DiagnosticsMode::Stderr => MODE_STDERR,
    }
}

fn u8_to_mode(v: u8) -> DiagnosticsMode {
    match v {
        MODE_STDERR => DiagnosticsMode::Stderr,
        _ => DiagnosticsMode::Off,
    }
}

/// Get the configured diagnostics mode (reads the env var on first call,
/// caches thereafter).
///
/// A racing caller that arrives while another thread resolves the variable
/// sees `Off` until resolution completes.
#[must_use]
pub fn diagnostics_mode() -> DiagnosticsMode {
    let cached = CACHED_MODE.load(Ordering::Acquire);
    if cached != MODE_UNRESOLVED && cached != MODE_RESOLVING {
        return u8_to_mode(cached);
    }
    if cached == MODE_RESOLVING {
        return DiagnosticsMode::Off;
    }

    if CACHED_MODE
        .compare_exchange(
            MODE_UNRESOLVED,
            MODE_RESOLVING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        let v = CACHED_MODE.load(Ordering::Acquire);
        return if v != MODE_UNRESOLVED && v != MODE_RESOLVING {
            u8_to_mode(v)
        } else {
            DiagnosticsMode::Off
        };
    }

    let mode = std::env::var(DIAGNOSTICS_ENV)
        .map(|v| DiagnosticsMode::from_str_loose(&v))
        .unwrap_or_default();
    // A concurrent set_diagnostics_mode wins over the environment.
    let _ = CACHED_MODE.compare_exchange(
        MODE_RESOLVING,
        mode_to_u8(mode),
        Ordering::SeqCst,
        Ordering::Relaxed,
    );
    u8_to_mode(CACHED_MODE.load(Ordering::Acquire))
}

/// Force the diagnostics mode, ignoring `MLI_DIAGNOSTICS`.
pub fn set_diagnostics_mode(mode: DiagnosticsMode) {
    CACHED_MODE.store(mode_to_u8(mode), Ordering::Release);
}
