//! Harness error type.

use mli_core::Errno;
use thiserror::Error;

/// Everything that can stop a scenario or a harness command.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A wrapper failed where the scenario expected success.
    #[error("{op}: {errno} (errno {})", .errno.raw())]
    Sys { op: &'static str, errno: Errno },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// An observed value differed from the expected one.
    #[error("check failed: {0}")]
    Check(String),
    /// A `--scenario` name that matches no known scenario.
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
    #[error("{failed} of {total} scenarios failed")]
    RunFailed { failed: usize, total: usize },
    #[error("{errors} invalid entries in {lines} log lines")]
    InvalidLog { lines: usize, errors: usize },
}

impl HarnessError {
    /// Shorthand for a failed check.
    pub fn check(message: impl Into<String>) -> Self {
        Self::Check(message.into())
    }
}

/// Attach the operation name to a wrapper failure.
pub trait SysContext<T> {
    fn op(self, op: &'static str) -> Result<T, HarnessError>;
}

impl<T> SysContext<T> for Result<T, Errno> {
    fn op(self, op: &'static str) -> Result<T, HarnessError> {
        self.map_err(|errno| HarnessError::Sys { op, errno })
    }
}
