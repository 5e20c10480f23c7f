//! [`ErrorReporter`] that turns wrapper diagnostics into JSONL log lines.

use std::sync::Arc;

use mli_core::report::{Diagnostic, DiagnosticKind, ErrorReporter};
use parking_lot::Mutex;

use crate::structured_log::{LogEmitter, LogEntry, LogLevel};

/// Writes every diagnostic as a `syscall_failure` entry through a shared
/// [`LogEmitter`].
#[derive(Debug, Clone)]
pub struct JsonlReporter {
    emitter: Arc<Mutex<LogEmitter>>,
    scenario: Option<String>,
}

impl JsonlReporter {
    #[must_use]
    pub fn new(emitter: Arc<Mutex<LogEmitter>>) -> Self {
        Self {
            emitter,
            scenario: None,
        }
    }

    /// Tag every entry with the scenario being run.
    #[must_use]
    pub fn for_scenario(&self, scenario: &str) -> Self {
        Self {
            emitter: Arc::clone(&self.emitter),
            scenario: Some(scenario.to_string()),
        }
    }

    fn entry(&self, diagnostic: &Diagnostic) -> LogEntry {
        let mut entry = LogEntry::new("", LogLevel::Error, "syscall_failure")
            .with_symbol(diagnostic.op)
            .with_thread(diagnostic.thread_id)
            .with_location(diagnostic.file, diagnostic.line);
        entry = match diagnostic.kind {
            DiagnosticKind::Errno(errno) => entry
                .with_errno(errno.raw())
                .with_details(serde_json::json!({ "message": errno.description() })),
            DiagnosticKind::Sentinel => {
                entry.with_details(serde_json::json!({ "message": "function fails" }))
            }
        };
        if let Some(scenario) = &self.scenario {
            entry = entry.with_scenario(scenario);
        }
        entry
    }
}

impl ErrorReporter for JsonlReporter {
    fn report(&self, diagnostic: &Diagnostic) {
        let entry = self.entry(diagnostic);
        // A failing log sink must not change the wrapped call's outcome.
        let _ = self.emitter.lock().emit_entry(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured_log::validate_log_text;

    #[test]
    fn diagnostics_become_valid_log_lines() {
        let (emitter, buffer) = LogEmitter::to_buffer("mli", "run-r");
        let reporter = JsonlReporter::new(Arc::new(Mutex::new(emitter))).for_scenario("demo");
        reporter.report(&Diagnostic {
            thread_id: 11,
            op: "close",
            kind: DiagnosticKind::Errno(mli_core::Errno::EBADF),
            file: "src/demo.rs",
            line: 5,
        });
        reporter.report(&Diagnostic {
            thread_id: 11,
            op: "sysconf",
            kind: DiagnosticKind::Sentinel,
            file: "src/demo.rs",
            line: 6,
        });

        let text = buffer.contents();
        let (lines, errors) = validate_log_text(&text);
        assert_eq!(lines, 2);
        assert!(errors.is_empty(), "{errors:?}");

        let first: LogEntry = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first.event, "syscall_failure");
        assert_eq!(first.symbol.as_deref(), Some("close"));
        assert_eq!(first.errno, Some(mli_core::Errno::EBADF.raw()));
        assert_eq!(first.scenario.as_deref(), Some("demo"));
        assert_eq!(first.location.as_deref(), Some("src/demo.rs:5"));

        let second: LogEntry = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(second.errno, None);
        assert_eq!(second.details.unwrap()["message"], "function fails");
    }
}
