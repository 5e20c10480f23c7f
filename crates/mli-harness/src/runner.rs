//! Scenario execution engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mli_core::report::{ErrorReporter, NoopReporter, StderrReporter, with_reporter};
use parking_lot::Mutex;

use crate::error::HarnessError;
use crate::report::{ConformanceReport, RunSummary, ScenarioResult};
use crate::reporter::JsonlReporter;
use crate::scenarios::Scenario;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, now_utc};

/// Where wrapper diagnostics raised during a scenario go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DiagnosticsSink {
    /// Dropped.
    #[default]
    Off,
    /// Printed to stderr in the two-line text format.
    Stderr,
    /// Written to the run's JSONL log as `syscall_failure` entries.
    Jsonl,
    /// No harness reporter; `MLI_DIAGNOSTICS` decides.
    Env,
}

impl DiagnosticsSink {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Stderr => "stderr",
            Self::Jsonl => "jsonl",
            Self::Env => "env",
        }
    }
}

/// Runs scenarios one after another, each in its own subdirectory of
/// `workdir`, logging start and end of every scenario.
pub struct ScenarioRunner {
    run_id: String,
    workdir: PathBuf,
    sink: DiagnosticsSink,
    emitter: Arc<Mutex<LogEmitter>>,
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        workdir: impl Into<PathBuf>,
        sink: DiagnosticsSink,
        emitter: LogEmitter,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            workdir: workdir.into(),
            sink,
            emitter: Arc::new(Mutex::new(emitter)),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run every scenario and collect results. Scenario failures are recorded,
    /// not returned; only log and scratch-directory I/O errors abort the run.
    pub fn run(&self, scenarios: &[Scenario]) -> Result<Vec<ScenarioResult>, HarnessError> {
        std::fs::create_dir_all(&self.workdir)?;
        self.log(
            LogEntry::new("", LogLevel::Info, "run_start").with_details(serde_json::json!({
                "scenarios": scenarios.len(),
                "diagnostics": self.sink.as_str(),
                "workdir": self.workdir.display().to_string(),
            })),
        )?;

        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run_one(scenario)?);
        }

        let passed = results.iter().filter(|r| r.passed()).count();
        self.log(
            LogEntry::new("", LogLevel::Info, "run_end").with_details(serde_json::json!({
                "total": results.len(),
                "passed": passed,
                "failed": results.len() - passed,
            })),
        )?;
        self.emitter.lock().flush()?;
        Ok(results)
    }

    /// Run and wrap the results in a report.
    pub fn run_report(&self, scenarios: &[Scenario]) -> Result<ConformanceReport, HarnessError> {
        let results = self.run(scenarios)?;
        Ok(ConformanceReport {
            title: "mli wrapper conformance".to_string(),
            run_id: self.run_id.clone(),
            diagnostics: self.sink.as_str().to_string(),
            diagnostics_compiled: mli_core::config::DIAGNOSTICS_COMPILED,
            timestamp: now_utc(),
            summary: RunSummary::from_results(results),
        })
    }

    fn run_one(&self, scenario: &Scenario) -> Result<ScenarioResult, HarnessError> {
        let dir = self.workdir.join(scenario.name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;

        self.log(
            LogEntry::new("", LogLevel::Info, "scenario_start")
                .with_scenario(scenario.name)
                .with_details(serde_json::json!({ "property": scenario.property })),
        )?;

        let started = Instant::now();
        let outcome = match self.reporter_for(scenario) {
            Some(reporter) => with_reporter(reporter, || scenario.run(&dir)),
            None => scenario.run(&dir),
        };
        let duration_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        let (status, message) = match &outcome {
            Ok(()) => (Outcome::Pass, None),
            Err(HarnessError::Check(msg)) => (Outcome::Fail, Some(msg.clone())),
            Err(other) => (Outcome::Error, Some(other.to_string())),
        };
        let level = if status == Outcome::Pass {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        let mut entry = LogEntry::new("", level, "scenario_end")
            .with_scenario(scenario.name)
            .with_outcome(status)
            .with_duration_us(duration_us);
        if let Err(HarnessError::Sys { op, errno }) = &outcome {
            entry = entry.with_symbol(*op).with_errno(errno.raw());
        }
        if let Some(msg) = &message {
            entry = entry.with_details(serde_json::json!({ "message": msg }));
        }
        self.log(entry)?;

        remove_scratch(&dir);
        Ok(ScenarioResult {
            name: scenario.name.to_string(),
            symbols: scenario.symbols.iter().map(|s| (*s).to_string()).collect(),
            property: scenario.property.to_string(),
            outcome: status,
            message,
            duration_us,
        })
    }

    fn reporter_for(&self, scenario: &Scenario) -> Option<Arc<dyn ErrorReporter>> {
        let reporter: Arc<dyn ErrorReporter> = match self.sink {
            DiagnosticsSink::Off => Arc::new(NoopReporter),
            DiagnosticsSink::Stderr => Arc::new(StderrReporter),
            DiagnosticsSink::Jsonl => Arc::new(
                JsonlReporter::new(Arc::clone(&self.emitter)).for_scenario(scenario.name),
            ),
            DiagnosticsSink::Env => return None,
        };
        Some(reporter)
    }

    fn log(&self, entry: LogEntry) -> Result<(), HarnessError> {
        self.emitter.lock().emit_entry(entry)?;
        Ok(())
    }
}

fn remove_scratch(dir: &Path) {
    if let Err(err) = std::fs::remove_dir_all(dir) {
        eprintln!("warning: could not remove {}: {err}", dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SysContext;
    use crate::structured_log::validate_log_text;

    fn failing(_dir: &Path) -> Result<(), HarnessError> {
        mli_core::close(-1).op("close")
    }

    #[test]
    fn sink_names() {
        assert_eq!(DiagnosticsSink::default().as_str(), "off");
        assert_eq!(DiagnosticsSink::Jsonl.as_str(), "jsonl");
        assert_eq!(DiagnosticsSink::Env.as_str(), "env");
    }

    #[test]
    fn single_scenario_is_logged_and_cleaned_up() {
        let work = tempfile::tempdir().unwrap();
        let (emitter, buffer) = LogEmitter::to_buffer("mli", "unit");
        let runner = ScenarioRunner::new("unit", work.path(), DiagnosticsSink::Off, emitter);
        let scenario = crate::scenarios::find("write_seek_read").unwrap();

        let results = runner.run(&[scenario]).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].passed(), "{:?}", results[0].message);
        assert!(!work.path().join("write_seek_read").exists());

        let text = buffer.contents();
        let (lines, errors) = validate_log_text(&text);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(lines, 4, "run_start, scenario_start, scenario_end, run_end");
    }

    #[test]
    fn wrapper_errors_are_classified_and_logged() {
        let work = tempfile::tempdir().unwrap();
        let (emitter, buffer) = LogEmitter::to_buffer("mli", "unit");
        let runner = ScenarioRunner::new("unit", work.path(), DiagnosticsSink::Jsonl, emitter);
        let scenario = Scenario::from_fn("always_fails", &["close"], "close(-1) fails", failing);

        let results = runner.run(&[scenario]).unwrap();
        assert_eq!(results[0].outcome, Outcome::Error);

        let entries: Vec<LogEntry> = buffer
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let end = entries.iter().find(|e| e.event == "scenario_end").unwrap();
        assert_eq!(end.symbol.as_deref(), Some("close"));
        assert_eq!(end.errno, Some(mli_core::Errno::EBADF.raw()));

        let diagnostics = entries
            .iter()
            .filter(|e| e.event == "syscall_failure")
            .count();
        let expected = usize::from(mli_core::config::DIAGNOSTICS_COMPILED);
        assert_eq!(diagnostics, expected);
    }
}
