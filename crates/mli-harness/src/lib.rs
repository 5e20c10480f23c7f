//! Conformance harness for the mli wrapper layer.
//!
//! This crate provides:
//! - Scenarios: the observable properties of every wrapper, runnable against
//!   a scratch directory
//! - Runner: executes scenarios under a chosen diagnostics sink and logs each
//!   step as structured JSONL
//! - Report generation: machine-readable JSON, human-readable markdown, and a
//!   SHA-256 artifact index

#![forbid(unsafe_code)]

pub mod error;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod scenarios;
pub mod structured_log;

pub use error::HarnessError;
pub use report::{ConformanceReport, RunSummary, ScenarioResult};
pub use reporter::JsonlReporter;
pub use runner::{DiagnosticsSink, ScenarioRunner};
pub use scenarios::Scenario;
