//! Report generation for scenario runs.

use serde::{Deserialize, Serialize};

use crate::structured_log::Outcome;

/// Result of running a single scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    /// Wrappers the scenario exercised.
    pub symbols: Vec<String>,
    pub property: String,
    pub outcome: Outcome,
    /// Failure message when the outcome is not `pass`.
    pub message: Option<String>,
    pub duration_us: u64,
}

impl ScenarioResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

/// Aggregate over one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

impl RunSummary {
    #[must_use]
    pub fn from_results(results: Vec<ScenarioResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            total,
            passed,
            failed: total - passed,
            results,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// A conformance report for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub title: String,
    pub run_id: String,
    /// Diagnostics sink the scenarios ran under.
    pub diagnostics: String,
    /// Whether the reporting hook was compiled into the wrappers.
    pub diagnostics_compiled: bool,
    pub timestamp: String,
    pub summary: RunSummary,
}

impl ConformanceReport {
    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Run: {}\n", self.run_id));
        out.push_str(&format!(
            "- Diagnostics: {} (compiled in: {})\n",
            self.diagnostics, self.diagnostics_compiled
        ));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.summary.total));
        out.push_str(&format!("- Passed: {}\n", self.summary.passed));
        out.push_str(&format!("- Failed: {}\n\n", self.summary.failed));

        out.push_str("| Scenario | Symbols | Status | Time (us) |\n");
        out.push_str("|----------|---------|--------|-----------|\n");
        for r in &self.summary.results {
            let status = if r.passed() { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                r.name,
                r.symbols.join(", "),
                status,
                r.duration_us
            ));
        }

        let failures: Vec<_> = self
            .summary
            .results
            .iter()
            .filter(|r| !r.passed())
            .collect();
        if !failures.is_empty() {
            out.push_str("\n## Failures\n\n");
            for r in failures {
                out.push_str(&format!(
                    "- `{}`: {}\n  - {}\n",
                    r.name,
                    r.property,
                    r.message.as_deref().unwrap_or("no message")
                ));
            }
        }
        out
    }

    /// Render the report as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
