//! CLI entrypoint for the mli conformance harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mli_harness::structured_log::{ArtifactIndex, LogEmitter, validate_log_file};
use mli_harness::{DiagnosticsSink, HarnessError, ScenarioRunner, scenarios};

/// Conformance tooling for the mli wrapper layer.
#[derive(Debug, Parser)]
#[command(name = "mli-harness")]
#[command(about = "Conformance harness for the mli wrapper layer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every scenario against a scratch directory.
    Run {
        /// Scratch directory (created if missing). Defaults to a fresh
        /// directory under the system temp dir, removed afterwards.
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// JSON report output path (markdown is written next to it). If
        /// omitted, the JSON report is printed to stdout.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Where wrapper diagnostics go while scenarios run.
        #[arg(long, value_enum, default_value_t = DiagnosticsSink::Off)]
        diagnostics: DiagnosticsSink,
        /// Run identifier used in trace ids.
        #[arg(long)]
        run_id: Option<String>,
        /// Run only the named scenario(s).
        #[arg(long = "scenario")]
        only: Vec<String>,
    },
    /// Validate a structured JSONL log.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
    /// List the scenarios and the property each checks.
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            workdir,
            log,
            report,
            diagnostics,
            run_id,
            only,
        } => {
            let run_id = run_id.unwrap_or_else(default_run_id);
            let selected = select(&only)?;

            let (workdir, ephemeral) = match workdir {
                Some(dir) => (dir, false),
                None => (
                    std::env::temp_dir().join(format!("mli-harness-{run_id}")),
                    true,
                ),
            };
            let emitter = match &log {
                Some(path) => {
                    ensure_parent(path)?;
                    LogEmitter::to_file(path, "mli", &run_id)?
                }
                None => LogEmitter::discard("mli", &run_id),
            };

            eprintln!(
                "Running {} scenario(s) in {} (diagnostics: {})",
                selected.len(),
                workdir.display(),
                diagnostics.as_str()
            );
            let runner = ScenarioRunner::new(&run_id, &workdir, diagnostics, emitter);
            let conformance = runner.run_report(&selected);
            if ephemeral {
                let _ = std::fs::remove_dir_all(&workdir);
            }
            let conformance = conformance?;

            for result in &conformance.summary.results {
                let status = if result.passed() { "PASS" } else { "FAIL" };
                eprintln!("[{status}] {}", result.name);
                if let Some(msg) = &result.message {
                    eprintln!("       {msg}");
                }
            }

            let json = conformance.to_json()?;
            match &report {
                Some(path) => {
                    ensure_parent(path)?;
                    std::fs::write(path, &json)?;
                    let md_path = path.with_extension("md");
                    std::fs::write(&md_path, conformance.to_markdown())?;

                    let mut index = ArtifactIndex::new(&run_id);
                    if let Some(log_path) = &log {
                        index.add_file(log_path, "log")?;
                    }
                    index.add_file(path, "report_json")?;
                    index.add_file(&md_path, "report_markdown")?;
                    let index_path = path.with_file_name("artifact_index.json");
                    std::fs::write(&index_path, index.to_json()?)?;
                    eprintln!("Report written to {}", path.display());
                }
                None => println!("{json}"),
            }

            let summary = &conformance.summary;
            eprintln!(
                "Summary: total={} passed={} failed={}",
                summary.total, summary.passed, summary.failed
            );
            if !summary.all_passed() {
                return Err(HarnessError::RunFailed {
                    failed: summary.failed,
                    total: summary.total,
                }
                .into());
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for error in &errors {
                eprintln!("{error}");
            }
            if !errors.is_empty() {
                return Err(HarnessError::InvalidLog {
                    lines,
                    errors: errors.len(),
                }
                .into());
            }
            println!("{}: {lines} valid line(s)", log.display());
        }
        Command::List => {
            for scenario in scenarios::all() {
                println!("{:<28} {}", scenario.name, scenario.property);
            }
        }
    }

    Ok(())
}

fn select(only: &[String]) -> Result<Vec<scenarios::Scenario>, HarnessError> {
    if only.is_empty() {
        return Ok(scenarios::all());
    }
    only.iter()
        .map(|name| {
            scenarios::find(name).ok_or_else(|| HarnessError::UnknownScenario(name.clone()))
        })
        .collect()
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn default_run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("run-{secs}-{}", std::process::id())
}
