//! Runs every target and ranks the results
mod html;
mod stats_csv;

pub use html::render_html;

use crate::error::HarnessError;
use crate::orchestrator;
use ormbench_core::{RunConfig, RunOutcome, Target, TargetResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

const RULE_WIDTH: usize = 80;

/// Runs every target in turn and records the comparison under `results_dir`.
pub struct ComparisonReporter {
    results_dir: PathBuf,
}

impl ComparisonReporter {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    /// Run `targets` sequentially, in the given order, pausing `config.cooldown` between them.
    ///
    /// Skipped and failed targets do not abort the comparison; only harness faults (invalid
    /// config, unwritable results) do.
    #[instrument(name = "comparison", skip_all, fields(targets = targets.len()))]
    pub async fn run_all(
        &self,
        targets: &[Target],
        config: &RunConfig,
    ) -> Result<Comparison, HarnessError> {
        config.validate()?;
        fs::create_dir_all(&self.results_dir).map_err(HarnessError::io(&self.results_dir))?;

        let timestamp = OffsetDateTime::now_utc();
        info!("Starting comparison at {timestamp} with config {config:?}");

        let mut results = Vec::with_capacity(targets.len());
        for (idx, target) in targets.iter().enumerate() {
            if idx > 0 && !config.cooldown.is_zero() {
                info!(
                    "Cooling down for {} before {}",
                    humantime::format_duration(config.cooldown),
                    target.name
                );
                tokio::time::sleep(config.cooldown).await;
            }

            let outcome = orchestrator::execute(target, config).await;
            if let RunOutcome::Completed(result) = &outcome {
                let report = html::write_report(&self.results_dir, result)?;
                let stats = stats_csv::write_stats(&self.results_dir, result)?;
                info!(
                    "Report for {} written to {} and {}",
                    target.name,
                    report.display(),
                    stats.display()
                );
            }
            results.push(outcome);
        }

        let comparison = Comparison {
            timestamp,
            config: config.clone(),
            results,
        };
        let path = comparison.persist(&self.results_dir)?;
        info!("Results saved to {}", path.display());

        Ok(comparison)
    }
}

/// The outcome of one comparison run across all targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub config: RunConfig,
    pub results: Vec<RunOutcome>,
}

impl Comparison {
    /// Completed targets, best first: lowest P95, then lowest failure rate, then name.
    pub fn ranked(&self) -> Vec<&TargetResult> {
        let mut ranked: Vec<_> = self.results.iter().filter_map(RunOutcome::result).collect();
        ranked.sort_by(|a, b| rank_order(a, b));
        ranked
    }

    pub fn winner(&self) -> Option<&TargetResult> {
        self.ranked().into_iter().next()
    }

    /// `(target, reason)` for every target whose liveness probe failed.
    pub fn skipped(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .filter_map(|outcome| match outcome {
                RunOutcome::Skipped { target, reason } => Some((target.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// `(target, reason)` for every target whose run was abandoned.
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .filter_map(|outcome| match outcome {
                RunOutcome::Failed { target, reason } => Some((target.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn file_name(&self) -> Result<String, HarnessError> {
        let stamp = self
            .timestamp
            .format(format_description!("[year][month][day]_[hour][minute][second]"))?;
        Ok(format!("performance_comparison_{stamp}.json"))
    }

    /// Write the comparison as a new JSON file under `dir`. Never overwrites an earlier run.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf, HarnessError> {
        let path = dir.join(self.file_name()?);

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(HarnessError::ResultsExist(path));
            }
            Err(err) => return Err(HarnessError::io(&path)(err)),
        };

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(HarnessError::io(&path))?;

        Ok(path)
    }
}

fn rank_order(a: &TargetResult, b: &TargetResult) -> Ordering {
    a.p95_latency_ms
        .total_cmp(&b.p95_latency_ms)
        .then(a.failure_rate.total_cmp(&b.failure_rate))
        .then_with(|| a.target.cmp(&b.target))
}

/// File name component for a target, with path separators and other specials replaced.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(f, "{rule}")?;
        writeln!(f, "PERFORMANCE COMPARISON RESULTS")?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "{:<5} {:<15} {:>10} {:>10} {:>8} {:>13}  Description",
            "Rank", "Target", "P95 (ms)", "P99 (ms)", "RPS", "Failure Rate"
        )?;
        writeln!(f, "{}", "-".repeat(RULE_WIDTH))?;

        for (idx, result) in self.ranked().into_iter().enumerate() {
            writeln!(
                f,
                "{:<5} {:<15} {:>10.2} {:>10.2} {:>8.2} {:>12.2}%  {}",
                idx + 1,
                result.target.to_uppercase(),
                result.p95_latency_ms,
                result.p99_latency_ms,
                result.rps,
                result.failure_rate * 100.,
                result.description
            )?;
        }
        writeln!(f, "{rule}")?;

        for (target, reason) in self.skipped() {
            writeln!(f, "Skipped {}: {reason}", target.to_uppercase())?;
        }
        for (target, reason) in self.failed() {
            writeln!(f, "Failed {}: {reason}", target.to_uppercase())?;
        }

        match self.winner() {
            Some(winner) => {
                writeln!(f, "Winner by P95 latency: {}", winner.target.to_uppercase())?;
                write!(f, "   P95 latency: {:.2}ms", winner.p95_latency_ms)
            }
            None => write!(f, "No results to compare"),
        }
    }
}
