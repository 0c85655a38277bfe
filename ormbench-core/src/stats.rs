use crate::Operation;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

/// Aggregated statistics for one target's run.
///
/// Latencies are in milliseconds. `failure_rate` is `failures / total_requests`, and `0.` for an
/// empty run.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    pub target: String,
    pub description: String,
    pub total_requests: u64,
    pub failures: u64,
    pub expected_failures: u64,
    pub failure_rate: f64,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub max_latency_ms: f64,
    pub rps: f64,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub operations: BTreeMap<Operation, OperationStats>,
}

/// Per-operation slice of a [`TargetResult`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: u64,
    pub failures: u64,
    pub expected_failures: u64,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
}

/// What happened when a target was run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(TargetResult),
    /// The liveness probe failed; no client was started.
    Skipped { target: String, reason: String },
    /// The run started but could not finish within its budget.
    Failed { target: String, reason: String },
}

impl RunOutcome {
    pub fn target(&self) -> &str {
        match self {
            RunOutcome::Completed(result) => &result.target,
            RunOutcome::Skipped { target, .. } | RunOutcome::Failed { target, .. } => target,
        }
    }

    pub fn result(&self) -> Option<&TargetResult> {
        match self {
            RunOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}
