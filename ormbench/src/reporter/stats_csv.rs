use crate::error::HarnessError;
use ormbench_core::TargetResult;
use std::path::{Path, PathBuf};

const AGGREGATED: &str = "Aggregated";

pub(crate) fn write_stats(dir: &Path, result: &TargetResult) -> Result<PathBuf, HarnessError> {
    let path = dir.join(format!("{}_stats.csv", super::file_stem(&result.target)));
    let csv_error = |source| HarnessError::Csv {
        path: path.clone(),
        source,
    };

    let mut wtr = csv::Writer::from_path(&path).map_err(csv_error)?;
    wtr.write_record([
        "operation",
        "count",
        "failures",
        "expected_failures",
        "mean_ms",
        "p95_ms",
        "p99_ms",
        "rps",
    ])
    .map_err(csv_error)?;

    let elapsed = result.elapsed.as_secs_f64();
    for (op, stats) in &result.operations {
        let rps = if elapsed > 0. {
            stats.count as f64 / elapsed
        } else {
            0.
        };
        let record = row(
            op.as_str(),
            [stats.count, stats.failures, stats.expected_failures],
            [stats.mean_latency_ms, stats.p95_latency_ms, stats.p99_latency_ms, rps],
        );
        wtr.write_record(&record).map_err(csv_error)?;
    }

    let record = row(
        AGGREGATED,
        [result.total_requests, result.failures, result.expected_failures],
        [result.mean_latency_ms, result.p95_latency_ms, result.p99_latency_ms, result.rps],
    );
    wtr.write_record(&record).map_err(csv_error)?;

    wtr.flush().map_err(HarnessError::io(&path))?;
    Ok(path)
}

fn row(label: &str, counts: [u64; 3], figures: [f64; 4]) -> Vec<String> {
    std::iter::once(label.to_string())
        .chain(counts.iter().map(u64::to_string))
        .chain(figures.iter().map(|f| format!("{f:.2}")))
        .collect()
}
