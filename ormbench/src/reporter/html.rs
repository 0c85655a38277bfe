use crate::error::HarnessError;
use ormbench_core::TargetResult;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn write_report(dir: &Path, result: &TargetResult) -> Result<PathBuf, HarnessError> {
    let path = dir.join(format!("{}_report.html", super::file_stem(&result.target)));
    fs::write(&path, render_html(result)).map_err(HarnessError::io(&path))?;
    Ok(path)
}

/// Standalone HTML page summarising one target's run.
pub fn render_html(result: &TargetResult) -> String {
    let mut rows = String::new();
    for (op, stats) in &result.operations {
        // Writing into a String cannot fail.
        let _ = writeln!(
            rows,
            "<tr><td>{op}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td></tr>",
            stats.count,
            stats.failures,
            stats.expected_failures,
            stats.mean_latency_ms,
            stats.p95_latency_ms,
            stats.p99_latency_ms,
        );
    }

    let name = escape(&result.target);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{name} load test report</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; margin-bottom: 2em; }}
th, td {{ border: 1px solid #ccc; padding: 4px 10px; text-align: right; }}
th:first-child, td:first-child {{ text-align: left; }}
</style>
</head>
<body>
<h1>{name}</h1>
<p>{description}</p>
<p>Finished {timestamp} after {elapsed:.1}s</p>
<h2>Summary</h2>
<table>
<tr><th>Requests</th><td>{total}</td></tr>
<tr><th>Failures</th><td>{failures}</td></tr>
<tr><th>Expected failures</th><td>{expected}</td></tr>
<tr><th>Failure rate</th><td>{failure_rate:.2}%</td></tr>
<tr><th>Mean (ms)</th><td>{mean:.2}</td></tr>
<tr><th>P95 (ms)</th><td>{p95:.2}</td></tr>
<tr><th>P99 (ms)</th><td>{p99:.2}</td></tr>
<tr><th>Max (ms)</th><td>{max:.2}</td></tr>
<tr><th>Requests/s</th><td>{rps:.2}</td></tr>
</table>
<h2>Operations</h2>
<table>
<tr><th>Operation</th><th>Requests</th><th>Failures</th><th>Expected failures</th><th>Mean (ms)</th><th>P95 (ms)</th><th>P99 (ms)</th></tr>
{rows}</table>
</body>
</html>
"#,
        description = escape(&result.description),
        timestamp = result.timestamp,
        elapsed = result.elapsed.as_secs_f64(),
        total = result.total_requests,
        failures = result.failures,
        expected = result.expected_failures,
        failure_rate = result.failure_rate * 100.,
        mean = result.mean_latency_ms,
        p95 = result.p95_latency_ms,
        p99 = result.p99_latency_ms,
        max = result.max_latency_ms,
        rps = result.rps,
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
