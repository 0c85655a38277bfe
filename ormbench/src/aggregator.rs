//! Reduction of raw request samples into per-target statistics
use ormbench_core::{Operation, OperationStats, Outcome, RequestSample, Target, TargetResult};
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

/// Reduce a completed run's samples into a [`TargetResult`].
///
/// Pure and independent of sample order: latencies are sorted before any statistic is taken.
/// `elapsed` is the observed wall-clock length of the run and is the denominator for `rps`.
pub fn reduce(
    target: &Target,
    samples: &[RequestSample],
    elapsed: Duration,
    timestamp: OffsetDateTime,
) -> TargetResult {
    let overall = Tally::new(samples.iter());

    let mut by_operation: BTreeMap<Operation, Vec<&RequestSample>> = BTreeMap::new();
    for sample in samples {
        by_operation.entry(sample.operation).or_default().push(sample);
    }

    let operations = by_operation
        .into_iter()
        .map(|(op, samples)| {
            let tally = Tally::new(samples.into_iter());
            let stats = OperationStats {
                count: tally.count,
                failures: tally.failures,
                expected_failures: tally.expected_failures,
                mean_latency_ms: tally.mean(),
                p95_latency_ms: tally.percentile(0.95),
                p99_latency_ms: tally.percentile(0.99),
            };
            (op, stats)
        })
        .collect();

    let rps = if elapsed.is_zero() {
        0.
    } else {
        overall.count as f64 / elapsed.as_secs_f64()
    };

    TargetResult {
        target: target.name.clone(),
        description: target.description.clone(),
        total_requests: overall.count,
        failures: overall.failures,
        expected_failures: overall.expected_failures,
        failure_rate: overall.failure_rate(),
        mean_latency_ms: overall.mean(),
        p95_latency_ms: overall.percentile(0.95),
        p99_latency_ms: overall.percentile(0.99),
        max_latency_ms: overall.latencies_ms.last().copied().unwrap_or_default(),
        rps,
        elapsed,
        timestamp,
        operations,
    }
}

/// Linear-interpolation percentile over an ascending slice. `0.` for an empty slice.
pub fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.;
    }

    let rank = quantile.clamp(0., 1.) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

struct Tally {
    count: u64,
    failures: u64,
    expected_failures: u64,
    latencies_ms: Vec<f64>,
}

impl Tally {
    fn new<'a>(samples: impl Iterator<Item = &'a RequestSample>) -> Self {
        let mut tally = Tally {
            count: 0,
            failures: 0,
            expected_failures: 0,
            latencies_ms: vec![],
        };

        for sample in samples {
            tally.count += 1;
            match sample.outcome {
                Outcome::UnexpectedFailure => tally.failures += 1,
                Outcome::ExpectedFailure => tally.expected_failures += 1,
                Outcome::Success => {}
            }
            tally
                .latencies_ms
                .push(sample.latency.as_nanos() as f64 / 1_000_000.);
        }

        tally.latencies_ms.sort_by(f64::total_cmp);
        tally
    }

    fn failure_rate(&self) -> f64 {
        if self.count == 0 {
            0.
        } else {
            self.failures as f64 / self.count as f64
        }
    }

    fn mean(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            0.
        } else {
            statistical::mean(&self.latencies_ms)
        }
    }

    fn percentile(&self, quantile: f64) -> f64 {
        percentile(&self.latencies_ms, quantile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormbench_core::ResponseStatus;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn target() -> Target {
        Target::new("tortoise", "http://localhost:8002", "Native async").unwrap()
    }

    fn sample(op: Operation, ms: u64, outcome: Outcome) -> RequestSample {
        RequestSample::new(
            op,
            Duration::from_millis(ms),
            outcome,
            ResponseStatus::Code(200),
        )
    }

    fn random_samples(rng: &mut SmallRng, n: usize) -> Vec<RequestSample> {
        (0..n)
            .map(|_| {
                let op = Operation::ALL[rng.gen_range(0..Operation::ALL.len())];
                let outcome = match rng.gen_range(0..10) {
                    0 => Outcome::UnexpectedFailure,
                    1 => Outcome::ExpectedFailure,
                    _ => Outcome::Success,
                };
                sample(op, rng.gen_range(1..2_000), outcome)
            })
            .collect()
    }

    #[test]
    fn empty_run_is_all_zero() {
        let result = reduce(
            &target(),
            &[],
            Duration::ZERO,
            OffsetDateTime::UNIX_EPOCH,
        );
        assert_eq!(result.total_requests, 0);
        assert_eq!(result.failures, 0);
        assert_eq!(result.failure_rate, 0.);
        assert_eq!(result.mean_latency_ms, 0.);
        assert_eq!(result.p95_latency_ms, 0.);
        assert_eq!(result.p99_latency_ms, 0.);
        assert_eq!(result.rps, 0.);
        assert!(result.operations.is_empty());
    }

    #[test]
    fn counts_only_unexpected_failures() {
        let samples = vec![
            sample(Operation::CreateUser, 10, Outcome::Success),
            sample(Operation::CreateUser, 10, Outcome::ExpectedFailure),
            sample(Operation::ListUsers, 10, Outcome::UnexpectedFailure),
            sample(Operation::ListUsers, 10, Outcome::Success),
        ];
        let result = reduce(
            &target(),
            &samples,
            Duration::from_secs(2),
            OffsetDateTime::UNIX_EPOCH,
        );

        assert_eq!(result.total_requests, 4);
        assert_eq!(result.failures, 1);
        assert_eq!(result.expected_failures, 1);
        assert_eq!(result.failure_rate, 0.25);
        assert_eq!(result.rps, 2.);

        let create = &result.operations[&Operation::CreateUser];
        assert_eq!(create.count, 2);
        assert_eq!(create.expected_failures, 1);
        assert_eq!(create.failures, 0);
        assert_eq!(result.operations[&Operation::ListUsers].failures, 1);
    }

    #[test]
    fn percentiles_interpolate_linearly() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(percentile(&values, 0.), 1.);
        assert_eq!(percentile(&values, 1.), 10.);
        assert!((percentile(&values, 0.5) - 5.5).abs() < 1e-9);
        assert!((percentile(&values, 0.95) - 9.55).abs() < 1e-9);
        assert_eq!(percentile(&[7.], 0.99), 7.);
        assert_eq!(percentile(&[], 0.95), 0.);
    }

    #[test]
    fn latency_statistics_use_milliseconds() {
        let samples: Vec<_> = (1..=100)
            .map(|ms| sample(Operation::ListPosts, ms, Outcome::Success))
            .collect();
        let result = reduce(
            &target(),
            &samples,
            Duration::from_secs(10),
            OffsetDateTime::UNIX_EPOCH,
        );

        assert!((result.mean_latency_ms - 50.5).abs() < 1e-9);
        assert!((result.p95_latency_ms - 95.05).abs() < 1e-9);
        assert!((result.p99_latency_ms - 99.01).abs() < 1e-9);
        assert_eq!(result.max_latency_ms, 100.);
        assert_eq!(result.rps, 10.);
    }

    #[test]
    fn failure_rate_is_a_ratio() {
        let mut rng = SmallRng::seed_from_u64(11);
        for n in [1, 2, 17, 500] {
            let samples = random_samples(&mut rng, n);
            let result = reduce(
                &target(),
                &samples,
                Duration::from_secs(1),
                OffsetDateTime::UNIX_EPOCH,
            );
            assert!((0. ..=1.).contains(&result.failure_rate));
            assert_eq!(
                result.failure_rate,
                result.failures as f64 / result.total_requests as f64
            );
        }
    }

    #[test]
    fn percentiles_are_ordered_and_bounded() {
        let mut rng = SmallRng::seed_from_u64(5);
        for n in [1, 3, 20, 1_000] {
            let samples = random_samples(&mut rng, n);
            let result = reduce(
                &target(),
                &samples,
                Duration::from_secs(1),
                OffsetDateTime::UNIX_EPOCH,
            );

            let mut latencies: Vec<f64> = samples
                .iter()
                .map(|s| s.latency.as_nanos() as f64 / 1_000_000.)
                .collect();
            latencies.sort_by(f64::total_cmp);
            let lower = &latencies[..((latencies.len() as f64 * 0.95) as usize).max(1)];
            let lower_mean = lower.iter().sum::<f64>() / lower.len() as f64;

            assert!(result.p95_latency_ms >= lower_mean - 1e-9);
            assert!(result.p95_latency_ms <= result.max_latency_ms);
            assert!(result.p99_latency_ms >= result.p95_latency_ms);
        }
    }

    #[test]
    fn reduction_ignores_sample_order() {
        let mut rng = SmallRng::seed_from_u64(99);
        let samples = random_samples(&mut rng, 2_000);
        let mut shuffled = samples.clone();
        shuffled.shuffle(&mut rng);

        let elapsed = Duration::from_secs(120);
        let a = reduce(&target(), &samples, elapsed, OffsetDateTime::UNIX_EPOCH);
        let b = reduce(&target(), &shuffled, elapsed, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(a, b);
    }
}
