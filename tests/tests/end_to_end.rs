mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockConfig;
use ormbench::prelude::*;
use ormbench::{execute, Generator};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use reqwest::Client;
use std::fs;
use std::num::NonZeroU32;
use std::time::Duration;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn healthy_target_completes_without_failures() {
    init();
    let server = mock(MockConfig::default()).await;
    let target = target("tortoise", &server);
    let config = RunConfig {
        clients: 1,
        ramp_rate: NonZeroU32::MIN,
        duration: Duration::from_secs(5),
        ..quick_config()
    };

    let outcome = execute(&target, &config).await;
    let RunOutcome::Completed(result) = outcome else {
        panic!("expected a completed run, got {outcome:?}");
    };

    assert_eq!(result.target, "tortoise");
    assert!(result.total_requests > 0);
    assert_eq!(result.failures, 0);
    assert_eq!(result.failure_rate, 0.);
    assert!(result.rps > 0.);
    assert!(result.p95_latency_ms <= result.p99_latency_ms);
    assert!(result.p99_latency_ms <= result.max_latency_ms);
    assert_eq!(
        result.operations.values().map(|s| s.count).sum::<u64>(),
        result.total_requests
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn duplicate_emails_are_not_failures() {
    init();
    let server = mock(MockConfig {
        duplicate_emails: true,
        ..Default::default()
    })
    .await;
    let target = target("sqlalchemy", &server);

    let outcome = execute(&target, &quick_config()).await;
    let result = outcome.result().expect("run completes");

    let create_user = &result.operations[&Operation::CreateUser];
    assert!(create_user.count > 0);
    assert_eq!(create_user.expected_failures, create_user.count);
    assert_eq!(create_user.failures, 0);
    assert_eq!(result.failures, 0);
    assert_eq!(result.failure_rate, 0.);
    assert!(result.expected_failures >= create_user.count);

    server.shutdown().await.unwrap();
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn requests_outliving_the_grace_window_are_timeouts() {
    init();
    let server = mock(MockConfig {
        delay: Duration::from_secs(5),
        ..Default::default()
    })
    .await;
    let target = target("slow", &server);
    let config = RunConfig {
        duration: Duration::from_secs(1),
        grace: Duration::from_millis(500),
        ..quick_config()
    };

    let started = std::time::Instant::now();
    let result = execute(&target, &config).await;
    let result = result.result().expect("run completes");

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(result.failures > 0);
    assert_eq!(result.failures, result.total_requests);
    assert_eq!(result.failure_rate, 1.);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn run_over_budget_is_failed() {
    init();
    let server = mock(MockConfig {
        health_delay: Duration::from_secs(3),
        ..Default::default()
    })
    .await;
    let target = target("stuck", &server);
    let config = RunConfig {
        duration: Duration::from_millis(200),
        grace: Duration::from_millis(200),
        run_budget: Duration::from_secs(1),
        health_timeout: Duration::from_secs(5),
        ..quick_config()
    };

    let outcome = execute(&target, &config).await;
    assert!(matches!(
        outcome,
        RunOutcome::Failed { ref target, ref reason } if target == "stuck" && reason.contains("budget")
    ));
}

#[tracing_test::traced_test]
#[tokio::test]
#[ntest::timeout(30_000)]
async fn comparison_skips_unreachable_targets() {
    let server = mock(MockConfig::default()).await;
    let targets = [unreachable_target("offline"), target("local", &server)];
    let dir = tempfile::tempdir().unwrap();

    let reporter = ComparisonReporter::new(dir.path());
    let comparison = reporter.run_all(&targets, &quick_config()).await.unwrap();

    assert_eq!(comparison.results.len(), 2);
    assert_eq!(comparison.results[0].target(), "offline");
    assert_eq!(comparison.skipped().len(), 1);
    assert_eq!(comparison.skipped()[0].0, "offline");
    assert!(comparison.failed().is_empty());

    let ranked = comparison.ranked();
    assert_eq!(ranked.len(), 1);
    assert_eq!(comparison.winner().unwrap().target, "local");
    assert!(logs_contain("skipping"));

    let report = fs::read_to_string(dir.path().join("local_report.html")).unwrap();
    assert!(report.contains("<h1>local</h1>"));
    assert!(!dir.path().join("offline_report.html").exists());

    let stats = fs::read_to_string(dir.path().join("local_stats.csv")).unwrap();
    assert!(stats.starts_with("operation,count,failures,expected_failures"));
    assert!(stats.lines().last().unwrap().starts_with("Aggregated,"));
    assert!(!dir.path().join("offline_stats.csv").exists());

    let saved = dir.path().join(comparison.file_name().unwrap());
    let saved: Comparison = serde_json::from_str(&fs::read_to_string(saved).unwrap()).unwrap();
    assert_eq!(saved.results.len(), 2);
    assert_eq!(saved.winner().unwrap().target, "local");
    assert_eq!(saved.config, comparison.config);

    server.shutdown().await.unwrap();
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn generator_detects_backend_flavor() {
    init();
    let server = mock(MockConfig {
        flavor: "edgedb".to_string(),
        ..Default::default()
    })
    .await;
    let target = target("edgedb", &server);

    let mut generator = Generator::new(
        Client::new(),
        &target,
        &quick_config(),
        SmallRng::seed_from_u64(1),
    );
    generator.start().await;
    assert_eq!(generator.state().flavor, "edgedb");

    let sample = generator.perform(Operation::Benchmark).await.unwrap();
    assert_eq!(sample.status, ResponseStatus::Code(200));
    assert_eq!(sample.outcome, Outcome::Success);

    let sample = generator.perform(Operation::CreateUser).await.unwrap();
    assert_eq!(sample.status, ResponseStatus::Code(201));
    assert_eq!(generator.state().users.len(), 1);

    let sample = generator.perform(Operation::GetUser).await.unwrap();
    assert_eq!(sample.outcome, Outcome::Success);

    server.shutdown().await.unwrap();
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn create_post_without_users_seeds_a_user_first() {
    init();
    let server = mock(MockConfig::default()).await;
    let target = target("tortoise", &server);

    let mut generator = Generator::new(
        Client::new(),
        &target,
        &quick_config(),
        SmallRng::seed_from_u64(2),
    );

    assert!(generator.perform(Operation::CreatePost).await.is_none());
    assert_eq!(generator.state().users.len(), 1);
    assert!(generator.state().posts.is_empty());

    let sample = generator.perform(Operation::CreatePost).await.unwrap();
    assert_eq!(sample.operation, Operation::CreatePost);
    assert_eq!(sample.status, ResponseStatus::Code(201));
    assert_eq!(sample.outcome, Outcome::Success);
    assert_eq!(generator.state().users.len(), 1);
    assert_eq!(generator.state().posts.len(), 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn requests_cut_off_at_stop_are_timeouts() {
    init();
    let server = mock(MockConfig {
        delay: Duration::from_secs(2),
        ..Default::default()
    })
    .await;
    let target = target("slow", &server);

    let mut generator = Generator::new(
        Client::new(),
        &target,
        &quick_config(),
        SmallRng::seed_from_u64(3),
    )
    .with_stop_at(tokio::time::Instant::now() + Duration::from_millis(200));

    let sample = generator.perform(Operation::ListUsers).await.unwrap();
    assert_eq!(sample.status, ResponseStatus::Timeout);
    assert_eq!(sample.outcome, Outcome::UnexpectedFailure);
    assert!(sample.latency < Duration::from_secs(1));
}
