//! Lifecycle of many concurrent virtual clients against one target
use crate::aggregator;
use crate::error::HealthError;
use crate::generator::Generator;
use governor::{Quota, RateLimiter};
use ormbench_core::{RequestSample, RunConfig, RunOutcome, Target, TargetResult};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use reqwest::{Client, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, timeout_at, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Time past the grace window for cut-off requests to report before client tasks are aborted.
const ABORT_MARGIN: Duration = Duration::from_secs(1);

/// Run `target` under `config` and reduce what was observed.
///
/// A target failing its liveness probe is [`RunOutcome::Skipped`] before any client starts. A
/// run that outlives `config.run_budget` is abandoned and reported as [`RunOutcome::Failed`].
#[instrument(name = "target", skip_all, fields(name = %target.name))]
pub async fn execute(target: &Target, config: &RunConfig) -> RunOutcome {
    let client = match Client::builder().timeout(config.request_timeout).build() {
        Ok(client) => client,
        Err(err) => {
            error!("Unable to build HTTP client: {err}");
            return RunOutcome::Failed {
                target: target.name.clone(),
                reason: err.to_string(),
            };
        }
    };

    let run = async {
        if let Err(err) = check_health(&client, target, config.health_timeout).await {
            warn!("{target} is not responding, skipping: {err}");
            return RunOutcome::Skipped {
                target: target.name.clone(),
                reason: err.to_string(),
            };
        }

        info!("Running {target} with config {config:?}");
        RunOutcome::Completed(run_clients(client.clone(), target, config).await)
    };

    match tokio::time::timeout(config.run_budget, run).await {
        Ok(outcome) => outcome,
        Err(_) => {
            let budget = humantime::format_duration(config.run_budget);
            error!("Run exceeded its budget of {budget}, abandoning");
            RunOutcome::Failed {
                target: target.name.clone(),
                reason: format!("run exceeded budget of {budget}"),
            }
        }
    }
}

/// `GET /health` must answer `200` within `timeout`.
pub async fn check_health(
    client: &Client,
    target: &Target,
    timeout: Duration,
) -> Result<(), HealthError> {
    let res = client
        .get(target.url("/health"))
        .timeout(timeout)
        .send()
        .await?;

    match res.status() {
        StatusCode::OK => Ok(()),
        status => Err(HealthError::Status(status.as_u16())),
    }
}

async fn run_clients(client: Client, target: &Target, config: &RunConfig) -> TargetResult {
    let (tx, mut rx) = unbounded_channel::<RequestSample>();
    let collector = tokio::spawn(async move {
        let mut samples = vec![];
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }
        samples
    });

    let start = Instant::now();
    let deadline = start + config.duration;
    let hard_stop = deadline + config.grace;

    let ramp = RateLimiter::direct(Quota::per_second(config.ramp_rate).allow_burst(NonZeroU32::MIN));
    let mut clients = JoinSet::new();

    for id in 0..config.clients {
        tokio::select! {
            _ = ramp.until_ready() => {}
            _ = sleep_until(deadline) => {
                warn!("Deadline reached during ramp-up, {id} of {} clients started", config.clients);
                break;
            }
        }

        let generator = Generator::new(client.clone(), target, config, client_rng(config.seed, id))
            .with_deadline(deadline)
            .with_stop_at(hard_stop);
        clients.spawn(client_task(id, generator, deadline, tx.clone()));
    }
    drop(tx);
    info!("{} clients active after {:?}", clients.len(), start.elapsed());

    let drained = timeout_at(hard_stop + ABORT_MARGIN, async {
        while let Some(res) = clients.join_next().await {
            if let Err(err) = res {
                error!("Client task failed: {err}");
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            "Aborting {} clients still running after the grace period",
            clients.len()
        );
        clients.shutdown().await;
    }

    let elapsed = start.elapsed();
    let samples = match collector.await {
        Ok(samples) => samples,
        Err(err) => {
            error!("Sample collector failed: {err}");
            vec![]
        }
    };
    info!("Collected {} samples in {:?}", samples.len(), elapsed);

    aggregator::reduce(target, &samples, elapsed, OffsetDateTime::now_utc())
}

#[instrument(name = "client", skip(generator, deadline, sink))]
async fn client_task(
    id: usize,
    mut generator: Generator,
    deadline: Instant,
    sink: UnboundedSender<RequestSample>,
) {
    generator.start().await;

    while Instant::now() < deadline {
        if let Some(sample) = generator.run_once().await {
            if sink.send(sample).is_err() {
                error!("Sample sink closed, stopping client");
                return;
            }
        }
    }

    let state = generator.state();
    debug!(
        "Client finished with {} users and {} posts created",
        state.users.len(),
        state.posts.len()
    );
}

/// Per-client RNG; seeded runs give every client its own reproducible stream.
fn client_rng(seed: Option<u64>, id: usize) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id as u64)),
        None => SmallRng::from_entropy(),
    }
}
