use anyhow::{Context, Result};
use clap::Parser;
use ormbench::prelude::*;
use ormbench_core::{
    DEFAULT_CLIENTS, DEFAULT_RAMP_RATE, DEFAULT_THINK_TIME_MAX, DEFAULT_THINK_TIME_MIN,
    DEFAULT_WORKERS,
};
use std::io::{self, BufRead, Write};
#[cfg(feature = "metrics")]
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "ormbench=info";

#[derive(Parser, Debug)]
#[command(version, about = "Compare REST backends under an identical load pattern")]
struct OrmbenchCli {
    /// Start without asking for confirmation that the targets are running
    #[arg(short, long)]
    yes: bool,

    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    #[arg(short, long, default_value_t = DEFAULT_CLIENTS)]
    clients: usize,

    /// Virtual clients started per second
    #[arg(short, long, default_value_t = DEFAULT_RAMP_RATE)]
    ramp_rate: NonZeroU32,

    #[arg(short, long, value_parser = humantime::parse_duration, default_value = "2m")]
    duration: Duration,

    /// Worker threads for the async runtime
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    cooldown: Duration,

    /// How long in-flight requests may finish after the run deadline
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    grace: Duration,

    /// Hard wall-clock cap for one target's run
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5m")]
    run_budget: Duration,

    /// Seed for reproducible client behavior
    #[arg(long)]
    seed: Option<u64>,

    /// Target as NAME=URL[=DESCRIPTION]; replaces the default targets when given
    #[arg(short('t'), long = "target", value_name = "NAME=URL[=DESCRIPTION]")]
    targets: Vec<Target>,

    /// Expose request metrics on this address in Prometheus format
    #[cfg(feature = "metrics")]
    #[arg(long)]
    prometheus: Option<SocketAddr>,
}

impl OrmbenchCli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            clients: self.clients,
            ramp_rate: self.ramp_rate,
            duration: self.duration,
            workers: self.workers,
            think_time: ThinkTime::new(DEFAULT_THINK_TIME_MIN, DEFAULT_THINK_TIME_MAX),
            grace: self.grace,
            run_budget: self.run_budget,
            cooldown: self.cooldown,
            seed: self.seed,
            ..Default::default()
        }
    }

    fn targets(&self) -> Vec<Target> {
        if self.targets.is_empty() {
            Target::defaults()
        } else {
            self.targets.clone()
        }
    }
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    FmtSubscriber::builder().with_env_filter(filter).init();

    let cli = OrmbenchCli::parse();
    let config = cli.run_config();
    config.validate().context("Invalid run configuration")?;
    let targets = cli.targets();

    println!("Make sure all servers are running before starting tests:");
    for target in &targets {
        println!("  - {:<12} {}", target.name, target.base_url);
    }
    println!();

    if !cli.yes {
        confirm()?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.prometheus {
        runtime
            .block_on(async {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .with_http_listener(addr)
                    .install()
            })
            .context("Failed to install Prometheus exporter")?;
        info!("Serving metrics on {addr}");
    }

    let reporter = ComparisonReporter::new(&cli.results_dir);
    let comparison = runtime.block_on(reporter.run_all(&targets, &config))?;

    println!("{comparison}");
    info!("Comparison complete");

    Ok(())
}

fn confirm() -> Result<()> {
    print!("Press Enter to start tests...");
    io::stdout().flush()?;
    io::stdin()
        .lock()
        .read_line(&mut String::new())
        .context("Failed to read confirmation")?;
    Ok(())
}
