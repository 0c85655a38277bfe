use anyhow::{Context, Result};
use clap::Parser;
use mock_service::{MockConfig, MockServer};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(about = "In-memory Users/Posts backend for exercising ormbench")]
struct MockCli {
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Backend flavor reported by `/health`; selects the benchmark endpoint served
    #[arg(short, long, default_value = "tortoise")]
    flavor: String,

    /// Latency added to every API request, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Latency added to `/health`, in milliseconds
    #[arg(long, default_value_t = 0)]
    health_delay_ms: u64,

    /// Reject every user creation as a duplicate email
    #[arg(long)]
    duplicate_emails: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mock_service=debug,tower_http=info"));
    FmtSubscriber::builder().with_env_filter(filter).init();

    let cli = MockCli::parse();
    let config = MockConfig {
        flavor: cli.flavor,
        delay: Duration::from_millis(cli.delay_ms),
        health_delay: Duration::from_millis(cli.health_delay_ms),
        duplicate_emails: cli.duplicate_emails,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let server = MockServer::start(addr, config.clone())
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Serving {} backend on {}", config.flavor, server.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    server.shutdown().await?;

    Ok(())
}
