use mock_service::{MockConfig, MockServer};
use ormbench_core::{RunConfig, Target, ThinkTime};
use std::num::NonZeroU32;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("ormbench=debug,mock_service=debug")
            .try_init();
    });
}

#[allow(unused)]
pub async fn mock(config: MockConfig) -> MockServer {
    MockServer::start("127.0.0.1:0".parse().unwrap(), config)
        .await
        .unwrap()
}

#[allow(unused)]
pub fn target(name: &str, server: &MockServer) -> Target {
    Target::new(name, &server.base_url(), "In-memory mock").unwrap()
}

#[allow(unused)]
pub fn unreachable_target(name: &str) -> Target {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Target::new(name, &format!("http://127.0.0.1:{port}"), "Not running").unwrap()
}

/// A short, seeded run with think-time scaled down for tests.
#[allow(unused)]
pub fn quick_config() -> RunConfig {
    RunConfig {
        clients: 3,
        ramp_rate: NonZeroU32::new(10).unwrap(),
        duration: Duration::from_secs(2),
        think_time: ThinkTime::new(Duration::from_millis(10), Duration::from_millis(50)),
        grace: Duration::from_secs(1),
        run_budget: Duration::from_secs(10),
        cooldown: Duration::ZERO,
        health_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(5),
        seed: Some(42),
        ..Default::default()
    }
}
