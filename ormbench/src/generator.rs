//! A single simulated client session
mod flavor;
mod picker;

pub use flavor::benchmark_endpoint;
pub use picker::{OperationPicker, OPERATION_WEIGHTS};

use ormbench_core::{
    Operation, Outcome, RequestSample, ResponseStatus, RunConfig, Target, ThinkTime,
    UNKNOWN_FLAVOR,
};
use rand::rngs::SmallRng;
use rand::Rng;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

const DUPLICATE_EMAIL: &str = "Email already exists";
const USER_NOT_FOUND: &str = "User not found";
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// State owned by one virtual client for the length of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualClientState {
    pub users: Vec<String>,
    pub posts: Vec<String>,
    pub flavor: String,
}

impl Default for VirtualClientState {
    fn default() -> Self {
        Self {
            users: vec![],
            posts: vec![],
            flavor: UNKNOWN_FLAVOR.to_string(),
        }
    }
}

/// Virtual client issuing a weighted sequence of operations against one target.
///
/// Every operation classifies its own response; a failed request is recorded in its
/// [`RequestSample`] and never surfaces as an error.
pub struct Generator {
    client: Client,
    target: Target,
    rng: SmallRng,
    picker: OperationPicker,
    think_time: ThinkTime,
    stop_at: Option<Instant>,
    deadline: Option<Instant>,
    state: VirtualClientState,
}

impl Generator {
    pub fn new(client: Client, target: &Target, config: &RunConfig, rng: SmallRng) -> Self {
        Self {
            client,
            target: target.clone(),
            rng,
            picker: OperationPicker::new(),
            think_time: config.think_time,
            stop_at: None,
            deadline: None,
            state: VirtualClientState::default(),
        }
    }

    /// Requests still running at `stop_at` are cut off and recorded as timeouts.
    pub fn with_stop_at(mut self, stop_at: Instant) -> Self {
        self.stop_at = Some(stop_at);
        self
    }

    /// Think-time pauses end early at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn state(&self) -> &VirtualClientState {
        &self.state
    }

    /// Probe `/health` for the backend flavor. Falls back to [`UNKNOWN_FLAVOR`].
    pub async fn start(&mut self) {
        let exchange = self.exchange(self.client.get(self.target.url("/health"))).await;

        self.state.flavor = match exchange.status {
            ResponseStatus::Code(200) => serde_json::from_str::<Value>(&exchange.body)
                .ok()
                .and_then(|v| v.get("orm").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| UNKNOWN_FLAVOR.to_string()),
            status => {
                debug!("Flavor probe failed with {status}");
                UNKNOWN_FLAVOR.to_string()
            }
        };

        debug!(flavor = %self.state.flavor, "Client started");
    }

    /// Run one operation followed by the think-time pause.
    pub async fn run_once(&mut self) -> Option<RequestSample> {
        let sample = self.step().await;
        self.think().await;
        sample
    }

    /// Run one weighted-random operation. `None` when the operation had nothing to act on.
    pub async fn step(&mut self) -> Option<RequestSample> {
        let operation = self.picker.pick(&mut self.rng);
        let sample = self.perform(operation).await;

        if let Some(sample) = &sample {
            trace!(
                "{} -> {} in {:?}",
                sample.operation,
                sample.status,
                sample.latency
            );
            #[cfg(feature = "metrics")]
            record_metrics(sample);
        }

        sample
    }

    pub async fn think(&mut self) {
        let wake = Instant::now() + self.think_duration();
        let wake = self.deadline.map_or(wake, |deadline| wake.min(deadline));
        tokio::time::sleep_until(wake).await;
    }

    fn think_duration(&mut self) -> Duration {
        let ThinkTime { min, max } = self.think_time;
        self.rng.gen_range(min..=max)
    }

    pub async fn perform(&mut self, operation: Operation) -> Option<RequestSample> {
        match operation {
            Operation::CreateUser => Some(self.create_user().await),
            Operation::ListUsers => {
                let skip = self.rng.gen_range(0..=10);
                let limit = self.rng.gen_range(5..=20);
                let url = self.target.url(&format!("/users?skip={skip}&limit={limit}"));
                Some(self.get(operation, url).await)
            }
            Operation::GetUser => {
                let id = self.random_user()?;
                let url = self.target.url(&format!("/users/{id}"));
                Some(self.get(operation, url).await)
            }
            Operation::CreatePost => {
                if self.state.users.is_empty() {
                    // NOTE: Seed a user for later posts; the fallback is not reported.
                    let _ = self.create_user().await;
                    return None;
                }
                Some(self.create_post().await)
            }
            Operation::ListPosts => {
                let skip = self.rng.gen_range(0..=10);
                let limit = self.rng.gen_range(5..=15);
                let url = self.target.url(&format!("/posts?skip={skip}&limit={limit}"));
                Some(self.get(operation, url).await)
            }
            Operation::GetUserPosts => {
                let id = self.random_user()?;
                let skip = self.rng.gen_range(0..=5);
                let limit = self.rng.gen_range(5..=10);
                let url = self
                    .target
                    .url(&format!("/users/{id}/posts?skip={skip}&limit={limit}"));
                Some(self.get(operation, url).await)
            }
            Operation::Benchmark => {
                let endpoint = benchmark_endpoint(&self.state.flavor)?;
                let url = self.target.url(endpoint);
                let exchange = self.exchange(self.client.get(url)).await;
                let sample = exchange.sample(operation);
                if sample.outcome == Outcome::Success {
                    log_benchmark(&self.state.flavor, &exchange.body);
                }
                Some(sample)
            }
        }
    }

    async fn create_user(&mut self) -> RequestSample {
        let user = NewUser {
            name: format!("User {}", self.random_string(5)),
            email: format!("user_{}@test.com", self.random_string(8)),
        };

        let request = self.client.post(self.target.url("/users")).json(&user);
        let exchange = self.exchange(request).await;
        let sample = exchange.sample(Operation::CreateUser);

        if sample.outcome == Outcome::Success {
            match created_id(&exchange.body) {
                Some(id) => self.state.users.push(id),
                None => debug!("Created user response carried no id"),
            }
        }

        sample
    }

    async fn create_post(&mut self) -> RequestSample {
        let user_id = self.random_user().unwrap_or_default();
        let post = NewPost {
            title: format!("Post {}", self.random_string(8)),
            content: format!("This is test content {}", self.random_string(20)),
            user_id: id_value(&user_id),
        };

        let request = self.client.post(self.target.url("/posts")).json(&post);
        let exchange = self.exchange(request).await;
        let sample = exchange.sample(Operation::CreatePost);

        if sample.outcome == Outcome::Success {
            match created_id(&exchange.body) {
                Some(id) => self.state.posts.push(id),
                None => debug!("Created post response carried no id"),
            }
        }

        sample
    }

    async fn get(&self, operation: Operation, url: String) -> RequestSample {
        self.exchange(self.client.get(url)).await.sample(operation)
    }

    async fn exchange(&self, request: RequestBuilder) -> Exchange {
        let start = Instant::now();
        let fut = async {
            let res = request.send().await?;
            let code = res.status().as_u16();
            let body = res.text().await?;
            Ok::<_, reqwest::Error>((code, body))
        };

        let res = match self.stop_at {
            Some(stop_at) => tokio::time::timeout_at(stop_at, fut).await,
            None => Ok(fut.await),
        };
        let latency = start.elapsed();

        let (status, body) = match res {
            Ok(Ok((code, body))) => (ResponseStatus::Code(code), body),
            Ok(Err(err)) if err.is_timeout() => (ResponseStatus::Timeout, String::new()),
            Ok(Err(err)) => {
                debug!("Request failed: {err}");
                (ResponseStatus::Transport, String::new())
            }
            Err(_) => (ResponseStatus::Timeout, String::new()),
        };

        Exchange {
            status,
            body,
            latency,
        }
    }

    fn random_user(&mut self) -> Option<String> {
        if self.state.users.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.state.users.len());
        Some(self.state.users[idx].clone())
    }

    fn random_string(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| CHARSET[self.rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }
}

struct Exchange {
    status: ResponseStatus,
    body: String,
    latency: Duration,
}

impl Exchange {
    fn sample(&self, operation: Operation) -> RequestSample {
        let outcome = classify(operation, self.status, &self.body);
        RequestSample::new(operation, self.latency, outcome, self.status)
    }
}

#[derive(Serialize)]
struct NewUser {
    name: String,
    email: String,
}

#[derive(Serialize)]
struct NewPost {
    title: String,
    content: String,
    user_id: Value,
}

/// Decide whether a response counts against the target.
///
/// Collisions that concurrent clients legitimately cause are expected: a duplicate email, a post
/// for a user that no longer exists, or a lookup of a missing user.
pub fn classify(operation: Operation, status: ResponseStatus, body: &str) -> Outcome {
    let ResponseStatus::Code(code) = status else {
        return Outcome::UnexpectedFailure;
    };

    match (operation, code) {
        (Operation::CreateUser | Operation::CreatePost, 200 | 201) => Outcome::Success,
        (Operation::CreateUser, 400) if body.contains(DUPLICATE_EMAIL) => Outcome::ExpectedFailure,
        (Operation::CreatePost, 404) if body.contains(USER_NOT_FOUND) => Outcome::ExpectedFailure,
        (Operation::GetUser | Operation::GetUserPosts, 404) => Outcome::ExpectedFailure,
        (
            Operation::ListUsers
            | Operation::GetUser
            | Operation::ListPosts
            | Operation::GetUserPosts
            | Operation::Benchmark,
            200,
        ) => Outcome::Success,
        _ => Outcome::UnexpectedFailure,
    }
}

/// Ids are integers on the SQL backends and UUID strings on EdgeDB; both are kept as strings.
fn created_id(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Send numeric ids back as JSON numbers so typed backends accept them.
fn id_value(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

fn log_benchmark(flavor: &str, body: &str) {
    let Ok(data) = serde_json::from_str::<Value>(body) else {
        warn!("Benchmark response from {flavor} is not JSON");
        return;
    };

    let figure = |key: &str| data.get(key).and_then(Value::as_f64);

    if let Some(average) = figure("average_conversion_time") {
        info!(
            "{} benchmark: average conversion time {:.4}s, {:.2} conversions/s",
            flavor.to_uppercase(),
            average,
            figure("conversions_per_second").unwrap_or_default()
        );
    } else if let Some(average) = figure("average_query_time") {
        info!(
            "{} benchmark: average query time {:.4}s, {:.2} queries/s",
            flavor.to_uppercase(),
            average,
            figure("queries_per_second").unwrap_or_default()
        );
    }
}

#[cfg(feature = "metrics")]
fn record_metrics(sample: &RequestSample) {
    let operation = sample.operation.as_str();
    metrics::histogram!("ormbench_request_latency", "operation" => operation)
        .record(sample.latency.as_secs_f64());

    if sample.outcome.is_failure() {
        metrics::counter!("ormbench_request_error", "operation" => operation).increment(1);
    } else {
        metrics::counter!("ormbench_request_success", "operation" => operation).increment(1);
    }
}
