//! In-memory backend serving the Users/Posts API that ormbench drives.
use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::debug;

const BENCHMARK_ITERATIONS: u32 = 100;

const BENCHMARK_KINDS: [(&str, &str); 3] = [
    ("sqlalchemy_v2", "sync-to-async"),
    ("tortoise", "native-async"),
    ("edgedb", "edgedb-native"),
];

#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Reported as `orm` by `/health`
    pub flavor: String,
    /// Added to every API request
    pub delay: Duration,
    /// Added to `/health` only
    pub health_delay: Duration,
    /// Answer every `POST /users` with `400 Email already exists`
    pub duplicate_emails: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            flavor: "tortoise".to_string(),
            delay: Duration::ZERO,
            health_delay: Duration::ZERO,
            duplicate_emails: false,
        }
    }
}

/// A running mock backend. Dropping the handle leaves the server running; call
/// [`MockServer::shutdown`] to stop it.
pub struct MockServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<io::Result<()>>,
}

impl MockServer {
    pub async fn start(addr: SocketAddr, config: MockConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let app = router(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        debug!("Mock service listening on {addr}");
        Ok(Self {
            addr,
            shutdown,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(self) -> io::Result<()> {
        let _ = self.shutdown.send(());
        self.handle
            .await
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
    }
}

pub fn router(config: MockConfig) -> Router {
    let state = Arc::new(AppState {
        config,
        store: Store::default(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id/posts", get(user_posts))
        .route("/posts", get(list_posts).post(create_post))
        .route("/benchmark/:kind", get(benchmark))
        .layer(middleware::from_fn_with_state(state.clone(), delay))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

struct AppState {
    config: MockConfig,
    store: Store,
}

type SharedState = State<Arc<AppState>>;

/** Store **/

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub user_id: u64,
}

#[derive(Default)]
struct Store {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<u64, User>,
    posts: BTreeMap<u64, Post>,
    next_id: u64,
}

impl Store {
    fn insert_user(&self, new: NewUser) -> Result<User, ApiError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if tables.users.values().any(|u| u.email == new.email) {
            return Err(ApiError(StatusCode::BAD_REQUEST, "Email already exists"));
        }

        tables.next_id += 1;
        let user = User {
            id: tables.next_id,
            name: new.name,
            email: new.email,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn insert_post(&self, new: NewPost) -> Result<Post, ApiError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if !tables.users.contains_key(&new.user_id) {
            return Err(ApiError(StatusCode::NOT_FOUND, "User not found"));
        }

        tables.next_id += 1;
        let post = Post {
            id: tables.next_id,
            title: new.title,
            content: new.content,
            user_id: new.user_id,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    fn user(&self, id: u64) -> Option<User> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.users.get(&id).cloned()
    }

    fn users(&self, page: &Page) -> Vec<User> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        page.apply(tables.users.values())
    }

    fn posts(&self, page: &Page, user_id: Option<u64>) -> Vec<Post> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let posts = tables
            .posts
            .values()
            .filter(|p| user_id.map_or(true, |id| p.user_id == id));
        page.apply(posts)
    }
}

/** Handlers **/

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct NewPost {
    title: String,
    content: String,
    user_id: u64,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    100
}

impl Page {
    fn apply<'a, T: Clone + 'a>(&self, items: impl Iterator<Item = &'a T>) -> Vec<T> {
        items.skip(self.skip).take(self.limit).cloned().collect()
    }
}

struct ApiError(StatusCode, &'static str);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

async fn delay(State(state): SharedState, request: Request, next: Next) -> Response {
    let delay = if request.uri().path() == "/health" {
        state.config.health_delay
    } else {
        state.config.delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    next.run(request).await
}

async fn health(State(state): SharedState) -> Json<Value> {
    Json(json!({ "status": "ok", "orm": state.config.flavor }))
}

async fn create_user(
    State(state): SharedState,
    Json(new): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if state.config.duplicate_emails {
        return Err(ApiError(StatusCode::BAD_REQUEST, "Email already exists"));
    }

    let user = state.store.insert_user(new)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(State(state): SharedState, Query(page): Query<Page>) -> Json<Vec<User>> {
    Json(state.store.users(&page))
}

async fn get_user(State(state): SharedState, Path(id): Path<u64>) -> Result<Json<User>, ApiError> {
    state
        .store
        .user(id)
        .map(Json)
        .ok_or(ApiError(StatusCode::NOT_FOUND, "User not found"))
}

async fn user_posts(
    State(state): SharedState,
    Path(id): Path<u64>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Post>>, ApiError> {
    if state.store.user(id).is_none() {
        return Err(ApiError(StatusCode::NOT_FOUND, "User not found"));
    }
    Ok(Json(state.store.posts(&page, Some(id))))
}

async fn create_post(
    State(state): SharedState,
    Json(new): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = state.store.insert_post(new)?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn list_posts(State(state): SharedState, Query(page): Query<Page>) -> Json<Vec<Post>> {
    Json(state.store.posts(&page, None))
}

async fn benchmark(
    State(state): SharedState,
    Path(kind): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let available = BENCHMARK_KINDS
        .iter()
        .any(|(flavor, k)| *flavor == state.config.flavor && *k == kind);
    if !available {
        return Err(ApiError(StatusCode::NOT_FOUND, "Benchmark not available"));
    }

    let page = Page {
        skip: 0,
        limit: 10,
    };
    let start = Instant::now();
    for _ in 0..BENCHMARK_ITERATIONS {
        let _ = state.store.users(&page);
    }
    let total = start.elapsed().as_secs_f64();
    let average = total / f64::from(BENCHMARK_ITERATIONS);
    let per_second = if total > 0. {
        f64::from(BENCHMARK_ITERATIONS) / total
    } else {
        0.
    };

    let body = if kind == "sync-to-async" {
        json!({
            "iterations": BENCHMARK_ITERATIONS,
            "total_time": total,
            "average_conversion_time": average,
            "conversions_per_second": per_second,
        })
    } else {
        json!({
            "iterations": BENCHMARK_ITERATIONS,
            "total_time": total,
            "average_query_time": average,
            "queries_per_second": per_second,
        })
    };

    Ok(Json(body))
}
