//! In-process fake posts API used by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use posts_api_cache::PostApiClient;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN: &str = "ABC";

#[derive(Default)]
struct ServerState {
    posts: Vec<Value>,
    next_id: u64,
    requests: Vec<(Method, String)>,
    fail_writes: bool,
    read_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct FakePostsServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakePostsServer {
    /// Serve on an ephemeral loopback port, seeded with posts `1..=count`.
    pub async fn start(count: u64) -> (Self, SocketAddr) {
        let server = FakePostsServer::default();
        {
            let mut state = server.state.lock().expect("Failed to lock state");
            for id in 1..=count {
                state.posts.push(json!({
                    "id": id.to_string(),
                    "title": format!("Post {}", id),
                    "published": true,
                }));
            }
            state.next_id = count + 1;
        }

        let app = Router::new()
            .route("/posts", get(list_posts).post(add_post))
            .route(
                "/posts/{id}",
                get(get_post).put(update_post).delete(delete_post),
            )
            .with_state(server.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        (server, addr)
    }

    /// Number of requests seen for `method` on exactly `path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.state
            .lock()
            .expect("Failed to lock state")
            .requests
            .iter()
            .filter(|(m, p)| *m == method && p == path)
            .count()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().expect("Failed to lock state").fail_writes = fail;
    }

    pub fn delay_reads(&self, delay: Duration) {
        self.state.lock().expect("Failed to lock state").read_delay = Some(delay);
    }

    fn record(&self, method: Method, path: String, headers: &HeaderMap) -> Result<(), Response> {
        let mut state = self.state.lock().expect("Failed to lock state");
        state.requests.push((method, path));

        let expected = format!("Bearer {}", TOKEN);
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some(value) if value == expected => Ok(()),
            _ => Err((StatusCode::UNAUTHORIZED, "missing or bad token").into_response()),
        }
    }

    fn read_delay(&self) -> Option<Duration> {
        self.state.lock().expect("Failed to lock state").read_delay
    }

    fn failing(&self) -> bool {
        self.state.lock().expect("Failed to lock state").fail_writes
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn client_for(addr: SocketAddr) -> PostApiClient {
    PostApiClient::builder(format!("http://{}", addr))
        .with_token(TOKEN)
        .build()
        .expect("Failed to build client")
}

async fn list_posts(State(server): State<FakePostsServer>, headers: HeaderMap) -> Response {
    if let Err(rejection) = server.record(Method::GET, "/posts".to_string(), &headers) {
        return rejection;
    }
    if let Some(delay) = server.read_delay() {
        tokio::time::sleep(delay).await;
    }

    let posts = server.state.lock().expect("Failed to lock state").posts.clone();
    Json(posts).into_response()
}

async fn get_post(
    State(server): State<FakePostsServer>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = server.record(Method::GET, format!("/posts/{}", id), &headers) {
        return rejection;
    }
    if let Some(delay) = server.read_delay() {
        tokio::time::sleep(delay).await;
    }
    if id == "garbled" {
        return (StatusCode::OK, "this is not json").into_response();
    }

    let state = server.state.lock().expect("Failed to lock state");
    match state.posts.iter().find(|p| p["id"] == id.as_str()) {
        Some(post) => Json(post.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "post not found").into_response(),
    }
}

async fn add_post(
    State(server): State<FakePostsServer>,
    headers: HeaderMap,
    Json(body): Json<Map<String, Value>>,
) -> Response {
    if let Err(rejection) = server.record(Method::POST, "/posts".to_string(), &headers) {
        return rejection;
    }
    if server.failing() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "write failed").into_response();
    }

    let mut state = server.state.lock().expect("Failed to lock state");
    let mut post = body;
    post.insert("id".to_string(), Value::String(state.next_id.to_string()));
    state.next_id += 1;
    let post = Value::Object(post);
    state.posts.push(post.clone());
    (StatusCode::CREATED, Json(post)).into_response()
}

async fn update_post(
    State(server): State<FakePostsServer>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = server.record(Method::PUT, format!("/posts/{}", id), &headers) {
        return rejection;
    }
    if server.failing() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "write failed").into_response();
    }

    let mut state = server.state.lock().expect("Failed to lock state");
    match state.posts.iter_mut().find(|p| p["id"] == id.as_str()) {
        Some(post) => {
            *post = body;
            Json(post.clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "post not found").into_response(),
    }
}

async fn delete_post(
    State(server): State<FakePostsServer>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = server.record(Method::DELETE, format!("/posts/{}", id), &headers) {
        return rejection;
    }
    if server.failing() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "write failed").into_response();
    }

    let mut state = server.state.lock().expect("Failed to lock state");
    let before = state.posts.len();
    state.posts.retain(|p| p["id"] != id.as_str());
    if state.posts.len() == before {
        return (StatusCode::NOT_FOUND, "post not found").into_response();
    }
    Json(json!({})).into_response()
}
