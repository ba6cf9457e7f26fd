#![allow(dead_code)]

use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use model_bootstrap::OllamaClient;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::{net::TcpListener, task::JoinHandle};

/// Knobs and recorded calls for the in-process stand-in of the backing service.
#[derive(Default)]
pub struct MockState {
    pub cached: Mutex<HashSet<String>>,
    pub broken: HashSet<String>,
    pub tags_down: bool,
    pub version_down: bool,
    pub pulls: Mutex<Vec<String>>,
}

impl MockState {
    pub fn with_cached(models: &[&str]) -> Self {
        Self {
            cached: Mutex::new(models.iter().map(|m| m.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().clone()
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start(state: MockState) -> Self {
        let state = Arc::new(state);
        let router = Router::new()
            .route("/api/tags", get(tags))
            .route("/api/version", get(version))
            .route("/api/pull", post(pull))
            .route("/api/generate", post(generate))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> OllamaClient {
        OllamaClient::new(self.url(), Duration::from_secs(2)).unwrap()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An address nothing is listening on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn tags(State(state): State<Arc<MockState>>) -> Response {
    if state.tags_down {
        return error(StatusCode::SERVICE_UNAVAILABLE, "store not loaded");
    }
    let models: Vec<Value> = state
        .cached
        .lock()
        .iter()
        .map(|name| json!({ "name": name, "model": name, "size": 1024 }))
        .collect();
    Json(json!({ "models": models })).into_response()
}

async fn version(State(state): State<Arc<MockState>>) -> Response {
    if state.version_down {
        return error(StatusCode::NOT_FOUND, "not found");
    }
    Json(json!({ "version": "0.5.7" })).into_response()
}

async fn pull(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let model = body["model"].as_str().unwrap_or_default().to_string();
    state.pulls.lock().push(model.clone());
    if state.broken.contains(&model) {
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "pull model manifest: file does not exist",
        );
    }
    state.cached.lock().insert(model);
    Json(json!({ "status": "success" })).into_response()
}

async fn generate(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let model = body["model"].as_str().unwrap_or_default();
    if !state.cached.lock().contains(model) {
        return error(
            StatusCode::NOT_FOUND,
            &format!("model '{model}' not found, try pulling it first"),
        );
    }
    let prompt = body["prompt"].as_str().unwrap_or_default();
    Json(json!({
        "model": model,
        "response": format!(" echo: {prompt} "),
        "done": true,
        "eval_count": 10,
        "eval_duration": 500_000_000u64,
    }))
    .into_response()
}
