//! HTTP control API for the narration core.
//!
//! The web dashboard drives narration through these endpoints; the core
//! itself has no UI. Runs on a local port using axum.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::broadcast::BroadcastManager;
use crate::diagnosis::DiagnosisResult;
use crate::history::{self, BroadcastRecord};

#[derive(Clone)]
pub struct ApiState {
    pub manager: BroadcastManager,
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct BroadcastRequest {
    #[serde(default = "default_language")]
    language: String,
    #[serde(flatten)]
    result: DiagnosisResult,
}

fn default_language() -> String {
    "zh-CN".to_string()
}

#[derive(Serialize)]
struct StatusResponse {
    state: String,
    language: Option<String>,
    voice: Option<String>,
    current: usize,
    total: usize,
}

#[derive(Serialize)]
struct SimpleResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SimpleResponse {
    fn ok(status: &str) -> Self {
        Self {
            status: status.into(),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            error: Some(message.into()),
        }
    }
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/broadcast", post(handle_broadcast))
        .route("/pause", post(handle_pause))
        .route("/resume", post(handle_resume))
        .route("/stop", post(handle_stop))
        .route("/history", get(handle_history))
        .with_state(state)
}

/// Start the control API server as a background tokio task.
pub async fn start_api(state: ApiState, port: u16) {
    let app = router(state);
    let addr = format!("127.0.0.1:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind control API on {addr}: {e}");
            return;
        }
    };
    info!("Control API listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Control API server error: {e}");
        }
    });
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    match state.manager.status().await {
        Some(snapshot) => Json(StatusResponse {
            state: snapshot.state.to_string(),
            language: snapshot.language,
            voice: snapshot.voice,
            current: snapshot.current,
            total: snapshot.total,
        }),
        None => Json(StatusResponse {
            state: "UNAVAILABLE".into(),
            language: None,
            voice: None,
            current: 0,
            total: 0,
        }),
    }
}

async fn handle_broadcast(
    State(state): State<ApiState>,
    Json(req): Json<BroadcastRequest>,
) -> Json<SimpleResponse> {
    if req.result.is_empty() {
        return Json(SimpleResponse::err("empty diagnosis result"));
    }

    info!("HTTP /broadcast: language={}", req.language);
    state.manager.start(req.result, &req.language).await;
    Json(SimpleResponse::ok("preparing"))
}

async fn handle_pause(State(state): State<ApiState>) -> Json<SimpleResponse> {
    state.manager.pause().await;
    Json(SimpleResponse::ok("paused"))
}

async fn handle_resume(State(state): State<ApiState>) -> Json<SimpleResponse> {
    state.manager.resume().await;
    Json(SimpleResponse::ok("resumed"))
}

async fn handle_stop(State(state): State<ApiState>) -> Json<SimpleResponse> {
    state.manager.stop().await;
    Json(SimpleResponse::ok("stopped"))
}

async fn handle_history(State(_state): State<ApiState>) -> Json<Vec<BroadcastRecord>> {
    Json(history::load_records("today"))
}
