//! Relay HTTP API.
//!
//! - POST /prompt-stream
//! - GET /health

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::error::RelayError;
use crate::relay::service::StreamRelay;
use crate::relay::types::PromptStreamRequest;
use crate::server::streaming::text_stream_response;

/// Application state shared across handlers.
pub struct AppState {
    pub relay: StreamRelay,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(relay: StreamRelay) -> Self {
        Self {
            relay,
            start_time: Instant::now(),
        }
    }
}

/// Build the axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/prompt-stream", post(prompt_stream))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub model: String,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn prompt_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("prompt_stream", request_id = %request_id);

    async move {
        let request = PromptStreamRequest::from_body(is_json(&headers), &body)?;
        let body = state.relay.handle(request, &request_id).await?;
        Ok::<_, RelayError>(text_stream_response(body))
    }
    .instrument(span)
    .await
}

/// Whether the request declares a JSON body (`application/json` or `application/*+json`).
fn is_json(headers: &HeaderMap) -> bool {
    let Some(mime) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
    else {
        return false;
    };

    let mime = mime.trim().to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        model: state.relay.model().to_string(),
    })
}
