// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook HTTP surface built on axum.
//!
//! `POST /webhook` queues the event for the dispatch pool and answers at
//! once; the dispatch itself is detached from the request. `GET /health`
//! is unauthenticated and meant for process supervisors.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::sync::mpsc;
use tower::limit::ConcurrencyLimitLayer;
use tracing::{debug, warn};

use parley_core::error::ParleyError;
use parley_core::types::InboundEvent;

/// Largest accepted webhook body.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Requests handled at once before axum applies backpressure.
const MAX_CONCURRENT_REQUESTS: usize = 512;

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    /// Producer side of the dispatch pool queue.
    pub events: mpsc::Sender<InboundEvent>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(events: mpsc::Sender<InboundEvent>) -> Self {
        Self {
            events,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    queue_available: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Builds the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(post_webhook))
        .route("/health", get(get_health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .with_state(state)
}

/// Binds `addr` and serves until `shutdown` completes.
pub async fn serve(
    addr: &str,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ParleyError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ParleyError::Config(format!("failed to bind webhook server to {addr}: {e}")))?;

    tracing::info!("webhook server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ParleyError::Internal(format!("webhook server error: {e}")))
}

/// POST /webhook
async fn post_webhook(State(state): State<AppState>, Json(event): Json<InboundEvent>) -> Response {
    let conversation_id = event.conversation.id;
    debug!(
        conversation_id,
        event = %event.event,
        "webhook event received"
    );

    match state.events.try_send(event) {
        Ok(()) => (StatusCode::OK, Json(Accepted { status: "accepted" })).into_response(),
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(conversation_id, "dispatch queue full, rejecting webhook event");
            unavailable("dispatch queue is full")
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            warn!(conversation_id, "dispatch pool stopped, rejecting webhook event");
            unavailable("shutting down")
        }
    }
}

fn unavailable(message: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// GET /health
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        queue_available: state.events.capacity(),
    })
}
