//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when storage answers, `degraded` otherwise.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Whether the storage backend answered a ping.
    pub storage: bool,
    /// Whether a language model client is configured.
    pub ai: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let storage = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Storage ping failed");
            false
        }
    };

    Json(HealthResponse {
        status: if storage { "ok" } else { "degraded" }.to_string(),
        service: "nutricoach".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage,
        ai: state.has_ai(),
    })
}
