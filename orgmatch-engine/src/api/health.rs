//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("orgmatch")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git hash captured by build.rs
    pub git_hash: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Active judgment oracle ("http", "disabled", ...)
    pub oracle: String,
    /// Active cache backend ("memory", "sqlite")
    pub cache_backend: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let usage = state.orchestrator.escalator().usage();
    let cache = state.orchestrator.cache().stats().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "orgmatch".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_seconds,
        oracle: usage.oracle,
        cache_backend: cache.backend,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
