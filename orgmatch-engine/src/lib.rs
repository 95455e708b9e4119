//! orgmatch-engine library interface
//!
//! Exposes the resolution engine for embedding and integration testing, plus
//! the HTTP router used by the `orgmatch serve` binary.

pub mod api;
pub mod config;
pub mod error;
pub mod registry;
pub mod resolution;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use resolution::ResolutionOrchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared resolution engine
    pub orchestrator: Arc<ResolutionOrchestrator>,
    /// Cancelled on shutdown; in-flight batches stop between queries
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ResolutionOrchestrator>) -> Self {
        Self {
            orchestrator,
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::resolve_routes())
        .merge(api::cache_routes())
        .merge(api::health_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
