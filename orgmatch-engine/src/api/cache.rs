//! Cache and oracle usage endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::resolution::cache::CacheStats;
use crate::resolution::tier2::OracleUsage;
use crate::AppState;

/// Longest accepted eviction horizon (about a century)
const MAX_EVICT_DAYS: i64 = 36_500;

/// GET /cache/stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub oracle: OracleUsage,
}

/// POST /cache/evict request
#[derive(Debug, Deserialize)]
pub struct EvictRequest {
    /// Entries not matched within this many days are removed
    pub older_than_days: i64,
}

/// POST /cache/evict response
#[derive(Debug, Serialize)]
pub struct EvictResponse {
    pub evicted: u64,
    pub cutoff: String,
}

/// GET /cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache: state.orchestrator.cache().stats().await,
        oracle: state.orchestrator.escalator().usage(),
    })
}

/// POST /cache/evict
pub async fn evict(
    State(state): State<AppState>,
    Json(request): Json<EvictRequest>,
) -> ApiResult<Json<EvictResponse>> {
    if !(0..=MAX_EVICT_DAYS).contains(&request.older_than_days) {
        return Err(ApiError::BadRequest(format!(
            "older_than_days must be within 0..={}, got {}",
            MAX_EVICT_DAYS, request.older_than_days
        )));
    }

    let cutoff = Utc::now() - Duration::days(request.older_than_days);
    let evicted = state.orchestrator.cache().evict_older_than(cutoff).await?;
    info!(evicted = evicted, cutoff = %cutoff, "Cache eviction requested over HTTP");

    Ok(Json(EvictResponse {
        evicted,
        cutoff: cutoff.to_rfc3339(),
    }))
}

/// Build cache routes
pub fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(cache_stats))
        .route("/cache/evict", post(evict))
}
