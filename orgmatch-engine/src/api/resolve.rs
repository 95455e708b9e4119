//! Resolution endpoints
//!
//! - POST /resolve: one query, optional debug trace
//! - POST /resolve/batch: ordered queries in, ordered outcomes out
//! - POST /expand: structural query variants (diagnostics)

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::resolution::types::{Query, QueryVariant, Resolution};
use crate::AppState;

/// Upper bound on queries accepted by one batch call
pub const MAX_BATCH_QUERIES: usize = 1_000;

/// POST /resolve/batch request
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub queries: Vec<Query>,
}

/// POST /resolve/batch response; `results[i]` answers `queries[i]`
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<Resolution>,
    pub matched: usize,
    pub cancelled: bool,
}

/// POST /expand request
#[derive(Debug, Deserialize)]
pub struct ExpandRequest {
    pub name: String,
}

/// POST /expand response
#[derive(Debug, Serialize)]
pub struct ExpandResponse {
    pub name: String,
    pub normalized: String,
    pub variants: Vec<QueryVariant>,
}

/// POST /resolve
pub async fn resolve_one(
    State(state): State<AppState>,
    Json(query): Json<Query>,
) -> Json<Resolution> {
    Json(state.orchestrator.resolve(&query).await)
}

/// POST /resolve/batch
pub async fn resolve_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    if request.queries.len() > MAX_BATCH_QUERIES {
        return Err(ApiError::PayloadTooLarge(format!(
            "{} queries in one batch (max {})",
            request.queries.len(),
            MAX_BATCH_QUERIES
        )));
    }

    let cancel = state.shutdown.child_token();
    let results = state
        .orchestrator
        .resolve_batch_detailed(request.queries, &cancel)
        .await;

    let matched = results.iter().filter(|r| r.outcome.is_matched()).count();
    Ok(Json(BatchResponse {
        results,
        matched,
        cancelled: cancel.is_cancelled(),
    }))
}

/// POST /expand
pub async fn expand(
    State(state): State<AppState>,
    Json(request): Json<ExpandRequest>,
) -> ApiResult<Json<ExpandResponse>> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }

    let normalized = state.orchestrator.normalizer().normalize(&request.name);
    let variants = state.orchestrator.expander().expand(&request.name);

    Ok(Json(ExpandResponse {
        normalized: normalized.into_string(),
        variants,
        name: request.name,
    }))
}

/// Build resolution routes
pub fn resolve_routes() -> Router<AppState> {
    Router::new()
        .route("/resolve", post(resolve_one))
        .route("/resolve/batch", post(resolve_batch))
        .route("/expand", post(expand))
}
