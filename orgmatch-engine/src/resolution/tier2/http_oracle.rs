// Tier 2: HTTP Judgment Oracle
//
// Concept: JSON-over-HTTP adapter for a remote judgment service
// Synchronization: POST {endpoint}/judge and {endpoint}/choose, raw JSON back
//
// Integrity: token-bucket rate limit shared by all calls through one client;
// connect and request timeouts enforced by the HTTP client itself, on top of
// the escalator's own per-call timeout.

use crate::config::{EngineConfig, OracleConfig};
use crate::resolution::tier2::oracle::{
    ChoiceRequest, JudgmentOracle, MatchJudgmentRequest, OracleResponse,
};
use crate::resolution::types::{OracleError, TokenUsage};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use orgmatch_common::{Error, Result};
use reqwest::Client;
use serde::Serialize;
use std::num::NonZeroU32;
use std::time::Duration;

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Remote judgment service client (Tier 2 oracle adapter)
pub struct HttpJudgmentOracle {
    client: Client,
    /// Base URL without trailing slash
    endpoint: String,
    api_key: Option<String>,
    user_agent: String,
    rate_limiter: DirectRateLimiter,
}

impl HttpJudgmentOracle {
    /// Create a client for `endpoint`
    ///
    /// # Errors
    /// `Error::Config` for a zero rate limit or an HTTP client that cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        requests_per_second: u32,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            Error::Config("oracle.requests_per_second must be at least 1".to_string())
        })?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            user_agent: orgmatch_common::config::user_agent(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Create from the `[oracle]` table; API key resolved env-first
    pub fn from_config(oracle: &OracleConfig, engine: &EngineConfig) -> Result<Self> {
        let endpoint = oracle
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| Error::Config("oracle.endpoint is not set".to_string()))?;

        Self::new(
            endpoint,
            oracle.resolve_api_key(),
            oracle.requests_per_second,
            Duration::from_millis(oracle.connect_timeout_ms),
            engine.ai_call_timeout(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        payload: &T,
    ) -> std::result::Result<OracleResponse, OracleError> {
        // Waits (async) until the token bucket has a permit
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.endpoint, path);
        tracing::debug!(url = %url, "Calling judgment oracle");

        let mut request = self
            .client
            .post(&url)
            .header("User-Agent", &self.user_agent)
            .json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("response is not JSON: {}", e)))?;

        let usage = body
            .get("usage")
            .and_then(|u| serde_json::from_value::<TokenUsage>(u.clone()).ok());

        Ok(OracleResponse { body, usage })
    }
}

#[async_trait]
impl JudgmentOracle for HttpJudgmentOracle {
    fn name(&self) -> &str {
        "http"
    }

    async fn judge_match(
        &self,
        request: &MatchJudgmentRequest,
    ) -> std::result::Result<OracleResponse, OracleError> {
        self.post("judge", request).await
    }

    async fn choose_candidate(
        &self,
        request: &ChoiceRequest,
    ) -> std::result::Result<OracleResponse, OracleError> {
        self.post("choose", request).await
    }
}
