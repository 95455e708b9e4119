// Tier 2: Judgment Oracle Interface
//
// Concept: Pluggable source of semantic judgments (typically an LLM service)
// Synchronization: request structs in, raw JSON body out; validation happens
// in `validation`, never in adapters
//
// The oracle is untrusted: adapters hand back whatever JSON they received and
// the escalator decides whether it is usable.

use crate::resolution::types::{Candidate, OracleError, QueryContext, ScoreBreakdown, TokenUsage};
use async_trait::async_trait;
use serde::Serialize;

/// Ask the oracle whether a query names a candidate
#[derive(Debug, Clone, Serialize)]
pub struct MatchJudgmentRequest {
    pub query: String,
    pub candidate_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidate_aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_region: Option<String>,
    /// Fuzzy evidence already gathered, so the oracle can weigh it
    pub fuzzy_scores: ScoreBreakdown,
    #[serde(skip_serializing_if = "QueryContext::is_empty")]
    pub context: QueryContext,
}

impl MatchJudgmentRequest {
    pub fn new(
        query: &str,
        candidate: &Candidate,
        breakdown: &ScoreBreakdown,
        context: &QueryContext,
    ) -> Self {
        Self {
            query: query.to_string(),
            candidate_name: candidate.name.clone(),
            candidate_aliases: candidate.aliases.clone(),
            candidate_industry: candidate.industry.clone(),
            candidate_region: candidate.region.clone(),
            fuzzy_scores: breakdown.clone(),
            context: context.clone(),
        }
    }
}

/// One option in a choice request, addressed by its position
#[derive(Debug, Clone, Serialize)]
pub struct ChoiceOption {
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Ask the oracle to pick the best of several near-tied candidates
#[derive(Debug, Clone, Serialize)]
pub struct ChoiceRequest {
    pub query: String,
    pub options: Vec<ChoiceOption>,
    #[serde(skip_serializing_if = "QueryContext::is_empty")]
    pub context: QueryContext,
}

impl ChoiceRequest {
    pub fn new(query: &str, candidates: &[&Candidate], context: &QueryContext) -> Self {
        Self {
            query: query.to_string(),
            options: candidates
                .iter()
                .enumerate()
                .map(|(index, c)| ChoiceOption {
                    index,
                    name: c.name.clone(),
                    industry: c.industry.clone(),
                    region: c.region.clone(),
                })
                .collect(),
            context: context.clone(),
        }
    }
}

/// Unvalidated oracle reply
#[derive(Debug, Clone)]
pub struct OracleResponse {
    pub body: serde_json::Value,
    pub usage: Option<TokenUsage>,
}

/// Judgment oracle trait - adapters implement this
#[async_trait]
pub trait JudgmentOracle: Send + Sync {
    /// Oracle identifier for logs ("http", "disabled", ...)
    fn name(&self) -> &str;

    /// Expected body: `{confidence, match_type, reasoning, suggested_canonical_name?}`
    async fn judge_match(
        &self,
        request: &MatchJudgmentRequest,
    ) -> Result<OracleResponse, OracleError>;

    /// Expected body: `{selected_index, confidence, reasoning}`
    async fn choose_candidate(
        &self,
        request: &ChoiceRequest,
    ) -> Result<OracleResponse, OracleError>;
}

/// Oracle used when no endpoint is configured; every call takes the fallback path
#[derive(Debug, Clone, Default)]
pub struct DisabledOracle;

#[async_trait]
impl JudgmentOracle for DisabledOracle {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn judge_match(
        &self,
        _request: &MatchJudgmentRequest,
    ) -> Result<OracleResponse, OracleError> {
        Err(OracleError::Unavailable("oracle disabled".to_string()))
    }

    async fn choose_candidate(
        &self,
        _request: &ChoiceRequest,
    ) -> Result<OracleResponse, OracleError> {
        Err(OracleError::Unavailable("oracle disabled".to_string()))
    }
}
