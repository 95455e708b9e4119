//! Shared test doubles: scripted oracle and retriever, engine builders

#![allow(dead_code)]

use async_trait::async_trait;
use orgmatch_engine::config::EngineConfig;
use orgmatch_engine::registry::InMemoryRegistry;
use orgmatch_engine::resolution::cache::ExactMatchCache;
use orgmatch_engine::resolution::retrieval::{CandidateRetriever, RetrievalHints};
use orgmatch_engine::resolution::tier2::{
    ChoiceRequest, JudgmentOracle, MatchJudgmentRequest, OracleResponse,
};
use orgmatch_engine::resolution::types::{Candidate, OracleError, RetrievalError};
use orgmatch_engine::resolution::ResolutionOrchestrator;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Oracle answering from a script keyed by candidate name
#[derive(Default)]
pub struct ScriptedOracle {
    judgments: HashMap<String, Value>,
    choice: Option<Value>,
    failing: bool,
    judge_calls: AtomicUsize,
    choose_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as unavailable
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_judgment(
        mut self,
        candidate_name: &str,
        confidence: f64,
        match_type: &str,
    ) -> Self {
        self.judgments.insert(
            candidate_name.to_string(),
            json!({
                "confidence": confidence,
                "match_type": match_type,
                "reasoning": format!("scripted {}", match_type),
            }),
        );
        self
    }

    pub fn with_choice(mut self, index: i64, confidence: f64) -> Self {
        self.choice = Some(json!({
            "selected_index": index,
            "confidence": confidence,
            "reasoning": "scripted choice",
        }));
        self
    }

    pub fn judge_calls(&self) -> usize {
        self.judge_calls.load(Ordering::SeqCst)
    }

    pub fn choose_calls(&self) -> usize {
        self.choose_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JudgmentOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn judge_match(
        &self,
        request: &MatchJudgmentRequest,
    ) -> Result<OracleResponse, OracleError> {
        self.judge_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(OracleError::Unavailable("scripted outage".to_string()));
        }
        let body = self
            .judgments
            .get(&request.candidate_name)
            .cloned()
            .unwrap_or_else(|| {
                json!({"confidence": 0.1, "match_type": "unlikely", "reasoning": "unscripted"})
            });
        Ok(OracleResponse { body, usage: None })
    }

    async fn choose_candidate(
        &self,
        _request: &ChoiceRequest,
    ) -> Result<OracleResponse, OracleError> {
        self.choose_calls.fetch_add(1, Ordering::SeqCst);
        match (&self.choice, self.failing) {
            (Some(body), false) => Ok(OracleResponse {
                body: body.clone(),
                usage: None,
            }),
            _ => Err(OracleError::Unavailable("no scripted choice".to_string())),
        }
    }
}

/// Retriever answering from a table keyed by lower-cased query text
#[derive(Default)]
pub struct TableRetriever {
    answers: HashMap<String, Vec<Candidate>>,
    searches: AtomicUsize,
}

impl TableRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, query: &str, candidates: Vec<Candidate>) -> Self {
        self.answers.insert(query.to_lowercase(), candidates);
        self
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateRetriever for TableRetriever {
    async fn search(
        &self,
        query: &str,
        _hints: &RetrievalHints,
        limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .answers
            .get(&query.to_lowercase())
            .map(|found| found.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Candidate>, RetrievalError> {
        Ok(self
            .answers
            .values()
            .flatten()
            .find(|c| c.id == id)
            .cloned())
    }
}

/// Retriever whose backend is always down
pub struct BrokenRetriever;

#[async_trait]
impl CandidateRetriever for BrokenRetriever {
    async fn search(
        &self,
        _query: &str,
        _hints: &RetrievalHints,
        _limit: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        Err(RetrievalError::Unavailable("index offline".to_string()))
    }

    async fn fetch(&self, _id: &str) -> Result<Option<Candidate>, RetrievalError> {
        Err(RetrievalError::Unavailable("index offline".to_string()))
    }
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Registry loaded from tests/fixtures/registry.json
pub fn fixture_registry() -> InMemoryRegistry {
    InMemoryRegistry::from_json_file(&fixture_path("registry.json")).unwrap()
}

/// Orchestrator with an in-memory cache (returned for inspection)
pub fn engine(
    config: EngineConfig,
    retriever: Arc<dyn CandidateRetriever>,
    oracle: Arc<dyn JudgmentOracle>,
) -> (ResolutionOrchestrator, Arc<ExactMatchCache>) {
    let cache = Arc::new(ExactMatchCache::in_memory(config.min_cache_confidence));
    let orchestrator =
        ResolutionOrchestrator::new(config, retriever, oracle, Arc::clone(&cache)).unwrap();
    (orchestrator, cache)
}

/// Two same-named entities in different regions
pub fn acme_twins() -> Vec<Candidate> {
    vec![
        Candidate::new("acme-1", "Acme").with_region("US"),
        Candidate::new("acme-2", "Acme").with_region("EMEA"),
    ]
}
