// Tier 2: AI Escalator
//
// Concept: Consult the judgment oracle for candidates the fuzzy tier cannot
// decide, and fuse its answer with the fuzzy score
// Synchronization: (query, Candidate, ScoreBreakdown, QueryContext) in,
// AiJudgment out; `judge` never returns an error
//
// Gate (fuzzy confidence = composite / 100):
//   fuzzy >= uncertain_band_high  → Accepted, no oracle call
//   fuzzy <= uncertain_band_low   → Rejected, no oracle call
//   otherwise                     → Escalated
//
// Every call is bounded by a semaphore (max_concurrent_ai_calls) and a
// timeout (ai_call_timeout_ms). A timeout is treated as a failure.

use crate::config::EngineConfig;
use crate::resolution::tier2::oracle::{
    ChoiceRequest, JudgmentOracle, MatchJudgmentRequest, OracleResponse,
};
use crate::resolution::tier2::validation::{parse_choice, parse_judgment};
use crate::resolution::types::{
    AiJudgment, AiMatchType, Candidate, ChoiceJudgment, OracleError, QueryContext,
    ScoreBreakdown, TierDecision, TokenUsage,
};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Snapshot of oracle usage since the escalator was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OracleUsage {
    pub oracle: String,
    pub calls: u64,
    pub failures: u64,
    pub out_of_range_selections: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_latency_ms: u64,
}

#[derive(Debug, Default)]
struct UsageCounters {
    calls: AtomicU64,
    failures: AtomicU64,
    out_of_range_selections: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl UsageCounters {
    fn record(&self, latency: Duration, usage: Option<TokenUsage>, failed: bool) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(usage) = usage {
            self.input_tokens
                .fetch_add(usage.input_tokens, Ordering::Relaxed);
            self.output_tokens
                .fetch_add(usage.output_tokens, Ordering::Relaxed);
        }
        self.total_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
    }
}

/// AI escalator (Tier 2 concept)
pub struct AiEscalator {
    oracle: Arc<dyn JudgmentOracle>,
    permits: Semaphore,
    timeout: Duration,
    band_low: f64,
    band_high: f64,
    fuzzy_blend_weight: f64,
    fallback_confidence: f64,
    counters: UsageCounters,
}

impl AiEscalator {
    pub fn new(oracle: Arc<dyn JudgmentOracle>, config: &EngineConfig) -> Self {
        Self {
            oracle,
            permits: Semaphore::new(config.max_concurrent_ai_calls.max(1)),
            timeout: config.ai_call_timeout(),
            band_low: config.uncertain_band_low,
            band_high: config.uncertain_band_high,
            fuzzy_blend_weight: config.fuzzy_blend_weight,
            fallback_confidence: config.oracle_fallback_confidence,
            counters: UsageCounters::default(),
        }
    }

    /// Confidence gate for a fuzzy confidence in [0, 1]
    pub fn decide(&self, fuzzy_confidence: f64) -> TierDecision {
        if fuzzy_confidence >= self.band_high {
            TierDecision::Accepted
        } else if fuzzy_confidence <= self.band_low {
            TierDecision::Rejected
        } else {
            TierDecision::Escalated
        }
    }

    /// Final per-candidate confidence once the oracle has been consulted
    pub fn blend(&self, fuzzy_confidence: f64, judgment: &AiJudgment) -> f64 {
        let w = self.fuzzy_blend_weight;
        (w * fuzzy_confidence + (1.0 - w) * judgment.confidence).clamp(0.0, 1.0)
    }

    /// Conservative default used whenever the oracle cannot be trusted
    pub fn fallback_judgment(&self, reason: &str) -> AiJudgment {
        AiJudgment {
            confidence: self.fallback_confidence,
            match_type: AiMatchType::Unlikely,
            reasoning: format!("oracle unavailable: {}", reason),
            suggested_canonical_name: None,
            fallback: true,
        }
    }

    /// Ask the oracle whether `query` names `candidate`
    ///
    /// Never fails: any oracle problem yields [`Self::fallback_judgment`].
    pub async fn judge(
        &self,
        query: &str,
        candidate: &Candidate,
        breakdown: &ScoreBreakdown,
        context: &QueryContext,
    ) -> AiJudgment {
        let request = MatchJudgmentRequest::new(query, candidate, breakdown, context);
        let started = Instant::now();
        let outcome = self.bounded(self.oracle.judge_match(&request)).await;
        let latency = started.elapsed();

        let (judgment, usage) = match outcome {
            Ok(response) => match parse_judgment(&response.body) {
                Ok(judgment) => (judgment, response.usage),
                Err(e) => (self.fallback_for(&candidate.id, e), response.usage),
            },
            Err(e) => (self.fallback_for(&candidate.id, e), None),
        };

        self.counters.record(latency, usage, judgment.fallback);
        debug!(
            oracle = self.oracle.name(),
            candidate_id = %candidate.id,
            latency_ms = latency.as_millis() as u64,
            confidence = judgment.confidence,
            match_type = ?judgment.match_type,
            fallback = judgment.fallback,
            "Oracle judgment"
        );

        judgment
    }

    /// Ask the oracle to pick one of several near-tied candidates
    ///
    /// An out-of-range index is recovered as index 0 (the leader). Any other
    /// oracle problem is returned so the caller can report the tie.
    pub async fn choose(
        &self,
        query: &str,
        candidates: &[&Candidate],
        context: &QueryContext,
    ) -> Result<ChoiceJudgment, OracleError> {
        if candidates.is_empty() {
            return Err(OracleError::Unavailable("no options to choose from".to_string()));
        }

        let request = ChoiceRequest::new(query, candidates, context);
        let started = Instant::now();
        let outcome = self.bounded(self.oracle.choose_candidate(&request)).await;
        let latency = started.elapsed();

        let (parsed, usage) = match outcome {
            Ok(response) => (parse_choice(&response.body), response.usage),
            Err(e) => (Err(e), None),
        };
        self.counters.record(latency, usage, parsed.is_err());

        let parsed = parsed.map_err(|e| {
            warn!(
                oracle = self.oracle.name(),
                error = %e,
                "Oracle choice failed"
            );
            e
        })?;

        let confidence = parsed.confidence;
        let reasoning = parsed.reasoning.clone();
        match parsed.into_judgment(candidates.len()) {
            Ok(choice) => Ok(choice),
            Err(out_of_range) => {
                self.counters
                    .out_of_range_selections
                    .fetch_add(1, Ordering::Relaxed);
                warn!(error = %out_of_range, "Defaulting to top-scored candidate");
                Ok(ChoiceJudgment {
                    selected_index: 0,
                    confidence,
                    reasoning,
                })
            }
        }
    }

    pub fn usage(&self) -> OracleUsage {
        OracleUsage {
            oracle: self.oracle.name().to_string(),
            calls: self.counters.calls.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            out_of_range_selections: self
                .counters
                .out_of_range_selections
                .load(Ordering::Relaxed),
            input_tokens: self.counters.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.counters.output_tokens.load(Ordering::Relaxed),
            total_latency_ms: self.counters.total_latency_ms.load(Ordering::Relaxed),
        }
    }

    /// Run an oracle call under the concurrency limit and timeout
    async fn bounded<F>(&self, call: F) -> Result<OracleResponse, OracleError>
    where
        F: Future<Output = Result<OracleResponse, OracleError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| OracleError::Unavailable("escalator shut down".to_string()))?;

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        }
    }

    fn fallback_for(&self, candidate_id: &str, error: OracleError) -> AiJudgment {
        warn!(
            oracle = self.oracle.name(),
            candidate_id = %candidate_id,
            error = %error,
            "Oracle judgment failed, using fallback"
        );
        self.fallback_judgment(&error.to_string())
    }
}
