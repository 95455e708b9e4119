// Resolution Orchestrator
//
// Concept: Drive one query through the tiers and produce exactly one outcome
// Synchronization: Query in, Resolution (MatchOutcome + optional DebugTrace) out
//
// State machine:
//   Start → CacheCheck ─hit→ CacheHit → Done
//                      └miss→ Retrieve ─empty→ ExpandAndRetry ─empty→ Done (NoMatch)
//                                     └────────────┴→ Score → Escalate → Disambiguate
//                                                     → CacheWrite (Matched only) → Done
//
// Every path reaches Done; the expansion round runs at most once.
// Batches: chunks of batch_chunk_size resolved concurrently, chunks in
// sequence; a cancelled token turns not-yet-started queries into NoMatch.

use crate::config::EngineConfig;
use crate::resolution::cache::{context_fingerprint, ExactMatchCache};
use crate::resolution::retrieval::{CandidateRetriever, RetrievalHints};
use crate::resolution::tier1::{FuzzyScorer, NameMemo, Normalizer, QueryExpander};
use crate::resolution::tier2::{AiEscalator, JudgmentOracle};
use crate::resolution::tier3::{Disambiguation, Disambiguator};
use crate::resolution::trace::TraceRecorder;
use crate::resolution::types::{
    Candidate, CandidateEvaluation, MatchOutcome, MatchType, NormalizedName, PotentialMatch,
    Query, QueryVariant, Resolution, ResolutionState, ScoreBreakdown, TierDecision,
    TraceEventKind, REASON_CANCELLED, REASON_EMPTY_QUERY, REASON_NONE_CLEARED,
    REASON_NO_CANDIDATES,
};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Candidate plus the expansion variant that surfaced it (if any)
type PooledCandidate = (Candidate, Option<QueryVariant>);

/// Resolution orchestrator; cheap to share behind `Arc`
pub struct ResolutionOrchestrator {
    config: EngineConfig,
    normalizer: Normalizer,
    scorer: FuzzyScorer,
    expander: QueryExpander,
    escalator: AiEscalator,
    disambiguator: Disambiguator,
    cache: Arc<ExactMatchCache>,
    retriever: Arc<dyn CandidateRetriever>,
}

impl ResolutionOrchestrator {
    /// Build an orchestrator, validating the configuration first
    ///
    /// # Errors
    /// `Error::Config` for invalid weights or thresholds.
    pub fn new(
        config: EngineConfig,
        retriever: Arc<dyn CandidateRetriever>,
        oracle: Arc<dyn JudgmentOracle>,
        cache: Arc<ExactMatchCache>,
    ) -> orgmatch_common::Result<Self> {
        config.validate()?;

        Ok(Self {
            normalizer: Normalizer::from_config(&config),
            scorer: FuzzyScorer::new(&config.scoring_weights)?,
            expander: QueryExpander::from_config(&config),
            escalator: AiEscalator::new(oracle, &config),
            disambiguator: Disambiguator::from_config(&config),
            cache,
            retriever,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn expander(&self) -> &QueryExpander {
        &self.expander
    }

    pub fn escalator(&self) -> &AiEscalator {
        &self.escalator
    }

    pub fn cache(&self) -> &Arc<ExactMatchCache> {
        &self.cache
    }

    /// Resolve a single query
    pub async fn resolve(&self, query: &Query) -> Resolution {
        let memo = NameMemo::new();
        self.resolve_with(query, &memo).await
    }

    /// Resolve a batch; one outcome per query, in input order
    pub async fn resolve_batch(
        &self,
        queries: Vec<Query>,
        cancel: &CancellationToken,
    ) -> Vec<MatchOutcome> {
        self.resolve_batch_detailed(queries, cancel)
            .await
            .into_iter()
            .map(|r| r.outcome)
            .collect()
    }

    /// Like [`Self::resolve_batch`], keeping any requested traces
    pub async fn resolve_batch_detailed(
        &self,
        queries: Vec<Query>,
        cancel: &CancellationToken,
    ) -> Vec<Resolution> {
        let started = Instant::now();
        let memo = NameMemo::new();
        let mut results = Vec::with_capacity(queries.len());

        for chunk in queries.chunks(self.config.batch_chunk_size.max(1)) {
            let pending = chunk.iter().map(|query| {
                let memo = &memo;
                async move {
                    if cancel.is_cancelled() {
                        return Resolution {
                            outcome: MatchOutcome::no_match(REASON_CANCELLED),
                            trace: None,
                        };
                    }
                    self.resolve_with(query, memo).await
                }
            });
            results.extend(join_all(pending).await);
        }

        let matched = results.iter().filter(|r| r.outcome.is_matched()).count();
        info!(
            queries = results.len(),
            matched = matched,
            cancelled = cancel.is_cancelled(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch resolved"
        );

        results
    }

    async fn resolve_with(&self, query: &Query, memo: &NameMemo) -> Resolution {
        let mut trace = TraceRecorder::new(&query.name, query.debug || self.config.debug_trace);

        trace.enter(ResolutionState::Start);
        let normalized = memo.normalize(&self.normalizer, &query.name);
        trace.record(TraceEventKind::Normalized {
            normalized: normalized.to_string(),
        });

        let outcome = if normalized.is_empty() {
            MatchOutcome::no_match(REASON_EMPTY_QUERY)
        } else {
            self.run(query, &normalized, memo, &mut trace).await
        };

        trace.enter(ResolutionState::Done);
        info!(
            resolution_id = %trace.resolution_id(),
            query = %query.name,
            outcome = outcome.label(),
            entity_id = outcome.matched_id().unwrap_or("-"),
            elapsed_ms = trace.elapsed_ms(),
            "Query resolved"
        );

        Resolution {
            outcome,
            trace: trace.finish(),
        }
    }

    async fn run(
        &self,
        query: &Query,
        normalized: &NormalizedName,
        memo: &NameMemo,
        trace: &mut TraceRecorder,
    ) -> MatchOutcome {
        let fingerprint = context_fingerprint(&query.context);

        if !query.skip_cache {
            trace.enter(ResolutionState::CacheCheck);
            if let Some(outcome) = self
                .check_cache(normalized, fingerprint.as_deref(), trace)
                .await
            {
                trace.enter(ResolutionState::CacheHit);
                return outcome;
            }
        }

        trace.enter(ResolutionState::Retrieve);
        let hints = RetrievalHints::from(&query.context);
        let mut pool: Vec<PooledCandidate> = self
            .retrieve(&query.name, &hints, None, trace)
            .await
            .into_iter()
            .map(|c| (c, None))
            .collect();

        if pool.is_empty() {
            trace.enter(ResolutionState::ExpandAndRetry);
            pool = self.expand_and_retry(&query.name, &hints, trace).await;
            if pool.is_empty() {
                return MatchOutcome::no_match(REASON_NO_CANDIDATES);
            }
        }

        trace.enter(ResolutionState::Score);
        let mut evaluations: Vec<CandidateEvaluation> = pool
            .into_iter()
            .map(|(candidate, variant)| self.evaluate(normalized, candidate, variant, memo))
            .collect();
        for e in &evaluations {
            trace.record(TraceEventKind::Scored {
                candidate_id: e.candidate.id.clone(),
                breakdown: e.breakdown.clone(),
            });
        }

        trace.enter(ResolutionState::Escalate);
        self.escalate(query, &mut evaluations, trace).await;
        for e in &evaluations {
            trace.record(TraceEventKind::Decided {
                candidate_id: e.candidate.id.clone(),
                decision: e.decision,
                blended: e.blended,
            });
        }

        trace.enter(ResolutionState::Disambiguate);
        let survivors: Vec<CandidateEvaluation> = evaluations
            .into_iter()
            .filter(|e| e.decision != TierDecision::Rejected)
            .collect();
        let outcome = match self
            .disambiguator
            .disambiguate(&query.name, &query.context, survivors, &self.escalator)
            .await
        {
            Disambiguation::Selected(selection) => {
                trace.record(TraceEventKind::Disambiguated {
                    method: selection.method.as_str().to_string(),
                    selected: Some(selection.evaluation.candidate.id.clone()),
                });
                MatchOutcome::Matched {
                    confidence: selection.confidence(),
                    match_type: selection.evaluation.match_type(),
                    candidate: selection.evaluation.candidate,
                }
            }
            Disambiguation::NoneCleared => {
                trace.record(TraceEventKind::Disambiguated {
                    method: "none_cleared".to_string(),
                    selected: None,
                });
                MatchOutcome::no_match(REASON_NONE_CLEARED)
            }
            Disambiguation::Unresolved(contenders) => {
                trace.record(TraceEventKind::Disambiguated {
                    method: "unresolved".to_string(),
                    selected: None,
                });
                MatchOutcome::PotentialMatches {
                    candidates: contenders
                        .into_iter()
                        .map(|e| PotentialMatch {
                            confidence: e.blended,
                            candidate: e.candidate,
                        })
                        .collect(),
                }
            }
        };

        if let MatchOutcome::Matched {
            candidate,
            confidence,
            ..
        } = &outcome
        {
            trace.enter(ResolutionState::CacheWrite);
            let written = self
                .cache
                .record(normalized, fingerprint.as_deref(), &candidate.id, *confidence)
                .await;
            trace.record(TraceEventKind::CacheWrite {
                entity_id: candidate.id.clone(),
                written,
            });
        }

        outcome
    }

    /// A still-valid cache entry whose entity still exists ends the resolution
    async fn check_cache(
        &self,
        normalized: &NormalizedName,
        fingerprint: Option<&str>,
        trace: &mut TraceRecorder,
    ) -> Option<MatchOutcome> {
        let entry = self.cache.lookup(normalized, fingerprint).await;
        trace.record(TraceEventKind::CacheLookup {
            hit: entry.is_some(),
            entity_id: entry.as_ref().map(|e| e.entity_id.clone()),
            confidence: entry.as_ref().map(|e| e.confidence),
        });

        let entry = entry.filter(|e| e.confidence >= self.config.match_threshold)?;

        let candidate = match self.retriever.fetch(&entry.entity_id).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                debug!(entity_id = %entry.entity_id, "Cached entity no longer in registry");
                return None;
            }
            Err(e) => {
                warn!(error = %e, entity_id = %entry.entity_id, "Cached entity fetch failed");
                return None;
            }
        };

        // A hit is a re-match: reinforce the entry
        self.cache
            .record(normalized, fingerprint, &entry.entity_id, entry.confidence)
            .await;

        Some(MatchOutcome::Matched {
            candidate,
            confidence: entry.confidence,
            match_type: MatchType::Exact,
        })
    }

    /// Retrieval errors degrade to an empty set
    async fn retrieve(
        &self,
        text: &str,
        hints: &RetrievalHints,
        variant: Option<&QueryVariant>,
        trace: &mut TraceRecorder,
    ) -> Vec<Candidate> {
        let candidates = match self
            .retriever
            .search(text, hints, self.config.retrieval_limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, query = %text, "Retrieval failed, continuing with no candidates");
                Vec::new()
            }
        };

        trace.record(TraceEventKind::Retrieved {
            query: text.to_string(),
            candidates: candidates.len(),
            signal: variant.map(|v| v.signal),
        });

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect()
    }

    /// One expansion round: each variant retrieved once, results unioned by id
    async fn expand_and_retry(
        &self,
        raw: &str,
        hints: &RetrievalHints,
        trace: &mut TraceRecorder,
    ) -> Vec<PooledCandidate> {
        let variants = self.expander.expand(raw);
        debug!(query = %raw, variants = variants.len(), "No candidates, expanding query");

        let mut pool: Vec<PooledCandidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for variant in variants {
            let found = self.retrieve(&variant.text, hints, Some(&variant), trace).await;
            for candidate in found {
                if seen.insert(candidate.id.clone()) {
                    pool.push((candidate, Some(variant.clone())));
                }
            }
        }
        pool
    }

    /// Score a candidate by its best form (name, aliases, known queries)
    fn evaluate(
        &self,
        normalized: &NormalizedName,
        candidate: Candidate,
        variant: Option<QueryVariant>,
        memo: &NameMemo,
    ) -> CandidateEvaluation {
        let forms: Vec<NormalizedName> = std::iter::once(&candidate.name)
            .chain(candidate.aliases.iter())
            .map(|raw| memo.normalize(&self.normalizer, raw))
            .chain(
                candidate
                    .known_queries
                    .iter()
                    .map(NormalizedName::assume_normalized),
            )
            .filter(|form| !form.is_empty())
            .collect();

        let exact_form = forms.iter().any(|form| form == normalized);

        let mut query_forms = vec![normalized.clone()];
        if let Some(v) = &variant {
            let variant_form = memo.normalize(&self.normalizer, &v.text);
            if !variant_form.is_empty() && variant_form != *normalized {
                query_forms.push(variant_form);
            }
        }

        let breakdown = query_forms
            .iter()
            .flat_map(|q| forms.iter().map(move |f| (q, f)))
            .map(|(q, f)| self.scorer.score(q, f))
            .fold(None::<ScoreBreakdown>, |best, b| match best {
                Some(best) if best.composite >= b.composite => Some(best),
                _ => Some(b),
            })
            .unwrap_or_else(|| {
                let name = memo.normalize(&self.normalizer, &candidate.name);
                self.scorer.score(normalized, &name)
            });

        let fuzzy = breakdown.fuzzy_confidence();
        CandidateEvaluation {
            decision: self.escalator.decide(fuzzy),
            blended: fuzzy,
            candidate,
            breakdown,
            via_variant: variant,
            exact_form,
            judgment: None,
        }
    }

    /// Consult the oracle for every escalated candidate, concurrently
    async fn escalate(
        &self,
        query: &Query,
        evaluations: &mut [CandidateEvaluation],
        trace: &mut TraceRecorder,
    ) {
        let judged = {
            let calls = evaluations
                .iter()
                .enumerate()
                .filter(|(_, e)| e.decision == TierDecision::Escalated)
                .map(|(index, e)| async move {
                    let started = Instant::now();
                    let judgment = self
                        .escalator
                        .judge(&query.name, &e.candidate, &e.breakdown, &query.context)
                        .await;
                    (index, judgment, started.elapsed().as_secs_f64() * 1000.0)
                });
            join_all(calls).await
        };

        for (index, judgment, latency_ms) in judged {
            let evaluation = &mut evaluations[index];
            trace.record(TraceEventKind::OracleCall {
                candidate_id: Some(evaluation.candidate.id.clone()),
                latency_ms,
                fallback: judgment.fallback,
            });
            evaluation.blended = self
                .escalator
                .blend(evaluation.breakdown.fuzzy_confidence(), &judgment);
            evaluation.judgment = Some(judgment);
        }
    }
}
