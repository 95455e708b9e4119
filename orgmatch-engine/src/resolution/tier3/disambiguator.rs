// Tier 3: Disambiguator
//
// Concept: Pick one entity when several candidates survive scoring
// Synchronization: Vec<CandidateEvaluation> (with blended confidences) in,
// Disambiguation out
//
// Algorithm:
// 1. Order by blended confidence, descending (stable)
// 2. None clears match_threshold → NoneCleared
// 3. One clears → that candidate
// 4. Several clear, runner-up further than separation_band from the leader → leader
// 5. Near tie: contenders are every clearing candidate within the band of the
//    leader. A single contender agreeing with the query context (industry or
//    region) wins; otherwise the oracle chooses. Oracle failure → Unresolved.

use crate::config::EngineConfig;
use crate::resolution::tier2::AiEscalator;
use crate::resolution::types::{CandidateEvaluation, QueryContext};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info};

/// How the selection was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Only one candidate cleared the threshold
    Single,
    /// Leader separated from the runner-up by more than the band
    Separated,
    /// Near tie broken by industry/region agreement
    Context,
    /// Near tie broken by the oracle
    Oracle,
}

impl SelectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Separated => "separated",
            Self::Context => "context",
            Self::Oracle => "oracle",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub evaluation: CandidateEvaluation,
    pub method: SelectionMethod,
    pub reasoning: Option<String>,
}

impl Selection {
    pub fn confidence(&self) -> f64 {
        self.evaluation.blended
    }
}

#[derive(Debug, Clone)]
pub enum Disambiguation {
    Selected(Box<Selection>),
    NoneCleared,
    /// Near tie the oracle could not break; contenders in ranked order
    Unresolved(Vec<CandidateEvaluation>),
}

/// Disambiguator (Tier 3 concept)
#[derive(Debug, Clone)]
pub struct Disambiguator {
    match_threshold: f64,
    separation_band: f64,
}

impl Default for Disambiguator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Disambiguator {
    pub fn new(match_threshold: f64, separation_band: f64) -> Self {
        Self {
            match_threshold,
            separation_band,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.match_threshold, config.disambiguation_separation_band)
    }

    pub async fn disambiguate(
        &self,
        query: &str,
        context: &QueryContext,
        mut evaluations: Vec<CandidateEvaluation>,
        escalator: &AiEscalator,
    ) -> Disambiguation {
        evaluations.sort_by(|a, b| b.blended.partial_cmp(&a.blended).unwrap_or(Ordering::Equal));

        let mut cleared: Vec<CandidateEvaluation> = evaluations
            .into_iter()
            .filter(|e| e.blended >= self.match_threshold)
            .collect();

        if cleared.is_empty() {
            return Disambiguation::NoneCleared;
        }
        if cleared.len() == 1 {
            return selected(cleared.remove(0), SelectionMethod::Single, None);
        }

        let leader = cleared[0].blended;
        if leader - cleared[1].blended > self.separation_band {
            return selected(cleared.remove(0), SelectionMethod::Separated, None);
        }

        let mut contenders: Vec<CandidateEvaluation> = cleared
            .into_iter()
            .take_while(|e| leader - e.blended <= self.separation_band)
            .collect();

        debug!(
            query = %query,
            contenders = contenders.len(),
            leader = leader,
            "Near tie, disambiguating"
        );

        if let Some(index) = context_winner(&contenders, context) {
            return selected(contenders.swap_remove(index), SelectionMethod::Context, None);
        }

        let choice = {
            let candidates: Vec<_> = contenders.iter().map(|e| &e.candidate).collect();
            escalator.choose(query, &candidates, context).await
        };
        match choice {
            Ok(choice) => {
                info!(
                    query = %query,
                    selected_index = choice.selected_index,
                    candidate_id = %contenders[choice.selected_index].candidate.id,
                    "Oracle broke near tie"
                );
                let reasoning = Some(choice.reasoning);
                selected(
                    contenders.swap_remove(choice.selected_index),
                    SelectionMethod::Oracle,
                    reasoning,
                )
            }
            Err(_) => Disambiguation::Unresolved(contenders),
        }
    }
}

fn selected(
    evaluation: CandidateEvaluation,
    method: SelectionMethod,
    reasoning: Option<String>,
) -> Disambiguation {
    Disambiguation::Selected(Box::new(Selection {
        evaluation,
        method,
        reasoning,
    }))
}

/// Index of the single contender agreeing with the query context, if exactly one does
fn context_winner(contenders: &[CandidateEvaluation], context: &QueryContext) -> Option<usize> {
    if context.is_empty() {
        return None;
    }

    let agrees = |hint: &Option<String>, value: &Option<String>| match (hint, value) {
        (Some(h), Some(v)) => !h.trim().is_empty() && h.trim().eq_ignore_ascii_case(v.trim()),
        _ => false,
    };

    let agreeing: Vec<usize> = contenders
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            agrees(&context.industry, &e.candidate.industry)
                || agrees(&context.region, &e.candidate.region)
        })
        .map(|(i, _)| i)
        .collect();

    match agreeing.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}
