//! In-memory registry adapter
//!
//! Loads reference entities from a JSON array and answers retrieval queries
//! with cheap recall heuristics over normalized names, aliases and known
//! queries. Suitable for CLI runs, tests and small deployments.

use crate::resolution::retrieval::{CandidateRetriever, RetrievalHints};
use crate::resolution::tier1::Normalizer;
use crate::resolution::types::{Candidate, NormalizedName, RetrievalError};
use async_trait::async_trait;
use orgmatch_common::{Error, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Words that carry no identity on their own
const CONNECTOR_WORDS: &[&str] = &["and", "of", "for", "de", "the"];

/// Minimum shared compact prefix for prefix recall
const MIN_PREFIX_LEN: usize = 3;

/// Rank bonus for each context hint the candidate agrees with
const HINT_BONUS: f64 = 0.05;

struct IndexedCandidate {
    candidate: Candidate,
    /// Normalized name, aliases and known queries
    forms: Vec<NormalizedName>,
}

pub struct InMemoryRegistry {
    normalizer: Normalizer,
    entries: Vec<IndexedCandidate>,
    by_id: HashMap<String, usize>,
}

impl InMemoryRegistry {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self::with_normalizer(candidates, Normalizer::default())
    }

    pub fn with_normalizer(candidates: Vec<Candidate>, normalizer: Normalizer) -> Self {
        let mut entries = Vec::with_capacity(candidates.len());
        let mut by_id = HashMap::new();

        for candidate in candidates {
            if by_id.contains_key(&candidate.id) {
                tracing::warn!(id = %candidate.id, "Duplicate registry id, keeping first");
                continue;
            }
            let forms = std::iter::once(&candidate.name)
                .chain(candidate.aliases.iter())
                .map(|raw| normalizer.normalize(raw))
                .chain(
                    candidate
                        .known_queries
                        .iter()
                        .map(NormalizedName::assume_normalized),
                )
                .filter(|form| !form.is_empty())
                .collect();
            by_id.insert(candidate.id.clone(), entries.len());
            entries.push(IndexedCandidate { candidate, forms });
        }

        Self {
            normalizer,
            entries,
            by_id,
        }
    }

    /// Load a JSON array of candidates
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let candidates: Vec<Candidate> = serde_json::from_str(&content).map_err(|e| {
            Error::InvalidInput(format!("Invalid registry file {}: {}", path.display(), e))
        })?;
        tracing::info!(
            path = %path.display(),
            entities = candidates.len(),
            "Loaded registry"
        );
        Ok(Self::new(candidates))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn agrees(hint: &Option<String>, value: &Option<String>) -> bool {
    match (hint, value) {
        (Some(h), Some(v)) => h.trim().eq_ignore_ascii_case(v.trim()),
        _ => false,
    }
}

fn hint_bonus(hints: &RetrievalHints, candidate: &Candidate) -> f64 {
    [
        agrees(&hints.industry, &candidate.industry),
        agrees(&hints.region, &candidate.region),
    ]
    .iter()
    .filter(|&&agreed| agreed)
    .count() as f64
        * HINT_BONUS
}

fn significant_tokens(name: &NormalizedName) -> HashSet<&str> {
    name.tokens()
        .filter(|t| !CONNECTOR_WORDS.contains(t))
        .collect()
}

fn initials(name: &NormalizedName) -> String {
    name.tokens()
        .filter(|t| !CONNECTOR_WORDS.contains(t))
        .filter_map(|t| t.chars().next())
        .collect()
}

/// Recall score in [0, 1]; 0 means "not a candidate"
fn recall(query: &NormalizedName, form: &NormalizedName) -> f64 {
    if query == form {
        return 1.0;
    }

    let q_tokens = significant_tokens(query);
    let f_tokens = significant_tokens(form);
    let shared = q_tokens.intersection(&f_tokens).count();
    let union = q_tokens.union(&f_tokens).count();
    let overlap = if union == 0 {
        0.0
    } else {
        shared as f64 / union as f64
    };

    let q_compact = query.compact();
    let f_compact = form.compact();
    let (shorter, longer) = if q_compact.len() <= f_compact.len() {
        (&q_compact, &f_compact)
    } else {
        (&f_compact, &q_compact)
    };
    let prefix = if shorter.chars().count() >= MIN_PREFIX_LEN
        && longer.starts_with(shorter.as_str())
    {
        0.6
    } else {
        0.0
    };

    let q_letters: String = query
        .tokens()
        .filter(|t| !CONNECTOR_WORDS.contains(t))
        .collect();
    let f_letters: String = form
        .tokens()
        .filter(|t| !CONNECTOR_WORDS.contains(t))
        .collect();
    let q_initials = initials(query);
    let f_initials = initials(form);
    let acronym = if (f_initials.len() >= 2 && q_letters == f_initials)
        || (q_initials.len() >= 2 && f_letters == q_initials)
    {
        0.7
    } else {
        0.0
    };

    overlap.max(prefix).max(acronym)
}

#[async_trait]
impl CandidateRetriever for InMemoryRegistry {
    async fn search(
        &self,
        query: &str,
        hints: &RetrievalHints,
        limit: usize,
    ) -> std::result::Result<Vec<Candidate>, RetrievalError> {
        let normalized = self.normalizer.normalize(query);
        if normalized.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(f64, &Candidate)> = self
            .entries
            .iter()
            .filter_map(|e| {
                let best = e
                    .forms
                    .iter()
                    .map(|form| recall(&normalized, form))
                    .fold(0.0_f64, f64::max);
                (best > 0.0).then(|| (best + hint_bonus(hints, &e.candidate), &e.candidate))
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn fetch(&self, id: &str) -> std::result::Result<Option<Candidate>, RetrievalError> {
        Ok(self
            .by_id
            .get(id)
            .map(|&i| self.entries[i].candidate.clone()))
    }
}
