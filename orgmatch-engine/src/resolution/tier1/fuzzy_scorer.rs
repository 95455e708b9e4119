// Tier 1: Composite Fuzzy Scorer
//
// Concept: Score a normalized name pair with five independent similarity
// algorithms and combine them into one weighted composite
// Synchronization: (&NormalizedName, &NormalizedName) in, ScoreBreakdown out
//
// Algorithms (each 0-100, each symmetric):
// - edit_distance: normalized Levenshtein ratio
// - jaro_winkler:  transposition-tolerant similarity
// - token_set:     order-independent word overlap
// - first_token:   leading-word identity (brand is front-loaded)
// - partial:       containment / initialism / best-window similarity
//
// Identical inputs short-circuit to 100 everywhere.

use crate::resolution::types::{Algorithm, NormalizedName, ScoreBreakdown};
use orgmatch_common::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Allowed deviation of the weight sum from 1.0
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Score assigned when the shorter name is the initialism of the longer
const INITIALISM_SCORE: f64 = 90.0;

/// Fragments shorter than this many characters get a proportionally damped
/// partial score ("a" is contained in nearly every name)
const PARTIAL_FULL_CREDIT_LEN: f64 = 4.0;

/// Words ignored when comparing initialisms ("Bank of America" → "BA")
const CONNECTOR_WORDS: &[&str] = &["and", "of", "for", "de", "the"];

/// Validated per-algorithm weights (sum to 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    edit_distance: f64,
    jaro_winkler: f64,
    token_set: f64,
    first_token: f64,
    partial: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            edit_distance: 0.15,
            jaro_winkler: 0.15,
            token_set: 0.15,
            first_token: 0.40,
            partial: 0.15,
        }
    }
}

impl ScoringWeights {
    /// Build from a configuration map
    ///
    /// Missing keys weigh 0.0.
    ///
    /// # Errors
    /// `Error::Config` on unknown keys, negative or non-finite weights, or a
    /// sum that differs from 1.0 by more than the tolerance.
    pub fn from_map(map: &BTreeMap<String, f64>) -> Result<Self> {
        let mut weights = Self {
            edit_distance: 0.0,
            jaro_winkler: 0.0,
            token_set: 0.0,
            first_token: 0.0,
            partial: 0.0,
        };

        for (key, &value) in map {
            let algorithm = Algorithm::from_key(key).ok_or_else(|| {
                Error::Config(format!("Unknown scoring algorithm '{}'", key))
            })?;
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "Scoring weight for '{}' must be a non-negative number, got {}",
                    key, value
                )));
            }
            *weights.slot(algorithm) = value;
        }

        let sum: f64 = Algorithm::ALL.iter().map(|a| weights.get(*a)).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!(
                "Scoring weights must sum to 1.0, got {:.6}",
                sum
            )));
        }

        Ok(weights)
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Algorithm::ALL
            .iter()
            .map(|a| (a.key().to_string(), self.get(*a)))
            .collect()
    }

    pub fn get(&self, algorithm: Algorithm) -> f64 {
        match algorithm {
            Algorithm::EditDistance => self.edit_distance,
            Algorithm::JaroWinkler => self.jaro_winkler,
            Algorithm::TokenSet => self.token_set,
            Algorithm::FirstToken => self.first_token,
            Algorithm::Partial => self.partial,
        }
    }

    fn slot(&mut self, algorithm: Algorithm) -> &mut f64 {
        match algorithm {
            Algorithm::EditDistance => &mut self.edit_distance,
            Algorithm::JaroWinkler => &mut self.jaro_winkler,
            Algorithm::TokenSet => &mut self.token_set,
            Algorithm::FirstToken => &mut self.first_token,
            Algorithm::Partial => &mut self.partial,
        }
    }
}

/// Composite fuzzy scorer (Tier 1 concept)
#[derive(Debug, Clone, Default)]
pub struct FuzzyScorer {
    weights: ScoringWeights,
}

impl FuzzyScorer {
    /// Create a scorer from a weight map, failing fast on invalid weights
    pub fn new(weights: &BTreeMap<String, f64>) -> Result<Self> {
        Ok(Self::with_weights(ScoringWeights::from_map(weights)?))
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score a normalized pair
    pub fn score(&self, a: &NormalizedName, b: &NormalizedName) -> ScoreBreakdown {
        if a == b {
            return ScoreBreakdown {
                edit_distance: 100.0,
                jaro_winkler: 100.0,
                token_set: 100.0,
                first_token: 100.0,
                partial: 100.0,
                composite: 100.0,
                initialism: false,
            };
        }

        let (x, y) = ordered(a.as_str(), b.as_str());
        let (partial, initialism) = partial_score(a, b);

        let mut breakdown = ScoreBreakdown {
            edit_distance: ratio(x, y),
            jaro_winkler: strsim::jaro_winkler(x, y) * 100.0,
            token_set: token_set_ratio(a, b),
            first_token: first_token_score(a, b),
            partial,
            composite: 0.0,
            initialism,
        };

        let composite: f64 = Algorithm::ALL
            .iter()
            .map(|alg| self.weights.get(*alg) * breakdown.get(*alg))
            .sum();
        breakdown.composite = composite.clamp(0.0, 100.0);

        tracing::trace!(
            a = %a,
            b = %b,
            composite = breakdown.composite,
            "Scored pair"
        );

        breakdown
    }
}

/// Put a pair in canonical order so order-sensitive library calls stay symmetric
fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Normalized Levenshtein ratio, 0-100
fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    let (x, y) = ordered(a, b);
    strsim::normalized_levenshtein(x, y) * 100.0
}

fn token_set_ratio(a: &NormalizedName, b: &NormalizedName) -> f64 {
    let set_a: BTreeSet<&str> = a.tokens().collect();
    let set_b: BTreeSet<&str> = b.tokens().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = set_a.intersection(&set_b).copied().collect();
    let only_a: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let only_b: Vec<&str> = set_b.difference(&set_a).copied().collect();

    let joined = |extra: &[&str]| {
        intersection
            .iter()
            .chain(extra.iter())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    };
    let common = intersection.join(" ");
    let with_a = joined(&only_a);
    let with_b = joined(&only_b);

    ratio(&common, &with_a)
        .max(ratio(&common, &with_b))
        .max(ratio(&with_a, &with_b))
}

fn first_token_score(a: &NormalizedName, b: &NormalizedName) -> f64 {
    match (a.first_token(), b.first_token()) {
        (Some(x), Some(y)) if x == y => 100.0,
        _ => 0.0,
    }
}

/// Returns (score, produced_by_initialism_rule)
fn partial_score(a: &NormalizedName, b: &NormalizedName) -> (f64, bool) {
    let compact_a = a.compact();
    let compact_b = b.compact();
    if compact_a.is_empty() || compact_b.is_empty() {
        return (0.0, false);
    }

    let len_a = compact_a.chars().count();
    let len_b = compact_b.chars().count();
    let a_is_short = (len_a, compact_a.as_str()) <= (len_b, compact_b.as_str());
    let (short_name, long_name, short, long, short_len) = if a_is_short {
        (a, b, &compact_a, &compact_b, len_a)
    } else {
        (b, a, &compact_b, &compact_a, len_b)
    };

    if is_initialism(short_name, long_name) {
        return (INITIALISM_SCORE, true);
    }

    let coverage = (short_len as f64 / PARTIAL_FULL_CREDIT_LEN).min(1.0);
    if long.contains(short.as_str()) {
        return (100.0 * coverage, false);
    }

    let long_chars: Vec<char> = long.chars().collect();
    let best = long_chars
        .windows(short_len)
        .map(|window| ratio(short, &window.iter().collect::<String>()))
        .fold(0.0_f64, f64::max);

    (best * coverage, false)
}

/// True when `short` spells the initials of `long` ("ibm" / "international business machines")
fn is_initialism(short: &NormalizedName, long: &NormalizedName) -> bool {
    let long_words: Vec<&str> = long
        .tokens()
        .filter(|t| !CONNECTOR_WORDS.contains(t))
        .collect();
    if long_words.len() < 2 {
        return false;
    }

    let short_letters: String = short
        .tokens()
        .filter(|t| !CONNECTOR_WORDS.contains(t))
        .collect::<Vec<_>>()
        .concat();
    let initials: String = long_words.iter().filter_map(|w| w.chars().next()).collect();

    short_letters == initials
}
