// Tier 1: Deterministic Name Analysis
//
// Each module in this tier is an independent concept with no I/O.
// Everything here is pure, synchronous and cheap enough to run on every
// candidate of every query.
//
// Contract:
//   normalizer:     raw name → NormalizedName
//   fuzzy_scorer:   (NormalizedName, NormalizedName) → ScoreBreakdown
//   query_expander: raw name → Vec<QueryVariant>

pub mod normalizer;      // Canonical comparison form
pub mod fuzzy_scorer;    // Five-algorithm weighted composite
pub mod query_expander;  // Structural alternate queries for the retry round

pub use fuzzy_scorer::{FuzzyScorer, ScoringWeights};
pub use normalizer::{NameMemo, Normalizer};
pub use query_expander::QueryExpander;
