//! Entity name resolution
//!
//! Three-tier pipeline that maps a free-text organization name to a registry
//! entity:
//!
//! - **Tier 1**: deterministic comparison (normalize, composite fuzzy score,
//!   structural query expansion)
//! - **Tier 2**: judgment oracle escalation for the uncertain band, with
//!   bounded concurrency and a conservative fallback
//! - **Tier 3**: disambiguation between near-tied candidates
//!
//! The orchestrator drives one query (or a batch) through the tiers with an
//! exact-match cache in front.

pub mod cache;         // Exact-match cache (memory / sqlite stores)
pub mod orchestrator;  // State machine, batches, cancellation
pub mod retrieval;     // CandidateRetriever trait
pub mod tier1;         // Normalizer, fuzzy scorer, query expander
pub mod tier2;         // Oracle escalation
pub mod tier3;         // Disambiguation
pub mod trace;         // Per-resolution debug trace
pub mod types;         // Shared data contracts

pub use orchestrator::ResolutionOrchestrator;
pub use types::{
    Candidate, MatchOutcome, MatchType, NormalizedName, Query, QueryContext, Resolution,
};
