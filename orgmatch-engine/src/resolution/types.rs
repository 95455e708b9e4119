// Shared types and data contracts between the resolution tiers.
//
// Each type here is an explicit interface between independent modules:
// tier 1 (normalize / score / expand) produces breakdowns and variants,
// tier 2 (oracle escalation) produces judgments, tier 3 (disambiguation)
// consumes both, and the orchestrator assembles the final outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Queries
// ============================================================================

/// Optional hints supplied alongside a query name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<String>,
}

impl QueryContext {
    /// True when no hint carries any non-blank text
    pub fn is_empty(&self) -> bool {
        [&self.industry, &self.region, &self.size_hint]
            .iter()
            .all(|field| field.as_deref().map_or(true, |v| v.trim().is_empty()))
    }
}

/// A single resolution request. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    #[serde(default)]
    pub context: QueryContext,
    /// Force a cache miss (testing / re-verification)
    #[serde(default)]
    pub skip_cache: bool,
    /// Collect a DebugTrace for this query
    #[serde(default)]
    pub debug: bool,
}

impl Query {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: QueryContext::default(),
            skip_cache: false,
            debug: false,
        }
    }

    pub fn with_context(mut self, context: QueryContext) -> Self {
        self.context = context;
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

/// Canonical comparison form of a raw name (output of the Normalizer)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedName(String);

impl NormalizedName {
    /// Wrap a string that is already in normalized form.
    ///
    /// Callers outside the Normalizer use this for stored keys (cache rows,
    /// `known_queries`) that were normalized when written.
    pub fn assume_normalized(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ').filter(|t| !t.is_empty())
    }

    pub fn first_token(&self) -> Option<&str> {
        self.tokens().next()
    }

    /// Name with spaces and hyphens removed ("j and j" → "jandj")
    pub fn compact(&self) -> String {
        self.0.chars().filter(|c| *c != ' ' && *c != '-').collect()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Registry candidates
// ============================================================================

/// Reference-entity record owned by the registry collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable registry identifier
    pub id: String,
    /// Canonical display name
    pub name: String,
    /// Id of the parent entity (back-reference, not ownership)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Normalized queries previously confirmed for this entity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            aliases: Vec::new(),
            known_queries: Vec::new(),
            industry: None,
            region: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

// ============================================================================
// Tier 1 outputs: scoring and expansion
// ============================================================================

/// String-similarity algorithms combined by the composite scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    EditDistance,
    JaroWinkler,
    TokenSet,
    FirstToken,
    Partial,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::EditDistance,
        Algorithm::JaroWinkler,
        Algorithm::TokenSet,
        Algorithm::FirstToken,
        Algorithm::Partial,
    ];

    /// Configuration key for this algorithm's weight
    pub fn key(self) -> &'static str {
        match self {
            Self::EditDistance => "edit_distance",
            Self::JaroWinkler => "jaro_winkler",
            Self::TokenSet => "token_set",
            Self::FirstToken => "first_token",
            Self::Partial => "partial",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }
}

/// Per-pair algorithm scores (0-100) and weighted composite.
///
/// Contract: created once per (query, candidate) pair, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub edit_distance: f64,
    pub jaro_winkler: f64,
    pub token_set: f64,
    pub first_token: f64,
    pub partial: f64,
    pub composite: f64,
    /// The partial score came from the initialism rule ("jj" vs "johnson johnson")
    #[serde(default)]
    pub initialism: bool,
}

impl ScoreBreakdown {
    pub fn get(&self, algorithm: Algorithm) -> f64 {
        match algorithm {
            Algorithm::EditDistance => self.edit_distance,
            Algorithm::JaroWinkler => self.jaro_winkler,
            Algorithm::TokenSet => self.token_set,
            Algorithm::FirstToken => self.first_token,
            Algorithm::Partial => self.partial,
        }
    }

    /// Composite mapped onto the 0-1 confidence scale
    pub fn fuzzy_confidence(&self) -> f64 {
        (self.composite / 100.0).clamp(0.0, 1.0)
    }

    pub fn is_identical(&self) -> bool {
        self.composite >= 100.0
    }
}

/// Structural signal that produced an alternate query string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionSignal {
    SubsidiaryPattern,
    RegionalSuffixRemoved,
    ConjunctionSplit,
    LegalSuffixToggled,
    HistoricalMarkerRemoved,
}

/// Alternate query string proposed by the Query Expander
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVariant {
    pub text: String,
    pub signal: ExpansionSignal,
}

// ============================================================================
// Tier 2 outputs: oracle judgments
// ============================================================================

/// Classification returned by the judgment oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMatchType {
    Exact,
    Abbreviation,
    Variation,
    Semantic,
    Unlikely,
}

impl AiMatchType {
    /// Parse the oracle's token (case-insensitive, surrounding whitespace ignored)
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "abbreviation" => Some(Self::Abbreviation),
            "variation" => Some(Self::Variation),
            "semantic" => Some(Self::Semantic),
            "unlikely" => Some(Self::Unlikely),
            _ => None,
        }
    }

    /// Outcome match type; `unlikely` has no outcome counterpart and maps to fuzzy
    pub fn as_match_type(self) -> MatchType {
        match self {
            Self::Exact => MatchType::Exact,
            Self::Abbreviation => MatchType::Abbreviation,
            Self::Variation => MatchType::Variation,
            Self::Semantic => MatchType::Semantic,
            Self::Unlikely => MatchType::Fuzzy,
        }
    }
}

/// Well-typed oracle judgment for one (query, candidate) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiJudgment {
    /// Oracle confidence in [0.0, 1.0]
    pub confidence: f64,
    pub match_type: AiMatchType,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_canonical_name: Option<String>,
    /// True when this is the conservative default produced on oracle failure
    #[serde(default)]
    pub fallback: bool,
}

/// Well-typed oracle choice among competing candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceJudgment {
    pub selected_index: usize,
    pub confidence: f64,
    pub reasoning: String,
}

/// Token usage reported by the oracle for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

// ============================================================================
// Per-candidate evaluation (tier 1 + tier 2 combined)
// ============================================================================

/// How the confidence gate treated a candidate's fuzzy score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierDecision {
    /// At or above the uncertain band: accepted on the fuzzy score alone
    Accepted,
    /// Strictly inside the band: oracle consulted
    Escalated,
    /// At or below the band: discarded
    Rejected,
}

/// A scored candidate moving through escalation and disambiguation
#[derive(Debug, Clone)]
pub struct CandidateEvaluation {
    pub candidate: Candidate,
    pub breakdown: ScoreBreakdown,
    /// Query variant that surfaced this candidate (expansion round only)
    pub via_variant: Option<QueryVariant>,
    /// Normalized query equals the candidate's name, an alias or a known query
    pub exact_form: bool,
    pub decision: TierDecision,
    pub judgment: Option<AiJudgment>,
    /// Final per-candidate confidence in [0.0, 1.0]
    pub blended: f64,
}

impl CandidateEvaluation {
    /// Match type reported if this candidate is selected
    pub fn match_type(&self) -> MatchType {
        if let Some(judgment) = &self.judgment {
            if !judgment.fallback {
                return judgment.match_type.as_match_type();
            }
        }
        if self.exact_form {
            MatchType::Exact
        } else if self.via_variant.is_some() {
            MatchType::Variation
        } else if self.breakdown.is_identical() {
            MatchType::Exact
        } else if self.breakdown.initialism {
            MatchType::Abbreviation
        } else {
            MatchType::Fuzzy
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Cache key: normalized query plus optional context fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub normalized_query: String,
    pub context_fingerprint: Option<String>,
}

impl CacheKey {
    pub fn new(normalized: &NormalizedName, context_fingerprint: Option<String>) -> Self {
        Self {
            normalized_query: normalized.as_str().to_string(),
            context_fingerprint,
        }
    }
}

/// Previously confirmed match
///
/// Invariant: at most one entry per `CacheKey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub normalized_query: String,
    pub context_fingerprint: Option<String>,
    pub entity_id: String,
    pub confidence: f64,
    pub match_count: u64,
    pub last_matched: DateTime<Utc>,
}

// ============================================================================
// Outcomes
// ============================================================================

/// How a match was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Abbreviation,
    Variation,
    Semantic,
    Fuzzy,
}

/// Candidate listed in a `PotentialMatches` outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialMatch {
    pub candidate: Candidate,
    pub confidence: f64,
}

pub const REASON_NO_CANDIDATES: &str = "no candidates";
pub const REASON_NONE_CLEARED: &str = "no candidate cleared the match threshold";
pub const REASON_EMPTY_QUERY: &str = "empty query";
pub const REASON_CANCELLED: &str = "cancelled";

/// Final decision for one query. Exactly one variant per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched {
        candidate: Candidate,
        confidence: f64,
        match_type: MatchType,
    },
    PotentialMatches {
        candidates: Vec<PotentialMatch>,
    },
    NoMatch {
        reason: String,
    },
}

impl MatchOutcome {
    pub fn no_match(reason: impl Into<String>) -> Self {
        Self::NoMatch {
            reason: reason.into(),
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// Entity id of a `Matched` outcome
    pub fn matched_id(&self) -> Option<&str> {
        match self {
            Self::Matched { candidate, .. } => Some(candidate.id.as_str()),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched { .. } => "matched",
            Self::PotentialMatches { .. } => "potential_matches",
            Self::NoMatch { .. } => "no_match",
        }
    }
}

// ============================================================================
// Orchestrator state and debug trace
// ============================================================================

/// Resolution state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Start,
    CacheCheck,
    CacheHit,
    Retrieve,
    ExpandAndRetry,
    Score,
    Escalate,
    Disambiguate,
    CacheWrite,
    Done,
}

/// Single entry in a DebugTrace
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Milliseconds since the resolution started
    pub elapsed_ms: f64,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEventKind {
    StateEntered {
        state: ResolutionState,
    },
    Normalized {
        normalized: String,
    },
    CacheLookup {
        hit: bool,
        entity_id: Option<String>,
        confidence: Option<f64>,
    },
    Retrieved {
        query: String,
        candidates: usize,
        signal: Option<ExpansionSignal>,
    },
    Scored {
        candidate_id: String,
        breakdown: ScoreBreakdown,
    },
    Decided {
        candidate_id: String,
        decision: TierDecision,
        blended: f64,
    },
    OracleCall {
        candidate_id: Option<String>,
        latency_ms: f64,
        fallback: bool,
    },
    Disambiguated {
        method: String,
        selected: Option<String>,
    },
    CacheWrite {
        entity_id: String,
        written: bool,
    },
}

/// Ordered log of one resolution; discarded once the caller reads it
#[derive(Debug, Clone, Serialize)]
pub struct DebugTrace {
    pub resolution_id: Uuid,
    pub query: String,
    pub events: Vec<TraceEvent>,
    pub total_elapsed_ms: f64,
}

/// Outcome plus optional trace, as returned by the orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub outcome: MatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<DebugTrace>,
}

// ============================================================================
// Error types
// ============================================================================

/// Candidate retrieval failure; recovered as an empty candidate set
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Retrieval service unavailable: {0}")]
    Unavailable(String),

    #[error("Retrieval backend error: {0}")]
    Backend(String),
}

/// Judgment oracle failure; recovered into the conservative default judgment
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Oracle transport error: {0}")]
    Transport(String),

    #[error("Oracle returned HTTP status {0}")]
    Status(u16),

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

/// Oracle chose an index outside the contender list; recovered as index 0
#[derive(Debug, thiserror::Error)]
#[error("Selection index {index} out of range for {len} candidates")]
pub struct OutOfRangeSelection {
    pub index: i64,
    pub len: usize,
}

/// Cache storage failure; lookups degrade to a miss, writes are skipped
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache database error: {0}")]
    Database(#[from] sqlx::Error),
}
