//! Configuration for orgmatch-engine
//!
//! The config file has one table per concern:
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [resolution]
//! match_threshold = 0.5
//! uncertain_band_low = 0.20
//! uncertain_band_high = 0.85
//! [resolution.scoring_weights]
//! first_token = 0.40
//! edit_distance = 0.15
//! jaro_winkler = 0.15
//! token_set = 0.15
//! partial = 0.15
//!
//! [oracle]
//! enabled = true
//! endpoint = "http://localhost:8088/v1"
//!
//! [cache]
//! backend = "sqlite"
//! sqlite_path = "/var/lib/orgmatch/cache.db"
//! ```
//!
//! Every field has a built-in default; `EngineConfig::validate` fails fast
//! with `Error::Config` on inconsistent values.

use crate::resolution::tier1::fuzzy_scorer::ScoringWeights;
use orgmatch_common::config::LoggingConfig;
use orgmatch_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding `[oracle] api_key`
pub const ORACLE_API_KEY_ENV_VAR: &str = "ORGMATCH_ORACLE_API_KEY";

/// Complete config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrgmatchConfig {
    pub logging: LoggingConfig,
    pub resolution: EngineConfig,
    pub oracle: OracleConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

impl OrgmatchConfig {
    /// Validate every section that has constraints
    pub fn validate(&self) -> Result<()> {
        self.resolution.validate()?;
        self.oracle.validate()
    }
}

/// Resolution engine tuning (`[resolution]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tokens dropped during normalization (legal suffixes)
    pub stopwords: BTreeSet<String>,
    /// Token substitutions applied before punctuation is stripped
    pub abbreviation_table: BTreeMap<String, String>,
    /// Algorithm key → weight; must sum to 1.0
    pub scoring_weights: BTreeMap<String, f64>,
    /// Fuzzy confidence at or below this is rejected without escalation
    pub uncertain_band_low: f64,
    /// Fuzzy confidence at or above this is accepted without escalation
    pub uncertain_band_high: f64,
    /// Minimum blended confidence for a match
    pub match_threshold: f64,
    /// Matches below this confidence are never cached
    pub min_cache_confidence: f64,
    pub max_concurrent_ai_calls: usize,
    pub ai_call_timeout_ms: u64,
    /// Leader/runner-up gap below which the oracle breaks the tie
    pub disambiguation_separation_band: f64,
    /// Fuzzy share of the blended confidence once the oracle is consulted
    pub fuzzy_blend_weight: f64,
    /// Oracle confidence assumed when a call fails
    pub oracle_fallback_confidence: f64,
    /// Upper bound on candidates requested per retrieval
    pub retrieval_limit: usize,
    pub max_expansion_variants: usize,
    pub batch_chunk_size: usize,
    /// Collect a DebugTrace for every query
    pub debug_trace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stopwords: default_stopwords(),
            abbreviation_table: default_abbreviations(),
            scoring_weights: ScoringWeights::default().to_map(),
            uncertain_band_low: 0.20,
            uncertain_band_high: 0.85,
            match_threshold: 0.5,
            min_cache_confidence: 0.5,
            max_concurrent_ai_calls: 5,
            ai_call_timeout_ms: 60_000,
            disambiguation_separation_band: 0.05,
            fuzzy_blend_weight: 0.4,
            oracle_fallback_confidence: 0.5,
            retrieval_limit: 25,
            max_expansion_variants: 8,
            batch_chunk_size: 25,
            debug_trace: false,
        }
    }
}

fn default_stopwords() -> BTreeSet<String> {
    [
        "inc",
        "incorporated",
        "llc",
        "ltd",
        "limited",
        "plc",
        "gmbh",
        "ag",
        "sa",
        "lp",
        "llp",
        "the",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_abbreviations() -> BTreeMap<String, String> {
    [
        ("corp", "corporation"),
        ("corp.", "corporation"),
        ("co", "company"),
        ("co.", "company"),
        ("&", "and"),
        ("intl", "international"),
        ("int'l", "international"),
        ("mfg", "manufacturing"),
        ("bros", "brothers"),
        ("assn", "association"),
        ("natl", "national"),
        ("svcs", "services"),
        ("grp", "group"),
        ("tech", "technology"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::Config(format!(
            "{} must be within [0.0, 1.0], got {}",
            name, value
        )));
    }
    Ok(())
}

impl EngineConfig {
    /// Fail fast on inconsistent thresholds or weights
    pub fn validate(&self) -> Result<()> {
        ScoringWeights::from_map(&self.scoring_weights)?;

        check_unit("uncertain_band_low", self.uncertain_band_low)?;
        check_unit("uncertain_band_high", self.uncertain_band_high)?;
        check_unit("match_threshold", self.match_threshold)?;
        check_unit("min_cache_confidence", self.min_cache_confidence)?;
        check_unit(
            "disambiguation_separation_band",
            self.disambiguation_separation_band,
        )?;
        check_unit("fuzzy_blend_weight", self.fuzzy_blend_weight)?;
        check_unit("oracle_fallback_confidence", self.oracle_fallback_confidence)?;

        if self.uncertain_band_low >= self.uncertain_band_high {
            return Err(Error::Config(format!(
                "uncertain_band_low ({}) must be below uncertain_band_high ({})",
                self.uncertain_band_low, self.uncertain_band_high
            )));
        }
        if self.max_concurrent_ai_calls == 0 {
            return Err(Error::Config(
                "max_concurrent_ai_calls must be at least 1".to_string(),
            ));
        }
        if self.ai_call_timeout_ms == 0 {
            return Err(Error::Config("ai_call_timeout_ms must be positive".to_string()));
        }
        if self.retrieval_limit == 0 {
            return Err(Error::Config("retrieval_limit must be at least 1".to_string()));
        }
        if self.batch_chunk_size == 0 {
            return Err(Error::Config("batch_chunk_size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn ai_call_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_call_timeout_ms)
    }
}

/// Judgment oracle connection (`[oracle]` table)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// When false every escalation takes the fallback path
    pub enabled: bool,
    /// Base URL; `/judge` and `/choose` are appended
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub requests_per_second: u32,
    pub connect_timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            requests_per_second: 5,
            connect_timeout_ms: 5_000,
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.endpoint.as_deref().map_or(true, |e| e.trim().is_empty()) {
            return Err(Error::Config(
                "oracle.enabled is true but oracle.endpoint is not set".to_string(),
            ));
        }
        if self.requests_per_second == 0 {
            return Err(Error::Config(
                "oracle.requests_per_second must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the API key: environment first, then TOML
    pub fn resolve_api_key(&self) -> Option<String> {
        let env_key = std::env::var(ORACLE_API_KEY_ENV_VAR).ok();
        let toml_key = self.api_key.clone();

        if env_key.as_deref().is_some_and(is_valid_key)
            && toml_key.as_deref().is_some_and(is_valid_key)
        {
            warn!("Oracle API key found in both environment and TOML. Using environment.");
        }

        if let Some(key) = env_key.filter(|k| is_valid_key(k)) {
            info!("Oracle API key loaded from environment variable");
            return Some(key);
        }
        if let Some(key) = toml_key.filter(|k| is_valid_key(k)) {
            info!("Oracle API key loaded from TOML config");
            return Some(key);
        }
        None
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Cache persistence backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Cache storage (`[cache]` table)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub sqlite_path: Option<PathBuf>,
}

/// HTTP service (`[server]` table)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5740,
        }
    }
}
