//! Exact-match cache
//!
//! Remembers confirmed (normalized query, context) → entity matches so a
//! repeated query skips retrieval, scoring and escalation entirely.
//!
//! Upsert rule for `record(key, entity, confidence)`:
//! - confidence below `min_cache_confidence` → no-op
//! - no entry → created with match count 1
//! - same entity → match count + 1, timestamp refreshed, confidence = max
//! - different entity → replaced (count 1) only when strictly more confident
//!
//! Storage is pluggable through [`CacheStore`]; each store applies the rule
//! atomically per key.

pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::MemoryCacheStore;
pub use sqlite_store::SqliteCacheStore;

use crate::resolution::types::{CacheEntry, CacheError, CacheKey, NormalizedName, QueryContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Entry created, reinforced or replaced; carries the resulting match count
    Written { match_count: u64 },
    /// Existing entry for another entity was at least as confident
    Kept,
}

/// Cache persistence backend
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Apply the upsert rule for `key` atomically
    async fn upsert(
        &self,
        key: &CacheKey,
        entity_id: &str,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, CacheError>;

    /// Remove entries last matched before `cutoff`; returns how many were removed
    async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError>;

    async fn len(&self) -> Result<u64, CacheError>;
}

/// Apply the upsert rule to an in-memory entry
///
/// Returns `Kept` without touching `entry` when a different entity is not
/// strictly more confident.
pub fn merge_into(
    entry: &mut CacheEntry,
    entity_id: &str,
    confidence: f64,
    now: DateTime<Utc>,
) -> UpsertOutcome {
    if entry.entity_id == entity_id {
        entry.match_count += 1;
        entry.confidence = entry.confidence.max(confidence);
        entry.last_matched = now;
    } else if confidence > entry.confidence {
        entry.entity_id = entity_id.to_string();
        entry.confidence = confidence;
        entry.match_count = 1;
        entry.last_matched = now;
    } else {
        return UpsertOutcome::Kept;
    }
    UpsertOutcome::Written {
        match_count: entry.match_count,
    }
}

/// SHA-256 hex of the normalized, non-blank context fields; `None` without context
pub fn context_fingerprint(context: &QueryContext) -> Option<String> {
    if context.is_empty() {
        return None;
    }
    let field = |value: &Option<String>| {
        value
            .as_deref()
            .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .unwrap_or_default()
    };
    let canonical = format!(
        "industry={}\nregion={}\nsize={}",
        field(&context.industry),
        field(&context.region),
        field(&context.size_hint)
    );
    Some(format!("{:x}", Sha256::digest(canonical.as_bytes())))
}

/// Cache counters plus current size
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub backend: String,
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub rejected_writes: u64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    rejected_writes: AtomicU64,
}

/// Exact-match cache; constructed by the host and shared through `Arc`
pub struct ExactMatchCache {
    store: Arc<dyn CacheStore>,
    min_confidence: f64,
    counters: CacheCounters,
}

impl ExactMatchCache {
    pub fn new(store: Arc<dyn CacheStore>, min_confidence: f64) -> Self {
        Self {
            store,
            min_confidence,
            counters: CacheCounters::default(),
        }
    }

    /// In-memory cache with the given confidence floor
    pub fn in_memory(min_confidence: f64) -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()), min_confidence)
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Read-only lookup; backend errors degrade to a miss
    pub async fn lookup(
        &self,
        normalized: &NormalizedName,
        fingerprint: Option<&str>,
    ) -> Option<CacheEntry> {
        let key = CacheKey::new(normalized, fingerprint.map(str::to_string));
        let found = match self.store.get(&key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, query = %normalized, "Cache lookup failed, treating as miss");
                None
            }
        };

        match &found {
            Some(_) => self.counters.hits.fetch_add(1, Ordering::Relaxed),
            None => self.counters.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Record a confirmed match; returns whether the cache changed
    ///
    /// Matches below the confidence floor are never written. Backend errors
    /// are logged and the write skipped.
    pub async fn record(
        &self,
        normalized: &NormalizedName,
        fingerprint: Option<&str>,
        entity_id: &str,
        confidence: f64,
    ) -> bool {
        if confidence.is_nan() || confidence < self.min_confidence {
            self.counters.rejected_writes.fetch_add(1, Ordering::Relaxed);
            debug!(
                query = %normalized,
                confidence = confidence,
                floor = self.min_confidence,
                "Match below cache floor, not recorded"
            );
            return false;
        }

        let key = CacheKey::new(normalized, fingerprint.map(str::to_string));
        match self.store.upsert(&key, entity_id, confidence, Utc::now()).await {
            Ok(UpsertOutcome::Written { match_count }) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    query = %normalized,
                    entity_id = %entity_id,
                    match_count = match_count,
                    "Cache entry written"
                );
                true
            }
            Ok(UpsertOutcome::Kept) => {
                self.counters.rejected_writes.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(e) => {
                warn!(error = %e, query = %normalized, "Cache write failed, skipped");
                false
            }
        }
    }

    /// Explicit eviction sweep, scheduled by the host
    pub async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError> {
        let removed = self.store.evict_older_than(cutoff).await?;
        debug!(removed = removed, cutoff = %cutoff, "Cache eviction sweep");
        Ok(removed)
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = match self.store.len().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Cache size unavailable");
                0
            }
        };
        CacheStats {
            backend: self.store.backend().to_string(),
            entries,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            rejected_writes: self.counters.rejected_writes.load(Ordering::Relaxed),
        }
    }
}
