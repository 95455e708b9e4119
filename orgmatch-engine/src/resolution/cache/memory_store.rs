//! In-process cache store
//!
//! The key map is behind an `RwLock` (concurrent lookups); each entry has its
//! own `Mutex`, so concurrent upserts to one key serialize without blocking
//! other keys.

use super::{merge_into, CacheStore, UpsertOutcome};
use crate::resolution::types::{CacheEntry, CacheError, CacheKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

type Slot = Arc<Mutex<CacheEntry>>;

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, Slot>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &CacheKey) -> Result<Option<Slot>, CacheError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Backend("memory cache lock poisoned".to_string())
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let Some(slot) = self.slot(key)? else {
            return Ok(None);
        };
        let entry = slot.lock().map_err(poisoned)?.clone();
        Ok(Some(entry))
    }

    async fn upsert(
        &self,
        key: &CacheKey,
        entity_id: &str,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, CacheError> {
        if let Some(slot) = self.slot(key)? {
            let mut entry = slot.lock().map_err(poisoned)?;
            return Ok(merge_into(&mut entry, entity_id, confidence, now));
        }

        // Missing: take the write lock; another writer may have inserted meanwhile
        let slot = {
            let mut entries = self.entries.write().map_err(poisoned)?;
            match entries.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    entries.insert(
                        key.clone(),
                        Arc::new(Mutex::new(CacheEntry {
                            normalized_query: key.normalized_query.clone(),
                            context_fingerprint: key.context_fingerprint.clone(),
                            entity_id: entity_id.to_string(),
                            confidence,
                            match_count: 1,
                            last_matched: now,
                        })),
                    );
                    return Ok(UpsertOutcome::Written { match_count: 1 });
                }
            }
        };

        let mut entry = slot.lock().map_err(poisoned)?;
        Ok(merge_into(&mut entry, entity_id, confidence, now))
    }

    async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, slot| match slot.lock() {
            Ok(entry) => entry.last_matched >= cutoff,
            Err(_) => false,
        });
        Ok((before - entries.len()) as u64)
    }

    async fn len(&self) -> Result<u64, CacheError> {
        Ok(self.entries.read().map_err(poisoned)?.len() as u64)
    }
}
