//! SQLite-backed match cache: persistence across reopen, engine integration

mod helpers;

use chrono::{Duration, Utc};
use helpers::{fixture_registry, ScriptedOracle};
use orgmatch_engine::config::EngineConfig;
use orgmatch_engine::resolution::cache::{
    context_fingerprint, CacheStore, ExactMatchCache, SqliteCacheStore, UpsertOutcome,
};
use orgmatch_engine::resolution::tier1::Normalizer;
use orgmatch_engine::resolution::types::{CacheKey, Query, QueryContext};
use orgmatch_engine::resolution::ResolutionOrchestrator;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    let key = Normalizer::default().normalize("Acme Corp");

    {
        let store = SqliteCacheStore::open(&path).await.unwrap();
        let cache = ExactMatchCache::new(Arc::new(store), 0.5);
        assert!(cache.record(&key, None, "acme", 0.8).await);
        assert!(cache.record(&key, None, "acme", 0.7).await);
    }

    let store = SqliteCacheStore::open(&path).await.unwrap();
    let cache = ExactMatchCache::new(Arc::new(store), 0.5);
    let entry = cache.lookup(&key, None).await.unwrap();
    assert_eq!(entry.entity_id, "acme");
    assert_eq!(entry.match_count, 2);
    assert!((entry.confidence - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_fingerprinted_and_plain_keys_are_distinct() {
    let dir = TempDir::new().unwrap();
    let store = SqliteCacheStore::open(&dir.path().join("cache.db")).await.unwrap();
    let context = QueryContext {
        region: Some("EMEA".to_string()),
        ..Default::default()
    };
    let name = Normalizer::default().normalize("Globex");
    let plain = CacheKey::new(&name, None);
    let hinted = CacheKey::new(&name, context_fingerprint(&context));

    let now = Utc::now();
    store.upsert(&plain, "globex", 0.9, now).await.unwrap();
    store.upsert(&hinted, "globex-emea", 0.9, now).await.unwrap();

    assert_eq!(store.len().await.unwrap(), 2);
    assert_eq!(store.get(&plain).await.unwrap().unwrap().entity_id, "globex");
    assert_eq!(store.get(&hinted).await.unwrap().unwrap().entity_id, "globex-emea");
}

#[tokio::test]
async fn test_weaker_competing_entity_is_kept_out() {
    let dir = TempDir::new().unwrap();
    let store = SqliteCacheStore::open(&dir.path().join("cache.db")).await.unwrap();
    let key = CacheKey::new(&Normalizer::default().normalize("Acme"), None);
    let now = Utc::now();

    store.upsert(&key, "acme-1", 0.9, now).await.unwrap();
    assert_eq!(
        store.upsert(&key, "acme-2", 0.6, now).await.unwrap(),
        UpsertOutcome::Kept
    );
    assert!(matches!(
        store.upsert(&key, "acme-2", 0.95, now).await.unwrap(),
        UpsertOutcome::Written { match_count: 1 }
    ));
    assert_eq!(store.get(&key).await.unwrap().unwrap().entity_id, "acme-2");
}

#[tokio::test]
async fn test_eviction_by_age() {
    let dir = TempDir::new().unwrap();
    let store = SqliteCacheStore::open(&dir.path().join("cache.db")).await.unwrap();
    let normalizer = Normalizer::default();
    let now = Utc::now();

    let old_key = CacheKey::new(&normalizer.normalize("Old Co"), None);
    let new_key = CacheKey::new(&normalizer.normalize("New Co"), None);
    store
        .upsert(&old_key, "old", 0.9, now - Duration::days(90))
        .await
        .unwrap();
    store.upsert(&new_key, "new", 0.9, now).await.unwrap();

    let removed = store.evict_older_than(now - Duration::days(30)).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_engine_with_sqlite_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    let config = EngineConfig::default();
    let oracle = Arc::new(
        ScriptedOracle::new().with_judgment("Johnson & Johnson", 0.9, "abbreviation"),
    );

    let store = SqliteCacheStore::open(&path).await.unwrap();
    let cache = Arc::new(ExactMatchCache::new(Arc::new(store), config.min_cache_confidence));
    let engine = ResolutionOrchestrator::new(
        config.clone(),
        Arc::new(fixture_registry()),
        oracle.clone(),
        cache,
    )
    .unwrap();
    assert_eq!(engine.resolve(&Query::new("J&J")).await.outcome.matched_id(), Some("jnj"));
    drop(engine);

    // A fresh engine over the same file answers from the cache
    let store = SqliteCacheStore::open(&path).await.unwrap();
    let cache = Arc::new(ExactMatchCache::new(Arc::new(store), config.min_cache_confidence));
    let engine =
        ResolutionOrchestrator::new(config, Arc::new(fixture_registry()), oracle.clone(), cache)
            .unwrap();
    assert_eq!(engine.resolve(&Query::new("J & J")).await.outcome.matched_id(), Some("jnj"));

    assert_eq!(oracle.judge_calls(), 1);
    assert_eq!(engine.cache().stats().await.hits, 1);
}
