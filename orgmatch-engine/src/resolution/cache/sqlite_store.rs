//! SQLite cache store (sqlx)
//!
//! One row per (normalized_query, context_fingerprint). The upsert rule runs
//! as a single `INSERT ... ON CONFLICT DO UPDATE ... WHERE` statement, so
//! concurrent writers to one key are serialized by SQLite itself.
//!
//! `context_fingerprint` is stored as '' when absent (NULLs never conflict in
//! a UNIQUE index). Timestamps are fixed-width RFC 3339 text so they compare
//! lexicographically.

use super::{CacheStore, UpsertOutcome};
use crate::resolution::types::{CacheEntry, CacheError, CacheKey};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS match_cache (
    normalized_query    TEXT NOT NULL,
    context_fingerprint TEXT NOT NULL DEFAULT '',
    entity_id           TEXT NOT NULL,
    confidence          REAL NOT NULL,
    match_count         INTEGER NOT NULL DEFAULT 1,
    last_matched        TEXT NOT NULL,
    PRIMARY KEY (normalized_query, context_fingerprint)
)
"#;

const LAST_MATCHED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_match_cache_last_matched ON match_cache (last_matched)";

const UPSERT: &str = r#"
INSERT INTO match_cache (
    normalized_query, context_fingerprint, entity_id, confidence, match_count, last_matched
)
VALUES (?, ?, ?, ?, 1, ?)
ON CONFLICT (normalized_query, context_fingerprint) DO UPDATE SET
    confidence = CASE
        WHEN match_cache.entity_id = excluded.entity_id
            THEN MAX(match_cache.confidence, excluded.confidence)
        ELSE excluded.confidence
    END,
    match_count = CASE
        WHEN match_cache.entity_id = excluded.entity_id THEN match_cache.match_count + 1
        ELSE 1
    END,
    entity_id = excluded.entity_id,
    last_matched = excluded.last_matched
WHERE match_cache.entity_id = excluded.entity_id
   OR excluded.confidence > match_cache.confidence
RETURNING match_count
"#;

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CacheError::Backend(format!("Invalid last_matched '{}': {}", text, e)))
}

pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Open (creating if missing) a cache database file
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "Opened SQLite match cache");
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        sqlx::query(LAST_MATCHED_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query(
            r#"
            SELECT entity_id, confidence, match_count, last_matched
            FROM match_cache
            WHERE normalized_query = ? AND context_fingerprint = ?
            "#,
        )
        .bind(&key.normalized_query)
        .bind(key.context_fingerprint.as_deref().unwrap_or(""))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let last_matched: String = row.try_get("last_matched")?;
        let match_count: i64 = row.try_get("match_count")?;
        Ok(Some(CacheEntry {
            normalized_query: key.normalized_query.clone(),
            context_fingerprint: key.context_fingerprint.clone(),
            entity_id: row.try_get("entity_id")?,
            confidence: row.try_get("confidence")?,
            match_count: match_count.max(0) as u64,
            last_matched: parse_timestamp(&last_matched)?,
        }))
    }

    async fn upsert(
        &self,
        key: &CacheKey,
        entity_id: &str,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, CacheError> {
        let row = sqlx::query(UPSERT)
            .bind(&key.normalized_query)
            .bind(key.context_fingerprint.as_deref().unwrap_or(""))
            .bind(entity_id)
            .bind(confidence)
            .bind(format_timestamp(now))
            .fetch_optional(&self.pool)
            .await?;

        // No returned row: the WHERE clause kept the existing entry
        match row {
            Some(row) => {
                let match_count: i64 = row.try_get("match_count")?;
                Ok(UpsertOutcome::Written {
                    match_count: match_count.max(0) as u64,
                })
            }
            None => Ok(UpsertOutcome::Kept),
        }
    }

    async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM match_cache WHERE last_matched < ?")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn len(&self) -> Result<u64, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM match_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteCacheStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteCacheStore::from_pool(pool).await.unwrap()
    }

    fn key(q: &str, fp: Option<&str>) -> CacheKey {
        CacheKey {
            normalized_query: q.to_string(),
            context_fingerprint: fp.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_upsert_rules_in_sql() {
        let store = store().await;
        let k = key("acme", None);
        let now = Utc::now();

        assert_eq!(
            store.upsert(&k, "e1", 0.8, now).await.unwrap(),
            UpsertOutcome::Written { match_count: 1 }
        );
        assert_eq!(
            store.upsert(&k, "e1", 0.6, now).await.unwrap(),
            UpsertOutcome::Written { match_count: 2 }
        );
        assert_eq!(store.upsert(&k, "e2", 0.8, now).await.unwrap(), UpsertOutcome::Kept);

        let entry = store.get(&k).await.unwrap().unwrap();
        assert_eq!(entry.entity_id, "e1");
        assert_eq!(entry.confidence, 0.8);
        assert_eq!(entry.match_count, 2);

        assert_eq!(
            store.upsert(&k, "e2", 0.95, now).await.unwrap(),
            UpsertOutcome::Written { match_count: 1 }
        );
        let entry = store.get(&k).await.unwrap().unwrap();
        assert_eq!(entry.entity_id, "e2");
    }

    #[tokio::test]
    async fn test_absent_fingerprint_is_one_key() {
        let store = store().await;
        let now = Utc::now();
        store.upsert(&key("acme", None), "e1", 0.9, now).await.unwrap();
        store.upsert(&key("acme", None), "e1", 0.9, now).await.unwrap();
        store.upsert(&key("acme", Some("abc")), "e2", 0.9, now).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        let entry = store.get(&key("acme", None)).await.unwrap().unwrap();
        assert_eq!(entry.match_count, 2);
        assert_eq!(entry.context_fingerprint, None);
    }

    #[tokio::test]
    async fn test_timestamps_round_trip_and_evict() {
        let store = store().await;
        let now = Utc::now();
        let old = now - chrono::Duration::days(45);
        store.upsert(&key("old", None), "e1", 0.9, old).await.unwrap();
        store.upsert(&key("new", None), "e2", 0.9, now).await.unwrap();

        let entry = store.get(&key("old", None)).await.unwrap().unwrap();
        assert_eq!(format_timestamp(entry.last_matched), format_timestamp(old));

        let removed = store
            .evict_older_than(now - chrono::Duration::days(30))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
