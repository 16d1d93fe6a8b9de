//! Per-ISBN, per-source cache of raw provider responses
//!
//! One row per ISBN holds a `{source}_response` / `{source}_cached_at` column
//! pair for each provider. Each pair expires and is overwritten independently.
//! Expired entries read as a miss and are left in place until refreshed.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use shelf_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::parse_timestamp;
use crate::isbn::Isbn;
use crate::models::SourceName;

pub const CACHE_TTL_DAYS: i64 = 7;

pub fn cache_ttl() -> Duration {
    Duration::days(CACHE_TTL_DAYS)
}

/// Entry valid only while `now - cached_at < TTL`
pub fn is_fresh(cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - cached_at < cache_ttl()
}

/// Keyed store of raw provider payloads
///
/// `get` returns `None` both for absent and for expired entries.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get_at(&self, isbn: &Isbn, source: SourceName, now: DateTime<Utc>) -> Result<Option<Value>>;

    /// Upsert this source's payload; the sibling source's entry is untouched
    async fn put_at(&self, isbn: &Isbn, source: SourceName, payload: &Value, now: DateTime<Utc>) -> Result<()>;

    async fn get(&self, isbn: &Isbn, source: SourceName) -> Result<Option<Value>> {
        self.get_at(isbn, source, Utc::now()).await
    }

    async fn put(&self, isbn: &Isbn, source: SourceName, payload: &Value) -> Result<()> {
        self.put_at(isbn, source, payload, Utc::now()).await
    }
}

/// SQLite-backed cache on the `book_response_cache` table
#[derive(Clone)]
pub struct SqliteResponseCache {
    db: SqlitePool,
}

impl SqliteResponseCache {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResponseCache for SqliteResponseCache {
    async fn get_at(&self, isbn: &Isbn, source: SourceName, now: DateTime<Utc>) -> Result<Option<Value>> {
        let prefix = source.as_str();
        let query = format!(
            "SELECT {prefix}_response, {prefix}_cached_at FROM book_response_cache WHERE isbn = ?"
        );

        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(&query)
            .bind(isbn.as_str())
            .fetch_optional(&self.db)
            .await?;

        let Some((Some(response), Some(cached_at))) = row else {
            return Ok(None);
        };

        let cached_at = parse_timestamp("cached_at", &cached_at)?;
        if !is_fresh(cached_at, now) {
            tracing::debug!(isbn = %isbn, source = %source, %cached_at, "Cached response expired");
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&response)?))
    }

    async fn put_at(&self, isbn: &Isbn, source: SourceName, payload: &Value, now: DateTime<Utc>) -> Result<()> {
        let prefix = source.as_str();
        let query = format!(
            "INSERT INTO book_response_cache (isbn, {prefix}_response, {prefix}_cached_at)
             VALUES (?, ?, ?)
             ON CONFLICT(isbn) DO UPDATE SET
                 {prefix}_response = excluded.{prefix}_response,
                 {prefix}_cached_at = excluded.{prefix}_cached_at"
        );

        sqlx::query(&query)
            .bind(isbn.as_str())
            .bind(serde_json::to_string(payload)?)
            .bind(now.to_rfc3339())
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

/// Process-local cache for tests and ephemeral runs
#[derive(Default)]
pub struct InMemoryResponseCache {
    entries: RwLock<HashMap<(String, SourceName), (Value, DateTime<Utc>)>>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get_at(&self, isbn: &Isbn, source: SourceName, now: DateTime<Utc>) -> Result<Option<Value>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(isbn.to_string(), source))
            .filter(|(_, cached_at)| is_fresh(*cached_at, now))
            .map(|(payload, _)| payload.clone()))
    }

    async fn put_at(&self, isbn: &Isbn, source: SourceName, payload: &Value, now: DateTime<Utc>) -> Result<()> {
        self.entries
            .write()
            .await
            .insert((isbn.to_string(), source), (payload.clone(), now));
        Ok(())
    }
}
