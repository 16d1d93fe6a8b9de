//! Canonical Resolver
//!
//! Turns an ISBN into the single canonical record for it.
//!
//! **Algorithm:**
//! 1. Validate and normalize the ISBN
//! 2. Existing canonical record → return it (never re-fetched or overwritten)
//! 3. Query the primary source through the response cache
//! 4. Query the secondary source when the primary result is absent or sparse
//! 5. No data from either source → `NotFound`, nothing persisted
//! 6. Merge under the field precedence policy
//! 7. Persist; a concurrent creator winning the unique ISBN constraint is
//!    resolved by re-reading its row
//!
//! Provider failures are logged and treated as "no opinion"; only a total
//! absence of data reaches the caller.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

use super::book_source::BookSource;
use super::record_merger::{merge_records, needs_secondary};
use crate::db::{canonical_books, ResponseCache};
use crate::isbn::{InvalidIsbn, Isbn};
use crate::models::{CanonicalBook, IntermediateRecord};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    InvalidFormat(#[from] InvalidIsbn),

    #[error("No source has data for ISBN {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] shelf_common::Error),
}

/// Orchestrates cache, sources, merge and persistence
pub struct CanonicalResolver {
    db: SqlitePool,
    cache: Arc<dyn ResponseCache>,
    primary: Arc<dyn BookSource>,
    secondary: Arc<dyn BookSource>,
}

impl CanonicalResolver {
    pub fn new(
        db: SqlitePool,
        cache: Arc<dyn ResponseCache>,
        primary: Arc<dyn BookSource>,
        secondary: Arc<dyn BookSource>,
    ) -> Self {
        Self {
            db,
            cache,
            primary,
            secondary,
        }
    }

    /// Resolve an ISBN to its canonical record, creating it on first sight
    pub async fn lookup(&self, raw_isbn: &str) -> Result<CanonicalBook, LookupError> {
        let isbn = Isbn::parse(raw_isbn)?;

        if let Some(existing) = canonical_books::find_by_isbn(&self.db, isbn.as_str()).await? {
            tracing::debug!(isbn = %isbn, "Canonical record exists");
            return Ok(existing);
        }

        let primary = self.fetch_through_cache(self.primary.as_ref(), &isbn).await;

        let secondary = if needs_secondary(primary.as_ref()) {
            self.fetch_through_cache(self.secondary.as_ref(), &isbn).await
        } else {
            None
        };

        if primary.is_none() && secondary.is_none() {
            tracing::info!(isbn = %isbn, "No source has data; no canonical record created");
            return Err(LookupError::NotFound(isbn.to_string()));
        }

        let candidate = merge_records(&isbn, primary.as_ref(), secondary.as_ref(), Utc::now());
        self.persist(candidate).await
    }

    /// Existing canonical record without triggering any provider fetch
    pub async fn find_existing(&self, raw_isbn: &str) -> Result<Option<CanonicalBook>, LookupError> {
        let isbn = Isbn::parse(raw_isbn)?;
        Ok(canonical_books::find_by_isbn(&self.db, isbn.as_str()).await?)
    }

    async fn persist(&self, candidate: CanonicalBook) -> Result<CanonicalBook, LookupError> {
        if canonical_books::insert_if_absent(&self.db, &candidate).await? {
            tracing::info!(
                isbn = %candidate.isbn,
                id = %candidate.id,
                missing = candidate.missing_fields.len(),
                google = candidate.source_google,
                open_library = candidate.source_open_library,
                "Created canonical record"
            );
            return Ok(candidate);
        }

        tracing::debug!(isbn = %candidate.isbn, "Concurrent canonical creation; re-reading winner");
        canonical_books::find_by_isbn(&self.db, &candidate.isbn)
            .await?
            .ok_or_else(|| {
                LookupError::Storage(shelf_common::Error::Internal(format!(
                    "Canonical record for {} vanished after insert conflict",
                    candidate.isbn
                )))
            })
    }

    /// Cached payload if fresh, else one live fetch that refreshes the cache
    ///
    /// Cache and provider failures both degrade to "no data".
    async fn fetch_through_cache(&self, source: &dyn BookSource, isbn: &Isbn) -> Option<IntermediateRecord> {
        let name = source.name();

        match self.cache.get(isbn, name).await {
            Ok(Some(raw)) => {
                tracing::debug!(isbn = %isbn, source = %name, "Response cache hit");
                return source.normalize(&raw);
            }
            Ok(None) => {
                tracing::debug!(isbn = %isbn, source = %name, "Response cache miss");
            }
            Err(e) => {
                tracing::warn!(isbn = %isbn, source = %name, error = %e, "Response cache read failed");
            }
        }

        match source.fetch_raw(isbn).await {
            Ok(Some(raw)) => {
                if let Err(e) = self.cache.put(isbn, name, &raw).await {
                    tracing::warn!(isbn = %isbn, source = %name, error = %e, "Response cache write failed");
                }
                let record = source.normalize(&raw);
                if record.is_none() {
                    tracing::debug!(isbn = %isbn, source = %name, "Source has no record");
                }
                record
            }
            Ok(None) => {
                tracing::debug!(isbn = %isbn, source = %name, "Source has no record");
                None
            }
            Err(e) => {
                tracing::warn!(isbn = %isbn, source = %name, error = %e, "Source unavailable; continuing without it");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_in_memory_pool, InMemoryResponseCache};
    use crate::models::{BookField, SourceName};
    use crate::services::book_source::SourceError;
    use crate::services::google_books_client::normalize_volumes;
    use crate::services::open_library_client::normalize_details;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Payload(Value),
        Missing,
        Down,
    }

    struct StubSource {
        name: SourceName,
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(name: SourceName, reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BookSource for StubSource {
        fn name(&self) -> SourceName {
            self.name
        }

        async fn fetch_raw(&self, _isbn: &Isbn) -> Result<Option<Value>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Payload(v) => Ok(Some(v.clone())),
                Reply::Missing => Ok(None),
                Reply::Down => Err(SourceError::unavailable(self.name, "HTTP 503")),
            }
        }

        fn normalize(&self, raw: &Value) -> Option<IntermediateRecord> {
            match self.name {
                SourceName::Google => normalize_volumes(raw),
                SourceName::OpenLibrary => normalize_details(raw),
            }
        }
    }

    fn google_sparse() -> Value {
        json!({
            "totalItems": 1,
            "items": [{
                "id": "abc",
                "volumeInfo": {"title": "Harry Potter", "pageCount": 0}
            }]
        })
    }

    fn google_complete() -> Value {
        json!({
            "totalItems": 1,
            "items": [{
                "id": "abc",
                "volumeInfo": {
                    "title": "Dune",
                    "authors": ["Frank Herbert"],
                    "pageCount": 412,
                    "description": "Desert planet.",
                    "imageLinks": {"thumbnail": "http://books.google.com/t.jpg"}
                }
            }]
        })
    }

    fn open_library_pages() -> Value {
        json!({
            "ISBN:9780545010221": {
                "details": {"number_of_pages": 309, "authors": [{"name": "J.K. Rowling"}]}
            }
        })
    }

    async fn resolver(primary: Arc<StubSource>, secondary: Arc<StubSource>) -> CanonicalResolver {
        let pool = init_in_memory_pool().await.unwrap();
        CanonicalResolver::new(pool, Arc::new(InMemoryResponseCache::new()), primary, secondary)
    }

    #[tokio::test]
    async fn test_sparse_primary_is_filled_by_secondary() {
        let google = StubSource::new(SourceName::Google, Reply::Payload(google_sparse()));
        let open_library = StubSource::new(SourceName::OpenLibrary, Reply::Payload(open_library_pages()));
        let resolver = resolver(google.clone(), open_library.clone()).await;

        let book = resolver.lookup("978-0-545-01022-1").await.unwrap();

        assert_eq!(book.isbn, "9780545010221");
        assert_eq!(book.title, "Harry Potter");
        assert_eq!(book.page_count, Some(309));
        assert_eq!(book.authors, vec!["J.K. Rowling"]);
        assert!(book.source_google && book.source_open_library);
        assert!(!book.missing_fields.contains(&BookField::PageCount));
        assert!(book.missing_fields.contains(&BookField::CoverUrl));
    }

    #[tokio::test]
    async fn test_second_lookup_returns_stored_record_without_fetching() {
        let google = StubSource::new(SourceName::Google, Reply::Payload(google_sparse()));
        let open_library = StubSource::new(SourceName::OpenLibrary, Reply::Payload(open_library_pages()));
        let resolver = resolver(google.clone(), open_library.clone()).await;

        let first = resolver.lookup("9780545010221").await.unwrap();
        let second = resolver.lookup("9780545010221").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(google.calls(), 1);
        assert_eq!(open_library.calls(), 1);
    }

    #[tokio::test]
    async fn test_complete_primary_skips_secondary() {
        let google = StubSource::new(SourceName::Google, Reply::Payload(google_complete()));
        let open_library = StubSource::new(SourceName::OpenLibrary, Reply::Payload(open_library_pages()));
        let resolver = resolver(google.clone(), open_library.clone()).await;

        let book = resolver.lookup("9780441172719").await.unwrap();

        assert_eq!(open_library.calls(), 0);
        assert!(!book.source_open_library);
        assert_eq!(book.cover_url.as_deref(), Some("https://books.google.com/t.jpg"));
    }

    #[tokio::test]
    async fn test_no_data_anywhere_is_not_found_and_not_persisted() {
        let google = StubSource::new(SourceName::Google, Reply::Missing);
        let open_library = StubSource::new(SourceName::OpenLibrary, Reply::Down);
        let resolver = resolver(google, open_library).await;

        let err = resolver.lookup("9780441172719").await.unwrap_err();

        assert!(matches!(err, LookupError::NotFound(_)));
        assert!(resolver.find_existing("9780441172719").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_primary_outage_still_merges_secondary() {
        let google = StubSource::new(SourceName::Google, Reply::Down);
        let open_library = StubSource::new(SourceName::OpenLibrary, Reply::Payload(open_library_pages()));
        let resolver = resolver(google, open_library).await;

        let book = resolver.lookup("9780545010221").await.unwrap();

        assert!(!book.source_google);
        assert!(book.source_open_library);
        assert_eq!(book.title, crate::models::UNKNOWN_TITLE);
    }

    #[tokio::test]
    async fn test_invalid_isbn_fails_before_any_fetch() {
        let google = StubSource::new(SourceName::Google, Reply::Payload(google_complete()));
        let open_library = StubSource::new(SourceName::OpenLibrary, Reply::Missing);
        let resolver = resolver(google.clone(), open_library).await;

        let err = resolver.lookup("12345").await.unwrap_err();

        assert!(matches!(err, LookupError::InvalidFormat(_)));
        assert_eq!(google.calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_payload_is_reused_across_records() {
        let google = StubSource::new(SourceName::Google, Reply::Payload(google_complete()));
        let open_library = StubSource::new(SourceName::OpenLibrary, Reply::Missing);
        let pool = init_in_memory_pool().await.unwrap();
        let cache = Arc::new(InMemoryResponseCache::new());
        let isbn = Isbn::parse("9780441172719").unwrap();
        cache.put(&isbn, SourceName::Google, &google_complete()).await.unwrap();

        let resolver = CanonicalResolver::new(pool, cache, google.clone(), open_library);
        let book = resolver.lookup("9780441172719").await.unwrap();

        assert_eq!(book.title, "Dune");
        assert_eq!(google.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_record() {
        let google = StubSource::new(SourceName::Google, Reply::Payload(google_complete()));
        let open_library = StubSource::new(SourceName::OpenLibrary, Reply::Missing);
        let resolver = Arc::new(resolver(google, open_library).await);

        let a = tokio::spawn({
            let r = resolver.clone();
            async move { r.lookup("9780441172719").await }
        });
        let b = tokio::spawn({
            let r = resolver.clone();
            async move { r.lookup("9780441172719").await }
        });

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(a.id, b.id);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books_canonical")
            .fetch_one(&resolver.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
