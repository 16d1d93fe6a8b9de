//! Test Helper Utilities
//!
//! Stub providers, a recording notifier, and an app builder over an
//! in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use shelf_canon::db::{init_in_memory_pool, InMemoryResponseCache};
use shelf_canon::isbn::Isbn;
use shelf_canon::models::{IntermediateRecord, SourceName};
use shelf_canon::services::google_books_client::normalize_volumes;
use shelf_canon::services::open_library_client::normalize_details;
use shelf_canon::services::{
    BookSource, CanonicalResolver, CorrectionWorkflow, Notifier, NotifyError, ReviewNotification, SourceError,
};
use shelf_canon::AppState;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const BASE_URL: &str = "http://shelf.test";

/// Canned provider reply
#[derive(Clone)]
pub enum Reply {
    Payload(Value),
    Missing,
    Down,
}

/// Provider stub that counts live fetches
pub struct StubSource {
    name: SourceName,
    reply: Reply,
    calls: AtomicUsize,
}

impl StubSource {
    pub fn new(name: SourceName, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
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
            Reply::Down => Err(SourceError::unavailable(self.name, "HTTP 503: maintenance")),
        }
    }

    fn normalize(&self, raw: &Value) -> Option<IntermediateRecord> {
        match self.name {
            SourceName::Google => normalize_volumes(raw),
            SourceName::OpenLibrary => normalize_details(raw),
        }
    }
}

/// Notifier that keeps every notification it is handed
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<ReviewNotification>>,
}

impl RecordingNotifier {
    pub async fn last(&self) -> ReviewNotification {
        self.sent.lock().await.last().cloned().expect("no notification sent")
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_review_requested(&self, notification: &ReviewNotification) -> Result<(), NotifyError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub app: axum::Router,
    pub pool: SqlitePool,
    pub google: Arc<StubSource>,
    pub open_library: Arc<StubSource>,
    pub notifier: Arc<RecordingNotifier>,
}

/// Build the router over an in-memory database and stub providers
pub async fn create_test_app(google: Reply, open_library: Reply) -> TestApp {
    let pool = init_in_memory_pool().await.expect("Failed to create in-memory database");
    let google = StubSource::new(SourceName::Google, google);
    let open_library = StubSource::new(SourceName::OpenLibrary, open_library);
    let notifier = Arc::new(RecordingNotifier::default());

    let resolver = CanonicalResolver::new(
        pool.clone(),
        Arc::new(InMemoryResponseCache::new()),
        google.clone(),
        open_library.clone(),
    );
    let corrections = CorrectionWorkflow::new(pool.clone(), notifier.clone(), BASE_URL, 1000);
    let app = shelf_canon::build_router(AppState::new(pool.clone(), resolver, corrections));

    TestApp {
        app,
        pool,
        google,
        open_library,
        notifier,
    }
}

/// Token value from an action link
pub fn token_from_url(url: &str) -> String {
    url.rsplit("token=").next().unwrap_or_default().to_string()
}

/// Google Books volumes response: title only, page count 0
pub fn google_sparse_volume() -> Value {
    json!({
        "kind": "books#volumes",
        "totalItems": 1,
        "items": [{
            "id": "hp7",
            "volumeInfo": {
                "title": "Harry Potter and the Deathly Hallows",
                "pageCount": 0,
                "description": "<p>The <b>final</b> adventure.</p>",
                "categories": ["Juvenile Fiction"],
                "publishedDate": "2007-07-21"
            }
        }]
    })
}

/// Open Library details response with pages, authors and a cover id
pub fn open_library_details() -> Value {
    json!({
        "ISBN:9780545010221": {
            "bib_key": "ISBN:9780545010221",
            "details": {
                "key": "/books/OL9267185M",
                "title": "Harry Potter and the Deathly Hallows",
                "authors": [{"key": "/authors/OL23919A", "name": "J.K. Rowling"}],
                "number_of_pages": 309,
                "covers": [8231856]
            }
        }
    })
}
