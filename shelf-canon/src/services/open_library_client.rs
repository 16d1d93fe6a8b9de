//! Open Library Books API client (secondary source)
//!
//! Queries `api/books?bibkeys=ISBN:<isbn>&jscmd=details`. The response is an
//! object keyed by bibkey; an empty object means the book is unknown.

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::book_source::{
    clean_list, get_json, non_empty, rate_limiter, BookSource, SourceError, USER_AGENT,
};
use crate::isbn::Isbn;
use crate::models::{CoverRef, IntermediateRecord, SourceDescription, SourceName};

pub const OPEN_LIBRARY_BASE_URL: &str = "https://openlibrary.org";
const REQUESTS_PER_SECOND: u32 = 3;

#[derive(Debug, Deserialize)]
struct BibkeyEntry {
    details: Option<Edition>,
}

#[derive(Debug, Deserialize)]
struct Edition {
    key: Option<String>,
    title: Option<String>,
    authors: Option<Vec<NamedEntry>>,
    number_of_pages: Option<i64>,
    publish_date: Option<String>,
    covers: Option<Vec<i64>>,
    description: Option<SourceDescription>,
    subjects: Option<Vec<NamedEntry>>,
}

/// Authors and subjects appear both as bare strings and as `{name, ...}` objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NamedEntry {
    Plain(String),
    Object { name: Option<String> },
}

impl NamedEntry {
    fn into_name(self) -> Option<String> {
        match self {
            NamedEntry::Plain(name) => Some(name),
            NamedEntry::Object { name } => name,
        }
    }
}

fn names(entries: Option<Vec<NamedEntry>>) -> Option<Vec<String>> {
    clean_list(entries.map(|items| items.into_iter().filter_map(NamedEntry::into_name).collect()))
}

/// Open Library API client
pub struct OpenLibraryClient {
    http_client: reqwest::Client,
    rate_limiter: DefaultDirectRateLimiter,
    base_url: String,
}

impl OpenLibraryClient {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_base_url(OPEN_LIBRARY_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| SourceError::unavailable(SourceName::OpenLibrary, e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: rate_limiter(REQUESTS_PER_SECOND),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BookSource for OpenLibraryClient {
    fn name(&self) -> SourceName {
        SourceName::OpenLibrary
    }

    async fn fetch_raw(&self, isbn: &Isbn) -> Result<Option<Value>, SourceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/api/books", self.base_url);
        let bibkey = format!("ISBN:{}", isbn);
        let query = [
            ("bibkeys", bibkey.as_str()),
            ("format", "json"),
            ("jscmd", "details"),
        ];

        tracing::debug!(isbn = %isbn, url = %url, "Querying Open Library API");

        get_json(&self.http_client, SourceName::OpenLibrary, &url, &query).await
    }

    fn normalize(&self, raw: &Value) -> Option<IntermediateRecord> {
        normalize_details(raw)
    }
}

/// Normalize a `jscmd=details` response; `None` for an empty result
pub fn normalize_details(raw: &Value) -> Option<IntermediateRecord> {
    let entries: HashMap<String, BibkeyEntry> = match serde_json::from_value(raw.clone()) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "Unrecognized Open Library payload");
            return None;
        }
    };

    let edition = entries.into_values().find_map(|entry| entry.details)?;

    let cover = edition
        .covers
        .and_then(|ids| ids.into_iter().find(|id| *id > 0))
        .map(CoverRef::OpenLibraryId);

    Some(IntermediateRecord {
        title: non_empty(edition.title),
        authors: names(edition.authors),
        cover,
        description: non_empty(edition.description.map(SourceDescription::into_text)),
        page_count: edition.number_of_pages,
        published_date: non_empty(edition.publish_date),
        categories: names(edition.subjects),
        source_id: edition.key,
    })
}
