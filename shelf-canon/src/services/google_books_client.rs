//! Google Books API client (primary source)
//!
//! Queries `volumes?q=isbn:<isbn>` and normalizes the first volume.

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::book_source::{
    clean_list, get_json, non_empty, rate_limiter, BookSource, SourceError, USER_AGENT,
};
use crate::isbn::Isbn;
use crate::models::{CoverRef, IntermediateRecord, SourceName};

pub const GOOGLE_BOOKS_BASE_URL: &str = "https://www.googleapis.com/books/v1";
const REQUESTS_PER_SECOND: u32 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: Option<String>,
    volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    authors: Option<Vec<String>>,
    description: Option<String>,
    page_count: Option<i64>,
    published_date: Option<String>,
    categories: Option<Vec<String>>,
    image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

/// Google Books API client
pub struct GoogleBooksClient {
    http_client: reqwest::Client,
    rate_limiter: DefaultDirectRateLimiter,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksClient {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Self::with_base_url(GOOGLE_BOOKS_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| SourceError::unavailable(SourceName::Google, e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: rate_limiter(REQUESTS_PER_SECOND),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl BookSource for GoogleBooksClient {
    fn name(&self) -> SourceName {
        SourceName::Google
    }

    async fn fetch_raw(&self, isbn: &Isbn) -> Result<Option<Value>, SourceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/volumes", self.base_url);
        let q = format!("isbn:{}", isbn);
        let mut query = vec![("q", q.as_str())];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        tracing::debug!(isbn = %isbn, url = %url, "Querying Google Books API");

        get_json(&self.http_client, SourceName::Google, &url, &query).await
    }

    fn normalize(&self, raw: &Value) -> Option<IntermediateRecord> {
        normalize_volumes(raw)
    }
}

/// Normalize a `volumes` search response; `None` when it lists no volume
pub fn normalize_volumes(raw: &Value) -> Option<IntermediateRecord> {
    let response: VolumesResponse = match serde_json::from_value(raw.clone()) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Unrecognized Google Books payload");
            return None;
        }
    };

    let volume = response.items.into_iter().next()?;
    let info = volume.volume_info?;

    let cover = info
        .image_links
        .and_then(|links| non_empty(links.thumbnail).or_else(|| non_empty(links.small_thumbnail)))
        .map(|url| CoverRef::Url(url.replacen("http://", "https://", 1)));

    Some(IntermediateRecord {
        title: non_empty(info.title),
        authors: clean_list(info.authors),
        cover,
        description: non_empty(info.description),
        page_count: info.page_count,
        published_date: non_empty(info.published_date),
        categories: clean_list(info.categories),
        source_id: volume.id,
    })
}
