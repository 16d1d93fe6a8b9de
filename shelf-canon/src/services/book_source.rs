//! Shared contract for bibliographic source adapters
//!
//! An adapter owns one provider: it issues exactly one HTTP request per fetch
//! and normalizes the provider's payload into an [`IntermediateRecord`].
//! Caching is the caller's job, so the raw fetch and the normalization are
//! separate steps.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use thiserror::Error;

use crate::isbn::{InvalidIsbn, Isbn};
use crate::models::{IntermediateRecord, SourceName};

pub const USER_AGENT: &str = concat!("Shelf/", env!("CARGO_PKG_VERSION"), " (canonical book resolver)");

/// Adapter failures. "No such book" is `Ok(None)`, never an error.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    InvalidFormat(#[from] InvalidIsbn),

    /// Transport failure, non-2xx status, or undecodable body
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: SourceName, reason: String },
}

impl SourceError {
    pub fn unavailable(provider: SourceName, reason: impl Into<String>) -> Self {
        SourceError::ProviderUnavailable {
            provider,
            reason: reason.into(),
        }
    }
}

/// One external bibliographic provider
#[async_trait]
pub trait BookSource: Send + Sync {
    fn name(&self) -> SourceName;

    /// Issue one request; `Ok(None)` when the provider reports no such resource
    async fn fetch_raw(&self, isbn: &Isbn) -> Result<Option<Value>, SourceError>;

    /// Normalize a raw payload; `None` when it holds no book
    fn normalize(&self, raw: &Value) -> Option<IntermediateRecord>;

    /// Fetch and normalize without caching
    async fn fetch(&self, isbn: &Isbn) -> Result<Option<IntermediateRecord>, SourceError> {
        let raw = self.fetch_raw(isbn).await?;
        Ok(raw.and_then(|payload| self.normalize(&payload)))
    }

    /// Validate a user-supplied ISBN, then fetch
    ///
    /// Malformed input fails before any network call.
    async fn fetch_by_isbn(&self, raw_isbn: &str) -> Result<Option<IntermediateRecord>, SourceError> {
        let isbn = Isbn::parse(raw_isbn)?;
        self.fetch(&isbn).await
    }
}

/// Direct rate limiter allowing `per_second` requests per second
pub(crate) fn rate_limiter(per_second: u32) -> DefaultDirectRateLimiter {
    let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    RateLimiter::direct(quota)
}

/// GET a JSON document, mapping 404 to `Ok(None)` and other failures to
/// `ProviderUnavailable`
pub(crate) async fn get_json(
    http_client: &reqwest::Client,
    provider: SourceName,
    url: &str,
    query: &[(&str, &str)],
) -> Result<Option<Value>, SourceError> {
    let response = http_client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| SourceError::unavailable(provider, e.to_string()))?;

    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(SourceError::unavailable(
            provider,
            format!("HTTP {}: {}", status.as_u16(), error_text.chars().take(200).collect::<String>()),
        ));
    }

    let payload: Value = response
        .json()
        .await
        .map_err(|e| SourceError::unavailable(provider, format!("Parse error: {}", e)))?;

    Ok(Some(payload))
}

/// Trimmed non-empty string, else `None`
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trimmed non-empty entries; `None` stays `None`, distinct from an empty list
pub(crate) fn clean_list(values: Option<Vec<String>>) -> Option<Vec<String>> {
    values.map(|items| {
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
