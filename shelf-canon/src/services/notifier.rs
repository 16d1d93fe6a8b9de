//! Reviewer notification dispatch
//!
//! The correction workflow hands a [`ReviewNotification`] to a [`Notifier`]
//! after a submission is stored. Delivery is best effort: the workflow logs
//! a failure and carries on.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::book_source::USER_AGENT;
use crate::models::{FieldChange, FieldValue};
use crate::utils::escape_html;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Network, DNS or timeout failure
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// Structured payload describing a submission awaiting review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewNotification {
    pub submission_id: Uuid,
    pub isbn: String,
    pub title: String,
    pub submitter_id: String,
    pub changes: Vec<FieldChange>,
    pub approve_url: String,
    pub reject_url: String,
    /// Changed-field table, ready to embed in an email body
    pub diff_html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_review_requested(&self, notification: &ReviewNotification) -> Result<(), NotifyError>;
}

/// Render changed fields as an HTML table (field, current, proposed)
pub fn render_diff_table(changes: &[FieldChange]) -> String {
    let mut html = String::from(
        "<table class=\"diff\">\n<thead><tr><th>Field</th><th>Current</th><th>Proposed</th></tr></thead>\n<tbody>\n",
    );

    for change in changes {
        let before = change
            .before
            .as_ref()
            .map(FieldValue::to_string)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "(empty)".to_string());

        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"before\">{}</td><td class=\"after\">{}</td></tr>\n",
            escape_html(change.field.submission_name()),
            escape_html(&before),
            escape_html(&change.after.to_string()),
        ));
    }

    html.push_str("</tbody>\n</table>");
    html
}

/// POSTs the notification as JSON to a configured URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_review_requested(&self, notification: &ReviewNotification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus(response.status().as_u16()));
        }

        tracing::debug!(
            submission_id = %notification.submission_id,
            url = %self.url,
            "Review notification delivered"
        );
        Ok(())
    }
}

/// Writes the review links to the log; used when no webhook is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_review_requested(&self, notification: &ReviewNotification) -> Result<(), NotifyError> {
        tracing::info!(
            submission_id = %notification.submission_id,
            isbn = %notification.isbn,
            title = %notification.title,
            changed = notification.changes.len(),
            approve_url = %notification.approve_url,
            reject_url = %notification.reject_url,
            "Correction awaiting review"
        );
        Ok(())
    }
}
