//! Correction Workflow
//!
//! Community edits to canonical records go through review:
//!
//! 1. **Submit**: diff the proposal against the submitter's snapshot, store
//!    only changed fields as a pending submission, mint one approve and one
//!    reject token (48h), notify a reviewer.
//! 2. **Resolve**: either by presenting a token (unauthenticated link) or by
//!    an in-app reviewer. Approval applies the changes onto the canonical
//!    record through the submission/canonical field mapping.
//!
//! A submission resolves exactly once. Resolution runs in one transaction
//! that first consumes every unused token of the submission and then moves
//! the submission out of `pending`; whichever caller consumes the tokens
//! first wins, and the other observes `TokenConsumed` (or
//! `SubmissionNotPending` on the reviewer path).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::notifier::{render_diff_table, Notifier, ReviewNotification};
use crate::db::{canonical_books, corrections};
use crate::isbn::{InvalidIsbn, Isbn};
use crate::models::{
    action_token_ttl, ActionToken, BookField, BookFieldValues, CanonicalBook, CorrectionSubmission,
    ReviewDecision, SubmissionStatus, UNKNOWN_TITLE,
};
use crate::utils::{retry_on_lock, LockContention};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error(transparent)]
    InvalidFormat(#[from] InvalidIsbn),

    #[error("Submission proposes no changes")]
    NoChanges,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("This review link is not valid")]
    TokenInvalid,

    #[error("This review link has expired")]
    TokenExpired,

    #[error("This correction has already been reviewed")]
    TokenConsumed,

    #[error("Submission not found: {0}")]
    SubmissionNotFound(Uuid),

    #[error("Submission {0} is no longer pending")]
    SubmissionNotPending(Uuid),

    #[error("No canonical record for ISBN {0}")]
    CanonicalMissing(String),

    #[error(transparent)]
    Storage(#[from] shelf_common::Error),
}

impl From<sqlx::Error> for CorrectionError {
    fn from(err: sqlx::Error) -> Self {
        CorrectionError::Storage(err.into())
    }
}

impl LockContention for CorrectionError {
    fn is_lock_error(&self) -> bool {
        matches!(self, CorrectionError::Storage(e) if e.is_lock_error())
    }
}

/// Incoming correction, keyed by submission field names
///
/// Field maps stay untyped until validated so an unrecognized field name is
/// reported as such rather than as a generic decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCorrection {
    pub isbn: String,
    #[serde(default)]
    pub book_id: Option<String>,
    pub submitter_id: String,
    #[serde(default)]
    pub original_data: Map<String, Value>,
    pub proposed_changes: Map<String, Value>,
}

/// Result of a successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub decision: ReviewDecision,
    pub submission: CorrectionSubmission,
    /// Updated canonical record (approvals only)
    pub book: Option<CanonicalBook>,
}

/// Validate submission field names, then decode values
pub fn parse_field_values(fields: &Map<String, Value>) -> Result<BookFieldValues, CorrectionError> {
    if let Some(unknown) = fields
        .keys()
        .find(|name| BookField::from_submission_name(name).is_none())
    {
        return Err(CorrectionError::UnknownField(unknown.clone()));
    }

    serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|e| CorrectionError::InvalidValue(e.to_string()))
}

fn mint_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct CorrectionWorkflow {
    db: SqlitePool,
    notifier: Arc<dyn Notifier>,
    public_base_url: String,
    max_lock_wait_ms: u64,
}

impl CorrectionWorkflow {
    pub fn new(
        db: SqlitePool,
        notifier: Arc<dyn Notifier>,
        public_base_url: &str,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            db,
            notifier,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_lock_wait_ms,
        }
    }

    /// Link that resolves a submission with the given token
    pub fn action_url(&self, token: &str) -> String {
        format!("{}/review/action?token={}", self.public_base_url, token)
    }

    pub async fn submit(&self, new: NewCorrection) -> Result<CorrectionSubmission, CorrectionError> {
        self.submit_at(new, Utc::now()).await
    }

    /// Store a pending submission with its two action tokens, then notify
    pub async fn submit_at(
        &self,
        new: NewCorrection,
        now: DateTime<Utc>,
    ) -> Result<CorrectionSubmission, CorrectionError> {
        let isbn = Isbn::parse(&new.isbn)?;

        let submitter_id = new.submitter_id.trim();
        if submitter_id.is_empty() {
            return Err(CorrectionError::InvalidValue("submitter_id is required".to_string()));
        }

        let original = parse_field_values(&new.original_data)?;
        let proposed = parse_field_values(&new.proposed_changes)?;
        if proposed.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(CorrectionError::InvalidValue("title cannot be blank".to_string()));
        }

        let changes = BookFieldValues::diff(&original, &proposed);
        if changes.is_empty() {
            return Err(CorrectionError::NoChanges);
        }
        let changed_fields: Vec<BookField> = changes.iter().map(|c| c.field).collect();

        let submission = CorrectionSubmission {
            id: Uuid::new_v4(),
            isbn: isbn.to_string(),
            book_id: new.book_id.filter(|id| !id.trim().is_empty()),
            submitter_id: submitter_id.to_string(),
            original_data: original,
            proposed_changes: proposed.only(&changed_fields),
            status: SubmissionStatus::Pending,
            rejection_reason: None,
            reviewed_by: None,
            created_at: now,
            reviewed_at: None,
        };

        let expires_at = now + action_token_ttl();
        let [approve, reject] = [ReviewDecision::Approve, ReviewDecision::Reject].map(|action| ActionToken {
            token: mint_token(),
            submission_id: submission.id,
            action,
            expires_at,
            used_at: None,
            created_at: now,
        });

        let mut tx = self.db.begin().await?;
        corrections::insert_submission(&mut *tx, &submission).await?;
        corrections::insert_token(&mut *tx, &approve).await?;
        corrections::insert_token(&mut *tx, &reject).await?;
        let title = canonical_books::find_by_isbn(&mut *tx, isbn.as_str())
            .await?
            .map(|book| book.title);
        tx.commit().await?;

        tracing::info!(
            submission_id = %submission.id,
            isbn = %isbn,
            submitter_id = %submission.submitter_id,
            fields = ?changed_fields,
            "Correction submitted"
        );

        let title = title
            .or_else(|| submission.original_data.title.clone())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let notification = ReviewNotification {
            submission_id: submission.id,
            isbn: submission.isbn.clone(),
            title,
            submitter_id: submission.submitter_id.clone(),
            diff_html: render_diff_table(&changes),
            changes,
            approve_url: self.action_url(&approve.token),
            reject_url: self.action_url(&reject.token),
        };

        if let Err(e) = self.notifier.notify_review_requested(&notification).await {
            tracing::warn!(
                submission_id = %submission.id,
                error = %e,
                "Review notification failed; submission kept"
            );
        }

        Ok(submission)
    }

    pub async fn resolve_by_token(&self, token: &str, reason: Option<&str>) -> Result<Resolution, CorrectionError> {
        self.resolve_by_token_at(token, reason, Utc::now()).await
    }

    /// Resolve through an action link
    ///
    /// Not-found, consumed and expired are distinct outcomes, checked in
    /// that order.
    pub async fn resolve_by_token_at(
        &self,
        token: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Resolution, CorrectionError> {
        let token = corrections::find_token(&self.db, token.trim())
            .await?
            .ok_or(CorrectionError::TokenInvalid)?;

        if token.is_consumed() {
            return Err(CorrectionError::TokenConsumed);
        }
        if token.is_expired_at(now) {
            return Err(CorrectionError::TokenExpired);
        }

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        retry_on_lock("resolve correction by token", self.max_lock_wait_ms, || {
            self.resolve_in_tx(token.submission_id, token.action, None, reason, true, now)
        })
        .await
    }

    /// Resolve as an authenticated in-app reviewer
    ///
    /// Consumes the submission's action tokens too, so an outstanding link
    /// cannot reverse the decision.
    pub async fn resolve_by_reviewer(
        &self,
        submission_id: Uuid,
        decision: ReviewDecision,
        reviewer_id: &str,
        reason: Option<&str>,
    ) -> Result<Resolution, CorrectionError> {
        let reviewer_id = reviewer_id.trim();
        if reviewer_id.is_empty() {
            return Err(CorrectionError::InvalidValue("reviewer_id is required".to_string()));
        }
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let now = Utc::now();

        retry_on_lock("resolve correction by reviewer", self.max_lock_wait_ms, || {
            self.resolve_in_tx(submission_id, decision, Some(reviewer_id), reason, false, now)
        })
        .await
    }

    async fn resolve_in_tx(
        &self,
        submission_id: Uuid,
        decision: ReviewDecision,
        reviewer_id: Option<&str>,
        reason: Option<&str>,
        via_token: bool,
        now: DateTime<Utc>,
    ) -> Result<Resolution, CorrectionError> {
        let mut tx = self.db.begin().await?;

        let mut submission = corrections::find_submission(&mut *tx, submission_id)
            .await?
            .ok_or(CorrectionError::SubmissionNotFound(submission_id))?;

        let consumed = corrections::consume_tokens(&mut *tx, submission_id, now).await?;
        if via_token && consumed == 0 {
            return Err(CorrectionError::TokenConsumed);
        }

        let resolved =
            corrections::mark_resolved(&mut *tx, submission_id, decision, reviewer_id, reason, now).await?;
        if !resolved {
            return Err(if via_token {
                CorrectionError::TokenConsumed
            } else {
                CorrectionError::SubmissionNotPending(submission_id)
            });
        }

        let book = match decision {
            ReviewDecision::Approve => {
                let mut book = canonical_books::find_by_isbn(&mut *tx, &submission.isbn)
                    .await?
                    .ok_or_else(|| CorrectionError::CanonicalMissing(submission.isbn.clone()))?;

                book.apply_field_values(&submission.proposed_changes);
                book.community_edited = true;
                book.last_edited_by = Some(submission.submitter_id.clone());
                book.updated_at = now;
                canonical_books::update(&mut *tx, &book).await?;
                Some(book)
            }
            ReviewDecision::Reject => None,
        };

        tx.commit().await?;

        submission.status = decision.resulting_status();
        submission.reviewed_by = reviewer_id.map(str::to_string);
        submission.reviewed_at = Some(now);
        if decision == ReviewDecision::Reject {
            submission.rejection_reason = reason.map(str::to_string);
        }

        tracing::info!(
            submission_id = %submission_id,
            isbn = %submission.isbn,
            decision = %decision,
            via_token,
            "Correction resolved"
        );

        Ok(Resolution {
            decision,
            submission,
            book,
        })
    }

    /// Attach a reason to an already-rejected submission
    pub async fn attach_rejection_reason(&self, submission_id: Uuid, reason: &str) -> Result<(), CorrectionError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CorrectionError::InvalidValue("reason is required".to_string()));
        }

        if corrections::set_rejection_reason(&self.db, submission_id, reason).await? {
            return Ok(());
        }

        match corrections::find_submission(&self.db, submission_id).await? {
            None => Err(CorrectionError::SubmissionNotFound(submission_id)),
            Some(_) => Err(CorrectionError::InvalidValue(
                "only rejected submissions take a rejection reason".to_string(),
            )),
        }
    }

    pub async fn find(&self, submission_id: Uuid) -> Result<CorrectionSubmission, CorrectionError> {
        corrections::find_submission(&self.db, submission_id)
            .await?
            .ok_or(CorrectionError::SubmissionNotFound(submission_id))
    }

    /// Pending submissions, oldest first
    pub async fn pending(&self, limit: u32) -> Result<Vec<CorrectionSubmission>, CorrectionError> {
        Ok(corrections::list_pending(&self.db, limit).await?)
    }
}
