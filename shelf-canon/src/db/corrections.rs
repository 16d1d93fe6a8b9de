//! Correction submission and action token database operations
//!
//! The single-resolution guarantee rests on two conditional updates:
//! [`consume_tokens`] only touches tokens whose `used_at` is unset, and
//! [`mark_resolved`] only touches submissions still `pending`. Callers run
//! both in one transaction and inspect the affected-row counts.

use chrono::{DateTime, Utc};
use shelf_common::{Error, Result};
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use super::parse_timestamp;
use crate::models::{ActionToken, CorrectionSubmission, ReviewDecision, SubmissionStatus};

const SUBMISSION_COLUMNS: &str = "id, isbn, book_id, submitter_id, original_data, \
    proposed_changes, status, rejection_reason, reviewed_by, created_at, reviewed_at";

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: String,
    isbn: String,
    book_id: Option<String>,
    submitter_id: String,
    original_data: String,
    proposed_changes: String,
    status: String,
    rejection_reason: Option<String>,
    reviewed_by: Option<String>,
    created_at: String,
    reviewed_at: Option<String>,
}

impl TryFrom<SubmissionRow> for CorrectionSubmission {
    type Error = Error;

    fn try_from(row: SubmissionRow) -> Result<Self> {
        Ok(CorrectionSubmission {
            id: parse_uuid(&row.id)?,
            isbn: row.isbn,
            book_id: row.book_id,
            submitter_id: row.submitter_id,
            original_data: serde_json::from_str(&row.original_data)?,
            proposed_changes: serde_json::from_str(&row.proposed_changes)?,
            status: row.status.parse().map_err(Error::Internal)?,
            rejection_reason: row.rejection_reason,
            reviewed_by: row.reviewed_by,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            reviewed_at: row
                .reviewed_at
                .map(|s| parse_timestamp("reviewed_at", &s))
                .transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    token: String,
    submission_id: String,
    action: String,
    expires_at: String,
    used_at: Option<String>,
    created_at: String,
}

impl TryFrom<TokenRow> for ActionToken {
    type Error = Error;

    fn try_from(row: TokenRow) -> Result<Self> {
        Ok(ActionToken {
            token: row.token,
            submission_id: parse_uuid(&row.submission_id)?,
            action: row.action.parse().map_err(Error::Internal)?,
            expires_at: parse_timestamp("expires_at", &row.expires_at)?,
            used_at: row
                .used_at
                .map(|s| parse_timestamp("used_at", &s))
                .transpose()?,
            created_at: parse_timestamp("created_at", &row.created_at)?,
        })
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID {}: {}", value, e)))
}

/// Insert a new pending submission
pub async fn insert_submission<'e, E>(executor: E, submission: &CorrectionSubmission) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let query = format!(
        "INSERT INTO correction_submissions ({SUBMISSION_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );

    sqlx::query(&query)
        .bind(submission.id.to_string())
        .bind(&submission.isbn)
        .bind(&submission.book_id)
        .bind(&submission.submitter_id)
        .bind(serde_json::to_string(&submission.original_data)?)
        .bind(serde_json::to_string(&submission.proposed_changes)?)
        .bind(submission.status.as_str())
        .bind(&submission.rejection_reason)
        .bind(&submission.reviewed_by)
        .bind(submission.created_at.to_rfc3339())
        .bind(submission.reviewed_at.map(|dt| dt.to_rfc3339()))
        .execute(executor)
        .await?;

    Ok(())
}

/// Insert an unused action token
pub async fn insert_token<'e, E>(executor: E, token: &ActionToken) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO correction_action_tokens (token, submission_id, action, expires_at, used_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&token.token)
    .bind(token.submission_id.to_string())
    .bind(token.action.as_str())
    .bind(token.expires_at.to_rfc3339())
    .bind(token.used_at.map(|dt| dt.to_rfc3339()))
    .bind(token.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_submission<'e, E>(executor: E, id: Uuid) -> Result<Option<CorrectionSubmission>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let query = format!("SELECT {SUBMISSION_COLUMNS} FROM correction_submissions WHERE id = ?");
    let row: Option<SubmissionRow> = sqlx::query_as(&query)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.map(CorrectionSubmission::try_from).transpose()
}

/// Pending submissions, oldest first
pub async fn list_pending(pool: &SqlitePool, limit: u32) -> Result<Vec<CorrectionSubmission>> {
    let query = format!(
        "SELECT {SUBMISSION_COLUMNS} FROM correction_submissions
         WHERE status = 'pending'
         ORDER BY created_at ASC
         LIMIT ?"
    );
    let rows: Vec<SubmissionRow> = sqlx::query_as(&query)
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(CorrectionSubmission::try_from).collect()
}

pub async fn find_token<'e, E>(executor: E, token: &str) -> Result<Option<ActionToken>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: Option<TokenRow> = sqlx::query_as(
        "SELECT token, submission_id, action, expires_at, used_at, created_at
         FROM correction_action_tokens WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(executor)
    .await?;

    row.map(ActionToken::try_from).transpose()
}

pub async fn list_tokens(pool: &SqlitePool, submission_id: Uuid) -> Result<Vec<ActionToken>> {
    let rows: Vec<TokenRow> = sqlx::query_as(
        "SELECT token, submission_id, action, expires_at, used_at, created_at
         FROM correction_action_tokens WHERE submission_id = ? ORDER BY action",
    )
    .bind(submission_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ActionToken::try_from).collect()
}

/// Stamp `used_at` on every still-unused token of a submission
///
/// Returns the number of tokens consumed; zero means another resolution
/// already claimed them.
pub async fn consume_tokens<'e, E>(executor: E, submission_id: Uuid, now: DateTime<Utc>) -> Result<u64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE correction_action_tokens SET used_at = ?
         WHERE submission_id = ? AND used_at IS NULL",
    )
    .bind(now.to_rfc3339())
    .bind(submission_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Move a pending submission to its terminal status
///
/// Returns `false` if the submission was no longer pending.
pub async fn mark_resolved<'e, E>(
    executor: E,
    submission_id: Uuid,
    decision: ReviewDecision,
    reviewed_by: Option<&str>,
    rejection_reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rejection_reason = match decision {
        ReviewDecision::Reject => rejection_reason,
        ReviewDecision::Approve => None,
    };

    let result = sqlx::query(
        "UPDATE correction_submissions
         SET status = ?, reviewed_by = ?, rejection_reason = ?, reviewed_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(decision.resulting_status().as_str())
    .bind(reviewed_by)
    .bind(rejection_reason)
    .bind(now.to_rfc3339())
    .bind(submission_id.to_string())
    .bind(SubmissionStatus::Pending.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Attach a reason to an already-rejected submission
///
/// Terminal submissions are otherwise immutable.
pub async fn set_rejection_reason(pool: &SqlitePool, submission_id: Uuid, reason: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE correction_submissions SET rejection_reason = ?
         WHERE id = ? AND status = ?",
    )
    .bind(reason)
    .bind(submission_id.to_string())
    .bind(SubmissionStatus::Rejected.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
