//! Correction submission and action token types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::book::BookFieldValues;

/// Lifetime of an emailed approve/reject link
pub const ACTION_TOKEN_TTL_HOURS: i64 = 48;

pub fn action_token_ttl() -> Duration {
    Duration::hours(ACTION_TOKEN_TTL_HOURS)
}

/// Submission lifecycle: `Pending` moves exactly once to a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != SubmissionStatus::Pending
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(format!("unknown submission status: {}", other)),
        }
    }
}

/// Reviewer decision; also the action bound to a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::Reject => "reject",
        }
    }

    /// Status a pending submission moves to
    pub fn resulting_status(self) -> SubmissionStatus {
        match self {
            ReviewDecision::Approve => SubmissionStatus::Approved,
            ReviewDecision::Reject => SubmissionStatus::Rejected,
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ReviewDecision::Approve),
            "reject" => Ok(ReviewDecision::Reject),
            other => Err(format!("unknown review action: {}", other)),
        }
    }
}

/// A proposed edit to a canonical record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSubmission {
    pub id: Uuid,
    pub isbn: String,
    /// Submitter's personal copy, if the edit started there
    pub book_id: Option<String>,
    pub submitter_id: String,
    /// Field values as the submitter saw them
    pub original_data: BookFieldValues,
    /// Changed fields only
    pub proposed_changes: BookFieldValues,
    pub status: SubmissionStatus,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Single-use credential for one {submission, action} pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionToken {
    pub token: String,
    pub submission_id: Uuid,
    pub action: ReviewDecision,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ActionToken {
    pub fn is_consumed(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
