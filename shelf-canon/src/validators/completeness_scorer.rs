//! Completeness Scorer
//!
//! Summarizes how many of the seven tracked fields a canonical record holds.
//!
//! # Scoring Algorithm
//! `percentage = round(100 * (7 - |missing|) / 7)`
//!
//! # Labels
//! - Complete: percentage ≥ 90
//! - Good: percentage ≥ 70
//! - Partial: percentage ≥ 50
//! - Incomplete: below 50
//!
//! Pure and total: called synchronously while rendering, so it never touches
//! storage or network.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::models::{BookField, CanonicalBook};

/// Number of fields tracked for completeness
pub const TRACKED_FIELD_COUNT: usize = BookField::ALL.len();

/// Display severity paired with each label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// Completeness summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletenessScore {
    /// 0-100
    pub percentage: u8,
    pub label: &'static str,
    pub severity: Severity,
}

/// Score a set of missing fields
pub fn score(missing_fields: &BTreeSet<BookField>) -> CompletenessScore {
    let missing = missing_fields.len().min(TRACKED_FIELD_COUNT);
    let present = (TRACKED_FIELD_COUNT - missing) as f64;
    let percentage = (100.0 * present / TRACKED_FIELD_COUNT as f64).round() as u8;

    let (label, severity) = if percentage >= 90 {
        ("Complete", Severity::Success)
    } else if percentage >= 70 {
        ("Good", Severity::Info)
    } else if percentage >= 50 {
        ("Partial", Severity::Warning)
    } else {
        ("Incomplete", Severity::Error)
    };

    CompletenessScore {
        percentage,
        label,
        severity,
    }
}

/// Score a canonical record from its stored `missing_fields`
pub fn score_book(book: &CanonicalBook) -> CompletenessScore {
    score(&book.missing_fields)
}
