//! Review action page - unauthenticated landing page for emailed links
//!
//! The token in the query string is the credential. Every outcome renders a
//! complete HTML page; there is no JSON variant.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::models::BookField;
use crate::services::{CorrectionError, Resolution};
use crate::utils::escape_html;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    #[serde(default)]
    pub token: String,
    pub reason: Option<String>,
}

/// Visible outcome of presenting a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPageState {
    Approved,
    Rejected,
    Expired,
    AlreadyUsed,
    NotFound,
    Error,
}

impl ReviewPageState {
    pub fn status_code(self) -> StatusCode {
        match self {
            ReviewPageState::Approved | ReviewPageState::Rejected => StatusCode::OK,
            ReviewPageState::Expired | ReviewPageState::AlreadyUsed => StatusCode::GONE,
            ReviewPageState::NotFound => StatusCode::NOT_FOUND,
            ReviewPageState::Error => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn heading(self) -> &'static str {
        match self {
            ReviewPageState::Approved => "Correction approved",
            ReviewPageState::Rejected => "Correction rejected",
            ReviewPageState::Expired => "Link expired",
            ReviewPageState::AlreadyUsed => "Already reviewed",
            ReviewPageState::NotFound => "Link not recognized",
            ReviewPageState::Error => "Something went wrong",
        }
    }

    fn accent(self) -> &'static str {
        match self {
            ReviewPageState::Approved => "#4caf50",
            ReviewPageState::Rejected => "#ff9800",
            ReviewPageState::Expired | ReviewPageState::AlreadyUsed => "#888888",
            ReviewPageState::NotFound | ReviewPageState::Error => "#f44336",
        }
    }
}

/// Map a token resolution result to a page state and body text
pub fn outcome(result: &Result<Resolution, CorrectionError>) -> (ReviewPageState, String) {
    match result {
        Ok(resolution) => match &resolution.book {
            Some(book) => {
                let fields: Vec<&str> = BookField::ALL
                    .into_iter()
                    .filter(|f| resolution.submission.proposed_changes.get(*f).is_some())
                    .map(BookField::submission_name)
                    .collect();
                (
                    ReviewPageState::Approved,
                    format!(
                        "The changes to <strong>{}</strong> (ISBN {}) are now live: {}.",
                        escape_html(&book.title),
                        escape_html(&book.isbn),
                        escape_html(&fields.join(", "))
                    ),
                )
            }
            None => {
                let reason = resolution
                    .submission
                    .rejection_reason
                    .as_deref()
                    .map(|r| format!(" Reason recorded: {}", escape_html(r)))
                    .unwrap_or_default();
                (
                    ReviewPageState::Rejected,
                    format!(
                        "The correction for ISBN {} was rejected. The book record is unchanged.{}",
                        escape_html(&resolution.submission.isbn),
                        reason
                    ),
                )
            }
        },
        Err(CorrectionError::TokenExpired) => (
            ReviewPageState::Expired,
            "This review link is older than 48 hours and can no longer be used. \
             The correction is still waiting in the in-app review queue."
                .to_string(),
        ),
        Err(CorrectionError::TokenConsumed) => (
            ReviewPageState::AlreadyUsed,
            "This correction has already been approved or rejected. Nothing was changed.".to_string(),
        ),
        Err(CorrectionError::TokenInvalid) | Err(CorrectionError::SubmissionNotFound(_)) => (
            ReviewPageState::NotFound,
            "This review link does not match any correction. Check that the full link was copied."
                .to_string(),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Review action failed");
            (
                ReviewPageState::Error,
                "The decision could not be recorded. Please try the link again later.".to_string(),
            )
        }
    }
}

/// Render a terminal review page
pub fn render_page(state: ReviewPageState, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="robots" content="noindex">
    <title>Shelf - {heading}</title>
    <style>
        body {{
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 640px;
            margin: 60px auto;
            padding: 20px;
            line-height: 1.6;
            background: #1a1a1a;
            color: #e0e0e0;
        }}
        h1 {{
            color: {accent};
            border-bottom: 2px solid {accent};
            padding-bottom: 10px;
        }}
    </style>
</head>
<body>
    <h1>{heading}</h1>
    <p>{body}</p>
</body>
</html>
"#,
        heading = state.heading(),
        accent = state.accent(),
        body = body,
    )
}

/// GET /review/action?token=&reason=
pub async fn review_action(State(state): State<AppState>, Query(query): Query<ActionQuery>) -> Response {
    let result = state
        .corrections
        .resolve_by_token(&query.token, query.reason.as_deref())
        .await;

    let (page_state, body) = outcome(&result);
    (page_state.status_code(), Html(render_page(page_state, &body))).into_response()
}

/// Build review page routes
pub fn review_routes() -> Router<AppState> {
    Router::new().route("/review/action", get(review_action))
}
