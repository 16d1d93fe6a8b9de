//! Correction endpoints for submitters and in-app reviewers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::books::BookResponse;
use crate::models::{CorrectionSubmission, ReviewDecision, SubmissionStatus};
use crate::services::NewCorrection;
use crate::{ApiResult, AppState};

const DEFAULT_PENDING_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub status: SubmissionStatus,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    pub reviewer_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub submission: CorrectionSubmission,
    /// Updated canonical record after an approval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookResponse>,
}

#[derive(Debug, Deserialize)]
pub struct RejectionReasonRequest {
    pub reason: String,
}

/// POST /corrections
///
/// **Errors:** 400 for a bad ISBN, unknown field, bad value, or no changes
pub async fn submit_correction(
    State(state): State<AppState>,
    Json(payload): Json<NewCorrection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let submission = state.corrections.submit(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            id: submission.id,
            status: submission.status,
        }),
    ))
}

/// GET /corrections/pending
pub async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<Vec<CorrectionSubmission>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PENDING_LIMIT).max(1);
    Ok(Json(state.corrections.pending(limit).await?))
}

/// GET /corrections/:id
pub async fn get_correction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CorrectionSubmission>> {
    Ok(Json(state.corrections.find(id).await?))
}

/// POST /corrections/:id/review
///
/// **Errors:** 404 unknown submission, 409 already resolved
pub async fn review_correction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<Json<ReviewResponse>> {
    let resolution = state
        .corrections
        .resolve_by_reviewer(id, payload.decision, &payload.reviewer_id, payload.reason.as_deref())
        .await?;

    Ok(Json(ReviewResponse {
        submission: resolution.submission,
        book: resolution.book.map(BookResponse::from),
    }))
}

/// PUT /corrections/:id/rejection-reason
pub async fn set_rejection_reason(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectionReasonRequest>,
) -> ApiResult<StatusCode> {
    state.corrections.attach_rejection_reason(id, &payload.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build correction routes
pub fn correction_routes() -> Router<AppState> {
    Router::new()
        .route("/corrections", post(submit_correction))
        .route("/corrections/pending", get(list_pending))
        .route("/corrections/:id", get(get_correction))
        .route("/corrections/:id/review", post(review_correction))
        .route("/corrections/:id/rejection-reason", put(set_rejection_reason))
}
