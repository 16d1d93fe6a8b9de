//! Canonical book endpoints
//!
//! - `GET /books/:isbn`: resolve (creating on first sight) with completeness
//! - `GET /books/:isbn/snapshot`: submission-schema view of a stored record
//! - `GET /books/incomplete`: curation queue of records with missing fields

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::canonical_books;
use crate::models::{BookField, BookFieldValues, CanonicalBook};
use crate::validators::{score_book, CompletenessScore};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_INCOMPLETE_LIMIT: u32 = 50;
const MAX_INCOMPLETE_LIMIT: u32 = 500;

/// Canonical record plus its completeness summary
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub book: CanonicalBook,
    pub completeness: CompletenessScore,
}

impl From<CanonicalBook> for BookResponse {
    fn from(book: CanonicalBook) -> Self {
        let completeness = score_book(&book);
        Self { book, completeness }
    }
}

#[derive(Debug, Deserialize)]
pub struct IncompleteQuery {
    /// Canonical or submission field name
    pub field: Option<String>,
    pub limit: Option<u32>,
}

/// GET /books/:isbn
pub async fn get_book(State(state): State<AppState>, Path(isbn): Path<String>) -> ApiResult<Json<BookResponse>> {
    let book = state.resolver.lookup(&isbn).await?;
    Ok(Json(book.into()))
}

/// GET /books/:isbn/snapshot
///
/// Never triggers a provider fetch.
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> ApiResult<Json<BookFieldValues>> {
    let book = state
        .resolver
        .find_existing(&isbn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No canonical record for ISBN {}", isbn)))?;

    Ok(Json(book.to_field_values()))
}

/// GET /books/incomplete?field=&limit=
pub async fn list_incomplete(
    State(state): State<AppState>,
    Query(query): Query<IncompleteQuery>,
) -> ApiResult<Json<Vec<BookResponse>>> {
    let field = match query.field.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        None => None,
        Some(name) => Some(
            BookField::from_canonical_name(name)
                .or_else(|| BookField::from_submission_name(name))
                .ok_or_else(|| ApiError::bad_request("UNKNOWN_FIELD", format!("Unknown field: {}", name)))?,
        ),
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_INCOMPLETE_LIMIT)
        .clamp(1, MAX_INCOMPLETE_LIMIT);

    let books = canonical_books::list_incomplete(&state.db, field, limit).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// Build book routes
pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/books/incomplete", get(list_incomplete))
        .route("/books/:isbn", get(get_book))
        .route("/books/:isbn/snapshot", get(get_snapshot))
}
