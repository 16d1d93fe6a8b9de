//! Settings API endpoint
//!
//! Provides POST /settings/google_books_api_key

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

/// POST /settings/google_books_api_key
///
/// **Behavior:**
/// 1. Validate key (non-empty, non-whitespace)
/// 2. Write to database (authoritative)
/// 3. Sync to TOML (best-effort backup)
///
/// The running Google Books client keeps its key; the new one applies on
/// restart.
pub async fn set_google_books_api_key(
    State(state): State<AppState>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    if !crate::config::is_valid_value(&payload.api_key) {
        return Err(ApiError::bad_request(
            "INVALID_VALUE",
            "API key cannot be empty or whitespace-only",
        ));
    }
    let key = payload.api_key.trim().to_string();

    crate::db::settings::set_google_books_api_key(&state.db, key.clone()).await?;
    info!("Google Books API key configured via API");

    if let Some(path) = &state.toml_path {
        crate::config::sync_api_key_to_toml(&key, path);
    }

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "Google Books API key saved; restart to apply".to_string(),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/settings/google_books_api_key", post(set_google_books_api_key))
}
