//! shelf-canon library interface
//!
//! Canonical book resolution: one deduplicated record per ISBN, merged from
//! Google Books and Open Library, improved over time through reviewed
//! community corrections.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod isbn;
pub mod models;
pub mod services;
pub mod utils;
pub mod validators;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{CanonicalResolver, CorrectionWorkflow};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub resolver: Arc<CanonicalResolver>,
    pub corrections: Arc<CorrectionWorkflow>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// TOML file that mirrors settings written through the API
    pub toml_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(db: SqlitePool, resolver: CanonicalResolver, corrections: CorrectionWorkflow) -> Self {
        Self {
            db,
            resolver: Arc::new(resolver),
            corrections: Arc::new(corrections),
            startup_time: Utc::now(),
            toml_path: None,
        }
    }

    pub fn with_toml_path(mut self, path: Option<PathBuf>) -> Self {
        self.toml_path = path;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::book_routes())
        .merge(api::correction_routes())
        .merge(api::review_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
