//! Database access for shelf-canon
//!
//! Tables:
//! - `book_response_cache`: raw provider payloads, one column pair per source
//! - `books_canonical`: durable records, unique by ISBN
//! - `correction_submissions` / `correction_action_tokens`: review workflow

pub mod canonical_books;
pub mod corrections;
pub mod response_cache;
pub mod settings;

use shelf_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

pub use response_cache::{InMemoryResponseCache, ResponseCache, SqliteResponseCache, CACHE_TTL_DAYS};

/// Initialize database connection pool and service tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = shelf_common::db::init_database(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// In-memory database with service tables (tests and dry runs)
pub async fn init_in_memory_pool() -> Result<SqlitePool> {
    let pool = shelf_common::db::connect_in_memory().await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create shelf-canon tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS book_response_cache (
            isbn TEXT PRIMARY KEY,
            google_response TEXT,
            google_cached_at TEXT,
            open_library_response TEXT,
            open_library_cached_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books_canonical (
            id TEXT PRIMARY KEY,
            isbn TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            authors TEXT NOT NULL DEFAULT '[]',
            cover_url TEXT,
            description TEXT,
            page_count INTEGER,
            published_date TEXT,
            categories TEXT NOT NULL DEFAULT '[]',
            source_google INTEGER NOT NULL DEFAULT 0,
            source_open_library INTEGER NOT NULL DEFAULT 0,
            missing_fields TEXT NOT NULL DEFAULT '[]',
            missing_count INTEGER NOT NULL DEFAULT 0,
            community_edited INTEGER NOT NULL DEFAULT 0,
            last_edited_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_books_canonical_missing ON books_canonical (missing_count)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS correction_submissions (
            id TEXT PRIMARY KEY,
            isbn TEXT NOT NULL,
            book_id TEXT,
            submitter_id TEXT NOT NULL,
            original_data TEXT NOT NULL,
            proposed_changes TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected')),
            rejection_reason TEXT,
            reviewed_by TEXT,
            created_at TEXT NOT NULL,
            reviewed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_correction_submissions_status ON correction_submissions (status, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS correction_action_tokens (
            token TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL REFERENCES correction_submissions(id) ON DELETE CASCADE,
            action TEXT NOT NULL CHECK (action IN ('approve', 'reject')),
            expires_at TEXT NOT NULL,
            used_at TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (submission_id, action)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (book_response_cache, books_canonical, correction_submissions, correction_action_tokens)");

    Ok(())
}

/// Parse an RFC 3339 column value
pub(crate) fn parse_timestamp(
    column: &str,
    value: &str,
) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| shelf_common::Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
