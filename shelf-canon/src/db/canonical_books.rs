//! Canonical book database operations
//!
//! Functions are generic over the executor so they run on the pool or inside
//! a transaction.

use shelf_common::{Error, Result};
use sqlx::{Sqlite, SqlitePool};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::parse_timestamp;
use crate::models::{BookField, CanonicalBook};

const COLUMNS: &str = "id, isbn, title, authors, cover_url, description, page_count, \
    published_date, categories, source_google, source_open_library, missing_fields, \
    community_edited, last_edited_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CanonicalRow {
    id: String,
    isbn: String,
    title: String,
    authors: String,
    cover_url: Option<String>,
    description: Option<String>,
    page_count: Option<i64>,
    published_date: Option<String>,
    categories: String,
    source_google: bool,
    source_open_library: bool,
    missing_fields: String,
    community_edited: bool,
    last_edited_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CanonicalRow> for CanonicalBook {
    type Error = Error;

    fn try_from(row: CanonicalRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Internal(format!("Invalid canonical id {}: {}", row.id, e)))?;
        let authors: Vec<String> = serde_json::from_str(&row.authors)?;
        let categories: Vec<String> = serde_json::from_str(&row.categories)?;
        let missing_fields: BTreeSet<BookField> = serde_json::from_str(&row.missing_fields)?;

        Ok(CanonicalBook {
            id,
            isbn: row.isbn,
            title: row.title,
            authors,
            cover_url: row.cover_url,
            description: row.description,
            page_count: row.page_count,
            published_date: row.published_date,
            categories,
            source_google: row.source_google,
            source_open_library: row.source_open_library,
            missing_fields,
            community_edited: row.community_edited,
            last_edited_by: row.last_edited_by,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
        })
    }
}

/// Find canonical book by normalized ISBN
pub async fn find_by_isbn<'e, E>(executor: E, isbn: &str) -> Result<Option<CanonicalBook>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let query = format!("SELECT {COLUMNS} FROM books_canonical WHERE isbn = ?");
    let row: Option<CanonicalRow> = sqlx::query_as(&query)
        .bind(isbn)
        .fetch_optional(executor)
        .await?;

    row.map(CanonicalBook::try_from).transpose()
}

/// Insert unless a record for the ISBN exists
///
/// Returns `false` when the unique ISBN constraint kept an existing row
/// (a concurrent creator won).
pub async fn insert_if_absent<'e, E>(executor: E, book: &CanonicalBook) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let query = format!(
        "INSERT INTO books_canonical ({COLUMNS}, missing_count)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(isbn) DO NOTHING"
    );

    let result = sqlx::query(&query)
        .bind(book.id.to_string())
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(serde_json::to_string(&book.authors)?)
        .bind(&book.cover_url)
        .bind(&book.description)
        .bind(book.page_count)
        .bind(&book.published_date)
        .bind(serde_json::to_string(&book.categories)?)
        .bind(book.source_google)
        .bind(book.source_open_library)
        .bind(serde_json::to_string(&book.missing_fields)?)
        .bind(book.community_edited)
        .bind(&book.last_edited_by)
        .bind(book.created_at.to_rfc3339())
        .bind(book.updated_at.to_rfc3339())
        .bind(book.missing_fields.len() as i64)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Overwrite the editable columns and audit fields of an existing record
pub async fn update<'e, E>(executor: E, book: &CanonicalBook) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE books_canonical
        SET
            title = ?,
            authors = ?,
            cover_url = ?,
            description = ?,
            page_count = ?,
            published_date = ?,
            categories = ?,
            missing_fields = ?,
            missing_count = ?,
            community_edited = ?,
            last_edited_by = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&book.title)
    .bind(serde_json::to_string(&book.authors)?)
    .bind(&book.cover_url)
    .bind(&book.description)
    .bind(book.page_count)
    .bind(&book.published_date)
    .bind(serde_json::to_string(&book.categories)?)
    .bind(serde_json::to_string(&book.missing_fields)?)
    .bind(book.missing_fields.len() as i64)
    .bind(book.community_edited)
    .bind(&book.last_edited_by)
    .bind(book.updated_at.to_rfc3339())
    .bind(book.id.to_string())
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("canonical book {}", book.id)));
    }

    Ok(())
}

/// Records with at least one missing field, most-missing first
///
/// With `field`, only records missing that field.
pub async fn list_incomplete(
    pool: &SqlitePool,
    field: Option<BookField>,
    limit: u32,
) -> Result<Vec<CanonicalBook>> {
    let rows: Vec<CanonicalRow> = match field {
        Some(field) => {
            let query = format!(
                "SELECT {COLUMNS} FROM books_canonical
                 WHERE EXISTS (SELECT 1 FROM json_each(books_canonical.missing_fields) WHERE value = ?)
                 ORDER BY missing_count DESC, updated_at ASC
                 LIMIT ?"
            );
            sqlx::query_as(&query)
                .bind(field.canonical_name())
                .bind(limit as i64)
                .fetch_all(pool)
                .await?
        }
        None => {
            let query = format!(
                "SELECT {COLUMNS} FROM books_canonical
                 WHERE missing_count > 0
                 ORDER BY missing_count DESC, updated_at ASC
                 LIMIT ?"
            );
            sqlx::query_as(&query)
                .bind(limit as i64)
                .fetch_all(pool)
                .await?
        }
    };

    rows.into_iter().map(CanonicalBook::try_from).collect()
}
