//! Settings database operations
//!
//! Key-value accessors over the shared `settings` table.

use shelf_common::{Error, Result};
use sqlx::{Pool, Sqlite};

pub const GOOGLE_BOOKS_API_KEY: &str = "google_books_api_key";
pub const PUBLIC_BASE_URL: &str = "public_base_url";
pub const NOTIFY_WEBHOOK_URL: &str = "notify_webhook_url";
pub const MAX_LOCK_WAIT_MS: &str = "canon_database_max_lock_wait_ms";

/// Get Google Books API key from database
pub async fn get_google_books_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, GOOGLE_BOOKS_API_KEY).await
}

/// Set Google Books API key in database
pub async fn set_google_books_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, GOOGLE_BOOKS_API_KEY, key).await
}

/// Maximum time to retry a locked correction transaction
///
/// **Default:** 5000 ms
pub async fn get_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, MAX_LOCK_WAIT_MS)
        .await
        .map(|opt| opt.unwrap_or(crate::utils::db_retry::DEFAULT_MAX_LOCK_WAIT_MS))
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory_pool;

    #[tokio::test]
    async fn test_get_api_key_not_set() {
        let pool = init_in_memory_pool().await.unwrap();
        assert_eq!(get_google_books_api_key(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_api_key_upserts() {
        let pool = init_in_memory_pool().await.unwrap();

        set_google_books_api_key(&pool, "old_key".to_string()).await.unwrap();
        set_google_books_api_key(&pool, "new_key".to_string()).await.unwrap();

        assert_eq!(
            get_google_books_api_key(&pool).await.unwrap(),
            Some("new_key".to_string())
        );
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = ?")
            .bind(GOOGLE_BOOKS_API_KEY)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_max_lock_wait_default_and_override() {
        let pool = init_in_memory_pool().await.unwrap();
        assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), 5000);

        set_setting(&pool, MAX_LOCK_WAIT_MS, 250u64).await.unwrap();
        assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn test_unparsable_setting_is_config_error() {
        let pool = init_in_memory_pool().await.unwrap();
        set_setting(&pool, MAX_LOCK_WAIT_MS, "soon").await.unwrap();

        let err = get_max_lock_wait_ms(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
