//! Configuration resolution for shelf-canon
//!
//! Service settings resolve Database → ENV → TOML → default. The database is
//! authoritative; a value present in more than one tier is logged so a stale
//! override is easy to spot.

use shelf_common::config::TomlConfig;
use shelf_common::Result;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{info, warn};

use crate::db::settings;

pub const GOOGLE_BOOKS_API_KEY_ENV: &str = "SHELF_GOOGLE_BOOKS_API_KEY";
pub const PUBLIC_BASE_URL_ENV: &str = "SHELF_PUBLIC_BASE_URL";
pub const NOTIFY_WEBHOOK_URL_ENV: &str = "SHELF_NOTIFY_WEBHOOK_URL";

/// Where a resolved setting came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    Database,
    Environment,
    Toml,
}

impl SettingSource {
    fn as_str(self) -> &'static str {
        match self {
            SettingSource::Database => "database",
            SettingSource::Environment => "environment",
            SettingSource::Toml => "TOML",
        }
    }
}

/// Settings the service needs at startup
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    /// Optional; Google Books answers keyless requests at a lower quota
    pub google_books_api_key: Option<String>,
    /// Prefix for review action links
    pub public_base_url: String,
    /// No webhook means review links are only logged
    pub notify_webhook_url: Option<String>,
    pub max_lock_wait_ms: u64,
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve one setting through the three tiers
pub async fn resolve_setting(
    db: &Pool<Sqlite>,
    key: &str,
    env_var: &str,
    toml_value: Option<&String>,
) -> Result<Option<(String, SettingSource)>> {
    let candidates = [
        (
            settings::get_setting::<String>(db, key).await?,
            SettingSource::Database,
        ),
        (std::env::var(env_var).ok(), SettingSource::Environment),
        (toml_value.cloned(), SettingSource::Toml),
    ];

    let present: Vec<(String, SettingSource)> = candidates
        .into_iter()
        .filter_map(|(value, source)| value.filter(|v| is_valid_value(v)).map(|v| (v.trim().to_string(), source)))
        .collect();

    if present.len() > 1 {
        let sources: Vec<&str> = present.iter().map(|(_, s)| s.as_str()).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            key,
            sources.join(", "),
            present[0].1.as_str()
        );
    }

    Ok(present.into_iter().next())
}

/// Resolve all service settings
///
/// `default_base_url` applies when no tier sets a public base URL.
pub async fn resolve_service_settings(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    default_base_url: &str,
) -> Result<ServiceSettings> {
    let google_books_api_key = resolve_setting(
        db,
        settings::GOOGLE_BOOKS_API_KEY,
        GOOGLE_BOOKS_API_KEY_ENV,
        toml_config.google_books_api_key.as_ref(),
    )
    .await?;
    match &google_books_api_key {
        Some((_, source)) => info!("Google Books API key loaded from {}", source.as_str()),
        None => info!("No Google Books API key configured; using keyless quota"),
    }

    let public_base_url = resolve_setting(
        db,
        settings::PUBLIC_BASE_URL,
        PUBLIC_BASE_URL_ENV,
        toml_config.public_base_url.as_ref(),
    )
    .await?
    .map(|(url, _)| url)
    .unwrap_or_else(|| default_base_url.to_string());

    let notify_webhook_url = resolve_setting(
        db,
        settings::NOTIFY_WEBHOOK_URL,
        NOTIFY_WEBHOOK_URL_ENV,
        toml_config.notify_webhook_url.as_ref(),
    )
    .await?
    .map(|(url, _)| url);

    Ok(ServiceSettings {
        google_books_api_key: google_books_api_key.map(|(key, _)| key),
        public_base_url,
        notify_webhook_url,
        max_lock_wait_ms: settings::get_max_lock_wait_ms(db).await?,
    })
}

/// Copy the Google Books key into the TOML file as a backup of the database
///
/// Best effort: failures are logged and swallowed.
pub fn sync_api_key_to_toml(key: &str, toml_path: &Path) {
    let mut config = if toml_path.exists() {
        match shelf_common::config::read_toml_config(toml_path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Not syncing API key to unreadable TOML {}: {}", toml_path.display(), e);
                return;
            }
        }
    } else {
        TomlConfig::default()
    };

    config.google_books_api_key = Some(key.to_string());

    match shelf_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => info!("Settings synced to TOML: {}", toml_path.display()),
        Err(e) => warn!("TOML write failed (database write succeeded): {}", e),
    }
}
