//! shelf-canon - Canonical Book Service
//!
//! **Module Identity:**
//! - Name: shelf-canon
//! - Port: 5731 (default)
//!
//! Resolves ISBNs into canonical book records and runs the community
//! correction review workflow.

use anyhow::{Context, Result};
use clap::Parser;
use shelf_canon::db::SqliteResponseCache;
use shelf_canon::services::{
    CanonicalResolver, CorrectionWorkflow, GoogleBooksClient, LogNotifier, Notifier, OpenLibraryClient,
    WebhookNotifier,
};
use shelf_canon::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "shelf-canon")]
#[command(about = "Canonical book resolution service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5731", env = "SHELF_CANON_PORT")]
    port: u16,

    /// Root folder holding the database (overrides SHELF_ROOT_FOLDER and TOML)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read before the subscriber exists so `[logging] level` can seed the filter
    let toml_config = shelf_common::config::load_toml_config();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                toml_config
                    .logging
                    .filter_directive(&["shelf_canon", "tower_http"])
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting shelf-canon (Canonical Book Service)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = shelf_common::config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = shelf_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db_pool = shelf_canon::db::init_database_pool(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let default_base_url = format!("http://localhost:{}", args.port);
    let settings = shelf_canon::config::resolve_service_settings(&db_pool, &toml_config, &default_base_url)
        .await
        .context("Failed to resolve service settings")?;

    let google = GoogleBooksClient::new(settings.google_books_api_key.clone())
        .context("Failed to build Google Books client")?;
    let open_library = OpenLibraryClient::new().context("Failed to build Open Library client")?;

    let notifier: Arc<dyn Notifier> = match &settings.notify_webhook_url {
        Some(url) => {
            info!("Review notifications: webhook {}", url);
            Arc::new(WebhookNotifier::new(url.as_str()).context("Failed to build webhook notifier")?)
        }
        None => {
            warn!("No notify webhook configured; review links will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let resolver = CanonicalResolver::new(
        db_pool.clone(),
        Arc::new(SqliteResponseCache::new(db_pool.clone())),
        Arc::new(google),
        Arc::new(open_library),
    );
    let corrections = CorrectionWorkflow::new(
        db_pool.clone(),
        notifier,
        &settings.public_base_url,
        settings.max_lock_wait_ms,
    );
    info!("Review links use base URL {}", settings.public_base_url);

    let state = AppState::new(db_pool, resolver, corrections)
        .with_toml_path(shelf_common::config::user_config_path());
    let app = shelf_canon::build_router(state);

    let ip = toml_config
        .bind_address
        .as_deref()
        .unwrap_or("127.0.0.1")
        .parse::<std::net::IpAddr>()
        .context("Invalid bind_address in config")?;
    let addr = SocketAddr::new(ip, args.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
