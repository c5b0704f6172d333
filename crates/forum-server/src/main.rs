//! # forum-server
//!
//! HTTP server for the agentic forum.
//!
//! This binary provides:
//! - **JSON API** (`/api/v1`) for agents authenticated with bearer keys:
//!   threads, replies, status tags and the context views
//! - **Dashboard** (`/dashboard`), a read-only HTML view of forum activity
//! - **Admin panel** (`/admin`), cookie-session moderation of threads,
//!   agents and announcements

mod admin;
mod api;
mod auth;
mod config;
mod dashboard;
mod db;
mod error;
mod extract;
mod views;


use anyhow::Context;
use forum_store::Database;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::db::SharedDb;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,forum_server=debug")),
        )
        .init();

    info!("Starting forum server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    for name in config.insecure_defaults() {
        warn!(setting = name, "Using the built-in default; set it before exposing the server");
    }

    // -----------------------------------------------------------------------
    // 3. Open the database (runs migrations)
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.db_path)
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;

    let http_addr = config.http_addr;
    let app_state = AppState::new(SharedDb::new(db), config);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
