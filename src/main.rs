//! Node Metadata API
//!
//! Administrators define preset metadata definitions (named, typed fields)
//! on a configuration page. Every build node carries a tree of metadata
//! values that is saved with the node's configuration.
//!
//! State lives in JSON documents under `DATA_DIR`:
//! - `definitions.json`: the configured definition list
//! - `nodes/<name>.json`: one document per node, metadata included

mod auth;
mod config;
mod error;
mod metadata;
mod models;
mod nodes;
mod routes;
mod state;
mod storage;
mod users;

use crate::config::{Settings, DEV_JWT_SECRET};
use crate::routes::{create_router, URL_NAME};
use crate::state::AppState;
use crate::storage::FileStorage;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Node Metadata service...");

    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    if settings.auth.jwt_secret == DEV_JWT_SECRET {
        warn!("⚠️  JWT_SECRET not set, using default (INSECURE - set in production!)");
    }

    let storage = Arc::new(FileStorage::new(&settings.storage.data_dir));
    info!("💾 Storing configuration in {}", storage.root().display());

    let state = Arc::new(AppState::load(storage, &settings).await?);
    info!(
        "✅ Restored {} definitions and {} nodes",
        state.definitions.count().await,
        state.nodes.count().await
    );

    let app = create_router(state, &settings);
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Authentication ───");
    info!("   POST /api/auth/login                         - Login with email/password");
    info!("   POST /api/auth/refresh                       - Refresh access token");
    info!("   GET  /api/auth/me                            - Get current user");
    info!("");
    info!("   ─── Metadata Configuration ───");
    info!("   GET  /{}/page          - Page descriptor", URL_NAME);
    info!("   GET  /{}/descriptors   - Definition kinds", URL_NAME);
    info!("   GET  /{}/definitions   - Current definitions", URL_NAME);
    info!("   POST /{}/configSubmit  - Replace definitions (Admin only)", URL_NAME);
    info!("");
    info!("   ─── Nodes ───");
    info!("   GET  /api/nodes                              - List nodes");
    info!("   POST /api/nodes                              - Register a node");
    info!("   POST /api/nodes/:name/reload                 - Reload saved configuration");
    info!("   POST /api/nodes/:name/apply-definitions      - Fill in definition defaults");
    info!("   GET  /api/nodes/:name/metadata/*path         - Look up metadata");
    info!("   PUT  /api/nodes/:name/metadata/*path         - Set a metadata value");
    info!("   POST /api/nodes/:name/metadata/*path         - Create an empty branch");
    info!("   DEL  /api/nodes/:name/metadata/*path         - Remove metadata");
    info!("");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,node_metadata=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
