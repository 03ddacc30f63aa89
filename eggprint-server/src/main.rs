//! Eggprint Server - REST API for training-set duplicate detection
//!
//! Loads a fingerprint manifest at startup and exposes:
//! - POST /match - Check an uploaded image against the manifest
//! - POST /match/fingerprint - Check precomputed hashes against the manifest
//! - GET /manifest - Loaded manifest metadata
//! - GET /health - Health check

use eggprint_server::{create_router, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eggprint_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(
                manifest = %config.manifest_path.display(),
                error = %e,
                "Failed to load fingerprint manifest"
            );
            std::process::exit(1);
        }
    };

    tracing::info!(
        algorithm = %state.matcher.algorithm(),
        images = state.matcher.manifest().len(),
        threshold = state.matcher.default_threshold(),
        "Manifest loaded"
    );

    let app = create_router(state, &config);
    let addr = config.socket_addr();

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Eggprint server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutting down");
}
