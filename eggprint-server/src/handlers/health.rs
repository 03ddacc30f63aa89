//! Health check handler

use axum::{extract::State, Json};
use eggprint_core::AlgorithmId;
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Algorithm of the loaded manifest
    pub algorithm: AlgorithmId,
    /// Number of fingerprints in the loaded manifest
    pub manifest_images: usize,
}

/// GET /health - Health check endpoint
///
/// The server refuses to start without a valid manifest, so a running
/// instance is always healthy.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "eggprint-server",
        algorithm: state.matcher.algorithm(),
        manifest_images: state.matcher.manifest().len(),
    })
}
