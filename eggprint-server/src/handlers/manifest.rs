//! Manifest metadata handler

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use eggprint_core::{AlgorithmId, ClassLabel};
use serde::Serialize;

use crate::state::AppState;

/// Fingerprint count per class.
#[derive(Serialize)]
pub struct ClassCounts {
    pub fertile: usize,
    pub infertile: usize,
}

/// Metadata of the manifest the server matches against.
#[derive(Serialize)]
pub struct ManifestInfo {
    pub version: String,
    pub algorithm_id: AlgorithmId,
    pub generated_at: DateTime<Utc>,
    pub total_images: usize,
    pub similarity_threshold: f64,
    pub classes: ClassCounts,
}

/// GET /manifest - Loaded manifest metadata and entry counts
pub async fn manifest_info(State(state): State<AppState>) -> Json<ManifestInfo> {
    let manifest = state.matcher.manifest();
    let meta = &manifest.metadata;

    Json(ManifestInfo {
        version: meta.version.clone(),
        algorithm_id: meta.algorithm_id,
        generated_at: meta.generated_at,
        total_images: meta.total_images,
        similarity_threshold: meta.similarity_threshold,
        classes: ClassCounts {
            fertile: manifest.entries_for(ClassLabel::Fertile).count(),
            infertile: manifest.entries_for(ClassLabel::Infertile).count(),
        },
    })
}
