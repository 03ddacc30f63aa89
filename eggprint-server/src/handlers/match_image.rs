//! Duplicate match handlers
//!
//! - POST /match takes an uploaded image, hashes it with the manifest's
//!   algorithm and returns the duplicate verdict.
//! - POST /match/fingerprint takes hashes computed client-side (e.g. by the
//!   Wasm bindings) and compares them directly.

use axum::{
    extract::{Multipart, State},
    Json,
};
use eggprint_core::{
    AlgorithmId, Fingerprint, FingerprintEntry, FingerprintError, HashVariants, MatchOutcome,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;
use crate::validation::parse_threshold;

/// Algorithms of a rejected comparison.
#[derive(Debug, Serialize)]
pub struct VersionMismatchInfo {
    pub manifest: AlgorithmId,
    pub query: AlgorithmId,
}

/// Response of both match endpoints.
#[derive(Debug, Serialize)]
pub struct MatchResponse {
    /// Whether the image duplicates a manifest entry
    pub duplicate: bool,
    /// Aggregate similarity of the closest entry; absent on a version mismatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Threshold the verdict was taken against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Closest manifest entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_entry: Option<FingerprintEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_mismatch: Option<VersionMismatchInfo>,
}

impl From<MatchOutcome> for MatchResponse {
    fn from(outcome: MatchOutcome) -> Self {
        match outcome {
            MatchOutcome::Match(result) => Self {
                duplicate: result.duplicate,
                similarity: Some(result.similarity),
                threshold: Some(result.threshold),
                matched_entry: result.matched_entry,
                version_mismatch: None,
            },
            MatchOutcome::VersionMismatch { manifest, query } => Self {
                duplicate: false,
                similarity: None,
                threshold: None,
                matched_entry: None,
                version_mismatch: Some(VersionMismatchInfo { manifest, query }),
            },
        }
    }
}

/// POST /match - Check an uploaded image against the manifest
///
/// Accepts multipart/form-data with:
/// - file: the image (JPEG, PNG, BMP, GIF or WebP)
/// - threshold (optional): similarity threshold override in `[0, 1]`
pub async fn match_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MatchResponse>, ApiError> {
    let mut fields = MultipartFields::parse(&mut multipart, state.max_file_size).await?;
    let threshold = fields.get_text("threshold").map(parse_threshold).transpose()?;
    let file = fields.take_file()?;

    info!(
        bytes = file.data.len(),
        file_name = file.file_name.as_deref().unwrap_or("-"),
        content_type = file.content_type.as_deref().unwrap_or("-"),
        "Matching upload"
    );

    // waits while max_concurrent_decodes uploads are in flight
    let permit = state
        .decode_permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ApiError::internal(format!("Decode limiter closed: {}", e)))?;

    // decoding and hashing are CPU-bound
    let matcher = state.matcher.clone();
    let limits = state.decode_limits.clone();
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        matcher.match_image_bytes(&file.data, &limits, threshold)
    });

    let joined = match state.decode_timeout {
        Some(deadline) => tokio::time::timeout(deadline, task).await.map_err(|_| {
            warn!(timeout_ms = deadline.as_millis() as u64, "Upload decode timed out");
            FingerprintError::DecodeTimeout {
                timeout_ms: deadline.as_millis() as u64,
            }
        })?,
        None => task.await,
    };
    let outcome = joined.map_err(|e| ApiError::internal(format!("Match task failed: {}", e)))??;

    log_outcome(&outcome);
    Ok(Json(outcome.into()))
}

/// Request body of POST /match/fingerprint.
#[derive(Debug, Deserialize)]
pub struct FingerprintMatchRequest {
    /// Algorithm the hashes were computed with
    #[serde(alias = "algorithm")]
    pub algorithm_id: AlgorithmId,
    pub hashes: HashVariants,
    /// Similarity threshold override in `[0, 1]`
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// POST /match/fingerprint - Compare precomputed hashes against the manifest
///
/// Hashes from another algorithm yield `version_mismatch` instead of a score.
pub async fn match_fingerprint_handler(
    State(state): State<AppState>,
    Json(request): Json<FingerprintMatchRequest>,
) -> Result<Json<MatchResponse>, ApiError> {
    if let Some(t) = request.threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(ApiError::bad_request(format!(
                "Threshold must be between 0 and 1, got {}",
                t
            )));
        }
    }

    let fingerprint = Fingerprint {
        algorithm: request.algorithm_id,
        hashes: request.hashes,
    };
    let outcome = state
        .matcher
        .match_fingerprint(&fingerprint, request.threshold);

    log_outcome(&outcome);
    Ok(Json(outcome.into()))
}

fn log_outcome(outcome: &MatchOutcome) {
    match outcome {
        MatchOutcome::Match(result) => info!(
            duplicate = result.duplicate,
            similarity = result.similarity,
            matched = result
                .matched_entry
                .as_ref()
                .map(|e| e.relative_filename.as_str())
                .unwrap_or("-"),
            "Match complete"
        ),
        MatchOutcome::VersionMismatch { manifest, query } => info!(
            manifest = %manifest,
            query = %query,
            "Rejected hashes from another algorithm"
        ),
    }
}
