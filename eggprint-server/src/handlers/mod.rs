//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod manifest;
pub mod match_image;

pub use crate::state::AppState;
pub use health::{health, HealthResponse};
pub use manifest::{manifest_info, ClassCounts, ManifestInfo};
pub use match_image::{
    match_fingerprint_handler, match_handler, FingerprintMatchRequest, MatchResponse,
    VersionMismatchInfo,
};
