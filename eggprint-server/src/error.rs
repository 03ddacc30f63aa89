//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use eggprint_core::FingerprintError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Fingerprinting error from the core library
    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Fingerprint(e) => match e {
                FingerprintError::UnsupportedImageFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                FingerprintError::ImageDecode(_) | FingerprintError::InvalidBitString(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                FingerprintError::ImageTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                FingerprintError::DecodeTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
                FingerprintError::AlgorithmVersionMismatch { .. } => StatusCode::CONFLICT,

                // Server-side manifest and I/O problems
                FingerprintError::DatasetNotFound(_)
                | FingerprintError::ManifestWrite { .. }
                | FingerprintError::ManifestRead { .. }
                | FingerprintError::InvalidManifest(_)
                | FingerprintError::AlgorithmUnavailable(_)
                | FingerprintError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Fingerprint(e) => match e {
                FingerprintError::UnsupportedImageFormat(_) => "UNSUPPORTED_IMAGE_FORMAT",
                FingerprintError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
                FingerprintError::ImageTooLarge(_) => "IMAGE_TOO_LARGE",
                FingerprintError::DecodeTimeout { .. } => "DECODE_TIMEOUT",
                FingerprintError::InvalidBitString(_) => "INVALID_HASH",
                FingerprintError::AlgorithmVersionMismatch { .. } => "VERSION_MISMATCH",
                FingerprintError::DatasetNotFound(_)
                | FingerprintError::ManifestWrite { .. }
                | FingerprintError::ManifestRead { .. }
                | FingerprintError::InvalidManifest(_) => "MANIFEST_ERROR",
                FingerprintError::AlgorithmUnavailable(_) => "ALGORITHM_UNAVAILABLE",
                FingerprintError::Io(_) => "INTERNAL_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Fingerprint(e) if self.status_code().is_server_error() => match e {
                FingerprintError::AlgorithmUnavailable(id) => {
                    format!("Hash algorithm {id} is not available")
                }
                _ => "Fingerprint manifest unavailable".to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            // Client errors carry their own description
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
