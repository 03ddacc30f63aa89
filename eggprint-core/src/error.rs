use std::path::PathBuf;

use thiserror::Error;

use crate::hash::AlgorithmId;

#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Dataset directory not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Image too large: {0}")]
    ImageTooLarge(String),

    #[error("Image decode timed out after {timeout_ms}ms")]
    DecodeTimeout { timeout_ms: u64 },

    #[error("Failed to write manifest {}: {source}", path.display())]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read manifest {}: {reason}", path.display())]
    ManifestRead { path: PathBuf, reason: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid bit-string: {0}")]
    InvalidBitString(String),

    #[error("Hash algorithm {0} is not available in this build")]
    AlgorithmUnavailable(AlgorithmId),

    #[error("Algorithm version mismatch: expected {expected}, found {found}")]
    AlgorithmVersionMismatch {
        expected: AlgorithmId,
        found: AlgorithmId,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FingerprintError {
    /// Whether a batch run may skip the offending image and continue.
    pub fn is_per_image(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedImageFormat(_)
                | Self::ImageDecode(_)
                | Self::ImageTooLarge(_)
                | Self::DecodeTimeout { .. }
                | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FingerprintError>;
