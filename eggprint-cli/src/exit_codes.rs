//! Exit codes following sysexits.h conventions.
//!
//! Scripts and CI jobs can tell a missing dataset from a corrupt manifest
//! without parsing stderr.

use eggprint_core::FingerprintError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Data format error (invalid manifest, algorithm mismatch, undecodable image).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input (dataset, image or manifest not found).
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (cannot write the manifest).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    /// Classify an error by the first library or I/O error in its chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|cause| {
                if let Some(e) = cause.downcast_ref::<FingerprintError>() {
                    Some(code_for(e))
                } else {
                    cause.downcast_ref::<std::io::Error>().map(code_for_io)
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(format!("{err:#}")),
        }
    }
}

fn code_for(err: &FingerprintError) -> i32 {
    match err {
        FingerprintError::DatasetNotFound(_) | FingerprintError::ManifestRead { .. } => INPUT_ERROR,
        FingerprintError::InvalidManifest(_)
        | FingerprintError::InvalidBitString(_)
        | FingerprintError::AlgorithmVersionMismatch { .. }
        | FingerprintError::UnsupportedImageFormat(_)
        | FingerprintError::ImageDecode(_)
        | FingerprintError::ImageTooLarge(_)
        | FingerprintError::DecodeTimeout { .. } => DATA_ERROR,
        FingerprintError::ManifestWrite { .. } => IO_ERROR,
        FingerprintError::Io(e) => code_for_io(e),
        FingerprintError::AlgorithmUnavailable(_) => GENERAL_ERROR,
    }
}

fn code_for_io(err: &std::io::Error) -> i32 {
    match err.kind() {
        std::io::ErrorKind::NotFound => INPUT_ERROR,
        _ => IO_ERROR,
    }
}
