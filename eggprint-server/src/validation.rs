//! Upload validation module
//!
//! Provides validation utilities for multipart image uploads.

use crate::error::ApiError;

/// Allowed MIME type categories for uploads
const ALLOWED_MIME_PREFIXES: &[&str] = &["image/", "application/octet-stream"];

/// Validates the Content-Type of an uploaded file
///
/// Accepts `image/*` and `application/octet-stream`. A missing Content-Type
/// is treated as binary; the decoder sniffs the actual format.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) => {
            let ct_lower = ct.to_lowercase();
            if ALLOWED_MIME_PREFIXES
                .iter()
                .any(|prefix| ct_lower.starts_with(prefix))
            {
                Ok(())
            } else {
                Err(ApiError::bad_request(format!(
                    "Unsupported Content-Type: '{}'. Allowed types: image/*, application/octet-stream",
                    ct
                )))
            }
        }
        None => Ok(()),
    }
}

/// Validates the size of an uploaded file
///
/// Returns an error if the file is empty or exceeds the maximum size.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size == 0 {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        return Err(ApiError::bad_request(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )));
    }
    Ok(())
}

/// Parses a similarity threshold override in `[0, 1]`.
pub fn parse_threshold(value: &str) -> Result<f64, ApiError> {
    let threshold: f64 = value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid threshold '{}'", value)))?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ApiError::bad_request(format!(
            "Threshold must be between 0 and 1, got {}",
            threshold
        )));
    }
    Ok(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_type_image() {
        assert!(validate_content_type(Some("image/jpeg")).is_ok());
        assert!(validate_content_type(Some("image/png")).is_ok());
        assert!(validate_content_type(Some("IMAGE/BMP")).is_ok()); // case insensitive
    }

    #[test]
    fn test_validate_content_type_binary_or_missing() {
        assert!(validate_content_type(Some("application/octet-stream")).is_ok());
        assert!(validate_content_type(None).is_ok());
    }

    #[test]
    fn test_validate_content_type_rejected() {
        assert!(validate_content_type(Some("text/html")).is_err());
        assert!(validate_content_type(Some("video/mp4")).is_err());
        assert!(validate_content_type(Some("application/json")).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        let max = 10 * 1024 * 1024;
        assert!(validate_file_size(1024, max).is_ok());
        assert!(validate_file_size(max, max).is_ok());
        assert!(validate_file_size(max + 1, max).is_err());
        assert!(validate_file_size(0, max).is_err());
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("0.95").unwrap(), 0.95);
        assert_eq!(parse_threshold(" 1 ").unwrap(), 1.0);
        assert!(parse_threshold("1.01").is_err());
        assert!(parse_threshold("abc").is_err());
    }
}
