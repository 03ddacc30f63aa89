//! Multipart form parsing helpers
//!
//! Collects the `file` upload and any text fields of a multipart/form-data
//! request, validating the upload as it is read.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::validation::{validate_content_type, validate_file_size};

/// Represents a file uploaded via multipart form
#[derive(Debug, Clone)]
pub struct FileField {
    /// File data bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field (if provided)
    pub content_type: Option<String>,
    /// Original filename from the multipart field (if provided)
    pub file_name: Option<String>,
}

/// Parsed multipart form fields
#[derive(Debug)]
pub struct MultipartFields {
    /// File field (named "file")
    file: Option<FileField>,
    /// Text fields indexed by name
    text_fields: HashMap<String, String>,
}

impl MultipartFields {
    /// Parse all fields from a multipart request
    ///
    /// The file's Content-Type and size are validated while reading; a
    /// second `file` field replaces the first.
    pub async fn parse(multipart: &mut Multipart, max_file_size: usize) -> Result<Self, ApiError> {
        let mut file: Option<FileField> = None;
        let mut text_fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "file" {
                let content_type = field.content_type().map(|s| s.to_string());
                let file_name = field.file_name().map(|s| s.to_string());

                validate_content_type(content_type.as_deref())?;

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
                    .to_vec();

                validate_file_size(data.len(), max_file_size)?;

                file = Some(FileField {
                    data,
                    content_type,
                    file_name,
                });
            } else {
                let value = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
                })?;
                text_fields.insert(name, value);
            }
        }

        Ok(Self { file, text_fields })
    }

    /// Take the uploaded file, failing if none was sent.
    pub fn take_file(&mut self) -> Result<FileField, ApiError> {
        self.file.take().ok_or_else(|| {
            ApiError::bad_request("No file provided. Use 'file' field in multipart form.")
        })
    }

    /// Get a text field value, treating an empty value as absent.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.text_fields
            .get(name)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_text() {
        let mut text_fields = HashMap::new();
        text_fields.insert("threshold".to_string(), "0.9".to_string());
        text_fields.insert("blank".to_string(), "  ".to_string());

        let fields = MultipartFields {
            file: None,
            text_fields,
        };

        assert_eq!(fields.get_text("threshold"), Some("0.9"));
        assert_eq!(fields.get_text("blank"), None);
        assert_eq!(fields.get_text("missing"), None);
    }

    #[test]
    fn test_take_file() {
        let mut fields = MultipartFields {
            file: Some(FileField {
                data: vec![1, 2, 3],
                content_type: Some("image/png".into()),
                file_name: Some("egg.png".into()),
            }),
            text_fields: HashMap::new(),
        };

        assert_eq!(fields.take_file().unwrap().data, vec![1, 2, 3]);
        assert!(fields.take_file().is_err());
    }
}
