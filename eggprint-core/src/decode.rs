//! Bounded image decoding.
//!
//! Uploads are untrusted: byte size, pixel dimensions and decode time are all
//! capped before any hashing happens.

use std::io::Cursor;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, ImageReader, Limits};
use tracing::{debug, warn};

use crate::error::{FingerprintError, Result};

/// File extensions the manifest builder picks up.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Resource bounds applied when decoding an image.
#[derive(Debug, Clone)]
pub struct DecodeLimits {
    /// Maximum encoded size in bytes.
    pub max_bytes: usize,
    /// Maximum decoded width in pixels.
    pub max_width: u32,
    /// Maximum decoded height in pixels.
    pub max_height: u32,
    /// Decode deadline. `None` decodes on the calling thread without a deadline.
    ///
    /// The deadline only releases the caller: the decoding thread runs to
    /// completion in the background. Callers decoding untrusted input
    /// concurrently must bound how many decodes are in flight.
    pub timeout: Option<Duration>,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_bytes: 25 * 1024 * 1024,
            max_width: 8192,
            max_height: 8192,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl DecodeLimits {
    /// No deadline; dataset files are trusted local input.
    pub fn trusted() -> Self {
        Self {
            max_bytes: usize::MAX,
            max_width: u32::MAX,
            max_height: u32::MAX,
            timeout: None,
        }
    }

    fn reader_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_width);
        limits.max_image_height = Some(self.max_height);
        limits
    }
}

/// Whether a path has one of the [`SUPPORTED_EXTENSIONS`] (case-insensitive).
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Decode raw image bytes within `limits`.
pub fn decode_bounded(bytes: &[u8], limits: &DecodeLimits) -> Result<DynamicImage> {
    if bytes.len() > limits.max_bytes {
        return Err(FingerprintError::ImageTooLarge(format!(
            "{} bytes exceeds maximum of {} bytes",
            bytes.len(),
            limits.max_bytes
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| FingerprintError::UnsupportedImageFormat(e.to_string()))?;
    debug!(format = ?format, bytes = bytes.len(), "Decoding image");

    match limits.timeout {
        None => decode_with_format(bytes, format, limits),
        Some(timeout) => {
            let owned = bytes.to_vec();
            let thread_limits = limits.clone();
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(decode_with_format(&owned, format, &thread_limits));
            });
            rx.recv_timeout(timeout).map_err(|_| {
                warn!(timeout_ms = timeout.as_millis() as u64, "Image decode timed out");
                FingerprintError::DecodeTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            })?
        }
    }
}

fn decode_with_format(
    bytes: &[u8],
    format: ImageFormat,
    limits: &DecodeLimits,
) -> Result<DynamicImage> {
    let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
    reader.limits(limits.reader_limits());
    reader.decode().map_err(|e| match e {
        image::ImageError::Limits(_) => FingerprintError::ImageTooLarge(format!(
            "dimensions exceed {}x{}",
            limits.max_width, limits.max_height
        )),
        image::ImageError::Unsupported(e) => FingerprintError::UnsupportedImageFormat(e.to_string()),
        other => FingerprintError::ImageDecode(other.to_string()),
    })
}

/// Read and decode an image file.
pub fn load_image(path: &Path, limits: &DecodeLimits) -> Result<DynamicImage> {
    let bytes = std::fs::read(path)?;
    decode_bounded(&bytes, limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_extension(Path::new("a/001.jpg")));
        assert!(is_supported_extension(Path::new("a/001.JPEG")));
        assert!(is_supported_extension(Path::new("egg.Png")));
        assert!(is_supported_extension(Path::new("egg.bmp")));
        assert!(!is_supported_extension(Path::new("egg.gif")));
        assert!(!is_supported_extension(Path::new("notes.txt")));
        assert!(!is_supported_extension(Path::new("noext")));
    }

    #[test]
    fn test_decode_within_limits() {
        let img = decode_bounded(&png_bytes(40, 30), &DecodeLimits::default()).unwrap();
        assert_eq!((img.width(), img.height()), (40, 30));
    }

    #[test]
    fn test_decode_trusted_has_no_deadline() {
        let img = decode_bounded(&png_bytes(8, 8), &DecodeLimits::trusted()).unwrap();
        assert_eq!(img.width(), 8);
    }

    #[test]
    fn test_rejects_oversized_bytes() {
        let limits = DecodeLimits {
            max_bytes: 16,
            ..DecodeLimits::default()
        };
        assert!(matches!(
            decode_bounded(&png_bytes(40, 30), &limits),
            Err(FingerprintError::ImageTooLarge(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let limits = DecodeLimits {
            max_width: 32,
            max_height: 32,
            ..DecodeLimits::default()
        };
        assert!(matches!(
            decode_bounded(&png_bytes(64, 16), &limits),
            Err(FingerprintError::ImageTooLarge(_))
        ));
    }

    #[test]
    fn test_decode_deadline() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(2500, 2500, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        }));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();

        let limits = DecodeLimits {
            timeout: Some(Duration::from_millis(1)),
            ..DecodeLimits::default()
        };
        let err = decode_bounded(buf.get_ref(), &limits).unwrap_err();
        assert!(matches!(err, FingerprintError::DecodeTimeout { timeout_ms: 1 }));
        assert!(err.is_per_image());
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(matches!(
            decode_bounded(b"definitely not an image", &DecodeLimits::default()),
            Err(FingerprintError::UnsupportedImageFormat(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_data() {
        let mut bytes = png_bytes(40, 30);
        bytes.truncate(bytes.len() / 2);
        let err = decode_bounded(&bytes, &DecodeLimits::default()).unwrap_err();
        assert!(err.is_per_image(), "unexpected error: {err}");
    }
}
