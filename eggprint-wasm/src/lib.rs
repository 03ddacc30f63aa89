//! WebAssembly bindings for client-side duplicate checks.
//!
//! A browser can hash a canvas buffer or a picked file and compare it
//! against a fingerprint manifest without uploading the image.

use eggprint_core::hash::CANONICAL_SIZE;
use eggprint_core::{
    decode_bounded, AlgorithmId, DecodeLimits, DuplicateMatcher, Fingerprint, Fingerprinter,
    HashVariants, Manifest, MatchOutcome, WindowHasher,
};
use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[derive(Serialize)]
struct HashResult {
    algorithm_id: &'static str,
    hashes: HashVariants,
}

#[derive(Serialize)]
struct ErrorResult {
    error: String,
}

/// Compute the `window256-v2` hashes of an RGBA canvas buffer.
///
/// A 224×224 buffer is hashed as is; other sizes are resized first.
///
/// # Returns
/// A JSON string `{ algorithm_id, hashes }`, or `{ error }` on failure
#[wasm_bindgen]
pub fn hash_rgba(pixels: &[u8], width: u32, height: u32) -> String {
    to_json(hash_internal(pixels, width, height))
}

/// Match an RGBA canvas buffer against a manifest JSON document.
///
/// # Arguments
/// * `pixels` - RGBA bytes, `width * height * 4` long
/// * `manifest_json` - The manifest as produced by `eggprint generate`
/// * `threshold` - Optional override of the manifest threshold
///
/// # Returns
/// A JSON string with the match outcome, or `{ error }` on failure
#[wasm_bindgen]
pub fn match_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    manifest_json: &str,
    threshold: Option<f64>,
) -> String {
    to_json(match_canvas(pixels, width, height, manifest_json, threshold))
}

/// Decode an encoded image file and match it against a manifest JSON document.
#[wasm_bindgen]
pub fn match_bytes(file_bytes: &[u8], manifest_json: &str, threshold: Option<f64>) -> String {
    // no worker threads to enforce a decode deadline
    let limits = DecodeLimits {
        timeout: None,
        ..DecodeLimits::default()
    };
    to_json(
        decode_bounded(file_bytes, &limits)
            .map_err(|e| e.to_string())
            .and_then(|image| match_internal(&image, manifest_json, threshold)),
    )
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn check_buffer(pixels: &[u8], width: u32, height: u32) -> Result<(), String> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(format!(
            "Expected {} RGBA bytes for {}x{}, got {}",
            expected,
            width,
            height,
            pixels.len()
        ));
    }
    Ok(())
}

fn canvas_image(pixels: &[u8], width: u32, height: u32) -> Result<DynamicImage, String> {
    check_buffer(pixels, width, height)?;
    RgbaImage::from_raw(width, height, pixels.to_vec())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| "Invalid canvas buffer".to_string())
}

fn window_hashes(pixels: &[u8], width: u32, height: u32) -> Result<HashVariants, String> {
    check_buffer(pixels, width, height)?;
    let hasher = WindowHasher::new();
    let hashes = if width == CANONICAL_SIZE && height == CANONICAL_SIZE {
        hasher.hash_rgba(pixels)
    } else {
        hasher.fingerprint(&canvas_image(pixels, width, height)?).map(|f| f.hashes)
    };
    hashes.map_err(|e| e.to_string())
}

fn hash_internal(pixels: &[u8], width: u32, height: u32) -> Result<HashResult, String> {
    Ok(HashResult {
        algorithm_id: AlgorithmId::Window256V2.as_str(),
        hashes: window_hashes(pixels, width, height)?,
    })
}

fn check_threshold(threshold: Option<f64>) -> Result<(), String> {
    match threshold {
        Some(t) if !(0.0..=1.0).contains(&t) => {
            Err(format!("Threshold must be between 0 and 1, got {}", t))
        }
        _ => Ok(()),
    }
}

fn load_matcher(manifest_json: &str) -> Result<DuplicateMatcher, String> {
    let manifest = Manifest::from_json(manifest_json)
        .map_err(|e| format!("Failed to parse manifest: {}", e))?;
    DuplicateMatcher::new(manifest).map_err(|e| e.to_string())
}

fn match_canvas(
    pixels: &[u8],
    width: u32,
    height: u32,
    manifest_json: &str,
    threshold: Option<f64>,
) -> Result<MatchOutcome, String> {
    check_threshold(threshold)?;
    let matcher = load_matcher(manifest_json)?;

    let fingerprint = match matcher.algorithm() {
        AlgorithmId::Window256V2 => Fingerprint {
            algorithm: AlgorithmId::Window256V2,
            hashes: window_hashes(pixels, width, height)?,
        },
        _ => matcher
            .fingerprinter()
            .fingerprint(&canvas_image(pixels, width, height)?)
            .map_err(|e| e.to_string())?,
    };
    Ok(matcher.match_fingerprint(&fingerprint, threshold))
}

fn match_internal(
    image: &DynamicImage,
    manifest_json: &str,
    threshold: Option<f64>,
) -> Result<MatchOutcome, String> {
    check_threshold(threshold)?;
    let matcher = load_matcher(manifest_json)?;
    let fingerprint = matcher
        .fingerprinter()
        .fingerprint(image)
        .map_err(|e| e.to_string())?;
    Ok(matcher.match_fingerprint(&fingerprint, threshold))
}

fn to_json<T: Serialize>(result: Result<T, String>) -> String {
    let json = match result {
        Ok(value) => serde_json::to_string(&value),
        Err(error) => serde_json::to_string(&ErrorResult { error }),
    };
    json.unwrap_or_else(|e| format!(r#"{{"error":"Serialization error: {}"}}"#, e))
}
