use image::imageops::{self, FilterType};
use image::DynamicImage;

use super::{AlgorithmId, Fingerprinter, HashVariants, HASH_BITS};
use crate::bits::BitString;
use crate::error::{FingerprintError, Result};

/// Side length of the canonical square every image is resized to.
pub const CANONICAL_SIZE: u32 = 224;

/// Number of leading row-major samples all four variants are derived from.
pub const WINDOW_SIZE: usize = 256;

/// `128 * 3`: mid-gray expressed as a channel sum.
const MID_GRAY_SUM: u32 = 384;

/// The windowed comparison hash (`window256-v2`).
///
/// Luminance is the mean of R, G and B. Each sample is kept as the exact
/// integer channel sum `r + g + b` and every threshold is scaled to match,
/// so no rounding can make two implementations disagree.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowHasher;

impl WindowHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash an RGBA buffer that is already at the canonical size.
    ///
    /// This is the request-time path used when the caller (e.g. a browser
    /// canvas) did the resize itself. Alpha is ignored.
    pub fn hash_rgba(&self, pixels: &[u8]) -> Result<HashVariants> {
        if pixels.is_empty() || pixels.len() % 4 != 0 {
            return Err(FingerprintError::ImageDecode(format!(
                "RGBA buffer length {} is not a positive multiple of 4",
                pixels.len()
            )));
        }
        let sums: Vec<u32> = pixels
            .chunks_exact(4)
            .take(WINDOW_SIZE)
            .map(|px| u32::from(px[0]) + u32::from(px[1]) + u32::from(px[2]))
            .collect();
        Ok(Self::hash_window(&sums))
    }

    /// Channel sums of the first [`WINDOW_SIZE`] pixels of the normalized image.
    pub fn window_sums(image: &DynamicImage) -> Vec<u32> {
        let rgb = image.to_rgb8();
        let resized = imageops::resize(&rgb, CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Lanczos3);
        resized
            .pixels()
            .take(WINDOW_SIZE)
            .map(|px| px.0.iter().map(|&c| u32::from(c)).sum())
            .collect()
    }

    /// Derive the four variants from a window of channel sums.
    pub fn hash_window(sums: &[u32]) -> HashVariants {
        let window = &sums[..sums.len().min(WINDOW_SIZE)];
        let total: u64 = window.iter().map(|&s| u64::from(s)).sum();
        let n = window.len() as u64;

        // sample >= mean  <=>  n * sum >= total
        let phash = BitString::from_bits(window.iter().map(|&s| n * u64::from(s) >= total));
        let ahash = BitString::from_bits(window.iter().map(|&s| s >= MID_GRAY_SUM));
        let dhash = BitString::from_bits(window.windows(2).map(|pair| pair[1] >= pair[0]));

        HashVariants {
            phash: phash.fit_to(HASH_BITS),
            ahash: ahash.fit_to(HASH_BITS),
            dhash: dhash.fit_to(HASH_BITS),
            whash: BitString::zeros(HASH_BITS),
        }
    }
}

impl Fingerprinter for WindowHasher {
    fn algorithm(&self) -> AlgorithmId {
        AlgorithmId::Window256V2
    }

    fn hash_image(&self, image: &DynamicImage) -> Result<HashVariants> {
        Ok(Self::hash_window(&Self::window_sums(image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([value, value, value])))
    }

    #[test]
    fn test_all_variants_have_pinned_length() {
        let hashes = WindowHasher::new().hash_image(&solid(90)).unwrap();
        for (name, bits) in hashes.iter() {
            assert_eq!(bits.len(), HASH_BITS, "{name}");
        }
    }

    #[test]
    fn test_ahash_uses_mid_gray_threshold() {
        let dark = WindowHasher::new().hash_image(&solid(127)).unwrap();
        assert_eq!(dark.ahash, BitString::zeros(HASH_BITS));

        let light = WindowHasher::new().hash_image(&solid(128)).unwrap();
        assert_eq!(light.ahash.as_str(), "1".repeat(HASH_BITS));
    }

    #[test]
    fn test_flat_window_sets_every_phash_bit() {
        // every sample equals the mean, and the comparison is inclusive
        let hashes = WindowHasher::hash_window(&[300; WINDOW_SIZE]);
        assert_eq!(hashes.phash.as_str(), "1".repeat(HASH_BITS));
    }

    #[test]
    fn test_dhash_is_padded_with_one_zero() {
        let hashes = WindowHasher::hash_window(&[10; WINDOW_SIZE]);
        let expected = format!("{}0", "1".repeat(WINDOW_SIZE - 1));
        assert_eq!(hashes.dhash.as_str(), expected);
    }

    #[test]
    fn test_whash_is_constant_zero() {
        let hashes = WindowHasher::new().hash_image(&solid(200)).unwrap();
        assert_eq!(hashes.whash, BitString::zeros(HASH_BITS));
    }

    #[test]
    fn test_phash_against_window_mean() {
        // alternating dark/light samples: mean sits between them
        let sums: Vec<u32> = (0..WINDOW_SIZE).map(|i| if i % 2 == 0 { 0 } else { 600 }).collect();
        let hashes = WindowHasher::hash_window(&sums);
        assert_eq!(hashes.phash.as_str(), "01".repeat(WINDOW_SIZE / 2));
        assert_eq!(hashes.ahash.as_str(), "01".repeat(WINDOW_SIZE / 2));
        // rises then falls: 1,0,1,0,...
        assert!(hashes.dhash.as_str().starts_with("1010"));
    }

    #[test]
    fn test_short_window_is_padded() {
        let hashes = WindowHasher::hash_window(&[700, 0, 700]);
        assert_eq!(&hashes.phash.as_str()[..4], "1010");
        assert_eq!(&hashes.dhash.as_str()[..3], "010");
        assert_eq!(hashes.phash.len(), HASH_BITS);
    }

    #[test]
    fn test_window_is_first_row_then_second_row() {
        // row 0 black, everything else white: the window holds 224 black
        // samples followed by 32 white ones
        let img = RgbImage::from_fn(CANONICAL_SIZE, CANONICAL_SIZE, |_, y| {
            if y == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let sums = WindowHasher::window_sums(&DynamicImage::ImageRgb8(img));
        assert_eq!(sums.len(), WINDOW_SIZE);
        assert!(sums[..CANONICAL_SIZE as usize].iter().all(|&s| s == 0));
        assert!(sums[CANONICAL_SIZE as usize..].iter().all(|&s| s == 765));
    }

    #[test]
    fn test_rgba_path_matches_decoded_path() {
        let img = RgbImage::from_fn(CANONICAL_SIZE, CANONICAL_SIZE, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        });
        let dynamic = DynamicImage::ImageRgb8(img);
        let rgba = dynamic.to_rgba8().into_raw();

        let hasher = WindowHasher::new();
        let from_image = hasher.hash_image(&dynamic).unwrap();
        let from_rgba = hasher.hash_rgba(&rgba).unwrap();
        assert_eq!(from_image, from_rgba);
    }

    #[test]
    fn test_rgba_rejects_ragged_buffer() {
        assert!(WindowHasher::new().hash_rgba(&[1, 2, 3]).is_err());
        assert!(WindowHasher::new().hash_rgba(&[]).is_err());
    }
}
