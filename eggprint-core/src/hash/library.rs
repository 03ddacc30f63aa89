use image::imageops::{self, FilterType};
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};

use super::{AlgorithmId, Fingerprinter, HashVariants, HASH_BITS};
use crate::bits::BitString;
use crate::error::Result;

/// Grid side of every library-grade hash (16×16 = 256 bits).
const GRID: u32 = 16;

/// Haar input side: two LL levels reduce 64 → 16.
const WAVELET_INPUT: u32 = GRID * 4;

/// Library-grade hashes (`imagehash16-v1`).
pub struct LibraryHasher {
    phash: Hasher,
    ahash: Hasher,
    dhash: Hasher,
}

impl Default for LibraryHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryHasher {
    pub fn new() -> Self {
        let config = || {
            HasherConfig::new()
                .hash_size(GRID, GRID)
                .resize_filter(FilterType::Lanczos3)
        };
        Self {
            phash: config().hash_alg(HashAlg::Mean).preproc_dct().to_hasher(),
            ahash: config().hash_alg(HashAlg::Mean).to_hasher(),
            dhash: config().hash_alg(HashAlg::Gradient).to_hasher(),
        }
    }

    /// Haar wavelet hash.
    ///
    /// Each LL level replaces a 2×2 block by its sum (the orthonormal Haar
    /// low-pass up to a constant factor, which the median comparison ignores).
    pub fn wavelet_hash(image: &DynamicImage) -> BitString {
        let gray = image.to_luma8();
        let resized = imageops::resize(&gray, WAVELET_INPUT, WAVELET_INPUT, FilterType::Lanczos3);

        let mut side = WAVELET_INPUT as usize;
        let mut coeffs: Vec<u32> = resized.pixels().map(|px| u32::from(px.0[0])).collect();
        while side > GRID as usize {
            coeffs = haar_ll(&coeffs, side);
            side /= 2;
        }

        let mut sorted = coeffs.clone();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        // coefficient > median, with the median of an even count kept doubled
        let median_x2 = sorted[mid - 1] + sorted[mid];
        BitString::from_bits(coeffs.iter().map(|&c| 2 * c > median_x2))
    }
}

/// One Haar low-pass level over a `side`×`side` row-major grid.
fn haar_ll(coeffs: &[u32], side: usize) -> Vec<u32> {
    let half = side / 2;
    let mut out = Vec::with_capacity(half * half);
    for y in 0..half {
        for x in 0..half {
            let top = 2 * y * side + 2 * x;
            let bottom = top + side;
            out.push(coeffs[top] + coeffs[top + 1] + coeffs[bottom] + coeffs[bottom + 1]);
        }
    }
    out
}

impl Fingerprinter for LibraryHasher {
    fn algorithm(&self) -> AlgorithmId {
        AlgorithmId::ImageHash16V1
    }

    fn hash_image(&self, image: &DynamicImage) -> Result<HashVariants> {
        let bits = |hasher: &Hasher| {
            BitString::from_bytes_msb(hasher.hash_image(image).as_bytes()).fit_to(HASH_BITS)
        };
        Ok(HashVariants {
            phash: bits(&self.phash),
            ahash: bits(&self.ahash),
            dhash: bits(&self.dhash),
            whash: Self::wavelet_hash(image).fit_to(HASH_BITS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 255) / width.max(1)) as u8;
            Rgb([v, ((y * 255) / height.max(1)) as u8, 128])
        }))
    }

    #[test]
    fn test_haar_ll_sums_blocks() {
        let grid = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        assert_eq!(haar_ll(&grid, 4), vec![1 + 2 + 5 + 6, 3 + 4 + 7 + 8, 9 + 10 + 13 + 14, 11 + 12 + 15 + 16]);
    }

    #[test]
    fn test_all_variants_have_pinned_length() {
        let hashes = LibraryHasher::new().hash_image(&gradient(200, 150)).unwrap();
        for (name, bits) in hashes.iter() {
            assert_eq!(bits.len(), HASH_BITS, "{name}");
        }
    }

    #[test]
    fn test_wavelet_hash_splits_left_and_right() {
        let img = image::GrayImage::from_fn(128, 128, |x, _| if x < 64 { Luma([10]) } else { Luma([240]) });
        let bits = LibraryHasher::wavelet_hash(&DynamicImage::ImageLuma8(img));
        let row: String = bits.as_str().chars().take(GRID as usize).collect();
        assert_eq!(row, format!("{}{}", "0".repeat(8), "1".repeat(8)));
    }

    #[test]
    fn test_deterministic() {
        let hasher = LibraryHasher::new();
        let img = gradient(300, 300);
        assert_eq!(hasher.hash_image(&img).unwrap(), hasher.hash_image(&img).unwrap());
    }
}
