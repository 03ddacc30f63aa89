//! Hash Engine: decoded image → named fixed-length bit-strings.
//!
//! Two algorithms exist side by side and are never compared with each other:
//!
//! - **window256-v2** ([`WindowHasher`]) - the first 256 row-major luminance
//!   samples of a 224×224 Lanczos3 resize. The browser client computes the
//!   same bits from a canvas, so every rule here is pinned exactly.
//! - **imagehash16-v1** (`LibraryHasher`, `imagehash` feature) - library-grade
//!   16×16 DCT/mean/gradient hashes plus a Haar wavelet hash.
//!
//! Every variant of both algorithms is exactly [`HASH_BITS`] long.
//!
//! # Usage
//!
//! ```no_run
//! use eggprint_core::hash::{AlgorithmId, FingerprinterFactory};
//!
//! let image = image::open("fertil/001.jpg").unwrap();
//! let hasher = FingerprinterFactory::create(AlgorithmId::Window256V2).unwrap();
//! let fingerprint = hasher.fingerprint(&image).unwrap();
//! assert_eq!(fingerprint.hashes.phash.len(), 256);
//! ```

#[cfg(feature = "imagehash")]
mod library;
mod window;

#[cfg(feature = "imagehash")]
pub use library::LibraryHasher;
pub use window::{WindowHasher, CANONICAL_SIZE, WINDOW_SIZE};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::bits::BitString;
use crate::error::{FingerprintError, Result};

/// Pinned length of every hash variant, for both algorithms.
pub const HASH_BITS: usize = 256;

/// Identifies the exact normalization and bit-extraction rule.
///
/// Hashes are only comparable within the same identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AlgorithmId {
    /// First 256 samples of a 224×224 luminance image.
    #[default]
    #[serde(rename = "window256-v2")]
    Window256V2,
    /// Library-grade 16×16 hashes.
    #[serde(rename = "imagehash16-v1")]
    ImageHash16V1,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 2] = [AlgorithmId::Window256V2, AlgorithmId::ImageHash16V1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Window256V2 => "window256-v2",
            Self::ImageHash16V1 => "imagehash16-v1",
        }
    }

    /// Bit length shared by every variant under this algorithm.
    pub fn bit_length(&self) -> usize {
        HASH_BITS
    }

    /// Weights used to combine per-variant similarities into one score.
    pub fn weights(&self) -> VariantWeights {
        match self {
            // whash is a constant under the windowed algorithm and carries no signal
            Self::Window256V2 => VariantWeights {
                phash: 0.4,
                ahash: 0.3,
                dhash: 0.3,
                whash: 0.0,
            },
            Self::ImageHash16V1 => VariantWeights {
                phash: 0.4,
                ahash: 0.2,
                dhash: 0.2,
                whash: 0.2,
            },
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                format!(
                    "unknown algorithm '{}' (expected one of: {})",
                    s,
                    Self::ALL.map(|id| id.as_str()).join(", ")
                )
            })
    }
}

/// Per-variant weights of the aggregate similarity. They sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantWeights {
    pub phash: f64,
    pub ahash: f64,
    pub dhash: f64,
    pub whash: f64,
}

/// The four named hash variants of one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashVariants {
    pub phash: BitString,
    pub ahash: BitString,
    pub dhash: BitString,
    pub whash: BitString,
}

impl HashVariants {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &BitString)> {
        [
            ("phash", &self.phash),
            ("ahash", &self.ahash),
            ("dhash", &self.dhash),
            ("whash", &self.whash),
        ]
        .into_iter()
    }
}

/// Hash variants tagged with the algorithm that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub algorithm: AlgorithmId,
    pub hashes: HashVariants,
}

/// Capability interface shared by both hash algorithms.
///
/// Implementations hold no mutable state and are shared across worker threads.
pub trait Fingerprinter: Send + Sync {
    /// The algorithm this implementation produces hashes for.
    fn algorithm(&self) -> AlgorithmId;

    /// Compute all four hash variants of a decoded image.
    fn hash_image(&self, image: &DynamicImage) -> Result<HashVariants>;

    /// Compute the hash variants and tag them with [`Fingerprinter::algorithm`].
    fn fingerprint(&self, image: &DynamicImage) -> Result<Fingerprint> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FingerprintError::ImageDecode("image has no pixels".into()));
        }
        Ok(Fingerprint {
            algorithm: self.algorithm(),
            hashes: self.hash_image(image)?,
        })
    }
}

/// Creates the [`Fingerprinter`] for a configured algorithm.
pub struct FingerprinterFactory;

impl FingerprinterFactory {
    pub fn create(algorithm: AlgorithmId) -> Result<Arc<dyn Fingerprinter>> {
        match algorithm {
            AlgorithmId::Window256V2 => Ok(Arc::new(WindowHasher::new())),
            #[cfg(feature = "imagehash")]
            AlgorithmId::ImageHash16V1 => Ok(Arc::new(LibraryHasher::new())),
            #[cfg(not(feature = "imagehash"))]
            AlgorithmId::ImageHash16V1 => Err(FingerprintError::AlgorithmUnavailable(algorithm)),
        }
    }
}
