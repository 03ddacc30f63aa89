//! Eggprint Core - perceptual fingerprinting and duplicate detection for
//! egg image datasets
//!
//! This crate computes compact, deterministic visual hashes for every image of
//! a labeled dataset, persists them as a versioned fingerprint manifest, and
//! decides whether a newly observed image is a near-duplicate of a training
//! sample.
//!
//! # Features
//!
//! - `builder` (default) - dataset walking and parallel manifest generation
//! - `imagehash` (default) - the library-grade `imagehash16-v1` algorithm
//!
//! Without default features the crate builds for `wasm32` and keeps the
//! windowed `window256-v2` algorithm and the matcher.
//!
//! # Example
//!
//! ```no_run
//! use eggprint_core::{DecodeLimits, DuplicateMatcher, MatchOutcome};
//!
//! # fn example() -> eggprint_core::Result<()> {
//! let matcher = DuplicateMatcher::load("fingerprints.json".as_ref())?;
//! let bytes = std::fs::read("upload.jpg")?;
//!
//! match matcher.match_image_bytes(&bytes, &DecodeLimits::default(), None)? {
//!     MatchOutcome::Match(result) if result.duplicate => {
//!         println!("duplicate of {:?}", result.matched_entry.map(|e| e.relative_filename));
//!     }
//!     MatchOutcome::Match(result) => println!("unique ({:.3})", result.similarity),
//!     MatchOutcome::VersionMismatch { manifest, query } => {
//!         println!("manifest uses {manifest}, query uses {query}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod bits;
pub mod decode;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod matcher;

#[cfg(feature = "builder")]
pub mod builder;

pub use bits::BitString;
pub use decode::{decode_bounded, load_image, DecodeLimits, SUPPORTED_EXTENSIONS};
pub use error::{FingerprintError, Result};
pub use hash::{
    AlgorithmId, Fingerprint, Fingerprinter, FingerprinterFactory, HashVariants, WindowHasher,
    HASH_BITS,
};
pub use manifest::{
    ClassLabel, FingerprintEntry, Manifest, ManifestMetadata, DEFAULT_SIMILARITY_THRESHOLD,
    MANIFEST_VERSION,
};
pub use matcher::{aggregate_similarity, DuplicateMatcher, MatchOutcome, MatchResult};

#[cfg(feature = "builder")]
pub use builder::{BuildProgress, BuildReport, BuilderConfig, ManifestBuilder};

#[cfg(feature = "imagehash")]
pub use hash::LibraryHasher;
