//! Duplicate Matcher.
//!
//! Holds one validated [`Manifest`] immutably and compares query
//! fingerprints against every entry. The matcher is `Send + Sync` and is meant
//! to be shared behind an `Arc` for the lifetime of a process.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::bits::BitString;
use crate::decode::{decode_bounded, DecodeLimits};
use crate::error::Result;
use crate::hash::{AlgorithmId, Fingerprint, Fingerprinter, FingerprinterFactory, HashVariants};
use crate::manifest::{FingerprintEntry, Manifest};

/// Best match of a query against the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// `similarity >= threshold`
    pub duplicate: bool,
    /// Weighted aggregate similarity of the best entry, in `[0, 1]`.
    pub similarity: f64,
    /// Threshold the verdict was taken against.
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_entry: Option<FingerprintEntry>,
}

/// Result of a match request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Match(MatchResult),
    /// The query was hashed under another algorithm; no score is computed.
    VersionMismatch {
        manifest: AlgorithmId,
        query: AlgorithmId,
    },
}

impl MatchOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Match(result) if result.duplicate)
    }

    pub fn result(&self) -> Option<&MatchResult> {
        match self {
            Self::Match(result) => Some(result),
            Self::VersionMismatch { .. } => None,
        }
    }
}

/// Compares query images against a loaded manifest.
pub struct DuplicateMatcher {
    manifest: Manifest,
    hasher: Arc<dyn Fingerprinter>,
}

impl std::fmt::Debug for DuplicateMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateMatcher")
            .field("algorithm", &self.manifest.algorithm_id())
            .field("images", &self.manifest.len())
            .finish()
    }
}

impl DuplicateMatcher {
    /// Validate `manifest` and select the hasher for its algorithm.
    pub fn new(manifest: Manifest) -> Result<Self> {
        manifest.validate()?;
        let hasher = FingerprinterFactory::create(manifest.algorithm_id())?;
        Ok(Self { manifest, hasher })
    }

    /// Load a manifest file and build a matcher over it.
    pub fn load(path: &Path) -> Result<Self> {
        let matcher = Self::new(Manifest::load(path)?)?;
        info!(
            path = %path.display(),
            algorithm = %matcher.algorithm(),
            images = matcher.manifest.len(),
            "Duplicate matcher ready"
        );
        Ok(matcher)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.manifest.algorithm_id()
    }

    /// Threshold from the manifest metadata.
    pub fn default_threshold(&self) -> f64 {
        self.manifest.metadata.similarity_threshold
    }

    /// Hasher matching the manifest's algorithm.
    pub fn fingerprinter(&self) -> &dyn Fingerprinter {
        self.hasher.as_ref()
    }

    /// Compare a precomputed fingerprint against every entry.
    ///
    /// `threshold` overrides the manifest's similarity threshold.
    pub fn match_fingerprint(&self, query: &Fingerprint, threshold: Option<f64>) -> MatchOutcome {
        if query.algorithm != self.algorithm() {
            debug!(manifest = %self.algorithm(), query = %query.algorithm, "Algorithm mismatch");
            return MatchOutcome::VersionMismatch {
                manifest: self.algorithm(),
                query: query.algorithm,
            };
        }

        let threshold = threshold.unwrap_or_else(|| self.default_threshold());
        let mut best: Option<(f64, &FingerprintEntry)> = None;
        for entry in &self.manifest.images {
            let score = aggregate_similarity(self.algorithm(), &query.hashes, &entry.hashes);
            // strict comparison: the first entry keeps a tie
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, entry));
            }
        }

        let (similarity, matched_entry) = match best {
            Some((score, entry)) => (score, Some(entry.clone())),
            None => (0.0, None),
        };

        MatchOutcome::Match(MatchResult {
            duplicate: matched_entry.is_some() && similarity >= threshold,
            similarity,
            threshold,
            matched_entry,
        })
    }

    /// Decode raw image bytes within `limits`, hash them with the manifest's
    /// algorithm and match.
    pub fn match_image_bytes(
        &self,
        bytes: &[u8],
        limits: &DecodeLimits,
        threshold: Option<f64>,
    ) -> Result<MatchOutcome> {
        let image = decode_bounded(bytes, limits)?;
        let fingerprint = self.hasher.fingerprint(&image)?;
        Ok(self.match_fingerprint(&fingerprint, threshold))
    }
}

/// Weighted average of the per-variant similarities.
///
/// Computed as one minus the weighted normalized Hamming distance, so
/// identical hashes score exactly 1.0. A variant whose lengths disagree
/// counts as fully different.
pub fn aggregate_similarity(algorithm: AlgorithmId, a: &HashVariants, b: &HashVariants) -> f64 {
    let weights = algorithm.weights();
    let distance = |x: &BitString, y: &BitString| x.similarity(y).map_or(1.0, |s| 1.0 - s);
    let weighted = weights.phash * distance(&a.phash, &b.phash)
        + weights.ahash * distance(&a.ahash, &b.ahash)
        + weights.dhash * distance(&a.dhash, &b.dhash)
        + weights.whash * distance(&a.whash, &b.whash);
    (1.0 - weighted).clamp(0.0, 1.0)
}
