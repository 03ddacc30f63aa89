//! Fingerprint manifest: the persisted, versioned collection of all
//! fingerprints of a dataset snapshot.
//!
//! The JSON layout keeps the field names of the manifests consumed by the
//! web client (`filename`, `class`, `hashes.phash`, ...). A manifest is
//! immutable once published; regeneration replaces the file wholesale.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::{FingerprintError, Result};
use crate::hash::{AlgorithmId, HashVariants};

/// Manifest file format version.
pub const MANIFEST_VERSION: &str = "2.0";

/// Similarity at or above which a query counts as a duplicate.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.99;

/// Identifier written by the 1.x generator. Its dhash is 255 bits and its
/// window rule predates `window256-v2`, so those manifests must be rebuilt.
pub const LEGACY_ALGORITHM_ID: &str = "custom-mirroring-frontend";

/// Dataset class of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassLabel {
    Fertile,
    Infertile,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 2] = [ClassLabel::Fertile, ClassLabel::Infertile];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fertile => "fertile",
            Self::Infertile => "infertile",
        }
    }

    /// Directory names this class is read from, in processing order.
    pub fn directory_names(&self) -> &'static [&'static str] {
        match self {
            Self::Fertile => &["fertil", "fertile"],
            Self::Infertile => &["infertil", "infertile"],
        }
    }

    /// Map a class directory name to its canonical label.
    pub fn from_directory_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|label| label.directory_names().contains(&name))
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fingerprint of one dataset image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintEntry {
    /// `<class directory>/<file name>`
    #[serde(rename = "filename")]
    pub relative_filename: String,
    #[serde(rename = "class")]
    pub class_label: ClassLabel,
    pub original_filename: String,
    /// Width of the source image before normalization.
    pub width: u32,
    /// Height of the source image before normalization.
    pub height: u32,
    pub hashes: HashVariants,
}

/// Manifest header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub version: String,
    #[serde(alias = "algorithm", deserialize_with = "deserialize_algorithm_id")]
    pub algorithm_id: AlgorithmId,
    pub generated_at: DateTime<Utc>,
    pub total_images: usize,
    #[serde(alias = "threshold")]
    pub similarity_threshold: f64,
}

fn deserialize_algorithm_id<'de, D>(deserializer: D) -> std::result::Result<AlgorithmId, D::Error>
where
    D: Deserializer<'de>,
{
    let id = String::deserialize(deserializer)?;
    if id == LEGACY_ALGORITHM_ID {
        return Err(de::Error::custom(format!(
            "legacy algorithm '{id}' is not supported, regenerate the manifest with {}",
            AlgorithmId::default()
        )));
    }
    id.parse().map_err(de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub metadata: ManifestMetadata,
    pub images: Vec<FingerprintEntry>,
}

impl Manifest {
    /// An empty manifest stamped with the current time.
    pub fn new(algorithm_id: AlgorithmId, similarity_threshold: f64) -> Self {
        Self {
            metadata: ManifestMetadata {
                version: MANIFEST_VERSION.to_string(),
                algorithm_id,
                generated_at: Utc::now(),
                total_images: 0,
                similarity_threshold,
            },
            images: Vec::new(),
        }
    }

    pub fn algorithm_id(&self) -> AlgorithmId {
        self.metadata.algorithm_id
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Append an entry computed under this manifest's algorithm.
    pub fn push(&mut self, entry: FingerprintEntry) {
        self.images.push(entry);
        self.metadata.total_images = self.images.len();
    }

    /// Entries of one class.
    pub fn entries_for(&self, label: ClassLabel) -> impl Iterator<Item = &FingerprintEntry> {
        self.images.iter().filter(move |e| e.class_label == label)
    }

    /// Check the manifest invariants.
    pub fn validate(&self) -> Result<()> {
        if self.metadata.total_images != self.images.len() {
            return Err(FingerprintError::InvalidManifest(format!(
                "total_images is {} but {} entries are present",
                self.metadata.total_images,
                self.images.len()
            )));
        }

        let threshold = self.metadata.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FingerprintError::InvalidManifest(format!(
                "similarity_threshold {threshold} is outside [0, 1]"
            )));
        }

        let bit_length = self.algorithm_id().bit_length();
        let mut seen = HashSet::new();
        for entry in &self.images {
            if !seen.insert((entry.class_label, entry.original_filename.as_str())) {
                return Err(FingerprintError::InvalidManifest(format!(
                    "duplicate filename '{}' in class {}",
                    entry.original_filename, entry.class_label
                )));
            }
            for (name, bits) in entry.hashes.iter() {
                if bits.len() != bit_length {
                    return Err(FingerprintError::InvalidManifest(format!(
                        "{} of '{}' has {} bits, expected {} for {}",
                        name,
                        entry.relative_filename,
                        bits.len(),
                        bit_length,
                        self.algorithm_id()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FingerprintError::InvalidManifest(format!("serialization failed: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FingerprintError::InvalidManifest(e.to_string()))
    }

    /// Read and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| FingerprintError::ManifestRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let manifest = Self::from_json(&json)?;
        manifest.validate()?;
        debug!(
            path = %path.display(),
            algorithm = %manifest.algorithm_id(),
            images = manifest.len(),
            "Loaded manifest"
        );
        Ok(manifest)
    }

    /// Write the manifest atomically.
    ///
    /// The JSON goes to `<path>.tmp`, is synced, then renamed over `path`, so
    /// readers only ever observe a complete manifest.
    pub fn write_atomic(&self, path: &Path) -> Result<u64> {
        let write_err = |source: std::io::Error| FingerprintError::ManifestWrite {
            path: path.to_path_buf(),
            source,
        };

        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = temp_path(path);
        let result = (|| {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            writer.write_all(json.as_bytes())?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(e));
        }

        let size = json.len() as u64;
        info!(path = %path.display(), bytes = size, images = self.len(), "Manifest written");
        Ok(size)
    }
}

/// Scratch path used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Checkpoint path for `output` after `count` processed images.
///
/// `out/fingerprints.json` → `out/fingerprints_checkpoint_200.json`.
pub fn checkpoint_path(output: &Path, count: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("manifest");
    let ext = output.extension().and_then(|e| e.to_str()).unwrap_or("json");
    output.with_file_name(format!("{stem}_checkpoint_{count}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitString;
    use crate::hash::HASH_BITS;
    use tempfile::TempDir;

    fn entry(class_dir: &str, name: &str, fill: bool) -> FingerprintEntry {
        let bits = BitString::from_bits(std::iter::repeat(fill).take(HASH_BITS));
        FingerprintEntry {
            relative_filename: format!("{class_dir}/{name}"),
            class_label: ClassLabel::from_directory_name(class_dir).unwrap(),
            original_filename: name.to_string(),
            width: 640,
            height: 480,
            hashes: HashVariants {
                phash: bits.clone(),
                ahash: bits.clone(),
                dhash: bits,
                whash: BitString::zeros(HASH_BITS),
            },
        }
    }

    fn sample_manifest() -> Manifest {
        let mut manifest = Manifest::new(AlgorithmId::Window256V2, DEFAULT_SIMILARITY_THRESHOLD);
        manifest.push(entry("fertil", "001.jpg", true));
        manifest.push(entry("infertil", "001.jpg", false));
        manifest
    }

    #[test]
    fn test_class_label_from_directory() {
        assert_eq!(ClassLabel::from_directory_name("fertil"), Some(ClassLabel::Fertile));
        assert_eq!(ClassLabel::from_directory_name("fertile"), Some(ClassLabel::Fertile));
        assert_eq!(ClassLabel::from_directory_name("infertil"), Some(ClassLabel::Infertile));
        assert_eq!(ClassLabel::from_directory_name("other"), None);
    }

    #[test]
    fn test_push_keeps_total_in_sync() {
        let manifest = sample_manifest();
        assert_eq!(manifest.metadata.total_images, 2);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_json_field_names() {
        let value: serde_json::Value =
            serde_json::from_str(&sample_manifest().to_json().unwrap()).unwrap();
        assert_eq!(value["metadata"]["algorithm_id"], "window256-v2");
        assert_eq!(value["metadata"]["similarity_threshold"], 0.99);
        assert_eq!(value["images"][0]["filename"], "fertil/001.jpg");
        assert_eq!(value["images"][0]["class"], "fertile");
        assert_eq!(value["images"][1]["class"], "infertile");
        assert_eq!(
            value["images"][0]["hashes"]["phash"].as_str().unwrap().len(),
            HASH_BITS
        );
    }

    #[test]
    fn test_json_round_trip() {
        let manifest = sample_manifest();
        let parsed = Manifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed, manifest);
    }

    fn metadata_json(algorithm: &str) -> String {
        format!(
            r#"{{
            "metadata": {{
                "version": "1.0",
                "generated_at": "2024-05-01T10:00:00Z",
                "total_images": 0,
                "threshold": 0.99,
                "algorithm": "{algorithm}"
            }},
            "images": []
        }}"#
        )
    }

    #[test]
    fn test_rejects_legacy_algorithm() {
        let err = Manifest::from_json(&metadata_json(LEGACY_ALGORITHM_ID)).unwrap_err();
        assert!(matches!(
            &err,
            FingerprintError::InvalidManifest(msg)
                if msg.contains("legacy algorithm 'custom-mirroring-frontend' is not supported")
        ));
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        assert!(matches!(
            Manifest::from_json(&metadata_json("md5")),
            Err(FingerprintError::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_short_metadata_keys() {
        let manifest = Manifest::from_json(&metadata_json("imagehash16-v1")).unwrap();
        assert_eq!(manifest.algorithm_id(), AlgorithmId::ImageHash16V1);
        assert_eq!(manifest.metadata.similarity_threshold, 0.99);
    }

    #[test]
    fn test_validate_total_mismatch() {
        let mut manifest = sample_manifest();
        manifest.metadata.total_images = 5;
        assert!(matches!(
            manifest.validate(),
            Err(FingerprintError::InvalidManifest(msg)) if msg.contains("total_images")
        ));
    }

    #[test]
    fn test_validate_duplicate_filename_in_class() {
        let mut manifest = sample_manifest();
        manifest.push(entry("fertile", "001.jpg", false));
        assert!(matches!(
            manifest.validate(),
            Err(FingerprintError::InvalidManifest(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_validate_bit_length() {
        let mut manifest = sample_manifest();
        manifest.images[0].hashes.dhash = BitString::zeros(64);
        assert!(matches!(
            manifest.validate(),
            Err(FingerprintError::InvalidManifest(msg)) if msg.contains("64 bits")
        ));
    }

    #[test]
    fn test_write_atomic_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/fingerprints.json");

        let manifest = sample_manifest();
        let size = manifest.write_atomic(&path).unwrap();
        assert!(size > 0);
        assert!(!temp_path(&path).exists(), "scratch file should be renamed away");

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_write_failure_is_manifest_write_error() {
        let temp = TempDir::new().unwrap();
        // a directory in place of the destination file
        let path = temp.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("child"), b"x").unwrap();

        assert!(matches!(
            sample_manifest().write_atomic(&path),
            Err(FingerprintError::ManifestWrite { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Manifest::load(Path::new("/nonexistent/fingerprints.json")),
            Err(FingerprintError::ManifestRead { .. })
        ));
    }

    #[test]
    fn test_checkpoint_path() {
        assert_eq!(
            checkpoint_path(Path::new("out/fingerprints.json"), 200),
            PathBuf::from("out/fingerprints_checkpoint_200.json")
        );
        assert_eq!(
            temp_path(Path::new("out/fingerprints.json")),
            PathBuf::from("out/fingerprints.json.tmp")
        );
    }
}
