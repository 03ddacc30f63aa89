//! Fingerprint Manifest Builder.
//!
//! Walks the class directories of a dataset, fingerprints every supported
//! image and persists the result as a [`Manifest`]. Images are processed in
//! fixed-size batches: hashing inside a batch runs on the rayon pool, while
//! assembly and checkpoint writes stay on the calling thread, so entry order
//! always follows the sorted input order.
//!
//! # Example
//!
//! ```no_run
//! use eggprint_core::builder::{BuilderConfig, ManifestBuilder};
//!
//! let config = BuilderConfig {
//!     data_dir: "dataset".into(),
//!     output: "fingerprints.json".into(),
//!     ..BuilderConfig::default()
//! };
//! let report = ManifestBuilder::new(config).build().unwrap();
//! println!("{} images fingerprinted", report.manifest.len());
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::decode::{is_supported_extension, load_image, DecodeLimits};
use crate::error::{FingerprintError, Result};
use crate::hash::{AlgorithmId, Fingerprinter, FingerprinterFactory};
use crate::manifest::{
    checkpoint_path, ClassLabel, FingerprintEntry, Manifest, DEFAULT_SIMILARITY_THRESHOLD,
};

/// Default number of images hashed per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of processed images between checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 200;

/// Maximum length of an error message recorded for a skipped image.
const MAX_ERROR_CHARS: usize = 100;

/// Manifest builder configuration.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Dataset root containing the class directories.
    pub data_dir: PathBuf,
    /// Final manifest path. Checkpoints are written next to it.
    pub output: PathBuf,
    pub algorithm: AlgorithmId,
    /// Images hashed per batch (values below 1 are treated as 1).
    pub batch_size: usize,
    /// Processed images between checkpoints (0 disables checkpoints).
    pub checkpoint_interval: usize,
    /// Threshold recorded in the manifest metadata.
    pub similarity_threshold: f64,
    /// Checkpoint manifest to continue from.
    pub resume_from: Option<PathBuf>,
    pub decode_limits: DecodeLimits,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("dataset"),
            output: PathBuf::from("fingerprints.json"),
            algorithm: AlgorithmId::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            resume_from: None,
            decode_limits: DecodeLimits::trusted(),
        }
    }
}

/// One image discovered in the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub path: PathBuf,
    pub class_label: ClassLabel,
    /// `<class directory>/<file name>`
    pub relative_filename: String,
    pub original_filename: String,
}

/// An image that was skipped because it could not be fingerprinted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub relative_filename: String,
    /// Error text, truncated to 100 characters.
    pub message: String,
}

/// Summary of a builder run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub manifest: Manifest,
    pub output: PathBuf,
    /// Size of the written manifest in bytes.
    pub file_size: u64,
    /// Number of images in each processed batch, in order.
    pub batches: Vec<usize>,
    /// Checkpoint files successfully written.
    pub checkpoints: Vec<PathBuf>,
    pub failures: Vec<BuildFailure>,
    /// Images already present in the resumed checkpoint.
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Receives progress notifications while a build runs.
///
/// Called from rayon worker threads.
pub trait BuildProgress: Send + Sync {
    /// Number of images that will be processed.
    fn start(&self, _total: u64) {}

    /// `delta` more images were processed (successfully or not).
    fn advance(&self, _delta: u64) {}

    fn finish(&self) {}
}

/// Progress sink that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl BuildProgress for NoProgress {}

/// Builds a fingerprint manifest from a dataset directory.
pub struct ManifestBuilder {
    config: BuilderConfig,
    progress: Arc<dyn BuildProgress>,
}

impl ManifestBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn BuildProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the full pipeline and write the final manifest.
    ///
    /// # Errors
    ///
    /// - `DatasetNotFound` if the dataset root does not exist
    /// - `ManifestRead`/`InvalidManifest`/`AlgorithmVersionMismatch` for a bad
    ///   resume checkpoint
    /// - `ManifestWrite` if the final manifest cannot be written
    ///
    /// Undecodable images are skipped and reported in [`BuildReport::failures`].
    pub fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let config = &self.config;

        let files = discover(&config.data_dir)?;
        let hasher = FingerprinterFactory::create(config.algorithm)?;

        let mut manifest = self.initial_manifest()?;
        // same key as the manifest's uniqueness check, so a file moved
        // between alias directories still counts as done
        let done: HashSet<(ClassLabel, String)> = manifest
            .images
            .iter()
            .map(|e| (e.class_label, e.original_filename.clone()))
            .collect();
        let pending: Vec<DatasetFile> = files
            .into_iter()
            .filter(|f| !done.contains(&(f.class_label, f.original_filename.clone())))
            .collect();
        let skipped = done.len();

        info!(
            data_dir = %config.data_dir.display(),
            algorithm = %config.algorithm,
            pending = pending.len(),
            resumed = skipped,
            "Starting manifest build"
        );

        let batch_size = config.batch_size.max(1);
        let mut processed = manifest.len();
        let mut batches = Vec::new();
        let mut checkpoints = Vec::new();
        let mut failures = Vec::new();

        self.progress.start(pending.len() as u64);

        for batch in pending.chunks(batch_size) {
            let results: Vec<Result<FingerprintEntry>> = batch
                .par_iter()
                .map(|file| {
                    let result = fingerprint_file(hasher.as_ref(), file, &config.decode_limits);
                    self.progress.advance(1);
                    result
                })
                .collect();

            for (file, result) in batch.iter().zip(results) {
                match result {
                    Ok(entry) => manifest.push(entry),
                    Err(e) if e.is_per_image() => {
                        let message = truncate_message(&e.to_string());
                        warn!(file = %file.relative_filename, error = %message, "Skipping image");
                        failures.push(BuildFailure {
                            relative_filename: file.relative_filename.clone(),
                            message,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            let before = processed;
            processed += batch.len();
            batches.push(batch.len());
            debug!(batch = batches.len(), size = batch.len(), processed, "Batch complete");

            if crosses_checkpoint(before, processed, config.checkpoint_interval) {
                let path = checkpoint_path(&config.output, processed);
                manifest.metadata.generated_at = Utc::now();
                match manifest.write_atomic(&path) {
                    Ok(_) => {
                        info!(path = %path.display(), images = manifest.len(), "Checkpoint saved");
                        checkpoints.push(path);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Checkpoint write failed"),
                }
            }
        }

        self.progress.finish();

        manifest.metadata.generated_at = Utc::now();
        manifest.metadata.similarity_threshold = config.similarity_threshold;
        manifest.validate()?;
        let file_size = manifest.write_atomic(&config.output)?;

        info!(
            images = manifest.len(),
            failures = failures.len(),
            output = %config.output.display(),
            "Manifest build complete"
        );

        Ok(BuildReport {
            manifest,
            output: config.output.clone(),
            file_size,
            batches,
            checkpoints,
            failures,
            skipped,
            elapsed: started.elapsed(),
        })
    }

    fn initial_manifest(&self) -> Result<Manifest> {
        let config = &self.config;
        let Some(path) = &config.resume_from else {
            return Ok(Manifest::new(config.algorithm, config.similarity_threshold));
        };

        let manifest = Manifest::load(path)?;
        if manifest.algorithm_id() != config.algorithm {
            return Err(FingerprintError::AlgorithmVersionMismatch {
                expected: config.algorithm,
                found: manifest.algorithm_id(),
            });
        }
        info!(path = %path.display(), images = manifest.len(), "Resuming from checkpoint");
        Ok(manifest)
    }
}

/// List the dataset images in processing order.
///
/// Class directories are visited per [`ClassLabel::directory_names`]; files
/// are sorted by name within each directory. A file name that already
/// appeared under another directory of the same class is skipped.
pub fn discover(data_dir: &Path) -> Result<Vec<DatasetFile>> {
    if !data_dir.is_dir() {
        return Err(FingerprintError::DatasetNotFound(data_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for label in ClassLabel::ALL {
        for dir_name in label.directory_names() {
            let dir = data_dir.join(dir_name);
            if !dir.is_dir() {
                continue;
            }

            let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported_extension(p))
                .collect();
            paths.sort();
            debug!(dir = %dir.display(), images = paths.len(), "Scanned class directory");

            for path in paths {
                let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned)
                else {
                    warn!(path = %path.display(), "Skipping non UTF-8 file name");
                    continue;
                };
                if !seen.insert((label, name.clone())) {
                    warn!(class = %label, file = %name, "Duplicate file name in class, skipping");
                    continue;
                }
                files.push(DatasetFile {
                    relative_filename: format!("{dir_name}/{name}"),
                    class_label: label,
                    original_filename: name,
                    path,
                });
            }
        }
    }

    Ok(files)
}

fn fingerprint_file(
    hasher: &dyn Fingerprinter,
    file: &DatasetFile,
    limits: &DecodeLimits,
) -> Result<FingerprintEntry> {
    let image = load_image(&file.path, limits)?;
    let fingerprint = hasher.fingerprint(&image)?;
    Ok(FingerprintEntry {
        relative_filename: file.relative_filename.clone(),
        class_label: file.class_label,
        original_filename: file.original_filename.clone(),
        width: image.width(),
        height: image.height(),
        hashes: fingerprint.hashes,
    })
}

fn crosses_checkpoint(before: usize, after: usize, interval: usize) -> bool {
    interval > 0 && before / interval < after / interval
}

fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_CHARS).collect()
}
