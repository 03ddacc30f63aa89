//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use eggprint_core::{DecodeLimits, DuplicateMatcher, FingerprintError};
use tokio::sync::Semaphore;

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Matcher over the manifest loaded at startup
    pub matcher: Arc<DuplicateMatcher>,
    /// Bounds applied to every uploaded image, without a deadline
    pub decode_limits: DecodeLimits,
    /// Deadline for decoding and hashing one upload
    pub decode_timeout: Option<Duration>,
    /// One permit per upload being decoded; held until the blocking task ends
    pub decode_permits: Arc<Semaphore>,
    /// Maximum upload size in bytes
    pub max_file_size: usize,
}

impl AppState {
    pub fn new(matcher: DuplicateMatcher, config: &Config) -> Self {
        // the deadline is enforced around the blocking task instead of inside
        // the decoder, so a timed-out decode keeps its permit until it ends
        let mut decode_limits = config.decode_limits();
        let decode_timeout = decode_limits.timeout.take();

        Self {
            matcher: Arc::new(matcher),
            decode_limits,
            decode_timeout,
            decode_permits: Arc::new(Semaphore::new(config.max_concurrent_decodes.max(1))),
            max_file_size: config.max_file_size(),
        }
    }

    /// Load the configured manifest.
    ///
    /// Fails when the manifest is missing or invalid, or when it was built
    /// with another algorithm than `EGGPRINT_ALGORITHM` requests.
    pub fn from_config(config: &Config) -> Result<Self, FingerprintError> {
        let matcher = DuplicateMatcher::load(&config.manifest_path)?;
        if let Some(expected) = config.algorithm {
            if matcher.algorithm() != expected {
                return Err(FingerprintError::AlgorithmVersionMismatch {
                    expected,
                    found: matcher.algorithm(),
                });
            }
        }
        Ok(Self::new(matcher, config))
    }
}
