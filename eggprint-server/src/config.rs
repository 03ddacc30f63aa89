//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use eggprint_core::{AlgorithmId, DecodeLimits};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Manifest to match uploads against (default: fingerprints.json)
    pub manifest_path: PathBuf,
    /// Expected manifest algorithm; startup fails on a different one
    pub algorithm: Option<AlgorithmId>,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 30)
    pub body_limit_mb: usize,
    /// Maximum file size per upload in MB (default: 25)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Maximum decoded width and height in pixels (default: 8192)
    pub max_image_dimension: u32,
    /// Image decode deadline in milliseconds (default: 10000)
    pub decode_timeout_ms: u64,
    /// Uploads decoded at once (default: available CPU cores)
    pub max_concurrent_decodes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            manifest_path: PathBuf::from("fingerprints.json"),
            algorithm: None,
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 30,
            max_file_size_mb: 25,
            timeout_secs: 30,
            max_image_dimension: 8192,
            decode_timeout_ms: 10_000,
            max_concurrent_decodes: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let algorithm = std::env::var("EGGPRINT_ALGORITHM").ok().and_then(|v| {
            v.parse()
                .map_err(|e: String| tracing::warn!(error = %e, "Ignoring EGGPRINT_ALGORITHM"))
                .ok()
        });

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            host,
            manifest_path: std::env::var("EGGPRINT_MANIFEST")
                .map(PathBuf::from)
                .unwrap_or(defaults.manifest_path),
            algorithm,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB").unwrap_or(defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            max_image_dimension: env_parse("MAX_IMAGE_DIMENSION")
                .unwrap_or(defaults.max_image_dimension),
            decode_timeout_ms: env_parse("DECODE_TIMEOUT_MS").unwrap_or(defaults.decode_timeout_ms),
            max_concurrent_decodes: env_parse::<usize>("MAX_CONCURRENT_DECODES")
                .unwrap_or(defaults.max_concurrent_decodes)
                .max(1),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Maximum upload size in bytes.
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Bounds applied when decoding uploaded images.
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_bytes: self.max_file_size(),
            max_width: self.max_image_dimension,
            max_height: self.max_image_dimension,
            timeout: Some(Duration::from_millis(self.decode_timeout_ms)),
        }
    }
}
