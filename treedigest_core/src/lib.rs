//! Treedigest Core Library
//!
//! Parallel multi-digest hashing: every file is read once into a small ring
//! of reusable buffers and each requested digest algorithm consumes the
//! blocks on its own worker thread.

pub mod error;
pub mod hashing;

pub use error::{Error, Result};
pub use hashing::{
    BufferTransport, DigestAlgorithm, DigestMap, DigestRegistry, DigestSpec, DigestStats,
    FileDigest, WorkerPool, end_workers, start_workers,
};

use error::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default block size for the buffer ring (256 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

/// Default number of buffers in the ring
pub const DEFAULT_MAX_BUFFERS: usize = 4;

/// Default ceiling on worker threads
pub const DEFAULT_MAX_WORKERS: usize = 32;

/// Default wait for a single worker event before declaring a hang
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 300;

/// Largest total allocation allowed for the buffer ring (1 GiB)
pub const MAX_RING_BYTES: usize = 1 << 30;

/// Settings for one digest run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Requested algorithm names; unknown names are skipped with a warning
    pub algorithms: Vec<String>,
    pub max_buffers: usize,
    pub block_size: usize,
    /// Largest number of algorithms that may be active at once
    pub max_workers: usize,
    /// Workers that may hold the same block concurrently
    pub max_concurrent_jobs: usize,
    pub transport: BufferTransport,
    /// Zero waits forever
    pub worker_timeout_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            algorithms: ["md5", "sha1", "sha256"].map(String::from).to_vec(),
            max_buffers: DEFAULT_MAX_BUFFERS,
            block_size: DEFAULT_BLOCK_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            max_concurrent_jobs: std::thread::available_parallelism().map_or(1, |n| n.get()),
            transport: BufferTransport::Shared,
            worker_timeout_secs: DEFAULT_WORKER_TIMEOUT_SECS,
        }
    }
}

impl DigestConfig {
    /// Create a test configuration
    pub fn test() -> Self {
        Self {
            max_buffers: 3,
            block_size: 1024, // 1KB blocks so small files span several
            max_concurrent_jobs: 4,
            worker_timeout_secs: 30,
            ..Self::default()
        }
    }

    pub fn with_algorithms<I, S>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.algorithms = algorithms.into_iter().map(Into::into).collect();
        self
    }

    pub fn worker_timeout(&self) -> Option<Duration> {
        (self.worker_timeout_secs > 0).then(|| Duration::from_secs(self.worker_timeout_secs))
    }

    /// Check the sizing fields; algorithm names are checked by the registry
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_buffers", self.max_buffers),
            ("block_size", self.block_size),
            ("max_workers", self.max_workers),
            ("max_concurrent_jobs", self.max_concurrent_jobs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ValidationError::invalid_configuration(&format!(
                    "{field} must be greater than zero"
                ))
                .into());
            }
        }

        match self.block_size.checked_mul(self.max_buffers) {
            Some(total) if total <= MAX_RING_BYTES => Ok(()),
            _ => Err(ValidationError::invalid_configuration(&format!(
                "block_size x max_buffers exceeds {MAX_RING_BYTES} bytes"
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DigestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.algorithms, vec!["md5", "sha1", "sha256"]);
        assert_eq!(config.worker_timeout(), Some(Duration::from_secs(300)));
        assert!(config.max_concurrent_jobs >= 1);
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = DigestConfig {
            worker_timeout_secs: 0,
            ..DigestConfig::test()
        };
        assert_eq!(config.worker_timeout(), None);
    }

    #[test]
    fn test_zero_sizes_are_rejected() {
        let config = DigestConfig {
            block_size: 0,
            ..DigestConfig::test()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("block_size"));
    }

    #[test]
    fn test_oversized_ring_is_rejected() {
        let overflow = DigestConfig {
            block_size: usize::MAX,
            max_buffers: 2,
            ..DigestConfig::test()
        };
        assert!(overflow.validate().is_err());

        let too_large = DigestConfig {
            block_size: MAX_RING_BYTES / 2 + 1,
            max_buffers: 2,
            ..DigestConfig::test()
        };
        let err = too_large.validate().unwrap_err();
        assert!(err.to_string().contains("block_size x max_buffers"));

        let at_limit = DigestConfig {
            block_size: MAX_RING_BYTES / 4,
            max_buffers: 4,
            ..DigestConfig::test()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: DigestConfig =
            serde_json::from_str(r#"{"algorithms": ["crc32"], "transport": "inline"}"#).unwrap();
        assert_eq!(config.algorithms, vec!["crc32"]);
        assert_eq!(config.transport, BufferTransport::Inline);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
    }
}
