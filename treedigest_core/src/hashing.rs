//! Multi-digest hashing pipeline
//!
//! One worker thread per digest algorithm, fed from a ring of reusable
//! buffers so each file is read from disk exactly once no matter how many
//! digests are requested.

use crate::{Error, Result, error::ValidationError};
use std::fmt;
use std::str::FromStr;

mod algorithms;
mod buffer_ring;
mod digester;
mod pool;
mod registry;
mod traits;
mod worker;

pub use buffer_ring::{BlockView, BufferRing, BufferTransport, Prefetch};
pub use digester::{DigestMap, FileDigest};
pub use pool::{DigestStats, WorkerPool, end_workers, start_workers};
pub use registry::{DigestRegistry, DigestSpec};
pub use traits::StreamingHasher;
pub use worker::{DigestResult, WorkUnit, WorkerEvent, WorkerState};

/// Digest algorithms known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestAlgorithm {
    Crc32,
    Adler32,
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Blake2b,
    Blake2s,
    /// Placeholder with a 32-bit wide all-zero digest
    Noop32,
    Noop128,
    Noop160,
    Noop256,
    Noop512,
}

impl DigestAlgorithm {
    /// Every algorithm, in registry listing order
    pub const ALL: [DigestAlgorithm; 19] = [
        Self::Crc32,
        Self::Adler32,
        Self::Md5,
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Sha3_224,
        Self::Sha3_256,
        Self::Sha3_384,
        Self::Sha3_512,
        Self::Blake2b,
        Self::Blake2s,
        Self::Noop32,
        Self::Noop128,
        Self::Noop160,
        Self::Noop256,
        Self::Noop512,
    ];

    /// Canonical lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Crc32 => "crc32",
            Self::Adler32 => "adler32",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Sha3_224 => "sha3_224",
            Self::Sha3_256 => "sha3_256",
            Self::Sha3_384 => "sha3_384",
            Self::Sha3_512 => "sha3_512",
            Self::Blake2b => "blake2b",
            Self::Blake2s => "blake2s",
            Self::Noop32 => "noop32",
            Self::Noop128 => "noop128",
            Self::Noop160 => "noop160",
            Self::Noop256 => "noop256",
            Self::Noop512 => "noop512",
        }
    }

    /// Digest length in bits
    pub fn output_bits(self) -> usize {
        match self {
            Self::Crc32 | Self::Adler32 | Self::Noop32 => 32,
            Self::Md5 | Self::Noop128 => 128,
            Self::Sha1 | Self::Noop160 => 160,
            Self::Sha224 | Self::Sha3_224 => 224,
            Self::Sha256 | Self::Sha3_256 | Self::Blake2s | Self::Noop256 => 256,
            Self::Sha384 | Self::Sha3_384 => 384,
            Self::Sha512 | Self::Sha3_512 | Self::Blake2b | Self::Noop512 => 512,
        }
    }

    /// Number of hex characters in the rendered digest
    pub fn output_width(self) -> usize {
        self.output_bits() / 4
    }

    /// Construct a fresh hasher
    pub fn create_hasher(self) -> Box<dyn StreamingHasher> {
        algorithms::create_hasher(self)
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    /// Case-insensitive; `sha3-256` is accepted for `sha3_256`
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == normalized)
            .ok_or_else(|| Error::Validation(ValidationError::unknown_algorithm(s)))
    }
}
