//! Adapter for the RustCrypto `Digest` implementations
//!
//! md-5, sha1, sha2, sha3 and blake2 all implement the same `digest` 0.10
//! trait, so one generic wrapper covers every cryptographic algorithm.

use crate::hashing::traits::StreamingHasher;
use sha2::Digest;

pub(crate) struct DigestStreamingHasher<D> {
    hasher: D,
}

impl<D: Digest> DigestStreamingHasher<D> {
    pub(crate) fn new() -> Self {
        Self { hasher: D::new() }
    }
}

impl<D> StreamingHasher for DigestStreamingHasher<D>
where
    D: Digest + Send,
{
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.hasher, data);
    }

    fn finalize(self: Box<Self>) -> String {
        self.hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}
