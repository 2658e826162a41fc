//! Digest algorithm implementations

use super::DigestAlgorithm;
use super::traits::StreamingHasher;

mod adler32;
mod crc32;
mod noop;
mod rustcrypto;

use adler32::Adler32StreamingHasher;
use crc32::Crc32StreamingHasher;
use noop::NoopStreamingHasher;
use rustcrypto::DigestStreamingHasher;

/// Construct a fresh hasher for `algorithm`
pub(crate) fn create_hasher(algorithm: DigestAlgorithm) -> Box<dyn StreamingHasher> {
    use DigestAlgorithm::*;

    match algorithm {
        Crc32 => Box::new(Crc32StreamingHasher::new()),
        Adler32 => Box::new(Adler32StreamingHasher::new()),
        Md5 => Box::new(DigestStreamingHasher::<md5::Md5>::new()),
        Sha1 => Box::new(DigestStreamingHasher::<sha1::Sha1>::new()),
        Sha224 => Box::new(DigestStreamingHasher::<sha2::Sha224>::new()),
        Sha256 => Box::new(DigestStreamingHasher::<sha2::Sha256>::new()),
        Sha384 => Box::new(DigestStreamingHasher::<sha2::Sha384>::new()),
        Sha512 => Box::new(DigestStreamingHasher::<sha2::Sha512>::new()),
        Sha3_224 => Box::new(DigestStreamingHasher::<sha3::Sha3_224>::new()),
        Sha3_256 => Box::new(DigestStreamingHasher::<sha3::Sha3_256>::new()),
        Sha3_384 => Box::new(DigestStreamingHasher::<sha3::Sha3_384>::new()),
        Sha3_512 => Box::new(DigestStreamingHasher::<sha3::Sha3_512>::new()),
        Blake2b => Box::new(DigestStreamingHasher::<blake2::Blake2b512>::new()),
        Blake2s => Box::new(DigestStreamingHasher::<blake2::Blake2s256>::new()),
        Noop32 | Noop128 | Noop160 | Noop256 | Noop512 => {
            Box::new(NoopStreamingHasher::new(algorithm.output_width()))
        }
    }
}
