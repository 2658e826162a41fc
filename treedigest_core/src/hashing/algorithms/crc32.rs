//! CRC32 checksum

use crate::hashing::traits::StreamingHasher;
use crc32fast::Hasher;

/// CRC-32 (IEEE) streaming hasher
pub(crate) struct Crc32StreamingHasher {
    hasher: Hasher,
}

impl Crc32StreamingHasher {
    pub(crate) fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }
}

impl StreamingHasher for Crc32StreamingHasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> String {
        format!("{:08x}", self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc32_of(chunks: &[&[u8]]) -> String {
        let mut hasher = Box::new(Crc32StreamingHasher::new());
        for chunk in chunks {
            hasher.update(chunk);
        }
        hasher.finalize()
    }

    #[test]
    fn test_crc32_known_values() {
        assert_eq!(crc32_of(&[]), "00000000");
        assert_eq!(crc32_of(&[b"abc"]), "352441c2");
        assert_eq!(crc32_of(&[b"a", b"", b"b", b"c"]), "352441c2");
    }
}
