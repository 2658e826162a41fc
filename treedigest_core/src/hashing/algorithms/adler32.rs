//! Adler-32 checksum (RFC 1950)

use crate::hashing::traits::StreamingHasher;

const MOD_ADLER: u32 = 65_521;

/// Largest run of bytes that can be summed before `b` overflows a u32
const NMAX: usize = 5_552;

pub(crate) struct Adler32StreamingHasher {
    a: u32,
    b: u32,
}

impl Adler32StreamingHasher {
    pub(crate) fn new() -> Self {
        Self { a: 1, b: 0 }
    }
}

impl StreamingHasher for Adler32StreamingHasher {
    fn update(&mut self, data: &[u8]) {
        for run in data.chunks(NMAX) {
            for &byte in run {
                self.a += u32::from(byte);
                self.b += self.a;
            }
            self.a %= MOD_ADLER;
            self.b %= MOD_ADLER;
        }
    }

    fn finalize(self: Box<Self>) -> String {
        format!("{:08x}", (self.b << 16) | self.a)
    }
}
