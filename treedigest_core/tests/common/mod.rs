//! Common test utilities for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use treedigest_core::{BufferTransport, DigestConfig};

/// Deterministic, non-repeating-looking test content
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// Write `content` to `name` inside `dir`
pub fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn config(
    algorithms: &[&str],
    max_buffers: usize,
    block_size: usize,
    transport: BufferTransport,
) -> DigestConfig {
    DigestConfig {
        max_buffers,
        block_size,
        transport,
        ..DigestConfig::test()
    }
    .with_algorithms(algorithms.iter().copied())
}

pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}
