//! Capability set every digest implementation provides

/// Incremental digest state owned by exactly one worker
///
/// `update` may be called with an empty slice; zero-byte files rely on it.
pub trait StreamingHasher: Send {
    /// Feed the next block of file content
    fn update(&mut self, data: &[u8]);

    /// Consume the state and render the digest as lowercase hex
    fn finalize(self: Box<Self>) -> String;
}
