//! Registry of digest algorithms available to a run

use super::DigestAlgorithm;
use super::traits::StreamingHasher;
use crate::{Result, error::ValidationError};
use log::warn;
use std::collections::BTreeMap;

/// Immutable descriptor of one digest algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestSpec {
    pub name: &'static str,
    /// Hex characters in the rendered digest
    pub output_width: usize,
    pub algorithm: DigestAlgorithm,
}

impl DigestSpec {
    fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            name: algorithm.name(),
            output_width: algorithm.output_width(),
            algorithm,
        }
    }

    /// Construct a fresh hasher for this algorithm
    pub fn create_hasher(&self) -> Box<dyn StreamingHasher> {
        self.algorithm.create_hasher()
    }
}

/// Lookup table from algorithm name to [`DigestSpec`]
///
/// Built once at startup and passed by reference to whoever needs it.
#[derive(Debug, Clone)]
pub struct DigestRegistry {
    specs: BTreeMap<&'static str, DigestSpec>,
}

impl Default for DigestRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DigestRegistry {
    /// Registry without any algorithms
    pub fn empty() -> Self {
        Self {
            specs: BTreeMap::new(),
        }
    }

    /// Registry with every built-in algorithm
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for algorithm in DigestAlgorithm::ALL {
            registry.register(algorithm);
        }
        registry
    }

    /// Register an algorithm, replacing any previous entry with the same name
    pub fn register(&mut self, algorithm: DigestAlgorithm) {
        self.specs.insert(algorithm.name(), DigestSpec::new(algorithm));
    }

    /// Look up an algorithm by name (case-insensitive)
    pub fn get(&self, name: &str) -> Result<&DigestSpec> {
        let algorithm: DigestAlgorithm = name.parse()?;
        self.specs
            .get(algorithm.name())
            .ok_or_else(|| ValidationError::unknown_algorithm(name).into())
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.specs.keys().copied().collect()
    }

    /// All registered specs, sorted by name
    pub fn specs(&self) -> impl Iterator<Item = &DigestSpec> {
        self.specs.values()
    }

    /// Resolve the requested names against the registry
    ///
    /// Unknown names are dropped with a warning and duplicates collapse onto
    /// their first occurrence. Each surviving algorithm needs its own worker,
    /// so more survivors than `available_worker_slots` is an error rather
    /// than a silent truncation.
    pub fn validate<S: AsRef<str>>(
        &self,
        requested: &[S],
        available_worker_slots: usize,
    ) -> Result<Vec<DigestSpec>> {
        let mut selected: Vec<DigestSpec> = Vec::with_capacity(requested.len());

        for name in requested {
            let name = name.as_ref();
            match self.get(name) {
                Ok(spec) => {
                    if !selected.iter().any(|s| s.name == spec.name) {
                        selected.push(*spec);
                    }
                }
                Err(_) => warn!("Ignoring unknown digest algorithm '{name}'"),
            }
        }

        if selected.is_empty() {
            return Err(
                ValidationError::invalid_configuration("No valid digest algorithms requested")
                    .into(),
            );
        }

        if selected.len() > available_worker_slots {
            return Err(
                ValidationError::too_many_algorithms(selected.len(), available_worker_slots).into(),
            );
        }

        Ok(selected)
    }

    /// Digest `data` in one shot
    pub fn hash_bytes(&self, name: &str, data: &[u8]) -> Result<String> {
        let mut hasher = self.get(name)?.create_hasher();
        hasher.update(data);
        Ok(hasher.finalize())
    }
}
