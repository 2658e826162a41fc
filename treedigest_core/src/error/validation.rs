//! Validation related error types

use thiserror::Error;

/// Validation and configuration errors
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Requested digest algorithm is not registered
    #[error("Unknown digest algorithm: {name}")]
    UnknownAlgorithm { name: String },

    /// More algorithms requested than there are worker slots
    #[error("Too many digest algorithms: {requested} requested, {available} worker slots available")]
    TooManyAlgorithms { requested: usize, available: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl ValidationError {
    /// Create an unknown algorithm error
    pub fn unknown_algorithm(name: &str) -> Self {
        Self::UnknownAlgorithm {
            name: name.to_string(),
        }
    }

    /// Create a too many algorithms error
    pub fn too_many_algorithms(requested: usize, available: usize) -> Self {
        Self::TooManyAlgorithms {
            requested,
            available,
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(message: &str) -> Self {
        Self::InvalidConfiguration {
            message: message.to_string(),
        }
    }
}
