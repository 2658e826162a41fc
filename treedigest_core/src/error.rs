//! Error types for the treedigest core library
//!
//! Errors are grouped by where they come from so callers can decide what is
//! fatal: validation errors abort startup, I/O errors concern a single file,
//! internal errors mean the worker pool can no longer be trusted.

use thiserror::Error;

pub mod internal;
pub mod io;
pub mod validation;

pub use self::io::{IoError, IoErrorKind};
pub use self::validation::ValidationError;
pub use internal::InternalError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the treedigest core library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error(transparent)]
    Io(#[from] IoError),

    /// Validation related errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Worker pool and buffer ring errors
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}

impl Error {
    /// Whether the error only concerns the file being digested
    pub fn is_file_local(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
