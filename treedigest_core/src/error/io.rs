//! I/O related error types

use std::path::{Path, PathBuf};
use thiserror::Error;

/// I/O error with the path it happened on
#[derive(Error, Debug)]
#[error("{}", format_io_error(self))]
pub struct IoError {
    /// The kind of I/O error
    pub kind: IoErrorKind,
    /// Path associated with the error (if any)
    pub path: Option<PathBuf>,
    /// Underlying I/O error (if any)
    #[source]
    pub source: Option<std::io::Error>,
}

/// Kind of I/O error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoErrorKind {
    /// File not found
    FileNotFound,
    /// Permission denied
    PermissionDenied,
    /// Reading an already opened file failed
    ReadFailed,
    /// Generic I/O error
    Other,
}

impl IoError {
    /// Create a file not found error
    pub fn file_not_found(path: &Path) -> Self {
        Self {
            kind: IoErrorKind::FileNotFound,
            path: Some(path.to_path_buf()),
            source: None,
        }
    }

    /// Classify a failed `open` of `path`
    pub fn open_failed(path: &Path, source: std::io::Error) -> Self {
        Self::from_std(source).with_path(path)
    }

    /// Create a read failure for an open file
    pub fn read_failed(path: &Path, source: std::io::Error) -> Self {
        Self {
            kind: IoErrorKind::ReadFailed,
            path: Some(path.to_path_buf()),
            source: Some(source),
        }
    }

    /// Create an I/O error from a standard I/O error
    pub fn from_std(source: std::io::Error) -> Self {
        let kind = match source.kind() {
            std::io::ErrorKind::NotFound => IoErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => IoErrorKind::PermissionDenied,
            _ => IoErrorKind::Other,
        };

        Self {
            kind,
            path: None,
            source: Some(source),
        }
    }

    /// Attach a path
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

fn format_io_error(error: &IoError) -> String {
    let path = error
        .path
        .as_ref()
        .map(|p| format!(": {}", p.display()))
        .unwrap_or_default();
    let detail = error
        .source
        .as_ref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default();

    match error.kind {
        IoErrorKind::FileNotFound => format!("File not found{path}"),
        IoErrorKind::PermissionDenied => format!("Permission denied{path}"),
        IoErrorKind::ReadFailed => format!("Read failed{path}{detail}"),
        IoErrorKind::Other => format!("I/O error{path}{detail}"),
    }
}
