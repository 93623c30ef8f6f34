//! Error types for ratiopix-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ratiopix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for ratiopix operations.
///
/// Every variant maps to the unit of work it is fatal for: filesystem and
/// metadata errors abort a file, import, processing and export errors abort
/// a single series.
#[derive(Error, Debug)]
pub enum Error {
    /// Input path could not be listed or accessed.
    #[error("filesystem error at {path}: {message}")]
    Filesystem { path: PathBuf, message: String },

    /// File metadata is unreadable or corrupt.
    #[error("metadata error in {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Decoding a series failed.
    #[error("import error in {path} (series {series}): {message}")]
    Import {
        path: PathBuf,
        series: usize,
        message: String,
    },

    /// Writing an output image failed.
    #[error("export error for {path}: {message}")]
    Export { path: PathBuf, message: String },

    /// A pixel operation rejected its input.
    #[error("processing error: {0}")]
    Processing(String),

    /// Invalid run or pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The threshold prompt could not produce a pair.
    #[error("threshold prompt aborted: {0}")]
    Prompt(String),
}

impl Error {
    /// Creates a filesystem error for `path`.
    pub fn filesystem(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Creates a metadata error for `path`.
    pub fn metadata(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Creates an import error for one series of `path`.
    pub fn import(path: impl Into<PathBuf>, series: usize, message: impl ToString) -> Self {
        Self::Import {
            path: path.into(),
            series,
            message: message.to_string(),
        }
    }

    /// Creates an export error for `path`.
    pub fn export(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Export {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if this error invalidates the whole file rather than a
    /// single series.
    #[must_use]
    pub fn is_file_fatal(&self) -> bool {
        matches!(self, Self::Filesystem { .. } | Self::Metadata { .. })
    }
}
