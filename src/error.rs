//! Error types for the cache-dump crate

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for dump persistence operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error during dump operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(cache_dump::io),
        help("Check file permissions and ensure the dump directory exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "rename")
        operation: String,
    },

    /// A dump already exists at the destination path
    #[error("dump file already exists: {}", path.display())]
    #[diagnostic(
        code(cache_dump::collision),
        help("Dumps are never overwritten; bump the update time of the existing dump instead")
    )]
    AlreadyExists {
        /// Path of the existing dump
        path: Box<Path>,
    },
}

impl Error {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a collision error for an existing dump file
    #[must_use]
    pub fn already_exists(path: impl AsRef<Path>) -> Self {
        Self::AlreadyExists {
            path: path.as_ref().into(),
        }
    }
}

/// Result type alias for dump persistence operations
pub type Result<T> = std::result::Result<T, Error>;
