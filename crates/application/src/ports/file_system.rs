//! File system port

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by file system operations.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// The file does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The file could not be read.
    #[error("failed to read {path}: {reason}")]
    Read {
        /// Path that failed.
        path: String,
        /// Underlying detail.
        reason: String,
    },
}

/// Port for reading files, used to load dotenv files referenced by
/// environments.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Reads a file to a UTF-8 string.
    async fn read_to_string(&self, path: &Path) -> Result<String, FileSystemError>;

    /// Returns whether the path exists.
    async fn exists(&self, path: &Path) -> bool;
}
