//! File system adapter using tokio

use std::path::Path;

use async_trait::async_trait;

use missio_application::ports::{FileSystem, FileSystemError};

/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn read_to_string(&self, path: &Path) -> Result<String, FileSystemError> {
        tokio::fs::read_to_string(path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                FileSystemError::NotFound(path.display().to_string())
            } else {
                FileSystemError::Read {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "KEY=value\n").unwrap();

        let fs = TokioFileSystem;
        assert_eq!(fs.read_to_string(&path).await.unwrap(), "KEY=value\n");
        assert!(fs.exists(&path).await);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");

        let fs = TokioFileSystem;
        let err = fs.read_to_string(&path).await.unwrap_err();
        assert!(matches!(err, FileSystemError::NotFound(_)));
        assert!(!fs.exists(&path).await);
    }
}
