//! Minimal directory handle used to materialize a file's ancestors.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    path: PathBuf,
}

impl Directory {
    /// Create a handle. The directory need not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a directory exists at the path.
    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Blocking variant of [`exists`](Self::exists).
    pub fn exists_sync(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the directory and any missing ancestors.
    ///
    /// Returns `true` when something had to be created.
    pub async fn create(&self) -> Result<bool> {
        if self.exists().await {
            return Ok(false);
        }
        tokio::fs::create_dir_all(&self.path).await?;
        debug!("Created directory: {}", self.path.display());
        Ok(true)
    }

    /// Blocking variant of [`create`](Self::create).
    pub fn create_sync(&self) -> Result<bool> {
        if self.exists_sync() {
            return Ok(false);
        }
        std::fs::create_dir_all(&self.path)?;
        debug!("Created directory: {}", self.path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_materializes_ancestors() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Directory::new(temp_dir.path().join("a").join("b").join("c"));

        assert!(!dir.exists().await);
        assert!(dir.create().await.unwrap());
        assert!(dir.exists().await);
        assert!(!dir.create().await.unwrap());
    }

    #[test]
    fn create_sync_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Directory::new(temp_dir.path().join("nested"));

        assert!(dir.create_sync().unwrap());
        assert!(dir.exists_sync());
        assert!(!dir.create_sync().unwrap());
    }

    #[tokio::test]
    async fn regular_file_is_not_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();

        let dir = Directory::new(&file);
        assert!(!dir.exists().await);
        assert!(dir.create().await.is_err());
    }
}
