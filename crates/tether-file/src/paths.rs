//! Path normalization and existence checks.

use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Make `path` absolute against the current directory and resolve `.` and `..`
/// lexically. Symlinks are not followed and the path need not exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Whether anything exists at `path`. Errors other than absence (permissions, a file
/// where a directory is expected) are logged and count as absent.
pub(crate) async fn path_exists(path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(exists) => exists,
        Err(err) => {
            debug!("Could not check {}, treating as absent: {}", path.display(), err);
            false
        }
    }
}

/// Blocking variant of [`path_exists`].
pub(crate) fn path_exists_sync(path: &Path) -> bool {
    match path.try_exists() {
        Ok(exists) => exists,
        Err(err) => {
            debug!("Could not check {}, treating as absent: {}", path.display(), err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn resolves_dot_segments() {
        assert_eq!(
            normalize_path(Path::new("/tmp/./notes/../todo.txt")),
            PathBuf::from("/tmp/todo.txt")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let normalized = normalize_path(Path::new("some/file.txt"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("some/file.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn existence_errors_count_as_absent() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let under_file = blocker.join("child.txt");

        assert!(tokio::fs::try_exists(&under_file).await.is_err());
        assert!(!path_exists(&under_file).await);
        assert!(!path_exists_sync(&under_file));
        assert!(path_exists(&blocker).await);
        assert!(path_exists_sync(&blocker));
    }
}
