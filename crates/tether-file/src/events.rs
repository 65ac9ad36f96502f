//! Payloads delivered on a file entity's notification channels.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Contents at the path changed, or were replaced in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChanged {
    /// Path of the entity when the change was observed.
    pub path: PathBuf,
}

/// The entity followed a rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRenamed {
    /// Path before the rename.
    pub old_path: PathBuf,
    /// Path the entity now refers to.
    pub new_path: PathBuf,
}

/// The file is gone and did not come back within the resurrection delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDeleted {
    /// Path that no longer exists.
    pub path: PathBuf,
}

/// A watch backend failure.
///
/// Listeners acknowledge the error by calling [`handle`](Self::handle). An error no
/// listener acknowledged is escalated by the entity.
#[derive(Debug)]
pub struct WatchErrorEvent {
    path: PathBuf,
    error: tether_watch::Error,
    handled: AtomicBool,
}

impl WatchErrorEvent {
    pub(crate) fn new(path: PathBuf, error: tether_watch::Error) -> Self {
        Self {
            path,
            error,
            handled: AtomicBool::new(false),
        }
    }

    /// Path of the entity whose watch failed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The backend error.
    pub fn error(&self) -> &tether_watch::Error {
        &self.error
    }

    /// Acknowledge the error.
    pub fn handle(&self) {
        self.handled.store(true, Ordering::SeqCst);
    }

    /// Whether some listener acknowledged the error.
    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_error_acknowledgement() {
        let event = WatchErrorEvent::new(
            PathBuf::from("/tmp/a"),
            tether_watch::Error::Watch {
                message: "backend died".to_string(),
                fatal: true,
            },
        );
        assert!(!event.is_handled());
        assert!(event.error().is_fatal());

        event.handle();
        event.handle();
        assert!(event.is_handled());
        assert_eq!(event.path(), Path::new("/tmp/a"));
    }
}
