//! Error types for the watcher adapter.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while establishing or running a watch.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, raised at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A backend reported an event code that has no entry in its mapping table.
    #[error("Backend '{backend}' reported unmapped event code '{code}'")]
    UnmappedEventCode {
        /// Backend that produced the code.
        backend: String,
        /// The raw code.
        code: String,
    },

    /// The native watch could not be established.
    #[error("Failed to watch '{}': {message}", path.display())]
    Subscription {
        /// Path the watch was requested for.
        path: PathBuf,
        /// Backend message.
        message: String,
    },

    /// The backend failed after the watch was established.
    #[error("File watching error: {message}")]
    Watch {
        /// Backend message.
        message: String,
        /// Whether the watch can no longer deliver events.
        fatal: bool,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the native watch that produced this error is unusable afterwards.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Subscription { .. } => true,
            Error::Watch { fatal, .. } => *fatal,
            Error::Config(_) | Error::UnmappedEventCode { .. } | Error::Io(_) => false,
        }
    }

    /// Wrap a notify failure that happened while attaching to `path`.
    pub(crate) fn subscription(path: impl Into<PathBuf>, err: notify::Error) -> Self {
        Error::Subscription {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Result type for watch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convert notify errors to our error type.
impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        let fatal = matches!(
            err.kind,
            notify::ErrorKind::PathNotFound
                | notify::ErrorKind::WatchNotFound
                | notify::ErrorKind::MaxFilesWatch
        );
        Error::Watch {
            message: err.to_string(),
            fatal,
        }
    }
}
