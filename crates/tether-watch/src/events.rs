//! Canonical watch event types.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// The backend-independent event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// Something appeared at the path.
    Create,
    /// Contents or metadata at the path changed.
    Change,
    /// The entry moved; the event path is the new location.
    Rename,
    /// The entry at the path went away.
    Delete,
}

impl WatchEventKind {
    /// All canonical kinds, in declaration order.
    pub const ALL: [WatchEventKind; 4] = [Self::Create, Self::Change, Self::Rename, Self::Delete];

    /// Get a string representation of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Change => "change",
            Self::Rename => "rename",
            Self::Delete => "delete",
        }
    }

    /// Parse the lowercase name produced by [`as_str`](Self::as_str).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical event delivered to a watch sink.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// Canonical kind.
    pub kind: WatchEventKind,

    /// Path as reported by the backend. May differ from the watched path.
    pub path: PathBuf,

    /// Raw backend code this event was mapped from.
    pub code: String,

    /// Backend that observed the event.
    pub backend: &'static str,

    /// When the adapter translated the event.
    pub observed_at: DateTime<Utc>,
}

impl WatchEvent {
    /// Create a new event.
    pub fn new(
        kind: WatchEventKind,
        path: impl Into<PathBuf>,
        code: impl Into<String>,
        backend: &'static str,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            code: code.into(),
            backend,
            observed_at: Utc::now(),
        }
    }

    /// Get the file name as a string.
    pub fn file_name(&self) -> Option<String> {
        self.path.file_name()?.to_str().map(|s| s.to_string())
    }
}
