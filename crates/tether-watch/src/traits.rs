//! Core traits for the watcher adapter.

use crate::{error::Result, events::WatchEvent, handle::WatchHandle};
use std::path::PathBuf;
use std::sync::Arc;

/// Receives canonical events, and any errors the backend hits after `watch` returned.
///
/// Sinks are invoked from backend threads and must not block.
pub type EventSink = Arc<dyn Fn(Result<WatchEvent>) + Send + Sync>;

/// The watch capability every backend provides.
///
/// Watching is single-path: a watch on a file reports events for that file, and a watch
/// on a directory reports events for its direct entries with the entry paths as the
/// backend reported them.
pub trait FileWatcher: Send + Sync {
    /// Get the backend type identifier.
    fn backend_type(&self) -> &'static str;

    /// Start watching `path`, delivering events to `sink`.
    ///
    /// Returns immediately. Attachment failures are delivered to the sink as
    /// [`Error::Subscription`](crate::Error::Subscription) and leave the returned handle
    /// closed.
    fn watch(&self, path: PathBuf, sink: EventSink) -> WatchHandle;
}
