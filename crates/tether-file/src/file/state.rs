//! Mutable state of a file entity.

use crate::codec::Codec;
use std::fmt;
use std::path::PathBuf;
use tether_watch::WatchHandle;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Where an entity is in its watch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No native watch.
    Unwatched,
    /// A native watch is established (or attaching).
    Watching,
    /// A delete was reported; waiting to see whether the path comes back.
    PendingResurrectionCheck,
}

impl WatchState {
    /// Get a string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchState::Unwatched => "unwatched",
            WatchState::Watching => "watching",
            WatchState::PendingResurrectionCheck => "pending-resurrection-check",
        }
    }
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) struct FileState {
    pub(crate) path: PathBuf,
    pub(crate) real_path: Option<PathBuf>,
    pub(crate) codec: Codec,

    pub(crate) cached_contents: Option<String>,
    pub(crate) digest: Option<String>,
    /// Bumped whenever the cache is invalidated or replaced; a read only stores its
    /// result if the epoch it started under is still current.
    pub(crate) content_epoch: u64,

    pub(crate) subscription_count: usize,
    pub(crate) phase: WatchState,
    pub(crate) native: Option<WatchHandle>,
    pub(crate) attaching: bool,
    /// Identifies the native watch whose events are current. Events tagged with an older
    /// generation come from a released watch and are dropped.
    pub(crate) generation: u64,

    pub(crate) resurrection: Option<JoinHandle<()>>,
    pub(crate) resurrection_seq: u64,
    pub(crate) runtime: Option<Handle>,
}

impl FileState {
    pub(crate) fn new(path: PathBuf, codec: Codec) -> Self {
        Self {
            path,
            real_path: None,
            codec,
            cached_contents: None,
            digest: None,
            content_epoch: 0,
            subscription_count: 0,
            phase: WatchState::Unwatched,
            native: None,
            attaching: false,
            generation: 0,
            resurrection: None,
            resurrection_seq: 0,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Forget cached contents and digest.
    pub(crate) fn invalidate(&mut self) {
        self.cached_contents = None;
        self.digest = None;
        self.content_epoch += 1;
    }

    /// Replace cached contents and digest.
    pub(crate) fn store(&mut self, text: String, digest: String) {
        self.cached_contents = Some(text);
        self.digest = Some(digest);
        self.content_epoch += 1;
    }

    /// Detach the current native watch so it can be closed outside the lock. Any event
    /// still in flight from it becomes stale.
    pub(crate) fn retire_watch(&mut self) -> Option<WatchHandle> {
        self.generation += 1;
        self.attaching = false;
        self.native.take()
    }

    /// Cancel a scheduled resurrection check. Its completion, if already running, is
    /// ignored.
    pub(crate) fn cancel_resurrection(&mut self) {
        self.resurrection_seq += 1;
        if let Some(task) = self.resurrection.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileState")
            .field("path", &self.path)
            .field("encoding", &self.codec.name())
            .field("cached", &self.cached_contents.is_some())
            .field("subscription_count", &self.subscription_count)
            .field("phase", &self.phase)
            .field("native", &self.native)
            .field("generation", &self.generation)
            .finish()
    }
}
