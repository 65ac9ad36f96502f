//! A manually driven watch backend for tests.
//!
//! [`ManualWatcher`] never touches the filesystem. Every `watch` call is recorded, and
//! tests push canonical events, raw backend codes or errors into the recorded sinks.
//! Releases are observable, and attachment can be deferred to exercise close-before-
//! attach handling.

use crate::{
    error::{Error, Result},
    events::{WatchEvent, WatchEventKind},
    handle::{Attachment, WatchHandle},
    mapping::{EventMapping, EventRoute},
    traits::{EventSink, FileWatcher},
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Backend name reported by [`ManualWatcher`].
pub const MANUAL_BACKEND: &str = "manual";

/// Raw codes understood by [`ManualWatcher::emit_code`].
pub const MANUAL_EVENT_CODES: &[&str] = &["created", "changed", "renamed", "deleted", "touched"];

struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct Record {
    path: PathBuf,
    sink: EventSink,
    released: Arc<AtomicBool>,
    attachment: Option<Attachment>,
}

impl Record {
    fn is_active(&self) -> bool {
        self.attachment.is_none() && !self.released.load(Ordering::SeqCst)
    }
}

/// Fake backend that records watches and lets tests inject events.
pub struct ManualWatcher {
    deferred: bool,
    mapping: EventMapping,
    records: Mutex<Vec<Record>>,
    failing: Mutex<HashSet<PathBuf>>,
}

impl ManualWatcher {
    /// Watcher whose watches attach immediately.
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Watcher whose watches stay pending until [`finish_attach`](Self::finish_attach).
    pub fn deferred() -> Self {
        Self::build(true)
    }

    fn build(deferred: bool) -> Self {
        Self {
            deferred,
            mapping: Self::default_mapping(),
            records: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    fn default_mapping() -> EventMapping {
        use EventRoute::{Emit, Ignore};
        use WatchEventKind::{Change, Create, Delete, Rename};

        let routes = [
            ("created", Emit(Create)),
            ("changed", Emit(Change)),
            ("renamed", Emit(Rename)),
            ("deleted", Emit(Delete)),
            ("touched", Ignore),
        ];
        match EventMapping::new(MANUAL_BACKEND, MANUAL_EVENT_CODES, routes) {
            Ok(mapping) => mapping,
            Err(err) => unreachable!("manual mapping is complete: {}", err),
        }
    }

    /// Make the next `watch` on `path` fail to attach.
    pub fn fail_next_watch(&self, path: impl Into<PathBuf>) {
        self.failing.lock().insert(path.into());
    }

    /// Total number of `watch` calls so far.
    pub fn watch_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Number of watches attached and not yet released.
    pub fn active_count(&self) -> usize {
        self.records.lock().iter().filter(|r| r.is_active()).count()
    }

    /// Number of watches still waiting for attachment.
    pub fn pending_count(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.attachment.is_some())
            .count()
    }

    /// Number of watches whose native resource has been released.
    pub fn released_count(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.released.load(Ordering::SeqCst))
            .count()
    }

    /// Paths of the active watches, in watch order.
    pub fn active_paths(&self) -> Vec<PathBuf> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.path.clone())
            .collect()
    }

    /// Complete every pending attachment. Returns how many ended up attached; the rest
    /// were closed while pending and have been released.
    pub fn finish_attach(&self) -> usize {
        let pending: Vec<(Attachment, Arc<AtomicBool>)> = self
            .records
            .lock()
            .iter_mut()
            .filter_map(|r| r.attachment.take().map(|a| (a, Arc::clone(&r.released))))
            .collect();

        pending
            .into_iter()
            .filter(|(_, released)| !released.load(Ordering::SeqCst))
            .map(|(attachment, released)| attachment.complete(Box::new(ReleaseFlag(released))))
            .filter(|attached| *attached)
            .count()
    }

    /// Deliver a canonical event to every active watch. Returns the number of sinks
    /// reached.
    pub fn emit(&self, kind: WatchEventKind, path: impl AsRef<Path>) -> usize {
        let code = match kind {
            WatchEventKind::Create => "created",
            WatchEventKind::Change => "changed",
            WatchEventKind::Rename => "renamed",
            WatchEventKind::Delete => "deleted",
        };
        let path = path.as_ref().to_path_buf();
        self.deliver(|| Ok(WatchEvent::new(kind, path.clone(), code, MANUAL_BACKEND)))
    }

    /// Deliver a raw backend code through the mapping table. Ignored codes reach no
    /// sink; unmapped codes reach every sink as [`Error::UnmappedEventCode`].
    pub fn emit_code(&self, code: &str, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref().to_path_buf();
        match self.mapping.route(code) {
            Ok(EventRoute::Ignore) => 0,
            Ok(EventRoute::Emit(kind)) => self.deliver(|| {
                Ok(WatchEvent::new(kind, path.clone(), code, MANUAL_BACKEND))
            }),
            Err(_) => self.deliver(|| {
                Err(Error::UnmappedEventCode {
                    backend: MANUAL_BACKEND.to_string(),
                    code: code.to_string(),
                })
            }),
        }
    }

    /// Deliver an error produced by `make_error` to every active watch.
    pub fn emit_error(&self, make_error: impl Fn() -> Error) -> usize {
        self.deliver(|| Err(make_error()))
    }

    fn deliver(&self, make: impl Fn() -> Result<WatchEvent>) -> usize {
        let sinks: Vec<EventSink> = self
            .records
            .lock()
            .iter()
            .filter(|r| r.is_active())
            .map(|r| Arc::clone(&r.sink))
            .collect();

        for sink in &sinks {
            sink(make());
        }
        sinks.len()
    }
}

impl Default for ManualWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWatcher for ManualWatcher {
    fn backend_type(&self) -> &'static str {
        MANUAL_BACKEND
    }

    fn watch(&self, path: PathBuf, sink: EventSink) -> WatchHandle {
        let released = Arc::new(AtomicBool::new(false));

        if self.failing.lock().remove(&path) {
            let (handle, attachment) = WatchHandle::pending(path.clone(), MANUAL_BACKEND);
            attachment.fail();
            released.store(true, Ordering::SeqCst);
            self.records.lock().push(Record {
                path: path.clone(),
                sink: Arc::clone(&sink),
                released,
                attachment: None,
            });
            sink(Err(Error::Subscription {
                path,
                message: "simulated attach failure".to_string(),
            }));
            return handle;
        }

        let (handle, attachment) = if self.deferred {
            let (handle, attachment) = WatchHandle::pending(path.clone(), MANUAL_BACKEND);
            (handle, Some(attachment))
        } else {
            let guard = Box::new(ReleaseFlag(Arc::clone(&released)));
            (WatchHandle::attached(path.clone(), MANUAL_BACKEND, guard), None)
        };

        self.records.lock().push(Record {
            path,
            sink,
            released,
            attachment,
        });
        handle
    }
}
