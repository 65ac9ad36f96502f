//! Notify-based watch backends.
//!
//! Both the platform-recommended watcher and the polling watcher speak notify's
//! `EventKind` vocabulary, so they share one code table ([`NOTIFY_EVENT_CODES`]) and
//! one default mapping. Each `watch` call owns its own notify watcher; dropping the
//! watcher (through the handle) removes the OS watch.

use crate::{
    error::{Error, Result},
    events::{WatchEvent, WatchEventKind},
    handle::{Attachment, NativeGuard, WatchHandle},
    mapping::{EventMapping, EventRoute},
    traits::{EventSink, FileWatcher},
};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Config, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Every code [`notify_event_code`] can produce, apart from `unknown`.
pub const NOTIFY_EVENT_CODES: &[&str] = &[
    "any",
    "access",
    "access-close-write",
    "create",
    "modify-any",
    "modify-data",
    "modify-metadata",
    "modify-other",
    "rename-any",
    "rename-from",
    "rename-to",
    "rename-both",
    "rename-other",
    "remove",
    "other",
];

/// Reduce a notify event kind to its backend code.
pub fn notify_event_code(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Any => "any",
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => "access-close-write",
        EventKind::Access(_) => "access",
        EventKind::Create(_) => "create",
        EventKind::Modify(ModifyKind::Any) => "modify-any",
        EventKind::Modify(ModifyKind::Data(_)) => "modify-data",
        EventKind::Modify(ModifyKind::Metadata(_)) => "modify-metadata",
        EventKind::Modify(ModifyKind::Other) => "modify-other",
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Any => "rename-any",
            RenameMode::From => "rename-from",
            RenameMode::To => "rename-to",
            RenameMode::Both => "rename-both",
            RenameMode::Other => "rename-other",
            #[allow(unreachable_patterns)]
            _ => "unknown",
        },
        EventKind::Remove(_) => "remove",
        EventKind::Other => "other",
        #[allow(unreachable_patterns)]
        _ => "unknown",
    }
}

/// Default routing for the notify vocabulary.
///
/// Renames that only report one side are routed to `Delete`: a file entity then runs
/// its existence check and reports either a change (still there) or a delete.
pub fn default_notify_mapping(backend: &'static str) -> Result<EventMapping> {
    use EventRoute::{Emit, Ignore};
    use WatchEventKind::{Change, Create, Delete, Rename};

    EventMapping::new(
        backend,
        NOTIFY_EVENT_CODES,
        [
            ("any", Emit(Change)),
            ("access", Ignore),
            ("access-close-write", Ignore),
            ("create", Emit(Create)),
            ("modify-any", Emit(Change)),
            ("modify-data", Emit(Change)),
            ("modify-metadata", Emit(Change)),
            ("modify-other", Emit(Change)),
            ("rename-any", Emit(Delete)),
            ("rename-from", Emit(Delete)),
            ("rename-to", Emit(Create)),
            ("rename-both", Emit(Rename)),
            ("rename-other", Emit(Delete)),
            ("remove", Emit(Delete)),
            ("other", Ignore),
        ],
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Flavor {
    Recommended,
    Poll { interval: Duration },
}

impl Flavor {
    fn backend_type(&self) -> &'static str {
        match self {
            Flavor::Recommended => "native",
            Flavor::Poll { .. } => "poll",
        }
    }
}

/// Notify-based file watcher.
#[derive(Debug, Clone)]
pub struct NotifyWatcher {
    flavor: Flavor,
    mapping: Arc<EventMapping>,
}

impl NotifyWatcher {
    /// Watcher backed by the platform's native notification API.
    pub fn recommended() -> Result<Self> {
        Self::with_flavor(Flavor::Recommended)
    }

    /// Watcher that polls file metadata every `interval`.
    pub fn polling(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Config("Poll interval must be greater than zero".to_string()));
        }
        Self::with_flavor(Flavor::Poll { interval })
    }

    fn with_flavor(flavor: Flavor) -> Result<Self> {
        Ok(Self {
            flavor,
            mapping: Arc::new(default_notify_mapping(flavor.backend_type())?),
        })
    }

    /// Replace the mapping table.
    pub fn with_mapping(mut self, mapping: EventMapping) -> Self {
        self.mapping = Arc::new(mapping);
        self
    }

    /// The mapping table in use.
    pub fn mapping(&self) -> &EventMapping {
        &self.mapping
    }

    /// Translate one notify event into canonical events, one per reported path.
    ///
    /// A two-path rename is reported once, at its destination.
    pub fn translate(mapping: &EventMapping, event: notify::Event) -> Vec<Result<WatchEvent>> {
        let code = notify_event_code(&event.kind);
        let backend = mapping.backend();

        let route = match mapping.route(code) {
            Ok(route) => route,
            Err(err) => return vec![Err(err)],
        };

        match route {
            EventRoute::Ignore => Vec::new(),
            EventRoute::Emit(WatchEventKind::Rename) if event.paths.len() == 2 => event
                .paths
                .into_iter()
                .nth(1)
                .map(|to| Ok(WatchEvent::new(WatchEventKind::Rename, to, code, backend)))
                .into_iter()
                .collect(),
            EventRoute::Emit(kind) => {
                if event.paths.is_empty() {
                    debug!("Dropping pathless '{}' event from {}", code, backend);
                }
                event
                    .paths
                    .into_iter()
                    .map(|path| Ok(WatchEvent::new(kind, path, code, backend)))
                    .collect()
            }
        }
    }

    fn event_handler(
        mapping: Arc<EventMapping>,
        sink: EventSink,
    ) -> impl FnMut(notify::Result<notify::Event>) + Send + 'static {
        move |result: notify::Result<notify::Event>| match result {
            Ok(event) => {
                for translated in Self::translate(&mapping, event) {
                    if let Err(err) = &translated {
                        error!("Failed to translate notify event: {}", err);
                    }
                    sink(translated);
                }
            }
            Err(err) => {
                error!("Notify error: {:?}", err);
                sink(Err(err.into()));
            }
        }
    }

    fn attach(
        flavor: Flavor,
        path: &Path,
        mapping: Arc<EventMapping>,
        sink: EventSink,
    ) -> Result<NativeGuard> {
        let handler = Self::event_handler(mapping, sink);
        let guard: NativeGuard = match flavor {
            Flavor::Recommended => {
                let mut watcher = RecommendedWatcher::new(handler, Config::default())
                    .map_err(|e| Error::subscription(path, e))?;
                watcher
                    .watch(path, RecursiveMode::NonRecursive)
                    .map_err(|e| Error::subscription(path, e))?;
                Box::new(watcher)
            }
            Flavor::Poll { interval } => {
                // Mtimes only have one-second resolution here; hash contents instead.
                let config = Config::default()
                    .with_poll_interval(interval)
                    .with_compare_contents(true);
                let mut watcher =
                    PollWatcher::new(handler, config).map_err(|e| Error::subscription(path, e))?;
                watcher
                    .watch(path, RecursiveMode::NonRecursive)
                    .map_err(|e| Error::subscription(path, e))?;
                Box::new(watcher)
            }
        };
        Ok(guard)
    }

    fn finish_attach(
        flavor: Flavor,
        path: PathBuf,
        mapping: Arc<EventMapping>,
        sink: EventSink,
        attachment: Attachment,
    ) {
        match Self::attach(flavor, &path, mapping, Arc::clone(&sink)) {
            Ok(guard) => {
                if attachment.complete(guard) {
                    debug!("Attached {} watch: {}", flavor.backend_type(), path.display());
                }
            }
            Err(err) => {
                warn!("{}", err);
                attachment.fail();
                sink(Err(err));
            }
        }
    }
}

impl FileWatcher for NotifyWatcher {
    fn backend_type(&self) -> &'static str {
        self.flavor.backend_type()
    }

    fn watch(&self, path: PathBuf, sink: EventSink) -> WatchHandle {
        debug!("Adding {} watch for: {}", self.backend_type(), path.display());

        let (handle, attachment) = WatchHandle::pending(path.clone(), self.backend_type());
        let flavor = self.flavor;
        let mapping = Arc::clone(&self.mapping);
        let job = move || Self::finish_attach(flavor, path, mapping, sink, attachment);

        // Attaching can block (inotify limits, initial poll scan), keep it off the
        // async workers when there is a runtime to hand it to.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(job);
            }
            Err(_) => job(),
        }

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::collections::BTreeMap;

    fn notify_event(kind: EventKind, paths: &[&str]) -> notify::Event {
        paths
            .iter()
            .fold(notify::Event::new(kind), |event, path| {
                event.add_path(PathBuf::from(path))
            })
    }

    fn translate_one(kind: EventKind, path: &str) -> Vec<WatchEvent> {
        let mapping = default_notify_mapping("native").unwrap();
        NotifyWatcher::translate(&mapping, notify_event(kind, &[path]))
            .into_iter()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn default_mapping_covers_vocabulary() {
        let mapping = default_notify_mapping("native").unwrap();
        assert_eq!(mapping.len(), NOTIFY_EVENT_CODES.len());
        for code in NOTIFY_EVENT_CODES {
            assert!(mapping.route(code).is_ok(), "no route for {}", code);
        }
    }

    #[test]
    fn codes_for_common_kinds() {
        assert_eq!(notify_event_code(&EventKind::Create(CreateKind::File)), "create");
        assert_eq!(
            notify_event_code(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            "modify-data"
        );
        assert_eq!(
            notify_event_code(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))),
            "modify-metadata"
        );
        assert_eq!(
            notify_event_code(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            "rename-both"
        );
        assert_eq!(notify_event_code(&EventKind::Remove(RemoveKind::File)), "remove");
        assert_eq!(
            notify_event_code(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
            "access-close-write"
        );
        assert_eq!(notify_event_code(&EventKind::Access(AccessKind::Read)), "access");
    }

    #[test]
    fn modify_translates_to_change() {
        let events = translate_one(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/tmp/note.txt",
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WatchEventKind::Change);
        assert_eq!(events[0].path, PathBuf::from("/tmp/note.txt"));
        assert_eq!(events[0].code, "modify-data");
        assert_eq!(events[0].backend, "native");
    }

    #[test]
    fn remove_translates_to_delete() {
        let events = translate_one(EventKind::Remove(RemoveKind::File), "/tmp/note.txt");
        assert_eq!(events[0].kind, WatchEventKind::Delete);
    }

    #[test]
    fn access_is_ignored() {
        assert!(translate_one(EventKind::Access(AccessKind::Read), "/tmp/note.txt").is_empty());
    }

    #[test]
    fn two_path_rename_reports_destination() {
        let mapping = default_notify_mapping("native").unwrap();
        let events = NotifyWatcher::translate(
            &mapping,
            notify_event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/tmp/old.txt", "/tmp/new.txt"],
            ),
        );
        assert_eq!(events.len(), 1);
        let event = events.into_iter().next().unwrap().unwrap();
        assert_eq!(event.kind, WatchEventKind::Rename);
        assert_eq!(event.path, PathBuf::from("/tmp/new.txt"));
    }

    #[test]
    fn child_paths_pass_through_unchanged() {
        let events = translate_one(EventKind::Create(CreateKind::File), "/tmp/dir/child.txt");
        assert_eq!(events[0].path, PathBuf::from("/tmp/dir/child.txt"));
        assert_eq!(events[0].kind, WatchEventKind::Create);
    }

    #[test]
    fn overrides_change_translation() {
        let overrides = BTreeMap::from([("modify-metadata".to_string(), "ignore".to_string())]);
        let mapping = default_notify_mapping("native")
            .unwrap()
            .with_overrides(&overrides)
            .unwrap();
        let events = NotifyWatcher::translate(
            &mapping,
            notify_event(
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
                &["/tmp/a"],
            ),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn code_missing_from_table_is_raised() {
        let mapping = EventMapping::new(
            "partial",
            &["create"],
            [("create", EventRoute::Emit(WatchEventKind::Create))],
        )
        .unwrap();
        let events = NotifyWatcher::translate(
            &mapping,
            notify_event(EventKind::Remove(RemoveKind::File), &["/tmp/a"]),
        );
        assert_eq!(events.len(), 1);
        match &events[0] {
            Err(Error::UnmappedEventCode { backend, code }) => {
                assert_eq!(backend, "partial");
                assert_eq!(code, "remove");
            }
            other => panic!("expected UnmappedEventCode, got {:?}", other),
        }
    }

    #[test]
    fn polling_rejects_zero_interval() {
        assert!(matches!(
            NotifyWatcher::polling(Duration::ZERO),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn backend_names() {
        assert_eq!(NotifyWatcher::recommended().unwrap().backend_type(), "native");
        assert_eq!(
            NotifyWatcher::polling(Duration::from_millis(100))
                .unwrap()
                .backend_type(),
            "poll"
        );
    }
}
