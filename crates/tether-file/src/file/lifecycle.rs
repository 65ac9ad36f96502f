//! Subscription reference counting and interpretation of native watch events.
//!
//! The entity keeps at most one native watch, alive exactly while at least one
//! change/rename/delete listener is registered. Native events are interpreted here:
//!
//! - create and change invalidate the cache and notify `did-change`;
//! - rename moves the entity to the reported path and notifies `did-rename`;
//! - delete releases the native watch and schedules a resurrection check instead of
//!   notifying. If the path exists again when the check runs, the delete was an atomic
//!   save: the watch is re-established and `did-change` fires. Otherwise `did-delete`
//!   fires.
//!
//! Listeners are always invoked after the state lock is released.

use super::state::{FileState, WatchState};
use crate::emitter::{Emitter, Listener};
use crate::events::{FileChanged, FileDeleted, FileRenamed, WatchErrorEvent};
use crate::paths::{normalize_path, path_exists, path_exists_sync};
use crate::Subscription;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tether_config::FileSettings;
use tether_watch::{EventSink, FileWatcher, WatchEvent, WatchEventKind, WatchHandle};
use tracing::{debug, error, warn};

pub(crate) struct FileInner {
    pub(crate) watcher: Arc<dyn FileWatcher>,
    pub(crate) settings: FileSettings,
    pub(crate) symlink: bool,
    pub(crate) state: Mutex<FileState>,
    pub(crate) did_change: Emitter<FileChanged>,
    pub(crate) did_rename: Emitter<FileRenamed>,
    pub(crate) did_delete: Emitter<FileDeleted>,
    pub(crate) will_throw_watch_error: Emitter<WatchErrorEvent>,
}

enum Interpreted {
    Changed(FileChanged),
    Renamed {
        notice: FileRenamed,
        retired: Option<WatchHandle>,
        rewatch: bool,
    },
    AwaitingResurrection(Option<WatchHandle>),
}

fn close_retired(handle: Option<WatchHandle>) {
    if let Some(handle) = handle {
        handle.close();
    }
}

impl FileInner {
    pub(crate) fn new(
        path: PathBuf,
        watcher: Arc<dyn FileWatcher>,
        settings: FileSettings,
        codec: crate::Codec,
        symlink: bool,
    ) -> Self {
        Self {
            watcher,
            settings,
            symlink,
            state: Mutex::new(FileState::new(path, codec)),
            did_change: Emitter::new(),
            did_rename: Emitter::new(),
            did_delete: Emitter::new(),
            will_throw_watch_error: Emitter::new(),
        }
    }

    pub(crate) fn change_channel(&self) -> &Emitter<FileChanged> {
        &self.did_change
    }

    pub(crate) fn rename_channel(&self) -> &Emitter<FileRenamed> {
        &self.did_rename
    }

    pub(crate) fn delete_channel(&self) -> &Emitter<FileDeleted> {
        &self.did_delete
    }

    pub(crate) fn watch_error_channel(&self) -> &Emitter<WatchErrorEvent> {
        &self.will_throw_watch_error
    }

    /// Register a listener. Counted registrations keep the native watch alive.
    pub(crate) fn register<T: 'static>(
        self: &Arc<Self>,
        channel: fn(&FileInner) -> &Emitter<T>,
        listener: Listener<T>,
        counted: bool,
    ) -> Subscription {
        let id = channel(self).add(listener);
        if counted {
            self.acquire();
        }

        let weak: Weak<FileInner> = Arc::downgrade(self);
        Subscription::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // A listener already cleared by `dispose` no longer holds a reference.
            if channel(&inner).remove(id) && counted {
                inner.release();
            }
        })
    }

    fn acquire(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.subscription_count += 1;
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                state.runtime = Some(runtime);
            }
        }
        self.ensure_watch();
    }

    fn release(&self) {
        let retired = {
            let mut state = self.state.lock();
            state.subscription_count = state.subscription_count.saturating_sub(1);
            if state.subscription_count > 0 {
                return;
            }
            if state.phase == WatchState::Watching {
                state.phase = WatchState::Unwatched;
            }
            state.retire_watch()
        };

        if let Some(handle) = retired {
            debug!("Last subscriber gone, closing watch on {}", handle.path().display());
            handle.close();
        }
    }

    /// Establish the native watch if there are subscribers and none is held or attaching.
    ///
    /// The backend is called without holding the state lock: it may report an attach
    /// failure through the sink before `watch` returns.
    pub(crate) fn ensure_watch(self: &Arc<Self>) {
        let (path, generation) = {
            let mut state = self.state.lock();
            if state.subscription_count == 0
                || state.native.is_some()
                || state.attaching
                || state.phase == WatchState::PendingResurrectionCheck
            {
                return;
            }
            state.generation += 1;
            state.attaching = true;
            (state.path.clone(), state.generation)
        };

        let handle = self.watcher.watch(path, self.sink(generation));

        let unused = {
            let mut state = self.state.lock();
            let current = state.generation == generation;
            if current {
                state.attaching = false;
            }
            if current && state.subscription_count > 0 && !handle.is_closed() {
                state.native = Some(handle);
                state.phase = WatchState::Watching;
                None
            } else {
                Some(handle)
            }
        };

        if let Some(handle) = unused {
            debug!("Discarding superseded watch on {}", handle.path().display());
            handle.close();
        }
    }

    fn sink(self: &Arc<Self>, generation: u64) -> EventSink {
        let weak = Arc::downgrade(self);
        Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_native(generation, event);
            }
        })
    }

    fn on_native(self: &Arc<Self>, generation: u64, event: tether_watch::Result<WatchEvent>) {
        match event {
            Ok(event) => self.on_watch_event(generation, event),
            Err(tether_watch::Error::Subscription { path, message }) => {
                self.on_subscription_failure(generation, path, message)
            }
            Err(err) => self.on_watch_error(generation, err),
        }
    }

    fn on_watch_event(self: &Arc<Self>, generation: u64, event: WatchEvent) {
        let interpreted = {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(
                    "Dropping {} event for {} from superseded watch",
                    event.kind,
                    event.path.display()
                );
                return;
            }

            match event.kind {
                WatchEventKind::Create | WatchEventKind::Change => {
                    state.invalidate();
                    Interpreted::Changed(FileChanged {
                        path: state.path.clone(),
                    })
                }
                WatchEventKind::Rename => {
                    let new_path = normalize_path(&event.path);
                    let old_path = std::mem::replace(&mut state.path, new_path.clone());
                    state.real_path = None;

                    let rewatch = self.settings.rewatch_on_rename && state.subscription_count > 0;
                    let retired = if rewatch { state.retire_watch() } else { None };
                    Interpreted::Renamed {
                        notice: FileRenamed { old_path, new_path },
                        retired,
                        rewatch,
                    }
                }
                WatchEventKind::Delete => {
                    let retired = state.retire_watch();
                    state.phase = WatchState::PendingResurrectionCheck;
                    self.schedule_resurrection(&mut state);
                    Interpreted::AwaitingResurrection(retired)
                }
            }
        };

        match interpreted {
            Interpreted::Changed(notice) => {
                self.did_change.emit(&notice);
            }
            Interpreted::Renamed {
                notice,
                retired,
                rewatch,
            } => {
                debug!(
                    "Renamed {} -> {}",
                    notice.old_path.display(),
                    notice.new_path.display()
                );
                close_retired(retired);
                if rewatch {
                    self.ensure_watch();
                }
                self.did_rename.emit(&notice);
            }
            Interpreted::AwaitingResurrection(retired) => {
                close_retired(retired);
            }
        }
    }

    fn schedule_resurrection(self: &Arc<Self>, state: &mut FileState) {
        state.cancel_resurrection();
        let seq = state.resurrection_seq;
        let path = state.path.clone();
        let delay = self.settings.resurrection_delay();
        let weak = Arc::downgrade(self);

        debug!(
            "Delete reported for {}, checking again in {:?}",
            path.display(),
            delay
        );

        match &state.runtime {
            Some(runtime) => {
                state.resurrection = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let exists = path_exists(&path).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.finish_resurrection(seq, exists);
                    }
                }));
            }
            None => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    let exists = path_exists_sync(&path);
                    if let Some(inner) = weak.upgrade() {
                        inner.finish_resurrection(seq, exists);
                    }
                });
            }
        }
    }

    fn finish_resurrection(self: &Arc<Self>, seq: u64, exists: bool) {
        let path = {
            let mut state = self.state.lock();
            if state.resurrection_seq != seq
                || state.phase != WatchState::PendingResurrectionCheck
            {
                return;
            }
            state.resurrection = None;
            state.invalidate();
            state.phase = WatchState::Unwatched;
            state.path.clone()
        };

        if exists {
            debug!("{} came back, treating delete as change", path.display());
            self.ensure_watch();
            self.did_change.emit(&FileChanged { path });
        } else {
            debug!("{} is gone", path.display());
            self.did_delete.emit(&FileDeleted { path });
        }
    }

    fn on_subscription_failure(&self, generation: u64, path: PathBuf, message: String) {
        warn!("Failed to watch {}: {}", path.display(), message);

        let retired = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            if state.phase == WatchState::Watching {
                state.phase = WatchState::Unwatched;
            }
            state.retire_watch()
        };
        close_retired(retired);
    }

    fn on_watch_error(&self, generation: u64, err: tether_watch::Error) {
        let fatal = err.is_fatal();

        let (path, retired) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!("Dropping error from superseded watch: {}", err);
                return;
            }
            let retired = if fatal {
                if state.phase == WatchState::Watching {
                    state.phase = WatchState::Unwatched;
                }
                state.retire_watch()
            } else {
                None
            };
            (state.path.clone(), retired)
        };
        close_retired(retired);

        let event = WatchErrorEvent::new(path, err);
        self.will_throw_watch_error.emit(&event);
        if !event.is_handled() {
            error!(
                "Unhandled watch error for {}: {}",
                event.path().display(),
                event.error()
            );
        }
    }

    /// Re-establish the watch after a write created the file. Some backends cannot watch
    /// a path that did not exist when the watch was requested.
    ///
    /// A pending resurrection check is left to run: it will find the file and rewatch.
    pub(crate) fn rewatch_after_create(self: &Arc<Self>) {
        let retired = {
            let mut state = self.state.lock();
            if state.subscription_count == 0
                || state.phase == WatchState::PendingResurrectionCheck
            {
                return;
            }
            state.phase = WatchState::Unwatched;
            state.retire_watch()
        };
        close_retired(retired);
        self.ensure_watch();
    }

    pub(crate) fn dispose(&self) {
        let retired = {
            let mut state = self.state.lock();
            state.subscription_count = 0;
            state.cancel_resurrection();
            state.phase = WatchState::Unwatched;
            state.retire_watch()
        };
        close_retired(retired);

        let removed = self.did_change.clear()
            + self.did_rename.clear()
            + self.did_delete.clear()
            + self.will_throw_watch_error.clear();
        debug!("Disposed file entity, removed {} listeners", removed);
    }
}

impl Drop for FileInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.cancel_resurrection();
        state.retire_watch();
    }
}
