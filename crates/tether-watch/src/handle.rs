//! Idempotently closable handles to native watches.
//!
//! A [`WatchHandle`] is returned synchronously from [`FileWatcher::watch`] even when the
//! backend attaches on another thread. The attaching side holds an [`Attachment`] and
//! hands over the native resource (a guard whose `Drop` releases the OS watch) once it
//! exists. If the handle was closed in the meantime the resource is released on the spot,
//! so nothing is ever left attached behind a closed handle.
//!
//! [`FileWatcher::watch`]: crate::traits::FileWatcher::watch

use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Boxed native resource. Dropping it releases the OS-level watch.
pub type NativeGuard = Box<dyn Any + Send>;

enum Slot {
    Attaching { close_requested: bool },
    Attached(NativeGuard),
    Released,
}

impl Slot {
    fn name(&self) -> &'static str {
        match self {
            Slot::Attaching { .. } => "attaching",
            Slot::Attached(_) => "attached",
            Slot::Released => "released",
        }
    }
}

/// Handle to an active (or attaching) native watch.
pub struct WatchHandle {
    id: Uuid,
    path: PathBuf,
    backend: &'static str,
    slot: Arc<Mutex<Slot>>,
}

impl WatchHandle {
    /// Create a handle for a watch that is already attached.
    pub fn attached(path: impl Into<PathBuf>, backend: &'static str, guard: NativeGuard) -> Self {
        Self::with_slot(path.into(), backend, Slot::Attached(guard))
    }

    /// Create a handle whose native resource will be supplied later through the returned
    /// [`Attachment`].
    pub fn pending(path: impl Into<PathBuf>, backend: &'static str) -> (Self, Attachment) {
        let handle = Self::with_slot(
            path.into(),
            backend,
            Slot::Attaching {
                close_requested: false,
            },
        );
        let attachment = Attachment {
            id: handle.id,
            slot: Some(Arc::clone(&handle.slot)),
        };
        (handle, attachment)
    }

    fn with_slot(path: PathBuf, backend: &'static str, slot: Slot) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
            backend,
            slot: Arc::new(Mutex::new(slot)),
        }
    }

    /// Unique identifier for this watch.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path the watch was requested for.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backend that owns the native resource.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Whether the native resource is attached and not yet released.
    pub fn is_active(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Attached(_))
    }

    /// Whether `close` has been called or the attachment failed.
    pub fn is_closed(&self) -> bool {
        match *self.slot.lock() {
            Slot::Attaching { close_requested } => close_requested,
            Slot::Attached(_) => false,
            Slot::Released => true,
        }
    }

    /// Release the native watch. Safe to call repeatedly and before attachment finishes.
    pub fn close(&self) {
        let released = {
            let mut slot = self.slot.lock();
            match std::mem::replace(&mut *slot, Slot::Released) {
                Slot::Attaching { .. } => {
                    *slot = Slot::Attaching {
                        close_requested: true,
                    };
                    None
                }
                Slot::Attached(guard) => Some(guard),
                Slot::Released => None,
            }
        };

        // Drop the guard outside the lock; some backends join threads on drop.
        if let Some(guard) = released {
            drop(guard);
            debug!("Released {} watch {} on {}", self.backend, self.id, self.path.display());
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("backend", &self.backend)
            .field("state", &self.slot.lock().name())
            .finish()
    }
}

/// The attaching side of a pending [`WatchHandle`].
pub struct Attachment {
    id: Uuid,
    slot: Option<Arc<Mutex<Slot>>>,
}

impl Attachment {
    /// Identifier of the handle this attachment completes.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Hand over the native resource. Returns `false` when the handle was closed before
    /// attachment finished, in which case the resource has already been released.
    pub fn complete(mut self, guard: NativeGuard) -> bool {
        let Some(slot) = self.slot.take() else {
            return false;
        };

        let mut slot = slot.lock();
        if matches!(
            *slot,
            Slot::Attaching {
                close_requested: false
            }
        ) {
            *slot = Slot::Attached(guard);
            return true;
        }

        *slot = Slot::Released;
        drop(slot);
        drop(guard);
        debug!("Watch {} closed before attach completed; released", self.id);
        false
    }

    /// Record that the backend could not attach.
    pub fn fail(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(slot) = self.slot.take() {
            let mut slot = slot.lock();
            if matches!(*slot, Slot::Attaching { .. }) {
                *slot = Slot::Released;
            }
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("id", &self.id)
            .field("pending", &self.slot.is_some())
            .finish()
    }
}
