//! Notification channels and disposable registrations.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A multi-subscriber notification channel.
///
/// Listeners run on the emitting thread, outside the registry lock, so a listener may
/// register or dispose other listeners while it runs.
pub(crate) struct Emitter<T> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
}

impl<T> Emitter<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: Listener<T>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns `false` if the listener was already gone.
    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn emit(&self, event: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    pub(crate) fn clear(&self) -> usize {
        let mut listeners = self.listeners.lock();
        let count = listeners.len();
        listeners.clear();
        count
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }
}

type Release = Box<dyn FnOnce() + Send>;

/// A registration returned by the `on_did_*` methods.
///
/// Disposing (or dropping) the subscription removes the listener. Disposing twice is a
/// no-op.
#[must_use = "dropping a Subscription removes its listener immediately"]
pub struct Subscription {
    release: Mutex<Option<Release>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// Remove the listener.
    pub fn dispose(&self) {
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.release.lock().is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emits_to_every_listener() {
        let emitter: Emitter<u32> = Emitter::new();
        let total = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let total = Arc::clone(&total);
            emitter.add(Arc::new(move |value: &u32| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            }));
        }

        assert_eq!(emitter.emit(&2), 3);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn remove_reports_whether_listener_existed() {
        let emitter: Emitter<()> = Emitter::new();
        let id = emitter.add(Arc::new(|_: &()| {}));
        assert_eq!(emitter.len(), 1);
        assert!(emitter.remove(id));
        assert!(!emitter.remove(id));
        assert_eq!(emitter.emit(&()), 0);
    }

    #[test]
    fn listener_may_touch_registry_while_emitting() {
        let emitter: Arc<Emitter<()>> = Arc::new(Emitter::new());
        let inner = Arc::clone(&emitter);
        emitter.add(Arc::new(move |_: &()| {
            inner.add(Arc::new(|_: &()| {}));
        }));

        assert_eq!(emitter.emit(&()), 1);
        assert_eq!(emitter.len(), 2);
        assert_eq!(emitter.clear(), 2);
    }

    #[test]
    fn subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!subscription.is_disposed());
        subscription.dispose();
        subscription.dispose();
        assert!(subscription.is_disposed());
        drop(subscription);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
