//! Watch backends and startup selection.

mod notify_backend;

pub use notify_backend::{default_notify_mapping, notify_event_code, NotifyWatcher, NOTIFY_EVENT_CODES};

use crate::{error::Result, traits::FileWatcher};
use std::sync::Arc;
use tether_config::{BackendKind, WatchSettings};
use tracing::info;

/// Build the watcher selected by configuration.
///
/// This is the only place a backend is chosen; everything downstream holds the
/// returned capability. Mapping overrides are applied and validated here, so a bad
/// override fails startup instead of surfacing on the first event.
pub fn create_watcher(settings: &WatchSettings) -> Result<Arc<dyn FileWatcher>> {
    let watcher = match settings.backend {
        BackendKind::Native => NotifyWatcher::recommended()?,
        BackendKind::Poll => NotifyWatcher::polling(settings.poll_interval())?,
    };

    let mapping = watcher
        .mapping()
        .clone()
        .with_overrides(&settings.event_overrides)?;

    info!(
        "Created {} watcher ({} event codes, {} overridden)",
        watcher.backend_type(),
        mapping.len(),
        settings.event_overrides.len()
    );
    Ok(Arc::new(watcher.with_mapping(mapping)))
}
