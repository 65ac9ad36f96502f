//! # Tether Watch
//!
//! Watcher adapter for the tether file entity. Backends report raw filesystem events in
//! their own vocabulary; this crate translates them into four canonical kinds
//! (create, change, rename, delete) and hands back closable handles to native watches.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   File entity   │───▶│   FileWatcher    │───▶│ notify backend  │
//! │                 │    │   (trait)        │    │ (native / poll) │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//!         ▲                       │                       │
//!         │                       ▼                       ▼
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   EventSink     │◀───│  EventMapping    │◀───│   Raw codes     │
//! │ (WatchEvent)    │    │  (exhaustive)    │    │ (modify-data..) │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_config::WatchSettings;
//! use tether_watch::{create_watcher, EventSink};
//!
//! # fn main() -> tether_watch::Result<()> {
//! let watcher = create_watcher(&WatchSettings::default())?;
//! let sink: EventSink = Arc::new(|event| println!("{:?}", event));
//! let handle = watcher.watch("/tmp/notes.txt".into(), sink);
//! handle.close();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod backends;
pub mod error;
mod events;
mod handle;
mod mapping;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use backends::{
    create_watcher, default_notify_mapping, notify_event_code, NotifyWatcher, NOTIFY_EVENT_CODES,
};
pub use error::*;
pub use events::*;
pub use handle::{Attachment, NativeGuard, WatchHandle};
pub use mapping::{EventMapping, EventRoute};
pub use traits::{EventSink, FileWatcher};

/// Re-export common types for convenience
pub mod prelude {
    pub use crate::{
        create_watcher, Error, EventSink, FileWatcher, Result, WatchEvent, WatchEventKind,
        WatchHandle,
    };
}
