//! # Tether File
//!
//! A file entity that caches its decoded contents, fingerprints them, and turns the raw
//! event stream of a watch backend into three notifications subscribers actually care
//! about: the file changed, it was renamed, or it is gone.
//!
//! Deletes are not reported straight away. Editors commonly save by writing a temporary
//! file and renaming it over the original, which backends report as a delete. The entity
//! waits a short delay, checks whether the path exists again, and reports a change if it
//! does.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tether_config::WatchSettings;
//! use tether_file::File;
//! use tether_watch::create_watcher;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let watcher = create_watcher(&WatchSettings::default())?;
//! let file = File::new("notes/todo.txt", watcher);
//!
//! let _changes = file.on_did_change(|event| println!("changed: {}", event.path.display()));
//! file.write("- buy milk\n").await?;
//! assert_eq!(file.read(false).await?.as_deref(), Some("- buy milk\n"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod codec;
mod digest;
mod directory;
mod emitter;
pub mod error;
mod events;
mod file;
mod paths;

pub use codec::{Codec, StreamDecoder, DEFAULT_ENCODING};
pub use digest::content_digest;
pub use directory::Directory;
pub use emitter::Subscription;
pub use error::{Error, Result};
pub use events::{FileChanged, FileDeleted, FileRenamed, WatchErrorEvent};
pub use file::{File, FileBuilder, WatchState};
pub use paths::normalize_path;
