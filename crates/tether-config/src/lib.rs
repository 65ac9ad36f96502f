//! # Tether Configuration Library
//!
//! Typed settings for the tether workspace: which watch backend to use, how native
//! event codes map onto the canonical event vocabulary, and how file entities behave
//! (resurrection delay, rename handling, read chunking, default encoding).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load_from_file("tether.toml").await?;
//!     println!("resurrection delay: {:?}", config.file.resurrection_delay());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod loader;

pub use config::*;
pub use loader::*;
