//! Configuration schema for watch backends and file entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Upper bound for the resurrection delay. Anything longer stops being a "short" debounce
/// and starts hiding real deletions from subscribers.
pub const MAX_RESURRECTION_DELAY_MS: u64 = 10_000;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Watch backend selection and event mapping
    pub watch: WatchSettings,
    /// File entity behaviour
    pub file: FileSettings,
}

impl TetherConfig {
    /// Check every section for values that can never work.
    pub fn validate(&self) -> Result<(), String> {
        self.watch.validate()?;
        self.file.validate()?;
        Ok(())
    }
}

/// Which native watch implementation to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Platform-recommended event-driven watcher (inotify, FSEvents, ReadDirectoryChangesW)
    #[default]
    Native,
    /// Stat-based polling watcher for filesystems without change notifications
    Poll,
}

impl BackendKind {
    /// Stable name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Poll => "poll",
        }
    }
}

/// Watch backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Backend to instantiate at startup
    pub backend: BackendKind,
    /// Poll interval for the polling backend, in milliseconds
    pub poll_interval_ms: u64,
    /// Per-code routing overrides: backend event code -> create|change|rename|delete|ignore
    pub event_overrides: BTreeMap<String, String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Native,
            poll_interval_ms: 500,
            event_overrides: BTreeMap::new(),
        }
    }
}

impl WatchSettings {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Select a backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Route a backend event code somewhere other than its default.
    pub fn with_override(mut self, code: impl Into<String>, target: impl Into<String>) -> Self {
        self.event_overrides.insert(code.into(), target.into());
        self
    }

    fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("watch.poll_interval_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// File entity settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Delay before re-checking existence after a delete event, in milliseconds
    pub resurrection_delay_ms: u64,
    /// Re-issue the native watch under the new path when a rename is reported
    pub rewatch_on_rename: bool,
    /// Buffer size for streaming reads, in bytes
    pub read_chunk_size: usize,
    /// Encoding assigned to new file entities
    pub default_encoding: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            resurrection_delay_ms: 50,
            rewatch_on_rename: false,
            read_chunk_size: 64 * 1024,
            default_encoding: "utf8".to_string(),
        }
    }
}

impl FileSettings {
    /// Resurrection delay as a duration.
    pub fn resurrection_delay(&self) -> Duration {
        Duration::from_millis(self.resurrection_delay_ms)
    }

    /// Set the resurrection delay.
    pub fn with_resurrection_delay(mut self, delay: Duration) -> Self {
        self.resurrection_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Enable or disable re-watching on rename.
    pub fn with_rewatch_on_rename(mut self, enabled: bool) -> Self {
        self.rewatch_on_rename = enabled;
        self
    }

    /// Set the streaming read buffer size.
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the default encoding name.
    pub fn with_default_encoding(mut self, name: impl Into<String>) -> Self {
        self.default_encoding = name.into();
        self
    }

    /// Check value ranges. Encoding names are resolved by the file entity.
    pub fn validate(&self) -> Result<(), String> {
        if self.resurrection_delay_ms == 0 || self.resurrection_delay_ms > MAX_RESURRECTION_DELAY_MS
        {
            return Err(format!(
                "file.resurrection_delay_ms must be between 1 and {}, got {}",
                MAX_RESURRECTION_DELAY_MS, self.resurrection_delay_ms
            ));
        }
        if self.read_chunk_size == 0 {
            return Err("file.read_chunk_size must be greater than zero".to_string());
        }
        if self.default_encoding.trim().is_empty() {
            return Err("file.default_encoding must not be empty".to_string());
        }
        Ok(())
    }
}
