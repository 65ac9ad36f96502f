//! The file entity.

mod lifecycle;
mod state;

pub use state::WatchState;

use crate::codec::{Codec, DEFAULT_ENCODING};
use crate::digest::content_digest;
use crate::directory::Directory;
use crate::emitter::Subscription;
use crate::error::{Error, Result};
use crate::events::{FileChanged, FileDeleted, FileRenamed, WatchErrorEvent};
use crate::paths::{normalize_path, path_exists, path_exists_sync};
use lifecycle::FileInner;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tether_config::FileSettings;
use tether_watch::FileWatcher;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// A single file on disk, observed through a watch backend.
///
/// The entity caches decoded contents and their digest, and keeps one native watch
/// alive while any change, rename or delete listener is registered. The path need not
/// exist. Clones share the same entity.
///
/// Operations assume a single writer per entity: a write that races with an external
/// rename targets the path the entity had when the write started.
#[derive(Clone)]
pub struct File {
    inner: Arc<FileInner>,
}

/// Builder for [`File`] with non-default settings.
pub struct FileBuilder {
    path: PathBuf,
    watcher: Arc<dyn FileWatcher>,
    settings: FileSettings,
    symlink: bool,
}

impl FileBuilder {
    /// Use these entity settings.
    pub fn settings(mut self, settings: FileSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Mark the entity as referring to a symbolic link.
    pub fn symbolic_link(mut self, symlink: bool) -> Self {
        self.symlink = symlink;
        self
    }

    /// Validate the settings and build the entity. No I/O is performed.
    pub fn build(self) -> Result<File> {
        self.settings.validate().map_err(Error::Config)?;
        let codec = Codec::for_name(&self.settings.default_encoding)?;

        Ok(File::from_parts(
            normalize_path(&self.path),
            self.watcher,
            self.settings,
            codec,
            self.symlink,
        ))
    }
}

impl File {
    /// Create an entity with default settings.
    pub fn new(path: impl AsRef<Path>, watcher: Arc<dyn FileWatcher>) -> Self {
        Self::from_parts(
            normalize_path(path.as_ref()),
            watcher,
            FileSettings::default(),
            Codec::utf8(),
            false,
        )
    }

    /// Start building an entity with custom settings.
    pub fn builder(path: impl AsRef<Path>, watcher: Arc<dyn FileWatcher>) -> FileBuilder {
        FileBuilder {
            path: path.as_ref().to_path_buf(),
            watcher,
            settings: FileSettings::default(),
            symlink: false,
        }
    }

    fn from_parts(
        path: PathBuf,
        watcher: Arc<dyn FileWatcher>,
        settings: FileSettings,
        codec: Codec,
        symlink: bool,
    ) -> Self {
        Self {
            inner: Arc::new(FileInner::new(path, watcher, settings, codec, symlink)),
        }
    }

    // ----- identity -----

    /// Current absolute path.
    pub fn path(&self) -> PathBuf {
        self.inner.state.lock().path.clone()
    }

    /// Point the entity at another path. The native watch, if any, is left as is.
    pub fn set_path(&self, path: impl AsRef<Path>) {
        let mut state = self.inner.state.lock();
        state.path = normalize_path(path.as_ref());
        state.real_path = None;
    }

    /// Final path component.
    pub fn base_name(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// The directory containing this file.
    pub fn parent(&self) -> Directory {
        let path = self.path();
        match path.parent() {
            Some(parent) => Directory::new(parent),
            None => Directory::new(path),
        }
    }

    /// Always `true`.
    pub fn is_file(&self) -> bool {
        true
    }

    /// Always `false`.
    pub fn is_directory(&self) -> bool {
        false
    }

    /// Whether the entity was constructed as a symbolic link.
    pub fn is_symbolic_link(&self) -> bool {
        self.inner.symlink
    }

    /// Canonical path with symlinks resolved. Cached until the path changes.
    pub async fn real_path(&self) -> Result<PathBuf> {
        let path = {
            let state = self.inner.state.lock();
            if let Some(real) = &state.real_path {
                return Ok(real.clone());
            }
            state.path.clone()
        };

        let real = tokio::fs::canonicalize(&path).await?;
        self.remember_real_path(&path, &real);
        Ok(real)
    }

    /// Blocking variant of [`real_path`](Self::real_path).
    pub fn real_path_sync(&self) -> Result<PathBuf> {
        let path = {
            let state = self.inner.state.lock();
            if let Some(real) = &state.real_path {
                return Ok(real.clone());
            }
            state.path.clone()
        };

        let real = std::fs::canonicalize(&path)?;
        self.remember_real_path(&path, &real);
        Ok(real)
    }

    fn remember_real_path(&self, path: &Path, real: &Path) {
        let mut state = self.inner.state.lock();
        if state.path == path {
            state.real_path = Some(real.to_path_buf());
        }
    }

    // ----- encoding -----

    /// Name of the configured encoding.
    pub fn encoding(&self) -> String {
        self.inner.state.lock().codec.name().to_string()
    }

    /// Switch encodings. Unknown names fail before any I/O; the cached contents are
    /// dropped since they were decoded with the previous encoding.
    pub fn set_encoding(&self, name: &str) -> Result<()> {
        let codec = if name == DEFAULT_ENCODING {
            Codec::utf8()
        } else {
            Codec::for_name(name)?
        };

        let mut state = self.inner.state.lock();
        if state.codec != codec {
            state.codec = codec;
            state.invalidate();
        }
        Ok(())
    }

    // ----- contents -----

    /// Whether anything exists at the path.
    pub async fn exists(&self) -> bool {
        path_exists(&self.path()).await
    }

    /// Blocking variant of [`exists`](Self::exists).
    pub fn exists_sync(&self) -> bool {
        path_exists_sync(&self.path())
    }

    /// Cached contents, without I/O.
    pub fn cached_contents(&self) -> Option<String> {
        self.inner.state.lock().cached_contents.clone()
    }

    /// Read and decode the file.
    ///
    /// Returns the cached contents unless `force_refresh` is set or the cache was
    /// invalidated. Resolves to `None` when the file does not exist.
    pub async fn read(&self, force_refresh: bool) -> Result<Option<String>> {
        let (path, codec, epoch) = match self.read_plan(force_refresh) {
            ReadPlan::Cached(text) => return Ok(Some(text)),
            ReadPlan::Load { path, codec, epoch } => (path, codec, epoch),
        };

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.forget_missing(epoch);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let mut decoder = codec.stream_decoder();
        let mut buffer = vec![0u8; self.inner.settings.read_chunk_size];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            decoder.feed(&buffer[..read]);
        }

        let text = decoder.finish();
        self.remember_contents(epoch, &text);
        Ok(Some(text))
    }

    /// Blocking variant of [`read`](Self::read).
    pub fn read_sync(&self, force_refresh: bool) -> Result<Option<String>> {
        let (path, codec, epoch) = match self.read_plan(force_refresh) {
            ReadPlan::Cached(text) => return Ok(Some(text)),
            ReadPlan::Load { path, codec, epoch } => (path, codec, epoch),
        };

        let mut file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.forget_missing(epoch);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let mut decoder = codec.stream_decoder();
        let mut buffer = vec![0u8; self.inner.settings.read_chunk_size];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            decoder.feed(&buffer[..read]);
        }

        let text = decoder.finish();
        self.remember_contents(epoch, &text);
        Ok(Some(text))
    }

    fn read_plan(&self, force_refresh: bool) -> ReadPlan {
        let state = self.inner.state.lock();
        if !force_refresh {
            if let Some(text) = &state.cached_contents {
                return ReadPlan::Cached(text.clone());
            }
        }
        ReadPlan::Load {
            path: state.path.clone(),
            codec: state.codec.clone(),
            epoch: state.content_epoch,
        }
    }

    fn remember_contents(&self, epoch: u64, text: &str) {
        let digest = content_digest(text);
        let mut state = self.inner.state.lock();
        if state.content_epoch == epoch {
            state.store(text.to_string(), digest);
        } else {
            debug!(
                "Contents of {} changed during read, not caching",
                state.path.display()
            );
        }
    }

    fn forget_missing(&self, epoch: u64) {
        let mut state = self.inner.state.lock();
        if state.content_epoch == epoch && state.cached_contents.is_some() {
            state.invalidate();
        }
    }

    /// Replace the file's contents.
    ///
    /// The file is truncated and rewritten in full. If it did not exist before and there
    /// are subscribers, the native watch is re-established on the new file.
    ///
    /// Characters the encoding cannot represent are written as numeric character
    /// references; the cache is then dropped so the next read reflects the disk.
    pub async fn write(&self, text: &str) -> Result<()> {
        let existed = self.exists().await;
        let (path, codec) = self.write_target();

        let (bytes, lossy) = codec.encode_reporting(text);
        tokio::fs::write(&path, bytes).await?;
        self.after_write(&path, text, existed, lossy);
        Ok(())
    }

    /// Blocking variant of [`write`](Self::write).
    pub fn write_sync(&self, text: &str) -> Result<()> {
        let existed = self.exists_sync();
        let (path, codec) = self.write_target();

        let (bytes, lossy) = codec.encode_reporting(text);
        std::fs::write(&path, bytes)?;
        self.after_write(&path, text, existed, lossy);
        Ok(())
    }

    fn write_target(&self) -> (PathBuf, Codec) {
        let state = self.inner.state.lock();
        (state.path.clone(), state.codec.clone())
    }

    fn after_write(&self, path: &Path, text: &str, existed: bool, lossy: bool) {
        if lossy {
            let mut state = self.inner.state.lock();
            warn!(
                "{} cannot represent every character written to {}",
                state.codec.name(),
                path.display()
            );
            state.invalidate();
        } else {
            let digest = content_digest(text);
            self.inner.state.lock().store(text.to_string(), digest);
        }
        if !existed {
            self.inner.rewatch_after_create();
        }
    }

    /// Digest of the contents, reading the file first if it has not been read yet.
    /// `None` when the file does not exist.
    pub async fn digest(&self) -> Result<Option<String>> {
        let cached = self.inner.state.lock().digest.clone();
        if let Some(digest) = cached {
            return Ok(Some(digest));
        }
        Ok(self.read(false).await?.map(|text| content_digest(&text)))
    }

    /// Blocking variant of [`digest`](Self::digest).
    pub fn digest_sync(&self) -> Result<Option<String>> {
        let cached = self.inner.state.lock().digest.clone();
        if let Some(digest) = cached {
            return Ok(Some(digest));
        }
        Ok(self.read_sync(false)?.map(|text| content_digest(&text)))
    }

    /// Create the file with empty contents, creating missing parent directories.
    ///
    /// Returns `false` without touching anything if the path already exists.
    pub async fn create(&self) -> Result<bool> {
        if self.exists().await {
            return Ok(false);
        }
        self.parent().create().await?;
        self.write("").await?;
        debug!("Created file: {}", self.path().display());
        Ok(true)
    }

    // ----- notifications -----

    /// Notify when contents change, including when a delete turns out to be an atomic
    /// replace.
    pub fn on_did_change(
        &self,
        callback: impl Fn(&FileChanged) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner
            .register(FileInner::change_channel, Arc::new(callback), true)
    }

    /// Notify when the entity follows a rename.
    pub fn on_did_rename(
        &self,
        callback: impl Fn(&FileRenamed) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner
            .register(FileInner::rename_channel, Arc::new(callback), true)
    }

    /// Notify when the file is deleted and does not come back.
    pub fn on_did_delete(
        &self,
        callback: impl Fn(&FileDeleted) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner
            .register(FileInner::delete_channel, Arc::new(callback), true)
    }

    /// Notify on watch backend failures. Does not keep the watch alive.
    pub fn on_will_throw_watch_error(
        &self,
        callback: impl Fn(&WatchErrorEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner
            .register(FileInner::watch_error_channel, Arc::new(callback), false)
    }

    // ----- introspection -----

    /// Number of live change, rename and delete registrations.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().subscription_count
    }

    /// Whether a native watch is held (attached or attaching).
    pub fn is_watching(&self) -> bool {
        self.inner.state.lock().native.is_some()
    }

    /// Current lifecycle state.
    pub fn watch_state(&self) -> WatchState {
        self.inner.state.lock().phase
    }

    /// Stop watching, cancel any pending resurrection check and drop every listener.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("backend", &self.inner.watcher.backend_type())
            .field("symlink", &self.inner.symlink)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

enum ReadPlan {
    Cached(String),
    Load {
        path: PathBuf,
        codec: Codec,
        epoch: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tether_watch::test_support::ManualWatcher;

    fn entity(path: impl AsRef<Path>) -> (File, Arc<ManualWatcher>) {
        let watcher = Arc::new(ManualWatcher::new());
        (File::new(path, watcher.clone()), watcher)
    }

    #[test]
    fn identity_accessors() {
        let (file, _) = entity("/tmp/notes/./todo.txt");
        assert_eq!(file.path(), PathBuf::from("/tmp/notes/todo.txt"));
        assert_eq!(file.base_name().as_deref(), Some("todo.txt"));
        assert_eq!(file.parent().path(), Path::new("/tmp/notes"));
        assert!(file.is_file());
        assert!(!file.is_directory());
        assert!(!file.is_symbolic_link());
        assert_eq!(file.encoding(), "utf8");
    }

    #[test]
    fn set_path_normalizes() {
        let (file, _) = entity("/tmp/a.txt");
        file.set_path("/tmp/dir/../b.txt");
        assert_eq!(file.path(), PathBuf::from("/tmp/b.txt"));
    }

    #[test]
    fn builder_validates_settings() {
        let watcher = Arc::new(ManualWatcher::new());

        let bad_encoding = File::builder("/tmp/a", watcher.clone())
            .settings(FileSettings::default().with_default_encoding("klingon"))
            .build();
        assert!(matches!(bad_encoding, Err(Error::EncodingUnsupported(_))));

        let bad_chunk = File::builder("/tmp/a", watcher.clone())
            .settings(FileSettings::default().with_read_chunk_size(0))
            .build();
        assert!(matches!(bad_chunk, Err(Error::Config(_))));

        let file = File::builder("/tmp/a", watcher)
            .settings(FileSettings::default().with_default_encoding("latin1"))
            .symbolic_link(true)
            .build()
            .unwrap();
        assert_eq!(file.encoding(), "latin1");
        assert!(file.is_symbolic_link());
    }

    #[test]
    fn set_encoding_fails_fast() {
        let (file, _) = entity("/nonexistent/dir/file.txt");
        match file.set_encoding("bogus-encoding") {
            Err(Error::EncodingUnsupported(name)) => assert_eq!(name, "bogus-encoding"),
            other => panic!("expected EncodingUnsupported, got {:?}", other),
        }
        assert_eq!(file.encoding(), "utf8");
    }

    #[test]
    fn sync_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let (file, _) = entity(temp_dir.path().join("sync.txt"));

        assert!(!file.exists_sync());
        assert_eq!(file.read_sync(false).unwrap(), None);

        file.write_sync("X").unwrap();
        assert!(file.exists_sync());
        assert_eq!(file.read_sync(true).unwrap().as_deref(), Some("X"));
        assert_eq!(file.digest_sync().unwrap(), Some(content_digest("X")));
    }

    #[test]
    fn small_chunks_decode_multibyte_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chunks.txt");
        std::fs::write(&path, "héllo wörld ☕").unwrap();

        let file = File::builder(&path, Arc::new(ManualWatcher::new()))
            .settings(FileSettings::default().with_read_chunk_size(1))
            .build()
            .unwrap();
        assert_eq!(file.read_sync(false).unwrap().as_deref(), Some("héllo wörld ☕"));
    }

    #[test]
    fn encoding_round_trip_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("latin1.txt");
        let (file, _) = entity(&path);

        file.set_encoding("latin1").unwrap();
        file.write_sync("café").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x63, 0x61, 0x66, 0xE9]);
        assert_eq!(file.read_sync(true).unwrap().as_deref(), Some("café"));
    }

    #[test]
    fn changing_encoding_drops_cache() {
        let temp_dir = TempDir::new().unwrap();
        let (file, _) = entity(temp_dir.path().join("enc.txt"));
        file.write_sync("abc").unwrap();
        assert!(file.cached_contents().is_some());

        file.set_encoding("utf8").unwrap();
        assert!(file.cached_contents().is_some());

        file.set_encoding("utf-16le").unwrap();
        assert!(file.cached_contents().is_none());
    }

    #[test]
    fn real_path_resolves_and_caches() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("real.txt");
        std::fs::write(&path, "x").unwrap();
        let (file, _) = entity(&path);

        let real = file.real_path_sync().unwrap();
        assert_eq!(real, std::fs::canonicalize(&path).unwrap());

        std::fs::remove_file(&path).unwrap();
        assert_eq!(file.real_path_sync().unwrap(), real);

        file.set_path(&path);
        assert!(file.real_path_sync().is_err());
    }
}
