//! End-to-end tests for file entities over the platform watch backend.
//!
//! Backends differ in how many raw events one filesystem operation produces, so these
//! tests only assert on what subscribers must (or must never) see.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tether_config::{FileSettings, WatchSettings};
use tether_file::{File, FileChanged, FileDeleted, Subscription};
use tether_watch::create_watcher;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn native_file(path: &Path) -> File {
    let watcher = create_watcher(&WatchSettings::default()).expect("Failed to create watcher");
    File::builder(path, watcher)
        .settings(FileSettings::default().with_resurrection_delay(Duration::from_millis(50)))
        .build()
        .expect("Failed to build file")
}

fn changes(file: &File) -> (Subscription, UnboundedReceiver<FileChanged>) {
    let (tx, rx) = unbounded_channel();
    let subscription = file.on_did_change(move |event| {
        let _ = tx.send(event.clone());
    });
    (subscription, rx)
}

fn deletes(file: &File) -> (Subscription, UnboundedReceiver<FileDeleted>) {
    let (tx, rx) = unbounded_channel();
    let subscription = file.on_did_delete(move |event| {
        let _ = tx.send(event.clone());
    });
    (subscription, rx)
}

/// Keep rewriting the file until a change comes through, which also proves the watch
/// attached. Attachment runs on the blocking pool and has no completion signal.
async fn prime(path: &Path, rx: &mut UnboundedReceiver<FileChanged>) {
    timeout(WAIT, async {
        let mut round = 0u32;
        loop {
            round += 1;
            std::fs::write(path, format!("prime {}", round)).unwrap();
            if let Ok(Some(_)) = timeout(Duration::from_millis(100), rx.recv()).await {
                return;
            }
        }
    })
    .await
    .expect("Watch never delivered a change");

    // Let trailing events from priming settle, then drop them.
    tokio::time::sleep(Duration::from_millis(200)).await;
    while rx.try_recv().is_ok() {}
}

#[tokio::test]
async fn test_external_write_notifies_change() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("external.txt");
    std::fs::write(&path, "start").unwrap();

    let file = native_file(&path);
    let (_subscription, mut rx) = changes(&file);
    prime(&path, &mut rx).await;

    file.read(false).await.unwrap();
    std::fs::write(&path, "edited elsewhere").unwrap();

    let event = timeout(WAIT, rx.recv())
        .await
        .expect("Timed out waiting for change")
        .expect("Channel closed");
    assert_eq!(event.path, file.path());
    assert_eq!(
        file.read(false).await.unwrap().as_deref(),
        Some("edited elsewhere")
    );
}

/// Replacing the file by renaming a sibling over it is a change, never a delete.
#[tokio::test]
async fn test_atomic_save_is_not_a_delete() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("document.txt");
    std::fs::write(&path, "v1").unwrap();

    let file = native_file(&path);
    let (_changes, mut change_rx) = changes(&file);
    let (_deletes, mut delete_rx) = deletes(&file);
    prime(&path, &mut change_rx).await;

    let staging = temp_dir.path().join(".document.txt.swp");
    std::fs::write(&staging, "v2").unwrap();
    std::fs::rename(&staging, &path).unwrap();

    timeout(WAIT, change_rx.recv())
        .await
        .expect("Timed out waiting for change")
        .expect("Channel closed");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(delete_rx.try_recv().is_err(), "Atomic save reported as delete");
    assert_eq!(file.read(true).await.unwrap().as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_removal_notifies_delete() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("doomed.txt");
    std::fs::write(&path, "bye").unwrap();

    let file = native_file(&path);
    let (_changes, mut change_rx) = changes(&file);
    let (_deletes, mut delete_rx) = deletes(&file);
    prime(&path, &mut change_rx).await;

    std::fs::remove_file(&path).unwrap();

    let event = timeout(WAIT, delete_rx.recv())
        .await
        .expect("Timed out waiting for delete")
        .expect("Channel closed");
    assert_eq!(event.path, file.path());
    assert_eq!(file.read(false).await.unwrap(), None);
}

/// Dropping the last subscription releases the native watch; later writes are silent.
#[tokio::test]
async fn test_unsubscribed_entity_is_silent() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("quiet.txt");
    std::fs::write(&path, "x").unwrap();

    let file = native_file(&path);
    let (subscription, mut rx) = changes(&file);
    prime(&path, &mut rx).await;

    let error_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&error_count);
    let _errors = file.on_will_throw_watch_error(move |event| {
        event.handle();
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });

    drop(subscription);
    assert!(!file.is_watching());

    std::fs::write(&path, "unobserved").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(error_count.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(file.subscription_count(), 0);
}
