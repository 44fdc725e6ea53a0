//! File watching with debounced callbacks
//!
//! A [`WatchSubscription`] observes a single file. The parent directory is
//! watched rather than the file itself so the subscription survives the
//! temp-file + rename pattern used by every write in this crate.

use crate::error::{Error, Result};
use log::{debug, warn};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Async callback invoked once per debounced change
pub type WatchCallback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// An active observation of one file
///
/// Dropping the subscription aborts the debounce task and releases the OS
/// watch handle; no callback runs afterwards.
pub struct WatchSubscription {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WatchSubscription {
    /// The watched file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Stopped watching {}", self.path.display());
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Start watching `path`, calling `callback` after each burst of changes has
/// been quiet for `debounce`.
///
/// The parent directory must exist. Must be called from within a tokio runtime.
pub fn watch(path: &Path, debounce: Duration, callback: WatchCallback) -> Result<WatchSubscription> {
    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| Error::Config(format!("Cannot watch '{}': no file name", path.display())))?;
    let parent = path
        .parent()
        .ok_or_else(|| Error::Config(format!("Cannot watch '{}': no parent", path.display())))?
        .to_path_buf();

    let (tx, rx) = mpsc::unbounded_channel();
    let target = file_name.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_relevant(&event, &target) {
                    // Receiver gone means the subscription is being torn down
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!("Watch error: {e}"),
        },
        Config::default(),
    )
    .map_err(|e| Error::Watch {
        path: path.to_path_buf(),
        source: e,
    })?;

    watcher
        .watch(&parent, RecursiveMode::NonRecursive)
        .map_err(|e| Error::Watch {
            path: path.to_path_buf(),
            source: e,
        })?;

    let task = tokio::spawn(debounce_loop(rx, debounce, callback));

    debug!("Watching {} (debounce {:?})", path.display(), debounce);

    Ok(WatchSubscription {
        path: path.to_path_buf(),
        _watcher: watcher,
        task,
    })
}

async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    callback: WatchCallback,
) {
    while rx.recv().await.is_some() {
        // Absorb the rest of the burst
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }
        callback().await;
    }
}

/// Whether a raw notify event concerns the watched file
fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        // mtime/atime/chmod noise
        EventKind::Modify(ModifyKind::Metadata(_)) => return false,
        EventKind::Modify(_) => {}
        _ => return false,
    }

    event
        .paths
        .iter()
        .any(|p| p.file_name().is_some_and(|name| name == file_name.as_os_str()))
}
