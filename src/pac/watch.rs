//! Debounced watching of a single file.
//!
//! Editors and the OS often report one logical edit as several events. A
//! watcher is either idle or debouncing: the first event switches it to
//! debouncing, which ignores further events, waits a short fixed delay,
//! runs the handler once and returns to idle.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{Error, Result};

/// Debounce delay between an event and its notification.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);

/// Clears the enabled flag for its lifetime.
///
/// Dropping it re-enables the watcher, also when the handler panicked.
struct Suspend(Arc<AtomicBool>);

impl Suspend {
    fn new(enabled: Arc<AtomicBool>) -> Self {
        enabled.store(false, Ordering::Release);
        Self(enabled)
    }
}

impl Drop for Suspend {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Watches one file and calls a handler once per debounced change.
///
/// Must be created inside a tokio runtime. Dropping it stops watching.
pub struct FileWatcher {
    path: PathBuf,
    enabled: Arc<AtomicBool>,
    task: JoinHandle<()>,
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `path` for creation, modification, deletion and renames.
    ///
    /// `label` is only used for logging, e.g. "PAC file".
    pub fn spawn<F>(label: &'static str, path: &Path, debounce: Duration, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| Error::Config(format!("not a file path: {:?}", path)))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let enabled = Arc::new(AtomicBool::new(true));
        let (tx, mut rx) = mpsc::unbounded_channel::<EventKind>();

        let cb_enabled = Arc::clone(&enabled);
        let cb_name = file_name.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !cb_enabled.load(Ordering::Acquire) || !is_relevant(&event.kind) {
                        return;
                    }
                    if event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(cb_name.as_os_str()))
                    {
                        let _ = tx.send(event.kind);
                    }
                }
                Err(e) => log::error!("File watcher error: {}", e),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let task_enabled = Arc::clone(&enabled);
        let display_name = file_name.to_string_lossy().into_owned();
        let task = tokio::spawn(async move {
            while let Some(kind) = rx.recv().await {
                log::info!("Detected: {} '{}' was {}.", label, display_name, describe(&kind));

                let suspended = Suspend::new(Arc::clone(&task_enabled));
                tokio::time::sleep(debounce).await;
                if panic::catch_unwind(AssertUnwindSafe(&on_change)).is_err() {
                    log::error!("{} change handler panicked", label);
                }
                // Events queued before the pause took effect belong to this edit
                while rx.try_recv().is_ok() {}
                drop(suspended);
            }
        });

        log::debug!("Watching {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            enabled,
            task,
            _watcher: watcher,
        })
    }

    /// `false` while a change is being debounced.
    pub fn is_idle(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Content writes, creation, deletion and renames. Permission and
/// timestamp changes are not edits.
fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        _ => false,
    }
}

fn describe(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Create(_) => "created",
        EventKind::Modify(ModifyKind::Name(_)) => "renamed",
        EventKind::Remove(_) => "deleted",
        _ => "changed",
    }
}
