//! # File-Backed Storage
//!
//! One directory is one origin; each key lives in `<key>.json`. Several
//! processes opening the same directory behave like several tabs.
//!
//! ## Detecting Foreign Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Process A                                   Process B                  │
//! │  ─────────                                   ─────────                  │
//! │  set_item(k, v2)                                                        │
//! │    ├── write .k.<ctx>.tmp                                               │
//! │    ├── rename → k.json                                                  │
//! │    └── seen[k] = v2                                                     │
//! │                                              watcher tick               │
//! │                                                ├── read k.json = v2     │
//! │                                                ├── seen[k] = v1 ≠ v2    │
//! │                                                └── StorageEvent(k, v2)  │
//! │                                                                         │
//! │  The snapshot (`seen`) includes this process's own writes, so the       │
//! │  poll only reports changes made somewhere else.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{
    validate_key, ContextId, StorageArea, StorageEvent, StorageEvents, DEFAULT_EVENT_CAPACITY,
};
use crate::error::StoreResult;

const EXTENSION: &str = "json";

// =============================================================================
// File Storage
// =============================================================================

/// A directory-backed storage context.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    context: ContextId,
    events: broadcast::Sender<StorageEvent>,
    /// Last content this context knows for each key.
    seen: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Opens (creating if needed) the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::with_event_capacity(dir, DEFAULT_EVENT_CAPACITY)
    }

    /// Opens the storage directory with a custom notification buffer.
    pub fn with_event_capacity(dir: impl Into<PathBuf>, capacity: usize) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let (events, _) = broadcast::channel(capacity.max(1));
        let storage = FileStorage {
            seen: Mutex::new(scan(&dir)?),
            dir,
            context: ContextId::new(),
            events,
        };
        debug!(dir = ?storage.dir, context = %storage.context, "Opened file storage");
        Ok(storage)
    }

    /// The directory backing this origin.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, EXTENSION)))
    }

    fn seen(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compares the directory with the last known snapshot and publishes a
    /// notification for every key another process changed.
    ///
    /// Returns the number of notifications published.
    pub fn poll_changes(&self) -> StoreResult<usize> {
        let mut seen = self.seen();
        let current = scan(&self.dir)?;
        let mut changes = Vec::new();

        for (key, value) in &current {
            if seen.get(key) != Some(value) {
                changes.push(StorageEvent::new(
                    key,
                    seen.get(key).cloned(),
                    Some(value.clone()),
                    ContextId::EXTERNAL,
                ));
            }
        }
        for (key, old) in seen.iter() {
            if !current.contains_key(key) {
                changes.push(StorageEvent::new(
                    key,
                    Some(old.clone()),
                    None,
                    ContextId::EXTERNAL,
                ));
            }
        }

        *seen = current;
        let count = changes.len();
        for event in changes {
            let _ = self.events.send(event);
        }
        Ok(count)
    }

    /// Spawns a task that calls [`FileStorage::poll_changes`] every `every`.
    ///
    /// Must be called from within a Tokio runtime. The task stops when the
    /// returned [`FileWatcher`] is dropped.
    pub fn spawn_watcher(self: &Arc<Self>, every: Duration) -> FileWatcher {
        let storage = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match storage.poll_changes() {
                    Ok(0) => {}
                    Ok(changes) => {
                        debug!(changes, dir = ?storage.dir, "Detected foreign storage writes")
                    }
                    Err(e) => warn!(error = %e, dir = ?storage.dir, "Storage poll failed"),
                }
            }
        });
        FileWatcher { handle }
    }
}

impl StorageArea for FileStorage {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        read_optional(&path)
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, self.context));

        let mut seen = self.seen();
        let old = read_optional(&path)?;
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        seen.insert(key.to_string(), value.to_string());

        if old.as_deref() != Some(value) {
            let _ = self
                .events
                .send(StorageEvent::new(key, old, Some(value.to_string()), self.context));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;

        let mut seen = self.seen();
        let old = read_optional(&path)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        seen.remove(key);

        if old.is_some() {
            let _ = self
                .events
                .send(StorageEvent::new(key, old, None, self.context));
        }
        Ok(())
    }

    fn subscribe(&self) -> StorageEvents {
        StorageEvents::new(self.events.subscribe(), self.context)
    }

    fn context_id(&self) -> ContextId {
        self.context
    }
}

// =============================================================================
// Watcher Handle
// =============================================================================

/// Handle to a running poll task. Dropping it stops the task.
#[derive(Debug)]
pub struct FileWatcher {
    handle: JoinHandle<()>,
}

impl FileWatcher {
    /// Stops polling.
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// Returns true while the poll task is alive.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Reads a key file. Bytes that are not UTF-8 come back lossily decoded so a
/// corrupt value reaches the caller as a bad value rather than an I/O error.
fn read_optional(path: &Path) -> StoreResult<Option<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match String::from_utf8(bytes) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) => {
            warn!(?path, "Stored value is not valid UTF-8");
            Ok(Some(String::from_utf8_lossy(e.as_bytes()).into_owned()))
        }
    }
}

/// Reads every `<key>.json` in `dir`. Temp files and foreign names are
/// skipped, and so is any single file that cannot be read.
fn scan(dir: &Path) -> StoreResult<HashMap<String, String>> {
    let mut entries = HashMap::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
            continue;
        }
        let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if validate_key(key).is_err() {
            continue;
        }
        match read_optional(&path) {
            Ok(Some(contents)) => {
                entries.insert(key.to_string(), contents);
            }
            // Removed between read_dir and read
            Ok(None) => {}
            Err(e) => warn!(?path, error = %e, "Skipping unreadable storage file"),
        }
    }

    Ok(entries)
}
