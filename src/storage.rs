//! Key/value blob storage with change notifications.
//!
//! Every key holds one serialized string, the same shape a browser's local
//! storage has. Writes made through one handle are announced to every *other*
//! handle on the same backend, which is what lets a second client notice that
//! the tasks blob changed underneath it.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::Task;

/// Key under which the task collection is stored.
pub const TASKS_KEY: &str = "tasks";

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode tasks: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stored tasks could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Emitted when a key was written by someone other than the receiving handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
}

pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to external modifications of any key.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// Reads the task collection.
///
/// A missing key yields an empty collection. So does a blob that is not JSON
/// at all: the problem is logged and otherwise swallowed.
pub fn load_tasks(storage: &dyn Storage) -> Result<Vec<Task>, StorageError> {
    let raw = match storage.get(TASKS_KEY)? {
        Some(raw) => raw,
        None => return Ok(Vec::new()),
    };
    decode_tasks(&raw)
}

/// Decodes a stored blob.
///
/// Valid JSON that does not hold a task list is an error rather than an empty
/// collection, so a later write cannot silently overwrite records this
/// version fails to read.
pub fn decode_tasks(raw: &str) -> Result<Vec<Task>, StorageError> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse tasks, treating as empty");
            return Ok(Vec::new());
        }
    };
    serde_json::from_value(value).map_err(|e| {
        tracing::error!(error = %e, "Stored tasks have an unreadable record");
        StorageError::Decode(e)
    })
}

/// Overwrites the whole task collection.
pub fn save_tasks(storage: &dyn Storage, tasks: &[Task]) -> Result<(), StorageError> {
    let s = serde_json::to_string(tasks)?;
    storage.set(TASKS_KEY, &s)
}

// =============================================================================
// In-memory backend
// =============================================================================

struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    tabs: Mutex<Vec<(u64, broadcast::Sender<StorageEvent>)>>,
    next_tab: AtomicU64,
}

impl MemoryBackend {
    fn announce(&self, origin: u64, key: &str) {
        for (tab, tx) in self.tabs.lock().iter() {
            if *tab != origin {
                // No receivers is fine; nobody on that tab is listening.
                let _ = tx.send(StorageEvent { key: key.to_string() });
            }
        }
    }
}

/// Process-local storage. Every handle opened with [`MemoryStorage::tab`]
/// shares the same entries and acts like another browser tab.
pub struct MemoryStorage {
    backend: Arc<MemoryBackend>,
    tab: u64,
    tx: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        let backend = Arc::new(MemoryBackend {
            entries: Mutex::new(HashMap::new()),
            tabs: Mutex::new(Vec::new()),
            next_tab: AtomicU64::new(0),
        });
        MemoryStorage::attach(backend)
    }

    /// Opens another handle onto the same entries.
    pub fn tab(&self) -> MemoryStorage {
        MemoryStorage::attach(Arc::clone(&self.backend))
    }

    fn attach(backend: Arc<MemoryBackend>) -> MemoryStorage {
        let tab = backend.next_tab.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        backend.tabs.lock().push((tab, tx.clone()));
        MemoryStorage { backend, tab, tx }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryStorage {
    fn drop(&mut self) {
        let tab = self.tab;
        self.backend.tabs.lock().retain(|(t, _)| *t != tab);
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.backend.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend.entries.lock().insert(key.to_string(), value.to_string());
        self.backend.announce(self.tab, key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.backend.entries.lock().remove(key);
        if removed.is_some() {
            self.backend.announce(self.tab, key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.tx.subscribe()
    }
}

// =============================================================================
// File backend
// =============================================================================

/// Stores each key as `<dir>/<key>.json`.
///
/// Changes by other processes are picked up by [`FileStorage::watch`], which
/// polls modification times.
pub struct FileStorage {
    dir: PathBuf,
    tx: broadcast::Sender<StorageEvent>,
    seen: Mutex<HashMap<String, Option<SystemTime>>>,
}

impl FileStorage {
    /// Opens (and creates if needed) the storage directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<FileStorage, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        let storage = FileStorage { dir, tx, seen: Mutex::new(HashMap::new()) };
        // Baseline; nothing that exists now counts as a change.
        storage.changed_keys();
        Ok(storage)
    }

    fn path(&self, key: &str) -> PathBuf {
        let mut p = self.dir.clone();
        p.push(format!("{key}.json"));
        p
    }

    fn record(&self, key: &str) {
        let mtime = fs::metadata(self.path(key)).and_then(|m| m.modified()).ok();
        self.seen.lock().insert(key.to_string(), mtime);
    }

    /// Spawns a task that announces files modified outside this handle.
    pub fn watch(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let storage = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                for key in storage.changed_keys() {
                    tracing::debug!(key = %key, "Storage changed externally");
                    let _ = storage.tx.send(StorageEvent { key });
                }
            }
        })
    }

    fn changed_keys(&self) -> Vec<String> {
        let mut current: HashMap<String, Option<SystemTime>> = HashMap::new();
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(key) = path.file_stem().and_then(|s| s.to_str()) {
                    let mtime = entry.metadata().and_then(|m| m.modified()).ok();
                    current.insert(key.to_string(), mtime);
                }
            }
        }

        let mut seen = self.seen.lock();
        let mut changed = Vec::new();
        for (key, mtime) in &current {
            if seen.get(key) != Some(mtime) {
                changed.push(key.clone());
            }
        }
        for (key, mtime) in seen.iter() {
            if mtime.is_some() && !current.contains_key(key) {
                changed.push(key.clone());
            }
        }
        for key in &changed {
            seen.insert(key.clone(), current.get(key).copied().flatten());
        }
        changed
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut f = match OpenOptions::new().read(true).open(self.path(key)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        Ok(Some(s))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Write aside and rename over, so readers never see a partial blob.
        let path = self.path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        {
            let mut f = File::create(&tmp)?;
            f.write_all(value.as_bytes())?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        #[cfg(unix)]
        {
            if let Ok(d) = File::open(&self.dir) {
                let _ = d.sync_all();
            }
        }
        self.record(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        self.record(key);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_tabs_share_entries() {
        let first = MemoryStorage::new();
        let second = first.tab();
        first.set(TASKS_KEY, "[]").unwrap();
        assert_eq!(second.get(TASKS_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_memory_event_skips_writer() {
        let first = MemoryStorage::new();
        let second = first.tab();
        let mut own = first.subscribe();
        let mut other = second.subscribe();

        first.set(TASKS_KEY, "[]").unwrap();

        assert!(own.try_recv().is_err());
        assert_eq!(other.try_recv().unwrap(), StorageEvent { key: TASKS_KEY.into() });
    }

    #[test]
    fn test_malformed_blob_loads_empty() {
        let storage = MemoryStorage::new();
        storage.set(TASKS_KEY, "{not json").unwrap();
        assert!(load_tasks(&storage).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_record_is_an_error() {
        let storage = MemoryStorage::new();
        storage
            .set(TASKS_KEY, r#"[{"id":"a","title":"T","createdAt":"yesterday"}]"#)
            .unwrap();
        assert!(matches!(load_tasks(&storage), Err(StorageError::Decode(_))));
    }

    #[test]
    fn test_missing_key_loads_empty() {
        let storage = MemoryStorage::new();
        assert!(load_tasks(&storage).unwrap().is_empty());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path()).unwrap();
        let tasks = vec![Task::new("Write report")];

        save_tasks(&storage, &tasks).unwrap();

        assert!(temp.path().join("tasks.json").exists());
        assert_eq!(load_tasks(&storage).unwrap(), tasks);

        storage.remove(TASKS_KEY).unwrap();
        assert_eq!(storage.get(TASKS_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_storage_detects_other_writer() {
        let temp = tempdir().unwrap();
        let watcher = FileStorage::new(temp.path()).unwrap();
        let writer = FileStorage::new(temp.path()).unwrap();

        writer.set(TASKS_KEY, "[]").unwrap();

        assert_eq!(watcher.changed_keys(), vec![TASKS_KEY.to_string()]);
        assert!(watcher.changed_keys().is_empty());
        // Own writes are not reported back.
        assert!(writer.changed_keys().is_empty());
    }

    #[test]
    fn test_file_set_replaces_without_leftovers() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path()).unwrap();
        let watcher = FileStorage::new(temp.path()).unwrap();

        storage.set(TASKS_KEY, "[1]").unwrap();
        storage.set(TASKS_KEY, "[]").unwrap();

        assert_eq!(storage.get(TASKS_KEY).unwrap().as_deref(), Some("[]"));
        assert!(!temp.path().join("tasks.json.tmp").exists());
        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["tasks.json".to_string()]);
        assert_eq!(watcher.changed_keys(), vec![TASKS_KEY.to_string()]);
    }

    #[tokio::test]
    async fn test_file_watch_announces_external_write() {
        let temp = tempdir().unwrap();
        let watcher = Arc::new(FileStorage::new(temp.path()).unwrap());
        let writer = FileStorage::new(temp.path()).unwrap();
        let mut rx = watcher.subscribe();
        let handle = watcher.watch(Duration::from_millis(10));

        writer.set(TASKS_KEY, "[]").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.key, TASKS_KEY);
        handle.abort();
    }
}
