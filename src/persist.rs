// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local key/value persistence for session state.
//!
//! Values are JSON strings keyed by name. Writes are fire-and-forget and
//! reads fall back to a default when a value is absent or malformed.
//! Changes made by another process are broadcast as [`StorageEvent`]s.

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::errors::PersistError;

pub mod keys {
    pub const SEARCH_TERM: &str = "dashboard_search_term";
    pub const CURRENT_PAGE: &str = "dashboard_current_page";
    /// Reserved for presentation layers.
    pub const THEME: &str = "dashboard_theme";
}

const EVENT_CAPACITY: usize = 64;
const OWN_WRITE_HISTORY: usize = 16;

/// A key changed outside this session. `None` means it was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
}

pub trait LocalStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<String>;

    /// Must not block on I/O.
    fn set_raw(&self, key: &str, value: String);

    fn remove(&self, key: &str);

    fn clear(&self);

    /// External change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

pub fn parse_value<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, PersistError> {
    serde_json::from_str(raw).map_err(|error| PersistError::Parse {
        key: key.to_string(),
        message: error.to_string(),
    })
}

/// Stored value for `key`, or `default` when absent or malformed.
pub fn read_or_default<T: DeserializeOwned>(store: &dyn LocalStore, key: &str, default: T) -> T {
    let Some(raw) = store.get_raw(key) else {
        return default;
    };
    match parse_value(key, &raw) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "discarding persisted value");
            default
        }
    }
}

pub fn write_value<T: Serialize>(store: &dyn LocalStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => store.set_raw(key, raw),
        Err(error) => warn!(key, %error, "failed to serialize persisted value"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process store. [`MemoryStore::apply_external`] stands in for a
/// concurrent session writing the same keys.
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            values: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    pub fn apply_external(&self, key: &str, new_value: Option<String>) {
        {
            let mut values = lock(&self.values);
            match &new_value {
                Some(value) => values.insert(key.to_string(), value.clone()),
                None => values.remove(key),
            };
        }
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: String) {
        lock(&self.values).insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        lock(&self.values).remove(key);
    }

    fn clear(&self) {
        lock(&self.values).clear();
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

enum WriterCommand {
    /// Write the current map; the payload is the change sequence it covers.
    Write(u64),
    Flush(mpsc::Sender<()>),
}

/// Keys changed locally whose write has not reached disk yet.
#[derive(Default)]
struct Pending {
    seq: u64,
    keys: BTreeMap<String, u64>,
}

struct FileInner {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
    /// Always locked after `values`.
    pending: Mutex<Pending>,
    writer: Mutex<mpsc::Sender<WriterCommand>>,
    /// Hashes of contents this process wrote, so its own writes are not
    /// mistaken for external edits.
    own_writes: Mutex<VecDeque<blake3::Hash>>,
    events: broadcast::Sender<StorageEvent>,
}

impl FileInner {
    fn persist(&self, seq: u64) {
        if lock(&self.writer).send(WriterCommand::Write(seq)).is_err() {
            warn!(path = %self.path.display(), "state writer stopped; change not persisted");
        }
    }

    fn remember_write(&self, bytes: &[u8]) {
        let mut own = lock(&self.own_writes);
        own.push_back(blake3::hash(bytes));
        while own.len() > OWN_WRITE_HISTORY {
            own.pop_front();
        }
    }

    fn reload(&self) -> Vec<StorageEvent> {
        let Ok(bytes) = std::fs::read(&self.path) else {
            return Vec::new();
        };
        if lock(&self.own_writes).contains(&blake3::hash(&bytes)) {
            return Vec::new();
        }
        let Some(next) = parse_state(&self.path, &bytes) else {
            return Vec::new();
        };

        let mut values = lock(&self.values);
        let pending = lock(&self.pending);
        let mut events = Vec::new();
        for (key, value) in &next {
            if !pending.keys.contains_key(key) && values.get(key) != Some(value) {
                events.push(StorageEvent {
                    key: key.clone(),
                    new_value: Some(value.clone()),
                });
            }
        }
        for key in values.keys() {
            if !pending.keys.contains_key(key) && !next.contains_key(key) {
                events.push(StorageEvent {
                    key: key.clone(),
                    new_value: None,
                });
            }
        }
        // Unwritten local changes win over the file.
        for event in &events {
            match &event.new_value {
                Some(value) => values.insert(event.key.clone(), value.clone()),
                None => values.remove(&event.key),
            };
        }
        drop(pending);
        drop(values);

        for event in &events {
            debug!(key = %event.key, "external state change");
            let _ = self.events.send(event.clone());
        }
        events
    }
}

fn parse_state(path: &Path, bytes: &[u8]) -> Option<BTreeMap<String, String>> {
    match serde_json::from_slice(bytes) {
        Ok(map) => Some(map),
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring malformed state file");
            None
        }
    }
}

/// JSON-object file store.
///
/// Writes go to a background thread that replaces the file atomically, so
/// `set_raw` only touches memory.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<FileInner>,
}

/// Keeps the external-change watcher alive; dropping it stops watching.
pub struct ExternalWatch {
    _watcher: RecommendedWatcher,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let (store, rx) = Self::detached(path.into())?;
        let writer_inner = Arc::downgrade(&store.inner);
        std::thread::Builder::new()
            .name("udash-state-writer".to_string())
            .spawn(move || run_writer(rx, writer_inner))?;
        Ok(store)
    }

    /// Store whose writer commands are left in the returned channel.
    fn detached(path: PathBuf) -> Result<(Self, mpsc::Receiver<WriterCommand>), PersistError> {
        let values = match std::fs::read(&path) {
            Ok(bytes) => parse_state(&path, &bytes).unwrap_or_default(),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };

        let (tx, rx) = mpsc::channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(FileInner {
            path,
            values: Mutex::new(values),
            pending: Mutex::new(Pending::default()),
            writer: Mutex::new(tx),
            own_writes: Mutex::new(VecDeque::new()),
            events,
        });
        Ok((Self { inner }, rx))
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Block until every queued write has reached disk.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        let sent = lock(&self.inner.writer)
            .send(WriterCommand::Flush(ack_tx))
            .is_ok();
        if sent {
            let _ = ack_rx.recv();
        }
    }

    /// Re-read the file and broadcast any keys another process changed.
    pub fn reload(&self) -> Vec<StorageEvent> {
        self.inner.reload()
    }

    /// Watch the state file for edits by other processes.
    pub fn watch_external(&self) -> Result<ExternalWatch, PersistError> {
        let inner = Arc::clone(&self.inner);
        let target = self.inner.path.file_name().map(ToOwned::to_owned);
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    let touches_state = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().is_some() && p.file_name() == target.as_deref());
                    if touches_state && (event.kind.is_modify() || event.kind.is_create()) {
                        inner.reload();
                    }
                }
                Err(error) => warn!(%error, "state watch error"),
            })?;

        let dir = match self.inner.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(ExternalWatch { _watcher: watcher })
    }

    /// Apply a local change; `apply` returns the keys it touched.
    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>) -> Vec<String>) {
        let seq = {
            let mut values = lock(&self.inner.values);
            let touched = apply(&mut values);
            let mut pending = lock(&self.inner.pending);
            pending.seq += 1;
            let seq = pending.seq;
            pending.keys.extend(touched.into_iter().map(|key| (key, seq)));
            seq
        };
        self.inner.persist(seq);
    }
}

impl LocalStore for FileStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        lock(&self.inner.values).get(key).cloned()
    }

    fn set_raw(&self, key: &str, value: String) {
        self.update(|values| {
            values.insert(key.to_string(), value);
            vec![key.to_string()]
        });
    }

    fn remove(&self, key: &str) {
        self.update(|values| {
            values.remove(key);
            vec![key.to_string()]
        });
    }

    fn clear(&self) {
        self.update(|values| std::mem::take(values).into_keys().collect());
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.events.subscribe()
    }
}

fn run_writer(rx: mpsc::Receiver<WriterCommand>, inner: std::sync::Weak<FileInner>) {
    while let Ok(command) = rx.recv() {
        let mut latest = None;
        let mut acks = Vec::new();
        let mut next = Some(command);
        // Coalesce whatever is queued into one write.
        while let Some(command) = next {
            match command {
                WriterCommand::Write(seq) => latest = latest.max(Some(seq)),
                WriterCommand::Flush(ack) => acks.push(ack),
            }
            next = rx.try_recv().ok();
        }

        if let Some(seq) = latest {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if let Err(error) = write_current(&inner, seq) {
                warn!(path = %inner.path.display(), %error, "failed to persist state");
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
}

/// Write the map as it is now, then release the keys changed up to `seq`.
fn write_current(inner: &FileInner, seq: u64) -> std::io::Result<()> {
    let bytes = serde_json::to_vec_pretty(&*lock(&inner.values))?;
    inner.remember_write(&bytes);
    atomic_write_bytes(&inner.path, &bytes)?;
    lock(&inner.pending).keys.retain(|_, changed| *changed > seq);
    Ok(())
}

fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("udash"),
        std::process::id(),
        nonce
    );
    let tmp_path = parent.join(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)
}
