//! History of generated artifacts, persisted through a [`Storage`].
//!
//! Every mutation updates the in-memory cache, writes the whole collection
//! back under one key, and broadcasts a [`HistoryChanged`] notification. The
//! notification carries no diff: subscribers re-read with [`HistoryStore::list`].
//!
//! Storage failures never reach callers. Unreadable or corrupt data reads as
//! an empty history on first use, while a failed re-read keeps whatever is
//! cached. Failed writes are logged and the cache keeps the change for the
//! rest of the process.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::core::artifact::{Artifact, HistoryEntry};
use crate::io::storage::{MemoryStorage, Storage, StorageError};

/// Default storage key for the serialized history.
pub const HISTORY_KEY: &str = "commentHistory";

const EVENT_CAPACITY: usize = 64;

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A mutation made through this store instance.
    Local,
    /// Another writer changed the backing storage.
    External,
}

/// Notification that the history changed and should be re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryChanged {
    pub origin: ChangeOrigin,
}

/// Newest-first history of artifacts, shared by every view of a context.
pub struct HistoryStore {
    storage: Arc<dyn Storage>,
    key: String,
    /// `None` until the first read; storage is consulted lazily.
    cache: Mutex<Option<Vec<HistoryEntry>>>,
    events: broadcast::Sender<HistoryChanged>,
}

impl HistoryStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_key(storage, HISTORY_KEY)
    }

    pub fn with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            key: key.into(),
            cache: Mutex::new(None),
            events,
        }
    }

    /// A store over fresh process-scoped storage.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Receive a notification after every change, local or external.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryChanged> {
        self.events.subscribe()
    }

    /// All entries, newest first. Empty (not an error) when nothing is stored.
    pub fn list(&self) -> Vec<HistoryEntry> {
        let mut cache = self.lock();
        self.entries(&mut cache).clone()
    }

    pub fn len(&self) -> usize {
        let mut cache = self.lock();
        self.entries(&mut cache).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `artifact` at the front and persist.
    ///
    /// An existing entry with the same id is replaced, so ids stay unique.
    pub fn append(&self, artifact: Artifact) -> HistoryEntry {
        let entry = HistoryEntry::new(artifact);
        {
            let mut cache = self.lock();
            let entries = self.entries(&mut cache);
            entries.retain(|existing| existing.id() != entry.id());
            entries.insert(0, entry.clone());
            self.persist(entries);
            debug!(id = entry.id(), total = entries.len(), "history entry appended");
        }
        self.notify(ChangeOrigin::Local);
        entry
    }

    /// Delete the entry with `id`. Returns `false` (and writes nothing) if absent.
    pub fn remove(&self, id: &str) -> bool {
        {
            let mut cache = self.lock();
            let entries = self.entries(&mut cache);
            let before = entries.len();
            entries.retain(|entry| entry.id() != id);
            if entries.len() == before {
                debug!(id, "history entry not found; nothing removed");
                return false;
            }
            self.persist(entries);
            debug!(id, total = entries.len(), "history entry removed");
        }
        self.notify(ChangeOrigin::Local);
        true
    }

    /// Remove every entry and the storage key itself.
    pub fn clear(&self) {
        {
            let mut cache = self.lock();
            *cache = Some(Vec::new());
            if let Err(err) = self.storage.remove(&self.key) {
                warn!(key = %self.key, error = %err, "failed to clear history storage");
            }
        }
        info!(key = %self.key, "history cleared");
        self.notify(ChangeOrigin::Local);
    }

    /// Look up the artifact for `id` without changing anything.
    pub fn restore(&self, id: &str) -> Option<Artifact> {
        let mut cache = self.lock();
        self.entries(&mut cache)
            .iter()
            .find(|entry| entry.id() == id)
            .map(|entry| entry.artifact.clone())
    }

    /// Re-read storage after another writer touched it.
    ///
    /// Broadcasts an `External` change only when the stored history differs
    /// from what this store last saw. Returns whether it did. A failed read
    /// keeps the cache as it is.
    pub fn reload(&self) -> bool {
        let fresh = match self.try_read_storage() {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!(key = %self.key, error = %err, "history reload failed; keeping cache");
                return false;
            }
        };
        {
            let mut cache = self.lock();
            match cache.as_ref() {
                // Nothing observed yet, so there is no earlier state to differ from.
                None => {
                    *cache = Some(fresh);
                    return false;
                }
                Some(current) if *current == fresh => return false,
                Some(_) => {}
            }
            debug!(total = fresh.len(), "history reloaded from storage");
            *cache = Some(fresh);
        }
        self.notify(ChangeOrigin::External);
        true
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<HistoryEntry>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries<'a>(
        &self,
        cache: &'a mut Option<Vec<HistoryEntry>>,
    ) -> &'a mut Vec<HistoryEntry> {
        cache.get_or_insert_with(|| {
            self.try_read_storage().unwrap_or_else(|err| {
                warn!(key = %self.key, error = %err, "failed to read history; treating as empty");
                Vec::new()
            })
        })
    }

    /// Stored entries. Missing or corrupt data is an empty history; only a
    /// failed read is an error.
    fn try_read_storage(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(key = %self.key, error = %err, "stored history is corrupt; treating as empty");
            Vec::new()
        }))
    }

    fn persist(&self, entries: &[HistoryEntry]) {
        let raw = match serde_json::to_string(entries) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "failed to serialize history");
                return;
            }
        };
        if let Err(err) = self.storage.set(&self.key, &raw) {
            warn!(key = %self.key, error = %err, "failed to persist history; kept in memory");
        }
    }

    fn notify(&self, origin: ChangeOrigin) {
        // No subscribers is fine.
        let _ = self.events.send(HistoryChanged { origin });
    }
}
