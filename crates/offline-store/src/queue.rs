//! Durable offline queue

use crate::{JsonStore, StoreError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Delivery status of a queued payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Awaiting delivery
    Pending,
    /// Claimed by a running sync pass
    InFlight,
}

/// One undelivered payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineQueueEntry<T> {
    pub id: Uuid,
    pub payload: T,
    pub status: EntryStatus,
    pub enqueued_at: DateTime<Utc>,
}

/// Durable FIFO queue of undelivered payloads.
///
/// Every mutation is persisted, so the queue survives process restart.
/// Entries are removed only on confirmed delivery. A persistence failure is
/// logged and the in-memory state kept; durability degrades, the caller's
/// loop does not.
pub struct OfflineQueue<T> {
    store: JsonStore<OfflineQueueEntry<T>>,
    entries: Mutex<Vec<OfflineQueueEntry<T>>>,
}

impl<T: Serialize + DeserializeOwned + Clone> OfflineQueue<T> {
    /// Open (or create) the queue at the given path.
    ///
    /// Entries left `InFlight` by a crash mid-sync are demoted back to
    /// `Pending` so the next sync retries them.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store: JsonStore<OfflineQueueEntry<T>> = JsonStore::new(path);
        let mut entries = store.load()?;

        let mut recovered = 0;
        for entry in entries.iter_mut().filter(|e| e.status == EntryStatus::InFlight) {
            entry.status = EntryStatus::Pending;
            recovered += 1;
        }
        if recovered > 0 {
            info!(recovered, "recovered in-flight queue entries after restart");
            store.save(&entries)?;
        }

        info!(entries = entries.len(), "offline queue opened");
        Ok(Self {
            store,
            entries: Mutex::new(entries),
        })
    }

    /// Add a payload. Returns the entry id used to guard double-submission.
    pub fn enqueue(&self, payload: T) -> Uuid {
        let entry = OfflineQueueEntry {
            id: Uuid::new_v4(),
            payload,
            status: EntryStatus::Pending,
            enqueued_at: Utc::now(),
        };
        let id = entry.id;

        let mut entries = self.entries.lock().expect("queue poisoned");
        entries.push(entry);
        self.persist(&entries);
        info!(entry = %id, queued = entries.len(), "payload queued for later sync");
        id
    }

    /// Snapshot of the pending entries, oldest first
    pub fn pending(&self) -> Vec<OfflineQueueEntry<T>> {
        self.entries
            .lock()
            .expect("queue poisoned")
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim an entry for submission. Returns false if it is gone or already
    /// claimed by a concurrent sync pass.
    pub(crate) fn claim(&self, id: Uuid) -> bool {
        let mut entries = self.entries.lock().expect("queue poisoned");
        match entries
            .iter_mut()
            .find(|e| e.id == id && e.status == EntryStatus::Pending)
        {
            Some(entry) => {
                entry.status = EntryStatus::InFlight;
                self.persist(&entries);
                true
            }
            None => false,
        }
    }

    /// Remove a delivered entry.
    pub(crate) fn complete(&self, id: Uuid) {
        let mut entries = self.entries.lock().expect("queue poisoned");
        entries.retain(|e| e.id != id);
        self.persist(&entries);
    }

    /// Return a failed entry to the pending pool.
    pub(crate) fn release(&self, id: Uuid) {
        let mut entries = self.entries.lock().expect("queue poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.status = EntryStatus::Pending;
        }
        self.persist(&entries);
    }

    fn persist(&self, entries: &[OfflineQueueEntry<T>]) {
        if let Err(e) = self.store.save(entries) {
            warn!("offline queue persist failed: {}", e);
        }
    }
}
