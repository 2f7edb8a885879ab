//! Recordings-metadata store

use crate::EvidenceRecording;
use offline_store::{JsonStore, StoreError};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Durable store of recording metadata.
///
/// This is the write-ahead side of the upload pipeline: a recording is
/// persisted here before any network attempt, so a crash between finalize
/// and upload cannot lose the incident.
pub struct RecordingStore {
    store: JsonStore<EvidenceRecording>,
    records: Mutex<Vec<EvidenceRecording>>,
}

impl RecordingStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = JsonStore::new(path);
        let records = store.load()?;
        info!(recordings = records.len(), "recording store opened");
        Ok(Self {
            store,
            records: Mutex::new(records),
        })
    }

    /// Insert or replace a recording by id.
    pub fn upsert(&self, recording: &EvidenceRecording) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("recording store poisoned");
        match records.iter_mut().find(|r| r.id == recording.id) {
            Some(existing) => *existing = recording.clone(),
            None => records.push(recording.clone()),
        }
        self.store.save(&records)
    }

    pub fn get(&self, id: Uuid) -> Option<EvidenceRecording> {
        self.records
            .lock()
            .expect("recording store poisoned")
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<EvidenceRecording> {
        self.records.lock().expect("recording store poisoned").clone()
    }
}
