//! Offline Durability & Sync
//!
//! Restart-surviving persistence for undelivered incident data:
//! - A durable JSON record log (shared primitive, also used by the
//!   recordings-metadata store)
//! - The offline queue of unacknowledged payloads
//! - A sequential, idempotent sync coordinator with per-item failure
//!   isolation

pub mod log;
pub mod queue;
pub mod sync;

pub use log::JsonStore;
pub use queue::{EntryStatus, OfflineQueue, OfflineQueueEntry};
pub use sync::{QueueSubmitter, SubmitError, SyncCoordinator, SyncReport};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
