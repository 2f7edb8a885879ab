//! Evidence Finalization & Upload
//!
//! On trigger, freezes a point-in-time copy of the rolling video window into
//! an immutable recording, persists its metadata before any network call,
//! and ships it as a tracked upload whose failure feeds the offline queue.

pub mod pipeline;
pub mod recording;
pub mod store;

pub use pipeline::{EvidencePipeline, UploadOutcome};
pub use recording::{EvidenceRecording, TriggerType, UploadState};
pub use store::RecordingStore;

use async_trait::async_trait;
use offline_store::StoreError;
use thiserror::Error;

/// Evidence error types
#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("No footage in the buffer to finalize")]
    NoFootage,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Upload failed: {0}")]
    Upload(String),
}

/// Object-storage seam.
///
/// Uploads the recording's full snapshot set as one clip and returns the
/// durable download URL.
#[async_trait]
pub trait EvidenceUploader: Send + Sync {
    async fn upload(&self, recording: &EvidenceRecording) -> Result<String, EvidenceError>;
}
