//! Evidence recording record

use ring_recorder::VideoSegment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What caused the recording to be finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Automatic man-down escalation
    ManDown,
    /// Explicit capture request by the worker
    Manual,
    /// Other incident pathway (e.g. supervisor request)
    Incident,
}

/// Upload lifecycle of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

/// An immutable evidence clip.
///
/// The segment list is copied out of the ring at trigger time and never
/// changes afterwards; the referenced storage stays pinned until the
/// recording is confirmed uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecording {
    pub id: Uuid,
    pub segments: Vec<VideoSegment>,
    pub trigger_type: TriggerType,
    /// Trigger time (epoch milliseconds)
    pub trigger_timestamp_ms: u64,
    pub upload_state: UploadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

impl EvidenceRecording {
    pub fn new(
        trigger_type: TriggerType,
        trigger_timestamp_ms: u64,
        segments: Vec<VideoSegment>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            segments,
            trigger_type,
            trigger_timestamp_ms,
            upload_state: UploadState::Pending,
            remote_url: None,
        }
    }

    /// Total covered footage in seconds
    pub fn duration_secs(&self) -> u32 {
        self.segments.iter().map(|s| s.duration_secs).sum()
    }
}
