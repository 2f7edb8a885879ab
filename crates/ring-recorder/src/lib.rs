//! Video Ring-Buffer Recorder
//!
//! Keeps a rolling window of the most recent video available at all times:
//! a continuous loop records fixed-length segments into a bounded FIFO ring,
//! independent of any incident state. Snapshots pin their segments so
//! eviction can never invalidate evidence that is still uploading.

pub mod buffer;
pub mod recorder;

pub use buffer::SegmentRing;
pub use recorder::{RecorderConfig, RecorderHandle, RingRecorder};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Recorder error types
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Segment capture failed: {0}")]
    Capture(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Opaque handle to a captured segment's backing storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentHandle {
    pub id: Uuid,
    /// Backend-specific locator (file path, asset id, ...)
    pub uri: String,
}

/// One fixed-length recorded segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSegment {
    pub handle: SegmentHandle,
    /// Capture start time (epoch milliseconds)
    pub timestamp_ms: u64,
    pub duration_secs: u32,
}

/// Camera/microphone capture seam.
///
/// One call records one fixed-length segment and returns its handle.
#[async_trait]
pub trait SegmentCapture: Send + Sync + 'static {
    async fn record_segment(&self, duration: Duration) -> Result<SegmentHandle, RecorderError>;

    /// Release a segment's backing storage. Best-effort; failures are the
    /// backend's to log.
    async fn release(&self, handle: &SegmentHandle);
}
