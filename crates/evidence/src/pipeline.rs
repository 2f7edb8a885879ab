//! Finalization and upload pipeline

use crate::{EvidenceError, EvidenceRecording, EvidenceUploader, RecordingStore, TriggerType, UploadState};
use ring_recorder::{SegmentCapture, SegmentRing};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Completion event of a tracked upload task
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Uploaded(EvidenceRecording),
    /// Upload failed; the recording belongs in the offline queue now
    Failed(EvidenceRecording),
}

/// Turns the rolling buffer into immutable, durably-tracked evidence.
///
/// Finalization is a point-in-time copy, decoupled from both the countdown
/// and the recorder loop. Uploads are tracked tasks: every attempt ends in
/// an [`UploadOutcome`] on the pipeline's channel, never silently lost.
pub struct EvidencePipeline {
    ring: Arc<SegmentRing>,
    capture: Arc<dyn SegmentCapture>,
    store: Arc<RecordingStore>,
    uploader: Arc<dyn EvidenceUploader>,
    outcome_tx: mpsc::UnboundedSender<UploadOutcome>,
}

impl EvidencePipeline {
    pub fn new(
        ring: Arc<SegmentRing>,
        capture: Arc<dyn SegmentCapture>,
        store: Arc<RecordingStore>,
        uploader: Arc<dyn EvidenceUploader>,
    ) -> (Self, mpsc::UnboundedReceiver<UploadOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                ring,
                capture,
                store,
                uploader,
                outcome_tx: tx,
            },
            rx,
        )
    }

    /// Snapshot the buffer, persist the recording, and start its upload.
    ///
    /// The returned recording is already durable (write-ahead) when this
    /// returns; the upload continues on its own task.
    pub fn finalize(
        &self,
        trigger_type: TriggerType,
        trigger_timestamp_ms: u64,
    ) -> Result<EvidenceRecording, EvidenceError> {
        let segments = self.ring.snapshot();
        if segments.is_empty() {
            return Err(EvidenceError::NoFootage);
        }

        let recording = EvidenceRecording::new(trigger_type, trigger_timestamp_ms, segments);
        info!(
            recording = %recording.id,
            segments = recording.segments.len(),
            duration_secs = recording.duration_secs(),
            "evidence finalized"
        );

        // Write-ahead: durable before any network attempt. A failing local
        // disk degrades durability but must not stop the incident path.
        if let Err(e) = self.store.upsert(&recording) {
            error!(recording = %recording.id, "write-ahead persist failed: {}", e);
        }

        self.spawn_upload(recording.clone());
        Ok(recording)
    }

    /// Retry the upload of a previously failed recording (offline-sync path).
    pub async fn retry_upload(&self, recording: &EvidenceRecording) -> Result<(), EvidenceError> {
        let url = self.uploader.upload(recording).await?;
        self.mark_uploaded(recording.clone(), url);
        Ok(())
    }

    fn spawn_upload(&self, mut recording: EvidenceRecording) {
        let store = self.store.clone();
        let uploader = self.uploader.clone();
        let ring = self.ring.clone();
        let capture = self.capture.clone();
        let outcome_tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            recording.upload_state = UploadState::Uploading;
            if let Err(e) = store.upsert(&recording) {
                warn!(recording = %recording.id, "state persist failed: {}", e);
            }

            match uploader.upload(&recording).await {
                Ok(url) => {
                    recording.upload_state = UploadState::Uploaded;
                    recording.remote_url = Some(url);
                    if let Err(e) = store.upsert(&recording) {
                        warn!(recording = %recording.id, "state persist failed: {}", e);
                    }
                    info!(recording = %recording.id, "evidence uploaded");

                    for segment in ring.unpin(&recording.segments) {
                        capture.release(&segment.handle).await;
                    }
                    let _ = outcome_tx.send(UploadOutcome::Uploaded(recording));
                }
                Err(e) => {
                    warn!(recording = %recording.id, "evidence upload failed: {}", e);
                    recording.upload_state = UploadState::Failed;
                    if let Err(e) = store.upsert(&recording) {
                        warn!(recording = %recording.id, "state persist failed: {}", e);
                    }
                    // Pins stay in place: the footage must survive until the
                    // offline queue delivers it.
                    let _ = outcome_tx.send(UploadOutcome::Failed(recording));
                }
            }
        });
    }

    /// Record a confirmed upload and release the recording's pinned storage.
    pub fn mark_uploaded(&self, mut recording: EvidenceRecording, remote_url: String) {
        recording.upload_state = UploadState::Uploaded;
        recording.remote_url = Some(remote_url);
        if let Err(e) = self.store.upsert(&recording) {
            warn!(recording = %recording.id, "state persist failed: {}", e);
        }

        let ring = self.ring.clone();
        let capture = self.capture.clone();
        let segments = recording.segments;
        tokio::spawn(async move {
            for segment in ring.unpin(&segments) {
                capture.release(&segment.handle).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ring_recorder::{RecorderError, SegmentHandle, VideoSegment};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    struct NullCapture {
        released: Mutex<Vec<SegmentHandle>>,
    }

    impl NullCapture {
        fn new() -> Self {
            Self { released: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl SegmentCapture for NullCapture {
        async fn record_segment(&self, _: Duration) -> Result<SegmentHandle, RecorderError> {
            Ok(SegmentHandle { id: Uuid::new_v4(), uri: "unused".into() })
        }

        async fn release(&self, handle: &SegmentHandle) {
            self.released.lock().unwrap().push(handle.clone());
        }
    }

    /// Uploader that asserts the write-ahead record exists before uploading
    struct CheckingUploader {
        store: Arc<RecordingStore>,
        fail: AtomicBool,
        saw_durable_record: AtomicBool,
    }

    #[async_trait]
    impl EvidenceUploader for CheckingUploader {
        async fn upload(&self, recording: &EvidenceRecording) -> Result<String, EvidenceError> {
            if self.store.get(recording.id).is_some() {
                self.saw_durable_record.store(true, Ordering::SeqCst);
            }
            if self.fail.load(Ordering::SeqCst) {
                Err(EvidenceError::Upload("503".into()))
            } else {
                Ok(format!("https://cdn.example/{}.mp4", recording.id))
            }
        }
    }

    fn segment(n: u64) -> VideoSegment {
        VideoSegment {
            handle: SegmentHandle { id: Uuid::new_v4(), uri: format!("seg-{n}") },
            timestamp_ms: n * 5_000,
            duration_secs: 5,
        }
    }

    fn pipeline(
        dir: &tempfile::TempDir,
        ring: Arc<SegmentRing>,
        capture: Arc<NullCapture>,
        fail_upload: bool,
    ) -> (EvidencePipeline, mpsc::UnboundedReceiver<UploadOutcome>, Arc<RecordingStore>) {
        let store =
            Arc::new(RecordingStore::open(dir.path().join("recordings.json")).unwrap());
        let uploader = Arc::new(CheckingUploader {
            store: store.clone(),
            fail: AtomicBool::new(fail_upload),
            saw_durable_record: AtomicBool::new(false),
        });
        let (pipeline, outcomes) = EvidencePipeline::new(ring, capture, store.clone(), uploader);
        (pipeline, outcomes, store)
    }

    #[tokio::test]
    async fn empty_buffer_yields_no_footage() {
        let dir = tempfile::tempdir().unwrap();
        let ring = Arc::new(SegmentRing::new(6));
        let (pipeline, _outcomes, _store) =
            pipeline(&dir, ring, Arc::new(NullCapture::new()), false);

        assert!(matches!(
            pipeline.finalize(TriggerType::ManDown, 0),
            Err(EvidenceError::NoFootage)
        ));
    }

    #[tokio::test]
    async fn successful_upload_persists_url_and_unpins() {
        let dir = tempfile::tempdir().unwrap();
        let ring = Arc::new(SegmentRing::new(2));
        ring.push(segment(0));
        ring.push(segment(1));
        let capture = Arc::new(NullCapture::new());
        let (pipeline, mut outcomes, store) = pipeline(&dir, ring.clone(), capture.clone(), false);

        let recording = pipeline.finalize(TriggerType::ManDown, 10_000).unwrap();
        assert_eq!(recording.segments.len(), 2);

        let uploaded = match outcomes.recv().await.unwrap() {
            UploadOutcome::Uploaded(r) => r,
            other => panic!("expected upload success, got {:?}", other),
        };
        assert_eq!(uploaded.upload_state, UploadState::Uploaded);
        assert!(uploaded.remote_url.as_deref().unwrap().starts_with("https://"));
        assert_eq!(store.get(recording.id).unwrap().upload_state, UploadState::Uploaded);

        // Snapshot pins dropped: rotation can now evict and release freely
        ring.push(segment(2));
        ring.push(segment(3));
        ring.push(segment(4));
        assert_eq!(ring.parked_count(), 0);
    }

    #[tokio::test]
    async fn failed_upload_keeps_pins_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ring = Arc::new(SegmentRing::new(2));
        ring.push(segment(0));
        ring.push(segment(1));
        let capture = Arc::new(NullCapture::new());
        let (pipeline, mut outcomes, store) = pipeline(&dir, ring.clone(), capture.clone(), true);

        let recording = pipeline.finalize(TriggerType::ManDown, 10_000).unwrap();

        let failed = match outcomes.recv().await.unwrap() {
            UploadOutcome::Failed(r) => r,
            other => panic!("expected upload failure, got {:?}", other),
        };
        assert_eq!(failed.upload_state, UploadState::Failed);
        assert_eq!(store.get(recording.id).unwrap().upload_state, UploadState::Failed);

        // Rotate past a full window: the snapshot's footage must stay parked
        ring.push(segment(2));
        ring.push(segment(3));
        assert_eq!(ring.parked_count(), 2);
        assert!(capture.released.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_ahead_happens_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let ring = Arc::new(SegmentRing::new(2));
        ring.push(segment(0));
        let store =
            Arc::new(RecordingStore::open(dir.path().join("recordings.json")).unwrap());
        let uploader = Arc::new(CheckingUploader {
            store: store.clone(),
            fail: AtomicBool::new(false),
            saw_durable_record: AtomicBool::new(false),
        });
        let (pipeline, mut outcomes) = EvidencePipeline::new(
            ring,
            Arc::new(NullCapture::new()),
            store,
            uploader.clone(),
        );

        pipeline.finalize(TriggerType::Incident, 0).unwrap();
        outcomes.recv().await.unwrap();
        assert!(uploader.saw_durable_record.load(Ordering::SeqCst));
    }
}
