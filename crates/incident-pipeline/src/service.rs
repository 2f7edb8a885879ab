//! Safety service wiring

use crate::{
    IncidentBackend, IncidentReport, LocationProvider, PipelineError, SyncPayload,
};
use escalation::{
    EscalationConfig, EscalationMachine, EscalationOutcome, EscalationState, HapticFeedback,
};
use evidence::{EvidencePipeline, EvidenceUploader, RecordingStore, TriggerType, UploadOutcome};
use fall_detection::{
    Accelerometer, DetectionConfig, FallDetector, GForceSample, MotionMonitor,
};
use offline_store::{
    OfflineQueue, QueueSubmitter, SubmitError, SyncCoordinator, SyncReport,
};
use async_trait::async_trait;
use ring_recorder::{RecorderConfig, RecorderHandle, RingRecorder, SegmentCapture, SegmentRing};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Worker this device is assigned to
    pub user_id: String,
    /// Directory for the durable queue and recordings metadata
    pub data_dir: PathBuf,
    pub detection: DetectionConfig,
    pub escalation: EscalationConfig,
    pub recorder: RecorderConfig,
}

impl ServiceConfig {
    pub fn new(user_id: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_id: user_id.into(),
            data_dir: data_dir.into(),
            detection: DetectionConfig::default(),
            escalation: EscalationConfig::default(),
            recorder: RecorderConfig::default(),
        }
    }
}

/// The assembled safety subsystem.
///
/// Three independent loops run for the service's lifetime: sampling ->
/// detection, the recorder's segment rotation, and (while a fall is under
/// escalation) the countdown. Network work always happens on its own tasks;
/// nothing on the detection path waits for I/O.
pub struct SafetyService {
    machine: Arc<EscalationMachine>,
    queue: Arc<OfflineQueue<SyncPayload>>,
    coordinator: SyncCoordinator<SyncPayload>,
    recorder: RecorderHandle,
    ring: Arc<SegmentRing>,
    stop: Arc<Notify>,
}

impl SafetyService {
    /// Construct and start the subsystem.
    ///
    /// Fails fast if the accelerometer is unavailable or the durable stores
    /// cannot be opened.
    #[allow(clippy::too_many_arguments)]
    pub fn start<A: Accelerometer>(
        config: ServiceConfig,
        accelerometer: A,
        capture: Arc<dyn SegmentCapture>,
        uploader: Arc<dyn EvidenceUploader>,
        backend: Arc<dyn IncidentBackend>,
        location: Arc<dyn LocationProvider>,
        haptics: Arc<dyn HapticFeedback>,
    ) -> Result<Self, PipelineError> {
        // Fail-fast pieces first: sensor probe and durable stores.
        let monitor = MotionMonitor::start(accelerometer, config.detection.clone())?;
        let store = Arc::new(RecordingStore::open(config.data_dir.join("recordings.json"))?);
        let queue: Arc<OfflineQueue<SyncPayload>> =
            Arc::new(OfflineQueue::open(config.data_dir.join("offline-queue.json"))?);

        let ring = Arc::new(SegmentRing::new(config.recorder.max_segments()));
        let recorder = RingRecorder::spawn(capture.clone(), ring.clone(), config.recorder.clone());

        let (machine, outcome_rx) = EscalationMachine::new(config.escalation.clone(), haptics);
        let machine = Arc::new(machine);

        let (pipeline, upload_rx) =
            EvidencePipeline::new(ring.clone(), capture, store, uploader);
        let pipeline = Arc::new(pipeline);

        let submitter = Arc::new(PayloadSubmitter {
            backend: backend.clone(),
            pipeline: pipeline.clone(),
        });
        let coordinator = SyncCoordinator::new(queue.clone(), submitter);

        let detector = Arc::new(Mutex::new(FallDetector::new(config.detection.clone())));
        let last_sample: Arc<Mutex<Option<GForceSample>>> = Arc::new(Mutex::new(None));
        let stop = Arc::new(Notify::new());

        Self::spawn_detection_loop(
            monitor,
            detector.clone(),
            machine.clone(),
            location,
            last_sample.clone(),
            stop.clone(),
        );
        Self::spawn_outcome_loop(
            outcome_rx,
            detector,
            pipeline,
            backend,
            queue.clone(),
            last_sample,
            config.user_id.clone(),
        );
        Self::spawn_upload_watcher(upload_rx, queue.clone());

        info!(user_id = %config.user_id, "safety service started");
        Ok(Self {
            machine,
            queue,
            coordinator,
            recorder,
            ring,
            stop,
        })
    }

    /// Sampling -> classification. Never blocks on network I/O.
    fn spawn_detection_loop(
        mut monitor: MotionMonitor,
        detector: Arc<Mutex<FallDetector>>,
        machine: Arc<EscalationMachine>,
        location: Arc<dyn LocationProvider>,
        last_sample: Arc<Mutex<Option<GForceSample>>>,
        stop: Arc<Notify>,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    sample = monitor.next() => {
                        let Some(sample) = sample else { break };
                        *last_sample.lock().expect("sample slot poisoned") = Some(sample);

                        let event = detector.lock().expect("detector poisoned").process(&sample);
                        let Some(event) = event else { continue };

                        if let Err(e) = machine.on_fall_detected(event) {
                            warn!("fall not escalated: {}", e);
                            detector.lock().expect("detector poisoned").close_event();
                            continue;
                        }

                        // Best-effort geotag, off the detection path.
                        let machine = machine.clone();
                        let location = location.clone();
                        tokio::spawn(async move {
                            if let Some(point) = location.current().await {
                                machine.set_location(point.latitude, point.longitude);
                            } else {
                                debug!("no location available for fall event");
                            }
                        });
                    }
                }
            }
            monitor.stop();
            info!("detection loop stopped");
        });
    }

    /// Resolves escalation outcomes into reports and evidence.
    fn spawn_outcome_loop(
        mut outcome_rx: tokio::sync::mpsc::UnboundedReceiver<EscalationOutcome>,
        detector: Arc<Mutex<FallDetector>>,
        pipeline: Arc<EvidencePipeline>,
        backend: Arc<dyn IncidentBackend>,
        queue: Arc<OfflineQueue<SyncPayload>>,
        last_sample: Arc<Mutex<Option<GForceSample>>>,
        user_id: String,
    ) {
        tokio::spawn(async move {
            while let Some(outcome) = outcome_rx.recv().await {
                match outcome {
                    EscalationOutcome::Triggered(event) => {
                        // Snapshot before any network await: the ring keeps
                        // rotating, and a stalled backend must not evict the
                        // fall footage out of the window.
                        match pipeline.finalize(TriggerType::ManDown, event.timestamp_ms) {
                            Ok(recording) => {
                                info!(recording = %recording.id, "evidence finalized for incident")
                            }
                            Err(e) => warn!("evidence finalization failed: {}", e),
                        }

                        let report = {
                            let sample = last_sample.lock().expect("sample slot poisoned");
                            IncidentReport::from_event(&user_id, &event, sample.as_ref())
                        };

                        if let Err(e) = backend.submit_report(&report).await {
                            warn!("man-down report failed: {}; queued for sync", e);
                            queue.enqueue(SyncPayload::Report(report));
                        } else {
                            info!("man-down report submitted");
                        }

                        detector.lock().expect("detector poisoned").close_event();
                    }
                    EscalationOutcome::Cancelled(event) => {
                        // False alarm: best-effort, never blocks the outcome
                        // loop and never queues.
                        let report = {
                            let sample = last_sample.lock().expect("sample slot poisoned");
                            IncidentReport::from_event(&user_id, &event, sample.as_ref())
                        };
                        let backend = backend.clone();
                        tokio::spawn(async move {
                            if let Err(e) = backend.submit_report(&report).await {
                                debug!("false-alarm report dropped: {}", e);
                            }
                        });

                        detector.lock().expect("detector poisoned").close_event();
                    }
                }
            }
        });
    }

    /// Feeds failed uploads into the offline queue so no attempt is lost.
    fn spawn_upload_watcher(
        mut upload_rx: tokio::sync::mpsc::UnboundedReceiver<UploadOutcome>,
        queue: Arc<OfflineQueue<SyncPayload>>,
    ) {
        tokio::spawn(async move {
            while let Some(outcome) = upload_rx.recv().await {
                match outcome {
                    UploadOutcome::Uploaded(recording) => {
                        debug!(recording = %recording.id, "upload confirmed");
                    }
                    UploadOutcome::Failed(recording) => {
                        queue.enqueue(SyncPayload::Recording(recording));
                    }
                }
            }
        });
    }

    /// Worker pressed "I'm fine"
    pub fn cancel_escalation(&self) -> Result<(), escalation::EscalationError> {
        self.machine.cancel()
    }

    pub fn escalation_state(&self) -> EscalationState {
        self.machine.state()
    }

    /// Drain the offline queue (call when connectivity returns)
    pub async fn sync(&self) -> SyncReport {
        self.coordinator.sync().await
    }

    pub fn queued_items(&self) -> usize {
        self.queue.len()
    }

    pub fn buffered_segments(&self) -> usize {
        self.ring.len()
    }

    /// Stop the sampling and recording loops
    pub fn stop(&self) {
        self.stop.notify_one();
        self.recorder.stop();
        info!("safety service stopping");
    }
}

/// Dispatches queued payloads to their respective backends
struct PayloadSubmitter {
    backend: Arc<dyn IncidentBackend>,
    pipeline: Arc<EvidencePipeline>,
}

#[async_trait]
impl QueueSubmitter<SyncPayload> for PayloadSubmitter {
    async fn submit(&self, payload: &SyncPayload) -> Result<(), SubmitError> {
        match payload {
            SyncPayload::Report(report) => self
                .backend
                .submit_report(report)
                .await
                .map_err(|e| SubmitError::Network(e.to_string())),
            SyncPayload::Recording(recording) => self
                .pipeline
                .retry_upload(recording)
                .await
                .map_err(|e| SubmitError::Network(e.to_string())),
        }
    }
}
