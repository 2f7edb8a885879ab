//! Safety Pipeline - Demo Entry Point
//!
//! Runs the full subsystem against simulated collaborators: a resting
//! accelerometer, an in-memory capture backend, and logging stand-ins for
//! the backend and object storage. Useful as a smoke runner on a dev box.

use async_trait::async_trait;
use escalation::HapticFeedback;
use evidence::{EvidenceError, EvidenceRecording, EvidenceUploader};
use fall_detection::{Accelerometer, DetectionError, SensorSample};
use incident_pipeline::{
    init_logging, BackendError, GeoPoint, IncidentBackend, IncidentReport, LocationProvider,
    SafetyService, ServiceConfig,
};
use ring_recorder::{RecorderError, SegmentCapture, SegmentHandle};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;
use uuid::Uuid;

/// Accelerometer resting at 1 g
struct SimulatedAccelerometer;

impl Accelerometer for SimulatedAccelerometer {
    fn read(&mut self) -> Result<SensorSample, DetectionError> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(SensorSample { x: 0.0, y: 0.0, z: 1.0, timestamp_ms })
    }
}

/// Capture backend that only mints handles
struct SimulatedCapture;

#[async_trait]
impl SegmentCapture for SimulatedCapture {
    async fn record_segment(&self, duration: Duration) -> Result<SegmentHandle, RecorderError> {
        tokio::time::sleep(duration).await;
        let id = Uuid::new_v4();
        Ok(SegmentHandle { id, uri: format!("mem://segments/{id}") })
    }

    async fn release(&self, handle: &SegmentHandle) {
        info!(segment = %handle.id, "segment released");
    }
}

struct LoggingUploader;

#[async_trait]
impl EvidenceUploader for LoggingUploader {
    async fn upload(&self, recording: &EvidenceRecording) -> Result<String, EvidenceError> {
        info!(recording = %recording.id, segments = recording.segments.len(), "uploading evidence");
        Ok(format!("https://storage.example/evidence/{}.mp4", recording.id))
    }
}

struct LoggingBackend;

#[async_trait]
impl IncidentBackend for LoggingBackend {
    async fn submit_report(&self, report: &IncidentReport) -> Result<(), BackendError> {
        info!(user = %report.user_id, g = report.g_force, "incident report submitted");
        Ok(())
    }
}

struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current(&self) -> Option<GeoPoint> {
        None
    }
}

struct LogHaptics;

impl HapticFeedback for LogHaptics {
    fn pulse(&self) {
        info!("haptic pulse");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== Safety Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::new("demo-worker", "./data");
    let service = SafetyService::start(
        config,
        SimulatedAccelerometer,
        Arc::new(SimulatedCapture),
        Arc::new(LoggingUploader),
        Arc::new(LoggingBackend),
        Arc::new(NoLocation),
        Arc::new(LogHaptics),
    )?;

    info!("running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    service.stop();
    info!(
        buffered_segments = service.buffered_segments(),
        queued = service.queued_items(),
        "shutdown"
    );
    Ok(())
}
