//! Safety-Incident Pipeline
//!
//! Wires the subsystem end to end: motion monitor -> fall detector ->
//! escalation countdown -> evidence finalization, with every network step
//! backed by the durable offline queue. All services are explicitly
//! constructed with start/stop lifecycles; nothing is ambient global state.

pub mod report;
pub mod service;

pub use report::{DeviceOrientation, IncidentReport};
pub use service::{SafetyService, ServiceConfig};

use async_trait::async_trait;
use evidence::EvidenceRecording;
use fall_detection::DetectionError;
use offline_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Backend submission failure
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

/// Man-down ingestion endpoint seam
#[async_trait]
pub trait IncidentBackend: Send + Sync {
    async fn submit_report(&self, report: &IncidentReport) -> Result<(), BackendError>;
}

/// Best-effort geolocation seam. Absence never blocks detection.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current(&self) -> Option<GeoPoint>;
}

/// A geographic coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// The two payload kinds the offline queue carries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncPayload {
    /// Unacknowledged man-down (or false-alarm) report
    Report(IncidentReport),
    /// Recording whose evidence upload has not been confirmed
    Recording(EvidenceRecording),
}

/// Install the global tracing subscriber
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
