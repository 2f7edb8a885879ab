//! Fall event record

use serde::{Deserialize, Serialize};

/// A confirmed fall impact.
///
/// Created the instant the detector confirms a sustained impact and closed
/// once it is either cancelled by the worker or triggered and finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallEvent {
    /// Confirmation time (epoch milliseconds)
    pub timestamp_ms: u64,

    /// Peak G-force magnitude over the confirmation window
    pub g_force: f32,

    /// Time spent above threshold before confirmation (ms)
    pub duration_ms: u64,

    /// Best-effort geotag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Worker cancelled the escalation (false alarm)
    pub cancelled: bool,
}

impl FallEvent {
    pub fn new(timestamp_ms: u64, g_force: f32, duration_ms: u64) -> Self {
        Self {
            timestamp_ms,
            g_force,
            duration_ms,
            latitude: None,
            longitude: None,
            cancelled: false,
        }
    }
}
