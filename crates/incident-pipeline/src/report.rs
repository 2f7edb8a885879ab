//! Man-down incident report payload

use fall_detection::{FallEvent, GForceSample};
use serde::{Deserialize, Serialize};

/// Rough device attitude at impact time, derived from the dominant
/// accelerometer axis of the last sample before the fall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    FaceUp,
    FaceDown,
    Upright,
    UpsideDown,
    OnSide,
    Unknown,
}

impl DeviceOrientation {
    pub fn from_axes(x: f32, y: f32, z: f32) -> Self {
        let (ax, ay, az) = (x.abs(), y.abs(), z.abs());
        if ax.max(ay).max(az) < 0.5 {
            // Near free-fall; no dominant axis
            return Self::Unknown;
        }
        if az >= ax && az >= ay {
            if z >= 0.0 { Self::FaceUp } else { Self::FaceDown }
        } else if ay >= ax {
            if y >= 0.0 { Self::Upright } else { Self::UpsideDown }
        } else {
            Self::OnSide
        }
    }
}

/// Structured payload for the backend man-down ingestion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentReport {
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    pub g_force: f32,
    pub fall_duration_ms: u64,
    pub device_orientation: DeviceOrientation,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_recording_url: Option<String>,

    /// Worker cancelled the escalation before it triggered
    pub false_alarm: bool,
}

impl IncidentReport {
    /// Build the report for a resolved fall event.
    ///
    /// `last_sample` is the most recent accelerometer reading before the
    /// impact, used only to derive device orientation.
    pub fn from_event(
        user_id: impl Into<String>,
        event: &FallEvent,
        last_sample: Option<&GForceSample>,
    ) -> Self {
        let device_orientation = last_sample
            .map(|s| DeviceOrientation::from_axes(s.x, s.y, s.z))
            .unwrap_or(DeviceOrientation::Unknown);

        Self {
            user_id: user_id.into(),
            latitude: event.latitude,
            longitude: event.longitude,
            g_force: event.g_force,
            fall_duration_ms: event.duration_ms,
            device_orientation,
            audio_recording_url: None,
            false_alarm: event.cancelled,
        }
    }
}
