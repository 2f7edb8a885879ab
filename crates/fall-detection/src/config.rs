//! Detection configuration

use serde::{Deserialize, Serialize};

/// Fall detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Accelerometer sampling rate in Hz
    pub sample_rate_hz: u32,

    /// G-force magnitude that starts a fall candidate
    pub fall_threshold_g: f32,

    /// Time the magnitude must stay above threshold to confirm a fall (ms)
    pub min_fall_duration_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10,
            fall_threshold_g: 3.5,
            min_fall_duration_ms: 500,
        }
    }
}

impl DetectionConfig {
    /// Sampling interval derived from the configured rate
    pub fn sample_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / self.sample_rate_hz as u64)
    }

    /// Stricter thresholds (more sensitive, more false positives)
    pub fn strict() -> Self {
        Self {
            fall_threshold_g: 2.5,
            min_fall_duration_ms: 300,
            ..Default::default()
        }
    }

    /// Lenient thresholds (fewer false positives)
    pub fn lenient() -> Self {
        Self {
            fall_threshold_g: 4.5,
            min_fall_duration_ms: 800,
            ..Default::default()
        }
    }
}
