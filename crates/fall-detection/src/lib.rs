//! Fall Detection
//!
//! Accelerometer sampling and fall classification for lone-worker safety:
//! - Fixed-rate motion monitoring (3-axis accelerometer -> G-force magnitude)
//! - Two-stage debounced fall classifier (spike + sustained confirmation)
//! - Single open fall event at a time

pub mod config;
pub mod detector;
pub mod event;
pub mod monitor;

pub use config::DetectionConfig;
pub use detector::FallDetector;
pub use event::FallEvent;
pub use monitor::{Accelerometer, GForceSample, MotionMonitor, SensorSample};

use thiserror::Error;

/// Detection error types
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Accelerometer unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Accelerometer read failed: {0}")]
    SensorRead(String),
}
