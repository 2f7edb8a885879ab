//! Motion signal monitor
//!
//! Samples a 3-axis accelerometer at a fixed rate and reduces each sample to
//! a scalar G-force magnitude for the classifier. Holds no classification
//! state of its own.

use crate::{DetectionConfig, DetectionError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Raw 3-axis accelerometer sample (units of g)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Sample time (epoch milliseconds)
    pub timestamp_ms: u64,
}

impl SensorSample {
    /// Magnitude of the acceleration vector. Resting ~= 1.0, free-fall ~= 0.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Reduced sample published to the detector
#[derive(Debug, Clone, Copy)]
pub struct GForceSample {
    pub g_force: f32,
    /// Raw axes, retained for device-orientation reporting
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub timestamp_ms: u64,
}

impl From<SensorSample> for GForceSample {
    fn from(s: SensorSample) -> Self {
        Self {
            g_force: s.magnitude(),
            x: s.x,
            y: s.y,
            z: s.z,
            timestamp_ms: s.timestamp_ms,
        }
    }
}

/// Accelerometer device seam
pub trait Accelerometer: Send + 'static {
    /// Read one sample. Expected to be cheap and local.
    fn read(&mut self) -> Result<SensorSample, DetectionError>;
}

/// Fixed-rate sampling service.
///
/// Spawns a tokio task that reads the accelerometer at the configured rate
/// and publishes G-force samples on a channel. Read errors after startup are
/// logged and skipped; the loop never terminates on them.
pub struct MotionMonitor {
    receiver: mpsc::Receiver<GForceSample>,
    shutdown: Arc<AtomicBool>,
}

impl MotionMonitor {
    /// Start monitoring.
    ///
    /// Fails fast with [`DetectionError::SensorUnavailable`] if the device
    /// cannot produce a sample at startup, rather than silently yielding no
    /// data.
    pub fn start<A: Accelerometer>(
        mut driver: A,
        config: DetectionConfig,
    ) -> Result<Self, DetectionError> {
        // Probe read: surface a dead sensor to the caller immediately.
        driver
            .read()
            .map_err(|e| DetectionError::SensorUnavailable(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<GForceSample>(64);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();
        let interval = config.sample_interval();

        tokio::spawn(async move {
            info!(rate_hz = config.sample_rate_hz, "motion monitor started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            while !shutdown_flag.load(Ordering::SeqCst) {
                ticker.tick().await;
                match driver.read() {
                    Ok(sample) => {
                        if tx.send(sample.into()).await.is_err() {
                            debug!("monitor receiver dropped");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("accelerometer read error: {}", e);
                    }
                }
            }
            info!("motion monitor stopped");
        });

        Ok(Self { receiver: rx, shutdown })
    }

    /// Receive the next sample
    pub async fn next(&mut self) -> Option<GForceSample> {
        self.receiver.recv().await
    }

    /// Stop the sampling loop
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatSensor {
        t: u64,
    }

    impl Accelerometer for FlatSensor {
        fn read(&mut self) -> Result<SensorSample, DetectionError> {
            self.t += 100;
            Ok(SensorSample { x: 0.0, y: 0.0, z: 1.0, timestamp_ms: self.t })
        }
    }

    struct DeadSensor;

    impl Accelerometer for DeadSensor {
        fn read(&mut self) -> Result<SensorSample, DetectionError> {
            Err(DetectionError::SensorRead("no device".into()))
        }
    }

    #[test]
    fn magnitude_at_rest_is_one_g() {
        let s = SensorSample { x: 0.0, y: 0.0, z: 1.0, timestamp_ms: 0 };
        assert!((s.magnitude() - 1.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_publishes_samples_at_rate() {
        let mut monitor =
            MotionMonitor::start(FlatSensor { t: 0 }, DetectionConfig::default()).unwrap();

        let sample = monitor.next().await.unwrap();
        assert!((sample.g_force - 1.0).abs() < 1e-6);

        monitor.stop();
    }

    #[tokio::test]
    async fn dead_sensor_fails_fast() {
        let result = MotionMonitor::start(DeadSensor, DetectionConfig::default());
        assert!(matches!(result, Err(DetectionError::SensorUnavailable(_))));
    }
}
