//! Continuous capture loop

use crate::{RecorderError, SegmentCapture, SegmentRing, VideoSegment};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Length of each recorded segment (seconds)
    pub segment_secs: u32,
    /// Rolling window retained by the ring (seconds)
    pub buffer_secs: u32,
    /// Delay before retrying after a capture failure
    pub retry_delay: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            segment_secs: 5,
            buffer_secs: 30,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RecorderConfig {
    /// Ring capacity: how many whole segments fit the rolling window
    pub fn max_segments(&self) -> usize {
        (self.buffer_secs / self.segment_secs).max(1) as usize
    }
}

/// Handle to a running recorder loop
pub struct RecorderHandle {
    shutdown: Arc<AtomicBool>,
}

impl RecorderHandle {
    /// Stop the capture loop after the in-flight segment completes
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Continuous, self-scheduling segment recorder.
///
/// Records one fixed-length segment at a time into the ring and releases
/// whatever the ring evicts. Runs independently of incident state; a capture
/// failure is logged and retried after a delay, never propagated.
pub struct RingRecorder;

impl RingRecorder {
    pub fn spawn(
        capture: Arc<dyn SegmentCapture>,
        ring: Arc<SegmentRing>,
        config: RecorderConfig,
    ) -> RecorderHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();
        let segment_duration = Duration::from_secs(config.segment_secs as u64);

        tokio::spawn(async move {
            info!(
                segment_secs = config.segment_secs,
                max_segments = config.max_segments(),
                "ring recorder started"
            );

            while !shutdown_flag.load(Ordering::SeqCst) {
                let started_ms = epoch_ms();
                match capture.record_segment(segment_duration).await {
                    Ok(handle) => {
                        let segment = VideoSegment {
                            handle,
                            timestamp_ms: started_ms,
                            duration_secs: config.segment_secs,
                        };
                        debug!(segment = %segment.handle.id, "segment recorded");
                        for evicted in ring.push(segment) {
                            debug!(segment = %evicted.handle.id, "releasing evicted segment");
                            capture.release(&evicted.handle).await;
                        }
                    }
                    Err(e) => {
                        // Failure isolation: this segment is lost, the loop
                        // is not.
                        warn!("segment capture failed: {}; retrying", e);
                        tokio::time::sleep(config.retry_delay).await;
                    }
                }
            }

            info!("ring recorder stopped");
        });

        RecorderHandle { shutdown }
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
