//! Fall event detector
//!
//! Two-stage classifier: an instantaneous spike above threshold opens a fall
//! candidate; the candidate confirms only if the magnitude stays above
//! threshold for the minimum duration. Transient spikes (a bump, a step)
//! drop below threshold first and reset the candidate.

use crate::monitor::GForceSample;
use crate::{DetectionConfig, FallEvent};
use tracing::{debug, info};

/// Stateful fall classifier.
///
/// At most one fall event is open at a time: once an event is emitted,
/// further qualifying spikes are ignored until [`FallDetector::close_event`]
/// is called by whoever resolved the event.
pub struct FallDetector {
    config: DetectionConfig,
    /// Start of the current above-threshold window, if any
    candidate_start_ms: Option<u64>,
    /// Peak magnitude seen during the candidate window
    candidate_peak_g: f32,
    /// An emitted event has not been cancelled/finalized yet
    event_open: bool,
}

impl FallDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            candidate_start_ms: None,
            candidate_peak_g: 0.0,
            event_open: false,
        }
    }

    /// Classify one sample. Returns a confirmed event at most once per
    /// open-event cycle.
    pub fn process(&mut self, sample: &GForceSample) -> Option<FallEvent> {
        if sample.g_force < self.config.fall_threshold_g {
            // Debounce: dropping below threshold discards the candidate.
            if self.candidate_start_ms.take().is_some() {
                debug!(g = sample.g_force, "fall candidate reset");
                self.candidate_peak_g = 0.0;
            }
            return None;
        }

        let start = match self.candidate_start_ms {
            Some(start) => start,
            None => {
                debug!(g = sample.g_force, "fall candidate opened");
                self.candidate_start_ms = Some(sample.timestamp_ms);
                self.candidate_peak_g = sample.g_force;
                return None;
            }
        };

        self.candidate_peak_g = self.candidate_peak_g.max(sample.g_force);

        let sustained_ms = sample.timestamp_ms.saturating_sub(start);
        if sustained_ms < self.config.min_fall_duration_ms {
            return None;
        }

        // Sustained impact. Confirm once, then stay quiet until the open
        // event is resolved.
        self.candidate_start_ms = None;
        if self.event_open {
            debug!("impact confirmed but an event is already open; ignored");
            self.candidate_peak_g = 0.0;
            return None;
        }

        self.event_open = true;
        let event = FallEvent::new(sample.timestamp_ms, self.candidate_peak_g, sustained_ms);
        self.candidate_peak_g = 0.0;
        info!(
            g_force = event.g_force,
            duration_ms = event.duration_ms,
            "fall confirmed"
        );
        Some(event)
    }

    /// Close the active event (cancelled or triggered-and-finalized),
    /// re-arming detection.
    pub fn close_event(&mut self) {
        self.event_open = false;
    }

    /// Whether an emitted event is still unresolved
    pub fn event_open(&self) -> bool {
        self.event_open
    }
}
