//! Countdown machine implementation

use crate::{EscalationError, EscalationState};
use fall_detection::FallEvent;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Escalation configuration
#[derive(Debug, Clone)]
pub struct EscalationConfig {
    /// Countdown from detection to automatic trigger
    pub countdown: Duration,
    /// Cadence of the awareness pulse during the countdown
    pub pulse_interval: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(30),
            pulse_interval: Duration::from_secs(5),
        }
    }
}

/// Terminal outcome of a countdown
#[derive(Debug, Clone)]
pub enum EscalationOutcome {
    /// Countdown expired: man-down
    Triggered(FallEvent),
    /// Worker cancelled: false alarm
    Cancelled(FallEvent),
}

/// Haptic/alert feedback seam. Situational-awareness only; has no effect on
/// countdown timing.
pub trait HapticFeedback: Send + Sync + 'static {
    fn pulse(&self);
}

/// No-op haptics for headless deployments and tests
pub struct NoHaptics;

impl HapticFeedback for NoHaptics {
    fn pulse(&self) {}
}

struct Inner {
    state: EscalationState,
    event: Option<FallEvent>,
    cancel: Arc<Notify>,
}

/// Cancellable escalation countdown.
///
/// All transitions happen under one mutex: a cancel that wins the lock while
/// the countdown is active is observed-before any pending trigger, so the
/// trigger path can never fire after a recorded cancel regardless of timer
/// scheduling jitter.
pub struct EscalationMachine {
    config: EscalationConfig,
    inner: Arc<Mutex<Inner>>,
    outcome_tx: mpsc::UnboundedSender<EscalationOutcome>,
    haptics: Arc<dyn HapticFeedback>,
}

impl EscalationMachine {
    /// Create the machine and the outcome channel its integrator consumes
    pub fn new(
        config: EscalationConfig,
        haptics: Arc<dyn HapticFeedback>,
    ) -> (Self, mpsc::UnboundedReceiver<EscalationOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let machine = Self {
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: EscalationState::Idle,
                event: None,
                cancel: Arc::new(Notify::new()),
            })),
            outcome_tx: tx,
            haptics,
        };
        (machine, rx)
    }

    /// Current state
    pub fn state(&self) -> EscalationState {
        self.inner.lock().expect("escalation state poisoned").state
    }

    /// Start the countdown for a confirmed fall.
    ///
    /// Rejected while another event is under escalation (at-most-one open
    /// fall event).
    pub fn on_fall_detected(&self, event: FallEvent) -> Result<(), EscalationError> {
        let cancel = {
            let mut inner = self.inner.lock().expect("escalation state poisoned");
            if inner.state == EscalationState::CountdownActive {
                return Err(EscalationError::AlreadyActive);
            }
            let cancel = Arc::new(Notify::new());
            inner.state = EscalationState::CountdownActive;
            inner.event = Some(event);
            inner.cancel = cancel.clone();
            cancel
        };

        info!(countdown_secs = self.config.countdown.as_secs(), "escalation countdown started");

        let inner = self.inner.clone();
        let outcome_tx = self.outcome_tx.clone();
        let haptics = self.haptics.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let deadline = Instant::now() + config.countdown;
            let mut pulse = tokio::time::interval(config.pulse_interval);
            pulse.tick().await; // discard the immediate tick

            let expiry = tokio::time::sleep_until(deadline);
            tokio::pin!(expiry);

            loop {
                tokio::select! {
                    _ = &mut expiry => {
                        let outcome = {
                            let mut inner = inner.lock().expect("escalation state poisoned");
                            if inner.state != EscalationState::CountdownActive {
                                // Cancel won the race; nothing to do.
                                None
                            } else {
                                inner.state = EscalationState::Triggered;
                                inner.event.take().map(EscalationOutcome::Triggered)
                            }
                        };
                        if let Some(outcome) = outcome {
                            info!("countdown expired: man-down triggered");
                            if outcome_tx.send(outcome).is_err() {
                                warn!("escalation outcome receiver dropped");
                            }
                        }
                        break;
                    }
                    _ = cancel.notified() => {
                        debug!("countdown task stopped by cancel");
                        break;
                    }
                    _ = pulse.tick() => {
                        haptics.pulse();
                    }
                }
            }
        });

        Ok(())
    }

    /// Cancel an active countdown.
    ///
    /// Deterministic: once this returns `Ok`, the trigger path cannot fire.
    pub fn cancel(&self) -> Result<(), EscalationError> {
        let (event, cancel) = {
            let mut inner = self.inner.lock().expect("escalation state poisoned");
            if inner.state != EscalationState::CountdownActive {
                return Err(EscalationError::NotActive);
            }
            inner.state = EscalationState::Cancelled;
            let mut event = inner.event.take().ok_or(EscalationError::NotActive)?;
            event.cancelled = true;
            (event, inner.cancel.clone())
        };

        cancel.notify_one();
        info!("escalation cancelled by worker");
        self.outcome_tx
            .send(EscalationOutcome::Cancelled(event))
            .map_err(|_| EscalationError::OutcomeChannelClosed)
    }

    /// Attach a best-effort geotag to the event under escalation, if any
    pub fn set_location(&self, latitude: f64, longitude: f64) {
        let mut inner = self.inner.lock().expect("escalation state poisoned");
        if let Some(event) = inner.event.as_mut() {
            event.latitude = Some(latitude);
            event.longitude = Some(longitude);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHaptics(AtomicU32);

    impl HapticFeedback for CountingHaptics {
        fn pulse(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event() -> FallEvent {
        FallEvent::new(1_000, 5.0, 600)
    }

    fn machine() -> (EscalationMachine, mpsc::UnboundedReceiver<EscalationOutcome>) {
        EscalationMachine::new(EscalationConfig::default(), Arc::new(NoHaptics))
    }

    #[tokio::test(start_paused = true)]
    async fn uncancelled_countdown_triggers_once() {
        let (machine, mut outcomes) = machine();
        machine.on_fall_detected(event()).unwrap();
        assert_eq!(machine.state(), EscalationState::CountdownActive);

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(machine.state(), EscalationState::Triggered);
        match outcomes.recv().await.unwrap() {
            EscalationOutcome::Triggered(e) => assert!(!e.cancelled),
            other => panic!("expected trigger, got {:?}", other),
        }
        assert!(outcomes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_expiry_never_triggers() {
        let (machine, mut outcomes) = machine();
        machine.on_fall_detected(event()).unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        machine.cancel().unwrap();
        assert_eq!(machine.state(), EscalationState::Cancelled);

        // Run well past the original deadline: no trigger may fire.
        tokio::time::sleep(Duration::from_secs(10)).await;

        match outcomes.recv().await.unwrap() {
            EscalationOutcome::Cancelled(e) => assert!(e.cancelled),
            other => panic!("expected cancel, got {:?}", other),
        }
        assert!(outcomes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_fall_is_rejected_while_active() {
        let (machine, _outcomes) = machine();
        machine.on_fall_detected(event()).unwrap();
        assert!(matches!(
            machine.on_fall_detected(event()),
            Err(EscalationError::AlreadyActive)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_countdown_is_rejected() {
        let (machine, _outcomes) = machine();
        assert!(matches!(machine.cancel(), Err(EscalationError::NotActive)));
    }

    #[tokio::test(start_paused = true)]
    async fn pulses_fire_at_cadence_without_affecting_timing() {
        let haptics = Arc::new(CountingHaptics(AtomicU32::new(0)));
        let (machine, mut outcomes) =
            EscalationMachine::new(EscalationConfig::default(), haptics.clone());
        machine.on_fall_detected(event()).unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;

        // 30s countdown with 5s cadence: pulses at 5,10,15,20,25 (expiry wins at 30)
        let pulses = haptics.0.load(Ordering::SeqCst);
        assert!((5..=6).contains(&pulses), "unexpected pulse count {}", pulses);
        assert!(matches!(
            outcomes.recv().await,
            Some(EscalationOutcome::Triggered(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn geotag_attaches_to_active_event() {
        let (machine, mut outcomes) = machine();
        machine.on_fall_detected(event()).unwrap();
        machine.set_location(59.33, 18.06);

        tokio::time::sleep(Duration::from_secs(31)).await;

        match outcomes.recv().await.unwrap() {
            EscalationOutcome::Triggered(e) => {
                assert_eq!(e.latitude, Some(59.33));
                assert_eq!(e.longitude, Some(18.06));
            }
            other => panic!("expected trigger, got {:?}", other),
        }
    }
}
