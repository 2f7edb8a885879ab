//! Emergency Escalation
//!
//! Owns the cancellable countdown between a confirmed fall and either a
//! cancelled (worker is fine) or triggered (man-down) outcome. The countdown
//! exists to let a conscious worker self-report before supervisors are
//! alarmed, while guaranteeing automatic escalation for an unresponsive one.

pub mod machine;
pub mod state;

pub use machine::{EscalationConfig, EscalationMachine, EscalationOutcome, HapticFeedback, NoHaptics};
pub use state::EscalationState;

use thiserror::Error;

/// Escalation error types
#[derive(Error, Debug)]
pub enum EscalationError {
    #[error("A fall event is already being escalated")]
    AlreadyActive,

    #[error("No countdown is active")]
    NotActive,

    #[error("Outcome channel closed")]
    OutcomeChannelClosed,
}
