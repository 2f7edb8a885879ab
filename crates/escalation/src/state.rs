//! Escalation states

use serde::{Deserialize, Serialize};

/// Escalation state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EscalationState {
    /// No fall under escalation
    #[default]
    Idle,

    /// Countdown running; worker may still cancel
    CountdownActive,

    /// Worker cancelled the countdown (false alarm)
    Cancelled,

    /// Countdown expired without cancellation (man-down)
    Triggered,
}

impl EscalationState {
    /// Terminal states close the associated fall event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Triggered)
    }
}
