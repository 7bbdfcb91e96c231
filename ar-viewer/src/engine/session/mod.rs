//! Immersive session lifecycle: request, reference space negotiation,
//! per-frame delivery and idempotent end.

mod controller;

pub use controller::{SessionController, SessionPhase};

/// Why a session is being ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The user pressed close.
    UserClosed,
    /// The runtime ended the session (system UI, tracking loss, tab close).
    RuntimeEnded,
    /// Gaze dwell completed and the quiz view takes over; the pre-AR UI is
    /// not restored.
    QuizHandoff,
}

impl EndReason {
    pub fn restores_pre_ar(&self) -> bool {
        !matches!(self, Self::QuizHandoff)
    }
}
