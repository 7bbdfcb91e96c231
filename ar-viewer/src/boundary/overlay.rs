use serde::{Deserialize, Serialize};

use super::assets::AssetKind;

/// Overlay affordances addressed by stable element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affordance {
    Start,
    Reset,
    Close,
    ContinueToQuiz,
    DebugToggle,
    Hint,
}

impl Affordance {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Start => "ar-start",
            Self::Reset => "ar-reset",
            Self::Close => "ar-close",
            Self::ContinueToQuiz => "ar-continue",
            Self::DebugToggle => "ar-debug",
            Self::Hint => "ar-hint",
        }
    }
}

/// Commands the overlay posts back into the viewer.
///
/// The overlay swallows the pointer event before the runtime raises
/// `select`, so pressing one of these never also counts as a placement tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiCommand {
    Start,
    Reset,
    Close,
    ContinueToQuiz,
    DebugToggle,
}

impl UiCommand {
    /// Convert string identifier to command for RPC compatibility.
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "reset" => Some(Self::Reset),
            "close" => Some(Self::Close),
            "continue_to_quiz" | "continue" => Some(Self::ContinueToQuiz),
            "debug_toggle" | "debug" => Some(Self::DebugToggle),
            _ => None,
        }
    }
}

/// Instructional hints shown while in AR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Scanning,
    TapToPlace,
    LookAtContent,
    Relocalising,
    FindMarker,
}

impl Hint {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Scanning => "Move your phone slowly to scan the floor or a wall",
            Self::TapToPlace => "Tap to place",
            Self::LookAtContent => "Look at the object to continue",
            Self::Relocalising => "Tracking lost, hold still",
            Self::FindMarker => "Point the camera at the printed marker",
        }
    }
}

/// Toast/overlay layer registered with the session.
pub trait OverlayUi {
    /// Whether the element registered as the DOM-overlay root exists.
    fn has_root(&self, id: &str) -> bool;

    fn show(&mut self, affordance: Affordance);

    fn hide(&mut self, affordance: Affordance);

    fn set_hint(&mut self, hint: Hint);

    fn show_error(&mut self, message: &str);

    fn enter_ar(&mut self);

    fn restore_pre_ar(&mut self);
}

/// Secondary view that takes over after the AR session.
pub trait QuizPresenter {
    fn present(&mut self, kind: AssetKind);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_rpc_strings() {
        assert_eq!(UiCommand::from_string("Reset"), Some(UiCommand::Reset));
        assert_eq!(UiCommand::from_string("continue_to_quiz"), Some(UiCommand::ContinueToQuiz));
        assert_eq!(UiCommand::from_string("teleport"), None);
    }
}
