use std::cell::RefCell;
use std::rc::Rc;

use bevy::log::info;

use super::assets::AssetKind;
use super::overlay::{Affordance, Hint, OverlayUi, QuizPresenter};

/// Everything the overlay was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCall {
    Show(Affordance),
    Hide(Affordance),
    Hint(Hint),
    Error(String),
    EnterAr,
    RestorePreAr,
}

/// Overlay that logs and records calls; clones share one log.
#[derive(Clone, Default)]
pub struct RecordingOverlay {
    calls: Rc<RefCell<Vec<OverlayCall>>>,
    root_missing: bool,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay whose page lacks the DOM-overlay root element.
    pub fn without_root() -> Self {
        Self {
            root_missing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<OverlayCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: &OverlayCall) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    pub fn errors(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                OverlayCall::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: OverlayCall) {
        info!("overlay: {:?}", call);
        self.calls.borrow_mut().push(call);
    }
}

impl OverlayUi for RecordingOverlay {
    fn has_root(&self, id: &str) -> bool {
        !self.root_missing && !id.trim().is_empty()
    }

    fn show(&mut self, affordance: Affordance) {
        self.record(OverlayCall::Show(affordance));
    }

    fn hide(&mut self, affordance: Affordance) {
        self.record(OverlayCall::Hide(affordance));
    }

    fn set_hint(&mut self, hint: Hint) {
        self.record(OverlayCall::Hint(hint));
    }

    fn show_error(&mut self, message: &str) {
        self.record(OverlayCall::Error(message.to_string()));
    }

    fn enter_ar(&mut self) {
        self.record(OverlayCall::EnterAr);
    }

    fn restore_pre_ar(&mut self) {
        self.record(OverlayCall::RestorePreAr);
    }
}

/// Quiz presenter that records hand-offs.
#[derive(Clone, Default)]
pub struct RecordingQuiz {
    presented: Rc<RefCell<Vec<AssetKind>>>,
}

impl RecordingQuiz {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> Vec<AssetKind> {
        self.presented.borrow().clone()
    }
}

impl QuizPresenter for RecordingQuiz {
    fn present(&mut self, kind: AssetKind) {
        info!("quiz: presenting {}", kind.as_str());
        self.presented.borrow_mut().push(kind);
    }
}
