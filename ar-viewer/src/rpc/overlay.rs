use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use serde_json::json;

use super::web_rpc::RpcNotification;
use crate::boundary::{Affordance, AssetKind, Hint, OverlayUi, QuizPresenter, dom};

/// Notifications raised by the adapters, drained into the RPC interface
/// once per frame.
#[derive(Resource, Clone, Default)]
pub struct OverlayOutbox(Arc<Mutex<Vec<RpcNotification>>>);

impl OverlayOutbox {
    pub fn push(&self, method: &str, params: serde_json::Value) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push(RpcNotification {
                jsonrpc: "2.0".to_string(),
                method: method.to_string(),
                params,
            });
        }
    }

    pub fn drain(&self) -> Vec<RpcNotification> {
        self.0
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }
}

/// Overlay UI living in the parent page.
pub struct RpcOverlay {
    outbox: OverlayOutbox,
}

impl RpcOverlay {
    pub fn new(outbox: OverlayOutbox) -> Self {
        Self { outbox }
    }

    fn affordance(&self, affordance: Affordance, visible: bool) {
        self.outbox.push(
            "overlay_affordance",
            json!({ "id": affordance.id(), "visible": visible }),
        );
    }
}

impl OverlayUi for RpcOverlay {
    fn has_root(&self, id: &str) -> bool {
        dom::element_exists(id)
    }

    fn show(&mut self, affordance: Affordance) {
        self.affordance(affordance, true);
    }

    fn hide(&mut self, affordance: Affordance) {
        self.affordance(affordance, false);
    }

    fn set_hint(&mut self, hint: Hint) {
        self.outbox.push("overlay_hint", json!({ "text": hint.text() }));
    }

    fn show_error(&mut self, message: &str) {
        self.outbox.push("overlay_error", json!({ "message": message }));
    }

    fn enter_ar(&mut self) {
        self.affordance(Affordance::Start, false);
        self.outbox.push("overlay_mode", json!({ "mode": "ar" }));
    }

    fn restore_pre_ar(&mut self) {
        self.outbox.push("overlay_mode", json!({ "mode": "pre_ar" }));
        self.affordance(Affordance::Start, true);
    }
}

/// Quiz view in the parent page.
pub struct RpcQuiz {
    outbox: OverlayOutbox,
}

impl RpcQuiz {
    pub fn new(outbox: OverlayOutbox) -> Self {
        Self { outbox }
    }
}

impl QuizPresenter for RpcQuiz {
    fn present(&mut self, kind: AssetKind) {
        info!("Handing {} to the quiz", kind.as_str());
        self.outbox.push("present_quiz", json!({ "asset_kind": kind.as_str() }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_calls_become_notifications() {
        let outbox = OverlayOutbox::default();
        let mut overlay = RpcOverlay::new(outbox.clone());
        overlay.show(Affordance::ContinueToQuiz);
        overlay.set_hint(Hint::TapToPlace);
        let sent = outbox.drain();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].method, "overlay_affordance");
        assert_eq!(sent[0].params["id"], "ar-continue");
        assert_eq!(sent[0].params["visible"], true);
        assert_eq!(sent[1].params["text"], "Tap to place");
        assert!(outbox.drain().is_empty());
    }

    #[test]
    fn quiz_hand_off_names_kind() {
        let outbox = OverlayOutbox::default();
        RpcQuiz::new(outbox.clone()).present(AssetKind::FloorAsset);
        let sent = outbox.drain();
        assert_eq!(sent[0].method, "present_quiz");
        assert_eq!(sent[0].params["asset_kind"], "floor-asset");
    }
}
