use bevy::log::{debug, info, warn};

use crate::boundary::SceneRenderer;
use crate::boundary::runtime::{
    AnchorId, HitTestSourceId, ReferenceSpaceKind, RuntimeError, SessionEvent, SessionFeature, SessionMode,
    SessionRequest, SpaceId, VisibilityState, XrFrame, XrRuntime, XrSession,
};
use crate::engine::capability::{HitTestSupport, OverlaySupport, SessionFeatures};
use crate::engine::error::StartupError;
use crate::engine::math::Pose;
use crate::tools::anchor_store::AnchorRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Running,
    Ended,
}

/// Owns one immersive session from grant to end.
///
/// Built by [`SessionController::start`]; anything that fails before the
/// controller exists is a start-up error, anything after is a frame fault.
pub struct SessionController {
    session: Box<dyn XrSession>,
    features: SessionFeatures,
    space: SpaceId,
    space_kind: ReferenceSpaceKind,
    hit_test: Option<(HitTestSourceId, SpaceId)>,
    visibility: VisibilityState,
    phase: SessionPhase,
}

impl SessionController {
    /// Request the session, negotiate a reference space and a hit-test
    /// source, then attach the per-frame callback.
    pub async fn start(
        runtime: &dyn XrRuntime,
        overlay_root: &str,
        renderer: &mut dyn SceneRenderer,
    ) -> Result<SessionController, StartupError> {
        let request = SessionRequest {
            optional_features: SessionFeature::REQUEST_ORDER.to_vec(),
            overlay_root: Some(overlay_root.to_string()),
        };

        let (mut session, overlay_dropped) = match runtime.request_session(SessionMode::ImmersiveAr, &request).await {
            Ok(session) => (session, false),
            Err(err) if err.cites(SessionFeature::DomOverlay) => {
                warn!("Session refused over dom-overlay ({}), retrying without it", err);
                let retry = request.without(SessionFeature::DomOverlay);
                let session = runtime
                    .request_session(SessionMode::ImmersiveAr, &retry)
                    .await
                    .map_err(StartupError::SessionRejected)?;
                (session, true)
            }
            Err(err) => return Err(StartupError::SessionRejected(err)),
        };

        let mut features = SessionFeatures::from_enabled(&session.enabled_features());
        if overlay_dropped {
            features.overlay = OverlaySupport::Unavailable;
        }

        let Some((space_kind, space)) = negotiate_reference_space(session.as_mut()).await else {
            session.end();
            return Err(StartupError::NoReferenceSpace);
        };
        info!("Reference space {} selected", space_kind.as_str());

        let hit_test = match features.hit_test {
            HitTestSupport::Available => match request_hit_test(session.as_mut(), space_kind, space).await {
                Ok(source) => Some(source),
                Err(err) => {
                    warn!("Hit-test source unavailable, falling back to gaze targeting: {}", err);
                    features.hit_test = HitTestSupport::Absent;
                    None
                }
            },
            HitTestSupport::Absent => None,
        };

        renderer.set_animation_loop(true);
        info!(
            "Session running (hit-test {:?}, anchors {:?}, overlay {:?})",
            features.hit_test, features.anchors, features.overlay
        );

        Ok(SessionController {
            session,
            features,
            space,
            space_kind,
            hit_test,
            visibility: VisibilityState::Visible,
            phase: SessionPhase::Running,
        })
    }

    pub fn features(&self) -> SessionFeatures {
        self.features
    }

    pub fn space(&self) -> SpaceId {
        self.space
    }

    pub fn reference_space_kind(&self) -> ReferenceSpaceKind {
        self.space_kind
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility == VisibilityState::Hidden
    }

    /// Next frame plus the events that arrived with it.
    ///
    /// Visibility changes are applied here so callers see the new state
    /// while handling the same frame.
    pub fn poll_frame(&mut self) -> Option<(Box<dyn XrFrame>, Vec<SessionEvent>)> {
        if self.phase == SessionPhase::Ended {
            return None;
        }
        let frame = self.session.poll_frame()?;
        let events = self.session.poll_events();
        for event in &events {
            if let SessionEvent::VisibilityChange(state) = event {
                debug!("Visibility changed to {:?}", state);
                self.visibility = *state;
            }
        }
        Some((frame, events))
    }

    /// First hit-test result for this frame, or `None` when hit-test is
    /// absent or nothing was hit.
    pub fn first_hit(&self, frame: &dyn XrFrame) -> Result<Option<Pose>, RuntimeError> {
        let Some((source, _)) = self.hit_test else {
            return Ok(None);
        };
        Ok(frame.hit_test_results(source, self.space)?.into_iter().next())
    }

    pub fn viewer_pose(&self, frame: &dyn XrFrame) -> Option<Pose> {
        frame.viewer_pose(self.space)
    }

    /// Detach the frame callback and end the session. Safe to call twice.
    pub fn finish(&mut self, renderer: &mut dyn SceneRenderer) {
        if self.phase == SessionPhase::Ended {
            return;
        }
        self.phase = SessionPhase::Ended;
        renderer.set_animation_loop(false);
        self.session.end();
        info!("Session ended");
    }
}

impl AnchorRuntime for SessionController {
    fn create_anchor(&mut self, pose: &Pose) -> Result<AnchorId, RuntimeError> {
        self.session.create_anchor(pose, self.space)
    }

    fn delete_anchor(&mut self, anchor: AnchorId) -> Result<(), RuntimeError> {
        self.session.delete_anchor(anchor)
    }
}

async fn negotiate_reference_space(session: &mut dyn XrSession) -> Option<(ReferenceSpaceKind, SpaceId)> {
    for kind in ReferenceSpaceKind::NEGOTIATION_ORDER {
        match session.request_reference_space(kind).await {
            Ok(space) => return Some((kind, space)),
            Err(err) => debug!("Reference space {} refused: {}", kind.as_str(), err),
        }
    }
    warn!("No reference space could be negotiated");
    None
}

/// Hit-test rays originate at the viewer, so the source is bound to the
/// viewer space; results are read back in the session space.
async fn request_hit_test(
    session: &mut dyn XrSession,
    space_kind: ReferenceSpaceKind,
    space: SpaceId,
) -> Result<(HitTestSourceId, SpaceId), RuntimeError> {
    let viewer_space = if space_kind == ReferenceSpaceKind::Viewer {
        space
    } else {
        session.request_reference_space(ReferenceSpaceKind::Viewer).await?
    };
    let source = session.request_hit_test_source(viewer_space).await?;
    Ok((source, viewer_space))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::simulated::{SimulatedDevice, SimulatedFrame, SimulatedRuntime, SimulationHandle};
    use crate::engine::capability::AnchorSupport;
    use crate::engine::scene::SharedSceneGraph;
    use bevy::tasks::block_on;

    fn start(device: SimulatedDevice) -> (Result<SessionController, StartupError>, SimulationHandle, SharedSceneGraph) {
        let handle = SimulationHandle::default();
        let runtime = SimulatedRuntime::new(device, handle.clone());
        let mut renderer = SharedSceneGraph::default();
        let result = block_on(SessionController::start(&runtime, "ar-overlay", &mut renderer));
        (result, handle, renderer)
    }

    #[test]
    fn requests_features_in_priority_order() {
        let (result, handle, renderer) = start(SimulatedDevice::default());
        let controller = result.expect("session starts");
        let requests = handle.session_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].optional_features, SessionFeature::REQUEST_ORDER.to_vec());
        assert_eq!(requests[0].overlay_root.as_deref(), Some("ar-overlay"));
        assert_eq!(controller.reference_space_kind(), ReferenceSpaceKind::LocalFloor);
        assert_eq!(controller.features().anchors, AnchorSupport::Runtime);
        assert!(renderer.graph().animation_loop_active());
    }

    #[test]
    fn overlay_rejection_retries_once_without_it() {
        let (result, handle, _) = start(SimulatedDevice::default().without_dom_overlay());
        let controller = result.expect("retry succeeds");
        let requests = handle.session_requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[1].requests(SessionFeature::DomOverlay));
        assert_eq!(controller.features().overlay, OverlaySupport::Unavailable);
    }

    #[test]
    fn other_rejections_are_not_retried() {
        let device = SimulatedDevice {
            reject_session: Some("camera permission denied".into()),
            ..SimulatedDevice::default()
        };
        let (result, handle, _) = start(device);
        assert!(matches!(result, Err(StartupError::SessionRejected(_))));
        assert_eq!(handle.session_requests().len(), 1);
    }

    #[test]
    fn reference_space_falls_back_in_order() {
        let device = SimulatedDevice::default().with_reference_spaces(&[ReferenceSpaceKind::Viewer]);
        let (result, handle, _) = start(device);
        let controller = result.expect("viewer space is enough");
        assert_eq!(controller.reference_space_kind(), ReferenceSpaceKind::Viewer);
        assert_eq!(
            handle.reference_space_requests(),
            vec![ReferenceSpaceKind::LocalFloor, ReferenceSpaceKind::Local, ReferenceSpaceKind::Viewer]
        );
    }

    #[test]
    fn no_reference_space_ends_session() {
        let device = SimulatedDevice::default().with_reference_spaces(&[]);
        let (result, handle, renderer) = start(device);
        assert!(matches!(result, Err(StartupError::NoReferenceSpace)));
        assert!(handle.session_ended());
        assert!(!renderer.graph().animation_loop_active());
    }

    #[test]
    fn missing_hit_test_is_not_fatal() {
        let (result, _, _) = start(SimulatedDevice::default().without_hit_test());
        let controller = result.expect("session starts");
        assert_eq!(controller.features().hit_test, HitTestSupport::Absent);
    }

    #[test]
    fn finish_is_idempotent() {
        let (result, handle, mut renderer) = start(SimulatedDevice::default());
        let mut controller = result.expect("session starts");
        handle.push_frame(SimulatedFrame::at(0.0));
        controller.finish(&mut renderer);
        controller.finish(&mut renderer);
        assert_eq!(controller.phase(), SessionPhase::Ended);
        assert!(controller.poll_frame().is_none());
        assert!(!renderer.graph().animation_loop_active());
    }

    #[test]
    fn visibility_events_apply_on_their_frame() {
        let (result, handle, _) = start(SimulatedDevice::default());
        let mut controller = result.expect("session starts");
        handle.push_frame(SimulatedFrame::at(0.0).with_event(SessionEvent::VisibilityChange(VisibilityState::Hidden)));
        let (_, events) = controller.poll_frame().expect("frame");
        assert_eq!(events.len(), 1);
        assert!(controller.is_hidden());
    }
}
