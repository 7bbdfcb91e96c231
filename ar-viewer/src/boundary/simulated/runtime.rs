use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use bevy::log::{debug, info};

use crate::boundary::LocalBoxFuture;
use crate::boundary::runtime::{
    AnchorId, HitTestSourceId, ImageTrackingResult, MarkerDescriptor, MarkerRuntime, MarkerSession,
    ReferenceSpaceKind, RuntimeError, SessionEvent, SessionFeature, SessionMode, SessionRequest,
    SpaceId, XrFrame, XrRuntime, XrSession,
};
use crate::engine::math::Pose;

/// What the simulated device is able to do.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub immersive_supported: bool,
    pub dom_overlay: bool,
    pub hit_test: bool,
    pub anchors: bool,
    pub reference_spaces: Vec<ReferenceSpaceKind>,
    /// Reject every session request with this reason.
    pub reject_session: Option<String>,
    /// Fail the `immersive-ar` support query with this message.
    pub support_query_fault: Option<String>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self {
            immersive_supported: true,
            dom_overlay: true,
            hit_test: true,
            anchors: true,
            reference_spaces: ReferenceSpaceKind::NEGOTIATION_ORDER.to_vec(),
            reject_session: None,
            support_query_fault: None,
        }
    }
}

impl SimulatedDevice {
    pub fn without_hit_test(mut self) -> Self {
        self.hit_test = false;
        self
    }

    pub fn without_anchors(mut self) -> Self {
        self.anchors = false;
        self
    }

    pub fn without_dom_overlay(mut self) -> Self {
        self.dom_overlay = false;
        self
    }

    pub fn with_support_query_fault(mut self, message: &str) -> Self {
        self.support_query_fault = Some(message.to_string());
        self
    }

    pub fn with_reference_spaces(mut self, spaces: &[ReferenceSpaceKind]) -> Self {
        self.reference_spaces = spaces.to_vec();
        self
    }

    fn supports(&self, feature: SessionFeature) -> bool {
        match feature {
            SessionFeature::DomOverlay => self.dom_overlay,
            SessionFeature::HitTest => self.hit_test,
            SessionFeature::Anchors => self.anchors,
            SessionFeature::LocalFloor => self.reference_spaces.contains(&ReferenceSpaceKind::LocalFloor),
            SessionFeature::Local => self.reference_spaces.contains(&ReferenceSpaceKind::Local),
            SessionFeature::Viewer => self.reference_spaces.contains(&ReferenceSpaceKind::Viewer),
        }
    }
}

/// One scripted display frame.
#[derive(Debug, Clone)]
pub struct SimulatedFrame {
    pub timestamp_ms: f64,
    pub viewer: Option<Pose>,
    pub hits: Result<Vec<Pose>, RuntimeError>,
    pub images: Result<Vec<ImageTrackingResult>, RuntimeError>,
    pub events: Vec<SessionEvent>,
    anchors: HashMap<AnchorId, Option<Pose>>,
}

impl SimulatedFrame {
    pub fn at(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            viewer: None,
            hits: Ok(Vec::new()),
            images: Ok(Vec::new()),
            events: Vec::new(),
            anchors: HashMap::new(),
        }
    }

    pub fn with_viewer(mut self, viewer: Pose) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn with_hit(mut self, hit: Pose) -> Self {
        if let Ok(hits) = &mut self.hits {
            hits.push(hit);
        }
        self
    }

    pub fn with_hit_fault(mut self, message: &str) -> Self {
        self.hits = Err(RuntimeError::Fault(message.to_string()));
        self
    }

    pub fn with_image(mut self, result: ImageTrackingResult) -> Self {
        if let Ok(images) = &mut self.images {
            images.push(result);
        }
        self
    }

    pub fn with_image_fault(mut self, message: &str) -> Self {
        self.images = Err(RuntimeError::Fault(message.to_string()));
        self
    }

    pub fn with_event(mut self, event: SessionEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Screen tap delivered with this frame.
    pub fn tap(self) -> Self {
        self.with_event(SessionEvent::Select)
    }
}

impl XrFrame for SimulatedFrame {
    fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }

    fn viewer_pose(&self, _space: SpaceId) -> Option<Pose> {
        self.viewer
    }

    fn hit_test_results(&self, _source: HitTestSourceId, _space: SpaceId) -> Result<Vec<Pose>, RuntimeError> {
        self.hits.clone()
    }

    fn anchor_pose(&self, anchor: AnchorId, _space: SpaceId) -> Result<Option<Pose>, RuntimeError> {
        Ok(self.anchors.get(&anchor).copied().flatten())
    }

    fn image_tracking_results(&self) -> Result<Vec<ImageTrackingResult>, RuntimeError> {
        self.images.clone()
    }
}

#[derive(Debug, Clone, Copy)]
struct SimulatedAnchor {
    pose: Pose,
    tracked: bool,
}

#[derive(Default)]
struct SimulationState {
    frames: VecDeque<SimulatedFrame>,
    anchors: BTreeMap<AnchorId, SimulatedAnchor>,
    next_anchor: u64,
    next_space: u32,
    session_requests: Vec<SessionRequest>,
    reference_space_requests: Vec<ReferenceSpaceKind>,
    deleted_anchors: Vec<AnchorId>,
    sessions_started: u32,
    session_ended: bool,
    marker_stopped: bool,
}

/// Shared script and observation point for simulated sessions.
///
/// Clones share one state, so a test keeps a handle while the runtime owns
/// another.
#[derive(Clone, Default)]
pub struct SimulationHandle {
    state: Rc<RefCell<SimulationState>>,
}

impl SimulationHandle {
    pub fn push_frame(&self, frame: SimulatedFrame) {
        self.state.borrow_mut().frames.push_back(frame);
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// Mark every live runtime anchor as tracked or untracked.
    pub fn set_anchors_tracked(&self, tracked: bool) {
        for anchor in self.state.borrow_mut().anchors.values_mut() {
            anchor.tracked = tracked;
        }
    }

    pub fn live_anchor_count(&self) -> usize {
        self.state.borrow().anchors.len()
    }

    pub fn anchor_poses(&self) -> Vec<Pose> {
        self.state.borrow().anchors.values().map(|a| a.pose).collect()
    }

    pub fn deleted_anchors(&self) -> Vec<AnchorId> {
        self.state.borrow().deleted_anchors.clone()
    }

    pub fn session_requests(&self) -> Vec<SessionRequest> {
        self.state.borrow().session_requests.clone()
    }

    pub fn reference_space_requests(&self) -> Vec<ReferenceSpaceKind> {
        self.state.borrow().reference_space_requests.clone()
    }

    pub fn sessions_started(&self) -> u32 {
        self.state.borrow().sessions_started
    }

    pub fn session_ended(&self) -> bool {
        self.state.borrow().session_ended
    }

    pub fn marker_stopped(&self) -> bool {
        self.state.borrow().marker_stopped
    }

    fn next_frame(&self) -> Option<SimulatedFrame> {
        let mut state = self.state.borrow_mut();
        let mut frame = state.frames.pop_front()?;
        frame.anchors = state
            .anchors
            .iter()
            .map(|(id, anchor)| (*id, anchor.tracked.then_some(anchor.pose)))
            .collect();
        Some(frame)
    }
}

/// Immersive runtime backed by a [`SimulatedDevice`].
pub struct SimulatedRuntime {
    device: SimulatedDevice,
    handle: SimulationHandle,
}

impl SimulatedRuntime {
    pub fn new(device: SimulatedDevice, handle: SimulationHandle) -> Self {
        Self { device, handle }
    }

    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }
}

impl XrRuntime for SimulatedRuntime {
    fn is_session_supported(&self, _mode: SessionMode) -> LocalBoxFuture<'_, Result<bool, RuntimeError>> {
        let result = match &self.device.support_query_fault {
            Some(message) => Err(RuntimeError::Fault(message.clone())),
            None => Ok(self.device.immersive_supported),
        };
        Box::pin(async move { result })
    }

    fn request_session<'a>(
        &'a self,
        mode: SessionMode,
        request: &'a SessionRequest,
    ) -> LocalBoxFuture<'a, Result<Box<dyn XrSession>, RuntimeError>> {
        Box::pin(async move {
            self.handle.state.borrow_mut().session_requests.push(request.clone());

            if !self.device.immersive_supported {
                return Err(RuntimeError::Unsupported { mode: mode.as_str() });
            }
            if let Some(reason) = &self.device.reject_session {
                return Err(RuntimeError::Rejected {
                    reason: reason.clone(),
                    feature: None,
                });
            }
            if request.requests(SessionFeature::DomOverlay) && !self.device.dom_overlay {
                return Err(RuntimeError::Rejected {
                    reason: "dom-overlay is not supported".to_string(),
                    feature: Some(SessionFeature::DomOverlay),
                });
            }

            let enabled: Vec<SessionFeature> = request
                .optional_features
                .iter()
                .copied()
                .filter(|f| self.device.supports(*f))
                .collect();

            {
                let mut state = self.handle.state.borrow_mut();
                state.sessions_started += 1;
                state.session_ended = false;
            }
            info!("Simulated session granted with {:?}", enabled);

            let session: Box<dyn XrSession> = Box::new(SimulatedSession {
                device: self.device.clone(),
                handle: self.handle.clone(),
                enabled,
                pending_events: Vec::new(),
                ended: false,
            });
            Ok(session)
        })
    }
}

struct SimulatedSession {
    device: SimulatedDevice,
    handle: SimulationHandle,
    enabled: Vec<SessionFeature>,
    pending_events: Vec<SessionEvent>,
    ended: bool,
}

impl XrSession for SimulatedSession {
    fn enabled_features(&self) -> Vec<SessionFeature> {
        self.enabled.clone()
    }

    fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceKind,
    ) -> LocalBoxFuture<'_, Result<SpaceId, RuntimeError>> {
        Box::pin(async move {
            let mut state = self.handle.state.borrow_mut();
            state.reference_space_requests.push(kind);
            if !self.device.reference_spaces.contains(&kind) {
                return Err(RuntimeError::ReferenceSpaceUnavailable(kind.as_str()));
            }
            state.next_space += 1;
            Ok(SpaceId(state.next_space))
        })
    }

    fn request_hit_test_source(
        &mut self,
        _space: SpaceId,
    ) -> LocalBoxFuture<'_, Result<HitTestSourceId, RuntimeError>> {
        let enabled = self.enabled.contains(&SessionFeature::HitTest);
        Box::pin(async move {
            if enabled {
                Ok(HitTestSourceId(1))
            } else {
                Err(RuntimeError::Fault("hit-test was not granted".to_string()))
            }
        })
    }

    fn create_anchor(&mut self, pose: &Pose, _space: SpaceId) -> Result<AnchorId, RuntimeError> {
        if !self.enabled.contains(&SessionFeature::Anchors) {
            return Err(RuntimeError::Fault("anchors were not granted".to_string()));
        }
        let mut state = self.handle.state.borrow_mut();
        state.next_anchor += 1;
        let id = AnchorId(state.next_anchor);
        state.anchors.insert(
            id,
            SimulatedAnchor {
                pose: *pose,
                tracked: true,
            },
        );
        debug!("Simulated anchor {:?} created", id);
        Ok(id)
    }

    fn delete_anchor(&mut self, anchor: AnchorId) -> Result<(), RuntimeError> {
        let mut state = self.handle.state.borrow_mut();
        match state.anchors.remove(&anchor) {
            Some(_) => {
                state.deleted_anchors.push(anchor);
                Ok(())
            }
            None => Err(RuntimeError::Fault(format!("unknown anchor {}", anchor.0))),
        }
    }

    fn poll_frame(&mut self) -> Option<Box<dyn XrFrame>> {
        if self.ended {
            return None;
        }
        let frame = self.handle.next_frame()?;
        self.pending_events = frame.events.clone();
        Some(Box::new(frame))
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        // A real runtime drops its anchors with the session.
        let mut state = self.handle.state.borrow_mut();
        state.anchors.clear();
        state.session_ended = true;
        info!("Simulated session ended");
    }
}

/// Image-target runtime that replays the same frame script.
pub struct SimulatedMarkerRuntime {
    handle: SimulationHandle,
    fail_start: Option<String>,
}

impl SimulatedMarkerRuntime {
    pub fn new(handle: SimulationHandle) -> Self {
        Self {
            handle,
            fail_start: None,
        }
    }

    pub fn failing(handle: SimulationHandle, reason: &str) -> Self {
        Self {
            handle,
            fail_start: Some(reason.to_string()),
        }
    }
}

impl MarkerRuntime for SimulatedMarkerRuntime {
    fn start<'a>(
        &'a self,
        descriptor: &'a MarkerDescriptor,
    ) -> LocalBoxFuture<'a, Result<Box<dyn MarkerSession>, RuntimeError>> {
        Box::pin(async move {
            if let Some(reason) = &self.fail_start {
                return Err(RuntimeError::Fault(format!("{}: {}", descriptor.path, reason)));
            }
            info!("Simulated marker tracking started for {}", descriptor.path);
            let session: Box<dyn MarkerSession> = Box::new(SimulatedMarkerSession {
                handle: self.handle.clone(),
                pending_events: Vec::new(),
                stopped: false,
            });
            Ok(session)
        })
    }
}

struct SimulatedMarkerSession {
    handle: SimulationHandle,
    pending_events: Vec<SessionEvent>,
    stopped: bool,
}

impl MarkerSession for SimulatedMarkerSession {
    fn poll_frame(&mut self) -> Option<Box<dyn XrFrame>> {
        if self.stopped {
            return None;
        }
        let frame = self.handle.next_frame()?;
        self.pending_events = frame.events.clone();
        Some(Box::new(frame))
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.handle.state.borrow_mut().marker_stopped = true;
    }
}
