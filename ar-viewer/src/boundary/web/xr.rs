use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use bevy::log::{debug, info, warn};
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;

use super::js;
use super::snapshot::{FrameSnapshot, features_from_names, visibility_from_str};
use crate::boundary::LocalBoxFuture;
use crate::boundary::runtime::{
    AnchorId, HitTestSourceId, ReferenceSpaceKind, RuntimeError, SessionEvent, SessionFeature, SessionMode,
    SessionRequest, SpaceId, XrFrame, XrRuntime, XrSession,
};
use crate::engine::math::Pose;

/// Frames older than this many callbacks are dropped if nobody pumps them.
const MAX_QUEUED_FRAMES: usize = 8;

const GL_FRAMEBUFFER: u32 = 0x8D40;
const GL_COLOR_BUFFER_BIT: u32 = 0x4000;

/// `XRSystem` of the page: `navigator.xr` or a polyfill's replacement.
pub struct WebXrRuntime {
    xr: JsValue,
}

impl WebXrRuntime {
    pub fn new(xr: JsValue) -> Self {
        Self { xr }
    }

    /// `navigator.xr`, when the browser has one.
    pub fn from_navigator() -> Option<Self> {
        let navigator = web_sys::window()?.navigator();
        let xr = js::get(&navigator, "xr").ok()?;
        (!js::is_absent(&xr)).then(|| Self::new(xr))
    }
}

impl XrRuntime for WebXrRuntime {
    fn is_session_supported(&self, mode: SessionMode) -> LocalBoxFuture<'_, Result<bool, RuntimeError>> {
        Box::pin(async move {
            let promise = js::invoke(&self.xr, "isSessionSupported", &[&JsValue::from_str(mode.as_str())])?;
            let supported = js::settle(promise).await.map_err(js::fault)?;
            Ok(supported.as_bool().unwrap_or(false))
        })
    }

    fn request_session<'a>(
        &'a self,
        mode: SessionMode,
        request: &'a SessionRequest,
    ) -> LocalBoxFuture<'a, Result<Box<dyn XrSession>, RuntimeError>> {
        Box::pin(async move {
            let options = session_options(request)?;
            let promise = js::invoke(&self.xr, "requestSession", &[&JsValue::from_str(mode.as_str()), &options])?;
            let session = js::settle(promise).await.map_err(|err| RuntimeError::Rejected {
                reason: js::describe(&err),
                feature: None,
            })?;
            info!("{} session granted", mode.as_str());

            let layer = match GlLayer::attach(&session) {
                Ok(layer) => layer,
                Err(err) => {
                    warn!("Could not attach a base layer: {}", err);
                    let _ = js::invoke(&session, "end", &[]);
                    return Err(err);
                }
            };
            let enabled = granted_features(&session, request);
            Ok(Box::new(WebXrSession::new(session, enabled, layer)?) as Box<dyn XrSession>)
        })
    }
}

fn session_options(request: &SessionRequest) -> Result<JsValue, RuntimeError> {
    let features: js_sys::Array = request
        .optional_features
        .iter()
        .map(|f| JsValue::from_str(f.as_str()))
        .collect();
    let mut entries = vec![("optionalFeatures", JsValue::from(features))];

    let root = request
        .overlay_root
        .as_deref()
        .filter(|_| request.requests(SessionFeature::DomOverlay))
        .and_then(|id| web_sys::window()?.document()?.get_element_by_id(id));
    if let Some(root) = root {
        entries.push(("domOverlay", js::object(&[("root", root.into())])?));
    }
    js::object(&entries)
}

/// `enabledFeatures` when the browser reports it. Older browsers do not;
/// then the request stands in, with the overlay only if an overlay state
/// exists.
fn granted_features(session: &JsValue, request: &SessionRequest) -> Vec<SessionFeature> {
    let reported = js::get(session, "enabledFeatures").unwrap_or(JsValue::UNDEFINED);
    if !js::is_absent(&reported) {
        let names = js::strings(&reported);
        return features_from_names(names.iter().map(String::as_str));
    }
    debug!("enabledFeatures not reported, assuming the requested set");
    let overlay_active = js::get(session, "domOverlayState").is_ok_and(|state| !js::is_absent(&state));
    request
        .optional_features
        .iter()
        .copied()
        .filter(|f| *f != SessionFeature::DomOverlay || overlay_active)
        .collect()
}

/// Transparent WebGL layer the session composites over the camera feed.
///
/// Content is drawn by the page canvas inside the overlay root; this layer
/// only has to exist and be cleared every frame.
struct GlLayer {
    gl: JsValue,
    layer: JsValue,
}

impl GlLayer {
    fn attach(session: &JsValue) -> Result<Self, RuntimeError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| RuntimeError::Fault("no document".into()))?;
        let canvas = document.create_element("canvas").map_err(js::fault)?;
        let attributes = js::object(&[
            ("xrCompatible", JsValue::TRUE),
            ("alpha", JsValue::TRUE),
        ])?;
        let mut gl = js::invoke(&canvas, "getContext", &[&JsValue::from_str("webgl2"), &attributes])?;
        if js::is_absent(&gl) {
            gl = js::invoke(&canvas, "getContext", &[&JsValue::from_str("webgl"), &attributes])?;
        }
        if js::is_absent(&gl) {
            return Err(RuntimeError::Fault("WebGL unavailable for the XR layer".into()));
        }
        let layer = js::construct("XRWebGLLayer", &[session, &gl])?;
        let state = js::object(&[("baseLayer", layer.clone())])?;
        js::invoke(session, "updateRenderState", &[&state])?;
        Ok(Self { gl, layer })
    }

    fn clear(&self) -> Result<(), RuntimeError> {
        let framebuffer = js::get(&self.layer, "framebuffer")?;
        js::invoke(&self.gl, "bindFramebuffer", &[&GL_FRAMEBUFFER.into(), &framebuffer])?;
        let zero = JsValue::from(0.0);
        js::invoke(&self.gl, "clearColor", &[&zero, &zero, &zero, &zero])?;
        js::invoke(&self.gl, "clear", &[&GL_COLOR_BUFFER_BIT.into()])?;
        Ok(())
    }
}

enum AnchorSlot {
    /// Requested; the runtime creates it on the next frame callback.
    Requested { pose: Pose, space: SpaceId },
    /// Creation promise in flight; the requested pose stands in.
    Pending { pose: Pose, space: SpaceId },
    Live(JsValue),
    Failed,
}

#[derive(Default)]
struct SessionState {
    spaces: Vec<JsValue>,
    hit_sources: Vec<JsValue>,
    anchors: BTreeMap<AnchorId, AnchorSlot>,
    next_anchor: u64,
    frames: VecDeque<FrameSnapshot>,
    events: Vec<SessionEvent>,
    last_time_ms: f64,
    ended: bool,
}

type FrameCallback = Closure<dyn FnMut(f64, JsValue)>;
type EventCallback = Closure<dyn FnMut(JsValue)>;

/// A granted `immersive-ar` session.
///
/// The browser's frame callback reads everything into a [`FrameSnapshot`]
/// and queues it; the viewer pulls queued frames on its own tick.
pub struct WebXrSession {
    session: JsValue,
    enabled: Vec<SessionFeature>,
    state: Rc<RefCell<SessionState>>,
    frame_loop: Rc<RefCell<Option<FrameCallback>>>,
    listeners: Vec<(&'static str, EventCallback)>,
}

impl WebXrSession {
    fn new(session: JsValue, enabled: Vec<SessionFeature>, layer: GlLayer) -> Result<Self, RuntimeError> {
        let state = Rc::new(RefCell::new(SessionState::default()));
        let mut this = Self {
            session,
            enabled,
            state,
            frame_loop: Rc::new(RefCell::new(None)),
            listeners: Vec::new(),
        };
        this.listen()?;
        this.start_frame_loop(layer)?;
        Ok(this)
    }

    fn listen(&mut self) -> Result<(), RuntimeError> {
        let select_state = self.state.clone();
        let select = Closure::wrap(Box::new(move |_event: JsValue| {
            select_state.borrow_mut().events.push(SessionEvent::Select);
        }) as Box<dyn FnMut(JsValue)>);

        let end_state = self.state.clone();
        let end = Closure::wrap(Box::new(move |_event: JsValue| {
            let mut state = end_state.borrow_mut();
            if !state.ended {
                info!("Session ended by the browser");
                // No more frame callbacks will come to carry the event.
                let last = FrameSnapshot::at(state.last_time_ms);
                state.frames.push_back(last);
                state.events.push(SessionEvent::End);
            }
            state.ended = true;
        }) as Box<dyn FnMut(JsValue)>);

        let visibility_state = self.state.clone();
        let session = self.session.clone();
        let visibility = Closure::wrap(Box::new(move |_event: JsValue| {
            let reported = js::get(&session, "visibilityState").ok().and_then(|v| v.as_string());
            match reported.as_deref().and_then(visibility_from_str) {
                Some(state) => visibility_state
                    .borrow_mut()
                    .events
                    .push(SessionEvent::VisibilityChange(state)),
                None => debug!("Unknown visibility state {:?}", reported),
            }
        }) as Box<dyn FnMut(JsValue)>);

        for (name, callback) in [("select", select), ("end", end), ("visibilitychange", visibility)] {
            js::invoke(&self.session, "addEventListener", &[&JsValue::from_str(name), callback.as_ref()])?;
            self.listeners.push((name, callback));
        }
        Ok(())
    }

    fn start_frame_loop(&mut self, layer: GlLayer) -> Result<(), RuntimeError> {
        let state = self.state.clone();
        let session = self.session.clone();
        let frame_loop = self.frame_loop.clone();

        let callback = Closure::wrap(Box::new(move |time: f64, frame: JsValue| {
            if state.borrow().ended {
                return;
            }
            if let Some(callback) = frame_loop.borrow().as_ref() {
                if let Err(err) = js::invoke(&session, "requestAnimationFrame", &[callback.as_ref()]) {
                    warn!("Could not schedule the next XR frame: {}", err);
                }
            }
            create_requested_anchors(&state, &frame);
            let snapshot = read_frame(&state.borrow(), &frame, time);
            {
                let mut state = state.borrow_mut();
                state.last_time_ms = time;
                if state.frames.len() == MAX_QUEUED_FRAMES {
                    state.frames.pop_front();
                }
                state.frames.push_back(snapshot);
            }
            if let Err(err) = layer.clear() {
                debug!("XR layer clear failed: {}", err);
            }
        }) as Box<dyn FnMut(f64, JsValue)>);

        js::invoke(&self.session, "requestAnimationFrame", &[callback.as_ref()])?;
        *self.frame_loop.borrow_mut() = Some(callback);
        Ok(())
    }

    fn space(&self, space: SpaceId) -> Result<JsValue, RuntimeError> {
        self.state
            .borrow()
            .spaces
            .get(space.0 as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::Fault(format!("unknown space {}", space.0)))
    }
}

/// Anchor creation is only possible inside a frame callback.
fn create_requested_anchors(state: &Rc<RefCell<SessionState>>, frame: &JsValue) {
    let requests: Vec<(AnchorId, Pose, SpaceId)> = {
        let mut inner = state.borrow_mut();
        let mut requests = Vec::new();
        for (id, slot) in inner.anchors.iter_mut() {
            if let AnchorSlot::Requested { pose, space } = *slot {
                requests.push((*id, pose, space));
                *slot = AnchorSlot::Pending { pose, space };
            }
        }
        requests
    };

    for (id, pose, space) in requests {
        let Some(space_js) = state.borrow().spaces.get(space.0 as usize).cloned() else {
            continue;
        };
        let promise = rigid_transform(&pose).and_then(|t| js::invoke(frame, "createAnchor", &[&t, &space_js]));
        let state = state.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let created = match promise {
                Ok(promise) => js::settle(promise).await.map_err(js::fault),
                Err(err) => Err(err),
            };
            let mut inner = state.borrow_mut();
            match (created, inner.anchors.get_mut(&id)) {
                (Ok(anchor), Some(slot)) => {
                    debug!("Anchor {} created", id.0);
                    *slot = AnchorSlot::Live(anchor);
                }
                (Ok(anchor), None) => {
                    // Deleted while the promise was pending.
                    let _ = js::invoke(&anchor, "delete", &[]);
                }
                (Err(err), Some(slot)) => {
                    warn!("Anchor {} refused: {}", id.0, err);
                    *slot = AnchorSlot::Failed;
                }
                (Err(_), None) => {}
            }
        });
    }
}

fn rigid_transform(pose: &Pose) -> Result<JsValue, RuntimeError> {
    let p = pose.position();
    let q = pose.rotation();
    let position = js::object(&[
        ("x", p.x.into()),
        ("y", p.y.into()),
        ("z", p.z.into()),
        ("w", 1.0.into()),
    ])?;
    let orientation = js::object(&[
        ("x", q.x.into()),
        ("y", q.y.into()),
        ("z", q.z.into()),
        ("w", q.w.into()),
    ])?;
    js::construct("XRRigidTransform", &[&position, &orientation])
}

fn read_frame(state: &SessionState, frame: &JsValue, time: f64) -> FrameSnapshot {
    let mut snapshot = FrameSnapshot::at(time);
    for (index, space_js) in state.spaces.iter().enumerate() {
        let space = SpaceId(index as u32);

        if let Some(pose) = js::invoke(frame, "getViewerPose", &[space_js])
            .ok()
            .as_ref()
            .and_then(js::transform_pose)
        {
            snapshot.viewer.insert(space, pose);
        }

        for (source_index, source_js) in state.hit_sources.iter().enumerate() {
            let hits = js::invoke(frame, "getHitTestResults", &[source_js]).map(|results| {
                js::array(&results)
                    .iter()
                    .filter_map(|result| js::invoke(result, "getPose", &[space_js]).ok())
                    .filter_map(|pose| js::transform_pose(&pose))
                    .collect()
            });
            snapshot.hits.insert((HitTestSourceId(source_index as u32), space), hits);
        }

        for (id, slot) in &state.anchors {
            let pose = match slot {
                AnchorSlot::Requested { pose, space: at } | AnchorSlot::Pending { pose, space: at } => {
                    Ok((*at == space).then_some(*pose))
                }
                AnchorSlot::Live(anchor) => js::get(anchor, "anchorSpace")
                    .and_then(|anchor_space| js::invoke(frame, "getPose", &[&anchor_space, space_js]))
                    .map(|pose| js::transform_pose(&pose)),
                AnchorSlot::Failed => Ok(None),
            };
            snapshot.anchors.insert((*id, space), pose);
        }
    }
    snapshot
}

impl XrSession for WebXrSession {
    fn enabled_features(&self) -> Vec<SessionFeature> {
        self.enabled.clone()
    }

    fn request_reference_space(
        &mut self,
        kind: ReferenceSpaceKind,
    ) -> LocalBoxFuture<'_, Result<SpaceId, RuntimeError>> {
        Box::pin(async move {
            let unavailable = |_| RuntimeError::ReferenceSpaceUnavailable(kind.as_str());
            let promise = js::invoke(&self.session, "requestReferenceSpace", &[&JsValue::from_str(kind.as_str())])?;
            let space = js::settle(promise).await.map_err(unavailable)?;
            let mut state = self.state.borrow_mut();
            state.spaces.push(space);
            Ok(SpaceId(state.spaces.len() as u32 - 1))
        })
    }

    fn request_hit_test_source(
        &mut self,
        space: SpaceId,
    ) -> LocalBoxFuture<'_, Result<HitTestSourceId, RuntimeError>> {
        Box::pin(async move {
            let options = js::object(&[("space", self.space(space)?)])?;
            let promise = js::invoke(&self.session, "requestHitTestSource", &[&options])?;
            let source = js::settle(promise).await.map_err(js::fault)?;
            let mut state = self.state.borrow_mut();
            state.hit_sources.push(source);
            Ok(HitTestSourceId(state.hit_sources.len() as u32 - 1))
        })
    }

    fn create_anchor(&mut self, pose: &Pose, space: SpaceId) -> Result<AnchorId, RuntimeError> {
        if !self.enabled.contains(&SessionFeature::Anchors) {
            return Err(RuntimeError::Fault("anchors were not granted".into()));
        }
        self.space(space)?;
        let mut state = self.state.borrow_mut();
        state.next_anchor += 1;
        let id = AnchorId(state.next_anchor);
        state.anchors.insert(id, AnchorSlot::Requested { pose: *pose, space });
        Ok(id)
    }

    fn delete_anchor(&mut self, anchor: AnchorId) -> Result<(), RuntimeError> {
        let removed = self.state.borrow_mut().anchors.remove(&anchor);
        if let Some(AnchorSlot::Live(anchor)) = removed {
            js::invoke(&anchor, "delete", &[])?;
        }
        Ok(())
    }

    fn poll_frame(&mut self) -> Option<Box<dyn XrFrame>> {
        let frame = self.state.borrow_mut().frames.pop_front()?;
        Some(Box::new(frame))
    }

    fn poll_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }

    fn end(&mut self) {
        let already_ended = std::mem::replace(&mut self.state.borrow_mut().ended, true);
        for source in std::mem::take(&mut self.state.borrow_mut().hit_sources) {
            let _ = js::invoke(&source, "cancel", &[]);
        }
        for (name, callback) in self.listeners.drain(..) {
            let _ = js::invoke(&self.session, "removeEventListener", &[&JsValue::from_str(name), callback.as_ref()]);
        }
        // A frame callback may still be queued until the browser finishes
        // ending the session, so the closure is leaked rather than dropped.
        if let Some(callback) = self.frame_loop.borrow_mut().take() {
            callback.forget();
        }
        if already_ended {
            return;
        }
        match js::invoke(&self.session, "end", &[]) {
            Ok(promise) => wasm_bindgen_futures::spawn_local(async move {
                if let Err(err) = js::settle(promise).await {
                    debug!("Session end rejected: {}", js::describe(&err));
                }
            }),
            Err(err) => warn!("Could not end the session: {}", err),
        }
    }
}

impl Drop for WebXrSession {
    fn drop(&mut self) {
        self.end();
    }
}
