use std::rc::Rc;

use bevy::log::{debug, info, warn};
use bevy::math::Mat4;
use constants::reticle::MARKER_RETICLE_COLOUR;

use super::{ArBackend, BackendStatus};
use crate::boundary::runtime::{ImageTrackingState, MarkerRuntime, MarkerSession, SessionEvent, XrFrame};
use crate::boundary::{
    Affordance, AssetKind, Boundary, Hint, LoadTicket, LocalBoxFuture, NodeId, NodeSource, ReticleGlyph, ReticleVisual,
};
use crate::engine::capability::BackendKind;
use crate::engine::config::ArConfig;
use crate::engine::error::{ArError, FrameError, StartupError};
use crate::engine::math::Pose;
use crate::engine::session::EndReason;
use crate::tools::placement::{ContentNodes, build_content};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Searching,
    Tracking,
    Lost,
}

impl TrackingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Tracking => "tracking",
            Self::Lost => "lost",
        }
    }
}

/// Follows the first image target.
///
/// While the image is tracked the content rides on the target node. When it
/// is lost the content is detached at its last world pose and stays visible.
pub struct MarkerTracker {
    target: NodeId,
    kind: AssetKind,
    content: Option<ContentNodes>,
    pending: Option<LoadTicket>,
    state: TrackingState,
    last_world: Option<Mat4>,
}

impl MarkerTracker {
    /// Create the hidden target node and request the marker's content.
    pub fn new(boundary: &mut Boundary, config: &ArConfig) -> Self {
        let target = boundary.renderer.create_node(NodeSource::Group);
        boundary.renderer.set_visible(target, false);
        let kind = config.marker.asset;
        let ticket = boundary.assets.request(kind, &config.asset(kind).path);
        Self {
            target,
            kind,
            content: None,
            pending: Some(ticket),
            state: TrackingState::Searching,
            last_world: None,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn content(&self) -> Option<&ContentNodes> {
        self.content.as_ref()
    }

    pub fn on_frame(&mut self, frame: &dyn XrFrame, boundary: &mut Boundary, config: &ArConfig) {
        self.collect_content(boundary, config);

        let results = match frame.image_tracking_results() {
            Ok(results) => results,
            Err(err) => {
                warn!("{}", FrameError::ImageTracking(err));
                return;
            }
        };
        let tracked = results
            .iter()
            .find(|r| r.image_index == 0 && r.state == ImageTrackingState::Tracked);
        match tracked {
            Some(result) => self.found(&result.pose, boundary),
            None => self.lost(boundary),
        }
    }

    fn collect_content(&mut self, boundary: &mut Boundary, config: &ArConfig) {
        for completion in boundary.assets.poll_completed() {
            if self.pending != Some(completion.ticket) {
                debug!("Discarding stale load {:?}", completion.ticket);
                continue;
            }
            self.pending = None;
            if let Err(err) = &completion.result {
                boundary.overlay.show_error(&ArError::from(err.clone()).user_message());
            }
            let nodes = build_content(
                boundary.renderer.as_mut(),
                self.kind,
                self.kind.surface(),
                &completion.result,
                config,
            );
            match (self.state, self.last_world) {
                (TrackingState::Lost, Some(world)) => {
                    boundary.renderer.set_local_matrix(nodes.root, world);
                }
                _ => {
                    boundary.renderer.set_parent(nodes.root, Some(self.target));
                    boundary.renderer.set_local_matrix(nodes.root, Mat4::IDENTITY);
                }
            }
            boundary.renderer.set_visible(nodes.root, true);
            self.content = Some(nodes);
        }
    }

    fn found(&mut self, pose: &Pose, boundary: &mut Boundary) {
        let world = pose.matrix();
        boundary.renderer.set_local_matrix(self.target, world);
        boundary.renderer.set_visible(self.target, true);
        self.last_world = Some(world);

        if self.state == TrackingState::Tracking {
            return;
        }
        if let Some(content) = &self.content {
            boundary.renderer.set_parent(content.root, Some(self.target));
            boundary.renderer.set_local_matrix(content.root, Mat4::IDENTITY);
        }
        boundary.overlay.hide(Affordance::Hint);
        info!("Marker found");
        self.state = TrackingState::Tracking;
    }

    fn lost(&mut self, boundary: &mut Boundary) {
        if self.state != TrackingState::Tracking {
            return;
        }
        if let (Some(content), Some(world)) = (&self.content, self.last_world) {
            boundary.renderer.set_parent(content.root, None);
            boundary.renderer.set_local_matrix(content.root, world);
        }
        boundary.renderer.set_visible(self.target, false);
        boundary.overlay.show(Affordance::Hint);
        boundary.overlay.set_hint(Hint::FindMarker);
        info!("Marker lost, content left at its last pose");
        self.state = TrackingState::Lost;
    }

    /// Plus glyph on the image while it is tracked.
    pub fn debug_visual(&self) -> Option<ReticleVisual> {
        if self.state != TrackingState::Tracking {
            return None;
        }
        let world = self.last_world?;
        Some(ReticleVisual {
            pose: Pose::from_matrix(world),
            glyph: ReticleGlyph::Plus,
            colour: MARKER_RETICLE_COLOUR,
        })
    }

    /// Remove the target and any detached content from the scene.
    pub fn dispose(self, boundary: &mut Boundary) {
        if let Some(content) = self.content {
            boundary.renderer.dispose(content.root);
        }
        boundary.renderer.dispose(self.target);
    }
}

/// Image-tracking fallback for devices without immersive AR.
pub struct MarkerBackend {
    runtime: Rc<dyn MarkerRuntime>,
    config: ArConfig,
    session: Option<Box<dyn MarkerSession>>,
    tracker: Option<MarkerTracker>,
    frames: u64,
    debug: bool,
}

impl MarkerBackend {
    pub fn new(runtime: Rc<dyn MarkerRuntime>, config: ArConfig) -> Self {
        let debug = config.debug_reticle;
        Self {
            runtime,
            config,
            session: None,
            tracker: None,
            frames: 0,
            debug,
        }
    }

    pub fn tracker(&self) -> Option<&MarkerTracker> {
        self.tracker.as_ref()
    }
}

impl ArBackend for MarkerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Marker
    }

    fn start<'a>(&'a mut self, boundary: &'a mut Boundary) -> LocalBoxFuture<'a, Result<(), ArError>> {
        Box::pin(async move {
            if self.session.is_some() {
                debug!("Marker session already running");
                return Ok(());
            }
            boundary
                .renderer
                .mount(&self.config.canvas)
                .map_err(StartupError::from)?;

            let descriptor = &self.config.marker.descriptor;
            let session = self
                .runtime
                .start(descriptor)
                .await
                .map_err(|err| StartupError::BackendLoad {
                    backend: BackendKind::Marker.as_str(),
                    path: descriptor.path.clone(),
                    reason: err.to_string(),
                })?;

            self.tracker = Some(MarkerTracker::new(boundary, &self.config));
            self.session = Some(session);
            boundary.overlay.enter_ar();
            boundary.overlay.show(Affordance::Close);
            boundary.overlay.show(Affordance::Hint);
            boundary.overlay.set_hint(Hint::FindMarker);
            boundary.renderer.set_animation_loop(true);
            info!("Marker tracking started with {}", self.config.marker.descriptor.path);
            Ok(())
        })
    }

    fn pump(&mut self, boundary: &mut Boundary) -> usize {
        let mut processed = 0;
        loop {
            let Some(session) = self.session.as_mut() else {
                break;
            };
            let Some(frame) = session.poll_frame() else {
                break;
            };
            let events = session.poll_events();
            processed += 1;
            self.frames += 1;

            let ended = events.contains(&SessionEvent::End);
            if !ended {
                if let Some(tracker) = self.tracker.as_mut() {
                    tracker.on_frame(frame.as_ref(), boundary, &self.config);
                    let visual = if self.debug { tracker.debug_visual() } else { None };
                    boundary.renderer.set_reticle(visual);
                }
            }
            boundary.renderer.submit();
            if ended {
                self.end(boundary, EndReason::RuntimeEnded);
                break;
            }
        }
        processed
    }

    fn reset(&mut self, _boundary: &mut Boundary) {
        debug!("Reset ignored: marker content follows the image");
    }

    fn end(&mut self, boundary: &mut Boundary, reason: EndReason) {
        let Some(mut session) = self.session.take() else {
            debug!("Marker session already ended");
            return;
        };
        session.stop();
        if let Some(tracker) = self.tracker.take() {
            tracker.dispose(boundary);
        }
        boundary.renderer.set_reticle(None);
        boundary.renderer.set_animation_loop(false);
        boundary.overlay.hide(Affordance::Close);
        boundary.overlay.hide(Affordance::Hint);
        if reason.restores_pre_ar() {
            boundary.overlay.restore_pre_ar();
        }
        info!("Marker session closed ({:?})", reason);
    }

    fn exit_to_quiz(&mut self, _boundary: &mut Boundary) {
        warn!("Quiz hand-off is not offered by the marker back-end");
    }

    fn current_asset_kind(&self) -> Option<AssetKind> {
        self.tracker
            .as_ref()
            .and_then(|t| t.content.as_ref().map(|_| t.kind))
    }

    fn is_running(&self) -> bool {
        self.session.is_some()
    }

    fn toggle_debug(&mut self, boundary: &mut Boundary) {
        self.debug = !self.debug;
        info!("Marker debug glyph {}", if self.debug { "on" } else { "off" });
        let visual = self.tracker.as_ref().and_then(|t| t.debug_visual());
        boundary.renderer.set_reticle(visual.filter(|_| self.debug));
    }

    fn status(&self) -> BackendStatus {
        BackendStatus {
            backend: BackendKind::Marker.as_str(),
            running: self.is_running(),
            phase: self
                .tracker
                .as_ref()
                .map_or("idle", |t| t.state().as_str()),
            asset: self.current_asset_kind().map(|k| k.as_str()),
            frames: self.frames,
            debug_reticle: self.debug,
        }
    }
}
