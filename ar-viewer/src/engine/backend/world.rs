use std::rc::Rc;

use bevy::log::{debug, info, warn};

use super::{ArBackend, BackendStatus};
use crate::boundary::runtime::{SessionEvent, XrFrame, XrRuntime};
use crate::boundary::{Affordance, AssetKind, Boundary, LocalBoxFuture};
use crate::engine::capability::BackendKind;
use crate::engine::config::ArConfig;
use crate::engine::error::{ArError, FrameError, SetupError, StartupError};
use crate::engine::session::{EndReason, SessionController};
use crate::tools::anchor_store::AnchorRuntime;
use crate::tools::placement::{FrameInput, PlacementEngine};

const SESSION_AFFORDANCES: [Affordance; 4] = [
    Affordance::Reset,
    Affordance::Close,
    Affordance::DebugToggle,
    Affordance::Hint,
];

/// Immersive back-end: hit-test placement, anchors and the gaze hand-off.
pub struct WorldBackend {
    runtime: Rc<dyn XrRuntime>,
    config: ArConfig,
    controller: Option<SessionController>,
    engine: PlacementEngine,
    frames: u64,
}

impl WorldBackend {
    pub fn new(runtime: Rc<dyn XrRuntime>, config: ArConfig, seed: u64) -> Self {
        let engine = PlacementEngine::new(&config, seed);
        Self {
            runtime,
            config,
            controller: None,
            engine,
            frames: 0,
        }
    }

    pub fn engine(&self) -> &PlacementEngine {
        &self.engine
    }

    pub fn controller(&self) -> Option<&SessionController> {
        self.controller.as_ref()
    }

    /// One frame callback. Rendering is always the last step, whatever
    /// happened before it.
    fn on_frame(&mut self, frame: &dyn XrFrame, events: &[SessionEvent], boundary: &mut Boundary) -> Option<EndReason> {
        self.frames += 1;
        let end = self.frame_body(frame, events, boundary);
        boundary.renderer.submit();
        end
    }

    fn frame_body(&mut self, frame: &dyn XrFrame, events: &[SessionEvent], boundary: &mut Boundary) -> Option<EndReason> {
        let controller = self.controller.as_mut()?;
        if events.contains(&SessionEvent::End) {
            return Some(EndReason::RuntimeEnded);
        }

        let viewer = controller.viewer_pose(frame);
        if let Some(viewer) = &viewer {
            boundary.renderer.set_camera(viewer);
        }
        let hit = controller.first_hit(frame).unwrap_or_else(|err| {
            warn!("{}", FrameError::HitTest(err));
            None
        });

        let input = FrameInput {
            now_ms: frame.timestamp_ms(),
            frame,
            space: controller.space(),
            viewer,
            hit,
            tapped: events.contains(&SessionEvent::Select),
            hidden: controller.is_hidden(),
        };
        self.engine.on_frame(&input, controller, boundary);
        None
    }
}

impl ArBackend for WorldBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::World
    }

    fn start<'a>(&'a mut self, boundary: &'a mut Boundary) -> LocalBoxFuture<'a, Result<(), ArError>> {
        Box::pin(async move {
            if self.controller.is_some() {
                debug!("World session already running");
                return Ok(());
            }
            if !boundary.overlay.has_root(&self.config.overlay_root) {
                return Err(SetupError::MissingOverlayRoot(self.config.overlay_root.clone()).into());
            }
            boundary
                .renderer
                .mount(&self.config.canvas)
                .map_err(StartupError::from)?;

            let controller = SessionController::start(
                self.runtime.as_ref(),
                &self.config.overlay_root,
                boundary.renderer.as_mut(),
            )
            .await?;

            boundary.overlay.enter_ar();
            for affordance in SESSION_AFFORDANCES {
                boundary.overlay.show(affordance);
            }
            self.engine.begin(controller.features(), boundary);
            self.controller = Some(controller);
            Ok(())
        })
    }

    fn pump(&mut self, boundary: &mut Boundary) -> usize {
        let mut processed = 0;
        while let Some((frame, events)) = self.controller.as_mut().and_then(|c| c.poll_frame()) {
            processed += 1;
            if let Some(reason) = self.on_frame(frame.as_ref(), &events, boundary) {
                self.end(boundary, reason);
                break;
            }
        }
        processed
    }

    fn reset(&mut self, boundary: &mut Boundary) {
        let runtime = self.controller.as_mut().map(|c| c as &mut dyn AnchorRuntime);
        self.engine.reset(runtime, boundary);
    }

    fn end(&mut self, boundary: &mut Boundary, reason: EndReason) {
        // Taking the controller stops the pump before anything is torn down.
        let Some(mut controller) = self.controller.take() else {
            debug!("World session already ended");
            return;
        };
        self.engine.shutdown(&mut controller, boundary);
        controller.finish(boundary.renderer.as_mut());
        boundary.renderer.set_reticle(None);

        boundary.overlay.hide(Affordance::ContinueToQuiz);
        for affordance in SESSION_AFFORDANCES {
            boundary.overlay.hide(affordance);
        }
        if reason.restores_pre_ar() {
            boundary.overlay.restore_pre_ar();
        }
        info!("World session closed ({:?})", reason);
    }

    fn exit_to_quiz(&mut self, boundary: &mut Boundary) {
        if self.controller.is_none() {
            warn!("Quiz hand-off requested with no session running");
            return;
        }
        let Some(kind) = self.engine.current_asset_kind() else {
            warn!("Quiz hand-off requested before anything was placed");
            return;
        };
        self.end(boundary, EndReason::QuizHandoff);
        boundary.quiz.present(kind);
    }

    fn current_asset_kind(&self) -> Option<AssetKind> {
        self.engine.current_asset_kind()
    }

    fn is_running(&self) -> bool {
        self.controller.is_some()
    }

    fn toggle_debug(&mut self, boundary: &mut Boundary) {
        if !self.engine.toggle_debug_reticle() {
            boundary.renderer.set_reticle(None);
        }
    }

    fn status(&self) -> BackendStatus {
        BackendStatus {
            backend: BackendKind::World.as_str(),
            running: self.is_running(),
            phase: self.engine.state().as_str(),
            asset: self.engine.current_asset_kind().map(|k| k.as_str()),
            frames: self.frames,
            debug_reticle: self.engine.debug_reticle(),
        }
    }
}
