use bevy::log::{debug, info, warn};
use bevy::math::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::content::{build_content, placement_matrix};
use super::state::{Anchoring, PendingSpawn, PlacedContent, PlacementState, SpawnRecord, SpawnTrigger};
use crate::boundary::runtime::{SpaceId, XrFrame};
use crate::boundary::{Affordance, AssetKind, Boundary, Hint, LoadCompletion};
use crate::engine::capability::{HitTestSupport, SessionFeatures};
use crate::engine::config::ArConfig;
use crate::engine::error::ArError;
use crate::engine::math::Pose;
use crate::engine::surface::{SurfaceClass, classify_gaze_direction};
use crate::tools::anchor_store::{AnchorRuntime, AnchorStore};
use crate::tools::gaze::{GazeDetector, GazeOutcome, GazeState};
use crate::tools::reticle::Reticle;

/// Everything the engine reads from one runtime frame.
pub struct FrameInput<'a> {
    pub now_ms: f64,
    pub frame: &'a dyn XrFrame,
    pub space: SpaceId,
    pub viewer: Option<Pose>,
    /// First hit-test result; `None` on a miss, a fault or without hit-test.
    pub hit: Option<Pose>,
    pub tapped: bool,
    /// Page hidden: timers hold and taps are dropped.
    pub hidden: bool,
}

/// Placement state machine for the world back-end.
///
/// Owns the reticle, gaze detector, anchor store and placed content. All
/// runtime access goes through the [`AnchorRuntime`] and [`Boundary`]
/// handed in per call, so the engine never outlives a session's borrow.
pub struct PlacementEngine {
    config: ArConfig,
    rng: StdRng,
    state: PlacementState,
    features: Option<SessionFeatures>,
    reticle: Reticle,
    gaze: GazeDetector,
    anchors: AnchorStore,
    content: Option<PlacedContent>,
    pending: Option<PendingSpawn>,
    auto_spawn_delay_ms: f64,
    timer_origin: Option<f64>,
    last_frame_at: Option<f64>,
    last_spawn_at: Option<f64>,
    has_placed: bool,
    /// Anchor created this frame; the frame's snapshot cannot know it yet.
    fresh_anchor: bool,
    continue_pending: bool,
    continue_shown: bool,
    debug_reticle: bool,
    hint: Option<Hint>,
    spawns: Vec<SpawnRecord>,
}

impl PlacementEngine {
    pub fn new(config: &ArConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let auto_spawn_delay_ms = draw_delay(&mut rng, config.auto_spawn_delay_ms);
        Self {
            reticle: Reticle::new(config.stability_epsilon_m),
            gaze: GazeDetector::new(
                config.gaze_half_angle_rad,
                config.gaze_max_distance_m,
                config.gaze_dwell_ms,
            ),
            anchors: AnchorStore::default(),
            config: config.clone(),
            rng,
            state: PlacementState::Idle,
            features: None,
            content: None,
            pending: None,
            auto_spawn_delay_ms,
            timer_origin: None,
            last_frame_at: None,
            last_spawn_at: None,
            has_placed: false,
            fresh_anchor: false,
            continue_pending: false,
            continue_shown: false,
            debug_reticle: config.debug_reticle,
            hint: None,
            spawns: Vec::new(),
        }
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn content(&self) -> Option<&PlacedContent> {
        self.content.as_ref()
    }

    pub fn current_asset_kind(&self) -> Option<AssetKind> {
        self.content.as_ref().map(|c| c.kind)
    }

    pub fn reticle(&self) -> &Reticle {
        &self.reticle
    }

    pub fn gaze_state(&self) -> GazeState {
        self.gaze.state()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn auto_spawn_delay_ms(&self) -> f64 {
        self.auto_spawn_delay_ms
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn continue_shown(&self) -> bool {
        self.continue_shown
    }

    pub fn spawns(&self) -> &[SpawnRecord] {
        &self.spawns
    }

    pub fn debug_reticle(&self) -> bool {
        self.debug_reticle
    }

    pub fn toggle_debug_reticle(&mut self) -> bool {
        self.debug_reticle = !self.debug_reticle;
        info!("Debug reticle {}", if self.debug_reticle { "on" } else { "off" });
        self.debug_reticle
    }

    /// Enter `searching` for a freshly started session.
    pub fn begin(&mut self, features: SessionFeatures, boundary: &mut Boundary) {
        self.features = Some(features);
        self.anchors.set_support(features.anchors);
        self.state = PlacementState::Searching;
        self.clear_timers();
        self.gaze.reset();
        self.spawns.clear();
        self.set_hint(Hint::Scanning, boundary);
        info!(
            "Placement searching (auto-spawn after {:.0} ms)",
            self.auto_spawn_delay_ms
        );
    }

    /// Run one frame. Faults are contained here; nothing propagates out.
    pub fn on_frame(&mut self, input: &FrameInput, runtime: &mut dyn AnchorRuntime, boundary: &mut Boundary) {
        if self.state == PlacementState::Idle {
            return;
        }
        let now = input.now_ms;
        let delta = self.last_frame_at.map_or(0.0, |last| (now - last).max(0.0));
        self.last_frame_at = Some(now);

        // Requested on an earlier frame, so it lands after that render.
        if self.continue_pending {
            self.continue_pending = false;
            self.continue_shown = true;
            boundary.overlay.show(Affordance::ContinueToQuiz);
        }

        let completions = boundary.assets.poll_completed();
        for completion in completions {
            self.resolve_load(completion, now, runtime, boundary);
        }

        let origin = *self.timer_origin.get_or_insert(now);
        if input.hidden {
            // Hold the auto-spawn clock and drop anything time-based.
            self.timer_origin = Some(origin + delta);
            self.reticle.clear();
            self.gaze.interrupt();
            boundary.renderer.set_reticle(None);
            return;
        }

        self.update_reticle(input);
        self.run_transitions(input, runtime, boundary);
        self.update_anchor(input, boundary);
        self.update_gaze(input, delta, boundary);
        self.update_hint(boundary);

        boundary.renderer.set_reticle(self.reticle.visual(self.debug_reticle));
    }

    /// Clear placement and go back to `searching`. A second call in a row
    /// changes nothing.
    pub fn reset(&mut self, runtime: Option<&mut dyn AnchorRuntime>, boundary: &mut Boundary) {
        let dirty = self.content.is_some()
            || self.pending.is_some()
            || !self.anchors.is_empty()
            || self.timer_origin.is_some()
            || self.continue_shown
            || self.continue_pending
            || self.state != self.resting_state();
        if !dirty {
            debug!("Reset with nothing to clear");
            return;
        }

        self.clear_content(runtime, boundary);
        self.state = self.resting_state();
        self.clear_timers();
        self.auto_spawn_delay_ms = draw_delay(&mut self.rng, self.config.auto_spawn_delay_ms);
        if self.state == PlacementState::Searching {
            self.set_hint(Hint::Scanning, boundary);
        }
        info!(
            "Placement reset (auto-spawn after {:.0} ms)",
            self.auto_spawn_delay_ms
        );
    }

    /// Full cleanup on session end: anchors released, content disposed,
    /// back to `idle`.
    pub fn shutdown(&mut self, runtime: &mut dyn AnchorRuntime, boundary: &mut Boundary) {
        self.clear_content(Some(runtime), boundary);
        self.state = PlacementState::Idle;
        self.features = None;
        self.clear_timers();
        self.hint = None;
        self.auto_spawn_delay_ms = draw_delay(&mut self.rng, self.config.auto_spawn_delay_ms);
        info!("Placement idle");
    }

    fn resting_state(&self) -> PlacementState {
        if self.features.is_some() {
            PlacementState::Searching
        } else {
            PlacementState::Idle
        }
    }

    fn clear_timers(&mut self) {
        self.timer_origin = None;
        self.last_frame_at = None;
        self.last_spawn_at = None;
        self.has_placed = false;
    }

    fn clear_content(&mut self, runtime: Option<&mut dyn AnchorRuntime>, boundary: &mut Boundary) {
        if let Some(pending) = self.pending.take() {
            debug!("Dropping in-flight load {:?}", pending.ticket);
        }
        if let Some(content) = self.content.take() {
            boundary.renderer.dispose(content.root);
        }
        match runtime {
            Some(runtime) => self.anchors.release_all(runtime),
            None if !self.anchors.is_empty() => {
                warn!("{} anchors left without a session to release them", self.anchors.len());
                self.anchors = AnchorStore::new(self.anchors.support());
            }
            None => {}
        }
        self.reticle.clear();
        self.gaze.reset();
        self.continue_pending = false;
        if self.continue_shown {
            self.continue_shown = false;
            boundary.overlay.hide(Affordance::ContinueToQuiz);
        }
        boundary.renderer.set_reticle(None);
    }

    fn hit_test_available(&self) -> bool {
        self.features
            .is_some_and(|features| features.hit_test == HitTestSupport::Available)
    }

    fn update_reticle(&mut self, input: &FrameInput) {
        if self.hit_test_available() {
            self.reticle.update_from_hit(input.hit, input.now_ms);
        } else if let Some(viewer) = &input.viewer {
            self.reticle.update_from_gaze(viewer, self.config.fallback_distance_m);
        } else {
            self.reticle.clear();
        }
    }

    fn run_transitions(&mut self, input: &FrameInput, runtime: &mut dyn AnchorRuntime, boundary: &mut Boundary) {
        if self.pending.is_some() {
            // The in-flight load extends the current state.
            return;
        }
        let now = input.now_ms;

        match self.state {
            PlacementState::Searching | PlacementState::Stable => {
                let stable = self.reticle.is_stable(now, self.config.stability_gate_ms);
                let next = if stable {
                    PlacementState::Stable
                } else {
                    PlacementState::Searching
                };
                if next != self.state {
                    debug!("Placement {} -> {}", self.state.as_str(), next.as_str());
                    self.state = next;
                }

                if input.tapped {
                    if let Some((pose, class)) = self.tap_target(input) {
                        self.spawn(pose, class, SpawnTrigger::Tap, now, runtime, boundary);
                    }
                } else if self.state == PlacementState::Stable && !self.has_placed {
                    let elapsed = now - self.timer_origin.unwrap_or(now);
                    if elapsed >= self.auto_spawn_delay_ms {
                        if let Some((pose, class)) = self.reticle.target() {
                            self.spawn(pose, class, SpawnTrigger::Auto, now, runtime, boundary);
                        }
                    }
                }
            }
            PlacementState::Placed | PlacementState::Lost => {
                if input.tapped {
                    if let Some((pose, class)) = self.tap_target(input) {
                        self.spawn(pose, class, SpawnTrigger::Tap, now, runtime, boundary);
                    }
                } else if self.state == PlacementState::Placed && self.should_respawn(input) {
                    if let Some((pose, class)) = self.reticle.target() {
                        self.spawn(pose, class, SpawnTrigger::Respawn, now, runtime, boundary);
                    }
                }
            }
            PlacementState::Idle => {}
        }
    }

    /// Reticle pose when a hit is showing; otherwise a point ahead of the
    /// camera facing it, classed by gaze direction.
    fn tap_target(&self, input: &FrameInput) -> Option<(Pose, SurfaceClass)> {
        if let Some(target) = self.reticle.target() {
            return Some(target);
        }
        let viewer = input.viewer?;
        let point = viewer.point_ahead(self.config.fallback_distance_m);
        let pose = Pose::facing(point, viewer.position(), Vec3::Y);
        Some((pose, classify_gaze_direction(viewer.forward())))
    }

    fn should_respawn(&self, input: &FrameInput) -> bool {
        let (Some(content), Some(viewer)) = (&self.content, &input.viewer) else {
            return false;
        };
        let far = viewer.distance_to(content.placement_position) > self.config.respawn_distance_m;
        let cooled = self
            .last_spawn_at
            .is_none_or(|at| input.now_ms - at >= self.config.respawn_cooldown_ms);
        far && cooled && self.reticle.is_stable(input.now_ms, self.config.stability_gate_ms)
    }

    /// Place content of `class` at `pose`. Same-kind content is moved and
    /// re-anchored in place; otherwise the matching asset is requested and
    /// the spawn completes when it resolves.
    fn spawn(
        &mut self,
        pose: Pose,
        class: SurfaceClass,
        trigger: SpawnTrigger,
        now: f64,
        runtime: &mut dyn AnchorRuntime,
        boundary: &mut Boundary,
    ) {
        let kind = AssetKind::for_surface(class);
        if self.current_asset_kind() == Some(kind) {
            self.anchor_content(pose, class, trigger, now, runtime, boundary);
            return;
        }

        let path = self.config.asset(kind).path.clone();
        let ticket = boundary.assets.request(kind, &path);
        info!("Spawning {} ({:?}), loading {}", kind.as_str(), trigger, path);
        self.pending = Some(PendingSpawn {
            ticket,
            kind,
            class,
            pose,
            trigger,
        });
    }

    fn resolve_load(
        &mut self,
        completion: LoadCompletion,
        now: f64,
        runtime: &mut dyn AnchorRuntime,
        boundary: &mut Boundary,
    ) {
        let Some(pending) = self.pending.filter(|p| p.ticket == completion.ticket) else {
            debug!("Discarding stale load {:?}", completion.ticket);
            return;
        };
        self.pending = None;

        if let Err(err) = &completion.result {
            warn!("Asset load failed: {}", err);
            boundary
                .overlay
                .show_error(&ArError::Asset(err.clone()).user_message());
        }

        // Replacing different content: old nodes and anchor go first.
        if let Some(old) = self.content.take() {
            if let Anchoring::Anchor(anchor) = old.anchoring {
                self.anchors.release(runtime, anchor);
            }
            boundary.renderer.dispose(old.root);
        }

        let nodes = build_content(
            boundary.renderer.as_mut(),
            pending.kind,
            pending.class,
            &completion.result,
            &self.config,
        );
        self.content = Some(PlacedContent {
            kind: pending.kind,
            root: nodes.root,
            body: nodes.body,
            bounds: nodes.bounds,
            // Replaced straight away by anchor_content.
            anchoring: Anchoring::Fallback(pending.pose),
            placement_position: pending.pose.position(),
            class: pending.class,
        });
        self.anchor_content(pending.pose, pending.class, pending.trigger, now, runtime, boundary);
    }

    /// Re-anchor existing content at `pose` with a fresh orientation.
    fn anchor_content(
        &mut self,
        pose: Pose,
        class: SurfaceClass,
        trigger: SpawnTrigger,
        now: f64,
        runtime: &mut dyn AnchorRuntime,
        boundary: &mut Boundary,
    ) {
        let Some(content) = self.content.as_mut() else {
            return;
        };
        if let Anchoring::Anchor(old) = content.anchoring {
            self.anchors.release(runtime, old);
        }
        content.anchoring = match self.anchors.attach(runtime, &pose) {
            Ok(anchor) => Anchoring::Anchor(anchor),
            Err(err) => {
                warn!("Anchoring failed, pinning content in place: {}", err);
                Anchoring::Fallback(pose)
            }
        };
        content.placement_position = pose.position();
        content.class = class;
        self.fresh_anchor = true;

        // Absolute matrix: nothing from an earlier placement carries over.
        boundary.renderer.set_local_matrix(content.root, placement_matrix(&pose, class));
        boundary.renderer.set_visible(content.root, true);

        let kind = content.kind;
        self.spawns.push(SpawnRecord {
            at_ms: now,
            kind,
            trigger,
            stable_for_ms: self.reticle.stable_for(now),
        });
        self.state = PlacementState::Placed;
        self.has_placed = true;
        self.last_spawn_at = Some(now);
        self.gaze.interrupt();
        info!(
            "Placed {} on {} at {:?} ({:?})",
            kind.as_str(),
            class.name(),
            pose.position(),
            trigger
        );
    }

    fn update_anchor(&mut self, input: &FrameInput, boundary: &mut Boundary) {
        if !matches!(self.state, PlacementState::Placed | PlacementState::Lost) {
            return;
        }
        let Some(content) = &self.content else {
            return;
        };
        let Anchoring::Anchor(anchor) = content.anchoring else {
            // Fallback poses never move.
            return;
        };
        if std::mem::take(&mut self.fresh_anchor) {
            return;
        }

        match self.anchors.pose_of(input.frame, input.space, anchor) {
            Ok(pose) => {
                boundary
                    .renderer
                    .set_local_matrix(content.root, placement_matrix(&pose, content.class));
                if self.state == PlacementState::Lost {
                    info!("Anchor tracking recovered");
                    self.state = PlacementState::Placed;
                }
            }
            Err(err) => {
                if self.state == PlacementState::Placed {
                    warn!("Anchor lost ({}), holding content at last pose", err);
                    self.state = PlacementState::Lost;
                    self.gaze.interrupt();
                }
            }
        }
    }

    fn update_gaze(&mut self, input: &FrameInput, delta: f64, boundary: &mut Boundary) {
        let (PlacementState::Placed, Some(content), Some(viewer)) = (self.state, &self.content, &input.viewer) else {
            self.gaze.interrupt();
            return;
        };
        let Some(world) = boundary.renderer.world_matrix(content.body) else {
            self.gaze.interrupt();
            return;
        };
        if self.gaze.update(viewer, world, &content.bounds, delta) == GazeOutcome::ReadyToExit {
            self.continue_pending = true;
        }
    }

    fn update_hint(&mut self, boundary: &mut Boundary) {
        let hint = match self.state {
            PlacementState::Idle => return,
            PlacementState::Searching | PlacementState::Stable if self.reticle.state().visible => Hint::TapToPlace,
            PlacementState::Searching | PlacementState::Stable => Hint::Scanning,
            PlacementState::Placed => Hint::LookAtContent,
            PlacementState::Lost => Hint::Relocalising,
        };
        self.set_hint(hint, boundary);
    }

    fn set_hint(&mut self, hint: Hint, boundary: &mut Boundary) {
        if self.hint != Some(hint) {
            self.hint = Some(hint);
            boundary.overlay.set_hint(hint);
        }
    }
}

/// Uniform draw from `[min, max]`; a collapsed range yields `min`.
pub fn draw_delay(rng: &mut StdRng, [min, max]: [f64; 2]) -> f64 {
    if min >= max {
        return min;
    }
    rng.gen_range(min..=max)
}
