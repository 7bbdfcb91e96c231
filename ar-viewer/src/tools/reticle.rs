use bevy::log::debug;
use bevy::math::Vec3;
use constants::reticle::{FLOOR_RETICLE_COLOUR, WALL_RETICLE_COLOUR};

use crate::boundary::{ReticleGlyph, ReticleVisual};
use crate::engine::math::Pose;
use crate::engine::surface::{SurfaceClass, classify_gaze_direction, classify_pose};

/// Where the current target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReticleSource {
    HitTest,
    /// Synthetic point in front of the camera; never counts as stable.
    Gaze,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReticleState {
    pub visible: bool,
    pub current_class: Option<SurfaceClass>,
    pub first_stable_at: Option<f64>,
    pub last_position: Option<Vec3>,
    pub pose: Option<Pose>,
    pub source: Option<ReticleSource>,
}

/// Per-frame target tracking with a stability timer.
///
/// A class change or a jump of more than `epsilon_m` restarts the timer.
#[derive(Debug, Clone)]
pub struct Reticle {
    state: ReticleState,
    epsilon_m: f32,
}

impl Reticle {
    pub fn new(epsilon_m: f32) -> Self {
        Self {
            state: ReticleState::default(),
            epsilon_m,
        }
    }

    pub fn state(&self) -> &ReticleState {
        &self.state
    }

    /// Feed this frame's first hit-test result.
    pub fn update_from_hit(&mut self, hit: Option<Pose>, now_ms: f64) {
        let Some(pose) = hit else {
            self.clear();
            return;
        };
        let class = classify_pose(Some(&pose));
        let position = pose.position();

        let class_changed = self.state.current_class != Some(class);
        let moved = self
            .state
            .last_position
            .is_none_or(|last| last.distance(position) > self.epsilon_m);
        if class_changed || moved || self.state.first_stable_at.is_none() {
            if class_changed {
                debug!("Reticle class now {}", class.as_str());
            }
            self.state.first_stable_at = Some(now_ms);
        }

        self.state.visible = true;
        self.state.current_class = Some(class);
        self.state.last_position = Some(position);
        self.state.pose = Some(pose);
        self.state.source = Some(ReticleSource::HitTest);
    }

    /// Place a camera-relative target `distance_m` ahead when there is no
    /// hit-test. Stability is never started from this path.
    pub fn update_from_gaze(&mut self, viewer: &Pose, distance_m: f32) {
        let target = viewer.point_ahead(distance_m);
        let pose = Pose::facing(target, viewer.position(), Vec3::Y);
        self.state = ReticleState {
            visible: true,
            current_class: Some(classify_gaze_direction(viewer.forward())),
            first_stable_at: None,
            last_position: Some(target),
            pose: Some(pose),
            source: Some(ReticleSource::Gaze),
        };
    }

    /// Hide and forget stability.
    pub fn clear(&mut self) {
        self.state = ReticleState::default();
    }

    /// Whether a world-anchored hit is currently showing.
    pub fn has_hit(&self) -> bool {
        self.state.visible && self.state.source == Some(ReticleSource::HitTest)
    }

    /// The hit pose and class, when a hit is showing.
    pub fn target(&self) -> Option<(Pose, SurfaceClass)> {
        if !self.has_hit() {
            return None;
        }
        Some((self.state.pose?, self.state.current_class?))
    }

    pub fn stable_for(&self, now_ms: f64) -> Option<f64> {
        self.state.first_stable_at.map(|at| now_ms - at)
    }

    /// Held in place on the same class for at least `gate_ms`.
    pub fn is_stable(&self, now_ms: f64, gate_ms: f64) -> bool {
        self.has_hit() && self.stable_for(now_ms).is_some_and(|held| held >= gate_ms)
    }

    /// Glyph to draw, or `None` when the reticle is hidden from users.
    pub fn visual(&self, debug_visible: bool) -> Option<ReticleVisual> {
        if !debug_visible || !self.state.visible {
            return None;
        }
        let pose = self.state.pose?;
        let (glyph, colour) = match self.state.current_class? {
            SurfaceClass::Floor => (ReticleGlyph::Ring, FLOOR_RETICLE_COLOUR),
            SurfaceClass::Wall => (ReticleGlyph::Plus, WALL_RETICLE_COLOUR),
        };
        Some(ReticleVisual { pose, glyph, colour })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Quat;
    use std::f32::consts::FRAC_PI_2;

    fn floor_at(x: f32) -> Pose {
        Pose::from_translation(Vec3::new(x, 0.0, -1.0))
    }

    fn wall_at(x: f32) -> Pose {
        Pose::from_rotation_translation(Quat::from_rotation_x(FRAC_PI_2), Vec3::new(x, 1.0, -2.0))
    }

    #[test]
    fn steady_hit_becomes_stable_after_gate() {
        let mut reticle = Reticle::new(0.05);
        reticle.update_from_hit(Some(floor_at(0.0)), 0.0);
        reticle.update_from_hit(Some(floor_at(0.01)), 1000.0);
        assert!(!reticle.is_stable(1000.0, 1500.0));
        reticle.update_from_hit(Some(floor_at(0.02)), 1500.0);
        assert!(reticle.is_stable(1500.0, 1500.0));
    }

    #[test]
    fn jump_restarts_stability() {
        let mut reticle = Reticle::new(0.05);
        reticle.update_from_hit(Some(floor_at(0.0)), 0.0);
        reticle.update_from_hit(Some(floor_at(0.2)), 1000.0);
        assert_eq!(reticle.state().first_stable_at, Some(1000.0));
    }

    #[test]
    fn class_change_restarts_stability() {
        let mut reticle = Reticle::new(0.05);
        reticle.update_from_hit(Some(floor_at(0.0)), 0.0);
        let mut wall = wall_at(0.0);
        wall = Pose::from_rotation_translation(wall.rotation(), Vec3::new(0.0, 0.0, -1.0));
        reticle.update_from_hit(Some(wall), 800.0);
        assert_eq!(reticle.state().current_class, Some(SurfaceClass::Wall));
        assert_eq!(reticle.state().first_stable_at, Some(800.0));
    }

    #[test]
    fn miss_hides_and_clears() {
        let mut reticle = Reticle::new(0.05);
        reticle.update_from_hit(Some(floor_at(0.0)), 0.0);
        reticle.update_from_hit(None, 100.0);
        assert_eq!(*reticle.state(), ReticleState::default());
    }

    #[test]
    fn gaze_target_never_stable() {
        let mut reticle = Reticle::new(0.05);
        let viewer = Pose::from_translation(Vec3::new(0.0, 1.5, 0.0));
        reticle.update_from_gaze(&viewer, 1.0);
        assert!(reticle.state().visible);
        assert_eq!(reticle.state().first_stable_at, None);
        assert!(!reticle.has_hit());
        assert!(!reticle.is_stable(1e9, 0.0));
    }

    #[test]
    fn glyphs_follow_class_and_debug_flag() {
        let mut reticle = Reticle::new(0.05);
        reticle.update_from_hit(Some(floor_at(0.0)), 0.0);
        assert!(reticle.visual(false).is_none());
        let visual = reticle.visual(true).expect("debug shows reticle");
        assert_eq!(visual.glyph, ReticleGlyph::Ring);
        assert_eq!(visual.colour, FLOOR_RETICLE_COLOUR);

        reticle.update_from_hit(Some(wall_at(0.0)), 10.0);
        let visual = reticle.visual(true).expect("debug shows reticle");
        assert_eq!(visual.glyph, ReticleGlyph::Plus);
        assert_eq!(visual.colour, WALL_RETICLE_COLOUR);
    }
}
