use bevy::log::{debug, info};
use bevy::math::Mat4;

use crate::engine::math::ray::ray_hits_content;
use crate::engine::math::{ContentBounds, Pose};

/// `gazing == false` always comes with `dwell_ms == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeState {
    pub dwell_ms: f64,
    pub gazing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeOutcome {
    NotGazing,
    Gazing,
    /// Dwell target reached; reported once until [`GazeDetector::reset`].
    ReadyToExit,
}

#[derive(Debug, Clone)]
pub struct GazeDetector {
    state: GazeState,
    half_angle_rad: f32,
    max_distance_m: f32,
    dwell_target_ms: f64,
    fired: bool,
}

impl GazeDetector {
    pub fn new(half_angle_rad: f32, max_distance_m: f32, dwell_target_ms: f64) -> Self {
        Self {
            state: GazeState::default(),
            half_angle_rad,
            max_distance_m,
            dwell_target_ms,
            fired: false,
        }
    }

    pub fn state(&self) -> GazeState {
        self.state
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Advance by one frame.
    ///
    /// `content_world` maps the content's local space (where `bounds` lives)
    /// to world space.
    pub fn update(
        &mut self,
        viewer: &Pose,
        content_world: Mat4,
        bounds: &ContentBounds,
        delta_ms: f64,
    ) -> GazeOutcome {
        let origin = viewer.position();
        let forward = viewer.forward();
        let centre = content_world.transform_point3(bounds.center());
        let to_content = centre - origin;
        let distance = to_content.length();

        let facing = forward.dot(to_content);
        let in_cone = distance > f32::EPSILON
            && facing > 0.0
            && forward.angle_between(to_content) <= self.half_angle_rad
            && distance <= self.max_distance_m;
        let hit = in_cone && ray_hits_content(origin, forward, content_world, bounds).is_some();

        if !hit {
            self.interrupt();
            return GazeOutcome::NotGazing;
        }

        if !self.state.gazing {
            debug!("Gaze on content at {:.2} m", distance);
        }
        self.state.gazing = true;
        self.state.dwell_ms += delta_ms.max(0.0);

        if self.state.dwell_ms >= self.dwell_target_ms && !self.fired {
            self.fired = true;
            info!("Gaze dwell reached {:.0} ms", self.state.dwell_ms);
            return GazeOutcome::ReadyToExit;
        }
        GazeOutcome::Gazing
    }

    /// Look-away: drop the dwell but remember whether exit already fired.
    pub fn interrupt(&mut self) {
        self.state = GazeState::default();
    }

    /// Full reset for new content or a new session.
    pub fn reset(&mut self) {
        self.state = GazeState::default();
        self.fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::{Quat, Vec3};
    use std::f32::consts::FRAC_PI_2;

    fn detector() -> GazeDetector {
        GazeDetector::new(std::f32::consts::FRAC_PI_6, 5.0, 2000.0)
    }

    fn content_at(z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, z))
    }

    fn bounds() -> ContentBounds {
        ContentBounds::from_size(Vec3::splat(0.4))
    }

    #[test]
    fn dwell_accumulates_and_fires_once() {
        let mut gaze = detector();
        let viewer = Pose::IDENTITY;
        let mut outcomes = Vec::new();
        for _ in 0..30 {
            outcomes.push(gaze.update(&viewer, content_at(-2.0), &bounds(), 100.0));
        }
        let fired = outcomes.iter().filter(|o| **o == GazeOutcome::ReadyToExit).count();
        assert_eq!(fired, 1);
        assert_eq!(outcomes[19], GazeOutcome::ReadyToExit);
        assert!(gaze.has_fired());
        gaze.reset();
        assert!(!gaze.has_fired());
    }

    #[test]
    fn looking_away_resets_dwell() {
        let mut gaze = detector();
        gaze.update(&Pose::IDENTITY, content_at(-2.0), &bounds(), 500.0);
        let away = Pose::from_rotation_translation(Quat::from_rotation_y(FRAC_PI_2), Vec3::ZERO);
        assert_eq!(gaze.update(&away, content_at(-2.0), &bounds(), 16.0), GazeOutcome::NotGazing);
        assert_eq!(gaze.state(), GazeState::default());
    }

    #[test]
    fn content_behind_or_too_far_is_ignored() {
        let mut gaze = detector();
        assert_eq!(gaze.update(&Pose::IDENTITY, content_at(2.0), &bounds(), 100.0), GazeOutcome::NotGazing);
        assert_eq!(gaze.update(&Pose::IDENTITY, content_at(-6.0), &bounds(), 100.0), GazeOutcome::NotGazing);
        assert_eq!(gaze.state().dwell_ms, 0.0);
    }

    #[test]
    fn inside_cone_but_ray_misses_is_not_gazing() {
        let mut gaze = detector();
        // 20 degrees off-axis: inside the cone, but the centre ray misses a small box.
        let offset = Mat4::from_translation(Vec3::new(0.0, 0.7, -2.0));
        let small = ContentBounds::from_size(Vec3::splat(0.1));
        assert_eq!(gaze.update(&Pose::IDENTITY, offset, &small, 100.0), GazeOutcome::NotGazing);
    }

    #[test]
    fn not_gazing_implies_zero_dwell() {
        let mut gaze = detector();
        let poses = [Pose::IDENTITY, Pose::from_rotation_translation(Quat::from_rotation_y(1.0), Vec3::ZERO)];
        for i in 0..20 {
            gaze.update(&poses[i % 2], content_at(-2.0), &bounds(), 50.0);
            let state = gaze.state();
            assert!(state.gazing || state.dwell_ms == 0.0);
        }
    }
}
