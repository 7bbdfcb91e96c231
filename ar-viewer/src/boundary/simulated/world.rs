use std::f32::consts::FRAC_PI_2;

use bevy::math::{EulerRot, Quat, Vec3};

use super::runtime::SimulatedFrame;
use crate::engine::math::Pose;

/// A room with a floor at `floor_y` and one wall in the plane `z = wall_z`
/// facing +Z, used to generate hit poses for the native demo.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedWorld {
    pub floor_y: f32,
    pub wall_z: f32,
    pub eye_height: f32,
    pub max_range: f32,
}

impl Default for SimulatedWorld {
    fn default() -> Self {
        Self {
            floor_y: 0.0,
            wall_z: -2.5,
            eye_height: 1.5,
            max_range: 8.0,
        }
    }
}

impl SimulatedWorld {
    /// First surface hit along the viewer's forward ray.
    ///
    /// Floor hits carry an identity rotation; wall hits are rotated so the
    /// pose's Y axis is the wall normal.
    pub fn hit_test(&self, viewer: &Pose) -> Option<Pose> {
        let origin = viewer.position();
        let dir = viewer.forward();

        let floor_t = (dir.y < -1e-4).then(|| (self.floor_y - origin.y) / dir.y);
        let wall_t = (dir.z < -1e-4).then(|| (self.wall_z - origin.z) / dir.z);

        let nearest = [(floor_t, false), (wall_t, true)]
            .into_iter()
            .filter_map(|(t, wall)| t.filter(|t| *t > 0.0 && *t <= self.max_range).map(|t| (t, wall)))
            .min_by(|a, b| a.0.total_cmp(&b.0))?;

        let point = origin + dir * nearest.0;
        Some(if nearest.1 {
            Pose::from_rotation_translation(Quat::from_rotation_x(FRAC_PI_2), point)
        } else {
            Pose::from_translation(point)
        })
    }

    /// Scripted camera path: a slow sideways sway while the view tilts
    /// between the floor and the wall.
    pub fn viewer_at(&self, t_ms: f64) -> Pose {
        let t = (t_ms / 1000.0) as f32;
        let position = Vec3::new((t * 0.2).sin() * 0.8, self.eye_height, 0.5);
        let yaw = (t * 0.2).sin() * 0.3;
        let pitch = -0.35 - 0.35 * (t * 0.15).cos();
        Pose::from_rotation_translation(Quat::from_euler(EulerRot::YXZ, yaw, pitch, 0.0), position)
    }

    pub fn frame_at(&self, t_ms: f64) -> SimulatedFrame {
        let viewer = self.viewer_at(t_ms);
        let frame = SimulatedFrame::at(t_ms).with_viewer(viewer);
        match self.hit_test(&viewer) {
            Some(hit) => frame.with_hit(hit),
            None => frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::surface::{SurfaceClass, classify_pose};

    #[test]
    fn looking_down_hits_floor() {
        let world = SimulatedWorld::default();
        let viewer = Pose::from_rotation_translation(Quat::from_rotation_x(-FRAC_PI_2 * 0.9), Vec3::new(0.0, 1.5, 0.0));
        let hit = world.hit_test(&viewer).expect("floor hit");
        assert!(hit.position().y.abs() < 1e-4);
        assert_eq!(classify_pose(Some(&hit)), SurfaceClass::Floor);
    }

    #[test]
    fn looking_ahead_hits_wall() {
        let world = SimulatedWorld::default();
        let viewer = Pose::from_translation(Vec3::new(0.0, 1.5, 0.0));
        let hit = world.hit_test(&viewer).expect("wall hit");
        assert!((hit.position().z - world.wall_z).abs() < 1e-4);
        assert_eq!(classify_pose(Some(&hit)), SurfaceClass::Wall);
    }

    #[test]
    fn looking_up_hits_nothing() {
        let world = SimulatedWorld::default();
        let viewer = Pose::from_rotation_translation(Quat::from_rotation_x(FRAC_PI_2), Vec3::new(0.0, 1.5, 0.0));
        assert!(world.hit_test(&viewer).is_none());
    }
}
