use bevy::math::Vec3;
use constants::surface::{GAZE_WALL_BAND, SECONDARY_ALIGNMENT_MAX, SURFACE_MAP, WALL_UP_ALIGNMENT_MAX};

use super::math::Pose;

/// Coarse orientation of a detected surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceClass {
    Floor,
    Wall,
}

impl SurfaceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Wall => "wall",
        }
    }

    /// Human-readable name from the shared surface table.
    pub fn name(&self) -> &'static str {
        SURFACE_MAP
            .iter()
            .find(|info| info.id == self.as_str())
            .map(|info| info.name)
            .unwrap_or("surface")
    }
}

/// Classify from the alignments of the pose's Y and Z axes with world up.
///
/// `y_up` at or below the secondary band with `z_up` under it still reads
/// as wall, so a tilted wall pose is not mistaken for floor.
pub fn classify_alignment(y_up: f32, z_up: f32) -> SurfaceClass {
    let secondary = y_up <= SECONDARY_ALIGNMENT_MAX && z_up < SECONDARY_ALIGNMENT_MAX;
    if y_up <= WALL_UP_ALIGNMENT_MAX || secondary {
        SurfaceClass::Wall
    } else {
        SurfaceClass::Floor
    }
}

/// Classify a hit pose; a missing pose counts as floor.
pub fn classify_pose(pose: Option<&Pose>) -> SurfaceClass {
    let Some(pose) = pose else {
        return SurfaceClass::Floor;
    };
    let y_up = pose.axis_y().dot(Vec3::Y).abs();
    let z_up = pose.axis_z().dot(Vec3::Y).abs();
    classify_alignment(y_up, z_up)
}

/// Classify from where the camera is looking when no hit-test is available.
///
/// Looking clearly down reads as floor; level or upward gaze reads as wall.
pub fn classify_gaze_direction(forward: Vec3) -> SurfaceClass {
    let d_y = forward.normalize_or_zero().y;
    if d_y <= -GAZE_WALL_BAND {
        SurfaceClass::Floor
    } else {
        SurfaceClass::Wall
    }
}
