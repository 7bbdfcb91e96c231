/// At or below this |Y·up| a pose is a wall.
pub const WALL_UP_ALIGNMENT_MAX: f32 = 0.5;

/// Secondary wall band: both |Y·up| and |Z·up| below this also classify as wall.
pub const SECONDARY_ALIGNMENT_MAX: f32 = 0.7;

/// Vertical gaze component band treated as "looking at a wall" when no hit-test is available.
pub const GAZE_WALL_BAND: f32 = 0.3;

pub struct SurfaceInfo {
    pub id: &'static str,
    pub name: &'static str,
}

pub const SURFACE_MAP: &[SurfaceInfo] = &[
    SurfaceInfo {
        id: "floor",
        name: "horizontal surface",
    },
    SurfaceInfo {
        id: "wall",
        name: "vertical surface",
    },
];
