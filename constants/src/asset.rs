use bevy::prelude::Color;

/// Wall content path, relative to the asset root.
pub const WALL_ASSET_PATH: &str = "models/wall_asset.glb";

/// Floor content path, relative to the asset root.
pub const FLOOR_ASSET_PATH: &str = "models/floor_asset.glb";

/// Largest dimension of wall content after auto-scale (metres).
pub const WALL_ASSET_TARGET_SIZE_M: f32 = 0.30;

/// Largest dimension of floor content after auto-scale (metres).
pub const FLOOR_ASSET_TARGET_SIZE_M: f32 = 0.50;

/// Gap kept between floor content and the floor (metres).
pub const FLOOR_LIFT_M: f32 = 0.01;

/// Placeholder box substituted when an asset fails to load (metres).
pub const PLACEHOLDER_SIZE_M: [f32; 3] = [0.2, 0.2, 0.05];

pub const PLACEHOLDER_COLOUR: Color = Color::srgb(0.85, 0.2, 0.6);

/// Marker descriptor compiled offline for the image-target back-end.
pub const MARKER_DESCRIPTOR_PATH: &str = "markers/target.mind";

/// Physical size of the printed marker (metres).
pub const MARKER_WIDTH_M: f32 = 0.21;
pub const MARKER_HEIGHT_M: f32 = 0.297;
