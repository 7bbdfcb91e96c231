use bevy::prelude::*;
use constants::asset::{
    FLOOR_ASSET_PATH, FLOOR_ASSET_TARGET_SIZE_M, FLOOR_LIFT_M, MARKER_DESCRIPTOR_PATH, MARKER_HEIGHT_M,
    MARKER_WIDTH_M, WALL_ASSET_PATH, WALL_ASSET_TARGET_SIZE_M,
};
use constants::gaze::{GAZE_DWELL_MS, GAZE_HALF_ANGLE_RAD, GAZE_MAX_DISTANCE_M};
use constants::placement::{
    AUTO_SPAWN_DELAY_MAX_MS, AUTO_SPAWN_DELAY_MIN_MS, FALLBACK_FORWARD_DISTANCE_M, RESPAWN_COOLDOWN_MS,
    RESPAWN_DISTANCE_M, STABILITY_EPSILON_M, STABILITY_GATE_MS,
};
use constants::probe::{POLYFILL_POLL_MS, POLYFILL_SETTLE_MS, POLYFILL_WAIT_MS};
use constants::session::{CANVAS_SELECTOR, OVERLAY_ROOT_ID};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::boundary::AssetKind;
use crate::boundary::runtime::MarkerDescriptor;

/// Where one kind of content comes from and how large it is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub path: String,
    /// Largest dimension after auto-scale (metres).
    pub target_size_m: f32,
}

/// Polyfill wait used by the capability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeTimings {
    pub wait_ms: u64,
    pub poll_ms: u64,
    pub settle_ms: u64,
}

impl Default for ProbeTimings {
    fn default() -> Self {
        Self {
            wait_ms: POLYFILL_WAIT_MS,
            poll_ms: POLYFILL_POLL_MS,
            settle_ms: POLYFILL_SETTLE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub descriptor: MarkerDescriptor,
    /// Content shown on the image target.
    pub asset: AssetKind,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            descriptor: MarkerDescriptor {
                path: MARKER_DESCRIPTOR_PATH.to_string(),
                width_m: MARKER_WIDTH_M,
                height_m: MARKER_HEIGHT_M,
            },
            asset: AssetKind::WallAsset,
        }
    }
}

/// Every tunable of the viewer, loaded from `config/viewer.ar.json`.
///
/// Missing fields take the defaults from the `constants` crate.
#[derive(Resource, Asset, TypePath, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArConfig {
    pub stability_gate_ms: f64,
    pub stability_epsilon_m: f32,
    /// Inclusive `[min, max]` range the auto-spawn delay is drawn from.
    pub auto_spawn_delay_ms: [f64; 2],
    pub respawn_distance_m: f32,
    pub respawn_cooldown_ms: f64,
    pub fallback_distance_m: f32,
    pub gaze_half_angle_rad: f32,
    pub gaze_max_distance_m: f32,
    pub gaze_dwell_ms: f64,
    pub wall_asset: AssetSpec,
    pub floor_asset: AssetSpec,
    pub floor_lift_m: f32,
    pub probe: ProbeTimings,
    pub overlay_root: String,
    pub canvas: String,
    pub debug_reticle: bool,
    pub marker: MarkerConfig,
}

impl Default for ArConfig {
    fn default() -> Self {
        Self {
            stability_gate_ms: STABILITY_GATE_MS,
            stability_epsilon_m: STABILITY_EPSILON_M,
            auto_spawn_delay_ms: [AUTO_SPAWN_DELAY_MIN_MS, AUTO_SPAWN_DELAY_MAX_MS],
            respawn_distance_m: RESPAWN_DISTANCE_M,
            respawn_cooldown_ms: RESPAWN_COOLDOWN_MS,
            fallback_distance_m: FALLBACK_FORWARD_DISTANCE_M,
            gaze_half_angle_rad: GAZE_HALF_ANGLE_RAD,
            gaze_max_distance_m: GAZE_MAX_DISTANCE_M,
            gaze_dwell_ms: GAZE_DWELL_MS,
            wall_asset: AssetSpec {
                path: WALL_ASSET_PATH.to_string(),
                target_size_m: WALL_ASSET_TARGET_SIZE_M,
            },
            floor_asset: AssetSpec {
                path: FLOOR_ASSET_PATH.to_string(),
                target_size_m: FLOOR_ASSET_TARGET_SIZE_M,
            },
            floor_lift_m: FLOOR_LIFT_M,
            probe: ProbeTimings::default(),
            overlay_root: OVERLAY_ROOT_ID.to_string(),
            canvas: CANVAS_SELECTOR.to_string(),
            debug_reticle: false,
            marker: MarkerConfig::default(),
        }
    }
}

impl ArConfig {
    pub fn asset(&self, kind: AssetKind) -> &AssetSpec {
        match kind {
            AssetKind::WallAsset => &self.wall_asset,
            AssetKind::FloorAsset => &self.floor_asset,
        }
    }

    /// Reject values the placement engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [min, max] = self.auto_spawn_delay_ms;
        if !(min >= 0.0 && min <= max) {
            return Err(ConfigError::InvertedRange {
                field: "auto_spawn_delay_ms",
                min,
                max,
            });
        }

        let positive = [
            ("stability_gate_ms", self.stability_gate_ms),
            ("stability_epsilon_m", f64::from(self.stability_epsilon_m)),
            ("respawn_distance_m", f64::from(self.respawn_distance_m)),
            ("fallback_distance_m", f64::from(self.fallback_distance_m)),
            ("gaze_half_angle_rad", f64::from(self.gaze_half_angle_rad)),
            ("gaze_max_distance_m", f64::from(self.gaze_max_distance_m)),
            ("gaze_dwell_ms", self.gaze_dwell_ms),
            ("wall_asset.target_size_m", f64::from(self.wall_asset.target_size_m)),
            ("floor_asset.target_size_m", f64::from(self.floor_asset.target_size_m)),
            ("marker.descriptor.width_m", f64::from(self.marker.descriptor.width_m)),
            ("marker.descriptor.height_m", f64::from(self.marker.descriptor.height_m)),
        ];
        for (field, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        if self.respawn_cooldown_ms < 0.0 || self.floor_lift_m < 0.0 {
            return Err(ConfigError::Negative);
        }
        if self.probe.poll_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "probe.poll_ms",
                value: 0.0,
            });
        }
        for (field, path) in [
            ("wall_asset.path", &self.wall_asset.path),
            ("floor_asset.path", &self.floor_asset.path),
            ("marker.descriptor.path", &self.marker.descriptor.path),
        ] {
            if path.trim().is_empty() {
                return Err(ConfigError::EmptyPath(field));
            }
        }
        Ok(())
    }
}

/// Pending handle for the config asset, polled until it resolves.
#[derive(Resource, Default)]
pub struct ConfigLoader {
    pub handle: Option<Handle<ArConfig>>,
    pub resolved: bool,
}
