use std::f32::consts::FRAC_PI_2;

/// Time a surface class must hold before the reticle counts as stable (ms).
pub const STABILITY_GATE_MS: f64 = 1500.0;

/// Reticle movement that restarts the stability timer (metres).
pub const STABILITY_EPSILON_M: f32 = 0.05;

/// Lower bound of the auto-spawn delay draw (ms).
pub const AUTO_SPAWN_DELAY_MIN_MS: f64 = 3000.0;

/// Upper bound of the auto-spawn delay draw (ms).
pub const AUTO_SPAWN_DELAY_MAX_MS: f64 = 5000.0;

/// Distance from placed content past which a re-spawn is considered (metres).
pub const RESPAWN_DISTANCE_M: f32 = 3.0;

/// Minimum time between two spawns (ms).
pub const RESPAWN_COOLDOWN_MS: f64 = 2000.0;

/// Distance in front of the camera used when there is no hit-test result (metres).
pub const FALLBACK_FORWARD_DISTANCE_M: f32 = 1.0;

/// Local X rotation applied to wall content so its forward axis leaves the wall.
pub const WALL_CORRECTION_ANGLE: f32 = -FRAC_PI_2;
