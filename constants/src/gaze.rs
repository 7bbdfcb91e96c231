use std::f32::consts::FRAC_PI_6;

/// Half-angle of the gaze cone around camera forward (radians).
pub const GAZE_HALF_ANGLE_RAD: f32 = FRAC_PI_6;

/// Content further than this never counts as gazed at (metres).
pub const GAZE_MAX_DISTANCE_M: f32 = 5.0;

/// Continuous dwell required before the continue affordance is offered (ms).
pub const GAZE_DWELL_MS: f64 = 2000.0;
