use bevy::prelude::Color;

/// Floor reticle colour (cyan ring).
pub const FLOOR_RETICLE_COLOUR: Color = Color::srgb(0.0, 1.0, 1.0);

/// Wall reticle colour (orange plus).
pub const WALL_RETICLE_COLOUR: Color = Color::srgb(1.0, 0.55, 0.0);

/// Outer radius of the floor ring glyph (metres).
pub const RING_RADIUS_M: f32 = 0.1;

/// Half length of a wall plus glyph arm (metres).
pub const PLUS_HALF_LENGTH_M: f32 = 0.08;

/// Segments used when drawing the ring.
pub const RING_SEGMENTS: usize = 32;

/// Debug glyph drawn on a tracked image target (magenta plus).
pub const MARKER_RETICLE_COLOUR: Color = Color::srgb(1.0, 0.0, 1.0);
