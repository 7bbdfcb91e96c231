/// Runtime anchors with a stored-pose fallback.
pub mod anchor_store;

/// Dwell detection on placed content.
pub mod gaze;

/// Placement state machine, spawn and content fitting.
pub mod placement;

/// Reticle stability tracking and glyph selection.
pub mod reticle;
