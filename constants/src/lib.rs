//! Shared tuning constants for the AR viewer.
//!
//! Every value here is a default; the viewer reads its live values from
//! `ArConfig`, which falls back to these when a field is absent.

pub mod asset;
pub mod gaze;
pub mod placement;
pub mod probe;
pub mod reticle;
pub mod session;
pub mod surface;
