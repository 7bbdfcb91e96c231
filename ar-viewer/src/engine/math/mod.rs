//! Pose and ray helpers shared by the tracking back-ends.

/// Rigid transforms stored as column-major 4x4 matrices.
pub mod pose;

/// Ray intersection against content bounds.
pub mod ray;

pub use pose::{ContentBounds, Pose};
