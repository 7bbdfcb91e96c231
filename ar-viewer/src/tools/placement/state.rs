use bevy::math::Vec3;

use crate::boundary::{AssetKind, LoadTicket, NodeId};
use crate::engine::math::{ContentBounds, Pose};
use crate::engine::surface::SurfaceClass;
use crate::tools::anchor_store::AnchorRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlacementState {
    #[default]
    Idle,
    Searching,
    Stable,
    Placed,
    Lost,
}

impl PlacementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Stable => "stable",
            Self::Placed => "placed",
            Self::Lost => "lost",
        }
    }
}

/// How placed content is held in the world. Exactly one form at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchoring {
    Anchor(AnchorRef),
    /// Anchor creation failed; the content stays at this pose.
    Fallback(Pose),
}

/// Content currently in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedContent {
    pub kind: AssetKind,
    /// Carries the anchored pose plus surface correction.
    pub root: NodeId,
    /// Asset or placeholder under `root`, carrying the fit transform.
    pub body: NodeId,
    /// Local bounds of `body` before the fit transform.
    pub bounds: ContentBounds,
    pub anchoring: Anchoring,
    pub placement_position: Vec3,
    pub class: SurfaceClass,
}

/// What caused a spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnTrigger {
    Auto,
    Tap,
    Respawn,
}

/// A spawn waiting on its asset load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSpawn {
    pub ticket: LoadTicket,
    pub kind: AssetKind,
    pub class: SurfaceClass,
    pub pose: Pose,
    pub trigger: SpawnTrigger,
}

/// One completed spawn, kept for the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRecord {
    pub at_ms: f64,
    pub kind: AssetKind,
    pub trigger: SpawnTrigger,
    pub stable_for_ms: Option<f64>,
}
