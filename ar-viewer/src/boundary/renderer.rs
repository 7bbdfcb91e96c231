use bevy::color::Color;
use bevy::math::Mat4;
use thiserror::Error;

use super::assets::AssetKind;
use crate::engine::math::{ContentBounds, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// What a scene node renders.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSource {
    /// Empty transform node used to carry anchor poses.
    Group,
    Asset {
        kind: AssetKind,
        path: String,
        bounds: ContentBounds,
    },
    /// Box standing in for an asset that failed to load.
    Placeholder { kind: AssetKind, bounds: ContentBounds },
}

impl NodeSource {
    pub fn bounds(&self) -> Option<ContentBounds> {
        match self {
            Self::Group => None,
            Self::Asset { bounds, .. } | Self::Placeholder { bounds, .. } => Some(*bounds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReticleGlyph {
    Ring,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReticleVisual {
    pub pose: Pose,
    pub glyph: ReticleGlyph,
    pub colour: Color,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RendererError {
    #[error("canvas {0} cannot be mounted")]
    CanvasUnavailable(String),
}

/// Retained scene graph plus per-frame submission.
///
/// Nodes hold local matrices; a node without a parent lives in world space.
pub trait SceneRenderer {
    fn mount(&mut self, canvas: &str) -> Result<(), RendererError>;

    fn create_node(&mut self, source: NodeSource) -> NodeId;

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>);

    fn set_local_matrix(&mut self, node: NodeId, matrix: Mat4);

    fn set_visible(&mut self, node: NodeId, visible: bool);

    /// Remove `node` and everything below it.
    fn dispose(&mut self, node: NodeId);

    fn world_matrix(&self, node: NodeId) -> Option<Mat4>;

    fn is_visible(&self, node: NodeId) -> bool;

    fn set_camera(&mut self, viewer: &Pose);

    fn set_reticle(&mut self, reticle: Option<ReticleVisual>);

    /// Attach (`true`) or detach the per-frame callback.
    fn set_animation_loop(&mut self, active: bool);

    fn submit(&mut self);

    fn frames_submitted(&self) -> u64;
}
