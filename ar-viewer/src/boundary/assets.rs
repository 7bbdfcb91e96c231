use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::math::ContentBounds;
use crate::engine::surface::SurfaceClass;

/// The two pieces of content the viewer can place, keyed by surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    WallAsset,
    FloorAsset,
}

impl AssetKind {
    pub fn for_surface(surface: SurfaceClass) -> Self {
        match surface {
            SurfaceClass::Wall => Self::WallAsset,
            SurfaceClass::Floor => Self::FloorAsset,
        }
    }

    pub fn surface(&self) -> SurfaceClass {
        match self {
            Self::WallAsset => SurfaceClass::Wall,
            Self::FloorAsset => SurfaceClass::Floor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WallAsset => "wall-asset",
            Self::FloorAsset => "floor-asset",
        }
    }
}

/// Handle for one in-flight load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(pub u64);

/// A decoded subgraph ready to be instantiated by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAsset {
    pub kind: AssetKind,
    pub path: String,
    /// Local-space bounds of the whole subgraph.
    pub bounds: ContentBounds,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetError {
    #[error("asset {0} not found")]
    NotFound(String),
    #[error("asset {path} could not be decoded: {reason}")]
    Decode { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub result: Result<LoadedAsset, AssetError>,
}

/// GLTF-style loader. Requests are issued from inside a frame and their
/// completions are collected on a later frame.
pub trait AssetLoader {
    fn request(&mut self, kind: AssetKind, path: &str) -> LoadTicket;

    fn poll_completed(&mut self) -> Vec<LoadCompletion>;
}
