//! Retained scene graph and its Bevy mirror.
//!
//! Back-ends build content into a [`SceneGraph`]; the systems in `sync`
//! turn it into entities once per Bevy frame and `asset_bridge` resolves
//! GLTF loads through the `AssetServer`.

/// GLTF loading through the Bevy `AssetServer`, with bounds from mesh AABBs.
pub mod asset_bridge;

/// Node store implementing the renderer contract.
pub mod scene_graph;

/// Entity mirror of the scene graph, camera follow and the debug reticle.
pub mod sync;

pub use asset_bridge::{AssetBridgeState, BevyAssetBridge};
pub use scene_graph::{SceneGraph, SceneNode, SharedSceneGraph};
pub use sync::{ArCamera, MirroredNode, SceneMirror};
