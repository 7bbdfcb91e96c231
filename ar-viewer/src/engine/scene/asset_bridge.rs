use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bevy::asset::io::AssetReaderError;
use bevy::asset::{AssetLoadError, LoadState, RecursiveDependencyLoadState};
use bevy::gltf::{Gltf, GltfMesh, GltfNode};
use bevy::render::mesh::MeshAabb;
use bevy::prelude::*;

use crate::boundary::{AssetError, AssetKind, AssetLoader, LoadCompletion, LoadTicket, LoadedAsset};
use crate::engine::math::ContentBounds;

struct PendingLoad {
    ticket: LoadTicket,
    kind: AssetKind,
    path: String,
    handle: Handle<Gltf>,
}

#[derive(Default)]
struct BridgeInner {
    pending: Vec<PendingLoad>,
    completed: Vec<LoadCompletion>,
    next_ticket: u64,
}

/// State shared between the loader handed to the back-ends and the system
/// that watches Bevy's load states.
#[derive(Clone, Default)]
pub struct AssetBridgeState(Rc<RefCell<BridgeInner>>);

impl AssetBridgeState {
    pub fn in_flight(&self) -> usize {
        self.0.borrow().pending.len()
    }

    /// Move every finished load into the completion queue.
    pub fn resolve(
        &self,
        server: &AssetServer,
        gltfs: &Assets<Gltf>,
        gltf_nodes: &Assets<GltfNode>,
        gltf_meshes: &Assets<GltfMesh>,
        meshes: &Assets<Mesh>,
    ) {
        let mut inner = self.0.borrow_mut();
        let pending = std::mem::take(&mut inner.pending);
        for load in pending {
            if let Some(LoadState::Failed(err)) = server.get_load_state(&load.handle) {
                warn!("Failed to load {}: {}", load.path, err);
                let error = match err.as_ref() {
                    AssetLoadError::AssetReaderError(AssetReaderError::NotFound(_)) => {
                        AssetError::NotFound(load.path.clone())
                    }
                    other => AssetError::Decode {
                        path: load.path.clone(),
                        reason: other.to_string(),
                    },
                };
                inner.completed.push(LoadCompletion {
                    ticket: load.ticket,
                    result: Err(error),
                });
                continue;
            }

            match server.get_recursive_dependency_load_state(&load.handle) {
                Some(RecursiveDependencyLoadState::Loaded) => {
                    let result = gltfs
                        .get(&load.handle)
                        .and_then(|gltf| gltf_bounds(gltf, gltf_nodes, gltf_meshes, meshes))
                        .map(|bounds| LoadedAsset {
                            kind: load.kind,
                            path: load.path.clone(),
                            bounds,
                        })
                        .ok_or_else(|| AssetError::Decode {
                            path: load.path.clone(),
                            reason: "no mesh geometry".to_string(),
                        });
                    info!("Loaded {} for {}", load.path, load.kind.as_str());
                    inner.completed.push(LoadCompletion {
                        ticket: load.ticket,
                        result,
                    });
                }
                Some(RecursiveDependencyLoadState::Failed(err)) => {
                    warn!("Dependency of {} failed: {}", load.path, err);
                    inner.completed.push(LoadCompletion {
                        ticket: load.ticket,
                        result: Err(AssetError::Decode {
                            path: load.path.clone(),
                            reason: err.to_string(),
                        }),
                    });
                }
                _ => inner.pending.push(load),
            }
        }
    }
}

/// One node of a loaded file, reduced to what the bounds walk needs.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub local: Mat4,
    pub children: Vec<usize>,
    /// Union of the node's mesh primitives in mesh space.
    pub mesh_bounds: Option<ContentBounds>,
}

/// Bounds of every mesh in the hierarchy, with node transforms applied.
///
/// Nodes no other node lists as a child are roots. A node reached twice is
/// only visited once, so malformed files with cycles still terminate.
pub fn scene_bounds(nodes: &[SceneNode]) -> Option<ContentBounds> {
    let mut is_child = vec![false; nodes.len()];
    for node in nodes {
        for &child in &node.children {
            if let Some(flag) = is_child.get_mut(child) {
                *flag = true;
            }
        }
    }

    let mut visited = vec![false; nodes.len()];
    let mut stack: Vec<(usize, Mat4)> = (0..nodes.len())
        .filter(|&i| !is_child[i])
        .map(|i| (i, Mat4::IDENTITY))
        .collect();
    let mut bounds: Option<ContentBounds> = None;

    while let Some((index, parent)) = stack.pop() {
        let Some(node) = nodes.get(index) else {
            continue;
        };
        if std::mem::replace(&mut visited[index], true) {
            continue;
        }
        let world = parent * node.local;
        if let Some(local) = node.mesh_bounds {
            let placed = local.transformed(world);
            bounds = Some(bounds.map_or(placed, |b| b.union(&placed)));
        }
        stack.extend(node.children.iter().map(|&child| (child, world)));
    }
    bounds
}

fn mesh_bounds(handle: &Handle<GltfMesh>, gltf_meshes: &Assets<GltfMesh>, meshes: &Assets<Mesh>) -> Option<ContentBounds> {
    gltf_meshes
        .get(handle)?
        .primitives
        .iter()
        .filter_map(|primitive| meshes.get(&primitive.mesh))
        .filter_map(|mesh| mesh.compute_aabb())
        .map(|aabb| ContentBounds::new(Vec3::from(aabb.min()), Vec3::from(aabb.max())))
        .reduce(|a, b| a.union(&b))
}

/// Bounds of the file as it will be spawned: the node tree is walked with
/// each node's transform applied to its meshes.
fn gltf_bounds(
    gltf: &Gltf,
    gltf_nodes: &Assets<GltfNode>,
    gltf_meshes: &Assets<GltfMesh>,
    meshes: &Assets<Mesh>,
) -> Option<ContentBounds> {
    let index: HashMap<AssetId<GltfNode>, usize> = gltf
        .nodes
        .iter()
        .enumerate()
        .map(|(i, handle)| (handle.id(), i))
        .collect();
    let nodes: Vec<SceneNode> = gltf
        .nodes
        .iter()
        .map(|handle| match gltf_nodes.get(handle) {
            Some(node) => SceneNode {
                local: node.transform.compute_matrix(),
                children: node
                    .children
                    .iter()
                    .filter_map(|child| index.get(&child.id()).copied())
                    .collect(),
                mesh_bounds: node
                    .mesh
                    .as_ref()
                    .and_then(|mesh| mesh_bounds(mesh, gltf_meshes, meshes)),
            },
            None => SceneNode::default(),
        })
        .collect();

    scene_bounds(&nodes).or_else(|| {
        // Meshes without any node referencing them: fall back to mesh space.
        gltf.meshes
            .iter()
            .filter_map(|handle| mesh_bounds(handle, gltf_meshes, meshes))
            .reduce(|a, b| a.union(&b))
    })
}

/// Loader handed to the back-ends; requests go straight to the
/// `AssetServer`, completions come from [`AssetBridgeState::resolve`].
pub struct BevyAssetBridge {
    server: AssetServer,
    state: AssetBridgeState,
}

impl BevyAssetBridge {
    pub fn new(server: AssetServer, state: AssetBridgeState) -> Self {
        Self { server, state }
    }
}

impl AssetLoader for BevyAssetBridge {
    fn request(&mut self, kind: AssetKind, path: &str) -> LoadTicket {
        let mut inner = self.state.0.borrow_mut();
        inner.next_ticket += 1;
        let ticket = LoadTicket(inner.next_ticket);
        debug!("Requesting {} from {}", kind.as_str(), path);
        inner.pending.push(PendingLoad {
            ticket,
            kind,
            path: path.to_string(),
            handle: self.server.load(path.to_string()),
        });
        ticket
    }

    fn poll_completed(&mut self) -> Vec<LoadCompletion> {
        std::mem::take(&mut self.state.0.borrow_mut().completed)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn unit_box() -> Option<ContentBounds> {
        Some(ContentBounds::from_size(Vec3::ONE))
    }

    #[test]
    fn scaled_root_scales_its_meshes() {
        // Exporter-style root: 100x down-scale and a Y-up fix around X.
        let root = SceneNode {
            local: Mat4::from_scale_rotation_translation(
                Vec3::splat(0.01),
                Quat::from_rotation_x(-FRAC_PI_2),
                Vec3::ZERO,
            ),
            children: vec![1],
            mesh_bounds: None,
        };
        let body = SceneNode {
            local: Mat4::IDENTITY,
            children: Vec::new(),
            mesh_bounds: Some(ContentBounds::new(Vec3::new(-50.0, -10.0, 0.0), Vec3::new(50.0, 10.0, 200.0))),
        };

        let bounds = scene_bounds(&[root, body]).expect("mesh found");
        // 200 units along Z become 2 m along Y.
        assert!(bounds.size().abs_diff_eq(Vec3::new(1.0, 2.0, 0.2), 1e-4));
        assert!((bounds.largest_dimension() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn child_offsets_accumulate() {
        let nodes = [
            SceneNode {
                local: Mat4::from_translation(Vec3::X),
                children: vec![1],
                mesh_bounds: unit_box(),
            },
            SceneNode {
                local: Mat4::from_translation(Vec3::X * 2.0),
                children: Vec::new(),
                mesh_bounds: unit_box(),
            },
        ];
        let bounds = scene_bounds(&nodes).expect("meshes found");
        assert!(bounds.min.abs_diff_eq(Vec3::new(0.5, -0.5, -0.5), 1e-5));
        assert!(bounds.max.abs_diff_eq(Vec3::new(3.5, 0.5, 0.5), 1e-5));
    }

    #[test]
    fn cyclic_children_terminate() {
        let nodes = [
            SceneNode {
                local: Mat4::IDENTITY,
                children: vec![1],
                mesh_bounds: unit_box(),
            },
            SceneNode {
                local: Mat4::IDENTITY,
                children: vec![0],
                mesh_bounds: unit_box(),
            },
        ];
        // Every node is someone's child, so there is no root to start from.
        assert_eq!(scene_bounds(&nodes), None);
    }

    #[test]
    fn nodes_without_meshes_have_no_bounds() {
        assert_eq!(scene_bounds(&[SceneNode::default()]), None);
    }
}
