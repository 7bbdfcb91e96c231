use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;
use constants::asset::PLACEHOLDER_COLOUR;
use constants::reticle::{PLUS_HALF_LENGTH_M, RING_RADIUS_M, RING_SEGMENTS};

use super::asset_bridge::AssetBridgeState;
use super::scene_graph::SharedSceneGraph;
use crate::boundary::{NodeId, NodeSource, ReticleGlyph, SceneRenderer};
use crate::engine::math::Pose;

/// Entity standing in for one scene graph node.
#[derive(Component)]
pub struct MirroredNode(pub NodeId);

/// Camera driven by the viewer pose.
#[derive(Component)]
pub struct ArCamera;

/// Node to entity map plus the graph revision last mirrored.
#[derive(Resource, Default)]
pub struct SceneMirror {
    entities: HashMap<NodeId, Entity>,
    revision: Option<u64>,
}

impl SceneMirror {
    pub fn entity(&self, node: NodeId) -> Option<Entity> {
        self.entities.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Spawn, move and despawn entities so they match the scene graph.
///
/// Entities are flat: each carries its node's world transform, so anchor
/// parenting never has to be mirrored into the Bevy hierarchy.
pub fn sync_scene_graph(
    scene: NonSend<SharedSceneGraph>,
    mut mirror: ResMut<SceneMirror>,
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut mirrored: Query<(&mut Transform, &mut Visibility), With<MirroredNode>>,
) {
    let graph = scene.graph();
    if mirror.revision == Some(graph.revision()) {
        return;
    }
    mirror.revision = Some(graph.revision());

    mirror.entities.retain(|id, entity| {
        let alive = graph.node(*id).is_some();
        if !alive {
            commands.entity(*entity).despawn();
        }
        alive
    });

    for (id, node) in graph.nodes() {
        let Some(world) = graph.world_matrix(id) else {
            continue;
        };
        let transform = Transform::from_matrix(world);
        let visibility = if graph.is_visible(id) {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };

        if let Some(entity) = mirror.entities.get(&id) {
            if let Ok((mut current, mut current_visibility)) = mirrored.get_mut(*entity) {
                *current = transform;
                *current_visibility = visibility;
            }
            continue;
        }

        let mut entity = commands.spawn((MirroredNode(id), transform, visibility));
        match &node.source {
            NodeSource::Group => {}
            NodeSource::Asset { path, .. } => {
                entity.insert(SceneRoot(
                    asset_server.load(GltfAssetLabel::Scene(0).from_asset(path.clone())),
                ));
            }
            NodeSource::Placeholder { bounds, .. } => {
                entity.insert((
                    Mesh3d(meshes.add(Cuboid::from_size(bounds.size()))),
                    MeshMaterial3d(materials.add(StandardMaterial {
                        base_color: PLACEHOLDER_COLOUR,
                        ..default()
                    })),
                ));
            }
        }
        debug!("Mirrored scene node {:?}", id);
        mirror.entities.insert(id, entity.id());
    }
}

pub fn follow_viewer_camera(scene: NonSend<SharedSceneGraph>, mut cameras: Query<&mut Transform, With<ArCamera>>) {
    let Some(viewer) = scene.graph().camera() else {
        return;
    };
    for mut transform in &mut cameras {
        *transform = Transform::from_matrix(viewer.matrix());
    }
}

/// Draw the debug reticle: a ring on floors, a plus on walls.
pub fn draw_reticle(scene: NonSend<SharedSceneGraph>, mut gizmos: Gizmos) {
    let Some(reticle) = scene.graph().reticle() else {
        return;
    };
    let pose = reticle.pose;
    match reticle.glyph {
        ReticleGlyph::Ring => {
            // Gizmo circles lie in the local XY plane; the surface normal is Y.
            let rotation = pose.rotation() * Quat::from_rotation_x(FRAC_PI_2);
            gizmos
                .circle(Isometry3d::new(pose.position(), rotation), RING_RADIUS_M, reticle.colour)
                .resolution(RING_SEGMENTS as u32);
        }
        ReticleGlyph::Plus => draw_plus(&mut gizmos, &pose, reticle.colour),
    }
}

fn draw_plus(gizmos: &mut Gizmos, pose: &Pose, colour: Color) {
    let centre = pose.position();
    for axis in [pose.axis_x(), pose.axis_z()] {
        let arm = axis.normalize_or_zero() * PLUS_HALF_LENGTH_M;
        gizmos.line(centre - arm, centre + arm, colour);
    }
}

/// Pull finished GLTF loads out of the `AssetServer`.
pub fn resolve_asset_loads(
    bridge: NonSend<AssetBridgeState>,
    asset_server: Res<AssetServer>,
    gltfs: Res<Assets<Gltf>>,
    gltf_nodes: Res<Assets<bevy::gltf::GltfNode>>,
    gltf_meshes: Res<Assets<bevy::gltf::GltfMesh>>,
    meshes: Res<Assets<Mesh>>,
) {
    if bridge.in_flight() == 0 {
        return;
    }
    bridge.resolve(&asset_server, &gltfs, &gltf_nodes, &gltf_meshes, &meshes);
}
