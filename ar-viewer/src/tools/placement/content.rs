use bevy::log::warn;
use bevy::math::{Mat4, Vec3};
use constants::asset::PLACEHOLDER_SIZE_M;
use constants::placement::WALL_CORRECTION_ANGLE;

use crate::boundary::{AssetError, AssetKind, LoadedAsset, NodeId, NodeSource, SceneRenderer};
use crate::engine::config::ArConfig;
use crate::engine::math::{ContentBounds, Pose};
use crate::engine::surface::SurfaceClass;

/// Local rotation applied after the anchored pose for each surface.
pub fn surface_correction(class: SurfaceClass) -> Mat4 {
    match class {
        SurfaceClass::Wall => Mat4::from_rotation_x(WALL_CORRECTION_ANGLE),
        SurfaceClass::Floor => Mat4::IDENTITY,
    }
}

/// World pose of content placed at `pose` on a `class` surface.
pub fn placement_matrix(pose: &Pose, class: SurfaceClass) -> Mat4 {
    pose.then(surface_correction(class)).matrix()
}

/// Scale the largest bounds dimension to `target_m` and centre the box on
/// the origin; floor content is raised so it rests `lift_m` above the floor.
pub fn fit_transform(bounds: &ContentBounds, target_m: f32, surface: SurfaceClass, lift_m: f32) -> Mat4 {
    let bounds = bounds.sanitised();
    let scale = target_m / bounds.largest_dimension();
    let mut offset = -bounds.center() * scale;
    if surface == SurfaceClass::Floor {
        offset.y += bounds.size().y * scale * 0.5 + lift_m;
    }
    Mat4::from_translation(offset) * Mat4::from_scale(Vec3::splat(scale))
}

/// Nodes created for one piece of content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentNodes {
    pub root: NodeId,
    pub body: NodeId,
    pub bounds: ContentBounds,
}

/// Instantiate a loaded asset, or a placeholder box when loading failed,
/// under a fresh group node. The group starts hidden at the origin.
pub fn build_content(
    renderer: &mut dyn SceneRenderer,
    kind: AssetKind,
    surface: SurfaceClass,
    loaded: &Result<LoadedAsset, AssetError>,
    config: &ArConfig,
) -> ContentNodes {
    let root = renderer.create_node(NodeSource::Group);
    renderer.set_visible(root, false);

    let (source, target_m) = match loaded {
        Ok(asset) => {
            let bounds = asset.bounds.sanitised();
            (
                NodeSource::Asset {
                    kind,
                    path: asset.path.clone(),
                    bounds,
                },
                config.asset(kind).target_size_m,
            )
        }
        Err(err) => {
            warn!("Using placeholder for {}: {}", kind.as_str(), err);
            let bounds = ContentBounds::from_size(Vec3::from_array(PLACEHOLDER_SIZE_M));
            // Placeholders keep their own size.
            (NodeSource::Placeholder { kind, bounds }, bounds.largest_dimension())
        }
    };
    let bounds = source.bounds().unwrap_or_else(|| ContentBounds::from_size(Vec3::ONE));

    let body = renderer.create_node(source);
    renderer.set_parent(body, Some(root));
    renderer.set_local_matrix(body, fit_transform(&bounds, target_m, surface, config.floor_lift_m));

    ContentNodes { root, body, bounds }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Quat;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn largest_dimension_maps_to_target() {
        let bounds = ContentBounds::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 0.5));
        let fit = fit_transform(&bounds, 0.30, SurfaceClass::Wall, 0.01);
        let min = fit.transform_point3(bounds.min);
        let max = fit.transform_point3(bounds.max);
        assert!(((max - min).x - 0.30).abs() < 1e-5);
        // Centred on the origin.
        assert!(((min + max) * 0.5).length() < 1e-5);
    }

    #[test]
    fn floor_content_rests_above_floor() {
        let bounds = ContentBounds::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 3.0, 1.0));
        let fit = fit_transform(&bounds, 0.50, SurfaceClass::Floor, 0.01);
        let bottom = fit.transform_point3(bounds.min).y;
        assert!((bottom - 0.01).abs() < 1e-5, "bottom = {bottom}");
    }

    #[test]
    fn wall_correction_turns_up_into_outward() {
        // A wall hit pose has its Y axis along the wall normal (+Z here).
        let hit = Pose::from_rotation_translation(Quat::from_rotation_x(FRAC_PI_2), Vec3::ZERO);
        let placed = Pose::from_matrix(placement_matrix(&hit, SurfaceClass::Wall));
        assert!(placed.axis_z().abs_diff_eq(Vec3::Z, 1e-5));
        assert!(placed.axis_y().abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn floor_has_no_correction() {
        let hit = Pose::from_translation(Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(placement_matrix(&hit, SurfaceClass::Floor), hit.matrix());
    }
}
