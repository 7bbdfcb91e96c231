use bevy::math::{Mat4, Vec3};

use super::pose::ContentBounds;

/// Ray against content bounds placed by `world_from_local`.
///
/// The ray is moved into the content's local space and tested against the
/// local AABB, so rotated and scaled content is handled as an OBB.
pub fn ray_hits_content(
    origin: Vec3,
    direction: Vec3,
    world_from_local: Mat4,
    bounds: &ContentBounds,
) -> Option<f32> {
    if world_from_local.determinant().abs() < f32::EPSILON {
        return None;
    }
    let inv = world_from_local.inverse();
    let o_local = inv.transform_point3(origin);
    let d_local = inv.transform_vector3(direction);
    let t_local = ray_aabb_hit_t(o_local, d_local, bounds.min, bounds.max)?;

    // t is in local units; convert back to world distance along the ray
    let hit_world = world_from_local.transform_point3(o_local + d_local * t_local);
    Some(hit_world.distance(origin))
}

// Slab-method ray–AABB intersection, returns Some(t) or None
pub fn ray_aabb_hit_t(ray_origin: Vec3, ray_direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let inv = Vec3::new(
        if ray_direction.x != 0.0 { 1.0 / ray_direction.x } else { f32::INFINITY },
        if ray_direction.y != 0.0 { 1.0 / ray_direction.y } else { f32::INFINITY },
        if ray_direction.z != 0.0 { 1.0 / ray_direction.z } else { f32::INFINITY },
    );

    let (mut tmin, mut tmax) = (
        slab(min.x, ray_origin.x, inv.x, true),
        slab(max.x, ray_origin.x, inv.x, false),
    );
    if tmin > tmax { std::mem::swap(&mut tmin, &mut tmax); }

    let (mut tymin, mut tymax) = (
        slab(min.y, ray_origin.y, inv.y, true),
        slab(max.y, ray_origin.y, inv.y, false),
    );
    if tymin > tymax { std::mem::swap(&mut tymin, &mut tymax); }

    if (tmin > tymax) || (tymin > tmax) { return None; }
    if tymin > tmin { tmin = tymin; }
    if tymax < tmax { tmax = tymax; }

    let (mut tzmin, mut tzmax) = (
        slab(min.z, ray_origin.z, inv.z, true),
        slab(max.z, ray_origin.z, inv.z, false),
    );
    if tzmin > tzmax { std::mem::swap(&mut tzmin, &mut tzmax); }

    if (tmin > tzmax) || (tzmin > tmax) { return None; }
    if tzmin > tmin { tmin = tzmin; }
    if tzmax < tmax { tmax = tzmax; }

    if tmax < 0.0 { return None; }
    Some(if tmin >= 0.0 { tmin } else { tmax })
}

// A parallel ray lying on a slab plane gives 0 * inf; that slab is unbounded
fn slab(edge: f32, origin: f32, inv_dir: f32, is_min: bool) -> f32 {
    let t = (edge - origin) * inv_dir;
    match (t.is_nan(), is_min) {
        (false, _) => t,
        (true, true) => f32::NEG_INFINITY,
        (true, false) => f32::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Quat;

    fn unit_box() -> ContentBounds {
        ContentBounds::from_size(Vec3::splat(1.0))
    }

    #[test]
    fn straight_ray_hits_box_front_face() {
        let t = ray_aabb_hit_t(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Vec3::splat(-0.5), Vec3::splat(0.5));
        assert_eq!(t, Some(4.5));
    }

    #[test]
    fn ray_pointing_away_misses() {
        let t = ray_aabb_hit_t(Vec3::new(0.0, 0.0, 5.0), Vec3::Z, Vec3::splat(-0.5), Vec3::splat(0.5));
        assert_eq!(t, None);
    }

    #[test]
    fn rotated_scaled_content_is_hit_in_world_units() {
        let xf = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(0.7),
            Vec3::new(0.0, 0.0, -3.0),
        );
        let hit = ray_hits_content(Vec3::ZERO, Vec3::NEG_Z, xf, &unit_box());
        let t = hit.expect("ray should hit");
        assert!(t > 1.0 && t < 3.0, "t = {t}");
    }

    #[test]
    fn offset_ray_misses_small_content() {
        let xf = Mat4::from_translation(Vec3::new(2.0, 0.0, -3.0));
        assert!(ray_hits_content(Vec3::ZERO, Vec3::NEG_Z, xf, &unit_box()).is_none());
    }
}
