use bevy::math::{Mat4, Quat, Vec3, Vec4};

/// Rigid transform (position + orientation) held as a column-major affine matrix.
///
/// Runtime poses arrive as 16 floats in column-major order; the second and
/// third basis columns are the local Y and Z axes the surface classifier reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose(Mat4);

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose(Mat4::IDENTITY);

    pub fn from_matrix(matrix: Mat4) -> Self {
        Self(matrix)
    }

    /// Build from the runtime's column-major float layout.
    pub fn from_cols_array(cols: &[f32; 16]) -> Self {
        Self(Mat4::from_cols_array(cols))
    }

    pub fn from_translation(position: Vec3) -> Self {
        Self(Mat4::from_translation(position))
    }

    pub fn from_rotation_translation(rotation: Quat, position: Vec3) -> Self {
        Self(Mat4::from_rotation_translation(rotation, position))
    }

    /// Pose at `position` whose +Z axis points at `target`.
    ///
    /// Falls back to the X axis for the side vector when `up` and the
    /// viewing direction are parallel (looking straight up or down).
    pub fn facing(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let Some(z) = (target - position).try_normalize() else {
            return Self::from_translation(position);
        };
        let x = up.cross(z).try_normalize().unwrap_or(Vec3::X);
        let y = z.cross(x).normalize();
        let x = y.cross(z);
        Self(Mat4::from_cols(
            x.extend(0.0),
            y.extend(0.0),
            z.extend(0.0),
            position.extend(1.0),
        ))
    }

    pub fn matrix(&self) -> Mat4 {
        self.0
    }

    pub fn to_cols_array(&self) -> [f32; 16] {
        self.0.to_cols_array()
    }

    pub fn position(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }

    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.0.to_scale_rotation_translation();
        rotation
    }

    /// Normalised first basis column.
    pub fn axis_x(&self) -> Vec3 {
        basis(self.0.x_axis)
    }

    /// Normalised second basis column (local up).
    pub fn axis_y(&self) -> Vec3 {
        basis(self.0.y_axis)
    }

    /// Normalised third basis column.
    pub fn axis_z(&self) -> Vec3 {
        basis(self.0.z_axis)
    }

    /// Viewing direction of a camera pose (local -Z).
    pub fn forward(&self) -> Vec3 {
        -self.axis_z()
    }

    /// Point `distance` metres along the forward axis.
    pub fn point_ahead(&self, distance: f32) -> Vec3 {
        self.position() + self.forward() * distance
    }

    /// Post-multiply by a local-space transform.
    pub fn then(&self, local: Mat4) -> Pose {
        Pose(self.0 * local)
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position().distance(point)
    }
}

fn basis(column: Vec4) -> Vec3 {
    column.truncate().normalize_or_zero()
}

/// Axis-aligned bounds of a content subgraph in its own local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ContentBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box of the given size centred on the origin.
    pub fn from_size(size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: -half,
            max: half,
        }
    }

    /// Grow to include `other`.
    pub fn union(&self, other: &ContentBounds) -> ContentBounds {
        ContentBounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Axis-aligned bounds of this box after `matrix` is applied to it.
    pub fn transformed(&self, matrix: Mat4) -> ContentBounds {
        let corners = (0..8).map(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        });
        let mut out = ContentBounds {
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
        };
        for corner in corners {
            let point = matrix.transform_point3(corner);
            out.min = out.min.min(point);
            out.max = out.max.max(point);
        }
        out
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn largest_dimension(&self) -> f32 {
        self.size().max_element()
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Clamp degenerate extents so scaling never divides by zero.
    pub fn sanitised(&self) -> ContentBounds {
        if !self.is_finite() {
            return ContentBounds::from_size(Vec3::splat(0.001));
        }
        let centre = self.center();
        let size = self.size().max(Vec3::splat(0.001));
        ContentBounds {
            min: centre - size * 0.5,
            max: centre + size * 0.5,
        }
    }
}
