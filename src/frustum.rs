// src/frustum.rs
//! View-frustum construction and containment tests.
//!
//! A [`Frustum`] is six inward-facing planes built once per camera pose and
//! immutable afterwards. Tests are short-circuit ANDs over the planes:
//! * point – inside iff on the inner half-space of every plane,
//! * sphere – rejected only when entirely outside one plane,
//! * AABB – rejected only when all eight corners are outside one plane
//!   (conservative; boxes near frustum edges can report visible).

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::{CullError, Result};

/// A plane in 3D space. A point `p` is on the inside half-space iff
/// `normal.dot(p) + d >= 0`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    /// Unit normal pointing into the frustum volume.
    pub normal: Vec3,
    /// Scalar term, `d = -(normal . point_on_plane)`.
    pub d: f32,
}

impl Plane {
    /// Creates a plane from raw components.
    pub const fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Creates a plane through `point` with the given inward `normal`.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    /// Signed distance from a point; `>= 0` means inside.
    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }

    /// Converts to `[nx, ny, nz, d]` for transport or GPU upload.
    pub fn as_array(&self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.d]
    }
}

/// View frustum: six planes in the fixed order near, far, top, bottom,
/// left, right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Near, far, top, bottom, left, right planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Near plane index.
    pub const NEAR: usize = 0;
    /// Far plane index.
    pub const FAR: usize = 1;
    /// Top plane index.
    pub const TOP: usize = 2;
    /// Bottom plane index.
    pub const BOTTOM: usize = 3;
    /// Left plane index.
    pub const LEFT: usize = 4;
    /// Right plane index.
    pub const RIGHT: usize = 5;

    /// Builds a frustum from camera parameters.
    ///
    /// `forward`, `up` and `right` must be unit length and mutually
    /// orthonormal. That is a caller precondition, not verified here
    /// (violations produce undefined plane orientation). The four side-plane
    /// normals are re-normalized internally to absorb small input error.
    ///
    /// `fov_y_degrees` is the vertical field of view in `(0, 180)`, `aspect`
    /// is `width / height > 0`, and `0 < near < far`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_camera(
        position: Vec3,
        forward: Vec3,
        up: Vec3,
        right: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Result<Self> {
        if !position.is_finite() {
            return Err(CullError::camera("position", "must be finite"));
        }
        if !forward.is_finite() || !up.is_finite() || !right.is_finite() {
            return Err(CullError::camera("basis", "must be finite"));
        }
        if !fov_y_degrees.is_finite() || fov_y_degrees <= 0.0 || fov_y_degrees >= 180.0 {
            return Err(CullError::camera(
                "fov_y_degrees",
                format!("must be inside (0, 180), got {fov_y_degrees}"),
            ));
        }
        if !aspect.is_finite() || aspect <= 0.0 {
            return Err(CullError::camera(
                "aspect",
                format!("must be > 0, got {aspect}"),
            ));
        }
        if !near.is_finite() || near <= 0.0 {
            return Err(CullError::camera(
                "near",
                format!("must be > 0, got {near}"),
            ));
        }
        if !far.is_finite() || far <= near {
            return Err(CullError::camera(
                "far",
                format!("must be finite and > near ({near}), got {far}"),
            ));
        }

        let half_v = (fov_y_degrees.to_radians() * 0.5).tan();
        let half_h = half_v * aspect;

        let planes = [
            // Near / far sit along the view axis.
            Plane::from_point_normal(position + forward * near, forward),
            Plane::from_point_normal(position + forward * far, -forward),
            // The four side planes pass through the camera position.
            Plane::from_point_normal(position, (forward - up * half_v).normalize_or_zero()),
            Plane::from_point_normal(position, (forward + up * half_v).normalize_or_zero()),
            Plane::from_point_normal(position, (forward + right * half_h).normalize_or_zero()),
            Plane::from_point_normal(position, (forward - right * half_h).normalize_or_zero()),
        ];

        Ok(Self { planes })
    }

    /// Rebuilds a frustum from raw planes, e.g. a deserialized snapshot.
    ///
    /// Planes must already satisfy the inward-unit-normal invariant; no
    /// renormalization happens here.
    pub fn from_planes(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Tests whether a point is inside all six planes. Short-circuits on the
    /// first violating plane.
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }

    /// Tests whether a sphere intersects the frustum. A sphere straddling a
    /// plane is kept.
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) >= -radius)
    }

    /// Conservative AABB test: rejected only when all eight corners are
    /// outside one plane. Boxes diagonally outside a frustum corner can
    /// still report visible; accepted over-inclusion, not a defect.
    pub fn contains_aabb(&self, min_corner: Vec3, max_corner: Vec3) -> bool {
        let corners = [
            Vec3::new(min_corner.x, min_corner.y, min_corner.z),
            Vec3::new(max_corner.x, min_corner.y, min_corner.z),
            Vec3::new(min_corner.x, max_corner.y, min_corner.z),
            Vec3::new(max_corner.x, max_corner.y, min_corner.z),
            Vec3::new(min_corner.x, min_corner.y, max_corner.z),
            Vec3::new(max_corner.x, min_corner.y, max_corner.z),
            Vec3::new(min_corner.x, max_corner.y, max_corner.z),
            Vec3::new(max_corner.x, max_corner.y, max_corner.z),
        ];
        for plane in &self.planes {
            if corners.iter().all(|&c| plane.signed_distance(c) < 0.0) {
                return false;
            }
        }
        true
    }

    /// Converts all planes to `[[nx, ny, nz, d]; 6]` for transport.
    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        [
            self.planes[0].as_array(),
            self.planes[1].as_array(),
            self.planes[2].as_array(),
            self.planes[3].as_array(),
            self.planes[4].as_array(),
            self.planes[5].as_array(),
        ]
    }
}
