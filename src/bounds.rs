// src/bounds.rs
//! Per-instance bounding data fed into the culling pipeline.
//!
//! The engine never owns scene objects: callers distil whatever scene
//! representation they have into one [`InstanceBounds`] per object per batch.
//! Records are read-only for the engine and can be discarded after the pass.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{CullError, Result};

/// Unique identifier for a renderable object (mesh instance).
///
/// Uniqueness is the caller's responsibility; the engine only carries the id
/// through to [`CullingResult`](crate::CullingResult).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bounding proxy for one object: world-space center, bounding sphere, AABB
/// and a precomputed on-screen size estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceBounds {
    /// Stable external key carried through the result.
    pub id: InstanceId,
    /// World-space center, the anchor for the distance test and the sphere/AABB.
    pub position: Vec3,
    /// Bounding sphere radius, `>= 0`.
    pub radius: f32,
    /// AABB minimum corner, component-wise `<= max_corner`.
    pub min_corner: Vec3,
    /// AABB maximum corner.
    pub max_corner: Vec3,
    /// Normalized on-screen size estimate in `[0, inf)`, nominally the
    /// `[0, 1]` fraction of viewport height the bounding sphere subtends.
    pub screen_size: f32,
}

impl InstanceBounds {
    /// Creates bounds from a position and bounding-sphere radius.
    ///
    /// The AABB defaults to the sphere's enclosing cube and `screen_size`
    /// to `0.0`; use [`with_aabb`](Self::with_aabb) /
    /// [`with_screen_size`](Self::with_screen_size) to refine.
    pub fn new(id: InstanceId, position: Vec3, radius: f32) -> Self {
        let half = Vec3::splat(radius);
        Self {
            id,
            position,
            radius,
            min_corner: position - half,
            max_corner: position + half,
            screen_size: 0.0,
        }
    }

    /// Replaces the derived AABB with an explicit one.
    pub fn with_aabb(mut self, min_corner: Vec3, max_corner: Vec3) -> Self {
        self.min_corner = min_corner;
        self.max_corner = max_corner;
        self
    }

    /// Sets the precomputed screen-size estimate.
    pub fn with_screen_size(mut self, screen_size: f32) -> Self {
        self.screen_size = screen_size;
        self
    }

    /// Rejects malformed geometry before it can poison a batch result.
    ///
    /// No silent clamping: NaN/infinite coordinates, negative radii and
    /// inverted AABBs all surface as [`CullError::InvalidBounds`].
    pub fn validate(&self) -> Result<()> {
        if !self.position.is_finite() {
            return Err(CullError::bounds(self.id, "non-finite position"));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(CullError::bounds(
                self.id,
                format!("radius must be finite and >= 0, got {}", self.radius),
            ));
        }
        if !self.min_corner.is_finite() || !self.max_corner.is_finite() {
            return Err(CullError::bounds(self.id, "non-finite AABB corner"));
        }
        if self.min_corner.cmpgt(self.max_corner).any() {
            return Err(CullError::bounds(
                self.id,
                format!(
                    "min_corner {} exceeds max_corner {}",
                    self.min_corner, self.max_corner
                ),
            ));
        }
        if !self.screen_size.is_finite() || self.screen_size < 0.0 {
            return Err(CullError::bounds(
                self.id,
                format!("screen_size must be finite and >= 0, got {}", self.screen_size),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_cube_aabb_from_sphere() {
        let b = InstanceBounds::new(InstanceId(1), Vec3::new(10.0, 0.0, -2.0), 3.0);
        assert_eq!(b.min_corner, Vec3::new(7.0, -3.0, -5.0));
        assert_eq!(b.max_corner, Vec3::new(13.0, 3.0, 1.0));
        assert!(b.validate().is_ok());
    }

    #[test]
    fn rejects_nan_position() {
        let b = InstanceBounds::new(InstanceId(2), Vec3::new(f32::NAN, 0.0, 0.0), 1.0);
        assert!(b.validate().unwrap_err().is_invalid_bounds());
    }

    #[test]
    fn rejects_negative_radius() {
        let b = InstanceBounds::new(InstanceId(3), Vec3::ZERO, -1.0);
        assert!(b.validate().is_err());
    }

    #[test]
    fn rejects_inverted_aabb() {
        let b = InstanceBounds::new(InstanceId(4), Vec3::ZERO, 1.0)
            .with_aabb(Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 2.0, 2.0));
        assert!(b.validate().is_err());
    }

    #[test]
    fn rejects_negative_screen_size() {
        let b = InstanceBounds::new(InstanceId(5), Vec3::ZERO, 1.0).with_screen_size(-0.1);
        assert!(b.validate().is_err());
    }

    #[test]
    fn zero_radius_degenerate_is_valid() {
        let b = InstanceBounds::new(InstanceId(6), Vec3::ONE, 0.0);
        assert!(b.validate().is_ok());
        assert_eq!(b.min_corner, b.max_corner);
    }
}
