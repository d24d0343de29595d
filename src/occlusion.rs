// src/occlusion.rs
//! Approximate occlusion prepass over a coarse CPU depth grid.
//!
//! A deliberately cheap stand-in for a hierarchical Z-buffer: once per frame
//! [`build_depth_buffer`](OcclusionCuller::build_depth_buffer) splats each
//! occluder's bounding-sphere footprint into a square depth grid
//! (min-write), then [`is_occluded`](OcclusionCuller::is_occluded) answers
//! many queries against that grid. The build phase must fully complete
//! before queries run: single writer, then many readers, sequenced by the
//! caller within one frame.
//!
//! This pass runs *after* frustum/distance culling over the survivors; it is
//! never a substitute for those stages.

use glam::Vec3;

use crate::bounds::InstanceBounds;
use crate::error::{CullError, Result};

/// Default depth grid side length.
pub const DEFAULT_RESOLUTION: usize = 256;

/// Default far-plane constant used to normalize depths into `[0, 1]`.
pub const DEFAULT_FAR_PLANE: f32 = 1000.0;

/// Build-time camera frame: position plus an orthonormal screen basis
/// derived from the forward vector.
#[derive(Clone, Copy, Debug)]
struct ViewBasis {
    position: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
}

impl ViewBasis {
    fn from_forward(position: Vec3, forward: Vec3) -> Option<Self> {
        let forward = forward.normalize_or_zero();
        if forward == Vec3::ZERO {
            return None;
        }
        // World-up reference, switching when forward is near vertical.
        let reference = if forward.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
        let right = forward.cross(reference).normalize_or_zero();
        if right == Vec3::ZERO {
            return None;
        }
        let up = right.cross(forward);
        Some(Self {
            position,
            forward,
            right,
            up,
        })
    }

    /// Projects a world point to `(u, v, z)` where `u`/`v` are view-plane
    /// tangents and `z` is depth along forward. `None` behind the camera.
    fn project(&self, point: Vec3) -> Option<(f32, f32, f32)> {
        let rel = point - self.position;
        let z = rel.dot(self.forward);
        if z <= 0.0 {
            return None;
        }
        Some((rel.dot(self.right) / z, rel.dot(self.up) / z, z))
    }
}

/// Square footprint of a projected sphere, in grid cells.
#[derive(Clone, Copy, Debug)]
struct CellRect {
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

/// Approximate hierarchical-Z style occlusion culler.
///
/// Owns a `resolution x resolution` grid of normalized depths in `[0, 1]`
/// where `1.0` is the far plane. The projection window covers a fixed
/// 90-degree square field around the build-time forward axis; objects
/// outside it are simply reported not-occluded, which errs on the visible
/// side.
pub struct OcclusionCuller {
    resolution: usize,
    far_plane: f32,
    depth: Vec<f32>,
    view: Option<ViewBasis>,
}

impl OcclusionCuller {
    /// Creates a culler with a `resolution x resolution` depth grid.
    pub fn new(resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(CullError::InvalidResolution(resolution));
        }
        Ok(Self {
            resolution,
            far_plane: DEFAULT_FAR_PLANE,
            depth: vec![1.0; resolution * resolution],
            view: None,
        })
    }

    /// Overrides the far-plane normalization constant.
    pub fn with_far_plane(mut self, far_plane: f32) -> Result<Self> {
        if !far_plane.is_finite() || far_plane <= 0.0 {
            return Err(CullError::camera(
                "far_plane",
                format!("must be finite and > 0, got {far_plane}"),
            ));
        }
        self.far_plane = far_plane;
        Ok(self)
    }

    /// Grid side length.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Rebuilds the depth grid from a set of occluders.
    ///
    /// Resets every cell to `1.0` (far), then for each occluder min-writes
    /// its normalized camera distance over the grid cells its bounding
    /// sphere projects onto. Occluders behind the camera are skipped.
    /// Malformed occluder bounds or a degenerate (zero / non-finite)
    /// forward vector fail the call and leave the culler answering
    /// not-occluded.
    pub fn build_depth_buffer(
        &mut self,
        occluders: &[InstanceBounds],
        camera_position: Vec3,
        camera_forward: Vec3,
    ) -> Result<()> {
        self.depth.fill(1.0);
        self.view = None;

        for occluder in occluders {
            occluder.validate()?;
        }
        if !camera_position.is_finite() {
            return Err(CullError::camera("position", "must be finite"));
        }
        if !camera_forward.is_finite() {
            return Err(CullError::camera("forward", "must be finite"));
        }
        let view = ViewBasis::from_forward(camera_position, camera_forward)
            .ok_or_else(|| CullError::camera("forward", "must be non-zero"))?;

        for occluder in occluders {
            let Some((u, v, z)) = view.project(occluder.position) else {
                continue;
            };
            let depth = (camera_position.distance(occluder.position) / self.far_plane)
                .clamp(0.0, 1.0);
            if let Some(rect) = self.footprint(u, v, occluder.radius / z) {
                self.splat_min(rect, depth);
            }
        }
        self.view = Some(view);

        log::trace!(
            "occlusion grid rebuilt from {} occluders at {}x{}",
            occluders.len(),
            self.resolution,
            self.resolution
        );
        Ok(())
    }

    /// Tests a candidate against the current grid.
    ///
    /// Returns `false` when no depth buffer has been built. Conservative:
    /// occluded only when every grid cell under the candidate's footprint
    /// holds a strictly smaller depth than the candidate's nearest extent.
    /// Behind-camera and off-window candidates report not-occluded.
    pub fn is_occluded(&self, instance: &InstanceBounds, camera_position: Vec3) -> bool {
        let Some(view) = self.view else {
            return false;
        };
        let Some((u, v, z)) = view.project(instance.position) else {
            return false;
        };
        let near_extent = (camera_position.distance(instance.position) - instance.radius).max(0.0);
        let depth = (near_extent / self.far_plane).clamp(0.0, 1.0);

        let Some(rect) = self.footprint(u, v, instance.radius / z) else {
            return false;
        };
        for y in rect.y0..=rect.y1 {
            for x in rect.x0..=rect.x1 {
                if self.depth[y * self.resolution + x] >= depth {
                    return false;
                }
            }
        }
        true
    }

    /// Maps a projected center and footprint radius (both view-plane
    /// tangents, window spanning `[-1, 1]`) to the covered grid cells.
    /// `None` when the footprint misses the window entirely.
    fn footprint(&self, u: f32, v: f32, radius: f32) -> Option<CellRect> {
        let res = self.resolution as f32;
        let cx = (u * 0.5 + 0.5) * res;
        let cy = (v * 0.5 + 0.5) * res;
        let r = (radius * 0.5 * res).max(0.0);

        let max_cell = self.resolution - 1;
        let lo = |c: f32| ((c - r).floor().max(0.0) as usize).min(max_cell);
        let hi = |c: f32| ((c + r).floor().max(0.0) as usize).min(max_cell);

        if cx + r < 0.0 || cy + r < 0.0 || cx - r >= res || cy - r >= res {
            return None;
        }
        Some(CellRect {
            x0: lo(cx),
            x1: hi(cx),
            y0: lo(cy),
            y1: hi(cy),
        })
    }

    fn splat_min(&mut self, rect: CellRect, depth: f32) {
        for y in rect.y0..=rect.y1 {
            for x in rect.x0..=rect.x1 {
                let cell = &mut self.depth[y * self.resolution + x];
                if depth < *cell {
                    *cell = depth;
                }
            }
        }
    }
}

impl Default for OcclusionCuller {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            far_plane: DEFAULT_FAR_PLANE,
            depth: vec![1.0; DEFAULT_RESOLUTION * DEFAULT_RESOLUTION],
            view: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::InstanceId;

    fn bounds(id: u64, position: Vec3, radius: f32) -> InstanceBounds {
        InstanceBounds::new(InstanceId(id), position, radius)
    }

    #[test]
    fn zero_resolution_is_rejected() {
        assert!(matches!(
            OcclusionCuller::new(0),
            Err(CullError::InvalidResolution(0))
        ));
    }

    #[test]
    fn invalid_far_plane_is_rejected() {
        assert!(OcclusionCuller::new(64).unwrap().with_far_plane(0.0).is_err());
        assert!(OcclusionCuller::new(64)
            .unwrap()
            .with_far_plane(f32::NAN)
            .is_err());
    }

    #[test]
    fn no_build_means_nothing_is_occluded() {
        let culler = OcclusionCuller::default();
        assert!(!culler.is_occluded(&bounds(1, Vec3::new(0.0, 0.0, -10.0), 1.0), Vec3::ZERO));
    }

    #[test]
    fn occluder_hides_what_is_behind_it() {
        let mut culler = OcclusionCuller::new(64).unwrap();
        culler
            .build_depth_buffer(
                &[bounds(1, Vec3::new(0.0, 0.0, -5.0), 1.0)],
                Vec3::ZERO,
                Vec3::NEG_Z,
            )
            .unwrap();

        // Behind the occluder, inside its footprint.
        assert!(culler.is_occluded(&bounds(2, Vec3::new(0.0, 0.0, -10.0), 0.2), Vec3::ZERO));
        // In front of the occluder.
        assert!(!culler.is_occluded(&bounds(3, Vec3::new(0.0, 0.0, -2.0), 0.2), Vec3::ZERO));
    }

    #[test]
    fn candidate_peeking_past_the_footprint_stays_visible() {
        let mut culler = OcclusionCuller::new(64).unwrap();
        culler
            .build_depth_buffer(
                &[bounds(1, Vec3::new(0.0, 0.0, -5.0), 0.5)],
                Vec3::ZERO,
                Vec3::NEG_Z,
            )
            .unwrap();

        // Far off to the side: none of its cells are covered.
        assert!(!culler.is_occluded(&bounds(2, Vec3::new(8.0, 0.0, -10.0), 0.2), Vec3::ZERO));
        // Huge sphere behind a small occluder: footprint reaches far past
        // the written cells, so at least one cell stays far.
        assert!(!culler.is_occluded(&bounds(3, Vec3::new(0.0, 0.0, -20.0), 10.0), Vec3::ZERO));
    }

    #[test]
    fn behind_camera_candidates_are_not_occluded() {
        let mut culler = OcclusionCuller::new(64).unwrap();
        culler
            .build_depth_buffer(
                &[bounds(1, Vec3::new(0.0, 0.0, -5.0), 1.0)],
                Vec3::ZERO,
                Vec3::NEG_Z,
            )
            .unwrap();
        assert!(!culler.is_occluded(&bounds(2, Vec3::new(0.0, 0.0, 10.0), 1.0), Vec3::ZERO));
    }

    #[test]
    fn behind_camera_occluders_are_skipped() {
        let mut culler = OcclusionCuller::new(64).unwrap();
        culler
            .build_depth_buffer(
                &[bounds(1, Vec3::new(0.0, 0.0, 5.0), 1.0)],
                Vec3::ZERO,
                Vec3::NEG_Z,
            )
            .unwrap();
        // Grid stayed at far depth, so nothing can be occluded.
        assert!(!culler.is_occluded(&bounds(2, Vec3::new(0.0, 0.0, -10.0), 1.0), Vec3::ZERO));
    }

    #[test]
    fn rebuild_resets_the_grid() {
        let mut culler = OcclusionCuller::new(64).unwrap();
        let occluder = bounds(1, Vec3::new(0.0, 0.0, -5.0), 1.0);
        let candidate = bounds(2, Vec3::new(0.0, 0.0, -10.0), 0.2);

        culler
            .build_depth_buffer(&[occluder], Vec3::ZERO, Vec3::NEG_Z)
            .unwrap();
        assert!(culler.is_occluded(&candidate, Vec3::ZERO));

        // Occluder gone: the same candidate is visible again.
        culler.build_depth_buffer(&[], Vec3::ZERO, Vec3::NEG_Z).unwrap();
        assert!(!culler.is_occluded(&candidate, Vec3::ZERO));
    }

    #[test]
    fn degenerate_forward_fails_and_disables_queries() {
        let mut culler = OcclusionCuller::new(64).unwrap();
        let occluder = bounds(1, Vec3::new(0.0, 0.0, -5.0), 1.0);
        assert!(culler
            .build_depth_buffer(&[occluder], Vec3::ZERO, Vec3::ZERO)
            .is_err());
        assert!(!culler.is_occluded(&bounds(2, Vec3::new(0.0, 0.0, -10.0), 1.0), Vec3::ZERO));
    }

    #[test]
    fn vertical_forward_still_builds_a_basis() {
        let mut culler = OcclusionCuller::new(64).unwrap();
        culler
            .build_depth_buffer(
                &[bounds(1, Vec3::new(0.0, -5.0, 0.0), 1.0)],
                Vec3::ZERO,
                Vec3::NEG_Y,
            )
            .unwrap();
        assert!(culler.is_occluded(&bounds(2, Vec3::new(0.0, -10.0, 0.0), 0.2), Vec3::ZERO));
    }

    #[test]
    fn near_occluder_covers_more_than_one_cell() {
        let mut culler = OcclusionCuller::new(64).unwrap();
        culler
            .build_depth_buffer(
                &[bounds(1, Vec3::new(0.0, 0.0, -2.0), 1.0)],
                Vec3::ZERO,
                Vec3::NEG_Z,
            )
            .unwrap();
        let written = culler.depth.iter().filter(|&&d| d < 1.0).count();
        assert!(written > 1, "expected a multi-cell footprint, got {written}");
    }
}
