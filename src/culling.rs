// src/culling.rs
//! Visibility culling pipeline for instanced scenes.
//!
//! This module implements:
//! * **Distance culling** – reject instances past a configurable range.
//! * **Frustum culling** – sphere-vs-plane rejection against the current [`Frustum`].
//! * **Small-object culling** – reject instances below a screen-size threshold.
//! * **Per-stage statistics** and a stable, input-ordered visible list.
//!
//! Stages run in a fixed order (distance, frustum, small-object) and an
//! instance stops at its first rejection. The stage sequence is a data table
//! of `(enabled, reason, test)` entries, so a new stage slots in without
//! touching the per-instance loop.

use std::collections::HashMap;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::bounds::{InstanceBounds, InstanceId};
use crate::error::Result;
use crate::frustum::Frustum;
use crate::snapshot::GnInput;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Enable switches and thresholds for each culling stage.
///
/// Immutable per pass; swap a new one in between passes via
/// [`CullingManager::set_config`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Test bounding spheres against the current frustum.
    pub enable_frustum_culling: bool,
    /// Reject instances farther than [`max_distance`](Self::max_distance).
    pub enable_distance_culling: bool,
    /// Reject instances smaller on screen than
    /// [`min_screen_size`](Self::min_screen_size).
    pub enable_small_object_culling: bool,
    /// Accepted and carried through snapshots, but a no-op: backface
    /// rejection needs per-face normals the bounding proxies do not carry.
    pub enable_backface_culling: bool,
    /// Distance-culling threshold in scene units. Instances at exactly this
    /// distance survive; only `distance > max_distance` rejects.
    pub max_distance: f32,
    /// Small-object threshold as a viewport fraction. Instances at exactly
    /// this size survive; only `screen_size < min_screen_size` rejects.
    pub min_screen_size: f32,
    /// Reserved for a future screen-coverage stage; unused by the pipeline.
    pub small_object_threshold: f32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            enable_frustum_culling: true,
            enable_distance_culling: true,
            enable_small_object_culling: true,
            enable_backface_culling: false,
            max_distance: 1000.0,
            min_screen_size: 0.01,
            small_object_threshold: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// The stage that rejected an instance. Serializes to the wire strings
/// `"distance"`, `"frustum"`, `"small_object"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullReason {
    Distance,
    Frustum,
    SmallObject,
}

impl CullReason {
    /// The wire string for this reason.
    pub const fn as_str(self) -> &'static str {
        match self {
            CullReason::Distance => "distance",
            CullReason::Frustum => "frustum",
            CullReason::SmallObject => "small_object",
        }
    }
}

impl fmt::Display for CullReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate counters for one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CullingStats {
    /// Number of instances submitted.
    pub total: usize,
    /// Instances rejected by the frustum stage.
    pub frustum_culled: usize,
    /// Instances rejected by the distance stage.
    pub distance_culled: usize,
    /// Instances rejected by the small-object stage.
    pub small_object_culled: usize,
}

impl CullingStats {
    /// Total rejected count across all stages.
    pub fn culled(&self) -> usize {
        self.frustum_culled + self.distance_culled + self.small_object_culled
    }

    fn record(&mut self, reason: CullReason) {
        match reason {
            CullReason::Distance => self.distance_culled += 1,
            CullReason::Frustum => self.frustum_culled += 1,
            CullReason::SmallObject => self.small_object_culled += 1,
        }
    }
}

/// Outcome of one batch: visible ids in input order, rejected ids with the
/// first stage that rejected them, and aggregate counters.
///
/// Invariant: `visible.len() + culled.len() == stats.total`, and every
/// culled id maps to exactly one reason.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CullingResult {
    /// Ids that passed every enabled stage, in input iteration order.
    pub visible: Vec<InstanceId>,
    /// Rejected ids mapped to the first stage that rejected them.
    pub culled: HashMap<InstanceId, CullReason>,
    /// Per-stage counters.
    pub stats: CullingStats,
}

// ---------------------------------------------------------------------------
// Stage table
// ---------------------------------------------------------------------------

/// One pipeline entry: `test` returns `true` when the instance is rejected.
struct CullStage<'a> {
    enabled: bool,
    reason: CullReason,
    test: Box<dyn Fn(&InstanceBounds) -> bool + Sync + 'a>,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Orchestrates the culling pipeline.
///
/// Holds the current [`CullingConfig`], an optional [`Frustum`] and the
/// camera position. State is explicit and owned by the manager; there is no
/// global or static mutable state. Mutation is not thread-safe: during a batch the
/// state must be treated as read-only (which [`cull_instances`](Self::cull_instances)
/// guarantees by taking `&self`).
#[derive(Clone, Debug)]
pub struct CullingManager {
    pub(crate) config: CullingConfig,
    pub(crate) frustum: Option<Frustum>,
    pub(crate) camera_position: Vec3,
}

impl CullingManager {
    /// Creates a manager with no frustum and the camera at the origin.
    ///
    /// With frustum culling enabled but no frustum set, the frustum stage
    /// no-ops, so the manager can be built incrementally.
    pub fn new(config: CullingConfig) -> Self {
        Self {
            config,
            frustum: None,
            camera_position: Vec3::ZERO,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    /// Swaps in a new configuration for subsequent passes.
    pub fn set_config(&mut self, config: CullingConfig) {
        self.config = config;
    }

    /// Current frustum, if one has been set.
    pub fn frustum(&self) -> Option<&Frustum> {
        self.frustum.as_ref()
    }

    /// Replaces the current frustum.
    pub fn set_frustum(&mut self, frustum: Frustum) {
        self.frustum = Some(frustum);
    }

    /// Drops the current frustum; the frustum stage no-ops until a new one
    /// is set.
    pub fn clear_frustum(&mut self) {
        self.frustum = None;
    }

    /// Current camera position.
    pub fn camera_position(&self) -> Vec3 {
        self.camera_position
    }

    /// Moves the camera without rebuilding the frustum.
    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera_position = position;
    }

    /// Rebuilds the frustum from camera parameters and updates the camera
    /// position in one step. See [`Frustum::from_camera`] for preconditions.
    #[allow(clippy::too_many_arguments)]
    pub fn set_frustum_from_camera(
        &mut self,
        position: Vec3,
        forward: Vec3,
        up: Vec3,
        right: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Result<()> {
        let frustum = Frustum::from_camera(
            position,
            forward,
            up,
            right,
            fov_y_degrees,
            aspect,
            near,
            far,
        )?;
        self.frustum = Some(frustum);
        self.camera_position = position;
        Ok(())
    }

    /// The fixed stage sequence: distance, then frustum, then small-object.
    fn stages(&self) -> [CullStage<'_>; 3] {
        let camera = self.camera_position;
        let max_distance = self.config.max_distance;
        let min_screen_size = self.config.min_screen_size;
        let frustum = self.frustum.as_ref();

        [
            CullStage {
                enabled: self.config.enable_distance_culling,
                reason: CullReason::Distance,
                test: Box::new(move |inst| camera.distance(inst.position) > max_distance),
            },
            CullStage {
                // Config enables the stage, but absent data makes it a no-op.
                enabled: self.config.enable_frustum_culling && frustum.is_some(),
                reason: CullReason::Frustum,
                test: Box::new(move |inst| {
                    frustum.is_some_and(|f| !f.contains_sphere(inst.position, inst.radius))
                }),
            },
            CullStage {
                enabled: self.config.enable_small_object_culling,
                reason: CullReason::SmallObject,
                test: Box::new(move |inst| inst.screen_size < min_screen_size),
            },
        ]
    }

    fn first_rejection(stages: &[CullStage<'_>], instance: &InstanceBounds) -> Option<CullReason> {
        stages
            .iter()
            .find(|stage| stage.enabled && (stage.test)(instance))
            .map(|stage| stage.reason)
    }

    /// Runs the pipeline over a batch.
    ///
    /// Every instance is validated up front; one malformed record fails the
    /// whole call rather than producing a wrong-but-plausible result. The
    /// returned `visible` list preserves input order.
    pub fn cull_instances(&self, instances: &[InstanceBounds]) -> Result<CullingResult> {
        for instance in instances {
            instance.validate()?;
        }

        let stages = self.stages();
        let mut result = CullingResult {
            visible: Vec::with_capacity(instances.len()),
            culled: HashMap::new(),
            stats: CullingStats {
                total: instances.len(),
                ..CullingStats::default()
            },
        };

        for instance in instances {
            match Self::first_rejection(&stages, instance) {
                Some(reason) => {
                    result.culled.insert(instance.id, reason);
                    result.stats.record(reason);
                }
                None => result.visible.push(instance.id),
            }
        }

        log::debug!(
            "culled batch: {} visible, {} rejected of {}",
            result.visible.len(),
            result.culled.len(),
            result.stats.total
        );
        Ok(result)
    }

    /// Data-parallel variant of [`cull_instances`](Self::cull_instances).
    ///
    /// Manager state is read-only for the duration of the batch; per-shard
    /// decisions are recombined in input order and counters are merged after
    /// the parallel section, so the result is identical to the serial path.
    #[cfg(feature = "parallel")]
    pub fn cull_instances_par(&self, instances: &[InstanceBounds]) -> Result<CullingResult> {
        use rayon::prelude::*;

        for instance in instances {
            instance.validate()?;
        }

        let stages = self.stages();
        let decisions: Vec<Option<CullReason>> = instances
            .par_iter()
            .map(|instance| Self::first_rejection(&stages, instance))
            .collect();

        let mut result = CullingResult {
            visible: Vec::with_capacity(instances.len()),
            culled: HashMap::new(),
            stats: CullingStats {
                total: instances.len(),
                ..CullingStats::default()
            },
        };
        for (instance, decision) in instances.iter().zip(decisions) {
            match decision {
                Some(reason) => {
                    result.culled.insert(instance.id, reason);
                    result.stats.record(reason);
                }
                None => result.visible.push(instance.id),
            }
        }
        Ok(result)
    }

    /// Estimates the viewport fraction an instance's bounding sphere
    /// subtends, in the same units as
    /// [`min_screen_size`](CullingConfig::min_screen_size).
    ///
    /// An instance at the camera position returns `1.0` (fills the screen).
    /// The estimate grows with radius and shrinks with distance. The pixel
    /// height cancels in the fraction; it is kept so callers thinking in
    /// pixels can compute `fraction * screen_height_px` without re-deriving
    /// the angular math.
    pub fn estimate_screen_size(
        &self,
        instance: &InstanceBounds,
        fov_y_degrees: f32,
        screen_height_px: f32,
    ) -> f32 {
        let distance = self.camera_position.distance(instance.position);
        if distance == 0.0 {
            return 1.0;
        }
        let angular_deg = (2.0 * (instance.radius / distance).atan()).to_degrees();
        let size_px = angular_deg / fov_y_degrees * screen_height_px;
        size_px / screen_height_px
    }

    /// Captures a versioned snapshot of manager state for hand-off to an
    /// external consumer. See [`GnInput`].
    pub fn to_gn_input(&self) -> GnInput {
        GnInput::capture(self)
    }

    /// Reconstructs a manager from a snapshot. Inverse of
    /// [`to_gn_input`](Self::to_gn_input) up to float formatting.
    pub fn from_gn_input(input: &GnInput) -> Self {
        input.restore()
    }
}
