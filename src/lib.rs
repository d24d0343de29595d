// src/lib.rs
//! # viscull: CPU visibility culling for instanced 3D scenes
//!
//! Given a camera pose and a batch of per-object bounding proxies, decide
//! which objects are worth handing to the expensive rendering/instancing
//! path and which can be skipped. Pure geometry and math: no GPU, no I/O,
//! no scene graph. The host application owns the scene; this crate only
//! sees plain data.
//!
//! Pipeline, in fixed order with first-rejection-wins semantics:
//! 1. **Distance** – reject past a configurable range.
//! 2. **Frustum** – bounding-sphere test against six camera planes.
//! 3. **Small object** – reject below a screen-size fraction.
//!
//! An optional [`OcclusionCuller`] prepass can further reject survivors
//! hidden behind registered occluders, using a coarse CPU depth grid.
//!
//! ```
//! use glam::Vec3;
//! use viscull::{CullingConfig, CullingManager, InstanceBounds, InstanceId};
//!
//! # fn main() -> viscull::Result<()> {
//! let mut manager = CullingManager::new(CullingConfig::default());
//! manager.set_frustum_from_camera(
//!     Vec3::ZERO,           // position
//!     Vec3::NEG_Z,          // forward
//!     Vec3::Y,              // up
//!     Vec3::X,              // right
//!     60.0,                 // vertical fov, degrees
//!     16.0 / 9.0,           // aspect
//!     0.1,                  // near
//!     500.0,                // far
//! )?;
//!
//! let batch = [
//!     InstanceBounds::new(InstanceId(1), Vec3::new(0.0, 0.0, -5.0), 1.0).with_screen_size(0.25),
//!     InstanceBounds::new(InstanceId(2), Vec3::new(0.0, 0.0, 5.0), 1.0).with_screen_size(0.25),
//! ];
//! let result = manager.cull_instances(&batch)?;
//! assert_eq!(result.visible, vec![InstanceId(1)]);
//! # Ok(())
//! # }
//! ```
//!
//! All operations are synchronous and CPU-bound. `cull_instances` takes
//! `&self`, so batches can run concurrently as long as nobody mutates the
//! manager mid-batch; with the `parallel` feature the batch itself is
//! sharded across rayon workers.

pub mod bounds;
pub mod culling;
pub mod error;
pub mod frustum;
pub mod occlusion;
pub mod snapshot;

pub use bounds::{InstanceBounds, InstanceId};
pub use culling::{CullReason, CullingConfig, CullingManager, CullingResult, CullingStats};
pub use error::{CullError, Result};
pub use frustum::{Frustum, Plane};
pub use occlusion::OcclusionCuller;
pub use snapshot::{FrustumPlanes, GnInput};
