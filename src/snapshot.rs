// src/snapshot.rs
//! Versioned hand-off record for external consumers.
//!
//! The culling engine's only "wire format": a snapshot of manager state
//! (config, frustum planes, camera position) that a downstream
//! procedural-geometry or renderer layer can ingest. Forward-compatible:
//! unknown keys are ignored on decode, so old consumers survive new
//! optional fields.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::culling::{CullingConfig, CullingManager};
use crate::error::Result;
use crate::frustum::{Frustum, Plane};

/// Current snapshot schema version.
pub const GN_INPUT_VERSION: &str = "1.0";

/// Frustum planes as plain `[nx, ny, nz, d]` rows, near/far/top/bottom/
/// left/right order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrustumPlanes {
    pub planes: [[f32; 4]; 6],
}

/// Snapshot of [`CullingManager`] state.
///
/// Round-trips: decoding and re-encoding an unchanged snapshot yields a
/// field-for-field equal record (float formatting aside).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GnInput {
    /// Schema version, currently `"1.0"`.
    pub version: String,
    /// Stage switches and thresholds.
    pub config: CullingConfig,
    /// Frustum planes, or `null` when no frustum is set.
    pub frustum: Option<FrustumPlanes>,
    /// Camera world position.
    pub camera_position: [f32; 3],
}

impl GnInput {
    pub(crate) fn capture(manager: &CullingManager) -> Self {
        Self {
            version: GN_INPUT_VERSION.to_string(),
            config: manager.config.clone(),
            frustum: manager.frustum.map(|f| FrustumPlanes {
                planes: f.as_arrays(),
            }),
            camera_position: manager.camera_position.to_array(),
        }
    }

    pub(crate) fn restore(&self) -> CullingManager {
        if self.version != GN_INPUT_VERSION {
            log::warn!(
                "snapshot version {:?} differs from {:?}, restoring best-effort",
                self.version,
                GN_INPUT_VERSION
            );
        }
        let mut manager = CullingManager::new(self.config.clone());
        manager.camera_position = Vec3::from_array(self.camera_position);
        manager.frustum = self.frustum.as_ref().map(|f| {
            Frustum::from_planes(std::array::from_fn(|i| {
                let [nx, ny, nz, d] = f.planes[i];
                Plane::new(Vec3::new(nx, ny, nz), d)
            }))
        });
        manager
    }

    /// Encodes the snapshot as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a snapshot from JSON, ignoring unknown keys.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::CullingConfig;

    fn manager() -> CullingManager {
        let mut manager = CullingManager::new(CullingConfig {
            max_distance: 250.0,
            ..CullingConfig::default()
        });
        manager
            .set_frustum_from_camera(
                Vec3::new(1.0, 2.0, 3.0),
                Vec3::NEG_Z,
                Vec3::Y,
                Vec3::X,
                70.0,
                16.0 / 9.0,
                0.5,
                400.0,
            )
            .unwrap();
        manager
    }

    #[test]
    fn json_round_trip_is_field_for_field_equal() {
        let snapshot = manager().to_gn_input();
        let json = snapshot.to_json().unwrap();
        let decoded = GnInput::from_json(&json).unwrap();
        assert_eq!(snapshot, decoded);
        // Re-encoding the decoded record changes nothing.
        assert_eq!(json, decoded.to_json().unwrap());
    }

    #[test]
    fn restore_reproduces_manager_state() {
        let original = manager();
        let restored = CullingManager::from_gn_input(&original.to_gn_input());
        assert_eq!(restored.to_gn_input(), original.to_gn_input());
        assert_eq!(restored.camera_position(), original.camera_position());
        assert_eq!(restored.frustum(), original.frustum());
    }

    #[test]
    fn missing_frustum_encodes_as_null() {
        let manager = CullingManager::new(CullingConfig::default());
        let json = manager.to_gn_input().to_json().unwrap();
        assert!(json.contains("\"frustum\":null"));
        assert!(json.contains("\"version\":\"1.0\""));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let json = manager().to_gn_input().to_json().unwrap();
        let extended = json.replacen('{', "{\"future_field\":42,", 1);
        let decoded = GnInput::from_json(&extended).unwrap();
        assert_eq!(decoded.version, GN_INPUT_VERSION);
    }

    #[test]
    fn snapshot_decode_error_surfaces() {
        assert!(GnInput::from_json("not json").is_err());
    }
}
