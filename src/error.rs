// src/error.rs
//! Error handling for the whole crate.
//!
//! - **Performance**: enum discriminant (cheap match), allocations *only* on error paths.
//! - **Placement**: every validation happens at construction time or at batch entry,
//!   never inside the per-plane / per-texel hot loops.
//! - **Extensible**: just add variants. Works with `?`, threads and async executors.

use thiserror::Error;

use crate::bounds::InstanceId;

/// Main error type: lightweight, `Send + Sync + 'static`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CullError {
    /// Malformed camera parameters (non-positive near/far, `near >= far`,
    /// FOV outside `(0, 180)`, non-positive aspect, non-finite inputs).
    #[error("invalid camera parameter `{field}`: {message}")]
    InvalidCamera {
        field: &'static str,
        message: String,
    },

    /// Malformed per-instance bounding data. Fails the whole batch call,
    /// never silently defaults to visible or culled.
    #[error("invalid bounds for instance {id}: {message}")]
    InvalidBounds { id: InstanceId, message: String },

    /// Occlusion depth grid with a zero side length.
    #[error("occlusion resolution must be non-zero, got {0}")]
    InvalidResolution(usize),

    /// Snapshot (de)serialization failure.
    #[error("snapshot codec error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl CullError {
    /// Shorthand for a camera-parameter rejection.
    #[inline]
    pub fn camera<S: Into<String>>(field: &'static str, message: S) -> Self {
        Self::InvalidCamera {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for a bounds rejection.
    #[inline]
    pub fn bounds<S: Into<String>>(id: InstanceId, message: S) -> Self {
        Self::InvalidBounds {
            id,
            message: message.into(),
        }
    }

    // === Kind checks (branch prediction friendly) ===

    #[inline]
    pub fn is_invalid_camera(&self) -> bool {
        matches!(self, CullError::InvalidCamera { .. })
    }

    #[inline]
    pub fn is_invalid_bounds(&self) -> bool {
        matches!(self, CullError::InvalidBounds { .. })
    }
}

/// Convenient `Result` alias, use `viscull::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, CullError>;
