//! Error taxonomy for layer construction and forward evaluation.
//!
//! Every failure is detected synchronously and returned to the caller.
//! Forward evaluation is deterministic, so nothing here is retryable.

use crate::config::TemporalMode;

/// Convenience result type used across the crate.
pub type ResFieldResult<T> = Result<T, ResFieldError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResFieldError {
    /// Invalid construction parameters: unknown mode, zero feature size,
    /// or parameter buffers that disagree with the config.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Temporal path is active but the time argument for `mode` was not supplied.
    #[error("missing input: mode={mode} requires `{argument}`")]
    MissingInput {
        argument: &'static str,
        mode: TemporalMode,
    },

    /// Frame id outside `[0, capacity - 1]` under the strict frame policy.
    #[error("frame_id {frame_id} out of range for capacity {capacity}")]
    IndexRange { frame_id: i64, capacity: usize },

    /// Input or time query shape disagrees with the layer or the batch.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

impl ResFieldError {
    /// Build a [`ResFieldError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`ResFieldError::ShapeMismatch`] value.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}
