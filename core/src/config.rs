//! Layer configuration, immutable after construction.
//!
//! The temporal path (low-rank per-frame residual) is active iff
//! `rank > 0 && capacity > 0`. Otherwise the layer is a plain affine map
//! and every time argument is ignored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ResFieldError, ResFieldResult};

/// How a time query indexes the weight table.
///
/// - Lookup: integer frame id selects a row directly.
/// - Interpolation: normalized time in [-1, 1], nearest sample, border hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalMode {
    #[default]
    Lookup,
    Interpolation,
}

impl TemporalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TemporalMode::Lookup => "lookup",
            TemporalMode::Interpolation => "interpolation",
        }
    }
}

impl fmt::Display for TemporalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemporalMode {
    type Err = ResFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lookup" => Ok(TemporalMode::Lookup),
            "interpolation" => Ok(TemporalMode::Interpolation),
            other => Err(ResFieldError::configuration(format!(
                "unknown mode `{other}` (expected `lookup` or `interpolation`)"
            ))),
        }
    }
}

/// What Lookup does with a frame id outside `[0, capacity - 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePolicy {
    /// Return `IndexRange`.
    #[default]
    Strict,
    /// Hold at the first/last frame, same as interpolation's border policy.
    Clamp,
}

fn default_true() -> bool {
    true
}

/// Construction parameters for [`crate::layer::ResFieldLinear`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub in_features: usize,
    pub out_features: usize,
    #[serde(default = "default_true")]
    pub has_bias: bool,
    /// Dimensionality of the per-frame low-rank code.
    #[serde(default)]
    pub rank: usize,
    /// Number of discrete time steps with a learned correction.
    #[serde(default)]
    pub capacity: usize,
    #[serde(default)]
    pub mode: TemporalMode,
    #[serde(default)]
    pub frame_policy: FramePolicy,
}

impl LayerConfig {
    /// Plain affine layer with bias; chain the `with_*` methods for the rest.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        LayerConfig {
            in_features,
            out_features,
            has_bias: true,
            rank: 0,
            capacity: 0,
            mode: TemporalMode::Lookup,
            frame_policy: FramePolicy::Strict,
        }
    }

    pub fn with_bias(mut self, has_bias: bool) -> Self {
        self.has_bias = has_bias;
        self
    }

    pub fn with_temporal(mut self, rank: usize, capacity: usize) -> Self {
        self.rank = rank;
        self.capacity = capacity;
        self
    }

    pub fn with_mode(mut self, mode: TemporalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_frame_policy(mut self, frame_policy: FramePolicy) -> Self {
        self.frame_policy = frame_policy;
        self
    }

    /// Test configuration: tiny layer with an active temporal path.
    pub fn test_config() -> Self {
        LayerConfig::new(8, 6).with_temporal(2, 5)
    }

    pub fn temporal_active(&self) -> bool {
        self.rank > 0 && self.capacity > 0
    }

    /// Elements in one `[out_features, in_features]` weight matrix.
    pub fn weight_numel(&self) -> usize {
        self.out_features * self.in_features
    }

    pub fn validate(&self) -> ResFieldResult<()> {
        if self.in_features == 0 {
            return Err(ResFieldError::configuration("in_features must be > 0"));
        }
        if self.out_features == 0 {
            return Err(ResFieldError::configuration("out_features must be > 0"));
        }
        Ok(())
    }

    /// Parse and validate a JSON config. Unknown modes surface as `Configuration`.
    pub fn from_json(json: &str) -> ResFieldResult<Self> {
        let cfg: LayerConfig = serde_json::from_str(json)
            .map_err(|e| ResFieldError::configuration(format!("invalid layer config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> ResFieldResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ResFieldError::configuration(format!("cannot serialize layer config: {e}")))
    }
}
