//! Learnable parameters of one ResField linear layer.
//!
//! All buffers are flat Vec<f32> in row-major layout:
//!   base_weight: [out_features, in_features]
//!   bias:        [out_features]          (empty when the layer has no bias)
//!   factor_u:    [capacity, rank]        (empty when the temporal path is off)
//!   factor_v:    [rank, out_features * in_features]  (same)
//!
//! The layer only reads these. An external trainer owns every mutation.

use crate::config::LayerConfig;
use crate::error::{ResFieldError, ResFieldResult};
use crate::tensor::SimpleRng;

/// Std-dev of the low-rank factor init.
pub const FACTOR_INIT_STD: f32 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct ResFieldParams {
    pub base_weight: Vec<f32>,
    pub bias: Vec<f32>,
    /// Per-frame low-rank codes ("weights_t").
    pub factor_u: Vec<f32>,
    /// Shared basis from code to flattened weight delta ("matrix_t").
    pub factor_v: Vec<f32>,
}

impl ResFieldParams {
    /// Seeded init. Base weight and bias are uniform in ±1/sqrt(in_features),
    /// the usual linear-layer convention; factors are N(0, 0.01^2).
    pub fn init(cfg: &LayerConfig, seed: u64) -> Self {
        let mut rng = SimpleRng::new(seed);
        let bound = 1.0 / (cfg.in_features.max(1) as f32).sqrt();

        let mut base_weight = vec![0.0f32; cfg.weight_numel()];
        rng.fill_uniform(&mut base_weight, bound);

        let mut bias = vec![0.0f32; if cfg.has_bias { cfg.out_features } else { 0 }];
        rng.fill_uniform(&mut bias, bound);

        let (u_len, v_len) = factor_lens(cfg);
        let mut factor_u = vec![0.0f32; u_len];
        rng.fill_normal(&mut factor_u, FACTOR_INIT_STD);
        let mut factor_v = vec![0.0f32; v_len];
        rng.fill_normal(&mut factor_v, FACTOR_INIT_STD);

        ResFieldParams { base_weight, bias, factor_u, factor_v }
    }

    /// All-zero buffers sized for `cfg`.
    pub fn zeros(cfg: &LayerConfig) -> Self {
        let (u_len, v_len) = factor_lens(cfg);
        ResFieldParams {
            base_weight: vec![0.0f32; cfg.weight_numel()],
            bias: vec![0.0f32; if cfg.has_bias { cfg.out_features } else { 0 }],
            factor_u: vec![0.0f32; u_len],
            factor_v: vec![0.0f32; v_len],
        }
    }

    pub fn has_bias(&self) -> bool {
        !self.bias.is_empty()
    }

    /// Total number of parameters.
    pub fn num_params(&self) -> usize {
        self.base_weight.len() + self.bias.len() + self.factor_u.len() + self.factor_v.len()
    }

    /// Check every buffer length against `cfg`.
    pub fn validate(&self, cfg: &LayerConfig) -> ResFieldResult<()> {
        let (u_len, v_len) = factor_lens(cfg);
        let bias_len = if cfg.has_bias { cfg.out_features } else { 0 };
        check_len("base_weight", self.base_weight.len(), cfg.weight_numel())?;
        check_len("bias", self.bias.len(), bias_len)?;
        check_len("factor_u", self.factor_u.len(), u_len)?;
        check_len("factor_v", self.factor_v.len(), v_len)?;
        Ok(())
    }
}

/// (factor_u, factor_v) element counts; both zero when the temporal path is off.
fn factor_lens(cfg: &LayerConfig) -> (usize, usize) {
    if cfg.temporal_active() {
        (cfg.capacity * cfg.rank, cfg.rank * cfg.weight_numel())
    } else {
        (0, 0)
    }
}

fn check_len(name: &str, got: usize, expected: usize) -> ResFieldResult<()> {
    if got != expected {
        return Err(ResFieldError::configuration(format!(
            "{name} has {got} elements, expected {expected}"
        )));
    }
    Ok(())
}
