//! ResField linear layer: y = x (W + dW_t)^T + b.
//!
//! W is the static base weight; dW_t is frame t's row of the low-rank
//! weight table. Whether the temporal path exists is decided once at
//! construction and stored as a [`ForwardPath`].

use std::fmt;

use crate::affine::{affine_shared, apply};
use crate::config::{LayerConfig, TemporalMode};
use crate::delta::{compute_weight_table, WeightTable};
use crate::error::{ResFieldError, ResFieldResult};
use crate::params::ResFieldParams;
use crate::temporal::{SelectedWeights, TemporalIndexer, TimeQuery};
use crate::tensor::{shape_numel, Tensor};

/// Forward strategy chosen at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ForwardPath {
    /// rank == 0 or capacity == 0: plain affine, time ignored.
    Plain,
    Temporal(TemporalIndexer),
}

impl ForwardPath {
    pub fn from_config(cfg: &LayerConfig) -> Self {
        if cfg.temporal_active() {
            ForwardPath::Temporal(TemporalIndexer::from_config(cfg))
        } else {
            ForwardPath::Plain
        }
    }
}

/// Time-conditioned linear layer with a low-rank per-frame weight residual.
///
/// `forward` takes `&self` and never mutates, so one layer can serve
/// concurrent callers. Trainers mutate through [`ResFieldLinear::params_mut`].
#[derive(Clone, Debug)]
pub struct ResFieldLinear {
    config: LayerConfig,
    params: ResFieldParams,
    path: ForwardPath,
}

impl ResFieldLinear {
    /// Build with seeded random parameters.
    pub fn new(config: LayerConfig, seed: u64) -> ResFieldResult<Self> {
        config.validate()?;
        let params = ResFieldParams::init(&config, seed);
        Self::from_params(config, params)
    }

    /// Build around explicit parameters; buffer lengths must match `config`.
    pub fn from_params(config: LayerConfig, params: ResFieldParams) -> ResFieldResult<Self> {
        config.validate()?;
        params.validate(&config)?;
        let path = ForwardPath::from_config(&config);
        tracing::debug!(config = %Describe(&config), ?path, "built resfield linear");
        Ok(ResFieldLinear { config, params, path })
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn params(&self) -> &ResFieldParams {
        &self.params
    }

    /// Mutable parameters for an external optimizer. Buffer lengths must be
    /// preserved; `forward` rejects a resized buffer with `Configuration`.
    pub fn params_mut(&mut self) -> &mut ResFieldParams {
        &mut self.params
    }

    pub fn path(&self) -> ForwardPath {
        self.path
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self.path, ForwardPath::Temporal(_))
    }

    pub fn num_params(&self) -> usize {
        self.params.num_params()
    }

    /// Full per-frame weight table, `None` on the plain path.
    pub fn weight_table(&self) -> Option<WeightTable> {
        match self.path {
            ForwardPath::Plain => None,
            ForwardPath::Temporal(_) => Some(self.build_table()),
        }
    }

    /// Weights the query selects: [N, out_features, in_features].
    ///
    /// On the plain path this is the base weight, shared, whatever the query.
    pub fn delta_weight(&self, query: TimeQuery<'_>) -> ResFieldResult<SelectedWeights> {
        self.params.validate(&self.config)?;
        match self.path {
            ForwardPath::Plain => Ok(SelectedWeights::shared(
                &self.params.base_weight,
                self.config.out_features,
                self.config.in_features,
            )),
            ForwardPath::Temporal(indexer) => indexer.select(&self.build_table(), &query),
        }
    }

    /// Apply the layer to `input` of shape (B, S, in_features).
    #[tracing::instrument(level = "trace", skip_all, fields(shape = ?input.shape))]
    pub fn forward(&self, input: &Tensor, query: TimeQuery<'_>) -> ResFieldResult<Tensor> {
        let (batch, positions) = self.check_input(input)?;
        self.params.validate(&self.config)?;
        let out_shape = [batch, positions, self.config.out_features];

        let data = match self.path {
            ForwardPath::Plain => affine_shared(
                &input.data,
                &self.params.base_weight,
                &self.params.bias,
                batch * positions,
                self.config.in_features,
                self.config.out_features,
            ),
            ForwardPath::Temporal(indexer) => {
                let n = indexer.query_len(&query)?;
                if n != 1 && n != batch {
                    let argument = match indexer.mode() {
                        TemporalMode::Lookup => "frame_id",
                        TemporalMode::Interpolation => "time_value",
                    };
                    return Err(ResFieldError::shape(format!(
                        "{argument} has {n} entries for batch of {batch}"
                    )));
                }
                let selected = indexer.select(&self.build_table(), &query)?;
                apply(&input.data, &selected, &self.params.bias, batch, positions)?
            }
        };
        Tensor::from_vec(data, &out_shape)
    }

    /// Configuration summary for diagnostics.
    pub fn describe(&self) -> String {
        Describe(&self.config).to_string()
    }

    fn build_table(&self) -> WeightTable {
        compute_weight_table(
            &self.params.factor_u,
            &self.params.factor_v,
            &self.params.base_weight,
            self.config.capacity,
            self.config.rank,
            self.config.out_features,
            self.config.in_features,
        )
    }

    fn check_input(&self, input: &Tensor) -> ResFieldResult<(usize, usize)> {
        let [batch, positions, features] = input.shape[..] else {
            return Err(ResFieldError::shape(format!(
                "input must be (B, S, in_features), got shape {:?}",
                input.shape
            )));
        };
        if features != self.config.in_features {
            return Err(ResFieldError::shape(format!(
                "input has {features} features, layer expects {}",
                self.config.in_features
            )));
        }
        let n = shape_numel(&input.shape)?;
        if input.data.len() != n {
            return Err(ResFieldError::shape(format!(
                "input shape {:?} needs {n} elements, got {}",
                input.shape,
                input.data.len()
            )));
        }
        // out_features may exceed in_features
        shape_numel(&[batch, positions, self.config.out_features])?;
        Ok((batch, positions))
    }
}

impl fmt::Display for ResFieldLinear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResFieldLinear({})", Describe(&self.config))
    }
}

struct Describe<'a>(&'a LayerConfig);

impl fmt::Display for Describe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.0;
        write!(
            f,
            "in_features={}, out_features={}, bias={}, rank={}, capacity={}, mode={}",
            c.in_features, c.out_features, c.has_bias, c.rank, c.capacity, c.mode
        )
    }
}
