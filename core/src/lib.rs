//! ResField linear layer: an affine map whose weight is a static base matrix
//! plus a per-frame correction decoded from a low-rank factorization.
//!
//! Pipeline per forward call:
//!   params → weight table [capacity, out, in] (delta)
//!          → selected weights [N, out, in]   (temporal)
//!          → output (B, S, out)              (affine)

pub mod error;
pub mod tensor;
pub mod config;
pub mod params;
pub mod delta;
pub mod temporal;
pub mod affine;
pub mod layer;

pub use config::{FramePolicy, LayerConfig, TemporalMode};
pub use error::{ResFieldError, ResFieldResult};
pub use layer::{ForwardPath, ResFieldLinear};
pub use params::ResFieldParams;
pub use temporal::TimeQuery;
pub use tensor::Tensor;
