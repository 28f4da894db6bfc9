//! Apply selected weights to a (B, S, in_features) batch.
//!
//! Two regimes:
//!   shared: one [out, in] matrix for the whole batch, y = x @ W^T + b
//!   bank:   B matrices, element b uses W_b; batch elements run in parallel
//!
//! Output is (B, S, out_features) in both cases.

use rayon::prelude::*;

use crate::error::{ResFieldError, ResFieldResult};
use crate::temporal::SelectedWeights;
use crate::tensor::{add_row_bias_f32, checked_numel, matmul_transb_f32, shape_numel};

/// Shared-weight affine map over `rows` input rows.
///
/// `input`: [rows, in_features]
/// `weight`: [out_features, in_features]
/// `bias`: [out_features] or empty
pub fn affine_shared(
    input: &[f32],
    weight: &[f32],
    bias: &[f32],
    rows: usize,
    in_features: usize,
    out_features: usize,
) -> Vec<f32> {
    let mut out = vec![0.0f32; rows * out_features];
    matmul_transb_f32(input, weight, &mut out, rows, in_features, out_features);
    add_row_bias_f32(&mut out, bias);
    out
}

/// Per-element weight bank.
///
/// `input`: [batch, positions, in_features]
/// `weights`: [batch, out_features, in_features]
/// `bias`: [out_features] or empty
pub fn affine_bank(
    input: &[f32],
    weights: &[f32],
    bias: &[f32],
    batch: usize,
    positions: usize,
    in_features: usize,
    out_features: usize,
) -> Vec<f32> {
    debug_assert_eq!(input.len(), batch * positions * in_features);
    debug_assert_eq!(weights.len(), batch * out_features * in_features);

    let mut out = vec![0.0f32; batch * positions * out_features];
    if out.is_empty() {
        return out;
    }
    out.par_chunks_mut(positions * out_features)
        .zip(input.par_chunks(positions * in_features))
        .zip(weights.par_chunks(out_features * in_features))
        .for_each(|((y, x), w)| {
            matmul_transb_f32(x, w, y, positions, in_features, out_features);
            add_row_bias_f32(y, bias);
        });
    out
}

/// Dispatch on the regime implied by `selected.count`.
///
/// `count == 1` is shared; `count == batch` is a bank; anything else is a
/// shape mismatch.
pub fn apply(
    input: &[f32],
    selected: &SelectedWeights,
    bias: &[f32],
    batch: usize,
    positions: usize,
) -> ResFieldResult<Vec<f32>> {
    let (in_f, out_f) = (selected.in_features, selected.out_features);
    if checked_numel(&[batch, positions, in_f]) != Some(input.len()) {
        return Err(ResFieldError::shape(format!(
            "input has {} elements, expected {batch}x{positions}x{in_f}",
            input.len()
        )));
    }
    if !bias.is_empty() && bias.len() != out_f {
        return Err(ResFieldError::shape(format!(
            "bias has {} elements, expected {out_f}",
            bias.len()
        )));
    }
    shape_numel(&[batch, positions, out_f])?;

    if selected.is_shared() {
        tracing::trace!(batch, positions, "shared weight");
        Ok(affine_shared(input, &selected.data, bias, batch * positions, in_f, out_f))
    } else if selected.count == batch {
        tracing::trace!(batch, positions, "per-element weight bank");
        Ok(affine_bank(input, &selected.data, bias, batch, positions, in_f, out_f))
    } else {
        Err(ResFieldError::shape(format!(
            "{} selected weights for batch of {batch}",
            selected.count
        )))
    }
}
