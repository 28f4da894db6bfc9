//! Weight-table reconstruction from the low-rank factors.
//!
//!   table[c] = base_weight + reshape(factor_u[c] @ factor_v, [out, in])
//!
//! Recomputed on every forward call; parameters may change between calls.

use crate::tensor::{add_assign_f32, matmul_f32};

/// Expanded per-frame weights: [capacity, out_features, in_features].
#[derive(Clone, Debug, PartialEq)]
pub struct WeightTable {
    pub data: Vec<f32>,
    pub capacity: usize,
    pub out_features: usize,
    pub in_features: usize,
}

impl WeightTable {
    /// Elements in one frame's weight matrix.
    pub fn matrix_len(&self) -> usize {
        self.out_features * self.in_features
    }

    /// Weight matrix for frame `k`, row-major `[out, in]`.
    ///
    /// # Panics
    ///
    /// If `k >= capacity`.
    pub fn frame(&self, k: usize) -> &[f32] {
        let n = self.matrix_len();
        &self.data[k * n..(k + 1) * n]
    }
}

/// Build the weight table.
///
/// `factor_u`: [capacity, rank]
/// `factor_v`: [rank, out_features * in_features]
/// `base_weight`: [out_features, in_features], broadcast across every frame
pub fn compute_weight_table(
    factor_u: &[f32],
    factor_v: &[f32],
    base_weight: &[f32],
    capacity: usize,
    rank: usize,
    out_features: usize,
    in_features: usize,
) -> WeightTable {
    let n = out_features * in_features;
    debug_assert_eq!(factor_u.len(), capacity * rank);
    debug_assert_eq!(factor_v.len(), rank * n);
    debug_assert_eq!(base_weight.len(), n);

    let mut data = vec![0.0f32; capacity * n];
    matmul_f32(factor_u, factor_v, &mut data, capacity, rank, n);
    for row in data.chunks_exact_mut(n.max(1)) {
        add_assign_f32(row, base_weight);
    }

    WeightTable { data, capacity, out_features, in_features }
}
