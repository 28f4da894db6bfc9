//! Time query → weight selection.
//!
//! Two strategies, fixed at construction:
//!   Lookup:        selected[n] = table[frame_id[n]]
//!   Interpolation: nearest-neighbour resample of the capacity axis at
//!                  normalized time t in [-1, 1], corner-aligned grid,
//!                  border hold outside the domain.
//!
//! Grid: t = -1 sits on frame 0, t = 1 on frame capacity-1, and frame k on
//! t_k = 2k / (capacity - 1) - 1. A query exactly halfway between two frames
//! resolves to the lower one.

use crate::config::{FramePolicy, LayerConfig, TemporalMode};
use crate::delta::WeightTable;
use crate::error::{ResFieldError, ResFieldResult};

/// Time arguments for one forward call.
///
/// Each slice has length 1 (shared by the whole batch) or B (one per
/// batch element). Only the field matching the layer's mode is read.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeQuery<'a> {
    pub time_value: Option<&'a [f32]>,
    pub frame_id: Option<&'a [i64]>,
}

impl<'a> TimeQuery<'a> {
    pub fn none() -> Self {
        TimeQuery::default()
    }

    pub fn time(time_value: &'a [f32]) -> Self {
        TimeQuery { time_value: Some(time_value), frame_id: None }
    }

    pub fn frame(frame_id: &'a [i64]) -> Self {
        TimeQuery { time_value: None, frame_id: Some(frame_id) }
    }
}

/// Weights picked for a query: [count, out_features, in_features].
///
/// `count == 1` means one matrix shared by every batch element.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedWeights {
    pub data: Vec<f32>,
    pub count: usize,
    pub out_features: usize,
    pub in_features: usize,
}

impl SelectedWeights {
    /// Single shared matrix.
    pub fn shared(weight: &[f32], out_features: usize, in_features: usize) -> Self {
        SelectedWeights { data: weight.to_vec(), count: 1, out_features, in_features }
    }

    pub fn is_shared(&self) -> bool {
        self.count == 1
    }

    /// Matrix `n`, row-major `[out, in]`.
    ///
    /// # Panics
    ///
    /// If `n >= count`.
    pub fn matrix(&self, n: usize) -> &[f32] {
        let len = self.out_features * self.in_features;
        &self.data[n * len..(n + 1) * len]
    }
}

/// Indexing strategy over a [`WeightTable`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TemporalIndexer {
    Lookup { policy: FramePolicy },
    Interpolation,
}

impl TemporalIndexer {
    pub fn from_config(cfg: &LayerConfig) -> Self {
        match cfg.mode {
            TemporalMode::Lookup => TemporalIndexer::Lookup { policy: cfg.frame_policy },
            TemporalMode::Interpolation => TemporalIndexer::Interpolation,
        }
    }

    pub fn mode(&self) -> TemporalMode {
        match self {
            TemporalIndexer::Lookup { .. } => TemporalMode::Lookup,
            TemporalIndexer::Interpolation => TemporalMode::Interpolation,
        }
    }

    /// Length of the time argument this strategy reads, or `MissingInput`.
    pub fn query_len(&self, query: &TimeQuery<'_>) -> ResFieldResult<usize> {
        match self {
            TemporalIndexer::Lookup { .. } => query.frame_id.map(<[i64]>::len).ok_or(
                ResFieldError::MissingInput { argument: "frame_id", mode: TemporalMode::Lookup },
            ),
            TemporalIndexer::Interpolation => query.time_value.map(<[f32]>::len).ok_or(
                ResFieldError::MissingInput { argument: "time_value", mode: TemporalMode::Interpolation },
            ),
        }
    }

    /// Table row for each query entry.
    pub fn resolve(&self, capacity: usize, query: &TimeQuery<'_>) -> ResFieldResult<Vec<usize>> {
        self.query_len(query)?;
        match self {
            TemporalIndexer::Lookup { policy } => query
                .frame_id
                .unwrap_or_default()
                .iter()
                .map(|&id| resolve_frame(id, capacity, *policy))
                .collect(),
            TemporalIndexer::Interpolation => Ok(query
                .time_value
                .unwrap_or_default()
                .iter()
                .map(|&t| nearest_index(t, capacity))
                .collect()),
        }
    }

    /// Gather the selected weights: [N, out_features, in_features].
    pub fn select(&self, table: &WeightTable, query: &TimeQuery<'_>) -> ResFieldResult<SelectedWeights> {
        let rows = self.resolve(table.capacity, query)?;
        let n = table.matrix_len();
        let mut data = Vec::with_capacity(rows.len() * n);
        for &k in &rows {
            data.extend_from_slice(table.frame(k));
        }
        Ok(SelectedWeights {
            data,
            count: rows.len(),
            out_features: table.out_features,
            in_features: table.in_features,
        })
    }
}

/// Normalized time of frame `k` on the corner-aligned grid.
pub fn frame_time(k: usize, capacity: usize) -> f32 {
    if capacity <= 1 {
        return -1.0;
    }
    (2.0 * k as f64 / (capacity - 1) as f64 - 1.0) as f32
}

/// Nearest frame for normalized time `t`, border-clamped.
///
/// Ties go to the lower index. NaN holds at frame 0.
pub fn nearest_index(t: f32, capacity: usize) -> usize {
    if capacity <= 1 {
        return 0;
    }
    let last = (capacity - 1) as f64;
    let pos = ((f64::from(t) + 1.0) * 0.5 * last).clamp(0.0, last);
    if pos.is_nan() {
        return 0;
    }
    // round half down
    let idx = (pos - 0.5).ceil().max(0.0) as usize;
    idx.min(capacity - 1)
}

fn resolve_frame(frame_id: i64, capacity: usize, policy: FramePolicy) -> ResFieldResult<usize> {
    let last = capacity.saturating_sub(1) as i64;
    if (0..=last).contains(&frame_id) && capacity > 0 {
        return Ok(frame_id as usize);
    }
    match policy {
        FramePolicy::Strict => Err(ResFieldError::IndexRange { frame_id, capacity }),
        FramePolicy::Clamp => {
            tracing::warn!(frame_id, capacity, "frame_id out of range, clamping");
            Ok(frame_id.clamp(0, last) as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_3x1x1() -> WeightTable {
        WeightTable { data: vec![10.0, 20.0, 30.0], capacity: 3, out_features: 1, in_features: 1 }
    }

    #[test]
    fn test_nearest_index_grid_points() {
        for cap in [2usize, 3, 5, 17, 100] {
            for k in 0..cap {
                assert_eq!(nearest_index(frame_time(k, cap), cap), k, "cap={cap} k={k}");
            }
        }
    }

    #[test]
    fn test_nearest_index_border_hold() {
        assert_eq!(nearest_index(-1.0, 4), 0);
        assert_eq!(nearest_index(-7.5, 4), 0);
        assert_eq!(nearest_index(f32::NEG_INFINITY, 4), 0);
        assert_eq!(nearest_index(1.0, 4), 3);
        assert_eq!(nearest_index(3.0, 4), 3);
        assert_eq!(nearest_index(f32::INFINITY, 4), 3);
    }

    #[test]
    fn test_nearest_index_tie_goes_low() {
        // capacity 3: frames at -1, 0, 1; -0.5 and 0.5 are exact midpoints
        assert_eq!(nearest_index(-0.5, 3), 0);
        assert_eq!(nearest_index(0.5, 3), 1);
        assert_eq!(nearest_index(0.51, 3), 2);
        assert_eq!(nearest_index(-0.49, 3), 1);
    }

    #[test]
    fn test_nearest_index_single_frame() {
        for t in [-2.0f32, -1.0, 0.0, 0.3, 1.0, 9.0] {
            assert_eq!(nearest_index(t, 1), 0);
        }
    }

    #[test]
    fn test_nearest_index_nan_holds_first() {
        assert_eq!(nearest_index(f32::NAN, 5), 0);
    }

    #[test]
    fn test_lookup_select() {
        let idx = TemporalIndexer::Lookup { policy: FramePolicy::Strict };
        let sel = idx.select(&table_3x1x1(), &TimeQuery::frame(&[2, 0, 1])).unwrap();
        assert_eq!(sel.count, 3);
        assert_eq!(sel.data, vec![30.0, 10.0, 20.0]);
    }

    #[test]
    fn test_lookup_strict_out_of_range() {
        let idx = TemporalIndexer::Lookup { policy: FramePolicy::Strict };
        let err = idx.select(&table_3x1x1(), &TimeQuery::frame(&[3])).unwrap_err();
        assert_eq!(err, ResFieldError::IndexRange { frame_id: 3, capacity: 3 });
        let err = idx.select(&table_3x1x1(), &TimeQuery::frame(&[-1])).unwrap_err();
        assert_eq!(err, ResFieldError::IndexRange { frame_id: -1, capacity: 3 });
    }

    #[test]
    fn test_lookup_clamp_out_of_range() {
        let idx = TemporalIndexer::Lookup { policy: FramePolicy::Clamp };
        let sel = idx.select(&table_3x1x1(), &TimeQuery::frame(&[-4, 99])).unwrap();
        assert_eq!(sel.data, vec![10.0, 30.0]);
    }

    #[test]
    fn test_interpolation_select() {
        let sel = TemporalIndexer::Interpolation
            .select(&table_3x1x1(), &TimeQuery::time(&[0.0, 1.0, -3.0]))
            .unwrap();
        assert_eq!(sel.data, vec![20.0, 30.0, 10.0]);
    }

    #[test]
    fn test_missing_argument_for_mode() {
        let table = table_3x1x1();
        let err = TemporalIndexer::Interpolation.select(&table, &TimeQuery::frame(&[0])).unwrap_err();
        assert!(matches!(err, ResFieldError::MissingInput { argument: "time_value", .. }));
        let err = TemporalIndexer::Lookup { policy: FramePolicy::Strict }
            .select(&table, &TimeQuery::time(&[0.0]))
            .unwrap_err();
        assert!(matches!(err, ResFieldError::MissingInput { argument: "frame_id", .. }));
    }

    #[test]
    fn test_indexer_from_config() {
        let cfg = LayerConfig::test_config().with_mode(TemporalMode::Interpolation);
        assert_eq!(TemporalIndexer::from_config(&cfg), TemporalIndexer::Interpolation);
        assert_eq!(TemporalIndexer::from_config(&cfg).mode(), TemporalMode::Interpolation);
    }
}
