//! Nearest-rank percentile reduction.
//!
//! Each feature column is sorted independently and the value at the 1-based
//! rank `clamp(ceil(n * p / 100), 1, n)` is selected. No interpolation: every
//! output is an element of the input column, so historical tables can be
//! reproduced exactly.

use crate::error::{Result, ValidationError};
use crate::matrix::{PercentileMatrix, ResidualMatrix};

/// 1-sigma, 2-sigma and 3-sigma equivalent coverage.
pub const DEFAULT_PERCENTILES: [f64; 3] = [68.0, 95.0, 99.7];

/// Fewer rows than this and percentile selection is meaningless.
pub const MIN_SAMPLES: usize = 3;

/// 0-based index into a sorted column of length `n` for percentile `p`.
///
/// `n` must be at least 1.
pub fn nearest_rank_index(n: usize, p: f64) -> usize {
    let rank = (n as f64 * p / 100.0).ceil();
    // Clamp in f64 first: the cast saturates but NaN would become 0.
    let rank = if rank.is_nan() { 1.0 } else { rank.clamp(1.0, n as f64) };
    rank as usize - 1
}

fn check_percentiles(percentiles: &[f64]) -> Result<()> {
    if percentiles.is_empty() {
        return Err(ValidationError::EmptyPercentileSpec);
    }
    if let Some(&bad) = percentiles.iter().find(|p| !(0.0..=100.0).contains(*p)) {
        return Err(ValidationError::PercentileOutOfRange(bad));
    }
    Ok(())
}

/// Percentile table of shape `(percentiles.len(), residuals.n_features())`.
pub fn reduce(residuals: &ResidualMatrix, percentiles: &[f64]) -> Result<PercentileMatrix> {
    let n = residuals.n_rows();
    if n < MIN_SAMPLES {
        return Err(ValidationError::InsufficientSamples {
            rows: n,
            required: MIN_SAMPLES,
        });
    }
    if residuals.n_features() == 0 {
        return Err(ValidationError::EmptyFeatureSet);
    }
    check_percentiles(percentiles)?;

    let sorted: Vec<Vec<f64>> = (0..residuals.n_features())
        .map(|j| {
            let mut col = residuals.column(j);
            col.sort_by(f64::total_cmp);
            col
        })
        .collect();

    let values = percentiles
        .iter()
        .map(|&p| {
            let idx = nearest_rank_index(n, p);
            sorted.iter().map(|col| col[idx]).collect()
        })
        .collect();

    Ok(PercentileMatrix {
        percentiles: percentiles.to_vec(),
        values,
    })
}

/// [`reduce`] with [`DEFAULT_PERCENTILES`].
pub fn reduce_default(residuals: &ResidualMatrix) -> Result<PercentileMatrix> {
    reduce(residuals, &DEFAULT_PERCENTILES)
}
