//! Dense residual and percentile matrices.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, ValidationError};

/// Residuals for every successfully processed sample.
///
/// Row-major storage: row `i` holds the residual vector of `locations[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualMatrix {
    n_features: usize,
    #[serde(with = "crate::float_serde::vec")]
    data: Vec<f64>,
    locations: Vec<PathBuf>,
}

impl ResidualMatrix {
    /// Empty matrix with a fixed feature count and room for `capacity` rows.
    pub fn with_capacity(n_features: usize, capacity: usize) -> Self {
        Self {
            n_features,
            data: Vec::with_capacity(n_features * capacity),
            locations: Vec::with_capacity(capacity),
        }
    }

    /// Build from rows that must all share one length. Locations are left
    /// empty; use this for residuals that did not come from a directory scan.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut m = Self::with_capacity(n_features, rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(ValidationError::InvalidArgument(format!(
                    "row {i} has {} values, expected {n_features}",
                    row.len()
                )));
            }
            m.data.extend_from_slice(row);
        }
        m.locations = vec![PathBuf::new(); rows.len()];
        Ok(m)
    }

    /// Append one row. Caller guarantees `row.len() == n_features`.
    pub(crate) fn push_row(&mut self, location: PathBuf, row: &[f64]) {
        debug_assert_eq!(row.len(), self.n_features);
        self.data.extend_from_slice(row);
        self.locations.push(location);
    }

    pub fn n_rows(&self) -> usize {
        self.locations.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_features..(i + 1) * self.n_features]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.n_features.max(1))
    }

    /// Copy of column `j` in row order.
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.n_rows()).map(|i| self.data[i * self.n_features + j]).collect()
    }

    /// Sample directory of each row, in row order.
    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    /// Raw row-major values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Percentile table: one row per requested percentile, one column per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileMatrix {
    pub percentiles: Vec<f64>,
    #[serde(with = "crate::float_serde::nested")]
    pub values: Vec<Vec<f64>>,
}

impl PercentileMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.values.len(), self.values.first().map_or(0, Vec::len))
    }

    pub fn get(&self, percentile_index: usize, feature: usize) -> f64 {
        self.values[percentile_index][feature]
    }

    /// Row for the first entry equal to `percentile`, if it was requested.
    pub fn row_for(&self, percentile: f64) -> Option<&[f64]> {
        self.percentiles
            .iter()
            .position(|&p| p == percentile)
            .map(|i| self.values[i].as_slice())
    }
}
