//! Residual aggregation across a result tree.
//!
//! The first discovered location fixes the number of output features and is
//! the only location whose failure aborts the run. Every later location is
//! processed independently; a failure or a length mismatch drops that
//! location and is recorded in [`Aggregation::failures`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result, ValidationError};
use crate::locate::locate_samples;
use crate::matrix::{PercentileMatrix, ResidualMatrix};
use crate::percentile::reduce;
use crate::residual::ResidualEvaluator;

/// Why a location contributed no row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Residual vector length differs from the first sample's.
    DimensionMismatch { expected: usize, found: usize },
    /// Any other per-sample error: its variant and rendered text.
    Error { kind: ErrorKind, message: String },
}

/// A skipped location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleFailure {
    pub location: PathBuf,
    pub reason: FailureReason,
}

/// Full outcome of an aggregation run.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub matrix: ResidualMatrix,
    /// Number of directories the locator returned.
    pub discovered: usize,
    /// Skipped locations, in discovery order.
    pub failures: Vec<SampleFailure>,
}

impl Aggregation {
    pub fn processed(&self) -> usize {
        self.matrix.n_rows()
    }
}

type Slot = std::result::Result<Vec<f64>, FailureReason>;

impl ResidualEvaluator<'_> {
    /// Residual matrix over every sample under `root`.
    pub fn aggregate(&self, root: &Path) -> Result<ResidualMatrix> {
        self.aggregate_detailed(root).map(|a| a.matrix)
    }

    /// Like [`aggregate`](Self::aggregate) but also returns the discovered
    /// count and the per-location failures.
    pub fn aggregate_detailed(&self, root: &Path) -> Result<Aggregation> {
        self.check_arguments()?;
        let locations = locate_samples(root, &self.marker)?;
        let discovered = locations.len();

        // Dimension inference: always first, always synchronous.
        let first = &locations[0];
        let first_row = self
            .compute(first)
            .map_err(|e| ValidationError::DimensionInferenceFailed {
                location: first.clone(),
                source: Box::new(e),
            })?;
        let n_features = first_row.len();
        tracing::debug!(location = %first.display(), n_features, "inferred output dimension");

        let rest = &locations[1..];
        let slots: Vec<Slot> = if self.parallel {
            rest.par_iter()
                .map(|loc| self.process_slot(loc, n_features))
                .collect()
        } else {
            rest.iter()
                .map(|loc| self.process_slot(loc, n_features))
                .collect()
        };

        let mut matrix = ResidualMatrix::with_capacity(n_features, discovered);
        matrix.push_row(first.clone(), &first_row);
        let mut failures = Vec::new();

        for (location, slot) in rest.iter().zip(slots) {
            match slot {
                Ok(row) => matrix.push_row(location.clone(), &row),
                Err(reason) => {
                    match &reason {
                        FailureReason::DimensionMismatch { expected, found } => tracing::warn!(
                            location = %location.display(),
                            expected,
                            found,
                            "skipping sample: residual length mismatch"
                        ),
                        FailureReason::Error { kind, message } => tracing::warn!(
                            location = %location.display(),
                            kind = ?kind,
                            error = %message,
                            "skipping sample: processing failed"
                        ),
                    }
                    failures.push(SampleFailure {
                        location: location.clone(),
                        reason,
                    });
                }
            }
        }

        if matrix.n_rows() < discovered {
            tracing::warn!(
                processed = matrix.n_rows(),
                discovered,
                "residual matrix is smaller than the discovered sample set"
            );
        } else {
            tracing::info!(processed = matrix.n_rows(), n_features, "aggregated residuals");
        }

        Ok(Aggregation {
            matrix,
            discovered,
            failures,
        })
    }

    fn process_slot(&self, location: &Path, n_features: usize) -> Slot {
        match self.compute(location) {
            Ok(row) if row.len() == n_features => Ok(row),
            Ok(row) => Err(FailureReason::DimensionMismatch {
                expected: n_features,
                found: row.len(),
            }),
            Err(e) => Err(FailureReason::Error {
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }

    /// `reduce(aggregate(root), percentiles)`.
    pub fn evaluate_sorted_residuals(
        &self,
        root: &Path,
        percentiles: &[f64],
    ) -> Result<PercentileMatrix> {
        let matrix = self.aggregate(root)?;
        reduce(&matrix, percentiles)
    }
}
