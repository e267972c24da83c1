//! End-to-end validation run: config -> callbacks -> residuals -> bands.

use chrono::{DateTime, Utc};
use emulab_core::{
    reduce, PercentileMatrix, ResidualEvaluator, ResidualMatrix, ResidualMode, SampleFailure,
    Uncertainty, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::callbacks::{FileGroundTruth, FileUncertainty};
use crate::config::{ConfigError, ValidationConfig};

/// Current version of the persisted report format.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Everything a validation run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub root: PathBuf,
    pub marker: String,
    pub parameters: Vec<String>,
    pub mode: ResidualMode,
    /// Directories the locator found.
    pub discovered: usize,
    /// Rows in the residual matrix.
    pub processed: usize,
    pub failures: Vec<SampleFailure>,
    pub percentiles: PercentileMatrix,
    pub residuals: ResidualMatrix,
    /// BLAKE3 of the residual matrix contents.
    pub residuals_hash: String,
}

impl ValidationReport {
    pub fn n_features(&self) -> usize {
        self.residuals.n_features()
    }
}

/// BLAKE3 over the feature count and the row-major residual bit patterns.
pub fn residuals_hash(matrix: &ResidualMatrix) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(matrix.n_features() as u64).to_le_bytes());
    for v in matrix.as_slice() {
        hasher.update(&v.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Run one validation described by `config`.
pub fn run_validation(config: &ValidationConfig) -> Result<ValidationReport, RunError> {
    config.validate()?;

    let truth = FileGroundTruth::new(&config.truth_file);
    let sigma = config.sigma_file.as_ref().map(FileUncertainty::new);
    let emulator = config.emulator.build(&config.parameters)?;

    let evaluator = ResidualEvaluator::new(
        &config.marker,
        config.parameters.clone(),
        &truth,
        emulator.as_ref(),
    )
    .with_optional_sigma(sigma.as_ref().map(|s| s as &dyn Uncertainty))
    .with_parallelism(config.parallel);

    tracing::info!(
        root = %config.root.display(),
        mode = ?evaluator.mode(),
        parallel = config.parallel,
        "starting validation run"
    );

    let aggregation = evaluator.aggregate_detailed(&config.root)?;
    let percentiles = reduce(&aggregation.matrix, &config.percentiles)?;

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION,
        created_at: Utc::now(),
        root: config.root.clone(),
        marker: config.marker.clone(),
        parameters: config.parameters.clone(),
        mode: evaluator.mode(),
        discovered: aggregation.discovered,
        processed: aggregation.processed(),
        failures: aggregation.failures,
        percentiles,
        residuals_hash: residuals_hash(&aggregation.matrix),
        residuals: aggregation.matrix,
    };

    tracing::info!(
        discovered = report.discovered,
        processed = report.processed,
        failed = report.failures.len(),
        "validation run complete"
    );
    Ok(report)
}
