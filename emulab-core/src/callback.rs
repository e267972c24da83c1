//! Caller-supplied strategy objects.
//!
//! The core never loads observables or runs an emulator itself. Each concern
//! is a one-method trait; closures with the matching signature implement them
//! automatically.
//!
//! Report failures by returning `Err`. A callback that panics is not caught:
//! the panic unwinds out of aggregation (through rayon's join in parallel
//! mode) and no partial result is returned.

use std::path::Path;

use crate::error::BoxError;

/// Loads the true observable vector for a sample directory.
pub trait GroundTruth: Send + Sync {
    fn ground_truth(&self, location: &Path) -> Result<Vec<f64>, BoxError>;
}

/// Evaluates the emulator on an ordered parameter vector.
pub trait Emulator: Send + Sync {
    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>, BoxError>;
}

/// Loads the per-feature uncertainty (sigma) for a sample directory.
pub trait Uncertainty: Send + Sync {
    fn sigma(&self, location: &Path) -> Result<Vec<f64>, BoxError>;
}

impl<F> GroundTruth for F
where
    F: Fn(&Path) -> Result<Vec<f64>, BoxError> + Send + Sync,
{
    fn ground_truth(&self, location: &Path) -> Result<Vec<f64>, BoxError> {
        self(location)
    }
}

impl<F> Emulator for F
where
    F: Fn(&[f64]) -> Result<Vec<f64>, BoxError> + Send + Sync,
{
    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>, BoxError> {
        self(inputs)
    }
}

impl<F> Uncertainty for F
where
    F: Fn(&Path) -> Result<Vec<f64>, BoxError> + Send + Sync,
{
    fn sigma(&self, location: &Path) -> Result<Vec<f64>, BoxError> {
        self(location)
    }
}
