//! Error taxonomy for the validation core.
//!
//! Validation-class errors (bad caller input, missing parameters, unreadable
//! marker files, degenerate denominators) are returned unchanged from every
//! entry point. Failures raised by the caller's callbacks are wrapped in
//! [`ValidationError::ProcessingFailed`] with the location attached.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Error type returned by the caller-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("parameter '{name}' missing from {}", path.display())]
    MissingParameter { name: String, path: PathBuf },

    #[error("division by zero at {}: {what} component {index} is zero", location.display())]
    DivisionByZero {
        location: PathBuf,
        what: &'static str,
        index: usize,
    },

    #[error("cannot infer output dimension: first sample {} failed: {source}", location.display())]
    DimensionInferenceFailed {
        location: PathBuf,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("need at least {required} residual rows for percentiles, got {rows}")]
    InsufficientSamples { rows: usize, required: usize },

    #[error("residual matrix has no output features")]
    EmptyFeatureSet,

    #[error("percentile list is empty")]
    EmptyPercentileSpec,

    #[error("percentile {0} is outside [0, 100]")]
    PercentileOutOfRange(f64),

    #[error("processing failed for {}: {source}", location.display())]
    ProcessingFailed {
        location: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

/// Fieldless mirror of [`ValidationError`]'s variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    MissingParameter,
    DivisionByZero,
    DimensionInferenceFailed,
    InsufficientSamples,
    EmptyFeatureSet,
    EmptyPercentileSpec,
    PercentileOutOfRange,
    ProcessingFailed,
    Io,
    Parse,
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::MissingParameter { .. } => ErrorKind::MissingParameter,
            Self::DivisionByZero { .. } => ErrorKind::DivisionByZero,
            Self::DimensionInferenceFailed { .. } => ErrorKind::DimensionInferenceFailed,
            Self::InsufficientSamples { .. } => ErrorKind::InsufficientSamples,
            Self::EmptyFeatureSet => ErrorKind::EmptyFeatureSet,
            Self::EmptyPercentileSpec => ErrorKind::EmptyPercentileSpec,
            Self::PercentileOutOfRange(_) => ErrorKind::PercentileOutOfRange,
            Self::ProcessingFailed { .. } => ErrorKind::ProcessingFailed,
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
        }
    }

    /// Errors describing bad input or unreadable data rather than a failure
    /// inside a callback. These are never re-wrapped.
    pub fn is_validation_class(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::MissingParameter { .. }
                | Self::DivisionByZero { .. }
                | Self::Io { .. }
                | Self::Parse { .. }
        )
    }

    pub(crate) fn processing(location: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::ProcessingFailed {
            location: location.into(),
            source: source.into(),
        }
    }
}
