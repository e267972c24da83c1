//! emulab core: residual statistics for emulator validation.
//!
//! This crate turns a directory tree of simulation samples into error bands:
//! - Sample discovery by marker file ([`locate_samples`])
//! - Per-sample residuals in sigma or relative mode ([`ResidualEvaluator::compute`])
//! - Fault-tolerant aggregation with dimension inference ([`ResidualEvaluator::aggregate`])
//! - Nearest-rank percentile reduction ([`reduce`])
//!
//! Ground truth, the emulator and the optional uncertainty source are
//! injected through the traits in [`callback`].

pub mod aggregate;
pub mod callback;
pub mod error;
mod float_serde;
pub mod locate;
pub mod matrix;
pub mod percentile;
pub mod record;
pub mod residual;

pub use aggregate::{Aggregation, FailureReason, SampleFailure};
pub use callback::{Emulator, GroundTruth, Uncertainty};
pub use error::{BoxError, ErrorKind, Result, ValidationError};
pub use locate::locate_samples;
pub use matrix::{PercentileMatrix, ResidualMatrix};
pub use percentile::{nearest_rank_index, reduce, reduce_default, DEFAULT_PERCENTILES, MIN_SAMPLES};
pub use record::ParameterRecord;
pub use residual::{relative_residuals, sigma_residuals, ResidualEvaluator, ResidualMode};
