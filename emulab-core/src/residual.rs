//! Per-sample residuals.
//!
//! Two modes, chosen by whether an [`Uncertainty`] source is attached:
//! - sigma: `|truth - pred| / sigma`
//! - relative: `100 * |1 - pred / truth|` (percent)
//!
//! A zero denominator anywhere in the vector rejects the whole sample before
//! any division happens.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::callback::{Emulator, GroundTruth, Uncertainty};
use crate::error::{Result, ValidationError};
use crate::record::ParameterRecord;

/// Which residual formula an evaluator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualMode {
    Sigma,
    Relative,
}

/// Computes residuals for sample directories against an emulator.
///
/// Holds the marker file name, the ordered parameter names fed to the
/// emulator, and the callbacks. Aggregation and the percentile shortcut live
/// in `aggregate.rs` on the same type.
///
/// # Panics
///
/// Callback errors become per-sample failures, but callback panics are not
/// caught. A panic in any callback propagates out of `aggregate`,
/// `aggregate_detailed` and `evaluate_sorted_residuals`.
pub struct ResidualEvaluator<'a> {
    pub(crate) marker: String,
    pub(crate) parameters: Vec<String>,
    truth: &'a dyn GroundTruth,
    emulator: &'a dyn Emulator,
    sigma: Option<&'a dyn Uncertainty>,
    pub(crate) parallel: bool,
}

impl<'a> ResidualEvaluator<'a> {
    /// Relative-mode evaluator. Parallel aggregation is on by default.
    pub fn new(
        marker: impl Into<String>,
        parameters: Vec<String>,
        truth: &'a dyn GroundTruth,
        emulator: &'a dyn Emulator,
    ) -> Self {
        Self {
            marker: marker.into(),
            parameters,
            truth,
            emulator,
            sigma: None,
            parallel: true,
        }
    }

    /// Switch to sigma mode.
    pub fn with_sigma(mut self, sigma: &'a dyn Uncertainty) -> Self {
        self.sigma = Some(sigma);
        self
    }

    /// Attach or clear the uncertainty source.
    pub fn with_optional_sigma(mut self, sigma: Option<&'a dyn Uncertainty>) -> Self {
        self.sigma = sigma;
        self
    }

    /// Enables or disables parallel processing of locations after the first.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn mode(&self) -> ResidualMode {
        if self.sigma.is_some() {
            ResidualMode::Sigma
        } else {
            ResidualMode::Relative
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub(crate) fn check_arguments(&self) -> Result<()> {
        if self.marker.is_empty() {
            return Err(ValidationError::InvalidArgument(
                "marker file name must not be empty".into(),
            ));
        }
        if self.parameters.is_empty() {
            return Err(ValidationError::InvalidArgument(
                "parameter name list must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Residual vector for one sample directory.
    pub fn compute(&self, location: &Path) -> Result<Vec<f64>> {
        self.check_arguments()?;
        if location.as_os_str().is_empty() {
            return Err(ValidationError::InvalidArgument(
                "sample location must not be empty".into(),
            ));
        }

        let marker_path = location.join(&self.marker);
        if !marker_path.is_file() {
            return Err(ValidationError::InvalidArgument(format!(
                "marker file {} does not exist",
                marker_path.display()
            )));
        }

        let record = ParameterRecord::from_path(&marker_path)?;
        let inputs = record.select(&self.parameters, &marker_path)?;

        let truth = self
            .truth
            .ground_truth(location)
            .map_err(|e| ValidationError::processing(location, e))?;
        let prediction = self
            .emulator
            .predict(&inputs)
            .map_err(|e| ValidationError::processing(location, e))?;

        match self.sigma {
            Some(source) => {
                let sigma = source
                    .sigma(location)
                    .map_err(|e| ValidationError::processing(location, e))?;
                sigma_residuals(location, &truth, &prediction, &sigma)
            }
            None => relative_residuals(location, &truth, &prediction),
        }
    }
}

fn check_shape(location: &Path, what: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(ValidationError::processing(
            location,
            format!("{what} has {found} values but ground truth has {expected}"),
        ));
    }
    Ok(())
}

fn first_zero(values: &[f64]) -> Option<usize> {
    values.iter().position(|&v| v == 0.0)
}

/// `|truth - pred| / sigma`, rejecting the vector if any sigma is zero.
pub fn sigma_residuals(
    location: &Path,
    truth: &[f64],
    prediction: &[f64],
    sigma: &[f64],
) -> Result<Vec<f64>> {
    check_shape(location, "prediction", truth.len(), prediction.len())?;
    check_shape(location, "sigma", truth.len(), sigma.len())?;
    if let Some(index) = first_zero(sigma) {
        return Err(ValidationError::DivisionByZero {
            location: PathBuf::from(location),
            what: "sigma",
            index,
        });
    }
    Ok(truth
        .iter()
        .zip(prediction)
        .zip(sigma)
        .map(|((t, p), s)| (t - p).abs() / s)
        .collect())
}

/// `100 * |1 - pred / truth|`, rejecting the vector if any truth value is zero.
pub fn relative_residuals(location: &Path, truth: &[f64], prediction: &[f64]) -> Result<Vec<f64>> {
    check_shape(location, "prediction", truth.len(), prediction.len())?;
    if let Some(index) = first_zero(truth) {
        return Err(ValidationError::DivisionByZero {
            location: PathBuf::from(location),
            what: "ground truth",
            index,
        });
    }
    Ok(truth
        .iter()
        .zip(prediction)
        .map(|(t, p)| 100.0 * (1.0 - p / t).abs())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn sigma_mode_matches_reference_values() {
        let r = sigma_residuals(
            Path::new("s0"),
            &[1.0, 2.0, 3.0],
            &[1.1, 2.1, 2.9],
            &[0.1, 0.2, 0.3],
        )
        .unwrap();
        assert_close(&r, &[1.0, 0.5, 1.0 / 3.0]);
    }

    #[test]
    fn relative_mode_matches_reference_values() {
        let r = relative_residuals(Path::new("s0"), &[1.0, 2.0, 3.0], &[1.1, 2.1, 2.9]).unwrap();
        assert_close(&r, &[10.0, 5.0, 10.0 / 3.0]);
    }

    #[test]
    fn zero_sigma_rejects_whole_vector() {
        let err = sigma_residuals(Path::new("s0"), &[1.0, 2.0], &[1.0, 2.0], &[0.1, 0.0]).unwrap_err();
        match err {
            ValidationError::DivisionByZero { what, index, .. } => {
                assert_eq!(what, "sigma");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_truth_rejects_relative_mode() {
        let err = relative_residuals(Path::new("s0"), &[0.0, 2.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ValidationError::DivisionByZero { index: 0, .. }));
    }

    #[test]
    fn shape_mismatch_is_processing_failure() {
        let err = relative_residuals(Path::new("s0"), &[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, ValidationError::ProcessingFailed { .. }));
    }

    #[test]
    fn sigma_length_mismatch_is_processing_failure() {
        // Zero in the short sigma must not be reached: shape is checked first.
        let err = sigma_residuals(Path::new("s0"), &[1.0, 2.0], &[1.0, 2.0], &[0.0]).unwrap_err();
        match err {
            ValidationError::ProcessingFailed { location, source } => {
                assert_eq!(location, Path::new("s0"));
                assert!(source.to_string().contains("sigma"), "{source}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn write_marker(dir: &Path, body: &str) {
        std::fs::write(dir.join("params.json"), body).unwrap();
    }

    #[test]
    fn compute_feeds_parameters_in_requested_order() {
        let dir = tempfile::tempdir().unwrap();
        write_marker(dir.path(), r#"{"a": 1.0, "b": 10.0}"#);

        let truth = |_: &Path| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![10.0, 1.0]) };
        // Echo the inputs back so the order is visible in the residual.
        let emulator = |x: &[f64]| -> std::result::Result<Vec<f64>, BoxError> { Ok(x.to_vec()) };

        let evaluator = ResidualEvaluator::new(
            "params.json",
            vec!["b".into(), "a".into()],
            &truth,
            &emulator,
        );
        let r = evaluator.compute(dir.path()).unwrap();
        assert_close(&r, &[0.0, 0.0]);
        assert_eq!(evaluator.mode(), ResidualMode::Relative);
    }

    #[test]
    fn compute_in_sigma_mode_uses_uncertainty() {
        let dir = tempfile::tempdir().unwrap();
        write_marker(dir.path(), r#"{"a": 1.0}"#);

        let truth = |_: &Path| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.0, 2.0, 3.0]) };
        let emulator =
            |_: &[f64]| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.1, 2.1, 2.9]) };
        let sigma = |_: &Path| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![0.1, 0.2, 0.3]) };

        let evaluator = ResidualEvaluator::new("params.json", vec!["a".into()], &truth, &emulator)
            .with_sigma(&sigma);
        assert_eq!(evaluator.mode(), ResidualMode::Sigma);
        let r = evaluator.compute(dir.path()).unwrap();
        assert_close(&r, &[1.0, 0.5, 1.0 / 3.0]);
    }

    #[test]
    fn missing_parameter_propagates_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        write_marker(dir.path(), r#"{"a": 1.0}"#);
        let truth = |_: &Path| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.0]) };
        let emulator = |_: &[f64]| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.0]) };

        let evaluator =
            ResidualEvaluator::new("params.json", vec!["a".into(), "z".into()], &truth, &emulator);
        let err = evaluator.compute(dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingParameter { ref name, .. } if name == "z"));
    }

    #[test]
    fn callback_error_is_wrapped_with_location() {
        let dir = tempfile::tempdir().unwrap();
        write_marker(dir.path(), r#"{"a": 1.0}"#);
        let truth = |_: &Path| -> std::result::Result<Vec<f64>, BoxError> {
            Err("observable file truncated".into())
        };
        let emulator = |_: &[f64]| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.0]) };

        let evaluator = ResidualEvaluator::new("params.json", vec!["a".into()], &truth, &emulator);
        let err = evaluator.compute(dir.path()).unwrap_err();
        match err {
            ValidationError::ProcessingFailed { location, source } => {
                assert_eq!(location, dir.path());
                assert!(source.to_string().contains("truncated"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_marker_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let truth = |_: &Path| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.0]) };
        let emulator = |_: &[f64]| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.0]) };
        let evaluator = ResidualEvaluator::new("params.json", vec!["a".into()], &truth, &emulator);
        let err = evaluator.compute(dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidArgument(_)));
    }

    #[test]
    fn empty_parameter_list_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        write_marker(dir.path(), r#"{"a": 1.0}"#);
        let truth = |_: &Path| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.0]) };
        let emulator = |_: &[f64]| -> std::result::Result<Vec<f64>, BoxError> { Ok(vec![1.0]) };
        let evaluator = ResidualEvaluator::new("params.json", vec![], &truth, &emulator);
        assert!(matches!(
            evaluator.compute(dir.path()),
            Err(ValidationError::InvalidArgument(_))
        ));
    }
}
