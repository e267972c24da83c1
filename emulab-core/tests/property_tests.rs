//! Property tests for the percentile reducer.
//!
//! Uses proptest to verify:
//! 1. Output shape is (len(percentiles), n_columns)
//! 2. Default percentile rows are non-decreasing per column
//! 3. Identical rows reduce to that row for every percentile
//! 4. Every output value is an element of its input column
//! 5. Reduction does not depend on row order
//!
//! And for aggregation over generated sample trees:
//! 6. Serial and parallel runs yield the same matrix and failures
//! 7. Every discovered location is either a row or a recorded failure

use emulab_core::{
    reduce, reduce_default, BoxError, FailureReason, ResidualEvaluator, ResidualMatrix,
};
use proptest::prelude::*;
use std::fs;
use std::path::Path;

// ── Strategies ───────────────────────────────────────────────────────

fn arb_matrix() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (3usize..40, 1usize..6).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(prop::collection::vec(0.0..1000.0_f64, cols), rows)
    })
}

fn arb_percentiles() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..=100.0_f64, 1..8)
}

/// One generated sample: base input, zero first truth value, three features
/// instead of two. The first sample is always well formed.
fn arb_tree() -> impl Strategy<Value = Vec<(u8, bool, bool)>> {
    prop::collection::vec((1u8..50, any::<bool>(), any::<bool>()), 1..16).prop_map(|mut samples| {
        samples[0].1 = false;
        samples[0].2 = false;
        samples
    })
}

// ── Aggregation fixtures ─────────────────────────────────────────────

type CbResult = Result<Vec<f64>, BoxError>;

/// Wide samples get `x >= 100`, which makes the emulator return three values.
fn write_tree(root: &Path, samples: &[(u8, bool, bool)]) {
    for (i, &(base, zero, wide)) in samples.iter().enumerate() {
        let dir = root.join(format!("s{i:03}"));
        fs::create_dir_all(&dir).unwrap();
        let x = f64::from(base) + if wide { 100.0 } else { 0.0 };
        fs::write(dir.join("params.json"), format!(r#"{{"x": {x}}}"#)).unwrap();
        let width: u8 = if wide { 3 } else { 2 };
        let mut truth: Vec<f64> = (1..=width).map(|k| x + f64::from(k)).collect();
        if zero {
            truth[0] = 0.0;
        }
        let line: Vec<String> = truth.iter().map(|v| v.to_string()).collect();
        fs::write(dir.join("truth.txt"), line.join(" ")).unwrap();
    }
}

fn read_truth(location: &Path) -> CbResult {
    let text = fs::read_to_string(location.join("truth.txt"))?;
    text.split_whitespace()
        .map(|t| t.parse::<f64>().map_err(BoxError::from))
        .collect()
}

fn emulate(x: &[f64]) -> CbResult {
    let width = if x[0] >= 100.0 { 3 } else { 2 };
    Ok(vec![x[0]; width])
}

proptest! {
    #[test]
    fn shape_matches_request(rows in arb_matrix(), ps in arb_percentiles()) {
        let m = ResidualMatrix::from_rows(&rows).unwrap();
        let pm = reduce(&m, &ps).unwrap();
        prop_assert_eq!(pm.shape(), (ps.len(), m.n_features()));
    }

    #[test]
    fn default_rows_are_non_decreasing(rows in arb_matrix()) {
        let m = ResidualMatrix::from_rows(&rows).unwrap();
        let pm = reduce_default(&m).unwrap();
        for c in 0..m.n_features() {
            prop_assert!(pm.get(0, c) <= pm.get(1, c));
            prop_assert!(pm.get(1, c) <= pm.get(2, c));
        }
    }

    #[test]
    fn identical_rows_reduce_to_that_row(
        row in prop::collection::vec(-50.0..50.0_f64, 1..6),
        n in 3usize..20,
        ps in arb_percentiles(),
    ) {
        let m = ResidualMatrix::from_rows(&vec![row.clone(); n]).unwrap();
        let pm = reduce(&m, &ps).unwrap();
        for values in &pm.values {
            prop_assert_eq!(values, &row);
        }
    }

    #[test]
    fn outputs_are_column_elements(rows in arb_matrix(), ps in arb_percentiles()) {
        let m = ResidualMatrix::from_rows(&rows).unwrap();
        let pm = reduce(&m, &ps).unwrap();
        for c in 0..m.n_features() {
            let col = m.column(c);
            for p in 0..ps.len() {
                prop_assert!(col.contains(&pm.get(p, c)));
            }
        }
    }

    #[test]
    fn row_order_does_not_matter(rows in arb_matrix(), ps in arb_percentiles()) {
        let forward = ResidualMatrix::from_rows(&rows).unwrap();
        let mut reversed_rows = rows.clone();
        reversed_rows.reverse();
        let reversed = ResidualMatrix::from_rows(&reversed_rows).unwrap();
        prop_assert_eq!(reduce(&forward, &ps).unwrap(), reduce(&reversed, &ps).unwrap());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn aggregation_is_mode_independent(samples in arb_tree()) {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &samples);

        let run = |parallel: bool| {
            ResidualEvaluator::new("params.json", vec!["x".into()], &read_truth, &emulate)
                .with_parallelism(parallel)
                .aggregate_detailed(dir.path())
                .unwrap()
        };
        let serial = run(false);
        let parallel = run(true);

        prop_assert_eq!(&serial.matrix, &parallel.matrix);
        prop_assert_eq!(&serial.failures, &parallel.failures);

        let expected_failures = samples[1..].iter().filter(|s| s.1 || s.2).count();
        prop_assert_eq!(serial.discovered, samples.len());
        prop_assert_eq!(serial.failures.len(), expected_failures);
        prop_assert_eq!(serial.processed() + serial.failures.len(), samples.len());

        let mismatches = serial
            .failures
            .iter()
            .filter(|f| matches!(f.reason, FailureReason::DimensionMismatch { expected: 2, found: 3 }))
            .count();
        prop_assert_eq!(mismatches, samples[1..].iter().filter(|s| s.2 && !s.1).count());
    }
}
