//! Property tests for the runner's table utilities and samplers.
//!
//! 1. Normalize then inverse-normalize restores every column
//! 2. Train/test split is a partition: no row lost or duplicated
//! 3. Every sampler stays inside the parameter bounds

use emulab_runner::loader::column_values;
use emulab_runner::{
    sample, train_test_split, MinMaxScaler, ParameterBounds, ParameterSpace, SamplingMethod,
};
use polars::prelude::*;
use proptest::prelude::*;

// ── Strategies ───────────────────────────────────────────────────────

fn arb_column() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e3..1.0e3_f64, 2..40)
}

fn arb_method() -> impl Strategy<Value = SamplingMethod> {
    prop_oneof![
        (0usize..50).prop_map(|skip| SamplingMethod::Halton { skip }),
        any::<u64>().prop_map(|seed| SamplingMethod::LatinHypercube { seed }),
        any::<u64>().prop_map(|seed| SamplingMethod::Uniform { seed }),
    ]
}

proptest! {
    #[test]
    fn normalize_round_trip(x in arb_column()) {
        let df = DataFrame::new(vec![Column::new("x".into(), x.clone())]).unwrap();
        let scaler = MinMaxScaler::fit(&df, &["x".to_string()]).unwrap();
        let scaled = scaler.transform(&df).unwrap();
        for v in column_values(&scaled, "x").unwrap() {
            prop_assert!((0.0..=1.0).contains(&v));
        }
        let back = column_values(&scaler.inverse_transform(&scaled).unwrap(), "x").unwrap();
        for (orig, restored) in x.iter().zip(&back) {
            prop_assert!((orig - restored).abs() <= 1e-9 * orig.abs().max(1.0));
        }
    }

    #[test]
    fn split_is_a_partition(n in 2usize..60, fraction in 0.05..0.95_f64, seed in any::<u64>()) {
        let ids: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let df = DataFrame::new(vec![Column::new("id".into(), ids)]).unwrap();
        let (train, test) = train_test_split(&df, fraction, seed).unwrap();
        prop_assert!(train.height() >= 1);
        prop_assert!(test.height() >= 1);

        let mut all = column_values(&train, "id").unwrap();
        all.extend(column_values(&test, "id").unwrap());
        all.sort_by(f64::total_cmp);
        let expected: Vec<f64> = (0..n).map(|i| i as f64).collect();
        prop_assert_eq!(all, expected);
    }

    #[test]
    fn samplers_stay_in_bounds(n in 1usize..64, method in arb_method()) {
        let space = ParameterSpace::new(vec![
            ParameterBounds::new("p0", -3.0, 5.0),
            ParameterBounds::new("p1", 0.0, 1e-3),
            ParameterBounds::new("p2", 100.0, 200.0),
        ]).unwrap();
        let set = sample(&space, n, method).unwrap();
        prop_assert_eq!(set.len(), n);
        for point in &set.points {
            for (v, b) in point.iter().zip(&space.parameters) {
                prop_assert!(*v >= b.min && *v <= b.max, "{} = {} outside [{}, {}]", b.name, v, b.min, b.max);
            }
        }
    }
}
