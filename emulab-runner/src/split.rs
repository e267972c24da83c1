//! Seeded train/test partition of a dataset table.

use emulab_core::ValidationError;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::loader::LoadError;

/// Split `df` into `(train, test)` rows.
///
/// `test_fraction` must lie strictly inside (0, 1). The test size is rounded
/// and clamped so that both parts keep at least one row. Rows keep their
/// original relative order within each part.
pub fn train_test_split(
    df: &DataFrame,
    test_fraction: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame), LoadError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ValidationError::InvalidArgument(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        ))
        .into());
    }
    let n = df.height();
    if n < 2 {
        return Err(ValidationError::InvalidArgument(format!(
            "need at least 2 rows to split, got {n}"
        ))
        .into());
    }

    let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);

    let mut indices: Vec<IdxSize> = (0..n as IdxSize).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_idx, train_idx) = indices.split_at_mut(n_test);
    test_idx.sort_unstable();
    train_idx.sort_unstable();

    let train = df.take(&IdxCa::from_vec("idx".into(), train_idx.to_vec()))?;
    let test = df.take(&IdxCa::from_vec("idx".into(), test_idx.to_vec()))?;
    tracing::debug!(train = train.height(), test = test.height(), seed, "split table");
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::column_values;

    fn frame(n: usize) -> DataFrame {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        DataFrame::new(vec![Column::new("x".into(), x)]).unwrap()
    }

    #[test]
    fn sizes_follow_fraction() {
        let (train, test) = train_test_split(&frame(10), 0.2, 1).unwrap();
        assert_eq!(train.height(), 8);
        assert_eq!(test.height(), 2);
    }

    #[test]
    fn same_seed_same_split() {
        let df = frame(30);
        let (_, a) = train_test_split(&df, 0.3, 42).unwrap();
        let (_, b) = train_test_split(&df, 0.3, 42).unwrap();
        assert_eq!(column_values(&a, "x").unwrap(), column_values(&b, "x").unwrap());
    }

    #[test]
    fn tiny_fraction_still_yields_one_test_row() {
        let (train, test) = train_test_split(&frame(5), 0.01, 0).unwrap();
        assert_eq!(test.height(), 1);
        assert_eq!(train.height(), 4);
    }

    #[test]
    fn bad_fraction_is_invalid_argument() {
        for f in [0.0, 1.0, -0.5, f64::NAN] {
            let err = train_test_split(&frame(5), f, 0).unwrap_err();
            assert!(matches!(
                err,
                LoadError::Invalid(ValidationError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn single_row_cannot_split() {
        assert!(train_test_split(&frame(1), 0.5, 0).is_err());
    }
}
