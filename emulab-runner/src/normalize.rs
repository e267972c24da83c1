//! Min/max scaling of table columns into [0, 1].

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::loader::column_values;

/// Per-column bounds captured by [`MinMaxScaler::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    fn span(&self) -> f64 {
        self.max - self.min
    }

    fn scale(&self, x: f64) -> f64 {
        let span = self.span();
        if span == 0.0 {
            0.0
        } else {
            (x - self.min) / span
        }
    }

    fn unscale(&self, x: f64) -> f64 {
        self.min + x * self.span()
    }
}

/// Min/max scaler over a fixed set of f64 columns.
///
/// Constant columns scale to 0.0 and inverse-scale back to the constant.
/// Columns not named at fit time pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub ranges: Vec<ColumnRange>,
}

impl MinMaxScaler {
    pub fn fit(df: &DataFrame, columns: &[String]) -> PolarsResult<Self> {
        let ranges = columns
            .iter()
            .map(|name| {
                let values = column_values(df, name)?;
                let (min, max) = values
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                if min > max {
                    return Err(PolarsError::ComputeError(
                        format!("column '{name}' has no finite values to fit").into(),
                    ));
                }
                Ok(ColumnRange {
                    column: name.clone(),
                    min,
                    max,
                })
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok(Self { ranges })
    }

    pub fn transform(&self, df: &DataFrame) -> PolarsResult<DataFrame> {
        self.apply(df, ColumnRange::scale)
    }

    pub fn inverse_transform(&self, df: &DataFrame) -> PolarsResult<DataFrame> {
        self.apply(df, ColumnRange::unscale)
    }

    fn apply(&self, df: &DataFrame, f: fn(&ColumnRange, f64) -> f64) -> PolarsResult<DataFrame> {
        let mut out = df.clone();
        for range in &self.ranges {
            let values: Vec<f64> = column_values(df, &range.column)?
                .into_iter()
                .map(|x| f(range, x))
                .collect();
            out.with_column(Column::new(range.column.as_str().into(), values))?;
        }
        Ok(out)
    }
}
