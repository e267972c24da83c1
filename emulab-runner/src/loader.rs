//! Observable array files and the tabular dataset view.
//!
//! Array format: `.csv` files are read without a header and flattened row by
//! row; any other file is whitespace-separated numbers where a line starting
//! with `#` is a comment.

use emulab_core::{locate_samples, ParameterRecord, ValidationError};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: '{token}' is not a number", path.display())]
    Parse { path: PathBuf, token: String },

    #[error("observable '{observable}' has {found} values in {}, expected {expected}", location.display())]
    InconsistentLength {
        observable: String,
        location: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("dataframe: {0}")]
    Polars(#[from] PolarsError),
}

impl LoadError {
    /// Errors that only concern one sample directory.
    fn is_per_sample(&self) -> bool {
        matches!(
            self,
            LoadError::Io { .. }
                | LoadError::Csv { .. }
                | LoadError::Parse { .. }
                | LoadError::Invalid(ValidationError::MissingParameter { .. })
                | LoadError::Invalid(ValidationError::Parse { .. })
                | LoadError::Invalid(ValidationError::Io { .. })
        )
    }
}

fn parse_number(path: &Path, token: &str) -> Result<f64, LoadError> {
    token.parse::<f64>().map_err(|_| LoadError::Parse {
        path: path.to_path_buf(),
        token: token.to_string(),
    })
}

/// Read one observable array file.
pub fn read_array(path: &Path) -> Result<Vec<f64>, LoadError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_csv_array(path)
    } else {
        read_text_array(path)
    }
}

fn read_csv_array(path: &Path) -> Result<Vec<f64>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        for field in record.iter().filter(|f| !f.is_empty()) {
            values.push(parse_number(path, field)?);
        }
    }
    Ok(values)
}

fn read_text_array(path: &Path) -> Result<Vec<f64>, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(|token| parse_number(path, token))
        .collect()
}

/// Column prefix for an observable file: its stem (`power.txt` -> `power`).
pub fn observable_stem(observable: &str) -> String {
    Path::new(observable)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| observable.to_string())
}

/// Extract an f64 column as a plain vector. Nulls become NaN.
pub fn column_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let ca = df.column(name)?.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

struct SampleRow {
    name: String,
    params: Vec<f64>,
    observables: Vec<Vec<f64>>,
}

fn load_row(
    root: &Path,
    dir: &Path,
    marker: &str,
    parameter_names: &[String],
    observables: &[String],
) -> Result<SampleRow, LoadError> {
    let marker_path = dir.join(marker);
    let record = ParameterRecord::from_path(&marker_path)?;
    let params = record.select(parameter_names, &marker_path)?;
    let observables = observables
        .iter()
        .map(|file| read_array(&dir.join(file)))
        .collect::<Result<Vec<_>, _>>()?;
    let name = dir
        .strip_prefix(root)
        .unwrap_or(dir)
        .to_string_lossy()
        .into_owned();
    Ok(SampleRow {
        name,
        params,
        observables,
    })
}

/// Load every sample under `root` into one row per sample.
///
/// Columns: `sample` (path relative to `root`), one per parameter, then
/// `{stem}_{j}` for element `j` of each observable. Samples whose marker or
/// observable files are unreadable are skipped with a warning; a length that
/// disagrees with the first loaded sample is an error.
pub fn load_table(
    root: &Path,
    marker: &str,
    parameter_names: &[String],
    observables: &[String],
) -> Result<DataFrame, LoadError> {
    if parameter_names.is_empty() && observables.is_empty() {
        return Err(ValidationError::InvalidArgument(
            "nothing to load: no parameters and no observables".into(),
        )
        .into());
    }

    let dirs = locate_samples(root, marker)?;
    let mut rows: Vec<SampleRow> = Vec::with_capacity(dirs.len());
    let mut lengths: Option<Vec<usize>> = None;

    for dir in &dirs {
        let row = match load_row(root, dir, marker, parameter_names, observables) {
            Ok(row) => row,
            Err(e) if e.is_per_sample() => {
                tracing::warn!(location = %dir.display(), error = %e, "skipping sample");
                continue;
            }
            Err(e) => return Err(e),
        };

        let found: Vec<usize> = row.observables.iter().map(Vec::len).collect();
        match &lengths {
            None => lengths = Some(found),
            Some(expected) => {
                if let Some(k) = (0..expected.len()).find(|&k| expected[k] != found[k]) {
                    return Err(LoadError::InconsistentLength {
                        observable: observables[k].clone(),
                        location: dir.clone(),
                        expected: expected[k],
                        found: found[k],
                    });
                }
            }
        }
        rows.push(row);
    }

    let Some(lengths) = lengths else {
        return Err(ValidationError::InvalidArgument(format!(
            "no loadable samples under {}",
            root.display()
        ))
        .into());
    };

    let mut columns = Vec::with_capacity(1 + parameter_names.len() + lengths.iter().sum::<usize>());
    let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
    columns.push(Column::new("sample".into(), names));

    for (p, name) in parameter_names.iter().enumerate() {
        let values: Vec<f64> = rows.iter().map(|r| r.params[p]).collect();
        columns.push(Column::new(name.as_str().into(), values));
    }

    for (k, file) in observables.iter().enumerate() {
        let stem = observable_stem(file);
        for j in 0..lengths[k] {
            let values: Vec<f64> = rows.iter().map(|r| r.observables[k][j]).collect();
            columns.push(Column::new(format!("{stem}_{j}").into(), values));
        }
    }

    let df = DataFrame::new(columns)?;
    tracing::info!(
        root = %root.display(),
        rows = df.height(),
        columns = df.width(),
        skipped = dirs.len() - rows.len(),
        "loaded dataset table"
    );
    Ok(df)
}

/// Write a table to a parquet file.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), LoadError> {
    let file = std::fs::File::create(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

/// Read a table back from parquet.
pub fn read_parquet(path: &Path) -> Result<DataFrame, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ParquetReader::new(file).finish()?)
}
