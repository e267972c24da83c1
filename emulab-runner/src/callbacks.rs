//! File-backed implementations of the core callback traits.

use emulab_core::{BoxError, Emulator, GroundTruth, Uncertainty};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::loader::read_array;

/// Ground truth read from an array file inside each sample directory.
#[derive(Debug, Clone)]
pub struct FileGroundTruth {
    pub file: String,
}

impl FileGroundTruth {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }
}

impl GroundTruth for FileGroundTruth {
    fn ground_truth(&self, location: &Path) -> Result<Vec<f64>, BoxError> {
        Ok(read_array(&location.join(&self.file))?)
    }
}

/// Per-sample 1-sigma uncertainties read from an array file.
#[derive(Debug, Clone)]
pub struct FileUncertainty {
    pub file: String,
}

impl FileUncertainty {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }
}

impl Uncertainty for FileUncertainty {
    fn sigma(&self, location: &Path) -> Result<Vec<f64>, BoxError> {
        Ok(read_array(&location.join(&self.file))?)
    }
}

#[derive(Debug, Error)]
pub enum PredictionTableError {
    #[error("prediction table {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("prediction table {}: header must start with {expected:?}, found {found:?}", path.display())]
    Header {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("prediction table {}: no output columns", path.display())]
    NoOutputs { path: PathBuf },

    #[error("prediction table {}: row {row}: '{token}' is not a number", path.display())]
    Parse {
        path: PathBuf,
        row: usize,
        token: String,
    },

    #[error("prediction table {}: row {row} has {found} fields, expected {expected}", path.display())]
    RowWidth {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Precomputed emulator outputs keyed by their exact input vector.
///
/// CSV layout: a header naming the parameters (in emulator input order)
/// followed by one or more output columns; one row per evaluated point.
/// Lookup compares the bit patterns of the inputs, so values must round-trip
/// through the marker files unchanged.
#[derive(Debug, Clone)]
pub struct PredictionTable {
    outputs: Vec<String>,
    rows: HashMap<Vec<u64>, Vec<f64>>,
}

fn key(x: &[f64]) -> Vec<u64> {
    x.iter().map(|v| v.to_bits()).collect()
}

impl PredictionTable {
    pub fn from_csv(path: &Path, inputs: &[String]) -> Result<Self, PredictionTableError> {
        let csv_err = |source| PredictionTableError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;

        let header: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();
        if header.len() < inputs.len() || header[..inputs.len()] != *inputs {
            return Err(PredictionTableError::Header {
                path: path.to_path_buf(),
                expected: inputs.to_vec(),
                found: header,
            });
        }
        let outputs = header[inputs.len()..].to_vec();
        if outputs.is_empty() {
            return Err(PredictionTableError::NoOutputs {
                path: path.to_path_buf(),
            });
        }

        let mut rows = HashMap::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(csv_err)?;
            if record.len() != header.len() {
                return Err(PredictionTableError::RowWidth {
                    path: path.to_path_buf(),
                    row,
                    expected: header.len(),
                    found: record.len(),
                });
            }
            let values = record
                .iter()
                .map(|token| {
                    token.parse::<f64>().map_err(|_| PredictionTableError::Parse {
                        path: path.to_path_buf(),
                        row,
                        token: token.to_string(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            let (x, y) = values.split_at(inputs.len());
            rows.insert(key(x), y.to_vec());
        }

        tracing::debug!(path = %path.display(), rows = rows.len(), "loaded prediction table");
        Ok(Self {
            outputs,
            rows,
        })
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Emulator for PredictionTable {
    fn predict(&self, parameters: &[f64]) -> Result<Vec<f64>, BoxError> {
        self.rows
            .get(&key(parameters))
            .cloned()
            .ok_or_else(|| format!("no prediction for inputs {parameters:?}").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn table_lookup_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pred.csv");
        fs::write(&path, "a,b,y0,y1\n0.1,0.2,1.0,2.0\n0.3,0.4,3.0,4.0\n").unwrap();

        let table = PredictionTable::from_csv(&path, &names()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.outputs(), ["y0".to_string(), "y1".to_string()]);
        assert_eq!(table.predict(&[0.3, 0.4]).unwrap(), vec![3.0, 4.0]);
        assert!(table.predict(&[0.3, 0.4000001]).is_err());
    }

    #[test]
    fn header_must_lead_with_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pred.csv");
        fs::write(&path, "b,a,y\n1,2,3\n").unwrap();
        assert!(matches!(
            PredictionTable::from_csv(&path, &names()),
            Err(PredictionTableError::Header { .. })
        ));
    }

    #[test]
    fn table_without_outputs_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pred.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(matches!(
            PredictionTable::from_csv(&path, &names()),
            Err(PredictionTableError::NoOutputs { .. })
        ));
    }

    #[test]
    fn file_callbacks_read_sample_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("truth.txt"), "1 2 3").unwrap();
        fs::write(dir.path().join("sigma.csv"), "0.1,0.2,0.3\n").unwrap();

        let truth = FileGroundTruth::new("truth.txt");
        let sigma = FileUncertainty::new("sigma.csv");
        assert_eq!(truth.ground_truth(dir.path()).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(sigma.sigma(dir.path()).unwrap(), vec![0.1, 0.2, 0.3]);
        assert!(FileGroundTruth::new("absent.txt")
            .ground_truth(dir.path())
            .is_err());
    }
}
