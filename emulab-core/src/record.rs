//! Parameter records read from a sample's marker file.
//!
//! A marker file is a flat key -> number record. `.json` files are parsed as
//! a JSON object and `.toml` files as a TOML table; any other extension is
//! tried as JSON first, then TOML. Non-numeric entries are kept out of the
//! record, so asking for one reports it as missing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, ValidationError};

/// Parameter name -> scalar value for one sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterRecord {
    values: BTreeMap<String, f64>,
}

impl ParameterRecord {
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self { values }
    }

    /// Read and parse a marker file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ValidationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content).or_else(|json_err| {
                Self::from_toml(&content).map_err(|toml_err| format!("{json_err}; {toml_err}"))
            }),
        };

        parsed.map_err(|reason| ValidationError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse a JSON object of numbers.
    pub fn from_json(content: &str) -> std::result::Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))?;
        let object = value
            .as_object()
            .ok_or_else(|| "JSON marker must be an object".to_string())?;
        let values = object
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|x| (k.clone(), x)))
            .collect();
        Ok(Self { values })
    }

    /// Parse a TOML table of numbers. Integers are widened to f64.
    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        let table: toml::Table = toml::from_str(content).map_err(|e| format!("invalid TOML: {e}"))?;
        let values = table
            .into_iter()
            .filter_map(|(k, v)| match v {
                toml::Value::Float(x) => Some((k, x)),
                toml::Value::Integer(i) => Some((k, i as f64)),
                _ => None,
            })
            .collect();
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build the emulator input vector in exactly the order of `names`.
    ///
    /// `source` is only used to name the file in a `MissingParameter` error.
    pub fn select(&self, names: &[String], source: &Path) -> Result<Vec<f64>> {
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| ValidationError::MissingParameter {
                    name: name.clone(),
                    path: source.to_path_buf(),
                })
            })
            .collect()
    }

    /// Serialize as a pretty JSON object, the format written for new samples.
    pub fn to_json(&self) -> String {
        // A map of finite f64 values always serializes.
        serde_json::to_string_pretty(&self.values).unwrap_or_else(|_| "{}".to_string())
    }
}

impl FromIterator<(String, f64)> for ParameterRecord {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
