//! TOML configuration for a validation run.
//!
//! ```toml
//! root = "runs/test_set"
//! parameters = ["omega_m", "sigma_8"]
//! truth_file = "power.txt"
//! sigma_file = "power_err.txt"     # optional; enables sigma mode
//!
//! [emulator]
//! type = "prediction_table"
//! path = "predictions.csv"
//! ```

use emulab_core::{Emulator, DEFAULT_PERCENTILES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::callbacks::{PredictionTable, PredictionTableError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Emulator(#[from] PredictionTableError),
}

/// Where emulator predictions come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmulatorConfig {
    /// Precomputed predictions, see [`PredictionTable`].
    PredictionTable { path: PathBuf },
}

impl EmulatorConfig {
    /// Instantiate the emulator; `parameters` is its input order.
    pub fn build(&self, parameters: &[String]) -> Result<Box<dyn Emulator>, ConfigError> {
        match self {
            EmulatorConfig::PredictionTable { path } => {
                Ok(Box::new(PredictionTable::from_csv(path, parameters)?))
            }
        }
    }
}

fn default_marker() -> String {
    "params.json".to_string()
}

fn default_percentiles() -> Vec<f64> {
    DEFAULT_PERCENTILES.to_vec()
}

fn default_true() -> bool {
    true
}

/// One validation run: where the samples live and how to score them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Root of the sample tree.
    pub root: PathBuf,

    #[serde(default = "default_marker")]
    pub marker: String,

    /// Parameter names in emulator input order.
    pub parameters: Vec<String>,

    /// Ground-truth array file inside each sample directory.
    pub truth_file: String,

    /// Optional uncertainty array file; switches residuals to sigma mode.
    #[serde(default)]
    pub sigma_file: Option<String>,

    pub emulator: EmulatorConfig,

    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,

    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl ValidationConfig {
    /// Load from a TOML file. Relative `root` and emulator paths are resolved
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.root.is_relative() {
            self.root = base.join(&self.root);
        }
        match &mut self.emulator {
            EmulatorConfig::PredictionTable { path } if path.is_relative() => {
                *path = base.join(&*path);
            }
            EmulatorConfig::PredictionTable { .. } => {}
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.marker.is_empty() {
            return Err(ConfigError::Invalid("marker must not be empty".into()));
        }
        if self.parameters.is_empty() {
            return Err(ConfigError::Invalid("parameters must not be empty".into()));
        }
        if self.truth_file.is_empty() {
            return Err(ConfigError::Invalid("truth_file must not be empty".into()));
        }
        if self.sigma_file.as_deref() == Some("") {
            return Err(ConfigError::Invalid("sigma_file must not be empty when set".into()));
        }
        if self.percentiles.is_empty() {
            return Err(ConfigError::Invalid("percentiles must not be empty".into()));
        }
        if let Some(p) = self.percentiles.iter().find(|p| !(0.0..=100.0).contains(*p)) {
            return Err(ConfigError::Invalid(format!(
                "percentile {p} outside [0, 100]"
            )));
        }
        Ok(())
    }
}
