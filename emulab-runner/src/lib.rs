//! emulab runner: everything around the residual core.
//!
//! - Parameter sampling and dataset generation ([`sampling`], [`dataset`])
//! - Tabular view of a dataset with normalization and splitting
//!   ([`loader`], [`normalize`], [`split`])
//! - File-backed callbacks and TOML-configured validation runs
//!   ([`callbacks`], [`config`], [`validation`])
//! - Report export ([`export`])

pub mod callbacks;
pub mod config;
pub mod dataset;
pub mod export;
pub mod loader;
pub mod normalize;
pub mod sampling;
pub mod split;
pub mod validation;

pub use callbacks::{FileGroundTruth, FileUncertainty, PredictionTable, PredictionTableError};
pub use config::{ConfigError, EmulatorConfig, ValidationConfig};
pub use dataset::{
    CommandSimulator, DatasetBuilder, DatasetError, DatasetManifest, ExecutionMode,
    SimulationFailure, Simulator, DATASET_MANIFEST,
};
pub use export::{
    export_json, export_percentiles_csv, export_residuals_csv, format_percentile_table,
    generate_report, import_json, load_report, save_report,
};
pub use loader::{load_table, read_array, read_parquet, write_parquet, LoadError};
pub use normalize::MinMaxScaler;
pub use sampling::{sample, ParameterBounds, ParameterSpace, SampleSet, SamplingError, SamplingMethod};
pub use split::train_test_split;
pub use validation::{run_validation, RunError, ValidationReport, SCHEMA_VERSION};
