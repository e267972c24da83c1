//! Dataset generation: one directory per parameter sample.
//!
//! Layout produced under the dataset root:
//! ```text
//! {root}/dataset.json            manifest (see DatasetManifest)
//! {root}/sample_00000/{marker}   parameter record (JSON)
//! {root}/sample_00000/...        whatever the simulator writes
//! ```
//!
//! The per-sample simulation is embarrassingly parallel; [`ExecutionMode`]
//! picks between a serial loop, a rayon thread pool, and one child process
//! per sample.

use chrono::{DateTime, Utc};
use emulab_core::{BoxError, ParameterRecord, ValidationError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use thiserror::Error;

use crate::sampling::SampleSet;

/// Manifest file name at the dataset root.
pub const DATASET_MANIFEST: &str = "dataset.json";

/// Default marker file written into each sample directory.
pub const DEFAULT_MARKER: &str = "params.json";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DatasetError + '_ {
    move |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// How per-sample simulations are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// One child process per sample, at most `workers` alive at once.
    ParallelProcess,
    /// In-process simulator on a rayon pool.
    ParallelThread,
    #[default]
    Serial,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::ParallelProcess => "parallel-process",
            ExecutionMode::ParallelThread => "parallel-thread",
            ExecutionMode::Serial => "serial",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parallel-process" => Ok(ExecutionMode::ParallelProcess),
            "parallel-thread" => Ok(ExecutionMode::ParallelThread),
            "serial" => Ok(ExecutionMode::Serial),
            other => Err(ValidationError::InvalidArgument(format!(
                "unknown execution mode '{other}' (expected parallel-process, parallel-thread or serial)"
            ))),
        }
    }
}

/// Produces the observables for one sample directory.
pub trait Simulator: Send + Sync {
    fn simulate(&self, sample_dir: &Path, params: &ParameterRecord) -> Result<(), BoxError>;

    /// True when each call runs in its own OS process.
    fn runs_out_of_process(&self) -> bool {
        false
    }
}

impl<F> Simulator for F
where
    F: Fn(&Path, &ParameterRecord) -> Result<(), BoxError> + Send + Sync,
{
    fn simulate(&self, sample_dir: &Path, params: &ParameterRecord) -> Result<(), BoxError> {
        self(sample_dir, params)
    }
}

/// Runs `program args.. <sample_dir>` once per sample.
///
/// The parameter record is already on disk in the sample directory when the
/// command starts.
#[derive(Debug, Clone)]
pub struct CommandSimulator {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSimulator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Simulator for CommandSimulator {
    fn simulate(&self, sample_dir: &Path, _params: &ParameterRecord) -> Result<(), BoxError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(sample_dir)
            .status()?;
        if !status.success() {
            return Err(format!("'{}' exited with {status}", self.program).into());
        }
        Ok(())
    }

    fn runs_out_of_process(&self) -> bool {
        true
    }
}

/// A sample whose simulation failed. The directory and marker stay on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationFailure {
    pub index: usize,
    pub directory: PathBuf,
    pub message: String,
}

/// Bookkeeping written to `{root}/dataset.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub created_at: DateTime<Utc>,
    pub marker: String,
    pub parameter_names: Vec<String>,
    pub sample_count: usize,
    pub mode: ExecutionMode,
    /// BLAKE3 of the sampled points.
    pub samples_hash: String,
    pub failures: Vec<SimulationFailure>,
}

impl DatasetManifest {
    pub fn load(root: &Path) -> Result<Self, DatasetError> {
        let path = root.join(DATASET_MANIFEST);
        let content = std::fs::read_to_string(&path).map_err(io_err(&path))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, root: &Path) -> Result<(), DatasetError> {
        let path = root.join(DATASET_MANIFEST);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(io_err(&path))
    }
}

/// Builds a dataset directory tree from a sample set.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    root: PathBuf,
    marker: String,
    mode: ExecutionMode,
    workers: Option<usize>,
}

impl DatasetBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            marker: DEFAULT_MARKER.to_string(),
            mode: ExecutionMode::default(),
            workers: None,
        }
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Worker cap for the parallel modes. `None` uses rayon's default.
    pub fn workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn sample_dir(&self, index: usize) -> PathBuf {
        self.root.join(format!("sample_{index:05}"))
    }

    /// Create every sample directory and write its marker file.
    pub fn prepare_directories(&self, samples: &SampleSet) -> Result<Vec<PathBuf>, DatasetError> {
        if self.marker.is_empty() {
            return Err(ValidationError::InvalidArgument("marker file name must not be empty".into()).into());
        }
        if samples.is_empty() {
            return Err(ValidationError::InvalidArgument("sample set is empty".into()).into());
        }

        (0..samples.len())
            .map(|i| {
                let dir = self.sample_dir(i);
                std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;
                let marker_path = dir.join(&self.marker);
                std::fs::write(&marker_path, samples.record(i).to_json())
                    .map_err(io_err(&marker_path))?;
                Ok(dir)
            })
            .collect()
    }

    /// Prepare directories, run the simulator on each, and write the manifest.
    ///
    /// Simulator failures are recorded in the manifest and do not stop the
    /// other samples.
    pub fn generate(
        &self,
        samples: &SampleSet,
        simulator: &dyn Simulator,
    ) -> Result<DatasetManifest, DatasetError> {
        if self.mode == ExecutionMode::ParallelProcess && !simulator.runs_out_of_process() {
            return Err(ValidationError::InvalidArgument(
                "parallel-process mode needs a simulator that runs an external command".into(),
            )
            .into());
        }

        let dirs = self.prepare_directories(samples)?;
        tracing::info!(
            root = %self.root.display(),
            samples = dirs.len(),
            mode = %self.mode,
            "generating dataset"
        );

        let run_one = |(i, dir): (usize, &PathBuf)| -> Option<SimulationFailure> {
            match simulator.simulate(dir, &samples.record(i)) {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(sample = %dir.display(), error = %e, "simulation failed");
                    Some(SimulationFailure {
                        index: i,
                        directory: dir.clone(),
                        message: e.to_string(),
                    })
                }
            }
        };

        let failures: Vec<SimulationFailure> = match self.mode {
            ExecutionMode::Serial => dirs.iter().enumerate().filter_map(run_one).collect(),
            ExecutionMode::ParallelThread | ExecutionMode::ParallelProcess => {
                let mut pool = rayon::ThreadPoolBuilder::new();
                if let Some(n) = self.workers {
                    pool = pool.num_threads(n);
                }
                // Indexed collect keeps failures in sample order.
                pool.build()?
                    .install(|| dirs.par_iter().enumerate().filter_map(run_one).collect())
            }
        };

        let manifest = DatasetManifest {
            created_at: Utc::now(),
            marker: self.marker.clone(),
            parameter_names: samples.names.clone(),
            sample_count: samples.len(),
            mode: self.mode,
            samples_hash: samples.content_hash(),
            failures,
        };
        manifest.save(&self.root)?;

        if !manifest.failures.is_empty() {
            tracing::warn!(
                failed = manifest.failures.len(),
                total = manifest.sample_count,
                "some simulations failed"
            );
        }
        Ok(manifest)
    }
}
