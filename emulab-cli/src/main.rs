//! emulab CLI: sample, tabulate and validate emulator datasets.
//!
//! Commands:
//! - `sample`: draw parameter points and build a dataset tree, optionally
//!   running a simulator command per sample
//! - `table`: flatten a dataset tree into parquet, with optional min/max
//!   normalization and a train/test split
//! - `validate`: score an emulator against a dataset from a TOML config

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use emulab_runner::{
    format_percentile_table, load_table, run_validation, sample, save_report, train_test_split,
    write_parquet, CommandSimulator, DatasetBuilder, ExecutionMode, MinMaxScaler, ParameterSpace,
    SamplingMethod, ValidationConfig, ValidationReport,
};

#[derive(Parser)]
#[command(
    name = "emulab",
    about = "emulab: emulator validation and residual statistics",
    version
)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Halton,
    Lhs,
    Uniform,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw parameter samples and create one directory per sample.
    Sample {
        /// TOML file with [[parameters]] name/min/max entries.
        #[arg(long)]
        space: PathBuf,

        /// Number of samples.
        #[arg(long)]
        count: usize,

        #[arg(long, value_enum, default_value_t = Method::Halton)]
        method: Method,

        /// Seed for lhs and uniform sampling.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Leading Halton points to discard.
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Dataset root directory.
        #[arg(long)]
        out: PathBuf,

        /// Marker file written into each sample directory.
        #[arg(long, default_value = "params.json")]
        marker: String,

        /// Simulator command; the sample directory is appended as last argument.
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        command: Vec<String>,

        /// parallel-process, parallel-thread or serial.
        #[arg(long, default_value = "parallel-process")]
        mode: ExecutionMode,

        /// Maximum concurrent simulations. Defaults to the CPU count.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Flatten a dataset tree into a parquet table.
    Table {
        #[arg(long)]
        root: PathBuf,

        /// Parameter columns, comma separated.
        #[arg(long, value_delimiter = ',', required = true)]
        params: Vec<String>,

        /// Observable array file(s) inside each sample directory.
        #[arg(long = "observable")]
        observables: Vec<String>,

        #[arg(long, default_value = "params.json")]
        marker: String,

        /// Min/max scale every numeric column; writes scaler.json.
        #[arg(long, default_value_t = false)]
        normalize: bool,

        /// Hold out this fraction of rows as test.parquet.
        #[arg(long)]
        test_fraction: Option<f64>,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output directory.
        #[arg(long)]
        out: PathBuf,
    },
    /// Run a validation from a TOML config and print the error bands.
    Validate {
        #[arg(long)]
        config: PathBuf,

        /// Save report.json, CSVs and report.md under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Sample {
            space,
            count,
            method,
            seed,
            skip,
            out,
            marker,
            command,
            mode,
            workers,
        } => {
            let method = sampling_method(method, seed, skip);
            run_sample(&space, count, method, &out, marker, command, mode, workers)
        }
        Commands::Table {
            root,
            params,
            observables,
            marker,
            normalize,
            test_fraction,
            seed,
            out,
        } => run_table(&root, &params, &observables, &marker, normalize, test_fraction, seed, &out),
        Commands::Validate { config, output_dir } => run_validate(&config, output_dir.as_deref()),
    }
}

fn sampling_method(method: Method, seed: u64, skip: usize) -> SamplingMethod {
    match method {
        Method::Halton => SamplingMethod::Halton { skip },
        Method::Lhs => SamplingMethod::LatinHypercube { seed },
        Method::Uniform => SamplingMethod::Uniform { seed },
    }
}

#[allow(clippy::too_many_arguments)]
fn run_sample(
    space_path: &Path,
    count: usize,
    method: SamplingMethod,
    out: &Path,
    marker: String,
    command: Vec<String>,
    mode: ExecutionMode,
    workers: Option<usize>,
) -> Result<()> {
    let space = ParameterSpace::from_file(space_path)
        .with_context(|| format!("failed to load parameter space {}", space_path.display()))?;
    let samples = sample(&space, count, method)?;

    let builder = DatasetBuilder::new(out)
        .marker(marker)
        .mode(mode)
        .workers(workers);

    let Some((program, args)) = command.split_first() else {
        let dirs = builder.prepare_directories(&samples)?;
        println!("Prepared {} sample directories under {}", dirs.len(), out.display());
        return Ok(());
    };

    let simulator = CommandSimulator::new(program.clone(), args.to_vec());
    let manifest = builder.generate(&samples, &simulator)?;

    println!(
        "Generated {} samples under {} ({} failed)",
        manifest.sample_count,
        out.display(),
        manifest.failures.len()
    );
    for failure in &manifest.failures {
        eprintln!("  {}: {}", failure.directory.display(), failure.message);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_table(
    root: &Path,
    params: &[String],
    observables: &[String],
    marker: &str,
    normalize: bool,
    test_fraction: Option<f64>,
    seed: u64,
    out: &Path,
) -> Result<()> {
    let mut df = load_table(root, marker, params, observables)?;
    std::fs::create_dir_all(out)
        .with_context(|| format!("failed to create output dir {}", out.display()))?;

    if normalize {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|s| s != "sample")
            .collect();
        let scaler = MinMaxScaler::fit(&df, &columns)?;
        df = scaler.transform(&df)?;
        let json = serde_json::to_string_pretty(&scaler)?;
        std::fs::write(out.join("scaler.json"), json)?;
    }

    match test_fraction {
        Some(fraction) => {
            let (mut train, mut test) = train_test_split(&df, fraction, seed)?;
            write_parquet(&mut train, &out.join("train.parquet"))?;
            write_parquet(&mut test, &out.join("test.parquet"))?;
            println!(
                "Wrote {} train / {} test rows to {}",
                train.height(),
                test.height(),
                out.display()
            );
        }
        None => {
            write_parquet(&mut df, &out.join("table.parquet"))?;
            println!("Wrote {} rows to {}", df.height(), out.display());
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path, output_dir: Option<&Path>) -> Result<()> {
    let config = ValidationConfig::from_file(config_path)?;
    let report = run_validation(&config)?;

    print_summary(&report);

    if let Some(dir) = output_dir {
        let run_dir = save_report(&report, dir)?;
        println!("Report saved to: {}", run_dir.display());
    }

    Ok(())
}

fn print_summary(report: &ValidationReport) {
    println!("Root:       {}", report.root.display());
    println!("Mode:       {:?}", report.mode);
    println!(
        "Samples:    {} processed / {} discovered",
        report.processed, report.discovered
    );
    println!("Features:   {}", report.n_features());
    println!();
    print!("{}", format_percentile_table(&report.percentiles));
    if !report.failures.is_empty() {
        println!();
        println!("{} sample(s) skipped; see the report for details", report.failures.len());
    }
}
