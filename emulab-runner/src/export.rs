//! Report export: JSON, CSV and a Markdown summary.
//!
//! Persisted JSON carries `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use emulab_core::{FailureReason, PercentileMatrix, ResidualMatrix};

use crate::validation::{ValidationReport, SCHEMA_VERSION};

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &ValidationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ValidationReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ValidationReport> {
    let report: ValidationReport =
        serde_json::from_str(json).context("failed to deserialize ValidationReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

fn feature_header(first: &str, n_features: usize) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain((0..n_features).map(|j| format!("f{j}")))
        .collect()
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: location, f0..f{n-1}. One row per processed sample.
pub fn export_residuals_csv(matrix: &ResidualMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(feature_header("location", matrix.n_features()))?;
    for (row, location) in matrix.rows().zip(matrix.locations()) {
        let mut record = vec![location.display().to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    finish_csv(wtr)
}

/// Columns: percentile, f0..f{n-1}. One row per requested percentile.
pub fn export_percentiles_csv(bands: &PercentileMatrix) -> Result<String> {
    let (_, n_features) = bands.shape();
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(feature_header("percentile", n_features))?;
    for (p, values) in bands.percentiles.iter().zip(&bands.values) {
        let mut record = vec![p.to_string()];
        record.extend(values.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    finish_csv(wtr)
}

// ─── Markdown ───────────────────────────────────────────────────────

/// Human-readable summary of a report.
pub fn generate_report(report: &ValidationReport) -> String {
    let mut md = String::with_capacity(1024);

    md.push_str("# Validation Report\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Root | {} |\n", report.root.display()));
    md.push_str(&format!("| Created | {} |\n", report.created_at.to_rfc3339()));
    md.push_str(&format!("| Mode | {:?} |\n", report.mode));
    md.push_str(&format!("| Parameters | {} |\n", report.parameters.join(", ")));
    md.push_str(&format!(
        "| Samples | {} processed / {} discovered |\n",
        report.processed, report.discovered
    ));
    md.push_str(&format!("| Features | {} |\n", report.n_features()));
    md.push_str(&format!("| Residuals Hash | {} |\n", report.residuals_hash));
    md.push('\n');

    md.push_str("## Error Bands\n\n");
    md.push_str(&format_percentile_table(&report.percentiles));
    md.push('\n');

    if !report.failures.is_empty() {
        md.push_str("## Skipped Samples\n\n");
        for failure in &report.failures {
            let reason = match &failure.reason {
                FailureReason::DimensionMismatch { expected, found } => {
                    format!("expected {expected} residuals, found {found}")
                }
                FailureReason::Error { message, .. } => message.clone(),
            };
            md.push_str(&format!("- `{}`: {reason}\n", failure.location.display()));
        }
    }
    md
}

/// Percentile bands as a Markdown table, one row per percentile.
pub fn format_percentile_table(bands: &PercentileMatrix) -> String {
    let (_, n_features) = bands.shape();
    let mut out = String::new();
    out.push_str("| p |");
    for j in 0..n_features {
        out.push_str(&format!(" f{j} |"));
    }
    out.push_str("\n| --- |");
    out.push_str(&" --- |".repeat(n_features));
    out.push('\n');
    for (p, values) in bands.percentiles.iter().zip(&bands.values) {
        out.push_str(&format!("| {p} |"));
        for v in values {
            out.push_str(&format!(" {v:.4} |"));
        }
        out.push('\n');
    }
    out
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a validation run.
///
/// Creates `validation_{timestamp}/` under `output_dir` containing
/// `report.json`, `residuals.csv`, `percentiles.csv` and `report.md`.
/// Returns the created directory.
pub fn save_report(report: &ValidationReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "validation_{}",
        report.created_at.format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create report dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(
        run_dir.join("residuals.csv"),
        export_residuals_csv(&report.residuals)?,
    )?;
    std::fs::write(
        run_dir.join("percentiles.csv"),
        export_percentiles_csv(&report.percentiles)?,
    )?;
    std::fs::write(run_dir.join("report.md"), generate_report(report))?;

    tracing::info!(dir = %run_dir.display(), "saved validation report");
    Ok(run_dir)
}

/// Load a report from a directory written by [`save_report`].
pub fn load_report(dir: &Path) -> Result<ValidationReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
