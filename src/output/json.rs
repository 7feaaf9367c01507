//! JSON output formatting
//!
//! One report per run: run metadata, the thresholds used, and one entry per
//! partition in id order.

use crate::config::Substrate;
use crate::coordinator::RunOutcome;
use crate::dataset::Dataset;
use crate::stats::{Classification, ClassificationThresholds};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub substrate: Substrate,
    pub workers: usize,
    pub elapsed_secs: f64,
    pub thresholds: ClassificationThresholds,
    pub partitions: Vec<JsonPartition>,
}

/// Statistics for one partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonPartition {
    pub id: usize,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub classification: Classification,
}

/// Build the report for a finished run
pub fn build_report(
    outcome: &RunOutcome,
    dataset: &Dataset,
    thresholds: &ClassificationThresholds,
) -> JsonReport {
    let partitions = outcome
        .table
        .iter()
        .map(|record| JsonPartition {
            id: record.partition_id,
            name: dataset
                .partition(record.partition_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            min: record.min,
            max: record.max,
            mean: record.mean,
            stddev: record.stddev,
            classification: record.classification,
        })
        .collect();

    JsonReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        substrate: outcome.substrate,
        workers: outcome.workers,
        elapsed_secs: outcome.elapsed.as_secs_f64(),
        thresholds: *thresholds,
        partitions,
    }
}

/// Serialize a report as pretty-printed JSON
pub fn to_json_string(report: &JsonReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize JSON report")
}

/// Write JSON output to file
pub fn write_results(
    output_path: &Path,
    outcome: &RunOutcome,
    dataset: &Dataset,
    thresholds: &ClassificationThresholds,
) -> Result<()> {
    let report = build_report(outcome, dataset, thresholds);

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report)
        .with_context(|| format!("Failed to write JSON output: {}", output_path.display()))?;

    Ok(())
}
