//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::dataset::{self, Dataset, DatasetSource, DEFAULT_PARTITION_LENGTH};
use crate::error::StatsError;
use crate::stats::ClassificationThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Dataset read when nothing else is configured
pub const DEFAULT_DATASET_PATH: &str = "Weather_Data_Analyzer_Dataset.csv";

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load the configured dataset and apply any name override
    pub fn load_dataset(&self) -> Result<Dataset, StatsError> {
        let mut dataset = dataset::load(&self.dataset.source)?;
        if let Some(ref names) = self.dataset.names {
            dataset.rename(names)?;
        }
        Ok(dataset)
    }
}

/// Dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Where the partitions come from
    #[serde(default = "default_source")]
    pub source: DatasetSource,
    /// Partition names overriding the loader's names
    pub names: Option<Vec<String>>,
    /// Classification thresholds
    #[serde(default)]
    pub thresholds: ClassificationThresholds,
}

fn default_source() -> DatasetSource {
    DatasetSource::Csv {
        path: PathBuf::from(DEFAULT_DATASET_PATH),
        rows: DEFAULT_PARTITION_LENGTH,
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            names: None,
            thresholds: ClassificationThresholds::default(),
        }
    }
}

/// Execution substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Substrate {
    /// Shared-memory thread pool
    #[default]
    Threads,
    /// Worker processes reached over TCP
    Distributed,
}

impl fmt::Display for Substrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Substrate::Threads => write!(f, "threads"),
            Substrate::Distributed => write!(f, "distributed"),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub substrate: Substrate,
    /// Worker count; derived from the substrate when unset
    pub workers: Option<usize>,
    /// Remote worker addresses (IP:port), distributed substrate only
    #[serde(default)]
    pub worker_addresses: Vec<String>,
}

impl EngineConfig {
    /// Effective worker count `W`
    ///
    /// - threads: explicit count, else one per CPU
    /// - distributed: one more than the address list (the coordinator is
    ///   worker 0); with no addresses, the explicit count (local services are
    ///   launched for the rest) or 1
    pub fn resolved_workers(&self) -> usize {
        match self.substrate {
            Substrate::Threads => self.workers.unwrap_or_else(num_cpus::get),
            Substrate::Distributed if !self.worker_addresses.is_empty() => {
                self.worker_addresses.len() + 1
            }
            Substrate::Distributed => self.workers.unwrap_or(1),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report file path
    pub json_output: Option<PathBuf>,
    /// Suppress the text report
    #[serde(default)]
    pub quiet: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
    /// Validate and load, but do not compute
    #[serde(default)]
    pub dry_run: bool,
}
