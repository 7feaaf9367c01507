//! Dataset loading
//!
//! A dataset is an ordered collection of named, equal-length partitions. It is
//! owned by the coordinator and never mutated after loading.
//!
//! # Sources
//!
//! - **CSV**: one header row, then `label,v1,...,vN` rows. The first column is a
//!   row label (a date in the weather datasets) and is ignored; the remaining
//!   header columns name the partitions.
//! - **Synthetic**: seeded normally-distributed samples, useful for benchmarking
//!   the substrates without a data file.

pub mod csv;
pub mod synthetic;

use crate::error::StatsError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Rows read from a CSV source when no length is configured
pub const DEFAULT_PARTITION_LENGTH: usize = 30;

/// One named, fixed-length sequence of samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub id: usize,
    pub name: String,
    pub values: Vec<f64>,
}

impl Partition {
    pub fn new(id: usize, name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            id,
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Where partitions come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSource {
    /// CSV file; the first `rows` data rows are read
    Csv {
        path: PathBuf,
        #[serde(default = "default_rows")]
        rows: usize,
    },
    /// Seeded generator; partition `i` is centered at `center + spread * i`
    Synthetic {
        partitions: usize,
        length: usize,
        #[serde(default)]
        seed: u64,
        #[serde(default = "default_center")]
        center: f64,
        #[serde(default = "default_spread")]
        spread: f64,
        #[serde(default = "default_stddev")]
        stddev: f64,
    },
}

fn default_rows() -> usize {
    DEFAULT_PARTITION_LENGTH
}

fn default_center() -> f64 {
    20.0
}

fn default_spread() -> f64 {
    8.0
}

fn default_stddev() -> f64 {
    3.0
}

impl DatasetSource {
    /// Short human-readable description for logs and reports
    pub fn describe(&self) -> String {
        match self {
            DatasetSource::Csv { path, rows } => {
                format!("csv {} ({} rows)", path.display(), rows)
            }
            DatasetSource::Synthetic {
                partitions,
                length,
                seed,
                ..
            } => format!("synthetic {}x{} (seed {})", partitions, length, seed),
        }
    }
}

/// Load a dataset from its source
///
/// Fails with [`StatsError::Load`] if the source is unreadable or malformed; no
/// worker is started on failure.
pub fn load(source: &DatasetSource) -> Result<Dataset, StatsError> {
    match source {
        DatasetSource::Csv { path, rows } => csv::load_csv(path, *rows),
        DatasetSource::Synthetic {
            partitions,
            length,
            seed,
            center,
            spread,
            stddev,
        } => synthetic::generate(&synthetic::SyntheticParams {
            partitions: *partitions,
            length: *length,
            seed: *seed,
            center: *center,
            spread: *spread,
            stddev: *stddev,
        }),
    }
}

/// Ordered, equal-length partitions
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    partitions: Vec<Partition>,
    partition_length: usize,
}

impl Dataset {
    /// Build a dataset, renumbering partitions by position
    ///
    /// Rejects an empty collection, empty partitions and partitions of differing
    /// lengths.
    pub fn new(partitions: Vec<Partition>) -> Result<Self, StatsError> {
        let first = partitions
            .first()
            .ok_or_else(|| StatsError::Load("dataset has no partitions".into()))?;
        let partition_length = first.len();

        if partition_length == 0 {
            return Err(StatsError::Load(format!(
                "partition '{}' has no values",
                first.name
            )));
        }

        let mut partitions = partitions;
        for (id, partition) in partitions.iter_mut().enumerate() {
            if partition.len() != partition_length {
                return Err(StatsError::Load(format!(
                    "partition '{}' has {} values, expected {}",
                    partition.name,
                    partition.len(),
                    partition_length
                )));
            }
            partition.id = id;
        }

        Ok(Self {
            partitions,
            partition_length,
        })
    }

    /// Number of partitions (`N`)
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Values per partition
    pub fn partition_length(&self) -> usize {
        self.partition_length
    }

    pub fn partition(&self, id: usize) -> Option<&Partition> {
        self.partitions.get(id)
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Partition> {
        self.partitions.iter()
    }

    /// Partition names in id order
    pub fn names(&self) -> Vec<&str> {
        self.partitions.iter().map(|p| p.name.as_str()).collect()
    }

    /// Replace partition names
    pub fn rename(&mut self, names: &[String]) -> Result<(), StatsError> {
        if names.len() != self.partitions.len() {
            return Err(StatsError::Load(format!(
                "{} partition names given for {} partitions",
                names.len(),
                self.partitions.len()
            )));
        }
        for (partition, name) in self.partitions.iter_mut().zip(names) {
            partition.name = name.clone();
        }
        Ok(())
    }
}
