//! Per-partition statistics
//!
//! The reducer computes min, max, mean and population standard deviation for a
//! single partition and labels it against the classification thresholds.
//!
//! The computation is split into two passes so that callers with a phase
//! barrier (the shared-memory engine) perform exactly the same floating-point
//! operations, in the same order, as the single-call [`reduce`]:
//!
//! 1. [`Moments::accumulate`] - running min, max and sum in index order
//! 2. [`sum_squared_deviations`] - `Σ(x - mean)²` in index order
//! 3. [`StatisticsRecord::finish`] - divides, takes the square root, classifies
//!
//! # Example
//!
//! ```
//! use partstat::dataset::Partition;
//! use partstat::stats::{reduce, Classification, ClassificationThresholds};
//!
//! let partition = Partition::new(0, "sample", vec![10.0, 20.0, 30.0]);
//! let record = reduce(&partition, &ClassificationThresholds::default()).unwrap();
//!
//! assert_eq!(record.min, 10.0);
//! assert_eq!(record.max, 30.0);
//! assert_eq!(record.mean, 20.0);
//! assert!((record.stddev - 8.164965809).abs() < 1e-6);
//! assert_eq!(record.classification, Classification::Normal);
//! ```

pub mod aggregator;

use crate::dataset::Partition;
use crate::error::StatsError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean above which a partition is a heatwave
pub const DEFAULT_HEATWAVE_ABOVE: f64 = 30.0;

/// Mean below which a partition is a cold snap
pub const DEFAULT_COLD_BELOW: f64 = 13.0;

/// Classification thresholds applied to a partition's mean
///
/// Both comparisons are strict, so a mean exactly on a threshold is `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    #[serde(default = "default_heatwave_above")]
    pub heatwave_above: f64,
    #[serde(default = "default_cold_below")]
    pub cold_below: f64,
}

fn default_heatwave_above() -> f64 {
    DEFAULT_HEATWAVE_ABOVE
}

fn default_cold_below() -> f64 {
    DEFAULT_COLD_BELOW
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            heatwave_above: DEFAULT_HEATWAVE_ABOVE,
            cold_below: DEFAULT_COLD_BELOW,
        }
    }
}

impl ClassificationThresholds {
    /// Classify a mean
    ///
    /// Heatwave is checked first, so a partition can never be both.
    pub fn classify(&self, mean: f64) -> Classification {
        if mean > self.heatwave_above {
            Classification::Heatwave
        } else if mean < self.cold_below {
            Classification::ColdSnap
        } else {
            Classification::Normal
        }
    }
}

/// Threshold label for a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Normal,
    Heatwave,
    ColdSnap,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Normal => write!(f, "normal"),
            Classification::Heatwave => write!(f, "heatwave"),
            Classification::ColdSnap => write!(f, "cold_snap"),
        }
    }
}

/// First-pass accumulator: count, min, max and sum
///
/// Moments from disjoint slices of the same partition combine with
/// [`Moments::merge`]. The merge is associative, so per-thread accumulators can
/// be combined by a single thread after a join in any grouping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

impl Moments {
    /// Empty accumulator (identity for `merge`)
    pub fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
        }
    }

    /// Accumulate a slice in index order
    pub fn accumulate(values: &[f64]) -> Self {
        let mut moments = Self::new();
        for &value in values {
            moments.push(value);
        }
        moments
    }

    /// Add a single value
    #[inline]
    pub fn push(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.sum += value;
        self.count += 1;
    }

    /// Combine with moments from another slice of the same partition
    pub fn merge(&mut self, other: &Moments) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Arithmetic mean, or `None` when nothing was accumulated
    ///
    /// Clamped to `[min, max]`: the rounded sum of a constant run can land one
    /// ulp outside the range.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            let mean = self.sum / self.count as f64;
            Some(mean.max(self.min).min(self.max))
        }
    }
}

impl Default for Moments {
    fn default() -> Self {
        Self::new()
    }
}

/// Second pass: sum of squared deviations from `mean`, in index order
pub fn sum_squared_deviations(values: &[f64], mean: f64) -> f64 {
    let mut acc = 0.0;
    for &value in values {
        let diff = value - mean;
        acc += diff * diff;
    }
    acc
}

/// Statistics for one partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub partition_id: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub classification: Classification,
}

impl StatisticsRecord {
    /// Build the record from both passes
    ///
    /// `sum_sq_dev` must have been computed against `moments.mean()`.
    pub fn finish(
        partition_id: usize,
        moments: &Moments,
        sum_sq_dev: f64,
        thresholds: &ClassificationThresholds,
    ) -> Result<Self, StatsError> {
        let mean = moments
            .mean()
            .ok_or(StatsError::DegenerateInput(partition_id))?;
        // Population standard deviation: divisor is the full length
        let stddev = (sum_sq_dev / moments.count as f64).sqrt();

        Ok(Self {
            partition_id,
            min: moments.min,
            max: moments.max,
            mean,
            stddev,
            classification: thresholds.classify(mean),
        })
    }
}

/// Reduce one partition to its statistics record
///
/// Pure and free of shared state, so distinct partitions can be reduced
/// concurrently without synchronization.
pub fn reduce(
    partition: &Partition,
    thresholds: &ClassificationThresholds,
) -> Result<StatisticsRecord, StatsError> {
    if partition.values.is_empty() {
        return Err(StatsError::DegenerateInput(partition.id));
    }

    let moments = Moments::accumulate(&partition.values);
    let mean = moments
        .mean()
        .ok_or(StatsError::DegenerateInput(partition.id))?;
    let sum_sq_dev = sum_squared_deviations(&partition.values, mean);

    StatisticsRecord::finish(partition.id, &moments, sum_sq_dev, thresholds)
}
