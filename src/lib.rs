//! partstat - partitioned descriptive statistics
//!
//! partstat splits a dataset into equal-length partitions (one per city in the
//! weather datasets), computes min, max, mean and population standard deviation
//! for each partition, and classifies each one by its mean.
//!
//! # Architecture
//!
//! - **Two substrates, one result**: a shared-memory thread pool and a set of
//!   message-passing worker processes produce identical tables
//! - **Round-robin assignment**: partition `i` is owned by worker `i mod W`
//! - **Single reducer**: both substrates run the same arithmetic in the same
//!   order, so results match bit for bit
//! - **Ordered aggregation**: records land in partition-id slots regardless of
//!   arrival order

pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod distributed;
pub mod error;
pub mod output;
pub mod stats;
pub mod transfer;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use dataset::{Dataset, Partition};
pub use error::StatsError;
pub use stats::aggregator::ResultTable;
pub use stats::{Classification, ClassificationThresholds, StatisticsRecord};

/// Result type used throughout partstat
pub type Result<T> = anyhow::Result<T>;
