//! Coordinator module
//!
//! Owns a run from the loaded dataset to the finished result table: picks the
//! configured substrate, times it, and hands back the table with the run
//! metadata the reporters print.

pub mod assignment;

use crate::config::{Config, Substrate};
use crate::dataset::Dataset;
use crate::distributed::DistributedCoordinator;
use crate::stats::aggregator::ResultTable;
use crate::worker::SharedMemoryEngine;
use crate::Result;
use anyhow::Context;
use std::time::{Duration, Instant};
use tracing::info;

/// Finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub table: ResultTable,
    pub substrate: Substrate,
    /// Worker count `W`, idle workers included
    pub workers: usize,
    pub elapsed: Duration,
}

/// Compute the result table for `dataset` on the configured substrate
///
/// For the distributed substrate the remote workers must already be listening
/// at `config.engine.worker_addresses`.
pub fn run(config: &Config, dataset: &Dataset) -> Result<RunOutcome> {
    let substrate = config.engine.substrate;
    let thresholds = config.dataset.thresholds;
    let start = Instant::now();

    let (table, workers) = match substrate {
        Substrate::Threads => {
            let engine = SharedMemoryEngine::new(config.engine.resolved_workers(), thresholds);
            let table = engine.run(dataset)
                .context("Shared-memory run failed")?;
            (table, engine.num_workers())
        }
        Substrate::Distributed => {
            let coordinator = DistributedCoordinator::new(
                config.engine.worker_addresses.clone(),
                thresholds,
            );

            let runtime = tokio::runtime::Runtime::new()
                .context("Failed to create tokio runtime")?;
            let table = runtime.block_on(coordinator.run(dataset))
                .context("Distributed run failed")?;
            (table, coordinator.num_workers())
        }
    };

    let elapsed = start.elapsed();
    info!(
        %substrate,
        workers,
        partitions = table.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Run complete"
    );

    Ok(RunOutcome {
        table,
        substrate,
        workers,
        elapsed,
    })
}
