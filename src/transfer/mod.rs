//! Partition transfer
//!
//! Moves a partition from the coordinator to the worker that owns it. Both
//! substrates implement the same contract: once `deliver` returns `Ok`, the
//! destination worker either already holds the data or will block until the
//! whole payload has arrived before reducing it.
//!
//! - [`SharedMemoryTransfer`]: partitions are already resident and readable by
//!   every thread, so delivery only validates the request.
//! - [`message::MessageTransfer`]: partitions are framed and queued on the
//!   point-to-point link to the destination worker process.

pub mod message;

use crate::dataset::{Dataset, Partition};
use crate::error::StatsError;

/// Delivery of partitions to workers
pub trait Transfer {
    /// Make `partition` available to `worker`
    fn deliver(&mut self, partition: &Partition, worker: usize) -> Result<(), StatsError>;

    /// Partitions delivered so far
    fn delivered(&self) -> usize;
}

/// Shared-memory delivery: direct indexed access into the coordinator's dataset
#[derive(Debug)]
pub struct SharedMemoryTransfer<'a> {
    dataset: &'a Dataset,
    num_workers: usize,
    delivered: usize,
}

impl<'a> SharedMemoryTransfer<'a> {
    pub fn new(dataset: &'a Dataset, num_workers: usize) -> Self {
        Self {
            dataset,
            num_workers,
            delivered: 0,
        }
    }

    /// Read-only view of a resident partition
    pub fn view(&self, partition_id: usize) -> Result<&'a Partition, StatsError> {
        self.dataset
            .partition(partition_id)
            .ok_or_else(|| StatsError::transfer(partition_id, "partition is not resident"))
    }
}

impl Transfer for SharedMemoryTransfer<'_> {
    fn deliver(&mut self, partition: &Partition, worker: usize) -> Result<(), StatsError> {
        if worker >= self.num_workers {
            return Err(StatsError::transfer(
                partition.id,
                format!("worker {} outside pool of {}", worker, self.num_workers),
            ));
        }

        let resident = self.view(partition.id)?;
        if resident.len() != partition.len() {
            return Err(StatsError::transfer(
                partition.id,
                "resident copy differs from the requested partition",
            ));
        }

        self.delivered += 1;
        Ok(())
    }

    fn delivered(&self) -> usize {
        self.delivered
    }
}
