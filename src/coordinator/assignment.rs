//! Partition assignment
//!
//! Partition `i` is owned by worker `i mod W`. With `W ≤ N` this is plain
//! round-robin: every worker gets at least one partition and none gets more
//! than `⌈N / W⌉`. With `W > N` partitions map one-to-one onto workers
//! `0..N-1` and the remaining workers stay idle.
//!
//! # Example
//!
//! ```
//! use partstat::coordinator::assignment::assign;
//!
//! let assignment = assign(5, 2).unwrap();
//! assert_eq!(assignment.partitions_for(0), vec![0, 2, 4]);
//! assert_eq!(assignment.partitions_for(1), vec![1, 3]);
//!
//! let sparse = assign(3, 5).unwrap();
//! assert_eq!(sparse.active_workers(), vec![0, 1, 2]);
//! assert!(sparse.partitions_for(4).is_empty());
//! ```

use crate::error::StatsError;

/// Mapping from partition id to owning worker id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAssignment {
    /// Owner of each partition, indexed by partition id
    owners: Vec<usize>,

    /// Total workers available (`W`)
    num_workers: usize,
}

/// Assign `num_partitions` partitions to `num_workers` workers
pub fn assign(num_partitions: usize, num_workers: usize) -> Result<WorkerAssignment, StatsError> {
    if num_workers == 0 {
        return Err(StatsError::Assignment("worker count must be at least 1".into()));
    }
    if num_partitions == 0 {
        return Err(StatsError::Assignment("partition count must be at least 1".into()));
    }

    let owners = (0..num_partitions).map(|id| id % num_workers).collect();

    Ok(WorkerAssignment {
        owners,
        num_workers,
    })
}

impl WorkerAssignment {
    /// Number of partitions (`N`)
    pub fn num_partitions(&self) -> usize {
        self.owners.len()
    }

    /// Number of workers (`W`), including idle ones
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Worker owning `partition_id`
    pub fn owner(&self, partition_id: usize) -> Option<usize> {
        self.owners.get(partition_id).copied()
    }

    /// Partitions owned by `worker_id`, ascending
    pub fn partitions_for(&self, worker_id: usize) -> Vec<usize> {
        self.owners
            .iter()
            .enumerate()
            .filter(|(_, &owner)| owner == worker_id)
            .map(|(id, _)| id)
            .collect()
    }

    /// Workers that own at least one partition, ascending
    pub fn active_workers(&self) -> Vec<usize> {
        (0..self.num_workers.min(self.owners.len())).collect()
    }

    /// Whether `worker_id` owns nothing and can terminate immediately
    pub fn is_idle(&self, worker_id: usize) -> bool {
        worker_id >= self.owners.len()
    }
}
