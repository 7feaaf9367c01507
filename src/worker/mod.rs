//! Shared-memory substrate
//!
//! A pool of threads computes the statistics against the coordinator's own
//! copy of the dataset. Nothing is copied: each worker thread reads its
//! partitions through borrowed views.
//!
//! # Phases
//!
//! Every active worker thread runs the same two phases, separated by a barrier
//! that the coordinator thread also joins:
//!
//! 1. Accumulate min, max and sum for each owned partition and hand the
//!    moments to the coordinator
//! 2. After the barrier, read the published means and compute each owned
//!    partition's sum of squared deviations
//!
//! Between the phases the coordinator merges the moments (one owner per
//! partition, so the merge is exclusive) and publishes every mean exactly
//! once. No thread reads a mean before the barrier.
//!
//! The floating-point operations and their order are the same as in
//! [`crate::stats::reduce`], so results match the distributed substrate bit for
//! bit.
//!
//! # Example
//!
//! ```
//! use partstat::dataset::{Dataset, Partition};
//! use partstat::stats::ClassificationThresholds;
//! use partstat::worker::SharedMemoryEngine;
//!
//! let dataset = Dataset::new(vec![
//!     Partition::new(0, "A", vec![10.0, 20.0, 30.0]),
//!     Partition::new(1, "B", vec![31.0, 32.0, 33.0]),
//! ])?;
//!
//! let engine = SharedMemoryEngine::new(2, ClassificationThresholds::default());
//! let table = engine.run(&dataset)?;
//!
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.get(0).unwrap().mean, 20.0);
//! # Ok::<(), partstat::error::StatsError>(())
//! ```

use crate::coordinator::assignment::assign;
use crate::dataset::{Dataset, Partition};
use crate::error::StatsError;
use crate::stats::aggregator::{ResultAggregator, ResultTable};
use crate::stats::{sum_squared_deviations, ClassificationThresholds, Moments, StatisticsRecord};
use crate::transfer::{SharedMemoryTransfer, Transfer};
use crossbeam::channel::{self, Receiver};
use std::sync::{Barrier, OnceLock};
use std::thread;
use tracing::{debug, info};

/// Thread-pool engine over a shared dataset
#[derive(Debug, Clone)]
pub struct SharedMemoryEngine {
    num_workers: usize,
    thresholds: ClassificationThresholds,
}

impl SharedMemoryEngine {
    pub fn new(num_workers: usize, thresholds: ClassificationThresholds) -> Self {
        Self {
            num_workers,
            thresholds,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Compute the result table
    pub fn run(&self, dataset: &Dataset) -> Result<ResultTable, StatsError> {
        let assignment = assign(dataset.len(), self.num_workers)?;

        // Resolve every view up front so no thread starts on a partial plan
        let mut transfer = SharedMemoryTransfer::new(dataset, self.num_workers);
        let mut work: Vec<(usize, Vec<&Partition>)> = Vec::new();
        for worker_id in assignment.active_workers() {
            let mut owned = Vec::new();
            for partition_id in assignment.partitions_for(worker_id) {
                let partition = transfer.view(partition_id)?;
                transfer.deliver(partition, worker_id)?;
                owned.push(partition);
            }
            work.push((worker_id, owned));
        }

        info!(
            partitions = dataset.len(),
            workers = self.num_workers,
            threads = work.len(),
            "Starting shared-memory run"
        );

        let barrier = Barrier::new(work.len() + 1);
        let means: OnceLock<Vec<f64>> = OnceLock::new();
        let (moments_tx, moments_rx) = channel::unbounded::<(usize, Moments)>();
        let (ssd_tx, ssd_rx) = channel::unbounded::<(usize, f64)>();

        thread::scope(|scope| -> Result<ResultTable, StatsError> {
            let mut handles = Vec::with_capacity(work.len());

            for (worker_id, owned) in &work {
                let worker_id = *worker_id;
                let moments_tx = moments_tx.clone();
                let ssd_tx = ssd_tx.clone();
                let barrier = &barrier;
                let means = &means;

                handles.push(scope.spawn(move || {
                    for partition in owned {
                        let moments = Moments::accumulate(&partition.values);
                        if moments_tx.send((partition.id, moments)).is_err() {
                            break;
                        }
                    }
                    drop(moments_tx);

                    barrier.wait();

                    let published = means.get();
                    for partition in owned {
                        let Some(&mean) = published.and_then(|m| m.get(partition.id)) else {
                            continue;
                        };
                        let ssd = sum_squared_deviations(&partition.values, mean);
                        if ssd_tx.send((partition.id, ssd)).is_err() {
                            break;
                        }
                    }

                    debug!(worker = worker_id, partitions = owned.len(), "Worker finished");
                }));
            }
            drop(moments_tx);
            drop(ssd_tx);

            let merged = merge_moments(dataset.len(), &moments_rx);

            // Publish even on failure so the workers pass the barrier and exit
            let published = match &merged {
                Ok(slots) => slots.iter().map(|(_, mean)| *mean).collect(),
                Err(_) => Vec::new(),
            };
            let _ = means.set(published);
            barrier.wait();

            let finished = merged.and_then(|slots| self.finish(slots, &ssd_rx));

            for handle in handles {
                handle
                    .join()
                    .map_err(|_| StatsError::link("worker thread panicked"))?;
            }

            finished
        })
    }

    /// Combine moments with the deviation sums into the ordered table
    fn finish(
        &self,
        slots: Vec<(Moments, f64)>,
        ssd_rx: &Receiver<(usize, f64)>,
    ) -> Result<ResultTable, StatsError> {
        let mut aggregator = ResultAggregator::new(slots.len());

        for (partition_id, ssd) in ssd_rx.iter() {
            let (moments, _) = slots.get(partition_id).ok_or_else(|| {
                StatsError::transfer(partition_id, "deviation for a partition outside the dataset")
            })?;
            let record = StatisticsRecord::finish(partition_id, moments, ssd, &self.thresholds)?;
            aggregator.insert(record)?;
        }

        aggregator.finish()
    }
}

/// Gather first-phase moments into per-partition slots and compute the means
fn merge_moments(
    num_partitions: usize,
    moments_rx: &Receiver<(usize, Moments)>,
) -> Result<Vec<(Moments, f64)>, StatsError> {
    let mut slots: Vec<Option<Moments>> = vec![None; num_partitions];

    for (partition_id, moments) in moments_rx.iter() {
        let slot = slots.get_mut(partition_id).ok_or_else(|| {
            StatsError::transfer(partition_id, "moments for a partition outside the dataset")
        })?;
        slot.get_or_insert_with(Moments::new).merge(&moments);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(partition_id, slot)| {
            let moments = slot.ok_or_else(|| {
                StatsError::transfer(partition_id, "no worker reported this partition")
            })?;
            let mean = moments
                .mean()
                .ok_or(StatsError::DegenerateInput(partition_id))?;
            Ok((moments, mean))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{reduce, Classification};

    fn scenario_dataset() -> Dataset {
        Dataset::new(vec![
            Partition::new(0, "A", vec![10.0, 20.0, 30.0]),
            Partition::new(1, "B", vec![31.0, 32.0, 33.0]),
            Partition::new(2, "C", vec![5.0, 10.0, 12.0]),
        ])
        .unwrap()
    }

    fn expected(dataset: &Dataset) -> Vec<StatisticsRecord> {
        let t = ClassificationThresholds::default();
        dataset.iter().map(|p| reduce(p, &t).unwrap()).collect()
    }

    #[test]
    fn test_single_thread() {
        let dataset = scenario_dataset();
        let engine = SharedMemoryEngine::new(1, ClassificationThresholds::default());
        let table = engine.run(&dataset).unwrap();

        assert_eq!(table.records(), expected(&dataset).as_slice());
        let labels: Vec<Classification> = table.iter().map(|r| r.classification).collect();
        assert_eq!(
            labels,
            vec![Classification::Normal, Classification::Heatwave, Classification::ColdSnap]
        );
    }

    #[test]
    fn test_thread_per_partition() {
        let dataset = scenario_dataset();
        let engine = SharedMemoryEngine::new(3, ClassificationThresholds::default());
        assert_eq!(engine.run(&dataset).unwrap().records(), expected(&dataset).as_slice());
    }

    #[test]
    fn test_more_threads_than_partitions() {
        let dataset = scenario_dataset();
        let engine = SharedMemoryEngine::new(5, ClassificationThresholds::default());
        assert_eq!(engine.run(&dataset).unwrap().records(), expected(&dataset).as_slice());
    }

    #[test]
    fn test_bit_identical_to_reduce() {
        let partitions = (0..7)
            .map(|i| {
                let values = (0..30).map(|j| (i * 31 + j) as f64 * 0.37 - 4.1).collect();
                Partition::new(i, format!("p{}", i), values)
            })
            .collect();
        let dataset = Dataset::new(partitions).unwrap();
        let want = expected(&dataset);

        for workers in 1..=9 {
            let engine = SharedMemoryEngine::new(workers, ClassificationThresholds::default());
            let table = engine.run(&dataset).unwrap();
            for (got, want) in table.iter().zip(&want) {
                assert_eq!(got.mean.to_bits(), want.mean.to_bits(), "workers={}", workers);
                assert_eq!(got.stddev.to_bits(), want.stddev.to_bits(), "workers={}", workers);
            }
        }
    }

    #[test]
    fn test_constant_partitions_keep_mean_in_range() {
        let dataset = Dataset::new(
            [0.1, 13.1, 30.1]
                .iter()
                .enumerate()
                .map(|(i, &v)| Partition::new(i, format!("c{}", i), vec![v; 30]))
                .collect(),
        )
        .unwrap();

        let engine = SharedMemoryEngine::new(2, ClassificationThresholds::default());
        let table = engine.run(&dataset).unwrap();
        assert_eq!(table.records(), expected(&dataset).as_slice());
        for record in &table {
            assert_eq!(record.mean, record.min);
            assert_eq!(record.mean, record.max);
            assert_eq!(record.stddev, 0.0);
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let engine = SharedMemoryEngine::new(0, ClassificationThresholds::default());
        assert!(matches!(
            engine.run(&scenario_dataset()),
            Err(StatsError::Assignment(_))
        ));
    }

    #[test]
    fn test_merge_moments_missing_partition() {
        let (tx, rx) = channel::unbounded();
        tx.send((0, Moments::accumulate(&[1.0, 2.0]))).unwrap();
        drop(tx);

        let err = merge_moments(2, &rx).unwrap_err();
        assert_eq!(err, StatsError::transfer(1, "no worker reported this partition"));
    }
}
