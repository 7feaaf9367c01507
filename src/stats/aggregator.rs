//! Result aggregation
//!
//! Collects one [`StatisticsRecord`] per partition from whichever worker
//! produced it and reassembles them in partition order at the coordinator.
//!
//! Records may arrive in any order. Each one lands in the slot indexed by its
//! `partition_id`, so the finished table always iterates in ascending id order.
//! A [`ResultTable`] only exists once every slot is filled.
//!
//! # Example
//!
//! ```
//! use partstat::stats::{Classification, StatisticsRecord};
//! use partstat::stats::aggregator::ResultAggregator;
//!
//! let record = |id| StatisticsRecord {
//!     partition_id: id,
//!     min: 0.0,
//!     max: 0.0,
//!     mean: 0.0,
//!     stddev: 0.0,
//!     classification: Classification::ColdSnap,
//! };
//!
//! let mut aggregator = ResultAggregator::new(3);
//! for id in [2, 0, 1] {
//!     aggregator.insert(record(id)).unwrap();
//! }
//!
//! let table = aggregator.finish().unwrap();
//! let ids: Vec<usize> = table.iter().map(|r| r.partition_id).collect();
//! assert_eq!(ids, vec![0, 1, 2]);
//! ```

use crate::error::StatsError;
use crate::stats::StatisticsRecord;
use serde::Serialize;

/// Slot-indexed collector for per-partition records
///
/// # Usage
///
/// 1. Create with `new(num_partitions)`
/// 2. Feed records with `insert()` as they arrive
/// 3. Wait until `is_complete()`
/// 4. Take the table with `finish()`
#[derive(Debug)]
pub struct ResultAggregator {
    /// Slots indexed by partition id
    slots: Vec<Option<StatisticsRecord>>,

    /// Number of filled slots
    filled: usize,
}

impl ResultAggregator {
    /// Create an aggregator expecting `num_partitions` records
    pub fn new(num_partitions: usize) -> Self {
        Self {
            slots: vec![None; num_partitions],
            filled: 0,
        }
    }

    /// Insert a record into its partition's slot
    ///
    /// A record for an unknown partition or a second record for the same
    /// partition means deliveries were crossed, which is fatal.
    pub fn insert(&mut self, record: StatisticsRecord) -> Result<(), StatsError> {
        let id = record.partition_id;
        let slot = self.slots.get_mut(id).ok_or_else(|| {
            StatsError::transfer(id, "record for a partition outside the dataset")
        })?;

        if slot.is_some() {
            return Err(StatsError::transfer(id, "duplicate record"));
        }

        *slot = Some(record);
        self.filled += 1;
        Ok(())
    }

    /// Number of partitions expected
    pub fn expected(&self) -> usize {
        self.slots.len()
    }

    /// Number of records received so far
    pub fn received(&self) -> usize {
        self.filled
    }

    /// Whether every partition has a record
    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Partition ids still missing a record, ascending
    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// Consume the aggregator and return the complete table
    pub fn finish(self) -> Result<ResultTable, StatsError> {
        if !self.is_complete() {
            return Err(StatsError::link(format!(
                "aggregation incomplete, missing partitions {:?}",
                self.missing()
            )));
        }

        let records = self.slots.into_iter().flatten().collect();
        Ok(ResultTable { records })
    }
}

/// Complete, ordered per-partition results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTable {
    records: Vec<StatisticsRecord>,
}

impl ResultTable {
    /// Number of partitions
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for a partition
    pub fn get(&self, partition_id: usize) -> Option<&StatisticsRecord> {
        self.records.get(partition_id)
    }

    /// Records in ascending partition id order
    pub fn iter(&self) -> std::slice::Iter<'_, StatisticsRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[StatisticsRecord] {
        &self.records
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a StatisticsRecord;
    type IntoIter = std::slice::Iter<'a, StatisticsRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Classification;

    fn record(id: usize, mean: f64) -> StatisticsRecord {
        StatisticsRecord {
            partition_id: id,
            min: mean - 1.0,
            max: mean + 1.0,
            mean,
            stddev: 1.0,
            classification: Classification::Normal,
        }
    }

    #[test]
    fn test_aggregator_new() {
        let aggregator = ResultAggregator::new(3);
        assert_eq!(aggregator.expected(), 3);
        assert_eq!(aggregator.received(), 0);
        assert!(!aggregator.is_complete());
    }

    #[test]
    fn test_out_of_order_arrival() {
        let mut aggregator = ResultAggregator::new(3);
        aggregator.insert(record(2, 22.0)).unwrap();
        aggregator.insert(record(0, 20.0)).unwrap();
        aggregator.insert(record(1, 21.0)).unwrap();
        assert!(aggregator.is_complete());

        let table = aggregator.finish().unwrap();
        let ids: Vec<usize> = table.iter().map(|r| r.partition_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(table.get(2).unwrap().mean, 22.0);
    }

    #[test]
    fn test_incomplete_table_rejected() {
        let mut aggregator = ResultAggregator::new(3);
        aggregator.insert(record(1, 21.0)).unwrap();
        assert_eq!(aggregator.missing(), vec![0, 2]);

        let err = aggregator.finish().unwrap_err();
        assert!(matches!(err, StatsError::Transfer { partition: None, .. }));
    }

    #[test]
    fn test_duplicate_record_rejected() {
        let mut aggregator = ResultAggregator::new(2);
        aggregator.insert(record(0, 20.0)).unwrap();
        let err = aggregator.insert(record(0, 20.0)).unwrap_err();
        assert_eq!(err, StatsError::transfer(0, "duplicate record"));
        assert_eq!(aggregator.received(), 1);
    }

    #[test]
    fn test_unknown_partition_rejected() {
        let mut aggregator = ResultAggregator::new(2);
        assert!(aggregator.insert(record(5, 20.0)).is_err());
        assert_eq!(aggregator.received(), 0);
    }

    #[test]
    fn test_table_iteration() {
        let mut aggregator = ResultAggregator::new(2);
        aggregator.insert(record(1, 11.0)).unwrap();
        aggregator.insert(record(0, 10.0)).unwrap();
        let table = aggregator.finish().unwrap();

        assert_eq!(table.len(), 2);
        let means: Vec<f64> = (&table).into_iter().map(|r| r.mean).collect();
        assert_eq!(means, vec![10.0, 11.0]);
        assert!(table.get(2).is_none());
    }
}
