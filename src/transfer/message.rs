//! Message-passing delivery
//!
//! Each remote worker has one outbound queue drained by the coordinator's link
//! task for that worker, which writes frames to the TCP stream in queue order.
//! Every frame carries its partition id, so the worker's reply can be matched
//! to the partition it was computed from.

use super::Transfer;
use crate::dataset::Partition;
use crate::distributed::protocol::{Message, PartitionMessage};
use crate::error::StatsError;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Point-to-point delivery over per-worker message queues
#[derive(Debug)]
pub struct MessageTransfer {
    /// Outbound queue per remote worker id
    links: HashMap<usize, UnboundedSender<Message>>,

    /// Agreed number of values per partition
    partition_length: usize,

    delivered: usize,
}

impl MessageTransfer {
    pub fn new(partition_length: usize) -> Self {
        Self {
            links: HashMap::new(),
            partition_length,
            delivered: 0,
        }
    }

    /// Register the outbound queue for a worker
    pub fn connect(&mut self, worker: usize, link: UnboundedSender<Message>) {
        self.links.insert(worker, link);
    }

    /// Number of connected workers
    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    /// Drop every queue so link tasks finish once their backlog is written
    pub fn close(&mut self) {
        self.links.clear();
    }
}

impl Transfer for MessageTransfer {
    fn deliver(&mut self, partition: &Partition, worker: usize) -> Result<(), StatsError> {
        if partition.len() != self.partition_length {
            return Err(StatsError::transfer(
                partition.id,
                format!(
                    "partition has {} values, links expect {}",
                    partition.len(),
                    self.partition_length
                ),
            ));
        }

        let link = self.links.get(&worker).ok_or_else(|| {
            StatsError::transfer(partition.id, format!("no link to worker {}", worker))
        })?;

        link.send(Message::Partition(PartitionMessage::from(partition)))
            .map_err(|_| {
                StatsError::transfer(partition.id, format!("link to worker {} is closed", worker))
            })?;

        self.delivered += 1;
        Ok(())
    }

    fn delivered(&self) -> usize {
        self.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_deliver_queues_partition() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transfer = MessageTransfer::new(2);
        transfer.connect(1, tx);

        let partition = Partition::new(4, "p", vec![1.5, 2.5]);
        transfer.deliver(&partition, 1).unwrap();
        assert_eq!(transfer.delivered(), 1);

        match rx.try_recv().unwrap() {
            Message::Partition(msg) => {
                assert_eq!(msg.partition_id, 4);
                assert_eq!(msg.values, vec![1.5, 2.5]);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_deliver_without_link() {
        let mut transfer = MessageTransfer::new(1);
        let partition = Partition::new(0, "p", vec![1.0]);
        assert!(matches!(
            transfer.deliver(&partition, 2),
            Err(StatsError::Transfer { partition: Some(0), .. })
        ));
    }

    #[test]
    fn test_deliver_wrong_length() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transfer = MessageTransfer::new(3);
        transfer.connect(1, tx);

        let partition = Partition::new(0, "p", vec![1.0]);
        assert!(transfer.deliver(&partition, 1).is_err());
        assert_eq!(transfer.delivered(), 0);
    }

    #[test]
    fn test_deliver_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut transfer = MessageTransfer::new(1);
        transfer.connect(1, tx);
        drop(rx);

        let partition = Partition::new(0, "p", vec![1.0]);
        assert!(transfer.deliver(&partition, 1).is_err());
    }

    #[test]
    fn test_close_drops_links() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transfer = MessageTransfer::new(1);
        transfer.connect(1, tx);
        assert_eq!(transfer.num_links(), 1);

        transfer.close();
        assert_eq!(transfer.num_links(), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
