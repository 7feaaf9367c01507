//! Distributed mode protocol
//!
//! This module defines the messages exchanged between the coordinator (worker 0)
//! and remote worker processes. Messages are serialized with MessagePack
//! (rmp-serde).
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                     Worker
//!     |                              |
//!     |-------- PLAN(count) -------->|   count == 0: worker exits
//!     |                              |
//!     |-------- PARTITION(id) ------>|   worker blocks until the full frame arrives
//!     |<------- RECORD(id) ----------|
//!     |            ...               |
//! ```
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::dataset::Partition;
use crate::stats::{ClassificationThresholds, StatisticsRecord};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Coordinator and workers must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame accepted from the wire
pub const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Work plan (Coordinator → Worker)
    ///
    /// Tells the worker how many partitions to expect and how to classify them.
    Plan(PlanMessage),

    /// Partition payload (Coordinator → Worker)
    Partition(PartitionMessage),

    /// Statistics for one partition (Worker → Coordinator)
    Record(RecordMessage),

    /// Error report (Worker → Coordinator)
    ///
    /// The coordinator aborts the run.
    Error(ErrorMessage),
}

/// Work plan for one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMessage {
    /// Protocol version (must match)
    pub protocol_version: u32,

    /// Worker id assigned by the coordinator
    pub worker_id: usize,

    /// Total workers in the run, including the coordinator
    pub num_workers: usize,

    /// Partitions that will be delivered to this worker
    pub partition_count: usize,

    /// Values per partition
    pub partition_length: usize,

    pub thresholds: ClassificationThresholds,
}

/// One partition's raw data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionMessage {
    pub partition_id: usize,
    pub name: String,
    pub values: Vec<f64>,
}

impl From<&Partition> for PartitionMessage {
    fn from(partition: &Partition) -> Self {
        Self {
            partition_id: partition.id,
            name: partition.name.clone(),
            values: partition.values.clone(),
        }
    }
}

impl From<PartitionMessage> for Partition {
    fn from(msg: PartitionMessage) -> Self {
        Partition::new(msg.partition_id, msg.name, msg.values)
    }
}

/// Statistics computed by a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMessage {
    pub worker_id: usize,
    pub record: StatisticsRecord,
}

/// Error reported by a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub worker_id: usize,

    /// Partition being processed when the error occurred
    pub partition_id: Option<usize>,

    pub error: String,
}

/// Serialize a message to bytes
///
/// Prepends a 4-byte length field for framing.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg)
        .context("Failed to serialize message")?;

    let msg_len = u32::try_from(msg_bytes.len())
        .context("Message too large for length prefix")?;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Read one complete message
///
/// Blocks until the whole frame has arrived; a stream that ends mid-frame is an
/// error, never a partial message.
pub async fn read_message<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;

    if msg_len > MAX_MESSAGE_LEN {
        anyhow::bail!("Message too large: {} bytes (max {})", msg_len, MAX_MESSAGE_LEN);
    }

    let mut msg_buf = vec![0u8; msg_len];
    reader.read_exact(&mut msg_buf).await
        .context("Failed to read message body")?;

    let msg = rmp_serde::from_slice(&msg_buf)
        .context("Failed to deserialize message")?;

    Ok(msg)
}

/// Write a message and flush it
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;

    writer.write_all(&framed).await
        .context("Failed to write message")?;

    writer.flush().await
        .context("Failed to flush stream")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Classification;

    /// Write one message into a pipe and read it back from the other end
    async fn round_trip(msg: &Message) -> Message {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        write_message(&mut client, msg).await.unwrap();
        read_message(&mut server).await.unwrap()
    }

    #[tokio::test]
    async fn test_plan_round_trip() {
        let msg = Message::Plan(PlanMessage {
            protocol_version: PROTOCOL_VERSION,
            worker_id: 2,
            num_workers: 3,
            partition_count: 1,
            partition_length: 30,
            thresholds: ClassificationThresholds::default(),
        });

        match round_trip(&msg).await {
            Message::Plan(plan) => {
                assert_eq!(plan.protocol_version, PROTOCOL_VERSION);
                assert_eq!(plan.worker_id, 2);
                assert_eq!(plan.partition_count, 1);
                assert_eq!(plan.thresholds, ClassificationThresholds::default());
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[tokio::test]
    async fn test_partition_values_are_exact() {
        let partition = Partition::new(1, "La Paz", vec![0.1, 1.0 / 3.0, -7.25, 1e-300]);
        let msg = Message::Partition(PartitionMessage::from(&partition));

        match round_trip(&msg).await {
            Message::Partition(received) => {
                assert_eq!(Partition::from(received), partition);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[tokio::test]
    async fn test_record_round_trip() {
        let record = StatisticsRecord {
            partition_id: 2,
            min: 10.0,
            max: 30.0,
            mean: 20.0,
            stddev: 8.16496580927726,
            classification: Classification::Normal,
        };
        let msg = Message::Record(RecordMessage { worker_id: 2, record });

        match round_trip(&msg).await {
            Message::Record(received) => {
                assert_eq!(received.worker_id, 2);
                assert_eq!(received.record, record);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_message_framing() {
        let msg = Message::Error(ErrorMessage {
            worker_id: 1,
            partition_id: None,
            error: "boom".to_string(),
        });
        let bytes = serialize_message(&msg).unwrap();

        assert!(bytes.len() >= 4);
        let msg_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + msg_len);
    }

    #[tokio::test]
    async fn test_back_to_back_messages() {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);

        for id in 0..3 {
            let msg = Message::Partition(PartitionMessage {
                partition_id: id,
                name: format!("p{}", id),
                values: vec![id as f64; 4],
            });
            write_message(&mut client, &msg).await.unwrap();
        }

        for id in 0..3 {
            match read_message(&mut server).await.unwrap() {
                Message::Partition(received) => {
                    assert_eq!(received.partition_id, id);
                    assert_eq!(received.values, vec![id as f64; 4]);
                }
                _ => panic!("Wrong message type"),
            }
        }
    }

    #[tokio::test]
    async fn test_truncated_body_is_error() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let msg = Message::Partition(PartitionMessage {
            partition_id: 0,
            name: "a".to_string(),
            values: vec![1.0; 8],
        });
        let bytes = serialize_message(&msg).unwrap();
        client.write_all(&bytes[..bytes.len() - 1]).await.unwrap();
        drop(client);

        assert!(read_message(&mut server).await.is_err());
    }

    #[tokio::test]
    async fn test_truncated_length_is_error() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client.write_all(&[8, 0, 0]).await.unwrap();
        drop(client);

        assert!(read_message(&mut server).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let len = (MAX_MESSAGE_LEN as u32 + 1).to_le_bytes();
        client.write_all(&len).await.unwrap();

        assert!(read_message(&mut server).await.is_err());
    }
}
