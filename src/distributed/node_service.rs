//! Worker service for distributed mode
//!
//! Each remote worker process runs one service. Per coordinator session it:
//! - Receives the work plan
//! - Terminates at once if the plan assigns it nothing
//! - Otherwise blocks on each partition payload, reduces it and replies with
//!   the record
//!
//! The service holds no state between partitions and never sees data it was
//! not sent.

use crate::dataset::Partition;
use crate::distributed::protocol::*;
use crate::error::StatsError;
use crate::stats::reduce;
use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Worker service
///
/// Accepts coordinator sessions on a TCP port.
pub struct NodeService {
    /// Port to listen on (0 picks an ephemeral port)
    listen_port: u16,

    /// Node identifier (hostname)
    node_id: String,
}

impl NodeService {
    /// Create a new worker service
    pub fn new(listen_port: u16) -> Result<Self> {
        let node_id = get_node_id()?;

        Ok(Self {
            listen_port,
            node_id,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("0.0.0.0:{}", self.listen_port);
        TcpListener::bind(&addr).await
            .with_context(|| format!("Failed to bind worker service on {}", addr))
    }

    /// Run the worker service
    ///
    /// Serves sessions until killed, or exactly one session when `once` is set
    /// (used for services launched for a single local run).
    pub async fn run(self, once: bool) -> Result<()> {
        let listener = self.bind().await?;

        info!(
            port = listener.local_addr()?.port(),
            node = %self.node_id(),
            "Worker service listening"
        );

        loop {
            match self.accept_one(&listener).await {
                Ok(count) => info!(partitions = count, "Session complete"),
                Err(e) if once => return Err(e),
                Err(e) => error!("Session failed: {:#}", e),
            }

            if once {
                return Ok(());
            }
        }
    }

    /// Serve a single coordinator session
    ///
    /// Returns the number of partitions reduced.
    pub async fn accept_one(&self, listener: &TcpListener) -> Result<usize> {
        let (stream, addr) = listener.accept().await
            .context("Failed to accept connection")?;

        debug!(%addr, "Coordinator connected");
        self.handle_session(stream).await
    }

    async fn handle_session(&self, mut stream: TcpStream) -> Result<usize> {
        let plan = match read_message(&mut stream).await.context("Failed to read plan")? {
            Message::Plan(plan) => plan,
            other => anyhow::bail!("Expected PLAN, got {:?}", other),
        };

        if plan.protocol_version != PROTOCOL_VERSION {
            let reason = format!(
                "Protocol version mismatch: coordinator={}, worker={}",
                plan.protocol_version, PROTOCOL_VERSION
            );
            self.report(&mut stream, plan.worker_id, None, &reason).await?;
            anyhow::bail!(reason);
        }

        info!(
            node = %self.node_id(),
            worker = plan.worker_id,
            of = plan.num_workers,
            partitions = plan.partition_count,
            length = plan.partition_length,
            "Received plan"
        );

        if plan.partition_count == 0 {
            debug!(worker = plan.worker_id, "Nothing assigned, exiting session");
            return Ok(0);
        }

        for _ in 0..plan.partition_count {
            let payload = match read_message(&mut stream).await {
                Ok(Message::Partition(payload)) => payload,
                Ok(other) => anyhow::bail!("Expected PARTITION, got {:?}", other),
                Err(e) => {
                    return Err(StatsError::link(format!(
                        "coordinator link lost while waiting for a partition: {:#}",
                        e
                    ))
                    .into())
                }
            };

            let partition_id = payload.partition_id;
            if payload.values.len() != plan.partition_length {
                let err = StatsError::transfer(
                    partition_id,
                    format!(
                        "received {} values, plan says {}",
                        payload.values.len(),
                        plan.partition_length
                    ),
                );
                self.report(&mut stream, plan.worker_id, Some(partition_id), &err.to_string()).await?;
                return Err(err.into());
            }

            let partition = Partition::from(payload);
            let record = match reduce(&partition, &plan.thresholds) {
                Ok(record) => record,
                Err(err) => {
                    self.report(&mut stream, plan.worker_id, Some(partition_id), &err.to_string()).await?;
                    return Err(err.into());
                }
            };

            debug!(partition = partition_id, mean = record.mean, "Reduced partition");

            let reply = RecordMessage {
                worker_id: plan.worker_id,
                record,
            };
            write_message(&mut stream, &Message::Record(reply)).await
                .with_context(|| format!("Failed to send record for partition {}", partition_id))?;
        }

        Ok(plan.partition_count)
    }

    /// Send an ERROR message to the coordinator
    async fn report(
        &self,
        stream: &mut TcpStream,
        worker_id: usize,
        partition_id: Option<usize>,
        reason: &str,
    ) -> Result<()> {
        warn!(worker = worker_id, ?partition_id, "{}", reason);

        let error = ErrorMessage {
            worker_id,
            partition_id,
            error: format!("{}: {}", self.node_id, reason),
        };
        write_message(stream, &Message::Error(error)).await
    }
}

/// Get node identifier (hostname)
fn get_node_id() -> Result<String> {
    if let Ok(hostname) = hostname::get() {
        if let Ok(hostname_str) = hostname.into_string() {
            return Ok(hostname_str);
        }
    }

    Ok("unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{ClassificationThresholds, Classification};

    async fn start_service() -> (String, tokio::task::JoinHandle<Result<usize>>) {
        let service = NodeService::new(0).unwrap();
        let listener = service.bind().await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move { service.accept_one(&listener).await });
        (format!("127.0.0.1:{}", port), handle)
    }

    fn plan(count: usize, length: usize) -> Message {
        Message::Plan(PlanMessage {
            protocol_version: PROTOCOL_VERSION,
            worker_id: 1,
            num_workers: 2,
            partition_count: count,
            partition_length: length,
            thresholds: ClassificationThresholds::default(),
        })
    }

    #[test]
    fn test_get_node_id() {
        let node_id = get_node_id().unwrap();
        assert!(!node_id.is_empty());
    }

    #[tokio::test]
    async fn test_session_reduces_partitions() {
        let (addr, handle) = start_service().await;
        let mut stream = TcpStream::connect(&addr).await.unwrap();

        write_message(&mut stream, &plan(2, 3)).await.unwrap();
        for (id, values) in [(1, vec![31.0, 32.0, 33.0]), (3, vec![10.0, 20.0, 30.0])] {
            let payload = PartitionMessage {
                partition_id: id,
                name: format!("p{}", id),
                values,
            };
            write_message(&mut stream, &Message::Partition(payload)).await.unwrap();
        }

        let mut records = Vec::new();
        for _ in 0..2 {
            match read_message(&mut stream).await.unwrap() {
                Message::Record(msg) => {
                    assert_eq!(msg.worker_id, 1);
                    records.push(msg.record);
                }
                other => panic!("Wrong message type: {:?}", other),
            }
        }

        assert_eq!(records[0].partition_id, 1);
        assert_eq!(records[0].classification, Classification::Heatwave);
        assert_eq!(records[1].partition_id, 3);
        assert_eq!(records[1].mean, 20.0);

        assert_eq!(handle.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_idle_worker_exits_without_data() {
        let (addr, handle) = start_service().await;
        let mut stream = TcpStream::connect(&addr).await.unwrap();

        write_message(&mut stream, &plan(0, 30)).await.unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_protocol_version_mismatch() {
        let (addr, handle) = start_service().await;
        let mut stream = TcpStream::connect(&addr).await.unwrap();

        let msg = Message::Plan(PlanMessage {
            protocol_version: PROTOCOL_VERSION + 1,
            worker_id: 1,
            num_workers: 2,
            partition_count: 1,
            partition_length: 3,
            thresholds: ClassificationThresholds::default(),
        });
        write_message(&mut stream, &msg).await.unwrap();

        match read_message(&mut stream).await.unwrap() {
            Message::Error(err) => assert!(err.error.contains("Protocol version mismatch")),
            other => panic!("Wrong message type: {:?}", other),
        }
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_short_partition_reported() {
        let (addr, handle) = start_service().await;
        let mut stream = TcpStream::connect(&addr).await.unwrap();

        write_message(&mut stream, &plan(1, 3)).await.unwrap();
        let payload = PartitionMessage {
            partition_id: 1,
            name: "p1".to_string(),
            values: vec![1.0],
        };
        write_message(&mut stream, &Message::Partition(payload)).await.unwrap();

        match read_message(&mut stream).await.unwrap() {
            Message::Error(err) => assert_eq!(err.partition_id, Some(1)),
            other => panic!("Wrong message type: {:?}", other),
        }

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StatsError>(),
            Some(StatsError::Transfer { partition: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_coordinator_disconnect_is_transfer_error() {
        let (addr, handle) = start_service().await;
        let mut stream = TcpStream::connect(&addr).await.unwrap();

        write_message(&mut stream, &plan(1, 3)).await.unwrap();
        drop(stream);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StatsError>(),
            Some(StatsError::Transfer { partition: None, .. })
        ));
    }
}
