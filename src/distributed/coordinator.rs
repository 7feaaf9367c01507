//! Distributed coordinator
//!
//! The coordinator is worker 0 of the run. It:
//! - Connects to every remote worker
//! - Sends each worker its plan (idle workers are released right away)
//! - Queues every non-local partition on its owner's link
//! - Reduces its own partitions while the remote workers compute
//! - Aggregates the records in partition order
//!
//! Each active link is served by two tasks: a sender that drains the link's
//! outbound queue onto the socket, and a gatherer that reads exactly as many
//! records as the worker was assigned. Any failure on either side aborts the
//! whole run with a transfer error.

use crate::coordinator::assignment::{assign, WorkerAssignment};
use crate::dataset::Dataset;
use crate::distributed::protocol::*;
use crate::error::StatsError;
use crate::stats::aggregator::{ResultAggregator, ResultTable};
use crate::stats::{reduce, ClassificationThresholds, StatisticsRecord};
use crate::transfer::message::MessageTransfer;
use crate::transfer::Transfer;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Connection attempts per worker before giving up
pub const DEFAULT_CONNECT_ATTEMPTS: usize = 50;

/// Delay between connection attempts
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

type RecordResult = std::result::Result<StatisticsRecord, StatsError>;

/// Distributed coordinator
///
/// Orchestrates one run across the local process and the remote workers.
pub struct DistributedCoordinator {
    /// Remote worker addresses (IP:port); worker `i + 1` is `worker_addresses[i]`
    worker_addresses: Vec<String>,

    thresholds: ClassificationThresholds,

    connect_attempts: usize,
}

impl DistributedCoordinator {
    /// Create a new distributed coordinator
    ///
    /// With no addresses the coordinator is the only worker.
    pub fn new(worker_addresses: Vec<String>, thresholds: ClassificationThresholds) -> Self {
        Self {
            worker_addresses,
            thresholds,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        }
    }

    /// Override how many times each worker connection is attempted
    pub fn with_connect_attempts(mut self, attempts: usize) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    /// Total workers, counting the coordinator
    pub fn num_workers(&self) -> usize {
        self.worker_addresses.len() + 1
    }

    /// Run the distributed computation
    pub async fn run(&self, dataset: &Dataset) -> Result<ResultTable> {
        let num_workers = self.num_workers();
        let assignment = assign(dataset.len(), num_workers)?;

        info!(
            partitions = dataset.len(),
            workers = num_workers,
            active = assignment.active_workers().len(),
            "Starting distributed run"
        );

        let streams = self.connect_all().await?;

        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<RecordResult>();
        let mut transfer = MessageTransfer::new(dataset.partition_length());
        let mut tasks = Vec::new();

        for (worker_id, stream) in streams {
            let owned = assignment.partitions_for(worker_id);
            let mut stream = stream;

            let plan = self.plan_for(worker_id, &assignment, dataset);
            write_message(&mut stream, &Message::Plan(plan)).await
                .map_err(|e| StatsError::link(format!("failed to send plan to worker {}: {:#}", worker_id, e)))?;

            if assignment.is_idle(worker_id) {
                debug!(worker = worker_id, "Worker idle, releasing link");
                continue;
            }

            let (reader, writer) = stream.into_split();
            let (queue_tx, queue_rx) = mpsc::unbounded_channel();
            transfer.connect(worker_id, queue_tx);

            tasks.push(tokio::spawn(send_loop(worker_id, writer, queue_rx, results_tx.clone())));
            tasks.push(tokio::spawn(gather_loop(worker_id, reader, owned, results_tx.clone())));
        }
        drop(results_tx);
        debug!(links = transfer.num_links(), "Remote links open");

        let outcome = self
            .drive(dataset, &assignment, &mut transfer, &mut results_rx)
            .await;

        match outcome {
            Ok(aggregator) => {
                for task in tasks {
                    task.await
                        .map_err(|e| StatsError::link(format!("link task failed: {}", e)))?;
                }
                Ok(aggregator.finish()?)
            }
            Err(e) => {
                for task in &tasks {
                    task.abort();
                }
                Err(e.into())
            }
        }
    }

    /// Deliver, reduce locally, then gather until every slot is filled
    async fn drive(
        &self,
        dataset: &Dataset,
        assignment: &WorkerAssignment,
        transfer: &mut MessageTransfer,
        results: &mut UnboundedReceiver<RecordResult>,
    ) -> std::result::Result<ResultAggregator, StatsError> {
        for worker_id in assignment.active_workers().into_iter().filter(|&w| w != 0) {
            for partition_id in assignment.partitions_for(worker_id) {
                let partition = dataset
                    .partition(partition_id)
                    .ok_or_else(|| StatsError::transfer(partition_id, "partition is not loaded"))?;
                transfer.deliver(partition, worker_id)?;
            }
        }
        debug!(delivered = transfer.delivered(), "Partitions queued for remote workers");
        transfer.close();

        let mut aggregator = ResultAggregator::new(dataset.len());

        for partition_id in assignment.partitions_for(0) {
            let partition = dataset
                .partition(partition_id)
                .ok_or_else(|| StatsError::transfer(partition_id, "partition is not loaded"))?;
            aggregator.insert(reduce(partition, &self.thresholds)?)?;
        }
        debug!(
            local = aggregator.received(),
            expected = aggregator.expected(),
            "Local partitions reduced"
        );

        while !aggregator.is_complete() {
            match results.recv().await {
                Some(Ok(record)) => aggregator.insert(record)?,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(StatsError::link(format!(
                        "all links closed after {} of {} records, partitions {:?} outstanding",
                        aggregator.received(),
                        aggregator.expected(),
                        aggregator.missing()
                    )))
                }
            }
        }

        Ok(aggregator)
    }

    fn plan_for(&self, worker_id: usize, assignment: &WorkerAssignment, dataset: &Dataset) -> PlanMessage {
        PlanMessage {
            protocol_version: PROTOCOL_VERSION,
            worker_id,
            num_workers: assignment.num_workers(),
            partition_count: assignment.partitions_for(worker_id).len(),
            partition_length: dataset.partition_length(),
            thresholds: self.thresholds,
        }
    }

    /// Connect to every remote worker, in worker id order
    async fn connect_all(&self) -> Result<Vec<(usize, TcpStream)>> {
        let mut streams = Vec::with_capacity(self.worker_addresses.len());

        for (i, addr) in self.worker_addresses.iter().enumerate() {
            let worker_id = i + 1;
            debug!(worker = worker_id, %addr, "Connecting");

            let stream = connect_with_retry(addr, self.connect_attempts).await
                .map_err(|e| StatsError::link(format!("failed to connect to worker {} at {}: {}", worker_id, addr, e)))?;
            stream.set_nodelay(true)
                .with_context(|| format!("Failed to configure link to {}", addr))?;

            streams.push((worker_id, stream));
        }

        if !streams.is_empty() {
            info!(connected = streams.len(), "All remote workers connected");
        }
        Ok(streams)
    }
}

async fn connect_with_retry(addr: &str, attempts: usize) -> std::io::Result<TcpStream> {
    let mut attempt = 1;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) if attempt < attempts => {
                debug!(%addr, attempt, "Connect failed ({}), retrying", e);
                attempt += 1;
                sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Write queued partitions to one worker until the queue closes
async fn send_loop(
    worker_id: usize,
    mut writer: OwnedWriteHalf,
    mut queue: UnboundedReceiver<Message>,
    results: UnboundedSender<RecordResult>,
) {
    while let Some(msg) = queue.recv().await {
        if let Err(e) = write_message(&mut writer, &msg).await {
            warn!(worker = worker_id, "Send failed: {:#}", e);
            let _ = results.send(Err(StatsError::link(format!(
                "send to worker {} failed: {:#}",
                worker_id, e
            ))));
            return;
        }
    }
}

/// Read one record per owned partition from a worker
async fn gather_loop(
    worker_id: usize,
    mut reader: OwnedReadHalf,
    owned: Vec<usize>,
    results: UnboundedSender<RecordResult>,
) {
    for _ in 0..owned.len() {
        let outcome = match read_message(&mut reader).await {
            Ok(Message::Record(msg)) if owned.contains(&msg.record.partition_id) => Ok(msg.record),
            Ok(Message::Record(msg)) => Err(StatsError::transfer(
                msg.record.partition_id,
                format!("worker {} returned a partition it does not own", worker_id),
            )),
            Ok(Message::Error(msg)) => {
                let reason = format!("worker {} failed: {}", worker_id, msg.error);
                Err(match msg.partition_id {
                    Some(id) => StatsError::transfer(id, reason),
                    None => StatsError::link(reason),
                })
            }
            Ok(other) => Err(StatsError::link(format!(
                "unexpected message from worker {}: {:?}",
                worker_id, other
            ))),
            Err(e) => Err(StatsError::link(format!(
                "lost worker {} before all records arrived: {:#}",
                worker_id, e
            ))),
        };

        let failed = outcome.is_err();
        if results.send(outcome).is_err() || failed {
            return;
        }
    }
}
