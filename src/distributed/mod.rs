//! Distributed substrate
//!
//! Statistics are computed by independent worker processes that share nothing
//! and communicate only through framed point-to-point messages.
//!
//! # Architecture
//!
//! - **Coordinator** (worker 0): loads the dataset, assigns partitions, ships
//!   each remote partition to its owner, reduces its own partitions locally and
//!   aggregates every record
//! - **Worker service**: runs in each remote process, receives its plan and
//!   partitions, reduces them and replies with one record per partition
//!
//! # Modules
//!
//! - `protocol`: Message definitions and framing
//! - `node_service`: Worker process
//! - `coordinator`: Coordinator side of a run

pub mod protocol;
pub mod node_service;
pub mod coordinator;

// Re-export key types
pub use protocol::{
    Message,
    PlanMessage,
    PartitionMessage,
    RecordMessage,
    ErrorMessage,
    PROTOCOL_VERSION,
};

pub use node_service::NodeService;
pub use coordinator::DistributedCoordinator;
