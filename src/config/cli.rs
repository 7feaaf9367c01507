//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Run mode (default) - compute on this machine with the chosen substrate
    Run,
    /// Coordinator mode - drive remote worker services
    Coordinator,
    /// Service mode - run a worker service (accepts coordinator sessions)
    Service,
}

/// Execution substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubstrateType {
    /// Shared-memory thread pool
    Threads,
    /// Worker processes over TCP
    Distributed,
}

/// partstat - partitioned descriptive statistics
#[derive(Parser, Debug)]
#[command(name = "partstat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: run, coordinator, or service
    #[arg(long, value_enum, default_value = "run")]
    pub mode: ExecutionMode,

    /// Port for service to listen on (service mode only)
    #[arg(long, default_value = "9999")]
    pub listen_port: u16,

    /// Serve a single coordinator session and exit (service mode only)
    #[arg(long)]
    pub once: bool,

    /// Comma-separated list of worker addresses for coordinator mode (e.g., "10.0.1.10:9999,10.0.1.11:9999")
    #[arg(long)]
    pub host_list: Option<String>,

    /// File containing list of worker addresses (one per line, for coordinator mode)
    #[arg(long)]
    pub clients_file: Option<PathBuf>,

    /// Port to connect to on workers listed without one (coordinator mode only)
    #[arg(long, default_value = "9999")]
    pub worker_port: u16,

    /// CSV dataset path
    ///
    /// Not required in service mode (the coordinator sends the partitions)
    #[arg(value_name = "PATH", conflicts_with = "synthetic")]
    pub data: Option<PathBuf>,

    // === Dataset Options ===
    /// Data rows to read per partition from the CSV file
    #[arg(long)]
    pub rows: Option<usize>,

    /// Generate this many synthetic partitions instead of reading a file
    #[arg(long)]
    pub synthetic: Option<usize>,

    /// Values per synthetic partition
    #[arg(long, default_value = "30")]
    pub synthetic_length: usize,

    /// Seed for the synthetic generator
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Comma-separated partition names overriding the dataset's own
    #[arg(long)]
    pub names: Option<String>,

    // === Engine Options ===
    /// Execution substrate
    #[arg(long, value_enum)]
    pub substrate: Option<SubstrateType>,

    /// Number of workers (threads, or processes including the coordinator)
    #[arg(short = 'w', long, env = "PARTSTAT_WORKERS")]
    pub workers: Option<usize>,

    // === Classification Options ===
    /// Mean above which a partition is a heatwave
    #[arg(long)]
    pub heatwave_above: Option<f64>,

    /// Mean below which a partition is a cold snap
    #[arg(long)]
    pub cold_below: Option<f64>,

    // === Output Options ===
    /// JSON report file path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Suppress the text report
    #[arg(short = 'q', long)]
    pub quiet: bool,

    // === Runtime Options ===
    /// TOML configuration file (CLI flags take precedence)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Validate configuration and load the dataset without computing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        // Service mode doesn't need validation (coordinator sends everything)
        if self.mode == ExecutionMode::Service {
            return Ok(());
        }

        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }

        if self.rows == Some(0) {
            anyhow::bail!("rows must be at least 1");
        }

        if let Some(count) = self.synthetic {
            if count == 0 {
                anyhow::bail!("synthetic partition count must be at least 1");
            }
            if self.synthetic_length == 0 {
                anyhow::bail!("synthetic_length must be at least 1");
            }
        }

        if self.mode == ExecutionMode::Coordinator
            && self.host_list.is_none()
            && self.clients_file.is_none()
            && self.config.is_none()
        {
            anyhow::bail!("coordinator mode requires --host-list, --clients-file or --config");
        }

        Ok(())
    }
}
