//! TOML configuration file parsing

use super::*;
use crate::config::cli::{Cli, ExecutionMode};
use crate::config::cli_convert::{convert_substrate, parse_host_list, parse_names, read_clients_file};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Build the configuration for a CLI invocation
///
/// Starts from `--config` when given (defaults otherwise) and applies the CLI
/// flags on top.
pub fn build_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    merge_cli_with_config(cli, base)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Override dataset source
    if let Some(ref path) = cli.data {
        let rows = match (cli.rows, &config.dataset.source) {
            (Some(rows), _) => rows,
            (None, DatasetSource::Csv { rows, .. }) => *rows,
            (None, _) => DEFAULT_PARTITION_LENGTH,
        };
        config.dataset.source = DatasetSource::Csv {
            path: path.clone(),
            rows,
        };
    } else if let Some(partitions) = cli.synthetic {
        let (center, spread, stddev) = match config.dataset.source {
            DatasetSource::Synthetic { center, spread, stddev, .. } => (center, spread, stddev),
            _ => (20.0, 8.0, 3.0),
        };
        config.dataset.source = DatasetSource::Synthetic {
            partitions,
            length: cli.synthetic_length,
            seed: cli.seed,
            center,
            spread,
            stddev,
        };
    } else if let Some(new_rows) = cli.rows {
        if let DatasetSource::Csv { ref mut rows, .. } = config.dataset.source {
            *rows = new_rows;
        }
    }

    if let Some(ref names) = cli.names {
        config.dataset.names = Some(parse_names(names)?);
    }

    // Override thresholds
    if let Some(above) = cli.heatwave_above {
        config.dataset.thresholds.heatwave_above = above;
    }
    if let Some(below) = cli.cold_below {
        config.dataset.thresholds.cold_below = below;
    }

    // Override engine settings
    if let Some(substrate) = cli.substrate {
        config.engine.substrate = convert_substrate(substrate);
    }
    if let Some(workers) = cli.workers {
        config.engine.workers = Some(workers);
    }

    // Worker addresses imply the distributed substrate
    if let Some(ref host_list) = cli.host_list {
        config.engine.worker_addresses = parse_host_list(host_list, cli.worker_port);
    } else if let Some(ref clients_file) = cli.clients_file {
        config.engine.worker_addresses = read_clients_file(clients_file, cli.worker_port)?;
    }
    if cli.mode == ExecutionMode::Coordinator || !config.engine.worker_addresses.is_empty() {
        config.engine.substrate = Substrate::Distributed;
    }

    // Override output settings
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.quiet {
        config.output.quiet = true;
    }

    // Override runtime settings
    if cli.dry_run {
        config.runtime.dry_run = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    Ok(config)
}
