//! partstat CLI entry point

use anyhow::{Context, Result};
use partstat::config::cli::{Cli, ExecutionMode};
use partstat::config::{toml::build_config, validator, Config, Substrate};
use partstat::coordinator;
use partstat::dataset::Dataset;
use partstat::output;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;
    init_logging(&cli);

    match cli.mode {
        ExecutionMode::Run => run_local(cli),
        ExecutionMode::Service => run_service(cli),
        ExecutionMode::Coordinator => run_coordinator(cli),
    }
}

/// Structured logging to stderr; `RUST_LOG` overrides the CLI default
fn init_logging(cli: &Cli) {
    let default = if cli.debug {
        "partstat=debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Build, validate and load everything a run needs
fn prepare(cli: &Cli) -> Result<(Config, Dataset)> {
    let config = build_config(cli)?;
    validator::validate_config(&config)
        .context("Configuration validation failed")?;

    info!(source = %config.dataset.source.describe(), "Loading dataset");
    let dataset = config.load_dataset()
        .context("Failed to load dataset")?;

    info!(
        partitions = dataset.len(),
        length = dataset.partition_length(),
        names = ?dataset.names(),
        "Dataset loaded"
    );

    Ok((config, dataset))
}

/// Run on this machine with the configured substrate
///
/// The distributed substrate without explicit addresses launches `W - 1`
/// single-session worker services on localhost and acts as worker 0.
fn run_local(cli: Cli) -> Result<()> {
    let (mut config, dataset) = prepare(&cli)?;

    if config.runtime.dry_run {
        println!("Dry run: configuration valid, {} partitions loaded", dataset.len());
        return Ok(());
    }

    let mut services = Vec::new();
    if config.engine.substrate == Substrate::Distributed && config.engine.worker_addresses.is_empty() {
        let workers = config.engine.resolved_workers();
        let mut next_port = 9999;

        for _ in 1..workers {
            let port = find_available_port(next_port)?;
            next_port = port + 1;

            let child = launch_localhost_service(port, config.runtime.debug)?;
            services.push(child);
            config.engine.worker_addresses.push(format!("127.0.0.1:{}", port));
        }
    }

    let outcome = coordinator::run(&config, &dataset);

    for child in services {
        if let Err(e) = cleanup_service(child) {
            warn!("Failed to clean up worker service: {:#}", e);
        }
    }

    report(&config, &dataset, &outcome?)
}

/// Run in service mode (worker process)
fn run_service(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let service = partstat::distributed::NodeService::new(cli.listen_port)
            .context("Failed to create worker service")?;

        service.run(cli.once).await
    })
}

/// Run in coordinator mode against already-running worker services
fn run_coordinator(cli: Cli) -> Result<()> {
    let (config, dataset) = prepare(&cli)?;

    if config.engine.worker_addresses.is_empty() {
        anyhow::bail!("No worker addresses specified. Use --host-list or --clients-file");
    }

    info!(
        workers = config.engine.resolved_workers(),
        addresses = ?config.engine.worker_addresses,
        "Coordinator mode"
    );

    if config.runtime.dry_run {
        println!("Dry run: configuration valid, {} partitions loaded", dataset.len());
        return Ok(());
    }

    let outcome = coordinator::run(&config, &dataset)?;
    report(&config, &dataset, &outcome)
}

fn report(config: &Config, dataset: &Dataset, outcome: &coordinator::RunOutcome) -> Result<()> {
    let thresholds = &config.dataset.thresholds;

    if !config.output.quiet {
        output::text::print_results(outcome, dataset, thresholds);
    }

    if let Some(ref path) = config.output.json_output {
        output::json::write_results(path, outcome, dataset, thresholds)?;
        info!(path = %path.display(), "JSON report written");
    }

    Ok(())
}

/// Find an available port for a localhost service
fn find_available_port(start: u16) -> Result<u16> {
    use std::net::TcpListener;

    for port in start..start.saturating_add(100) {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            drop(listener);
            debug!(port, "Port is available");
            return Ok(port);
        }
    }

    anyhow::bail!(
        "No available ports found in range {}-{}. Close other partstat services or pass --host-list.",
        start,
        start.saturating_add(99)
    )
}

/// Launch a single-session localhost worker service in the background
fn launch_localhost_service(port: u16, debug: bool) -> Result<std::process::Child> {
    use std::process::{Command, Stdio};

    let exe_path = std::env::current_exe()
        .context("Failed to get current executable path")?;

    let mut cmd = Command::new(&exe_path);
    cmd.arg("--mode").arg("service");
    cmd.arg("--listen-port").arg(port.to_string());
    cmd.arg("--once");

    if debug {
        cmd.arg("--debug");
        cmd.stderr(Stdio::inherit());
    } else {
        cmd.stderr(Stdio::null());
    }
    cmd.stdout(Stdio::null());

    let child = cmd.spawn()
        .context("Failed to spawn worker service process")?;

    debug!(port, pid = child.id(), "Worker service launched");

    Ok(child)
}

/// Cleanup service process
fn cleanup_service(mut child: std::process::Child) -> Result<()> {
    use std::time::Duration;

    // Services exit on their own once their session ends
    if let Some(status) = child.try_wait()? {
        debug!(pid = child.id(), %status, "Worker service already exited");
        return Ok(());
    }

    std::thread::sleep(Duration::from_millis(500));

    match child.try_wait()? {
        Some(status) => {
            debug!(pid = child.id(), %status, "Worker service exited");
        }
        None => {
            debug!(pid = child.id(), "Worker service still running, killing");
            child.kill()?;
            child.wait()?;
        }
    }

    Ok(())
}
