//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_dataset(&config.dataset)?;
    validate_thresholds(&config.dataset.thresholds)?;
    validate_engine(&config.engine)?;

    Ok(())
}

/// Validate dataset configuration
pub fn validate_dataset(dataset: &DatasetConfig) -> Result<()> {
    match dataset.source {
        DatasetSource::Csv { ref path, rows } => {
            if path.as_os_str().is_empty() {
                anyhow::bail!("dataset path must not be empty");
            }
            if rows == 0 {
                anyhow::bail!("rows must be at least 1");
            }
        }
        DatasetSource::Synthetic {
            partitions,
            length,
            center,
            spread,
            stddev,
            ..
        } => {
            if partitions == 0 {
                anyhow::bail!("synthetic dataset needs at least 1 partition");
            }
            if length == 0 {
                anyhow::bail!("synthetic partition length must be at least 1");
            }
            if !stddev.is_finite() || stddev <= 0.0 {
                anyhow::bail!("synthetic stddev must be positive (got {})", stddev);
            }
            if !center.is_finite() || !spread.is_finite() {
                anyhow::bail!("synthetic center and spread must be finite");
            }
        }
    }

    if let Some(ref names) = dataset.names {
        if names.iter().any(|name| name.trim().is_empty()) {
            anyhow::bail!("partition names must not be empty");
        }
    }

    Ok(())
}

/// Validate classification thresholds
pub fn validate_thresholds(thresholds: &ClassificationThresholds) -> Result<()> {
    if !thresholds.heatwave_above.is_finite() || !thresholds.cold_below.is_finite() {
        anyhow::bail!("classification thresholds must be finite");
    }

    if thresholds.cold_below >= thresholds.heatwave_above {
        anyhow::bail!(
            "cold_below ({}) must be less than heatwave_above ({})",
            thresholds.cold_below,
            thresholds.heatwave_above
        );
    }

    Ok(())
}

/// Validate engine configuration
pub fn validate_engine(engine: &EngineConfig) -> Result<()> {
    if engine.workers == Some(0) {
        anyhow::bail!("workers must be at least 1");
    }

    match engine.substrate {
        Substrate::Threads => {
            if !engine.worker_addresses.is_empty() {
                anyhow::bail!("worker_addresses require the distributed substrate");
            }
        }
        Substrate::Distributed => {
            if let Some(workers) = engine.workers {
                if !engine.worker_addresses.is_empty()
                    && workers != engine.worker_addresses.len() + 1
                {
                    anyhow::bail!(
                        "workers ({}) must equal 1 + number of worker addresses ({})",
                        workers,
                        engine.worker_addresses.len()
                    );
                }
            }
        }
    }

    Ok(())
}
