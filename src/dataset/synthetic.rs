//! Synthetic dataset generation
//!
//! Produces normally-distributed samples from a seeded Xoshiro256++ generator,
//! so the same seed always yields the same dataset.

use super::{Dataset, Partition};
use crate::error::StatsError;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Parameters for a synthetic dataset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticParams {
    pub partitions: usize,
    pub length: usize,
    pub seed: u64,
    /// Mean of partition 0
    pub center: f64,
    /// Mean increment per partition
    pub spread: f64,
    pub stddev: f64,
}

/// Generate a dataset
pub fn generate(params: &SyntheticParams) -> Result<Dataset, StatsError> {
    if params.partitions == 0 || params.length == 0 {
        return Err(StatsError::Load(format!(
            "synthetic dataset needs at least one partition and one value (got {}x{})",
            params.partitions, params.length
        )));
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
    let mut partitions = Vec::with_capacity(params.partitions);

    for id in 0..params.partitions {
        let mean = params.center + params.spread * id as f64;
        let normal = Normal::new(mean, params.stddev).map_err(|e| {
            StatsError::Load(format!("invalid synthetic distribution: {}", e))
        })?;

        let values = (0..params.length).map(|_| normal.sample(&mut rng)).collect();
        partitions.push(Partition::new(id, format!("partition-{}", id), values));
    }

    Dataset::new(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u64) -> SyntheticParams {
        SyntheticParams {
            partitions: 3,
            length: 50,
            seed,
            center: 20.0,
            spread: 8.0,
            stddev: 3.0,
        }
    }

    #[test]
    fn test_generate_shape() {
        let dataset = generate(&params(1)).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.partition_length(), 50);
        assert_eq!(dataset.names(), vec!["partition-0", "partition-1", "partition-2"]);
    }

    #[test]
    fn test_same_seed_same_data() {
        assert_eq!(generate(&params(42)).unwrap(), generate(&params(42)).unwrap());
        assert_ne!(generate(&params(42)).unwrap(), generate(&params(43)).unwrap());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let mut bad = params(1);
        bad.partitions = 0;
        assert!(matches!(generate(&bad), Err(StatsError::Load(_))));

        let mut bad = params(1);
        bad.length = 0;
        assert!(matches!(generate(&bad), Err(StatsError::Load(_))));
    }

    #[test]
    fn test_invalid_stddev_rejected() {
        let mut bad = params(1);
        bad.stddev = -1.0;
        assert!(matches!(generate(&bad), Err(StatsError::Load(_))));
    }
}
