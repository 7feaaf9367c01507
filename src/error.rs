//! Error classification for the statistics engine
//!
//! Every error the core can raise is fatal for the run. The orchestration layers
//! wrap these with `anyhow` context, and callers can still recover the kind with
//! `downcast_ref::<StatsError>()`.

use thiserror::Error;

/// Fatal error kinds raised by the core engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    /// Dataset source is unreadable or malformed
    #[error("failed to load dataset: {0}")]
    Load(String),

    /// Worker or partition count violates the assignment contract
    #[error("invalid assignment: {0}")]
    Assignment(String),

    /// Partition delivery or result collection failed
    #[error("transfer failed for partition {partition:?}: {reason}")]
    Transfer {
        partition: Option<usize>,
        reason: String,
    },

    /// A zero-length partition reached the reducer
    #[error("partition {0} has no values")]
    DegenerateInput(usize),
}

impl StatsError {
    /// Transfer error tied to a specific partition
    pub fn transfer(partition: usize, reason: impl Into<String>) -> Self {
        Self::Transfer {
            partition: Some(partition),
            reason: reason.into(),
        }
    }

    /// Transfer error not tied to one partition (connection-level)
    pub fn link(reason: impl Into<String>) -> Self {
        Self::Transfer {
            partition: None,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            StatsError::DegenerateInput(2).to_string(),
            "partition 2 has no values"
        );
        assert_eq!(
            StatsError::transfer(1, "short payload").to_string(),
            "transfer failed for partition Some(1): short payload"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = StatsError::Assignment("no workers".into()).into();
        let err = err.context("Failed to plan run");
        assert!(matches!(
            err.downcast_ref::<StatsError>(),
            Some(StatsError::Assignment(_))
        ));
    }
}
