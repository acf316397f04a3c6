//! Recognized configuration options: retention window, snapshot trigger
//! threshold, and the maintenance period.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Default number of versions to retain on disk and in the cache.
pub const DEFAULT_NUM_BATCHES_TO_RETAIN: u64 = 2;

/// Default delta-chain length (since the last snapshot) that triggers a
/// new snapshot.
pub const DEFAULT_MAX_DELTA_CHAIN_FOR_SNAPSHOTS: u64 = 10;

/// Fixed maintenance tick period; may become process-wide configuration.
pub const DEFAULT_MAINTENANCE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoreConfig {
    num_batches_to_retain: u64,
    max_delta_chain_for_snapshots: u64,
    maintenance_period: Duration,
}

impl StoreConfig {
    /// Builds a config, validating that both integer options are at least 1.
    pub fn new(
        num_batches_to_retain: u64,
        max_delta_chain_for_snapshots: u64,
        maintenance_period: Duration,
    ) -> StoreResult<Self> {
        if num_batches_to_retain < 1 {
            return Err(StoreError::config(
                "numBatchesToRetain must be >= 1",
            ));
        }

        if max_delta_chain_for_snapshots < 1 {
            return Err(StoreError::config(
                "maxDeltaChainForSnapshots must be >= 1",
            ));
        }

        Ok(Self {
            num_batches_to_retain,
            max_delta_chain_for_snapshots,
            maintenance_period,
        })
    }

    pub fn num_batches_to_retain(&self) -> u64 {
        self.num_batches_to_retain
    }

    pub fn max_delta_chain_for_snapshots(&self) -> u64 {
        self.max_delta_chain_for_snapshots
    }

    pub fn maintenance_period(&self) -> Duration {
        self.maintenance_period
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            num_batches_to_retain: DEFAULT_NUM_BATCHES_TO_RETAIN,
            max_delta_chain_for_snapshots: DEFAULT_MAX_DELTA_CHAIN_FOR_SNAPSHOTS,
            maintenance_period: DEFAULT_MAINTENANCE_PERIOD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = StoreConfig::default();
        assert_eq!(config.num_batches_to_retain(), 2);
        assert_eq!(config.max_delta_chain_for_snapshots(), 10);
        assert_eq!(config.maintenance_period(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_zero_retention() {
        assert!(StoreConfig::new(0, 10, Duration::from_secs(10)).is_err());
    }

    #[test]
    fn rejects_zero_snapshot_threshold() {
        assert!(StoreConfig::new(2, 0, Duration::from_secs(10)).is_err());
    }
}
