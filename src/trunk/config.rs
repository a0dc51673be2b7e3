//! Trunk aggregator configuration.

use std::time::Duration;

use crate::core::{
    DEFAULT_TRUNK_MAX_LEN, DEFAULT_TRUNK_SEND_INTERVAL, MAX_TRUNK_MAX_LEN, MIN_TRUNK_MAX_LEN,
    MIN_TRUNK_SEND_INTERVAL,
};

/// Trunk aggregator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrunkConfig {
    /// Write a timestamp into every record
    pub timestamps: bool,
    /// Time between scheduled flushes
    pub send_interval: Duration,
    /// Maximum datagram size, header included
    pub max_len: usize,
}

impl Default for TrunkConfig {
    fn default() -> Self {
        Self {
            timestamps: false,
            send_interval: DEFAULT_TRUNK_SEND_INTERVAL,
            max_len: DEFAULT_TRUNK_MAX_LEN,
        }
    }
}

impl TrunkConfig {
    /// Short interval, small datagrams
    pub fn low_latency() -> Self {
        Self {
            timestamps: true,
            send_interval: Duration::from_millis(10),
            max_len: 576,
        }
    }

    /// Long interval, MTU-sized datagrams
    pub fn high_capacity() -> Self {
        Self {
            timestamps: false,
            send_interval: Duration::from_millis(40),
            max_len: DEFAULT_TRUNK_MAX_LEN,
        }
    }

    /// Enable or disable per-record timestamps
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Set the send interval, raised to the 5 ms floor
    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval.max(MIN_TRUNK_SEND_INTERVAL);
        self
    }

    /// Set the maximum datagram size, clamped to 20..=65507 bytes
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.clamp(MIN_TRUNK_MAX_LEN, MAX_TRUNK_MAX_LEN);
        self
    }

    /// Send interval in whole milliseconds
    pub fn send_interval_ms(&self) -> u32 {
        u32::try_from(self.send_interval.as_millis()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrunkConfig::default();
        assert!(!config.timestamps);
        assert_eq!(config.send_interval_ms(), 20);
        assert_eq!(config.max_len, 1400);
    }

    #[test]
    fn test_clamping() {
        let config = TrunkConfig::default()
            .with_send_interval(Duration::from_millis(1))
            .with_max_len(4);
        assert_eq!(config.send_interval, Duration::from_millis(5));
        assert_eq!(config.max_len, 20);
        assert_eq!(TrunkConfig::default().with_max_len(200_000).max_len, 65_507);
    }

    #[test]
    fn test_presets() {
        assert!(TrunkConfig::low_latency().send_interval < TrunkConfig::high_capacity().send_interval);
        assert!(TrunkConfig::low_latency().timestamps);
    }
}
