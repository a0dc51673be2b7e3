//! Transaction configuration.
//!
//! Passed by value when a transaction is created; there is no process-wide
//! default to mutate.

use std::time::Duration;

use crate::core::{
    DEFAULT_AUTH_TIMEOUT, DEFAULT_MAX_IN_FRAMES, DEFAULT_MINI_REORDER_TOLERANCE,
    DEFAULT_PING_INTERVAL, DEFAULT_REFRESH, DEFAULT_RETRANS_COUNT, DEFAULT_RETRANS_INTERVAL,
    MAX_IN_FRAMES, MAX_RETRANS_COUNT, MAX_RETRANS_INTERVAL, MIN_PING_INTERVAL, MIN_RETRANS_COUNT,
    MIN_RETRANS_INTERVAL,
};
use crate::ie::FormatMask;

/// Per-transaction settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Transmissions of a frame before it times out.
    pub retrans_count: u32,
    /// Time between transmissions.
    pub retrans_interval: Duration,
    /// Time between keepalive pings on a call.
    pub ping_interval: Duration,
    /// Capacity of the inbound frame queue.
    pub max_in_frames: usize,
    /// How long a sent challenge waits for the reply once acknowledged.
    pub auth_timeout: Duration,
    /// How long a remotely ended transaction lingers to re-acknowledge
    /// retransmissions. `None` means `retrans_count * retrans_interval`.
    pub terminating_linger: Option<Duration>,
    /// Media formats we can handle.
    pub capability: FormatMask,
    /// Preferred media format.
    pub format: FormatMask,
    /// Registration refresh to request or grant, in seconds.
    pub refresh: u16,
    /// Largest backwards step of a mini frame timestamp fragment treated
    /// as reordering rather than wraparound.
    pub mini_reorder_tolerance: u32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            retrans_count: DEFAULT_RETRANS_COUNT,
            retrans_interval: DEFAULT_RETRANS_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            max_in_frames: DEFAULT_MAX_IN_FRAMES,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            terminating_linger: None,
            capability: FormatMask::from_bits(
                FormatMask::ULAW.bits() | FormatMask::ALAW.bits() | FormatMask::GSM.bits(),
            ),
            format: FormatMask::ULAW,
            refresh: DEFAULT_REFRESH,
            mini_reorder_tolerance: DEFAULT_MINI_REORDER_TOLERANCE,
        }
    }
}

impl TransactionConfig {
    /// Quick retries for a low-latency network.
    pub fn lan() -> Self {
        Self::default()
            .with_retrans_count(3)
            .with_retrans_interval(MIN_RETRANS_INTERVAL)
    }

    /// Patient retries for a lossy network.
    pub fn lossy() -> Self {
        Self::default()
            .with_retrans_count(8)
            .with_retrans_interval(Duration::from_millis(1000))
    }

    /// Set the transmission count, clamped to 1..=10.
    pub fn with_retrans_count(mut self, count: u32) -> Self {
        self.retrans_count = count.clamp(MIN_RETRANS_COUNT, MAX_RETRANS_COUNT);
        self
    }

    /// Set the retransmission interval, clamped to 200..=5000 ms.
    pub fn with_retrans_interval(mut self, interval: Duration) -> Self {
        self.retrans_interval = interval.clamp(MIN_RETRANS_INTERVAL, MAX_RETRANS_INTERVAL);
        self
    }

    /// Set the ping interval, raised to at least 10 s.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(MIN_PING_INTERVAL);
        self
    }

    /// Set the inbound queue capacity, clamped to 1..=127.
    pub fn with_max_in_frames(mut self, max: usize) -> Self {
        self.max_in_frames = max.clamp(1, MAX_IN_FRAMES);
        self
    }

    /// Set the challenge reply timeout.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Set the linger time of remotely ended transactions.
    pub fn with_terminating_linger(mut self, linger: Duration) -> Self {
        self.terminating_linger = Some(linger);
        self
    }

    /// Set the media capability and preferred format.
    pub fn with_formats(mut self, capability: FormatMask, format: FormatMask) -> Self {
        self.capability = capability;
        self.format = format;
        self
    }

    /// Set the mini frame reorder tolerance.
    pub fn with_mini_reorder_tolerance(mut self, tolerance: u32) -> Self {
        self.mini_reorder_tolerance = tolerance;
        self
    }

    /// Effective linger time.
    pub fn linger(&self) -> Duration {
        self.terminating_linger
            .unwrap_or(self.retrans_interval * self.retrans_count)
    }
}
