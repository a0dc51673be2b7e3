//! Transaction timestamps.

use std::time::Instant;

/// Millisecond clock of one transaction.
///
/// Timestamps count from the transaction's creation and start at 1, so a
/// zero timestamp never goes out. Full frames additionally get strictly
/// increasing timestamps.
#[derive(Debug, Clone)]
pub struct TransactionClock {
    start: Instant,
    last_full: u32,
}

impl TransactionClock {
    /// Start the clock at `start`.
    pub fn with_start(start: Instant) -> Self {
        Self {
            start,
            last_full: 0,
        }
    }

    /// Time the clock started.
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Milliseconds since start, plus one.
    pub fn timestamp(&self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.start).as_millis();
        (elapsed as u32).wrapping_add(1)
    }

    /// Timestamp for the next full frame: `timestamp(now)` pushed past the
    /// last full frame timestamp.
    pub fn next_full(&mut self, now: Instant) -> u32 {
        let ts = self.timestamp(now);
        self.adjust(ts)
    }

    /// Raise `ts` above the last full frame timestamp and record it.
    ///
    /// Wraps past `u32::MAX` to 1.
    pub fn adjust(&mut self, ts: u32) -> u32 {
        let ts = if ts <= self.last_full {
            self.last_full.wrapping_add(1).max(1)
        } else {
            ts
        };
        self.last_full = ts;
        ts
    }

    /// Last full frame timestamp handed out.
    pub fn last_full(&self) -> u32 {
        self.last_full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamp_starts_at_one() {
        let start = Instant::now();
        let clock = TransactionClock::with_start(start);
        assert_eq!(clock.timestamp(start), 1);
        assert_eq!(clock.timestamp(start + Duration::from_millis(40)), 41);
    }

    #[test]
    fn test_full_frames_strictly_increase() {
        let start = Instant::now();
        let mut clock = TransactionClock::with_start(start);
        assert_eq!(clock.next_full(start), 1);
        assert_eq!(clock.next_full(start), 2);
        assert_eq!(clock.next_full(start), 3);
        assert_eq!(clock.next_full(start + Duration::from_millis(100)), 101);
        assert_eq!(clock.adjust(50), 102);
        assert_eq!(clock.last_full(), 102);
    }

    #[test]
    fn test_adjust_wraps_past_max() {
        let mut clock = TransactionClock::with_start(Instant::now());
        assert_eq!(clock.adjust(u32::MAX), u32::MAX);
        assert_eq!(clock.adjust(u32::MAX), 1);
        assert_eq!(clock.adjust(1), 2);
    }
}
