//! Trunk meta frame aggregator.
//!
//! One aggregator exists per remote address. Calls append their media with
//! [`TrunkFrame::add`]; the owner calls [`TrunkFrame::timer_tick`] on its
//! polling cadence and the batch goes out every send interval, or earlier
//! when the next record would not fit.
//!
//! Wire format:
//! ```text
//! +0  0x0000 (meta indicator)
//! +2  0x01   (trunk command)
//! +3  flags  (bit 0: per-record timestamps)
//! +4  timestamp (4 bytes BE32)
//! +8  records:
//!     timestamps: [len:2][call:2][ts:2] payload
//!     otherwise:  [call:2][len:2] payload
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use log::{trace, warn};

use super::config::TrunkConfig;
use crate::core::{
    FrameWriter, META_TRUNK, TRUNK_META_HEADER_SIZE, TRUNK_RECORD_HEADER_SIZE,
    TRUNK_RECORD_TS_HEADER_SIZE, TRUNK_TS_JITTER,
};

/// Media batch for one remote address.
pub struct TrunkFrame {
    addr: SocketAddr,
    config: TrunkConfig,
    writer: Arc<dyn FrameWriter>,
    buf: Vec<u8>,
    records: usize,
    /// Trunk timestamps count milliseconds from here.
    epoch: Instant,
    batch_start: Option<Instant>,
    last_sent_ts: Option<u32>,
    next_send: Instant,
    datagrams_sent: u64,
}

impl std::fmt::Debug for TrunkFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrunkFrame")
            .field("addr", &self.addr)
            .field("config", &self.config)
            .field("records", &self.records)
            .field("len", &self.buf.len())
            .field("last_sent_ts", &self.last_sent_ts)
            .finish_non_exhaustive()
    }
}

impl TrunkFrame {
    /// Create an empty batch for `addr`.
    pub fn new(addr: SocketAddr, config: TrunkConfig, writer: Arc<dyn FrameWriter>) -> Self {
        let now = Instant::now();
        let mut trunk = Self {
            addr,
            next_send: now + config.send_interval,
            config,
            writer,
            buf: Vec::new(),
            records: 0,
            epoch: now,
            batch_start: None,
            last_sent_ts: None,
            datagrams_sent: 0,
        };
        trunk.reset();
        trunk
    }

    /// Destination address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Configuration.
    pub fn config(&self) -> &TrunkConfig {
        &self.config
    }

    /// Records waiting for the next flush.
    pub fn pending_records(&self) -> usize {
        self.records
    }

    /// Current datagram length, header included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether no record is pending.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// When the oldest pending record was added.
    pub fn batch_start(&self) -> Option<Instant> {
        self.batch_start
    }

    /// Next scheduled flush.
    pub fn next_send(&self) -> Instant {
        self.next_send
    }

    /// Timestamp of the last flush.
    pub fn last_sent_ts(&self) -> Option<u32> {
        self.last_sent_ts
    }

    /// Datagrams written so far.
    pub fn datagrams_sent(&self) -> u64 {
        self.datagrams_sent
    }

    fn record_header_len(&self) -> usize {
        if self.config.timestamps {
            TRUNK_RECORD_TS_HEADER_SIZE
        } else {
            TRUNK_RECORD_HEADER_SIZE
        }
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.buf.extend_from_slice(&[0, 0, META_TRUNK, u8::from(self.config.timestamps)]);
        self.buf.extend_from_slice(&[0; 4]);
        self.records = 0;
        self.batch_start = None;
    }

    /// Append one call's media. Returns the bytes added, 0 if the payload
    /// can never fit a datagram.
    ///
    /// Flushes the pending batch first when the record would overflow it.
    pub fn add(&mut self, call_no: u16, payload: &[u8], timestamp: u32) -> usize {
        let record_len = self.record_header_len() + payload.len();
        let Ok(payload_len) = u16::try_from(payload.len()) else {
            warn!(
                "trunk to {}: {} byte payload of call {call_no} overflows the record length",
                self.addr,
                payload.len()
            );
            return 0;
        };
        if payload.is_empty() || TRUNK_META_HEADER_SIZE + record_len > self.config.max_len {
            warn!(
                "trunk to {}: rejecting {} byte payload of call {call_no}",
                self.addr,
                payload.len()
            );
            return 0;
        }
        let now = Instant::now();
        if self.buf.len() + record_len > self.config.max_len {
            self.flush(now, false);
        }
        if self.records == 0 {
            self.batch_start = Some(now);
        }

        let call = (call_no & 0x7fff).to_be_bytes();
        let len = payload_len.to_be_bytes();
        if self.config.timestamps {
            self.buf.extend_from_slice(&len);
            self.buf.extend_from_slice(&call);
            self.buf.extend_from_slice(&(timestamp as u16).to_be_bytes());
        } else {
            self.buf.extend_from_slice(&call);
            self.buf.extend_from_slice(&len);
        }
        self.buf.extend_from_slice(payload);
        self.records += 1;
        record_len
    }

    /// Send the pending batch.
    ///
    /// `on_schedule` is set by the timer: the timestamp then snaps to the
    /// ideal `last + send_interval` when within the jitter delta. Timestamps
    /// always increase. An empty batch updates the schedule but writes
    /// nothing. Returns whether a datagram was written.
    pub fn flush(&mut self, now: Instant, on_schedule: bool) -> bool {
        let elapsed = now.saturating_duration_since(self.epoch).as_millis();
        let mut ts = u32::try_from(elapsed).unwrap_or(u32::MAX);
        if let Some(last) = self.last_sent_ts {
            if on_schedule {
                let ideal = last.wrapping_add(self.config.send_interval_ms());
                if ts.abs_diff(ideal) < TRUNK_TS_JITTER {
                    ts = ideal;
                }
            }
            if ts <= last {
                ts = last.wrapping_add(1);
            }
        }
        self.last_sent_ts = Some(ts);
        self.next_send = now + self.config.send_interval;

        if self.records == 0 {
            return false;
        }
        self.buf[4..8].copy_from_slice(&ts.to_be_bytes());
        let written = match self.writer.write_to(&self.buf, self.addr) {
            Ok(_) => {
                trace!(
                    "trunk to {}: sent {} records, {} bytes, ts={ts}",
                    self.addr,
                    self.records,
                    self.buf.len()
                );
                self.datagrams_sent += 1;
                true
            }
            Err(err) => {
                warn!("trunk to {}: write failed: {err}", self.addr);
                false
            }
        };
        self.reset();
        written
    }

    /// Flush on schedule once the send interval has elapsed.
    pub fn timer_tick(&mut self, now: Instant) -> bool {
        if now < self.next_send {
            return false;
        }
        self.flush(now, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::for_each_trunk_record;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Vec<u8>>>);

    impl FrameWriter for Recorder {
        fn write_to(&self, data: &[u8], _addr: SocketAddr) -> io::Result<usize> {
            self.0.lock().unwrap().push(data.to_vec());
            Ok(data.len())
        }
    }

    fn trunk(config: TrunkConfig) -> (TrunkFrame, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let trunk = TrunkFrame::new("192.0.2.1:4569".parse().unwrap(), config, recorder.clone());
        (trunk, recorder)
    }

    #[test]
    fn test_add_record_layout() {
        let (mut trunk, recorder) = trunk(TrunkConfig::default());
        assert_eq!(trunk.add(5, &[1, 2, 3], 0x1234), 7);
        assert!(trunk.batch_start().is_some());
        assert!(trunk.flush(Instant::now(), false));

        let sent = recorder.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..4], &[0, 0, 1, 0]);
        assert_eq!(&sent[0][8..], &[0, 5, 0, 3, 1, 2, 3]);
    }

    #[test]
    fn test_add_with_timestamps() {
        let (mut trunk, recorder) = trunk(TrunkConfig::default().with_timestamps(true));
        assert_eq!(trunk.add(6, &[9], 0x1_0203), 7);
        trunk.flush(Instant::now(), false);

        let sent = recorder.0.lock().unwrap();
        assert_eq!(sent[0][3], 1);
        assert_eq!(&sent[0][8..], &[0, 1, 0, 6, 2, 3, 9]);

        let mut records = Vec::new();
        for_each_trunk_record(&sent[0], |r| records.push(r)).unwrap();
        assert_eq!(records[0].call_no, 6);
        assert_eq!(records[0].timestamp, 0x0203);
    }

    #[test]
    fn test_overflow_flushes_first() {
        let config = TrunkConfig::default().with_max_len(40);
        let (mut trunk, recorder) = trunk(config);
        // 8 header + 4 record header + 10 payload = 22
        assert_eq!(trunk.add(1, &[0xaa; 10], 0), 14);
        assert_eq!(trunk.add(2, &[0xbb; 10], 0), 14);
        assert!(recorder.0.lock().unwrap().is_empty());
        assert_eq!(trunk.len(), 36);

        // Third record would reach 50 bytes.
        assert_eq!(trunk.add(3, &[0xcc; 10], 0), 14);
        let sent = recorder.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 36);
        assert!(sent.iter().all(|d| d.len() <= 40));
        assert_eq!(trunk.pending_records(), 1);
        assert_eq!(trunk.len(), 22);
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let (mut trunk, recorder) = trunk(TrunkConfig::default().with_max_len(20));
        assert_eq!(trunk.add(1, &[0; 9], 0), 0);
        assert_eq!(trunk.add(1, &[], 0), 0);
        assert_eq!(trunk.add(1, &[0; 8], 0), 12);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_record_length_fits_sixteen_bits() {
        let (mut large, recorder) = trunk(TrunkConfig::default().with_max_len(200_000));
        assert_eq!(large.add(7, &[0xab; 65_000], 0), 65_004);
        assert!(large.flush(Instant::now(), false));
        let sent = recorder.0.lock().unwrap().pop().unwrap();
        let mut records = Vec::new();
        assert_eq!(for_each_trunk_record(&sent, |r| records.push(r)), Ok(1));
        assert_eq!(records[0].call_no, 7);
        assert_eq!(records[0].payload.len(), 65_000);

        let mut config = TrunkConfig::default();
        config.max_len = 200_000;
        let (mut unclamped, recorder) = trunk(config);
        assert_eq!(unclamped.add(7, &[0xab; 70_000], 0), 0);
        assert_eq!(unclamped.pending_records(), 0);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_flush_updates_schedule() {
        let (mut trunk, recorder) = trunk(TrunkConfig::default());
        let now = Instant::now() + Duration::from_millis(100);
        assert!(!trunk.flush(now, true));
        assert!(trunk.last_sent_ts().is_some());
        assert_eq!(trunk.next_send(), now + Duration::from_millis(20));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let (mut trunk, recorder) = trunk(TrunkConfig::default());
        let now = Instant::now();
        for _ in 0..3 {
            trunk.add(1, &[1], 0);
            trunk.flush(now, false);
        }
        let sent = recorder.0.lock().unwrap();
        let stamps: Vec<u32> = sent
            .iter()
            .map(|d| u32::from_be_bytes([d[4], d[5], d[6], d[7]]))
            .collect();
        assert!(stamps.windows(2).all(|w| w[1] > w[0]), "{stamps:?}");
    }

    #[test]
    fn test_on_schedule_snaps_to_interval() {
        let (mut trunk, recorder) = trunk(TrunkConfig::default());
        let base = Instant::now() + Duration::from_millis(1000);
        trunk.add(1, &[1], 0);
        trunk.flush(base, true);
        let first = trunk.last_sent_ts().unwrap();

        trunk.add(1, &[1], 0);
        trunk.flush(base + Duration::from_millis(23), true);
        assert_eq!(trunk.last_sent_ts(), Some(first + 20));

        trunk.add(1, &[1], 0);
        trunk.flush(base + Duration::from_millis(80), false);
        assert!(trunk.last_sent_ts().unwrap() >= first + 80);
        assert_eq!(recorder.0.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_timer_tick() {
        let (mut trunk, recorder) = trunk(TrunkConfig::default());
        trunk.add(1, &[1, 2], 0);
        assert!(!trunk.timer_tick(trunk.next_send() - Duration::from_millis(1)));
        assert!(trunk.timer_tick(trunk.next_send()));
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
        assert!(trunk.is_empty());
        assert_eq!(trunk.datagrams_sent(), 1);
    }
}
