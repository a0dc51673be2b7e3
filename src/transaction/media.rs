//! Per-direction media bookkeeping of a call.

use crate::core::{AUDIO_TS_MASK, VIDEO_TS_MASK};
use crate::frame::MediaType;
use crate::ie::FormatMask;

/// Packet counters of one media stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaStats {
    /// Packets delivered to the media sink.
    pub received: u64,
    /// Payload bytes delivered to the media sink.
    pub received_bytes: u64,
    /// Packets dropped as late or reordered.
    pub out_of_order: u64,
    /// Packets dropped for another reason.
    pub dropped: u64,
    /// Packets sent.
    pub sent: u64,
    /// Payload bytes sent.
    pub sent_bytes: u64,
}

/// How an outgoing media payload must be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MediaFraming {
    /// A full voice or video frame.
    Full,
    /// A mini frame, video meta frame or trunk record.
    Compact,
}

/// State of one media type (audio or video) in both directions.
#[derive(Debug, Clone)]
pub struct MediaStream {
    media: MediaType,
    format_in: FormatMask,
    format_out: FormatMask,
    last_in: Option<u32>,
    last_out: Option<u32>,
    stats: MediaStats,
}

impl MediaStream {
    /// Empty stream for `media`.
    pub fn new(media: MediaType) -> Self {
        Self {
            media,
            format_in: FormatMask::NONE,
            format_out: FormatMask::NONE,
            last_in: None,
            last_out: None,
            stats: MediaStats::default(),
        }
    }

    /// Bits of the timestamp a compact frame carries.
    pub fn ts_mask(&self) -> u32 {
        match self.media {
            MediaType::Audio => AUDIO_TS_MASK,
            MediaType::Video => VIDEO_TS_MASK,
        }
    }

    /// Format of inbound media.
    pub fn format_in(&self) -> FormatMask {
        self.format_in
    }

    /// Format of outbound media.
    pub fn format_out(&self) -> FormatMask {
        self.format_out
    }

    /// Set the inbound format (from a full frame or the accepted format).
    pub fn set_format_in(&mut self, format: FormatMask) {
        self.format_in = format;
    }

    /// Last delivered inbound timestamp.
    pub fn last_in(&self) -> Option<u32> {
        self.last_in
    }

    /// Counters.
    pub fn stats(&self) -> MediaStats {
        self.stats
    }

    /// Rebuild and check the timestamp of an inbound packet.
    ///
    /// `full` packets carry all 32 bits. Compact packets carry only the
    /// masked low bits; the high bits come from the last delivered
    /// timestamp, moving to the next period when the fragment went
    /// backwards further than `tolerance` allows for reordering. Returns the
    /// timestamp to deliver, or `None` when the packet must be dropped.
    pub fn accept_inbound(&mut self, timestamp: u32, full: bool, tolerance: u32) -> Option<u32> {
        if self.format_in.is_empty() {
            self.stats.dropped += 1;
            return None;
        }
        let last = self.last_in.unwrap_or(0);
        let ts = if full {
            timestamp
        } else {
            let mask = self.ts_mask();
            let fragment = timestamp & mask;
            let delta = i64::from(fragment) - i64::from(last & mask);
            let window = i64::from(tolerance.min(mask / 2));
            if delta < 0 && -delta < window {
                self.stats.out_of_order += 1;
                return None;
            }
            if delta > window && self.last_in.is_some() {
                self.stats.out_of_order += 1;
                return None;
            }
            let rebuilt = (last & !mask) | fragment;
            if delta < 0 {
                rebuilt.wrapping_add(mask + 1)
            } else {
                rebuilt
            }
        };
        if let Some(last) = self.last_in {
            let forward = match self.media {
                MediaType::Audio => ts > last,
                MediaType::Video => ts >= last,
            };
            if !forward {
                self.stats.out_of_order += 1;
                return None;
            }
        }
        self.last_in = Some(ts);
        Some(ts)
    }

    /// Count one delivered packet.
    pub(crate) fn record_received(&mut self, len: usize) {
        self.stats.received += 1;
        self.stats.received_bytes += len as u64;
    }

    /// Pick the timestamp and framing of an outbound packet at `ts` in
    /// `format`, and record it.
    ///
    /// Audio never repeats a timestamp. A full frame goes out for the first
    /// packet, on a format change and whenever the high timestamp bits a
    /// compact frame cannot carry change.
    pub(crate) fn prepare_outbound(
        &mut self,
        ts: u32,
        format: FormatMask,
        len: usize,
    ) -> (u32, MediaFraming) {
        let mut ts = ts;
        if let Some(last) = self.last_out {
            if self.media == MediaType::Audio && ts <= last {
                ts = last + 1;
            }
        }
        let mask = self.ts_mask();
        let framing = match self.last_out {
            Some(last) if format == self.format_out && (last & !mask) == (ts & !mask) => {
                MediaFraming::Compact
            }
            _ => MediaFraming::Full,
        };
        self.last_out = Some(ts);
        self.format_out = format;
        self.stats.sent += 1;
        self.stats.sent_bytes += len as u64;
        (ts, framing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio() -> MediaStream {
        let mut stream = MediaStream::new(MediaType::Audio);
        stream.set_format_in(FormatMask::ULAW);
        stream
    }

    #[test]
    fn test_unknown_format_drops() {
        let mut stream = MediaStream::new(MediaType::Audio);
        assert_eq!(stream.accept_inbound(100, true, 0x7fff), None);
        assert_eq!(stream.stats().dropped, 1);
    }

    #[test]
    fn test_fragment_extension() {
        let mut stream = audio();
        assert_eq!(stream.accept_inbound(0x0001_fff0, true, 0x7fff), Some(0x0001_fff0));
        assert_eq!(stream.accept_inbound(0xfffa, false, 0x7fff), Some(0x0001_fffa));
        assert_eq!(stream.accept_inbound(0x0010, false, 0x7fff), Some(0x0002_0010));
    }

    #[test]
    fn test_late_fragment_dropped() {
        let mut stream = audio();
        assert_eq!(stream.accept_inbound(1000, true, 0x7fff), Some(1000));
        assert_eq!(stream.accept_inbound(980, false, 0x7fff), None);
        assert_eq!(stream.stats().out_of_order, 1);
        assert_eq!(stream.accept_inbound(1020, false, 0x7fff), Some(1020));
    }

    #[test]
    fn test_audio_requires_progress() {
        let mut stream = audio();
        assert_eq!(stream.accept_inbound(500, true, 0x7fff), Some(500));
        assert_eq!(stream.accept_inbound(500, true, 0x7fff), None);
    }

    #[test]
    fn test_video_allows_same_timestamp() {
        let mut stream = MediaStream::new(MediaType::Video);
        stream.set_format_in(FormatMask::H263);
        assert_eq!(stream.accept_inbound(500, true, 0x7fff), Some(500));
        assert_eq!(stream.accept_inbound(500, false, 0x7fff), Some(500));
    }

    #[test]
    fn test_outbound_framing() {
        let mut stream = MediaStream::new(MediaType::Audio);
        let (ts, framing) = stream.prepare_outbound(20, FormatMask::ULAW, 160);
        assert_eq!((ts, framing), (20, MediaFraming::Full));
        let (ts, framing) = stream.prepare_outbound(40, FormatMask::ULAW, 160);
        assert_eq!((ts, framing), (40, MediaFraming::Compact));
        let (ts, framing) = stream.prepare_outbound(40, FormatMask::ULAW, 160);
        assert_eq!((ts, framing), (41, MediaFraming::Compact));
        let (_, framing) = stream.prepare_outbound(60, FormatMask::GSM, 33);
        assert_eq!(framing, MediaFraming::Full);
        let (_, framing) = stream.prepare_outbound(0x0001_0000, FormatMask::GSM, 33);
        assert_eq!(framing, MediaFraming::Full);
        assert_eq!(stream.stats().sent, 5);
    }
}
