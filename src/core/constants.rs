//! Protocol constants for IAX2.
//!
//! Wire sizes and protocol numbers are fixed by the protocol. The timing
//! values are defaults and bounds for [`TransactionConfig`] and
//! [`TrunkConfig`]; they are never read as process-wide state.
//!
//! [`TransactionConfig`]: crate::transaction::TransactionConfig
//! [`TrunkConfig`]: crate::trunk::TrunkConfig

use std::time::Duration;

// =============================================================================
// PROTOCOL IDENTITY
// =============================================================================

/// IAX protocol version carried in the VERSION information element.
pub const PROTOCOL_VERSION: u16 = 2;

/// Well-known IAX2 UDP port.
pub const DEFAULT_PORT: u16 = 4569;

/// Largest valid call number (15 bits).
pub const MAX_CALL_NO: u16 = 32767;

// =============================================================================
// WIRE SIZES
// =============================================================================

/// Full frame header size.
pub const FULL_HEADER_SIZE: usize = 12;

/// Mini frame header size.
pub const MINI_HEADER_SIZE: usize = 4;

/// Video meta frame header size.
pub const VIDEO_META_HEADER_SIZE: usize = 6;

/// Trunk meta frame header size.
pub const TRUNK_META_HEADER_SIZE: usize = 8;

/// Trunk record header size with per-record timestamps.
pub const TRUNK_RECORD_TS_HEADER_SIZE: usize = 6;

/// Trunk record header size without timestamps.
pub const TRUNK_RECORD_HEADER_SIZE: usize = 4;

/// Largest value carried by one information element.
pub const MAX_IE_VALUE_LEN: usize = 255;

/// Meta command byte of a trunk meta frame.
pub const META_TRUNK: u8 = 0x01;

// =============================================================================
// RETRANSMISSION
// =============================================================================

/// Default number of transmissions before an outgoing frame times out.
pub const DEFAULT_RETRANS_COUNT: u32 = 4;

/// Smallest accepted retransmission count.
pub const MIN_RETRANS_COUNT: u32 = 1;

/// Largest accepted retransmission count.
pub const MAX_RETRANS_COUNT: u32 = 10;

/// Default interval between retransmissions.
pub const DEFAULT_RETRANS_INTERVAL: Duration = Duration::from_millis(500);

/// Smallest accepted retransmission interval.
pub const MIN_RETRANS_INTERVAL: Duration = Duration::from_millis(200);

/// Largest accepted retransmission interval.
pub const MAX_RETRANS_INTERVAL: Duration = Duration::from_millis(5000);

/// How long a sent challenge waits for the reply once acknowledged.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// KEEPALIVE AND QUEUES
// =============================================================================

/// Default interval between pings on a call.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(20);

/// Smallest accepted ping interval.
pub const MIN_PING_INTERVAL: Duration = Duration::from_secs(10);

/// Default capacity of the inbound frame queue.
pub const DEFAULT_MAX_IN_FRAMES: usize = 100;

/// Hard upper bound of the inbound frame queue (half the 8-bit sequence space).
pub const MAX_IN_FRAMES: usize = 127;

/// Default registration refresh, in seconds.
pub const DEFAULT_REFRESH: u16 = 60;

// =============================================================================
// TRUNKING
// =============================================================================

/// Default trunk send interval.
pub const DEFAULT_TRUNK_SEND_INTERVAL: Duration = Duration::from_millis(20);

/// Smallest accepted trunk send interval.
pub const MIN_TRUNK_SEND_INTERVAL: Duration = Duration::from_millis(5);

/// Default maximum trunk datagram size.
pub const DEFAULT_TRUNK_MAX_LEN: usize = 1400;

/// Smallest accepted trunk datagram size.
pub const MIN_TRUNK_MAX_LEN: usize = 20;

/// Largest accepted trunk datagram size (largest UDP payload over IPv4).
pub const MAX_TRUNK_MAX_LEN: usize = 65_507;

/// Trunk timestamps within this distance of the ideal tick snap to it.
pub const TRUNK_TS_JITTER: u32 = 10;

// =============================================================================
// MEDIA
// =============================================================================

/// Default reorder tolerance when rebuilding mini frame timestamps.
pub const DEFAULT_MINI_REORDER_TOLERANCE: u32 = 0x7fff;

/// Mask of the timestamp fragment carried by an audio mini frame.
pub const AUDIO_TS_MASK: u32 = 0xffff;

/// Mask of the timestamp fragment carried by a video meta frame.
pub const VIDEO_TS_MASK: u32 = 0x7fff;
