//! Wire codec for the four IAX2 frame shapes.
//!
//! ```text
//! Full frame (12 bytes + payload)
//! +-+---------------+-+---------------+-------------------------------+
//! |F| source call   |R| dest call     | timestamp (32, big endian)    |
//! +-+---------------+-+---------------+-------+-------+-------+-------+
//!                                     | oseq  | iseq  | type  | subcl |
//!                                     +-------+-------+-------+-------+
//! Mini frame (4 bytes + payload)
//! +-+---------------+---------------+
//! |0| source call   | timestamp (16)|
//! +-+---------------+---------------+
//! Video meta frame (6 bytes + payload)
//! +---------------+-+-------------+-+-------------+
//! | 0x0000        |1| call        |M| ts (15)     |
//! +---------------+-+-------------+-+-------------+
//! Trunk meta frame (8 bytes + records)
//! +---------------+-------+-------+---------------+
//! | 0x0000        | 0x01  | flags | timestamp (32)|
//! +---------------+-------+-------+---------------+
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::OnceLock;

use log::{debug, warn};

use super::subclass::{pack_subclass, unpack_subclass};
use super::types::{ControlType, FrameType, IaxControl, MediaType};
use crate::core::{
    FrameDispatcher, FrameError, FULL_HEADER_SIZE, META_TRUNK, MINI_HEADER_SIZE,
    TRUNK_META_HEADER_SIZE, TRUNK_RECORD_HEADER_SIZE, TRUNK_RECORD_TS_HEADER_SIZE,
    VIDEO_META_HEADER_SIZE,
};
use crate::ie::IeList;

/// Bit 6 of the subclass byte marks the last packet of a video frame.
const VIDEO_MARK_BIT: u8 = 0x40;

/// Wire shape a frame arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Bare mini frame.
    Mini,
    /// Full frame.
    Full,
    /// Video meta frame.
    VideoMeta,
    /// Record of a trunk meta frame.
    TrunkMeta,
}

/// A decoded full frame.
///
/// The information-element list is decoded on first access and cached.
#[derive(Debug, Clone)]
pub struct FullFrame {
    /// Frame category.
    pub frame_type: FrameType,
    /// Unpacked subclass.
    pub subclass: u32,
    /// Sender's call number.
    pub source_call_no: u16,
    /// Receiver's call number.
    pub dest_call_no: u16,
    /// Outbound sequence number.
    pub oseq: u8,
    /// Inbound sequence number (next frame expected from the receiver).
    pub iseq: u8,
    /// 32-bit timestamp.
    pub timestamp: u32,
    /// Retransmission flag.
    pub retrans: bool,
    /// Video mark bit.
    pub mark: bool,
    /// Bytes after the header.
    pub payload: Vec<u8>,
    ies: OnceLock<Option<IeList>>,
}

impl PartialEq for FullFrame {
    fn eq(&self, other: &Self) -> bool {
        self.frame_type == other.frame_type
            && self.subclass == other.subclass
            && self.source_call_no == other.source_call_no
            && self.dest_call_no == other.dest_call_no
            && self.oseq == other.oseq
            && self.iseq == other.iseq
            && self.timestamp == other.timestamp
            && self.retrans == other.retrans
            && self.mark == other.mark
            && self.payload == other.payload
    }
}

impl Eq for FullFrame {}

impl FullFrame {
    /// Create a frame with zero sequence numbers and no payload.
    pub fn new(
        frame_type: FrameType,
        subclass: u32,
        source_call_no: u16,
        dest_call_no: u16,
        timestamp: u32,
    ) -> Self {
        Self {
            frame_type,
            subclass,
            source_call_no,
            dest_call_no,
            oseq: 0,
            iseq: 0,
            timestamp,
            retrans: false,
            mark: false,
            payload: Vec::new(),
            ies: OnceLock::new(),
        }
    }

    /// Create an IAX control frame.
    pub fn iax(subclass: IaxControl, source_call_no: u16, dest_call_no: u16, timestamp: u32) -> Self {
        Self::new(
            FrameType::Iax,
            subclass.as_u32(),
            source_call_no,
            dest_call_no,
            timestamp,
        )
    }

    /// Set the sequence numbers.
    pub fn with_seq(mut self, oseq: u8, iseq: u8) -> Self {
        self.oseq = oseq;
        self.iseq = iseq;
        self
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self.ies = OnceLock::new();
        self
    }

    /// Serialize `ies` as the payload.
    pub fn with_ies(self, ies: &IeList) -> Self {
        self.with_payload(ies.encode())
    }

    /// Set the retransmission flag.
    pub fn with_retrans(mut self, retrans: bool) -> Self {
        self.retrans = retrans;
        self
    }

    /// Set the video mark bit.
    pub fn with_mark(mut self, mark: bool) -> Self {
        self.mark = mark;
        self
    }

    /// Parse a full frame from a datagram.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < FULL_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: FULL_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let source_call_no = u16::from_be_bytes([bytes[0] & 0x7f, bytes[1]]);
        let retrans = bytes[2] & 0x80 != 0;
        let dest_call_no = u16::from_be_bytes([bytes[2] & 0x7f, bytes[3]]);
        let timestamp = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let frame_type = FrameType::from_byte(bytes[10]);

        let mut packed = bytes[11];
        let mut mark = false;
        if frame_type == FrameType::Video {
            mark = packed & VIDEO_MARK_BIT != 0;
            packed &= !VIDEO_MARK_BIT;
        }
        let subclass = unpack_subclass(packed).unwrap_or_else(|| {
            warn!("{frame_type} frame with invalid packed subclass {packed:#04x}");
            0
        });

        Ok(Self {
            frame_type,
            subclass,
            source_call_no,
            dest_call_no,
            oseq: bytes[8],
            iseq: bytes[9],
            timestamp,
            retrans,
            mark,
            payload: bytes[FULL_HEADER_SIZE..].to_vec(),
            ies: OnceLock::new(),
        })
    }

    /// Build the 12-byte header.
    pub fn header(&self) -> [u8; FULL_HEADER_SIZE] {
        let mut buf = [0u8; FULL_HEADER_SIZE];
        buf[0..2].copy_from_slice(&(self.source_call_no | 0x8000).to_be_bytes());
        let dest = self.dest_call_no & 0x7fff;
        let dest = if self.retrans { dest | 0x8000 } else { dest };
        buf[2..4].copy_from_slice(&dest.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8] = self.oseq;
        buf[9] = self.iseq;
        buf[10] = self.frame_type.as_byte();
        let mut packed = pack_subclass(self.subclass).unwrap_or_else(|| {
            warn!(
                "{} subclass {:#x} cannot be packed, sending 0",
                self.frame_type, self.subclass
            );
            0
        });
        if self.frame_type == FrameType::Video && self.mark {
            packed |= VIDEO_MARK_BIT;
        }
        buf[11] = packed;
        buf
    }

    /// Serialize header and payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FULL_HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.header());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decoded information elements, `None` when the payload is malformed.
    pub fn ies(&self) -> Option<&IeList> {
        self.ies
            .get_or_init(|| match IeList::decode(self.frame_type, &self.payload) {
                Ok(list) => Some(list),
                Err(err) => {
                    debug!("{self}: {err}");
                    None
                }
            })
            .as_ref()
    }

    /// IAX subclass, if this is an IAX control frame.
    pub fn iax_subclass(&self) -> Option<IaxControl> {
        match self.frame_type {
            FrameType::Iax => IaxControl::from_u32(self.subclass),
            _ => None,
        }
    }

    /// Control subclass, if this is a call-progress control frame.
    pub fn control_subclass(&self) -> Option<ControlType> {
        match self.frame_type {
            FrameType::Control => ControlType::from_u32(self.subclass),
            _ => None,
        }
    }

    /// Whether this frame is the IAX subclass `sub`.
    pub fn is_iax(&self, sub: IaxControl) -> bool {
        self.iax_subclass() == Some(sub)
    }

    /// Whether this frame neither advances nor is checked against the
    /// inbound sequence counter.
    pub fn is_unsequenced(&self) -> bool {
        self.iax_subclass().is_some_and(IaxControl::is_unsequenced)
    }
}

impl fmt::Display for FullFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.iax_subclass(), self.control_subclass()) {
            (Some(sub), _) => write!(f, "{}/{}", self.frame_type, sub)?,
            (_, Some(sub)) => write!(f, "{}/{}", self.frame_type, sub)?,
            _ => write!(f, "{}/{:#x}", self.frame_type, self.subclass)?,
        }
        write!(
            f,
            " ts={} oseq={} iseq={} src={} dst={} len={}",
            self.timestamp,
            self.oseq,
            self.iseq,
            self.source_call_no,
            self.dest_call_no,
            self.payload.len()
        )?;
        if self.retrans {
            f.write_str(" retrans")?;
        }
        if self.mark {
            f.write_str(" mark")?;
        }
        Ok(())
    }
}

/// A media frame without a full header: a mini frame, a video meta frame or
/// one record of a trunk meta frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiniFrame {
    /// Sender's call number.
    pub call_no: u16,
    /// Timestamp fragment (16 bits for audio, 15 for video, 32 for a trunk
    /// record without its own timestamp).
    pub timestamp: u32,
    /// Audio or video.
    pub media: MediaType,
    /// Video mark bit.
    pub mark: bool,
    /// Retransmission flag (trunk records only).
    pub retrans: bool,
    /// False for a trunk record without its own timestamp; `timestamp`
    /// is then the trunk's clock, not the call's.
    pub timestamped: bool,
    /// Shape the frame arrived in.
    pub kind: FrameKind,
    /// Media payload.
    pub payload: Vec<u8>,
}

impl MiniFrame {
    /// Parse a bare mini frame.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < MINI_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: MINI_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            call_no: u16::from_be_bytes([bytes[0] & 0x7f, bytes[1]]),
            timestamp: u32::from(u16::from_be_bytes([bytes[2], bytes[3]])),
            media: MediaType::Audio,
            mark: false,
            retrans: false,
            timestamped: true,
            kind: FrameKind::Mini,
            payload: bytes[MINI_HEADER_SIZE..].to_vec(),
        })
    }

    /// Parse a video meta frame.
    pub fn parse_video_meta(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < VIDEO_META_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: VIDEO_META_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            call_no: u16::from_be_bytes([bytes[2] & 0x7f, bytes[3]]),
            timestamp: u32::from(u16::from_be_bytes([bytes[4] & 0x7f, bytes[5]])),
            media: MediaType::Video,
            mark: bytes[4] & 0x80 != 0,
            retrans: false,
            timestamped: true,
            kind: FrameKind::VideoMeta,
            payload: bytes[VIDEO_META_HEADER_SIZE..].to_vec(),
        })
    }
}

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Full frame.
    Full(FullFrame),
    /// Mini, video meta or trunk record.
    Mini(MiniFrame),
}

impl Frame {
    /// Wire shape.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Full(_) => FrameKind::Full,
            Self::Mini(mini) => mini.kind,
        }
    }

    /// Sender's call number.
    pub fn source_call_no(&self) -> u16 {
        match self {
            Self::Full(full) => full.source_call_no,
            Self::Mini(mini) => mini.call_no,
        }
    }

    /// The full frame, if this is one.
    pub fn as_full(&self) -> Option<&FullFrame> {
        match self {
            Self::Full(full) => Some(full),
            Self::Mini(_) => None,
        }
    }
}

/// Walk the records of a trunk meta frame.
///
/// Every complete record is handed to `on_record` in order. A record whose
/// declared length runs past the datagram stops the walk; records already
/// delivered stay delivered. Returns the number of records delivered.
pub fn for_each_trunk_record(
    bytes: &[u8],
    mut on_record: impl FnMut(MiniFrame),
) -> Result<usize, FrameError> {
    if bytes.len() < TRUNK_META_HEADER_SIZE {
        return Err(FrameError::TooShort {
            expected: TRUNK_META_HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    if bytes[2] != META_TRUNK {
        return Err(FrameError::InvalidMetaCommand(bytes[2]));
    }
    let timestamps = bytes[3] & 0x01 != 0;
    let base_ts = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let record_header = if timestamps {
        TRUNK_RECORD_TS_HEADER_SIZE
    } else {
        TRUNK_RECORD_HEADER_SIZE
    };

    let mut offset = TRUNK_META_HEADER_SIZE;
    let mut delivered = 0;
    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < record_header {
            return Err(FrameError::TooShort {
                expected: record_header,
                actual: rest.len(),
            });
        }
        let word = |at: usize| u16::from_be_bytes([rest[at], rest[at + 1]]);
        let (call, len, timestamp) = if timestamps {
            (word(2), usize::from(word(0)), u32::from(word(4)))
        } else {
            (word(0), usize::from(word(2)), base_ts)
        };
        let available = rest.len() - record_header;
        if len > available {
            return Err(FrameError::TrunkRecordOverrun {
                offset,
                declared: len,
                available,
            });
        }
        on_record(MiniFrame {
            call_no: call & 0x7fff,
            timestamp,
            media: MediaType::Audio,
            mark: false,
            retrans: call & 0x8000 != 0,
            timestamped: timestamps,
            kind: FrameKind::TrunkMeta,
            payload: rest[record_header..record_header + len].to_vec(),
        });
        delivered += 1;
        offset += record_header + len;
    }
    Ok(delivered)
}

/// Decode one datagram.
///
/// Trunk meta frames are fanned out to `dispatcher` record by record and
/// never returned directly. Malformed input is logged and yields `None`.
pub fn decode(
    bytes: &[u8],
    sender: SocketAddr,
    dispatcher: Option<&dyn FrameDispatcher>,
) -> Option<Frame> {
    match decode_inner(bytes, sender, dispatcher) {
        Ok(frame) => frame,
        Err(err) => {
            debug!("dropping datagram from {sender}: {err}");
            None
        }
    }
}

fn decode_inner(
    bytes: &[u8],
    sender: SocketAddr,
    dispatcher: Option<&dyn FrameDispatcher>,
) -> Result<Option<Frame>, FrameError> {
    if bytes.len() < MINI_HEADER_SIZE {
        return Err(FrameError::TooShort {
            expected: MINI_HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    if bytes[0] & 0x80 != 0 {
        return FullFrame::parse(bytes).map(|full| Some(Frame::Full(full)));
    }
    if bytes[0] != 0 || bytes[1] != 0 {
        return MiniFrame::parse(bytes).map(|mini| Some(Frame::Mini(mini)));
    }
    if bytes[2] & 0x80 != 0 {
        return MiniFrame::parse_video_meta(bytes).map(|mini| Some(Frame::Mini(mini)));
    }
    let delivered = for_each_trunk_record(bytes, |record| {
        if let Some(dispatcher) = dispatcher {
            dispatcher.dispatch(sender, record);
        }
    });
    if let Err(err) = delivered {
        warn!("trunk frame from {sender}: {err}");
    }
    Ok(None)
}

/// Build a mini frame datagram.
pub fn build_mini_frame(call_no: u16, timestamp: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MINI_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&(call_no & 0x7fff).to_be_bytes());
    buf.extend_from_slice(&(timestamp as u16).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Build a video meta frame datagram.
pub fn build_video_meta_frame(call_no: u16, timestamp: u32, mark: bool, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(VIDEO_META_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&(call_no | 0x8000).to_be_bytes());
    let ts = (timestamp & 0x7fff) as u16;
    let ts = if mark { ts | 0x8000 } else { ts };
    buf.extend_from_slice(&ts.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}
