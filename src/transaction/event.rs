//! Events reported by a transaction to its owner.

use std::fmt;

use crate::core::TransactionKey;
use crate::frame::FrameType;
use crate::ie::IeList;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The peer rejected a frame with INVAL; the transaction is gone.
    Invalid,
    /// The transaction ended.
    Terminated,
    /// Retransmissions ran out.
    Timeout,
    /// The peer sent something this implementation does not handle.
    NotImplemented,
    /// A new request arrived.
    New,
    /// The peer challenged us.
    AuthReq,
    /// The peer answered our challenge.
    AuthRep,
    /// The request was accepted.
    Accept,
    /// The call was hung up.
    Hangup,
    /// The request was rejected.
    Reject,
    /// The remote end is busy.
    Busy,
    /// Text message.
    Text,
    /// DTMF digit.
    Dtmf,
    /// Comfort noise.
    Noise,
    /// The remote end answered.
    Answer,
    /// Stop sending audio.
    Quelch,
    /// Resume sending audio.
    Unquelch,
    /// Call progress.
    Progressing,
    /// The remote end is ringing.
    Ringing,
}

impl EventKind {
    /// Printable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Terminated => "Terminated",
            Self::Timeout => "Timeout",
            Self::NotImplemented => "NotImplemented",
            Self::New => "New",
            Self::AuthReq => "AuthReq",
            Self::AuthRep => "AuthRep",
            Self::Accept => "Accept",
            Self::Hangup => "Hangup",
            Self::Reject => "Reject",
            Self::Busy => "Busy",
            Self::Text => "Text",
            Self::Dtmf => "Dtmf",
            Self::Noise => "Noise",
            Self::Answer => "Answer",
            Self::Quelch => "Quelch",
            Self::Unquelch => "Unquelch",
            Self::Progressing => "Progressing",
            Self::Ringing => "Ringing",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a transaction is ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// The exchange finished normally.
    Completed,
    /// We hung up.
    LocalHangup,
    /// We rejected the request.
    LocalReject,
    /// The peer hung up.
    RemoteHangup,
    /// The peer rejected the request.
    RemoteReject,
    /// The peer is busy.
    Busy,
    /// Retransmissions ran out.
    Timeout,
    /// The peer answered with INVAL.
    Invalid,
    /// The peer asked for something we do not implement.
    Unsupported,
    /// The application abandoned the exchange.
    Aborted,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::LocalHangup => "local hangup",
            Self::LocalReject => "local reject",
            Self::RemoteHangup => "remote hangup",
            Self::RemoteReject => "remote reject",
            Self::Busy => "busy",
            Self::Timeout => "timeout",
            Self::Invalid => "invalid",
            Self::Unsupported => "unsupported",
            Self::Aborted => "aborted",
        })
    }
}

/// One event produced by [`Transaction::get_event`].
///
/// [`Transaction::get_event`]: super::Transaction::get_event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Generated by this side rather than caused by a peer frame.
    pub local: bool,
    /// Last event of the transaction.
    pub is_final: bool,
    /// Category of the frame behind the event.
    pub frame_type: FrameType,
    /// Subclass of the frame behind the event.
    pub subclass: u32,
    /// Information elements of that frame.
    pub ies: IeList,
    /// False when the frame's element list was malformed; `ies` is then
    /// empty.
    pub ies_valid: bool,
    /// Set when the event ends or starts ending the transaction.
    pub reason: Option<TerminationReason>,
    /// Transaction that produced the event.
    pub key: TransactionKey,
}

impl Event {
    /// Cause text carried by the frame, if any.
    pub fn cause(&self) -> Option<&str> {
        self.ies.get_text(crate::ie::IeType::Cause)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{:#x}) call {}/{}",
            self.kind,
            self.frame_type,
            self.subclass,
            self.key.local_call_no,
            self.key.remote_call_no
        )?;
        if self.local {
            f.write_str(" local")?;
        }
        if self.is_final {
            f.write_str(" final")?;
        }
        if let Some(reason) = self.reason {
            write!(f, " reason={reason}")?;
        }
        Ok(())
    }
}
