//! Reliable delivery of outgoing full frames.

use std::time::{Duration, Instant};

use crate::frame::FullFrame;

/// What an outgoing frame needs at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetransmitAction {
    /// Nothing to do yet.
    Wait,
    /// Send the frame again.
    Retransmit,
    /// The budget is spent.
    TimedOut,
}

/// A full frame waiting for its acknowledgement (and, for requests, its
/// reply).
///
/// The retransmission interval is fixed. Every elapsed interval consumes one
/// unit of the budget; the frame is resent while budget remains and times
/// out when it reaches zero, so a frame sent with budget `R` is transmitted
/// at most `R` times and times out `R` intervals after it was first sent.
#[derive(Debug, Clone)]
pub struct OutgoingFrame {
    frame: FullFrame,
    acked: bool,
    ack_only: bool,
    terminates: bool,
    retrans_left: u32,
    interval: Duration,
    next_trans: Instant,
    response_wait: bool,
}

impl OutgoingFrame {
    /// Track `frame`, first sent at `now`.
    ///
    /// An `ack_only` frame is complete once acknowledged; any other frame
    /// waits for a reply too.
    pub fn new(frame: FullFrame, ack_only: bool, count: u32, interval: Duration, now: Instant) -> Self {
        Self {
            frame,
            acked: false,
            ack_only,
            terminates: false,
            retrans_left: count.max(1),
            interval,
            next_trans: now + interval,
            response_wait: false,
        }
    }

    /// Mark this frame as the one that ends the transaction.
    pub fn terminating(mut self) -> Self {
        self.terminates = true;
        self
    }

    /// The frame as first sent.
    pub fn frame(&self) -> &FullFrame {
        &self.frame
    }

    /// Whether the peer acknowledged the frame.
    pub fn is_acked(&self) -> bool {
        self.acked
    }

    /// Whether an acknowledgement alone completes the frame.
    pub fn is_ack_only(&self) -> bool {
        self.ack_only
    }

    /// Whether acknowledgement of this frame ends the transaction.
    pub fn is_terminating(&self) -> bool {
        self.terminates
    }

    /// Transmissions or waits left.
    pub fn retrans_left(&self) -> u32 {
        self.retrans_left
    }

    /// Next instant this frame needs attention.
    pub fn next_trans(&self) -> Instant {
        self.next_trans
    }

    /// Whether this frame is acknowledged and complete.
    pub fn is_done(&self) -> bool {
        self.acked && self.ack_only
    }

    /// Record the acknowledgement.
    pub fn ack(&mut self) {
        self.acked = true;
    }

    /// Whether an explicit ACK with this timestamp and outbound sequence
    /// number acknowledges this frame.
    pub fn matches_ack(&self, ack: &FullFrame) -> bool {
        self.frame.timestamp == ack.timestamp && self.frame.iseq == ack.oseq
    }

    /// Whether the peer's inbound counter `peer_iseq` has passed this frame.
    pub fn passed_by(&self, peer_iseq: u8) -> bool {
        (peer_iseq.wrapping_sub(self.frame.oseq) as i8) > 0
    }

    /// Stop retransmitting and wait until `deadline` for the reply.
    ///
    /// Applied once, to an acknowledged challenge.
    pub fn wait_for_reply(&mut self, deadline: Instant) {
        if self.response_wait {
            return;
        }
        self.response_wait = true;
        self.retrans_left = 1;
        self.next_trans = deadline;
    }

    /// Whether [`wait_for_reply`](Self::wait_for_reply) was applied.
    pub fn is_waiting_for_reply(&self) -> bool {
        self.response_wait
    }

    /// Advance the budget at `now`.
    pub(crate) fn poll(&mut self, now: Instant) -> RetransmitAction {
        if now < self.next_trans {
            return RetransmitAction::Wait;
        }
        self.retrans_left = self.retrans_left.saturating_sub(1);
        if self.retrans_left == 0 {
            return RetransmitAction::TimedOut;
        }
        self.next_trans = now + self.interval;
        if self.acked {
            RetransmitAction::Wait
        } else {
            RetransmitAction::Retransmit
        }
    }

    /// Encoded frame with the retransmission flag set.
    pub fn retransmission(&mut self) -> Vec<u8> {
        self.frame.retrans = true;
        self.frame.encode()
    }
}
