//! One IAX2 exchange: a call, a registration, a release or a poke.
//!
//! A transaction is driven from outside. The owner feeds it every frame
//! routed to it with [`Transaction::process_frame`] and polls
//! [`Transaction::get_event`] on its own cadence; retransmissions, pings and
//! timeouts all happen inside `get_event`, so a transaction never needs a
//! timer of its own. [`Transaction::next_deadline`] tells the owner when the
//! next poll is due.

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, info, trace, warn};
use rand::Rng;

use super::clock::TransactionClock;
use super::config::TransactionConfig;
use super::event::{Event, EventKind, TerminationReason};
use super::media::{MediaFraming, MediaStats, MediaStream};
use super::retransmit::{OutgoingFrame, RetransmitAction};
use super::state::{Transition, TransactionKind, TransactionState, response_transition};
use crate::core::{
    FrameWriter, IeError, MAX_IN_FRAMES, MediaSink, TransactionError, TransactionKey,
};
use crate::frame::{
    ControlType, Frame, FrameType, FullFrame, IaxControl, MediaType, MiniFrame,
    build_mini_frame, build_video_meta_frame, pack_subclass,
};
use crate::ie::{AuthMethods, FormatMask, IeList, IeType};
use crate::trunk::TrunkFrame;

/// Where a transaction writes.
#[derive(Clone)]
pub struct TransactionIo {
    writer: Arc<dyn FrameWriter>,
    media: Option<Arc<dyn MediaSink>>,
}

impl TransactionIo {
    /// Write datagrams through `writer`; inbound media is discarded.
    pub fn new(writer: Arc<dyn FrameWriter>) -> Self {
        Self {
            writer,
            media: None,
        }
    }

    /// Deliver inbound media to `sink`.
    pub fn with_media(mut self, sink: Arc<dyn MediaSink>) -> Self {
        self.media = Some(sink);
        self
    }
}

impl fmt::Debug for TransactionIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionIo")
            .field("media", &self.media.is_some())
            .finish_non_exhaustive()
    }
}

/// Control-plane counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    /// Full frames accepted.
    pub frames_in: u64,
    /// Full frames queued for reliable delivery.
    pub frames_out: u64,
    /// Retransmissions sent.
    pub retransmitted: u64,
    /// Frames dropped for arriving ahead of sequence.
    pub out_of_order: u64,
    /// Frames dropped because the inbound queue was full.
    pub dropped: u64,
}

#[derive(Debug)]
struct InboundFrame {
    frame: FullFrame,
    acked: bool,
}

enum Reply {
    None,
    Consumed,
    Event(Event),
}

/// State machine of one exchange with one peer.
pub struct Transaction {
    kind: TransactionKind,
    state: TransactionState,
    outgoing: bool,
    addr: SocketAddr,
    local_call_no: u16,
    remote_call_no: u16,
    config: TransactionConfig,
    io: TransactionIo,
    clock: TransactionClock,
    oseq: u8,
    iseq: u8,
    in_frames: VecDeque<InboundFrame>,
    out_frames: Vec<OutgoingFrame>,
    next_ping: Instant,
    local_end: bool,
    linger_until: Option<Instant>,
    end_reason: Option<TerminationReason>,
    pending: Option<Event>,
    request: IeList,
    challenge: Option<String>,
    auth_response: Option<String>,
    refresh: u16,
    format: FormatMask,
    audio: MediaStream,
    video: MediaStream,
    trunk: Option<Arc<Mutex<TrunkFrame>>>,
    stats: TransactionStats,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("outgoing", &self.outgoing)
            .field("key", &self.key())
            .field("oseq", &self.oseq)
            .field("iseq", &self.iseq)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    fn blank(
        kind: TransactionKind,
        outgoing: bool,
        local_call_no: u16,
        remote_call_no: u16,
        addr: SocketAddr,
        config: TransactionConfig,
        io: TransactionIo,
        now: Instant,
    ) -> Self {
        Self {
            kind,
            state: TransactionState::Unknown,
            outgoing,
            addr,
            local_call_no,
            remote_call_no,
            next_ping: now + config.ping_interval,
            refresh: config.refresh,
            config,
            io,
            clock: TransactionClock::with_start(now),
            oseq: 0,
            iseq: 0,
            in_frames: VecDeque::new(),
            out_frames: Vec::new(),
            local_end: false,
            linger_until: None,
            end_reason: None,
            pending: None,
            request: IeList::new(),
            challenge: None,
            auth_response: None,
            format: FormatMask::NONE,
            audio: MediaStream::new(MediaType::Audio),
            video: MediaStream::new(MediaType::Video),
            trunk: None,
            stats: TransactionStats::default(),
        }
    }

    /// Start an exchange towards `addr` and send its opening frame.
    ///
    /// `ies` become the opening frame's payload. A call gets VERSION,
    /// FORMAT and CAPABILITY added from `config` when missing; a
    /// registration gets REFRESH.
    pub fn outgoing(
        kind: TransactionKind,
        local_call_no: u16,
        addr: SocketAddr,
        ies: IeList,
        config: TransactionConfig,
        io: TransactionIo,
    ) -> Self {
        let now = Instant::now();
        let mut ies = ies;
        match kind {
            TransactionKind::New => {
                ies.insert_version();
                if !ies.contains(IeType::Format) {
                    ies.append_numeric(IeType::Format, config.format.bits());
                }
                if !ies.contains(IeType::Capability) {
                    ies.append_numeric(IeType::Capability, config.capability.bits());
                }
            }
            TransactionKind::RegReq => {
                if !ies.contains(IeType::Refresh) {
                    ies.append_numeric(IeType::Refresh, u32::from(config.refresh));
                }
            }
            TransactionKind::RegRel | TransactionKind::Poke => {}
        }

        let mut transaction = Self::blank(kind, true, local_call_no, 0, addr, config, io, now);
        if let Some(refresh) = ies.get_numeric(IeType::Refresh) {
            transaction.refresh = refresh as u16;
        }
        let opening = FullFrame::iax(kind.opening(), 0, 0, 0).with_ies(&ies);
        transaction.request = ies;
        transaction.state = TransactionState::InviteSent;
        transaction.queue(opening, false, false, now);
        debug!("{}: started outgoing {kind}", transaction.label());
        transaction
    }

    /// Start a registration (or release) of `username` towards `addr`.
    pub fn send_registration(
        release: bool,
        local_call_no: u16,
        addr: SocketAddr,
        username: &str,
        config: TransactionConfig,
        io: TransactionIo,
    ) -> Result<Self, IeError> {
        let mut ies = IeList::new();
        ies.append_text(IeType::Username, username)?;
        let kind = if release {
            TransactionKind::RegRel
        } else {
            TransactionKind::RegReq
        };
        Ok(Self::outgoing(kind, local_call_no, addr, ies, config, io))
    }

    /// Create the transaction opened by the peer's `frame`.
    ///
    /// The frame is queued; its event comes out of the first
    /// [`get_event`](Self::get_event).
    pub fn incoming(
        frame: FullFrame,
        local_call_no: u16,
        addr: SocketAddr,
        config: TransactionConfig,
        io: TransactionIo,
    ) -> Result<Self, TransactionError> {
        if frame.frame_type != FrameType::Iax {
            return Err(TransactionError::NotIaxFrame);
        }
        let kind = frame
            .iax_subclass()
            .and_then(TransactionKind::from_opening)
            .ok_or(TransactionError::UnsupportedKind(frame.subclass))?;

        let now = Instant::now();
        let mut transaction = Self::blank(
            kind,
            false,
            local_call_no,
            frame.source_call_no,
            addr,
            config,
            io,
            now,
        );
        transaction.iseq = frame.oseq.wrapping_add(1);
        transaction.stats.frames_in += 1;
        debug!("{}: incoming {kind}", transaction.label());
        transaction.in_frames.push_back(InboundFrame {
            frame,
            acked: false,
        });
        Ok(transaction)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Exchange kind.
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether we opened the exchange.
    pub fn is_outgoing(&self) -> bool {
        self.outgoing
    }

    /// Peer address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Our call number.
    pub fn local_call_no(&self) -> u16 {
        self.local_call_no
    }

    /// The peer's call number, 0 until the peer answers an outgoing
    /// exchange.
    pub fn remote_call_no(&self) -> u16 {
        self.remote_call_no
    }

    /// Lookup key.
    pub fn key(&self) -> TransactionKey {
        TransactionKey {
            addr: self.addr,
            local_call_no: self.local_call_no,
            remote_call_no: self.remote_call_no,
        }
    }

    /// Sequence number of our next full frame.
    pub fn out_seq(&self) -> u8 {
        self.oseq
    }

    /// Sequence number expected from the peer next.
    pub fn in_seq(&self) -> u8 {
        self.iseq
    }

    /// Elements of the opening frame.
    pub fn request(&self) -> &IeList {
        &self.request
    }

    /// Username of the exchange.
    pub fn username(&self) -> Option<&str> {
        self.request.get_text(IeType::Username)
    }

    /// Challenge sent to or received from the peer.
    pub fn challenge(&self) -> Option<&str> {
        self.challenge.as_deref()
    }

    /// MD5 response the peer sent to our challenge.
    pub fn auth_response(&self) -> Option<&str> {
        self.auth_response.as_deref()
    }

    /// Registration refresh in seconds.
    pub fn refresh(&self) -> u16 {
        self.refresh
    }

    /// Negotiated media format.
    pub fn format(&self) -> FormatMask {
        self.format
    }

    /// Settings.
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Control-plane counters.
    pub fn stats(&self) -> TransactionStats {
        self.stats
    }

    /// Media counters.
    pub fn media_stats(&self, media: MediaType) -> MediaStats {
        self.stream(media).stats()
    }

    /// Frames waiting for acknowledgement or reply.
    pub fn pending_out(&self) -> usize {
        self.out_frames.len()
    }

    /// Earliest instant [`get_event`](Self::get_event) has work to do.
    ///
    /// `None` once the transaction is over.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.state == TransactionState::Terminated {
            return None;
        }
        if self.pending.is_some() || !self.in_frames.is_empty() {
            return Some(self.clock.start());
        }
        let mut deadline = self.out_frames.iter().map(OutgoingFrame::next_trans).min();
        let mut consider = |at: Instant| {
            deadline = Some(deadline.map_or(at, |d| d.min(at)));
        };
        if self.state == TransactionState::Terminating {
            if let Some(linger) = self.linger_until {
                consider(linger);
            }
        } else if self.pings() {
            consider(self.next_ping);
        }
        deadline
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Feed one frame routed to this transaction.
    ///
    /// Returns whether the frame was accepted. Rejected frames (out of
    /// sequence, duplicates, late media) have already been answered as the
    /// protocol requires.
    pub fn process_frame(&mut self, frame: Frame) -> bool {
        let now = Instant::now();
        match frame {
            Frame::Full(full) => self.process_full(full, now),
            Frame::Mini(mini) => self.process_mini(mini),
        }
    }

    fn process_full(&mut self, full: FullFrame, now: Instant) -> bool {
        if self.state == TransactionState::Terminated {
            return false;
        }
        if self.remote_call_no == 0 && full.source_call_no != 0 {
            self.remote_call_no = full.source_call_no;
        }
        self.ack_passed(full.iseq);

        if full.is_iax(IaxControl::Ack) {
            self.handle_ack(&full);
            return true;
        }
        if self.state.is_ending() {
            return self.process_ending(&full);
        }
        if full.is_iax(IaxControl::Vnak) {
            self.handle_vnak(&full);
            return true;
        }

        if !full.is_unsequenced() {
            if self.in_frames.len() >= self.config.max_in_frames {
                self.stats.dropped += 1;
                debug!("{}: inbound queue full, dropping {full}", self.label());
                return false;
            }
            let delta = full.oseq.wrapping_sub(self.iseq) as i8;
            if delta > 0 {
                self.stats.out_of_order += 1;
                debug!("{}: {full} ahead of iseq={}", self.label(), self.iseq);
                self.send_vnak(now);
                return false;
            }
            if delta < 0 {
                trace!("{}: duplicate {full}", self.label());
                self.send_ack(&full);
                return false;
            }
            self.iseq = self.iseq.wrapping_add(1);
        }
        self.stats.frames_in += 1;
        trace!("{}: received {full}", self.label());

        match full.iax_subclass() {
            Some(IaxControl::Ping) => {
                self.reply_to(IaxControl::Pong, &full, now);
                return true;
            }
            Some(IaxControl::LagRq) => {
                self.reply_to(IaxControl::LagRp, &full, now);
                return true;
            }
            _ => {}
        }
        if matches!(full.frame_type, FrameType::Voice | FrameType::Video) {
            self.send_ack(&full);
            self.process_full_media(&full);
            return true;
        }
        self.in_frames.push_back(InboundFrame {
            frame: full,
            acked: false,
        });
        true
    }

    /// Ending transactions only re-acknowledge duplicates and answer
    /// anything new with INVAL.
    fn process_ending(&mut self, full: &FullFrame) -> bool {
        if full.is_unsequenced() {
            return false;
        }
        if (full.oseq.wrapping_sub(self.iseq) as i8) < 0 {
            self.send_ack(full);
        } else {
            trace!("{}: {full} after termination", self.label());
            self.send_inval(full);
        }
        false
    }

    fn ack_passed(&mut self, peer_iseq: u8) {
        for out in &mut self.out_frames {
            if !out.is_acked() && out.passed_by(peer_iseq) {
                out.ack();
            }
        }
    }

    fn handle_ack(&mut self, ack: &FullFrame) {
        if let Some(out) = self
            .out_frames
            .iter_mut()
            .find(|out| !out.is_acked() && out.matches_ack(ack))
        {
            out.ack();
        }
    }

    fn handle_vnak(&mut self, vnak: &FullFrame) {
        let mut resend = Vec::new();
        for out in &mut self.out_frames {
            if !out.is_acked() && (out.frame().oseq.wrapping_sub(vnak.iseq) as i8) >= 0 {
                resend.push(out.retransmission());
            }
        }
        debug!(
            "{}: VNAK from iseq={}, resending {}",
            self.label(),
            vnak.iseq,
            resend.len()
        );
        for data in resend {
            self.resend(&data);
        }
    }

    fn process_mini(&mut self, mini: MiniFrame) -> bool {
        if self.state != TransactionState::Connected {
            trace!("{}: mini frame outside a call", self.label());
            return false;
        }
        let tolerance = self.config.mini_reorder_tolerance;
        // Untimestamped trunk records carry the full trunk base timestamp.
        let full = !mini.timestamped;
        let stream = self.stream_mut(mini.media);
        let Some(timestamp) = stream.accept_inbound(mini.timestamp, full, tolerance) else {
            return false;
        };
        self.deliver(&mini.payload, timestamp, mini.media, mini.mark);
        true
    }

    fn process_full_media(&mut self, full: &FullFrame) {
        let media = if full.frame_type == FrameType::Video {
            MediaType::Video
        } else {
            MediaType::Audio
        };
        if self.state != TransactionState::Connected {
            trace!("{}: media outside a call", self.label());
            return;
        }
        let tolerance = self.config.mini_reorder_tolerance;
        let stream = self.stream_mut(media);
        let format = FormatMask::from_bits(full.subclass);
        if !format.is_empty() {
            stream.set_format_in(format);
        }
        if let Some(timestamp) = stream.accept_inbound(full.timestamp, true, tolerance) {
            self.deliver(&full.payload, timestamp, media, full.mark);
        }
    }

    fn deliver(&mut self, payload: &[u8], timestamp: u32, media: MediaType, mark: bool) {
        let key = self.key();
        self.stream_mut(media).record_received(payload.len());
        if let Some(sink) = &self.io.media {
            sink.on_media(key, payload, timestamp, media, mark);
        }
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Advance the transaction to `now` and return the next event, if any.
    ///
    /// Acknowledges queued inbound frames, sends due pings and
    /// retransmissions, matches replies against outstanding requests and
    /// handles the peer's requests. After the final event this returns
    /// `None` forever.
    pub fn get_event(&mut self, now: Instant) -> Option<Event> {
        if self.state == TransactionState::Terminated {
            return None;
        }
        if let Some(event) = self.pending.take() {
            if event.is_final {
                self.enter_terminated();
            }
            return Some(event);
        }
        self.ack_in_frames();
        if self.state == TransactionState::Terminating {
            return self.poll_terminating(now);
        }

        if self.pings() && now >= self.next_ping {
            self.next_ping = now + self.config.ping_interval;
            self.queue(FullFrame::iax(IaxControl::Ping, 0, 0, 0), false, false, now);
        }
        if let Some(event) = self.poll_out_frames(now) {
            return Some(event);
        }
        while let Some(inbound) = self.in_frames.pop_front() {
            if let Some(event) = self.handle_request(inbound.frame, now) {
                return Some(event);
            }
        }
        None
    }

    fn pings(&self) -> bool {
        self.kind == TransactionKind::New && !self.state.is_ending() && self.remote_call_no != 0
    }

    fn ack_in_frames(&mut self) {
        let (local, iseq) = (self.local_call_no, self.iseq);
        let mut acks = Vec::new();
        for inbound in &mut self.in_frames {
            if !inbound.acked && !inbound.frame.is_unsequenced() {
                inbound.acked = true;
                acks.push(ack_frame(local, iseq, &inbound.frame));
            }
        }
        for ack in acks {
            self.write(&ack.encode());
        }
    }

    fn poll_out_frames(&mut self, now: Instant) -> Option<Event> {
        let mut i = 0;
        while i < self.out_frames.len() {
            if self.out_frames[i].is_done() {
                self.out_frames.remove(i);
                continue;
            }
            if !self.out_frames[i].is_ack_only() {
                match self.match_reply(i, now) {
                    Reply::Event(event) => return Some(event),
                    Reply::Consumed => continue,
                    Reply::None => {}
                }
            }
            let auth_timeout = self.config.auth_timeout;
            let out = &mut self.out_frames[i];
            let challenge = matches!(
                out.frame().iax_subclass(),
                Some(IaxControl::AuthReq | IaxControl::RegAuth)
            );
            if challenge && out.is_acked() {
                out.wait_for_reply(now + auth_timeout);
            }
            match out.poll(now) {
                RetransmitAction::Wait => {}
                RetransmitAction::Retransmit => {
                    let data = out.retransmission();
                    self.resend(&data);
                }
                RetransmitAction::TimedOut => {
                    let out = self.out_frames.remove(i);
                    return Some(self.timed_out(&out));
                }
            }
            i += 1;
        }
        None
    }

    fn match_reply(&mut self, i: usize, now: Instant) -> Reply {
        let sent = self.out_frames[i].frame();
        let Some(sent_sub) = sent.iax_subclass() else {
            return Reply::None;
        };
        let sent_ts = sent.timestamp;

        if matches!(sent_sub, IaxControl::Ping | IaxControl::LagRq) {
            let wanted = if sent_sub == IaxControl::Ping {
                IaxControl::Pong
            } else {
                IaxControl::LagRp
            };
            let found = self
                .in_frames
                .iter()
                .position(|f| f.frame.is_iax(wanted) && f.frame.timestamp >= sent_ts);
            if let Some(pos) = found {
                self.in_frames.remove(pos);
                self.out_frames.remove(i);
                return Reply::Consumed;
            }
            return Reply::None;
        }

        let (kind, state) = (self.kind, self.state);
        let found = self.in_frames.iter().enumerate().find_map(|(pos, f)| {
            f.frame
                .iax_subclass()
                .and_then(|received| response_transition(kind, state, sent_sub, received))
                .map(|transition| (pos, transition))
        });
        let Some((pos, transition)) = found else {
            return Reply::None;
        };
        let Some(inbound) = self.in_frames.remove(pos) else {
            return Reply::None;
        };
        self.out_frames.remove(i);
        Reply::Event(self.apply_reply(transition, inbound.frame, now))
    }

    fn apply_reply(&mut self, transition: Transition, frame: FullFrame, now: Instant) -> Event {
        let ies = frame.ies();
        match transition.event {
            EventKind::AuthReq => {
                let methods = ies
                    .and_then(|l| l.get_numeric(IeType::AuthMethods))
                    .map(|bits| AuthMethods::from_bits(bits as u16));
                let challenge = ies.and_then(|l| l.get_text(IeType::Challenge));
                match (methods, challenge) {
                    (Some(methods), Some(challenge)) if methods.contains(AuthMethods::MD5) => {
                        self.challenge = Some(challenge.to_owned());
                    }
                    _ => {
                        return self.internal_reject(
                            "Unsupported or missing authentication method or missing challenge",
                            now,
                        );
                    }
                }
            }
            EventKind::AuthRep => {
                self.auth_response = ies
                    .and_then(|l| l.get_text(IeType::Md5Result))
                    .map(str::to_owned);
            }
            EventKind::Accept if self.kind == TransactionKind::New => {
                let format = ies
                    .and_then(|l| l.get_numeric(IeType::Format))
                    .map_or(FormatMask::NONE, FormatMask::from_bits);
                let format = format.intersect(self.config.capability);
                if format.is_empty() {
                    return self
                        .internal_reject("Unsupported or missing media format or capability", now);
                }
                self.set_format(format);
            }
            EventKind::Accept if self.kind == TransactionKind::RegReq => {
                if let Some(refresh) = ies.and_then(|l| l.get_numeric(IeType::Refresh)) {
                    self.refresh = refresh as u16;
                }
            }
            _ => {}
        }

        if transition.next == TransactionState::Terminating {
            let reason = match transition.event {
                EventKind::Accept => TerminationReason::Completed,
                EventKind::Hangup => TerminationReason::RemoteHangup,
                _ => TerminationReason::RemoteReject,
            };
            return self.terminate_remote(transition.event, &frame, reason, now);
        }
        debug!(
            "{}: {} -> {} on {frame}",
            self.label(),
            self.state,
            transition.next
        );
        self.state = transition.next;
        self.event_for(transition.event, &frame)
    }

    fn handle_request(&mut self, frame: FullFrame, now: Instant) -> Option<Event> {
        if frame.is_iax(IaxControl::Inval) {
            debug!("{}: peer answered INVAL", self.label());
            let event = self.event_for(EventKind::Invalid, &frame);
            return Some(self.finish(event, TerminationReason::Invalid));
        }
        match self.state {
            TransactionState::Unknown => self.start_incoming(frame, now),
            TransactionState::Connected => self.handle_connected(frame, now),
            _ => self.handle_pending(frame, now),
        }
    }

    fn start_incoming(&mut self, frame: FullFrame, now: Instant) -> Option<Event> {
        let ies = frame.ies();
        match self.kind {
            TransactionKind::New => {
                if !ies.is_some_and(IeList::valid_version) {
                    return Some(self.internal_reject("Unsupported or missing protocol version", now));
                }
                if ies.and_then(|l| l.get_text_bytes(IeType::Username)).is_none() {
                    return Some(self.internal_reject("Username is missing", now));
                }
                let format = self.negotiate_format(ies);
                if format.is_empty() {
                    return Some(
                        self.internal_reject("Unsupported or missing media format or capability", now),
                    );
                }
                self.format = format;
            }
            TransactionKind::RegReq | TransactionKind::RegRel => {
                if ies.and_then(|l| l.get_text_bytes(IeType::Username)).is_none() {
                    return Some(self.internal_reject("Username is missing", now));
                }
                if let Some(refresh) = ies.and_then(|l| l.get_numeric(IeType::Refresh)) {
                    self.refresh = refresh as u16;
                }
            }
            TransactionKind::Poke => {
                let pong = FullFrame::iax(IaxControl::Pong, 0, 0, frame.timestamp);
                self.end_locally(pong, TerminationReason::Completed, now);
                return None;
            }
        }
        if let Some(ies) = ies {
            self.request = ies.clone();
        }
        self.state = TransactionState::InviteReceived;
        Some(self.event_for(EventKind::New, &frame))
    }

    /// Format for an incoming call: the peer's preferred format when we
    /// support it, otherwise our preferred or first common one.
    fn negotiate_format(&self, ies: Option<&IeList>) -> FormatMask {
        let ours = self.config.capability;
        let preferred = ies
            .and_then(|l| l.get_numeric(IeType::Format))
            .map_or(FormatMask::NONE, FormatMask::from_bits);
        if !preferred.is_empty() && ours.contains(preferred) {
            return preferred;
        }
        let theirs = ies
            .and_then(|l| l.get_numeric(IeType::Capability))
            .map_or(preferred, FormatMask::from_bits);
        let common = ours.intersect(theirs);
        if common.contains(self.config.format) && !self.config.format.is_empty() {
            self.config.format
        } else {
            common.first()
        }
    }

    fn handle_pending(&mut self, frame: FullFrame, now: Instant) -> Option<Event> {
        let reason = match (frame.iax_subclass(), frame.control_subclass()) {
            (Some(IaxControl::Hangup), _) | (_, Some(ControlType::Hangup)) => {
                TerminationReason::RemoteHangup
            }
            (Some(IaxControl::Reject | IaxControl::RegRej), _) => TerminationReason::RemoteReject,
            _ => {
                trace!("{}: ignoring {frame} in {}", self.label(), self.state);
                return None;
            }
        };
        Some(self.terminate_remote(EventKind::Reject, &frame, reason, now))
    }

    fn handle_connected(&mut self, frame: FullFrame, now: Instant) -> Option<Event> {
        let kind = match frame.frame_type {
            FrameType::Control => match frame.control_subclass() {
                Some(ControlType::Hangup) => {
                    return Some(self.terminate_remote(
                        EventKind::Hangup,
                        &frame,
                        TerminationReason::RemoteHangup,
                        now,
                    ));
                }
                Some(ControlType::Busy) => {
                    return Some(self.terminate_remote(
                        EventKind::Busy,
                        &frame,
                        TerminationReason::Busy,
                        now,
                    ));
                }
                Some(ControlType::Ringing) => EventKind::Ringing,
                Some(ControlType::Answer) => EventKind::Answer,
                Some(ControlType::Progressing | ControlType::Proceeding) => EventKind::Progressing,
                _ => EventKind::NotImplemented,
            },
            FrameType::Iax => match frame.iax_subclass() {
                Some(IaxControl::Quelch) => EventKind::Quelch,
                Some(IaxControl::Unquelch) => EventKind::Unquelch,
                Some(IaxControl::Hangup | IaxControl::Reject) => {
                    return Some(self.terminate_remote(
                        EventKind::Hangup,
                        &frame,
                        TerminationReason::RemoteHangup,
                        now,
                    ));
                }
                Some(IaxControl::Transfer | IaxControl::TxReady) => {
                    self.send_unsupport(&frame, now);
                    return Some(self.terminate_remote(
                        EventKind::NotImplemented,
                        &frame,
                        TerminationReason::Unsupported,
                        now,
                    ));
                }
                Some(
                    IaxControl::DpReq
                    | IaxControl::Dial
                    | IaxControl::TxReq
                    | IaxControl::TxCnt
                    | IaxControl::TxAcc
                    | IaxControl::TxRel
                    | IaxControl::TxRej
                    | IaxControl::Mwi
                    | IaxControl::Provision
                    | IaxControl::FwDownl,
                ) => {
                    self.send_unsupport(&frame, now);
                    EventKind::NotImplemented
                }
                _ => {
                    trace!("{}: ignoring {frame}", self.label());
                    return None;
                }
            },
            FrameType::Dtmf => EventKind::Dtmf,
            FrameType::Text => EventKind::Text,
            FrameType::Noise => EventKind::Noise,
            FrameType::Image | FrameType::Html => EventKind::NotImplemented,
            _ => return None,
        };
        Some(self.event_for(kind, &frame))
    }

    fn poll_terminating(&mut self, now: Instant) -> Option<Event> {
        self.in_frames.clear();
        let reason = self.end_reason.unwrap_or(TerminationReason::Completed);
        if !self.local_end {
            if self.linger_until.is_some_and(|until| now >= until) {
                let event = self.local_event(EventKind::Terminated, FrameType::Iax, 0);
                return Some(self.finish(event, reason));
            }
            return None;
        }

        let mut i = 0;
        while i < self.out_frames.len() {
            let out = &mut self.out_frames[i];
            if out.is_acked() {
                if out.is_terminating() {
                    let (frame_type, subclass) = (out.frame().frame_type, out.frame().subclass);
                    let event = self.local_event(EventKind::Terminated, frame_type, subclass);
                    return Some(self.finish(event, reason));
                }
                self.out_frames.remove(i);
                continue;
            }
            match out.poll(now) {
                RetransmitAction::Wait => {}
                RetransmitAction::Retransmit => {
                    let data = out.retransmission();
                    self.resend(&data);
                }
                RetransmitAction::TimedOut => {
                    let out = self.out_frames.remove(i);
                    return Some(self.timed_out(&out));
                }
            }
            i += 1;
        }
        if self.out_frames.is_empty() {
            let event = self.local_event(EventKind::Terminated, FrameType::Iax, 0);
            return Some(self.finish(event, reason));
        }
        None
    }

    // =========================================================================
    // LOCAL OPERATIONS
    // =========================================================================

    /// Accept the peer's call or registration.
    ///
    /// A call moves to Connected. A registration is answered with REGACK
    /// and ends. Returns false when the state does not allow it.
    pub fn accept(&mut self) -> bool {
        if self.outgoing
            || !matches!(
                self.state,
                TransactionState::InviteReceived | TransactionState::AuthReplyReceived
            )
        {
            return false;
        }
        let now = Instant::now();
        let mut ies = IeList::new();
        match self.kind {
            TransactionKind::New => {
                ies.append_numeric(IeType::Format, self.format.bits())
                    .append_numeric(IeType::Capability, self.config.capability.bits());
                self.queue(FullFrame::iax(IaxControl::Accept, 0, 0, 0).with_ies(&ies), true, false, now);
                self.set_format(self.format);
                self.state = TransactionState::Connected;
                self.next_ping = now + self.config.ping_interval;
                debug!("{}: call accepted, format {}", self.label(), self.format);
            }
            TransactionKind::RegReq | TransactionKind::RegRel => {
                if let Some(username) = self.username() {
                    if let Err(err) = ies.append_text(IeType::Username, username) {
                        warn!("{}: {err}", self.label());
                    }
                }
                if self.kind == TransactionKind::RegReq {
                    ies.append_numeric(IeType::Refresh, u32::from(self.refresh));
                }
                ies.append_addr(self.addr);
                let ack = FullFrame::iax(IaxControl::RegAck, 0, 0, 0).with_ies(&ies);
                self.end_locally(ack, TerminationReason::Completed, now);
            }
            TransactionKind::Poke => return false,
        }
        true
    }

    /// Reject the peer's request with an optional cause.
    pub fn reject(&mut self, cause: &str, code: u8) -> bool {
        let subclass = match self.kind {
            TransactionKind::New => IaxControl::Reject,
            TransactionKind::RegReq | TransactionKind::RegRel => IaxControl::RegRej,
            TransactionKind::Poke => return false,
        };
        if self.outgoing
            || self.state.is_ending()
            || self.state == TransactionState::Connected
        {
            return false;
        }
        let frame = FullFrame::iax(subclass, 0, 0, 0).with_ies(&cause_ies(cause, code));
        self.end_locally(frame, TerminationReason::LocalReject, Instant::now());
        true
    }

    /// Hang up a call with an optional cause.
    ///
    /// Calling it again, or on an ended call, does nothing and returns
    /// false.
    pub fn hangup(&mut self, cause: &str, code: u8) -> bool {
        if self.kind != TransactionKind::New || self.state.is_ending() {
            return false;
        }
        let frame = FullFrame::iax(IaxControl::Hangup, 0, 0, 0).with_ies(&cause_ies(cause, code));
        self.end_locally(frame, TerminationReason::LocalHangup, Instant::now());
        true
    }

    /// Challenge the peer's request with MD5 authentication.
    pub fn send_auth_request(&mut self) -> bool {
        let subclass = match self.kind {
            TransactionKind::New => IaxControl::AuthReq,
            TransactionKind::RegReq | TransactionKind::RegRel => IaxControl::RegAuth,
            TransactionKind::Poke => return false,
        };
        if self.outgoing || self.state != TransactionState::InviteReceived {
            return false;
        }
        let challenge = rand::thread_rng()
            .gen_range(100_000_000u32..=999_999_999)
            .to_string();
        let mut ies = IeList::new();
        if let Some(username) = self.username() {
            if let Err(err) = ies.append_text(IeType::Username, username) {
                warn!("{}: {err}", self.label());
            }
        }
        ies.append_numeric(IeType::AuthMethods, u32::from(AuthMethods::MD5.bits()));
        if let Err(err) = ies.append_text(IeType::Challenge, &challenge) {
            warn!("{}: {err}", self.label());
            return false;
        }
        self.challenge = Some(challenge);
        let frame = FullFrame::iax(subclass, 0, 0, 0).with_ies(&ies);
        self.queue(frame, false, false, Instant::now());
        self.state = TransactionState::AuthRequestSent;
        true
    }

    /// Answer the peer's challenge with the computed MD5 `response`.
    pub fn send_auth_reply(&mut self, response: &str) -> bool {
        if !self.outgoing || self.state != TransactionState::AuthRequestReceived {
            return false;
        }
        let mut ies = IeList::new();
        let subclass = match self.kind {
            TransactionKind::New => IaxControl::AuthRep,
            TransactionKind::RegReq | TransactionKind::RegRel => {
                if let Some(username) = self.username() {
                    if let Err(err) = ies.append_text(IeType::Username, username) {
                        warn!("{}: {err}", self.label());
                    }
                }
                if self.kind == TransactionKind::RegReq {
                    ies.append_numeric(IeType::Refresh, u32::from(self.refresh));
                }
                self.kind.opening()
            }
            TransactionKind::Poke => return false,
        };
        if let Err(err) = ies.append_text(IeType::Md5Result, response) {
            warn!("{}: {err}", self.label());
            return false;
        }
        let frame = FullFrame::iax(subclass, 0, 0, 0).with_ies(&ies);
        self.queue(frame, false, false, Instant::now());
        self.state = TransactionState::AuthReplySent;
        true
    }

    /// Abandon an outgoing registration without waiting for its answer.
    ///
    /// The next [`get_event`](Self::get_event) returns the final event.
    pub fn abort_registration(&mut self) -> bool {
        if !self.kind.is_registration() || !self.outgoing || self.state.is_ending() {
            return false;
        }
        self.out_frames.clear();
        self.in_frames.clear();
        self.state = TransactionState::Terminating;
        self.local_end = true;
        let mut event = self.local_event(EventKind::Terminated, FrameType::Iax, self.kind.opening().as_u32());
        event.is_final = true;
        event.reason = Some(TerminationReason::Aborted);
        self.pending = Some(event);
        true
    }

    /// Send a text message on a call.
    pub fn send_text(&mut self, text: &str) -> bool {
        self.send_in_call(FrameType::Text, 0, text.as_bytes().to_vec())
    }

    /// Send a DTMF digit on a call.
    pub fn send_dtmf(&mut self, digit: char) -> bool {
        if !digit.is_ascii() {
            return false;
        }
        self.send_in_call(FrameType::Dtmf, u32::from(digit), Vec::new())
    }

    /// Send a call-progress control frame on a call.
    pub fn send_control(&mut self, control: ControlType) -> bool {
        self.send_in_call(FrameType::Control, control.as_u32(), Vec::new())
    }

    /// Tell the peer we are ringing.
    pub fn send_ringing(&mut self) -> bool {
        self.send_control(ControlType::Ringing)
    }

    /// Tell the peer we answered.
    pub fn send_answer(&mut self) -> bool {
        self.send_control(ControlType::Answer)
    }

    /// Tell the peer the call is progressing.
    pub fn send_progress(&mut self) -> bool {
        self.send_control(ControlType::Progressing)
    }

    fn send_in_call(&mut self, frame_type: FrameType, subclass: u32, payload: Vec<u8>) -> bool {
        if self.kind != TransactionKind::New || self.state != TransactionState::Connected {
            return false;
        }
        let frame = FullFrame::new(frame_type, subclass, 0, 0, 0).with_payload(payload);
        self.queue(frame, true, false, Instant::now())
    }

    /// Send an arbitrary full frame.
    ///
    /// A zero `timestamp` is replaced with the transaction clock. With
    /// `ack_only` the frame is complete once acknowledged; otherwise it
    /// waits for a reply until its retransmissions run out.
    pub fn post(
        &mut self,
        frame_type: FrameType,
        subclass: u32,
        payload: Vec<u8>,
        timestamp: u32,
        ack_only: bool,
    ) -> bool {
        if self.state.is_ending() {
            return false;
        }
        let frame = FullFrame::new(frame_type, subclass, 0, 0, timestamp).with_payload(payload);
        self.queue(frame, ack_only, false, Instant::now())
    }

    /// Route this call's compact audio through `trunk`.
    pub fn enable_trunking(&mut self, trunk: Arc<Mutex<TrunkFrame>>) {
        self.trunk = Some(trunk);
    }

    /// Stop trunking this call's audio.
    pub fn disable_trunking(&mut self) {
        self.trunk = None;
    }

    /// Whether audio goes through a trunk.
    pub fn is_trunking(&self) -> bool {
        self.trunk.is_some()
    }

    /// Send one media payload in `format` on a connected call.
    ///
    /// A full frame goes out when the format changes, for the first
    /// payload and when the timestamp outgrows what a compact frame
    /// carries; otherwise audio goes as a mini frame (or trunk record) and
    /// video as a video meta frame.
    pub fn send_media(&mut self, payload: &[u8], format: FormatMask, media: MediaType, mark: bool) -> bool {
        if self.state != TransactionState::Connected || payload.is_empty() {
            return false;
        }
        let now = Instant::now();
        let ts = self.clock.timestamp(now);
        let (ts, framing) = self.stream_mut(media).prepare_outbound(ts, format, payload.len());
        match (framing, media) {
            (MediaFraming::Full, _) => {
                let frame = FullFrame::new(media.frame_type(), format.bits(), 0, 0, ts)
                    .with_payload(payload.to_vec())
                    .with_mark(mark);
                self.queue(frame, true, false, now)
            }
            (MediaFraming::Compact, MediaType::Audio) => match &self.trunk {
                Some(trunk) => match trunk.lock() {
                    Ok(mut trunk) => trunk.add(self.local_call_no, payload, ts) > 0,
                    Err(_) => {
                        warn!("{}: trunk lock poisoned", self.label());
                        false
                    }
                },
                None => {
                    self.write(&build_mini_frame(self.local_call_no, ts, payload));
                    true
                }
            },
            (MediaFraming::Compact, MediaType::Video) => {
                self.write(&build_video_meta_frame(self.local_call_no, ts, mark, payload));
                true
            }
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn label(&self) -> String {
        format!(
            "call {}/{} {}",
            self.local_call_no, self.remote_call_no, self.addr
        )
    }

    fn stream(&self, media: MediaType) -> &MediaStream {
        match media {
            MediaType::Audio => &self.audio,
            MediaType::Video => &self.video,
        }
    }

    fn stream_mut(&mut self, media: MediaType) -> &mut MediaStream {
        match media {
            MediaType::Audio => &mut self.audio,
            MediaType::Video => &mut self.video,
        }
    }

    fn set_format(&mut self, format: FormatMask) {
        self.format = format;
        if !format.audio().is_empty() {
            self.audio.set_format_in(format.audio());
        }
        if !format.video().is_empty() {
            self.video.set_format_in(format.video());
        }
    }

    fn resend(&mut self, data: &[u8]) {
        self.stats.retransmitted += 1;
        trace!("{}: retransmitting {} bytes", self.label(), data.len());
        self.write(data);
    }

    fn write(&self, data: &[u8]) {
        if let Err(err) = self.io.writer.write_to(data, self.addr) {
            debug!("{}: write failed: {err}", self.label());
        }
    }

    /// Number, stamp and send `frame`, then track it until acknowledged.
    ///
    /// Refuses frames whose subclass has no wire encoding.
    fn queue(&mut self, mut frame: FullFrame, ack_only: bool, terminates: bool, now: Instant) -> bool {
        if pack_subclass(frame.subclass).is_none() {
            warn!(
                "{}: {} subclass {:#x} cannot be packed, not sending",
                self.label(),
                frame.frame_type,
                frame.subclass
            );
            return false;
        }
        if self.out_frames.len() >= MAX_IN_FRAMES {
            warn!("{}: outbound queue full, dropping {frame}", self.label());
            return false;
        }
        frame.source_call_no = self.local_call_no;
        frame.dest_call_no = self.remote_call_no;
        if frame.timestamp == 0 {
            frame.timestamp = self.clock.next_full(now);
        }
        frame.oseq = self.oseq;
        frame.iseq = self.iseq;
        if !frame.is_unsequenced() {
            self.oseq = self.oseq.wrapping_add(1);
        }
        self.write(&frame.encode());
        self.stats.frames_out += 1;
        trace!("{}: sent {frame}", self.label());

        let mut out = OutgoingFrame::new(
            frame,
            ack_only,
            self.config.retrans_count,
            self.config.retrans_interval,
            now,
        );
        if terminates {
            out = out.terminating();
        }
        self.out_frames.push(out);
        true
    }

    fn send_ack(&self, frame: &FullFrame) {
        self.write(&ack_frame(self.local_call_no, self.iseq, frame).encode());
    }

    fn send_vnak(&self, now: Instant) {
        let vnak = FullFrame::iax(
            IaxControl::Vnak,
            self.local_call_no,
            self.remote_call_no,
            self.clock.timestamp(now),
        )
        .with_seq(self.oseq, self.iseq);
        self.write(&vnak.encode());
    }

    fn send_inval(&self, frame: &FullFrame) {
        let inval = FullFrame::iax(IaxControl::Inval, self.local_call_no, frame.source_call_no, frame.timestamp)
            .with_seq(self.oseq, self.iseq);
        self.write(&inval.encode());
    }

    fn send_unsupport(&mut self, frame: &FullFrame, now: Instant) {
        let mut ies = IeList::new();
        ies.append_numeric(IeType::IaxUnknown, frame.subclass & 0xff);
        let unsupport = FullFrame::iax(IaxControl::Unsupport, 0, 0, 0).with_ies(&ies);
        self.queue(unsupport, true, false, now);
    }

    fn reply_to(&mut self, subclass: IaxControl, request: &FullFrame, now: Instant) {
        let reply = FullFrame::iax(subclass, 0, 0, request.timestamp);
        self.queue(reply, true, false, now);
    }

    /// Send `frame` and end once the peer acknowledges it.
    fn end_locally(&mut self, frame: FullFrame, reason: TerminationReason, now: Instant) {
        self.out_frames.clear();
        self.in_frames.clear();
        self.state = TransactionState::Terminating;
        self.local_end = true;
        self.end_reason = Some(reason);
        debug!("{}: ending ({reason})", self.label());
        self.queue(frame, true, true, now);
    }

    fn internal_reject(&mut self, cause: &str, now: Instant) -> Event {
        let subclass = if self.kind.is_registration() {
            IaxControl::RegRej
        } else {
            IaxControl::Reject
        };
        let ies = cause_ies(cause, 0);
        debug!("{}: rejecting: {cause}", self.label());
        self.end_locally(
            FullFrame::iax(subclass, 0, 0, 0).with_ies(&ies),
            TerminationReason::LocalReject,
            now,
        );
        let mut event = self.local_event(EventKind::Reject, FrameType::Iax, subclass.as_u32());
        event.ies = ies;
        event.reason = Some(TerminationReason::LocalReject);
        event
    }

    /// Enter Terminating on the peer's behalf; lingers to re-acknowledge
    /// retransmissions of the peer's last frame.
    fn terminate_remote(
        &mut self,
        kind: EventKind,
        frame: &FullFrame,
        reason: TerminationReason,
        now: Instant,
    ) -> Event {
        self.out_frames.clear();
        self.in_frames.clear();
        self.state = TransactionState::Terminating;
        self.local_end = false;
        self.end_reason = Some(reason);
        self.linger_until = Some(now + self.config.linger());
        debug!("{}: peer ended ({reason})", self.label());
        let mut event = self.event_for(kind, frame);
        event.reason = Some(reason);
        event
    }

    fn timed_out(&mut self, out: &OutgoingFrame) -> Event {
        info!("{}: {} timed out", self.label(), out.frame());
        let event = self.local_event(EventKind::Timeout, out.frame().frame_type, out.frame().subclass);
        self.finish(event, TerminationReason::Timeout)
    }

    fn finish(&mut self, mut event: Event, reason: TerminationReason) -> Event {
        event.is_final = true;
        event.reason = Some(reason);
        self.enter_terminated();
        event
    }

    fn enter_terminated(&mut self) {
        self.state = TransactionState::Terminated;
        self.in_frames.clear();
        self.out_frames.clear();
        self.linger_until = None;
        info!("{}: terminated", self.label());
    }

    fn event_for(&self, kind: EventKind, frame: &FullFrame) -> Event {
        let (ies, ies_valid) = match frame.ies() {
            Some(list) => (list.clone(), true),
            None => (IeList::new(), false),
        };
        Event {
            kind,
            local: false,
            is_final: false,
            frame_type: frame.frame_type,
            subclass: frame.subclass,
            ies,
            ies_valid,
            reason: None,
            key: self.key(),
        }
    }

    fn local_event(&self, kind: EventKind, frame_type: FrameType, subclass: u32) -> Event {
        Event {
            kind,
            local: true,
            is_final: false,
            frame_type,
            subclass,
            ies: IeList::new(),
            ies_valid: true,
            reason: None,
            key: self.key(),
        }
    }
}

/// ACK for `frame`, echoing its timestamp and sequence number.
fn ack_frame(local_call_no: u16, iseq: u8, frame: &FullFrame) -> FullFrame {
    FullFrame::iax(IaxControl::Ack, local_call_no, frame.source_call_no, frame.timestamp)
        .with_seq(frame.iseq, iseq)
}

fn cause_ies(cause: &str, code: u8) -> IeList {
    let mut ies = IeList::new();
    if !cause.is_empty() {
        if let Err(err) = ies.append_text(IeType::Cause, cause) {
            debug!("dropping cause text: {err}");
        }
    }
    if code != 0 {
        ies.append_numeric(IeType::CauseCode, u32::from(code));
    }
    ies
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    use crate::trunk::TrunkConfig;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl FrameWriter for Recorder {
        fn write_to(&self, data: &[u8], _addr: SocketAddr) -> io::Result<usize> {
            self.sent.lock().unwrap().push(data.to_vec());
            Ok(data.len())
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<Vec<u8>> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }

        fn take_full(&self) -> Vec<FullFrame> {
            self.take()
                .into_iter()
                .filter(|d| d[0] & 0x80 != 0)
                .map(|d| FullFrame::parse(&d).unwrap())
                .collect()
        }
    }

    #[derive(Default)]
    struct Sink {
        media: Mutex<Vec<(u32, Vec<u8>)>>,
    }

    impl MediaSink for Sink {
        fn on_media(&self, _key: TransactionKey, payload: &[u8], ts: u32, _media: MediaType, _mark: bool) {
            self.media.lock().unwrap().push((ts, payload.to_vec()));
        }
    }

    fn peer() -> SocketAddr {
        "192.0.2.7:4569".parse().unwrap()
    }

    fn new_call_ies() -> IeList {
        let mut ies = IeList::new();
        ies.insert_version();
        ies.append_text(IeType::Username, "alice").unwrap();
        ies.append_numeric(IeType::Format, FormatMask::ULAW.bits());
        ies.append_numeric(IeType::Capability, FormatMask::ULAW.bits());
        ies
    }

    fn peer_frame(sub: IaxControl, oseq: u8, iseq: u8, ts: u32) -> FullFrame {
        FullFrame::iax(sub, 5, 1, ts).with_seq(oseq, iseq)
    }

    fn ack_of(frame: &FullFrame, peer_iseq: u8) -> Frame {
        Frame::Full(
            FullFrame::iax(IaxControl::Ack, 5, 1, frame.timestamp).with_seq(frame.iseq, peer_iseq),
        )
    }

    fn incoming_call(config: TransactionConfig) -> (Transaction, Arc<Recorder>, Arc<Sink>) {
        let recorder = Arc::new(Recorder::default());
        let sink = Arc::new(Sink::default());
        let io = TransactionIo::new(recorder.clone()).with_media(sink.clone());
        let new = peer_frame(IaxControl::New, 0, 0, 3).with_ies(&new_call_ies());
        let t = Transaction::incoming(new, 1, peer(), config, io).unwrap();
        (t, recorder, sink)
    }

    fn connected_call() -> (Transaction, Arc<Recorder>, Arc<Sink>) {
        let (mut t, recorder, sink) = incoming_call(TransactionConfig::default());
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::New);
        assert!(t.accept());
        recorder.take();
        (t, recorder, sink)
    }

    #[test]
    fn test_incoming_new_is_acked_and_reported() {
        let (mut t, recorder, _) = incoming_call(TransactionConfig::default());
        assert_eq!(t.state(), TransactionState::Unknown);
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::New);
        assert!(!event.local);
        assert!(!event.is_final);
        assert_eq!(event.ies.get_text(IeType::Username), Some("alice"));
        assert_eq!(t.state(), TransactionState::InviteReceived);
        assert_eq!(t.username(), Some("alice"));
        assert_eq!(t.format(), FormatMask::ULAW);

        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        let ack = &sent[0];
        assert!(ack.is_iax(IaxControl::Ack));
        assert_eq!((ack.source_call_no, ack.dest_call_no), (1, 5));
        assert_eq!((ack.oseq, ack.iseq), (0, 1));
        assert_eq!(ack.timestamp, 3);
    }

    #[test]
    fn test_unsupported_opening_frame() {
        let io = TransactionIo::new(Arc::new(Recorder::default()));
        let frame = peer_frame(IaxControl::Transfer, 0, 0, 3);
        let err = Transaction::incoming(frame, 1, peer(), TransactionConfig::default(), io.clone())
            .unwrap_err();
        assert!(matches!(err, TransactionError::UnsupportedKind(0x22)));

        let frame = FullFrame::new(FrameType::Voice, 4, 5, 1, 3);
        let err = Transaction::incoming(frame, 1, peer(), TransactionConfig::default(), io)
            .unwrap_err();
        assert!(matches!(err, TransactionError::NotIaxFrame));
    }

    #[test]
    fn test_missing_version_is_rejected() {
        let recorder = Arc::new(Recorder::default());
        let io = TransactionIo::new(recorder.clone());
        let mut ies = IeList::new();
        ies.append_text(IeType::Username, "alice").unwrap();
        let new = peer_frame(IaxControl::New, 0, 0, 3).with_ies(&ies);
        let mut t = Transaction::incoming(new, 1, peer(), TransactionConfig::default(), io).unwrap();

        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Reject);
        assert!(event.local);
        assert!(!event.is_final);
        assert_eq!(event.cause(), Some("Unsupported or missing protocol version"));
        assert_eq!(t.state(), TransactionState::Terminating);

        let sent = recorder.take_full();
        let reject = sent.iter().find(|f| f.is_iax(IaxControl::Reject)).unwrap();
        assert_eq!(
            reject.ies().unwrap().get_text(IeType::Cause),
            Some("Unsupported or missing protocol version")
        );

        assert!(t.process_frame(ack_of(reject, 1)));
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Terminated);
        assert!(event.is_final);
        assert_eq!(event.reason, Some(TerminationReason::LocalReject));
        assert_eq!(t.state(), TransactionState::Terminated);
        assert!(t.get_event(Instant::now()).is_none());
    }

    #[test]
    fn test_out_of_order_frame_triggers_vnak() {
        let (mut t, recorder, _) = incoming_call(TransactionConfig::default());
        t.get_event(Instant::now());
        recorder.take();

        let ahead = peer_frame(IaxControl::Quelch, 3, 0, 40);
        assert!(!t.process_frame(Frame::Full(ahead)));
        assert_eq!(t.stats().out_of_order, 1);
        assert_eq!(t.in_seq(), 1);

        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_iax(IaxControl::Vnak));
        assert_eq!(sent[0].iseq, 1);
    }

    #[test]
    fn test_duplicate_is_reacked() {
        let (mut t, recorder, _) = incoming_call(TransactionConfig::default());
        t.get_event(Instant::now());
        recorder.take();

        let again = peer_frame(IaxControl::New, 0, 0, 3).with_retrans(true);
        assert!(!t.process_frame(Frame::Full(again)));
        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_iax(IaxControl::Ack));
        assert_eq!(sent[0].timestamp, 3);
        assert_eq!(t.in_seq(), 1);
    }

    #[test]
    fn test_full_queue_drops() {
        let (mut t, _, _) = incoming_call(TransactionConfig::default().with_max_in_frames(1));
        let next = peer_frame(IaxControl::Quelch, 1, 0, 10);
        assert!(!t.process_frame(Frame::Full(next)));
        assert_eq!(t.stats().dropped, 1);
        assert_eq!(t.in_seq(), 1);
    }

    #[test]
    fn test_retransmission_budget_then_timeout() {
        let recorder = Arc::new(Recorder::default());
        let start = Instant::now();
        let mut t = Transaction::outgoing(
            TransactionKind::Poke,
            9,
            peer(),
            IeList::new(),
            TransactionConfig::default(),
            TransactionIo::new(recorder.clone()),
        );
        let interval = Duration::from_millis(500);
        let slack = Duration::from_millis(50);

        for k in 1..=3 {
            assert!(t.get_event(start + interval * k + slack).is_none());
        }
        let event = t.get_event(start + interval * 4 + slack).unwrap();
        assert_eq!(event.kind, EventKind::Timeout);
        assert!(event.is_final);
        assert_eq!(event.reason, Some(TerminationReason::Timeout));
        assert!(t.get_event(start + interval * 10).is_none());

        let sent = recorder.take_full();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|f| f.is_iax(IaxControl::Poke)));
        assert!(!sent[0].retrans);
        assert!(sent[1..].iter().all(|f| f.retrans));
    }

    #[test]
    fn test_outgoing_call_accepted() {
        let recorder = Arc::new(Recorder::default());
        let mut ies = IeList::new();
        ies.append_text(IeType::Username, "bob").unwrap();
        ies.append_text(IeType::CalledNumber, "100").unwrap();
        let mut t = Transaction::outgoing(
            TransactionKind::New,
            1,
            peer(),
            ies,
            TransactionConfig::default(),
            TransactionIo::new(recorder.clone()),
        );
        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        let new = &sent[0];
        assert!(new.is_iax(IaxControl::New));
        assert_eq!((new.oseq, new.iseq), (0, 0));
        assert!(new.ies().unwrap().valid_version());
        assert!(new.ies().unwrap().contains(IeType::Format));

        let mut accept_ies = IeList::new();
        accept_ies.append_numeric(IeType::Format, FormatMask::ULAW.bits());
        let accept = FullFrame::iax(IaxControl::Accept, 7, 1, 20)
            .with_seq(0, 1)
            .with_ies(&accept_ies);
        assert!(t.process_frame(Frame::Full(accept)));
        assert_eq!(t.remote_call_no(), 7);

        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Accept);
        assert_eq!(t.state(), TransactionState::Connected);
        assert_eq!(t.format(), FormatMask::ULAW);
        assert_eq!(t.pending_out(), 0);

        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_iax(IaxControl::Ack));
        assert_eq!(sent[0].dest_call_no, 7);
    }

    #[test]
    fn test_accept_without_common_format_is_rejected() {
        let recorder = Arc::new(Recorder::default());
        let mut t = Transaction::outgoing(
            TransactionKind::New,
            1,
            peer(),
            IeList::new(),
            TransactionConfig::default(),
            TransactionIo::new(recorder.clone()),
        );
        let mut accept_ies = IeList::new();
        accept_ies.append_numeric(IeType::Format, FormatMask::G729.bits());
        let accept = FullFrame::iax(IaxControl::Accept, 7, 1, 20)
            .with_seq(0, 1)
            .with_ies(&accept_ies);
        t.process_frame(Frame::Full(accept));
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Reject);
        assert!(event.local);
        assert_eq!(
            event.cause(),
            Some("Unsupported or missing media format or capability")
        );
        assert_eq!(t.state(), TransactionState::Terminating);
    }

    #[test]
    fn test_vnak_retransmits_unacked() {
        let recorder = Arc::new(Recorder::default());
        let mut t = Transaction::outgoing(
            TransactionKind::New,
            1,
            peer(),
            IeList::new(),
            TransactionConfig::default(),
            TransactionIo::new(recorder.clone()),
        );
        recorder.take();
        let vnak = FullFrame::iax(IaxControl::Vnak, 7, 1, 5).with_seq(0, 0);
        assert!(t.process_frame(Frame::Full(vnak)));
        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_iax(IaxControl::New));
        assert!(sent[0].retrans);
        assert_eq!(t.stats().retransmitted, 1);
    }

    #[test]
    fn test_remote_hangup_lingers_then_terminates() {
        let (mut t, recorder, _) = connected_call();
        let now = Instant::now();
        let hangup = peer_frame(IaxControl::Hangup, 1, 1, 50);
        assert!(t.process_frame(Frame::Full(hangup.clone())));
        let event = t.get_event(now).unwrap();
        assert_eq!(event.kind, EventKind::Hangup);
        assert!(!event.is_final);
        assert_eq!(event.reason, Some(TerminationReason::RemoteHangup));
        assert_eq!(t.state(), TransactionState::Terminating);
        recorder.take();

        assert!(!t.process_frame(Frame::Full(hangup.with_retrans(true))));
        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_iax(IaxControl::Ack));

        assert!(t.get_event(now + Duration::from_millis(100)).is_none());
        let event = t.get_event(now + Duration::from_secs(3)).unwrap();
        assert_eq!(event.kind, EventKind::Terminated);
        assert!(event.is_final);
        assert_eq!(event.reason, Some(TerminationReason::RemoteHangup));
        assert!(t.get_event(now + Duration::from_secs(4)).is_none());
    }

    #[test]
    fn test_local_hangup_waits_for_ack() {
        let (mut t, recorder, _) = connected_call();
        assert!(t.hangup("Normal clearing", 16));
        assert!(!t.hangup("again", 16));
        assert!(!t.send_text("too late"));

        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        let hangup = sent[0].clone();
        assert!(hangup.is_iax(IaxControl::Hangup));
        assert_eq!(hangup.ies().unwrap().get_text(IeType::Cause), Some("Normal clearing"));
        assert_eq!(hangup.ies().unwrap().get_numeric(IeType::CauseCode), Some(16));
        assert!(t.get_event(Instant::now()).is_none());

        let ringing = FullFrame::new(FrameType::Control, ControlType::Ringing.as_u32(), 5, 1, 60)
            .with_seq(1, 1);
        assert!(!t.process_frame(Frame::Full(ringing)));
        let sent = recorder.take_full();
        assert!(sent[0].is_iax(IaxControl::Inval));

        assert!(t.process_frame(ack_of(&hangup, 1)));
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Terminated);
        assert!(event.local);
        assert!(event.is_final);
        assert_eq!(event.reason, Some(TerminationReason::LocalHangup));
    }

    #[test]
    fn test_ping_answered_with_pong() {
        let (mut t, recorder, _) = connected_call();
        let ping = peer_frame(IaxControl::Ping, 1, 1, 1234);
        assert!(t.process_frame(Frame::Full(ping)));
        let sent = recorder.take_full();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_iax(IaxControl::Pong));
        assert_eq!(sent[0].timestamp, 1234);
        assert!(t.get_event(Instant::now()).is_none());
    }

    #[test]
    fn test_keepalive_ping_matched_by_pong() {
        let (mut t, recorder, _) = connected_call();
        let later = Instant::now() + Duration::from_secs(21);
        assert!(t.get_event(later).is_none());
        let sent = recorder.take_full();
        let ping = sent.iter().find(|f| f.is_iax(IaxControl::Ping)).unwrap().clone();
        let before = t.pending_out();

        let pong = peer_frame(IaxControl::Pong, 1, ping.oseq + 1, ping.timestamp);
        assert!(t.process_frame(Frame::Full(pong)));
        assert!(before >= 2);
        assert!(t.get_event(later).is_none());
        assert_eq!(t.pending_out(), 0);
    }

    #[test]
    fn test_connected_events() {
        let (mut t, _, _) = connected_call();
        let now = Instant::now();
        let ringing = FullFrame::new(FrameType::Control, ControlType::Ringing.as_u32(), 5, 1, 40)
            .with_seq(1, 1);
        let dtmf = FullFrame::new(FrameType::Dtmf, u32::from('5'), 5, 1, 41).with_seq(2, 1);
        let text = FullFrame::new(FrameType::Text, 0, 5, 1, 42)
            .with_seq(3, 1)
            .with_payload(b"hello".to_vec());
        t.process_frame(Frame::Full(ringing));
        t.process_frame(Frame::Full(dtmf));
        t.process_frame(Frame::Full(text));

        assert_eq!(t.get_event(now).unwrap().kind, EventKind::Ringing);
        let dtmf = t.get_event(now).unwrap();
        assert_eq!(dtmf.kind, EventKind::Dtmf);
        assert_eq!(dtmf.subclass, u32::from('5'));
        let text = t.get_event(now).unwrap();
        assert_eq!(text.kind, EventKind::Text);
        assert_eq!(text.ies.get_text(IeType::TextFrame), Some("hello"));
        assert!(t.get_event(now).is_none());
    }

    #[test]
    fn test_transfer_is_unsupported() {
        let (mut t, recorder, _) = connected_call();
        let transfer = peer_frame(IaxControl::Transfer, 1, 1, 40);
        t.process_frame(Frame::Full(transfer));
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::NotImplemented);
        assert_eq!(event.reason, Some(TerminationReason::Unsupported));
        assert_eq!(t.state(), TransactionState::Terminating);

        let sent = recorder.take_full();
        let unsupport = sent.iter().find(|f| f.is_iax(IaxControl::Unsupport)).unwrap();
        assert_eq!(
            unsupport.ies().unwrap().get_numeric(IeType::IaxUnknown),
            Some(0x22)
        );
    }

    #[test]
    fn test_inval_is_final() {
        let (mut t, _, _) = connected_call();
        let inval = peer_frame(IaxControl::Inval, 1, 1, 40);
        assert!(t.process_frame(Frame::Full(inval)));
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Invalid);
        assert!(event.is_final);
        assert_eq!(t.state(), TransactionState::Terminated);
    }

    #[test]
    fn test_malformed_ies_still_reported() {
        let (mut t, _, _) = connected_call();
        let quelch = peer_frame(IaxControl::Quelch, 1, 1, 40).with_payload(vec![0x06, 0x05, b'a']);
        t.process_frame(Frame::Full(quelch));
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Quelch);
        assert!(!event.ies_valid);
        assert!(event.ies.is_empty());
    }

    #[test]
    fn test_incoming_poke_answers_pong() {
        let recorder = Arc::new(Recorder::default());
        let poke = peer_frame(IaxControl::Poke, 0, 0, 77);
        let mut t = Transaction::incoming(
            poke,
            1,
            peer(),
            TransactionConfig::default(),
            TransactionIo::new(recorder.clone()),
        )
        .unwrap();
        assert!(t.get_event(Instant::now()).is_none());
        let sent = recorder.take_full();
        let pong = sent.iter().find(|f| f.is_iax(IaxControl::Pong)).unwrap().clone();
        assert_eq!(pong.timestamp, 77);

        t.process_frame(ack_of(&pong, 1));
        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Terminated);
        assert_eq!(event.reason, Some(TerminationReason::Completed));
    }

    #[test]
    fn test_auth_request_times_out() {
        let config = TransactionConfig::default().with_auth_timeout(Duration::from_secs(1));
        let (mut t, recorder, _) = incoming_call(config);
        t.get_event(Instant::now());
        assert!(t.send_auth_request());
        assert_eq!(t.state(), TransactionState::AuthRequestSent);
        let challenge = t.challenge().unwrap().to_owned();
        let sent = recorder.take_full();
        let authreq = sent.iter().find(|f| f.is_iax(IaxControl::AuthReq)).unwrap().clone();
        let ies = authreq.ies().unwrap();
        assert_eq!(ies.get_text(IeType::Challenge), Some(challenge.as_str()));
        assert_eq!(ies.get_numeric(IeType::AuthMethods), Some(2));

        t.process_frame(ack_of(&authreq, 1));
        let acked_at = Instant::now();
        assert!(t.get_event(acked_at).is_none());
        assert!(t.get_event(acked_at + Duration::from_millis(900)).is_none());
        let event = t.get_event(acked_at + Duration::from_millis(1100)).unwrap();
        assert_eq!(event.kind, EventKind::Timeout);
        assert!(event.is_final);
    }

    #[test]
    fn test_mini_frames_delivered_in_call() {
        let (mut t, _, sink) = connected_call();
        let mini = |ts: u32| {
            Frame::Mini(MiniFrame {
                call_no: 5,
                timestamp: ts,
                media: MediaType::Audio,
                mark: false,
                retrans: false,
                timestamped: true,
                kind: crate::frame::FrameKind::Mini,
                payload: vec![1, 2, 3],
            })
        };
        assert!(t.process_frame(mini(0x0100)));
        assert!(!t.process_frame(mini(0x0080)));
        assert!(t.process_frame(mini(0x0120)));
        let media = sink.media.lock().unwrap().clone();
        assert_eq!(media, vec![(0x0100, vec![1, 2, 3]), (0x0120, vec![1, 2, 3])]);
        assert_eq!(t.media_stats(MediaType::Audio).received, 2);
        assert_eq!(t.media_stats(MediaType::Audio).out_of_order, 1);
    }

    #[test]
    fn test_untimestamped_trunk_record_uses_base_timestamp() {
        let (mut t, _, sink) = connected_call();
        let record = |ts: u32| {
            Frame::Mini(MiniFrame {
                call_no: 5,
                timestamp: ts,
                media: MediaType::Audio,
                mark: false,
                retrans: false,
                timestamped: false,
                kind: crate::frame::FrameKind::TrunkMeta,
                payload: vec![7; 20],
            })
        };
        assert!(t.process_frame(record(0x0003_0010)));
        assert!(t.process_frame(record(0x0003_0024)));
        assert!(!t.process_frame(record(0x0003_0024)));
        let media = sink.media.lock().unwrap();
        let stamps: Vec<u32> = media.iter().map(|(ts, _)| *ts).collect();
        assert_eq!(stamps, vec![0x0003_0010, 0x0003_0024]);
    }

    #[test]
    fn test_send_media_framing() {
        let (mut t, recorder, _) = connected_call();
        let payload = [0x55u8; 160];
        assert!(t.send_media(&payload, FormatMask::ULAW, MediaType::Audio, false));
        assert!(t.send_media(&payload, FormatMask::ULAW, MediaType::Audio, false));
        let sent = recorder.take();
        assert_eq!(sent.len(), 2);
        let full = FullFrame::parse(&sent[0]).unwrap();
        assert_eq!(full.frame_type, FrameType::Voice);
        assert_eq!(full.subclass, FormatMask::ULAW.bits());
        assert_eq!(sent[1][0] & 0x80, 0);
        assert_eq!(sent[1].len(), 4 + 160);

        let trunk = Arc::new(Mutex::new(TrunkFrame::new(
            peer(),
            TrunkConfig::default(),
            recorder.clone(),
        )));
        t.enable_trunking(trunk.clone());
        assert!(t.send_media(&payload, FormatMask::ULAW, MediaType::Audio, false));
        assert_eq!(trunk.lock().unwrap().pending_records(), 1);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_gated_operations() {
        let (mut t, _, _) = incoming_call(TransactionConfig::default());
        assert!(!t.accept());
        assert!(!t.send_text("hi"));
        assert!(!t.send_auth_reply("x"));
        assert!(!t.abort_registration());
        t.get_event(Instant::now());
        assert!(!t.send_media(&[1], FormatMask::ULAW, MediaType::Audio, false));
        assert!(t.reject("Not here", 0));
        assert!(!t.reject("Not here", 0));
        assert!(!t.accept());
    }

    #[test]
    fn test_abort_registration() {
        let recorder = Arc::new(Recorder::default());
        let mut t = Transaction::send_registration(
            true,
            4,
            peer(),
            "alice",
            TransactionConfig::default(),
            TransactionIo::new(recorder.clone()),
        )
        .unwrap();
        assert_eq!(t.kind(), TransactionKind::RegRel);
        assert!(t.abort_registration());
        assert!(!t.abort_registration());
        assert_eq!(t.pending_out(), 0);

        let event = t.get_event(Instant::now()).unwrap();
        assert_eq!(event.kind, EventKind::Terminated);
        assert!(event.local);
        assert!(event.is_final);
        assert_eq!(event.reason, Some(TerminationReason::Aborted));
        assert!(t.get_event(Instant::now()).is_none());
    }

    #[test]
    fn test_post_keeps_given_timestamp() {
        let (mut t, recorder, _) = connected_call();
        assert!(t.post(FrameType::Iax, IaxControl::LagRq.as_u32(), Vec::new(), 777, false));
        let sent = recorder.take_full();
        assert!(sent[0].is_iax(IaxControl::LagRq));
        assert_eq!(sent[0].timestamp, 777);
        assert_eq!((sent[0].source_call_no, sent[0].dest_call_no), (1, 5));

        let lagrp = peer_frame(IaxControl::LagRp, 1, 2, 777);
        assert!(t.process_frame(Frame::Full(lagrp)));
        assert!(t.get_event(Instant::now()).is_none());
        assert_eq!(t.pending_out(), 0);
    }

    #[test]
    fn test_unpackable_subclass_is_refused() {
        let (mut t, recorder, _) = connected_call();
        let out_seq = t.out_seq();
        assert!(!t.send_control(ControlType::StopSounds));
        assert!(!t.post(FrameType::Voice, 0x180, vec![1], 0, true));
        assert!(recorder.take().is_empty());
        assert_eq!(t.out_seq(), out_seq);
        assert_eq!(t.pending_out(), 0);
        assert!(t.send_control(ControlType::Hold));
        assert_eq!(recorder.take_full().len(), 1);
    }

    #[test]
    fn test_every_queued_frame_acked() {
        let (mut t, recorder, _) = connected_call();
        for (oseq, ts) in [(1u8, 40u32), (2, 41), (3, 42)] {
            let dtmf = FullFrame::new(FrameType::Dtmf, u32::from('1'), 5, 1, ts).with_seq(oseq, 1);
            t.process_frame(Frame::Full(dtmf));
        }
        assert_eq!(t.get_event(Instant::now()).unwrap().kind, EventKind::Dtmf);
        let acks = recorder.take_full();
        assert_eq!(acks.len(), 3);
        for (ack, ts) in acks.iter().zip([40u32, 41, 42]) {
            assert!(ack.is_iax(IaxControl::Ack));
            assert_eq!(ack.timestamp, ts);
            assert_eq!(ack.iseq, 4);
            assert_eq!((ack.source_call_no, ack.dest_call_no), (1, 5));
        }
    }

    #[test]
    fn test_next_deadline() {
        let (mut t, _, _) = connected_call();
        let deadline = t.next_deadline().unwrap();
        assert!(deadline <= Instant::now() + Duration::from_millis(500));
        t.process_frame(Frame::Full(peer_frame(IaxControl::Inval, 1, 1, 40)));
        t.get_event(Instant::now());
        assert!(t.next_deadline().is_none());
    }
}
