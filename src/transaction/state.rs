//! Transaction lifecycle states and the response table.
//!
//! All exchange kinds share one state machine. Which reply may answer which
//! outstanding request is data, looked up in [`response_transition`].

use std::fmt;

use super::event::EventKind;
use crate::frame::IaxControl;

/// Transaction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Incoming transaction whose opening frame is not processed yet.
    Unknown,
    /// Opening request sent, waiting for the answer.
    InviteSent,
    /// Opening request received, waiting for the application.
    InviteReceived,
    /// The peer challenged our request.
    AuthRequestReceived,
    /// We answered the peer's challenge.
    AuthReplySent,
    /// We challenged the peer's request.
    AuthRequestSent,
    /// The peer answered our challenge.
    AuthReplyReceived,
    /// Call established.
    Connected,
    /// Ending; only acknowledgements are exchanged.
    Terminating,
    /// Ended; no more events.
    Terminated,
}

impl TransactionState {
    /// Whether the transaction is ending or has ended.
    pub fn is_ending(self) -> bool {
        matches!(self, Self::Terminating | Self::Terminated)
    }

    /// Printable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::InviteSent => "InviteSent",
            Self::InviteReceived => "InviteReceived",
            Self::AuthRequestReceived => "AuthRequestReceived",
            Self::AuthReplySent => "AuthReplySent",
            Self::AuthRequestSent => "AuthRequestSent",
            Self::AuthReplyReceived => "AuthReplyReceived",
            Self::Connected => "Connected",
            Self::Terminating => "Terminating",
            Self::Terminated => "Terminated",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exchange a transaction carries, fixed by its opening frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Call (NEW).
    New,
    /// Registration (REGREQ).
    RegReq,
    /// Registration release (REGREL).
    RegRel,
    /// Liveness probe (POKE).
    Poke,
}

impl TransactionKind {
    /// Kind opened by `subclass`, if it opens a transaction.
    pub fn from_opening(subclass: IaxControl) -> Option<Self> {
        match subclass {
            IaxControl::New => Some(Self::New),
            IaxControl::RegReq => Some(Self::RegReq),
            IaxControl::RegRel => Some(Self::RegRel),
            IaxControl::Poke => Some(Self::Poke),
            _ => None,
        }
    }

    /// Subclass of the opening frame.
    pub fn opening(self) -> IaxControl {
        match self {
            Self::New => IaxControl::New,
            Self::RegReq => IaxControl::RegReq,
            Self::RegRel => IaxControl::RegRel,
            Self::Poke => IaxControl::Poke,
        }
    }

    /// Whether this is a registration or a release.
    pub fn is_registration(self) -> bool {
        matches!(self, Self::RegReq | Self::RegRel)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.opening().fmt(f)
    }
}

/// Outcome of a reply matched against an outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub event: EventKind,
    pub next: TransactionState,
}

const fn to(event: EventKind, next: TransactionState) -> Option<Transition> {
    Some(Transition { event, next })
}

/// Look up what `received` means as an answer to the outstanding `sent`
/// request of a `kind` transaction in `state`.
///
/// `None` means the frame does not answer that request.
pub(crate) fn response_transition(
    kind: TransactionKind,
    state: TransactionState,
    sent: IaxControl,
    received: IaxControl,
) -> Option<Transition> {
    use IaxControl as C;
    use TransactionKind as K;
    use TransactionState as S;

    match (kind, state, sent) {
        (K::New, S::InviteSent, C::New) => match received {
            C::AuthReq => to(EventKind::AuthReq, S::AuthRequestReceived),
            C::Accept => to(EventKind::Accept, S::Connected),
            C::Reject => to(EventKind::Reject, S::Terminating),
            C::Hangup => to(EventKind::Hangup, S::Terminating),
            _ => None,
        },
        (K::New, S::AuthReplySent, C::AuthRep) => match received {
            C::Accept => to(EventKind::Accept, S::Connected),
            C::Reject => to(EventKind::Reject, S::Terminating),
            C::Hangup => to(EventKind::Hangup, S::Terminating),
            _ => None,
        },
        (K::New, S::AuthRequestSent, C::AuthReq) => match received {
            C::AuthRep => to(EventKind::AuthRep, S::AuthReplyReceived),
            C::Reject => to(EventKind::Reject, S::Terminating),
            C::Hangup => to(EventKind::Hangup, S::Terminating),
            _ => None,
        },
        (K::RegReq | K::RegRel, S::InviteSent, C::RegReq | C::RegRel) => match received {
            C::RegAck => to(EventKind::Accept, S::Terminating),
            C::RegAuth => to(EventKind::AuthReq, S::AuthRequestReceived),
            C::RegRej => to(EventKind::Reject, S::Terminating),
            _ => None,
        },
        (K::RegReq | K::RegRel, S::AuthReplySent, C::RegReq | C::RegRel) => match received {
            C::RegAck => to(EventKind::Accept, S::Terminating),
            C::RegRej => to(EventKind::Reject, S::Terminating),
            _ => None,
        },
        (K::RegReq | K::RegRel, S::AuthRequestSent, C::RegAuth) => match received {
            C::RegReq if kind == K::RegReq => to(EventKind::AuthRep, S::AuthReplyReceived),
            C::RegRel if kind == K::RegRel => to(EventKind::AuthRep, S::AuthReplyReceived),
            C::RegRej => to(EventKind::Reject, S::Terminating),
            _ => None,
        },
        (K::Poke, S::InviteSent, C::Poke) => match received {
            C::Pong => to(EventKind::Accept, S::Terminating),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_opening() {
        assert_eq!(
            TransactionKind::from_opening(IaxControl::New),
            Some(TransactionKind::New)
        );
        assert_eq!(
            TransactionKind::from_opening(IaxControl::Poke),
            Some(TransactionKind::Poke)
        );
        assert_eq!(TransactionKind::from_opening(IaxControl::Transfer), None);
        assert_eq!(TransactionKind::RegRel.opening(), IaxControl::RegRel);
        assert!(TransactionKind::RegRel.is_registration());
        assert!(!TransactionKind::Poke.is_registration());
    }

    #[test]
    fn test_call_responses() {
        let t = response_transition(
            TransactionKind::New,
            TransactionState::InviteSent,
            IaxControl::New,
            IaxControl::Accept,
        );
        assert_eq!(
            t,
            Some(Transition {
                event: EventKind::Accept,
                next: TransactionState::Connected
            })
        );

        let t = response_transition(
            TransactionKind::New,
            TransactionState::InviteSent,
            IaxControl::New,
            IaxControl::AuthReq,
        );
        assert_eq!(t.map(|t| t.next), Some(TransactionState::AuthRequestReceived));

        assert!(
            response_transition(
                TransactionKind::New,
                TransactionState::InviteSent,
                IaxControl::New,
                IaxControl::RegAck,
            )
            .is_none()
        );
    }

    #[test]
    fn test_registration_responses() {
        let t = response_transition(
            TransactionKind::RegReq,
            TransactionState::InviteSent,
            IaxControl::RegReq,
            IaxControl::RegAck,
        );
        assert_eq!(t.map(|t| t.event), Some(EventKind::Accept));
        assert_eq!(t.map(|t| t.next), Some(TransactionState::Terminating));

        let t = response_transition(
            TransactionKind::RegReq,
            TransactionState::AuthRequestSent,
            IaxControl::RegAuth,
            IaxControl::RegReq,
        );
        assert_eq!(t.map(|t| t.event), Some(EventKind::AuthRep));

        assert!(
            response_transition(
                TransactionKind::RegReq,
                TransactionState::AuthRequestSent,
                IaxControl::RegAuth,
                IaxControl::RegRel,
            )
            .is_none()
        );
    }

    #[test]
    fn test_poke_response() {
        let t = response_transition(
            TransactionKind::Poke,
            TransactionState::InviteSent,
            IaxControl::Poke,
            IaxControl::Pong,
        );
        assert_eq!(t.map(|t| t.event), Some(EventKind::Accept));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(TransactionState::AuthReplySent.to_string(), "AuthReplySent");
        assert!(TransactionState::Terminating.is_ending());
        assert!(!TransactionState::Connected.is_ending());
        assert_eq!(TransactionKind::RegReq.to_string(), "REGREQ");
    }
}
