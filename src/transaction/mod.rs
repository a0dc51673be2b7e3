//! IAX2 transactions.
//!
//! A [`Transaction`] is one exchange with one peer: a call (`NEW`), a
//! registration (`REGREQ`), a release (`REGREL`) or a poke (`POKE`). All
//! four kinds run through the same state machine; [`TransactionKind`] only
//! changes which replies are valid and which frames open and close it.
//!
//! The machine is passive. It is fed frames with
//! [`Transaction::process_frame`] and polled with
//! [`Transaction::get_event`], which also runs retransmissions, keepalive
//! pings and timeouts against the instant it is given.

mod clock;
mod config;
mod event;
mod machine;
mod media;
mod retransmit;
mod state;

pub use clock::TransactionClock;
pub use config::TransactionConfig;
pub use event::{Event, EventKind, TerminationReason};
pub use machine::{Transaction, TransactionIo, TransactionStats};
pub use media::{MediaStats, MediaStream};
pub use retransmit::OutgoingFrame;
pub use state::{TransactionKind, TransactionState};
