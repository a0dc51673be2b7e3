//! # IAX2 Protocol
//!
//! Signaling core of the **I**nter-**A**sterisk e**X**change protocol,
//! version 2: everything between a UDP datagram and a call-control event.
//!
//! - **Frames**: full, mini, video meta and trunk meta frames ([`frame`])
//! - **Information elements**: the typed TLV list carried by full frames ([`ie`])
//! - **Transactions**: per-call sequencing, acknowledgement, retransmission
//!   and the call/registration/poke state machine ([`transaction`])
//! - **Trunking**: many calls' media packed into one datagram per peer ([`trunk`])
//!
//! The core owns no sockets and no threads. Transactions write through a
//! [`FrameWriter`] and are polled by their owner; the [`transport`] module
//! supplies a tokio UDP socket for that seam.
//!
//! ## Feature Flags
//!
//! - `transport` (default): tokio UDP socket adapter
//!
//! ## Example Usage
//!
//! ```rust
//! use iax2_protocol::prelude::*;
//!
//! let mut ies = IeList::new();
//! ies.insert_version();
//! ies.append_text(IeType::Username, "alice")?;
//!
//! let new = FullFrame::iax(IaxControl::New, 1, 0, 3).with_ies(&ies);
//! let parsed = FullFrame::parse(&new.encode())?;
//!
//! assert!(parsed.is_iax(IaxControl::New));
//! assert_eq!(
//!     parsed.ies().and_then(|ies| ies.get_text(IeType::Username)),
//!     Some("alice")
//! );
//! # Ok::<(), iax2_protocol::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod frame;
pub mod ie;
pub mod transaction;
pub mod trunk;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        FrameDispatcher, FrameWriter, MediaSink, TransactionKey, TransactionTable,
    };
    pub use crate::frame::{
        ControlType, Frame, FrameKind, FrameType, FullFrame, IaxControl, MediaType, MiniFrame,
        decode,
    };
    pub use crate::ie::{AuthMethods, FormatMask, IeList, IeType, IeValue, InfoElement};
    pub use crate::transaction::{
        Event, EventKind, TerminationReason, Transaction, TransactionConfig, TransactionIo,
        TransactionKind, TransactionState,
    };
    pub use crate::trunk::{TrunkConfig, TrunkFrame};

    #[cfg(feature = "transport")]
    pub use crate::transport::{IaxSocket, IaxSocketBuilder};
}

// Re-export commonly used items at crate root
pub use core::{Error, FrameError, IeError, Result, TransactionError};
pub use frame::{Frame, FullFrame, MiniFrame, decode};
pub use ie::IeList;
pub use transaction::{Event, EventKind, Transaction, TransactionConfig};
pub use trunk::TrunkFrame;

#[cfg(feature = "transport")]
pub use transport::IaxSocket;
