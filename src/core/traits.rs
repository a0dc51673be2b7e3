//! Collaborator seams of the IAX2 core.
//!
//! The socket, the engine's transaction table and the media consumer live
//! outside this crate. The core only talks to them through these traits.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crate::frame::{Frame, MediaType, MiniFrame};
use crate::transaction::Transaction;

/// Identifies one transaction: the peer address plus both call numbers.
///
/// Engines index transactions by `(addr, remote_call_no)`, which is what a
/// peer's mini frames carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    /// Peer address.
    pub addr: SocketAddr,
    /// Our call number.
    pub local_call_no: u16,
    /// The peer's call number.
    pub remote_call_no: u16,
}

/// Non-blocking datagram writer shared by every transaction on a socket.
pub trait FrameWriter: Send + Sync {
    /// Write one datagram to `addr`.
    ///
    /// Must not block; a full socket buffer is reported as an error and the
    /// datagram is lost, which retransmission covers for full frames.
    fn write_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

/// Consumer of inbound media.
pub trait MediaSink: Send + Sync {
    /// Deliver one media payload with its reconstructed 32-bit timestamp.
    fn on_media(
        &self,
        key: TransactionKey,
        payload: &[u8],
        timestamp: u32,
        media: MediaType,
        mark: bool,
    );
}

/// Receiver of mini frames unpacked from a trunk meta frame.
pub trait FrameDispatcher {
    /// Route one mini frame that arrived from `sender`.
    fn dispatch(&self, sender: SocketAddr, frame: MiniFrame);
}

/// Engine-level lookup of live transactions.
pub trait TransactionTable {
    /// Find the transaction talking to `addr` whose peer uses `call_no`.
    fn find_transaction(&self, addr: SocketAddr, call_no: u16) -> Option<Arc<Mutex<Transaction>>>;
}

impl<T: TransactionTable + ?Sized> FrameDispatcher for T {
    fn dispatch(&self, sender: SocketAddr, frame: MiniFrame) {
        let call_no = frame.call_no;
        let Some(transaction) = self.find_transaction(sender, call_no) else {
            log::trace!("no transaction for trunked call {call_no} from {sender}");
            return;
        };
        match transaction.lock() {
            Ok(mut transaction) => {
                transaction.process_frame(Frame::Mini(frame));
            }
            Err(_) => log::warn!("transaction lock poisoned for call {call_no} from {sender}"),
        }
    }
}
