//! Trunking: many calls' media to one peer in a single datagram.
//!
//! Decoding trunk meta frames lives in the frame codec
//! ([`for_each_trunk_record`](crate::frame::for_each_trunk_record)); this
//! module builds them.

mod aggregator;
mod config;

pub use aggregator::TrunkFrame;
pub use config::TrunkConfig;
