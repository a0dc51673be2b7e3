//! UDP transport adapter.
//!
//! The protocol core only needs a non-blocking [`FrameWriter`]. This module
//! provides one backed by a tokio [`UdpSocket`], plus the receive side
//! that feeds datagrams into [`decode`].
//!
//! [`FrameWriter`]: crate::core::FrameWriter
//! [`UdpSocket`]: tokio::net::UdpSocket
//! [`decode`]: crate::frame::decode

mod socket;

pub use socket::{DEFAULT_RECV_BUFFER_SIZE, IaxSocket, IaxSocketBuilder};
