//! Tokio UDP socket carrying IAX2 datagrams.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use log::trace;
use tokio::net::UdpSocket;

use crate::core::{DEFAULT_PORT, FrameDispatcher, FrameWriter};
use crate::frame::{self, Frame};

/// Default receive buffer size.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// UDP socket shared by every transaction talking through it.
///
/// Cloning the inner socket with [`socket_arc`](Self::socket_arc) lets one
/// task receive while transactions write through the [`FrameWriter`]
/// implementation, which never waits.
#[derive(Debug)]
pub struct IaxSocket {
    socket: Arc<UdpSocket>,
    recv_buffer: Vec<u8>,
}

impl IaxSocket {
    /// Bind to `addr`.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        IaxSocketBuilder::new().bind_addr(addr).bind().await
    }

    /// Builder with the IAX2 port as default bind address.
    pub fn builder() -> IaxSocketBuilder {
        IaxSocketBuilder::new()
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        IaxSocketBuilder::new().from_socket(socket)
    }

    /// Local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send one datagram, waiting for buffer space.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, addr).await
    }

    /// Send one datagram if the socket can take it now.
    pub fn try_send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.try_send_to(data, addr)
    }

    /// Wait until the socket accepts writes.
    pub async fn writable(&self) -> io::Result<()> {
        self.socket.writable().await
    }

    /// Receive one datagram.
    pub async fn recv_from(&mut self) -> io::Result<(&[u8], SocketAddr)> {
        let (len, addr) = self.socket.recv_from(&mut self.recv_buffer).await?;
        Ok((&self.recv_buffer[..len], addr))
    }

    /// Receive and decode one datagram.
    ///
    /// Trunk records go to `dispatcher`. Returns `None` for datagrams that
    /// decode to nothing (malformed input or a trunk frame).
    pub async fn recv_frame(
        &mut self,
        dispatcher: Option<&(dyn FrameDispatcher + Sync)>,
    ) -> io::Result<(Option<Frame>, SocketAddr)> {
        let (len, addr) = self.socket.recv_from(&mut self.recv_buffer).await?;
        trace!("{len} bytes from {addr}");
        let dispatcher = dispatcher.map(|d| d as &dyn FrameDispatcher);
        Ok((frame::decode(&self.recv_buffer[..len], addr, dispatcher), addr))
    }

    /// The underlying socket.
    pub fn inner(&self) -> &UdpSocket {
        &self.socket
    }

    /// Shared handle to the underlying socket.
    pub fn socket_arc(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

impl FrameWriter for IaxSocket {
    fn write_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.try_send_to(data, addr)
    }
}

/// Builder for [`IaxSocket`].
#[derive(Debug, Clone)]
pub struct IaxSocketBuilder {
    bind_addr: SocketAddr,
    recv_buffer_size: usize,
}

impl Default for IaxSocketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IaxSocketBuilder {
    /// Bind to `0.0.0.0:4569` with a 64 KiB receive buffer.
    pub fn new() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }

    /// Set the bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size.max(1);
        self
    }

    /// Bind the socket.
    pub async fn bind(self) -> io::Result<IaxSocket> {
        let socket = UdpSocket::bind(self.bind_addr).await?;
        Ok(self.from_socket(socket))
    }

    /// Wrap an already bound socket.
    pub fn from_socket(self, socket: UdpSocket) -> IaxSocket {
        IaxSocket {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; self.recv_buffer_size],
        }
    }
}
