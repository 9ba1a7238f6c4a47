//! UDP endpoint speaking [`Frame`]s.
//!
//! [`DatagramEndpoint`] owns one tokio `UdpSocket` for the lifetime of a
//! session. Dropping it releases the socket.

use std::io;
use std::net::{SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;
use tracing::{debug, trace};

use super::error::{TransportError, TransportResult};
use super::frame::Frame;
use super::io::FrameIo;
use crate::core::constants::RECV_BUFFER_SIZE;

/// Pick a uniformly distributed initial sequence number.
///
/// Only meant to keep consecutive sessions from colliding; not a security
/// measure.
pub fn random_initial_sequence_number() -> u32 {
    rand::random::<u32>()
}

/// Narrow a socket address to the IPv4 form a frame header can carry.
pub fn ipv4_peer(addr: SocketAddr) -> TransportResult<SocketAddrV4> {
    match addr {
        SocketAddr::V4(v4) => Ok(v4),
        SocketAddr::V6(_) => Err(TransportError::AddressFamily(addr)),
    }
}

/// Frame-oriented UDP socket.
///
/// Without a router, frames are sent straight to `frame.peer` and inbound
/// frames have their peer rewritten to the datagram source. With a router,
/// every datagram goes to the router and the header's peer fields are left
/// for the router to interpret.
#[derive(Debug)]
pub struct DatagramEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    router: Option<SocketAddr>,
    recv_buffer: Vec<u8>,
}

impl DatagramEndpoint {
    /// Bind a new endpoint to `addr`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Self::from_socket(socket)
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: UdpSocket) -> io::Result<Self> {
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket,
            local_addr,
            router: None,
            recv_buffer: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    /// Route every outbound datagram through `router`.
    pub fn with_router(mut self, router: Option<SocketAddr>) -> Self {
        self.router = router;
        self
    }

    /// Address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Configured router, if any.
    pub fn router(&self) -> Option<SocketAddr> {
        self.router
    }
}

impl FrameIo for DatagramEndpoint {
    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        let destination = self.router.unwrap_or_else(|| frame.peer_addr());
        trace!(
            frame_type = %frame.frame_type,
            seq = frame.sequence_number,
            len = frame.payload.len(),
            %destination,
            "send"
        );
        self.socket.send_to(&frame.encode(), destination).await?;
        Ok(())
    }

    async fn receive(&mut self) -> TransportResult<Frame> {
        let (len, source) = self.socket.recv_from(&mut self.recv_buffer).await?;
        let mut frame = Frame::decode(&self.recv_buffer[..len])?;
        if self.router.is_none() {
            frame.peer = ipv4_peer(source)?;
        }
        trace!(
            frame_type = %frame.frame_type,
            seq = frame.sequence_number,
            len = frame.payload.len(),
            peer = %frame.peer,
            "receive"
        );
        Ok(frame)
    }
}

/// Restrict an endpoint to a single peer for the length of one session.
///
/// Frames from any other peer are discarded.
#[derive(Debug)]
pub struct PeerBound<'a, E> {
    inner: &'a mut E,
    peer: SocketAddrV4,
}

impl<'a, E: FrameIo> PeerBound<'a, E> {
    /// Bind `inner` to `peer`.
    pub fn new(inner: &'a mut E, peer: SocketAddrV4) -> Self {
        Self { inner, peer }
    }

    /// The peer this session talks to.
    pub fn peer(&self) -> SocketAddrV4 {
        self.peer
    }
}

impl<E: FrameIo> FrameIo for PeerBound<'_, E> {
    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        self.inner.send(frame).await
    }

    async fn receive(&mut self) -> TransportResult<Frame> {
        loop {
            let frame = self.inner.receive().await?;
            if frame.peer == self.peer {
                return Ok(frame);
            }
            debug!(
                peer = %frame.peer,
                session_peer = %self.peer,
                frame_type = %frame.frame_type,
                "discarding frame from foreign peer"
            );
        }
    }
}
