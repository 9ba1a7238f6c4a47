//! Frame-level I/O abstraction.
//!
//! The handshake, the ARQ engine and the reassembler only need to send one
//! frame and receive the next one. [`FrameIo`] captures exactly that so the
//! UDP endpoint, a peer filter and the fault injector are interchangeable.

use std::future::Future;
use std::net::SocketAddrV4;
use std::time::Duration;

use tracing::warn;

use super::error::{Phase, TransportError, TransportResult};
use super::frame::{Frame, FrameType};

/// A lossy, unordered frame channel.
pub trait FrameIo: Send + Sync {
    /// Transmit one frame to `frame.peer`. No delivery guarantee.
    fn send(&self, frame: &Frame) -> impl Future<Output = TransportResult<()>> + Send;

    /// Wait for the next frame.
    ///
    /// Fails with [`TransportError::MalformedFrame`] when a datagram does not
    /// decode; the caller decides whether that is fatal.
    fn receive(&mut self) -> impl Future<Output = TransportResult<Frame>> + Send;

    /// Wait at most `limit` for the next frame.
    fn receive_within(
        &mut self,
        limit: Duration,
        phase: Phase,
    ) -> impl Future<Output = TransportResult<Frame>> + Send {
        async move {
            tokio::time::timeout(limit, self.receive())
                .await
                .map_err(|_| TransportError::Timeout(phase))?
        }
    }

    /// Send `SYN(isn)`.
    fn send_syn(&self, isn: u32, peer: SocketAddrV4) -> impl Future<Output = TransportResult<()>> + Send {
        async move { self.send(&Frame::syn(isn, peer)).await }
    }

    /// Send `SYN-ACK` acknowledging `acknowledgment`.
    fn send_syn_ack(
        &self,
        sequence_number: u32,
        acknowledgment: u32,
        peer: SocketAddrV4,
    ) -> impl Future<Output = TransportResult<()>> + Send {
        async move {
            self.send(&Frame::syn_ack(sequence_number, acknowledgment, peer))
                .await
        }
    }

    /// Acknowledge DATA frame `sequence_number`.
    fn send_ack(&self, sequence_number: u32, peer: SocketAddrV4) -> impl Future<Output = TransportResult<()>> + Send {
        async move { self.send(&Frame::ack(sequence_number, peer)).await }
    }

    /// Send a handshake `ACK` carrying `acknowledgment` in header and payload.
    fn send_handshake_ack(
        &self,
        acknowledgment: u32,
        peer: SocketAddrV4,
    ) -> impl Future<Output = TransportResult<()>> + Send {
        async move { self.send(&Frame::handshake_ack(acknowledgment, peer)).await }
    }

    /// Tell the peer its frame was rejected.
    fn send_nak(&self, peer: SocketAddrV4) -> impl Future<Output = TransportResult<()>> + Send {
        async move { self.send(&Frame::nak(peer)).await }
    }

    /// Send one DATA segment.
    fn send_data(
        &self,
        sequence_number: u32,
        payload: Vec<u8>,
        peer: SocketAddrV4,
    ) -> impl Future<Output = TransportResult<()>> + Send {
        async move { self.send(&Frame::data(sequence_number, peer, payload)).await }
    }

    /// Send `FIN(sequence_number)`.
    fn send_fin(&self, sequence_number: u32, peer: SocketAddrV4) -> impl Future<Output = TransportResult<()>> + Send {
        async move { self.send(&Frame::fin(sequence_number, peer)).await }
    }

    /// Fail with [`TransportError::UnexpectedFrameType`] unless `frame` has the
    /// expected type. A mismatch is NAKed to the frame's sender first.
    fn verify_type(
        &self,
        expected: FrameType,
        frame: &Frame,
    ) -> impl Future<Output = TransportResult<()>> + Send {
        let actual = frame.frame_type;
        let peer = frame.peer;
        async move {
            if actual == expected {
                return Ok(());
            }
            warn!(%expected, %actual, %peer, "rejecting unexpected frame");
            self.send_nak(peer).await?;
            Err(TransportError::UnexpectedFrameType { expected, actual })
        }
    }
}
