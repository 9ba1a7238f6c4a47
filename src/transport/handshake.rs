//! Three-way open and FIN/ACK close.
//!
//! ```text
//! Initiator                         Responder
//!   |  SYN(isn)                  ->   |
//!   |  <- SYN_ACK(rsn, isn + 1)       |
//!   |  ACK(rsn + 1)              ->   |        ESTABLISHED
//!   |  ... DATA / ACK ...             |
//!   |  FIN(fsn)                  ->   |
//!   |  <- ACK(fsn + 1)                |        CLOSED
//! ```
//!
//! Sequence checks are strict: a wrong acknowledgment value is NAKed and fails
//! the session. Only silence is retried.

use std::net::SocketAddrV4;
use std::ops::RangeInclusive;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::endpoint::random_initial_sequence_number;
use super::error::{Phase, TransportError, TransportResult};
use super::frame::{Frame, FrameType};
use super::io::FrameIo;
use crate::core::SessionConfig;

/// Connection state as seen by one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    /// No session.
    #[default]
    Closed,
    /// SYN sent, waiting for SYN-ACK.
    SynSent,
    /// SYN-ACK sent, waiting for the final ACK.
    SynReceived,
    /// Open; data may flow.
    Established,
    /// FIN sent, waiting for its ACK.
    FinSent,
}

/// Handshake driver for one session.
#[derive(Debug, Clone)]
pub struct Handshake {
    state: HandshakeState,
    peer: SocketAddrV4,
    timeout: Duration,
    retries: u32,
}

impl Handshake {
    /// Create a closed handshake toward `peer`.
    pub fn new(peer: SocketAddrV4, config: &SessionConfig) -> Self {
        Self {
            state: HandshakeState::Closed,
            peer,
            timeout: config.handshake_timeout,
            retries: config.handshake_retries,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Remote side of the session.
    pub fn peer(&self) -> SocketAddrV4 {
        self.peer
    }

    /// Open the session with a random initial sequence number.
    pub async fn open<E: FrameIo>(&mut self, io: &mut E) -> TransportResult<()> {
        self.open_with_isn(io, random_initial_sequence_number()).await
    }

    /// Open the session with `isn` as the initial sequence number.
    pub async fn open_with_isn<E: FrameIo>(&mut self, io: &mut E, isn: u32) -> TransportResult<()> {
        self.state = HandshakeState::SynSent;
        let result = self.open_inner(io, isn).await;
        self.state = match result {
            Ok(()) => HandshakeState::Established,
            Err(_) => HandshakeState::Closed,
        };
        result
    }

    async fn open_inner<E: FrameIo>(&self, io: &mut E, isn: u32) -> TransportResult<()> {
        let syn = Frame::syn(isn, self.peer);
        let reply = self.send_and_await(io, &syn, Phase::Open, |_| false).await?;
        io.verify_type(FrameType::SynAck, &reply).await?;

        let expected = isn.wrapping_add(1);
        let actual = self.read_acknowledgment(io, &reply).await?;
        if actual != expected {
            warn!(expected, actual, peer = %reply.peer, "SYN-ACK acknowledges the wrong sequence");
            io.send_nak(reply.peer).await?;
            return Err(TransportError::HandshakeFailed {
                phase: Phase::Open,
                expected,
                actual,
            });
        }

        io.send_handshake_ack(reply.sequence_number.wrapping_add(1), self.peer)
            .await?;
        info!(peer = %self.peer, isn, "session established");
        Ok(())
    }

    /// Close the session with a random FIN sequence number.
    ///
    /// ACKs numbered inside `stale` are late acknowledgments of the transfer
    /// and are skipped while waiting for the FIN's ACK.
    ///
    /// The peer only starts its own stream after acknowledging the FIN, so a
    /// DATA frame in place of that ACK closes the handshake too. It is
    /// returned for the caller to feed into [`super::receive_stream`].
    pub async fn close<E: FrameIo>(
        &mut self,
        io: &mut E,
        stale: RangeInclusive<u32>,
    ) -> TransportResult<Option<Frame>> {
        let mut fsn = random_initial_sequence_number();
        while stale.contains(&fsn.wrapping_add(1)) {
            fsn = random_initial_sequence_number();
        }
        self.close_with_fsn(io, fsn, stale).await
    }

    /// Close the session with `fsn` as the FIN sequence number.
    pub async fn close_with_fsn<E: FrameIo>(
        &mut self,
        io: &mut E,
        fsn: u32,
        stale: RangeInclusive<u32>,
    ) -> TransportResult<Option<Frame>> {
        self.state = HandshakeState::FinSent;
        let result = self.close_inner(io, fsn, stale).await;
        self.state = HandshakeState::Closed;
        result
    }

    async fn close_inner<E: FrameIo>(
        &self,
        io: &mut E,
        fsn: u32,
        stale: RangeInclusive<u32>,
    ) -> TransportResult<Option<Frame>> {
        let fin = Frame::fin(fsn, self.peer);
        let reply = self
            .send_and_await(io, &fin, Phase::Close, |frame| match frame.frame_type {
                FrameType::Ack => stale.contains(&frame.sequence_number),
                FrameType::SynAck => true,
                _ => false,
            })
            .await?;

        if reply.frame_type == FrameType::Data {
            debug!(seq = reply.sequence_number, "peer stream started; FIN acknowledged implicitly");
            info!(peer = %self.peer, "session closed");
            return Ok(Some(reply));
        }
        io.verify_type(FrameType::Ack, &reply).await?;

        let expected = fsn.wrapping_add(1);
        if reply.sequence_number != expected {
            warn!(expected, actual = reply.sequence_number, "FIN acknowledged with the wrong sequence");
            io.send_nak(reply.peer).await?;
            return Err(TransportError::HandshakeFailed {
                phase: Phase::Close,
                expected,
                actual: reply.sequence_number,
            });
        }

        info!(peer = %self.peer, "session closed");
        Ok(None)
    }

    /// Answer `syn` with a random responder sequence number.
    ///
    /// Returns a DATA frame when the initiator's final ACK was lost and its
    /// first segment arrived in its place; the caller must process it.
    pub async fn accept<E: FrameIo>(&mut self, io: &mut E, syn: &Frame) -> TransportResult<Option<Frame>> {
        self.accept_with_isn(io, syn, random_initial_sequence_number())
            .await
    }

    /// Answer `syn` with `isn` as the responder sequence number.
    pub async fn accept_with_isn<E: FrameIo>(
        &mut self,
        io: &mut E,
        syn: &Frame,
        isn: u32,
    ) -> TransportResult<Option<Frame>> {
        self.state = HandshakeState::SynReceived;
        let result = self.accept_inner(io, syn, isn).await;
        self.state = match result {
            Ok(_) => HandshakeState::Established,
            Err(_) => HandshakeState::Closed,
        };
        result
    }

    async fn accept_inner<E: FrameIo>(&self, io: &mut E, syn: &Frame, isn: u32) -> TransportResult<Option<Frame>> {
        io.verify_type(FrameType::Syn, syn).await?;

        let syn_ack = Frame::syn_ack(isn, syn.sequence_number.wrapping_add(1), self.peer);
        let reply = self
            .send_and_await(io, &syn_ack, Phase::Open, |frame| frame.frame_type == FrameType::Syn)
            .await?;

        if reply.frame_type == FrameType::Data {
            debug!(seq = reply.sequence_number, "data before final ACK; treating as established");
            info!(peer = %self.peer, "session accepted");
            return Ok(Some(reply));
        }
        io.verify_type(FrameType::Ack, &reply).await?;

        let expected = isn.wrapping_add(1);
        let actual = self.read_acknowledgment(io, &reply).await?;
        if actual != expected {
            warn!(expected, actual, peer = %reply.peer, "final ACK acknowledges the wrong sequence");
            io.send_nak(reply.peer).await?;
            return Err(TransportError::HandshakeFailed {
                phase: Phase::Open,
                expected,
                actual,
            });
        }

        info!(peer = %self.peer, "session accepted");
        Ok(None)
    }

    async fn read_acknowledgment<E: FrameIo>(&self, io: &E, frame: &Frame) -> TransportResult<u32> {
        match frame.acknowledgment() {
            Ok(value) => Ok(value),
            Err(err) => {
                io.send_nak(frame.peer).await?;
                Err(err.into())
            }
        }
    }

    /// Send `frame` and wait for the next relevant reply, resending on
    /// silence up to the retry budget. Frames matching `is_stale` are skipped.
    /// An undecodable reply is NAKed and fails the handshake.
    async fn send_and_await<E, F>(&self, io: &mut E, frame: &Frame, phase: Phase, is_stale: F) -> TransportResult<Frame>
    where
        E: FrameIo,
        F: Fn(&Frame) -> bool,
    {
        for attempt in 0..=self.retries {
            if attempt > 0 {
                warn!(%phase, attempt, frame_type = %frame.frame_type, "no reply; resending");
            }
            io.send(frame).await?;
            let deadline = Instant::now() + self.timeout;

            loop {
                match tokio::time::timeout_at(deadline, io.receive()).await {
                    Err(_) => break,
                    Ok(Ok(reply)) if is_stale(&reply) => {
                        debug!(frame_type = %reply.frame_type, seq = reply.sequence_number, "skipping stale frame");
                    }
                    Ok(Ok(reply)) => return Ok(reply),
                    Ok(Err(err)) if err.is_recoverable_loss() => {
                        warn!(error = %err, %phase, "malformed handshake reply");
                        io.send_nak(self.peer).await?;
                        return Err(err);
                    }
                    Ok(Err(err)) => return Err(err),
                }
            }
        }
        Err(TransportError::Timeout(phase))
    }
}
