//! One request/response exchange over one endpoint.

use std::net::SocketAddrV4;

use tracing::info;

use crate::core::SessionConfig;
use crate::core::constants::FIRST_DATA_SEQUENCE;
use crate::transport::{
    ArqEngine, FrameIo, FrameType, Handshake, HandshakeState, TransferReport, TransportResult, receive_stream,
    segment,
};

/// What one exchange produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Raw response payload, reassembled in order.
    pub response: Vec<u8>,
    /// Counters from sending the request.
    pub report: TransferReport,
}

/// Initiator side of a session.
///
/// Owns its endpoint; dropping the session releases the socket.
#[derive(Debug)]
pub struct ClientSession<E> {
    io: E,
    handshake: Handshake,
    config: SessionConfig,
}

impl<E: FrameIo> ClientSession<E> {
    /// Prepare a session toward `peer`.
    pub fn new(io: E, peer: SocketAddrV4, config: SessionConfig) -> Self {
        Self {
            io,
            handshake: Handshake::new(peer, &config),
            config,
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.handshake.state()
    }

    /// The endpoint, for inspection.
    pub fn io(&self) -> &E {
        &self.io
    }

    /// Open, send `payload` reliably, close, then read the peer's reply.
    #[tracing::instrument(skip_all, fields(peer = %self.handshake.peer(), len = payload.len()))]
    pub async fn exchange(&mut self, payload: &[u8]) -> TransportResult<Exchange> {
        let peer = self.handshake.peer();
        self.handshake.open(&mut self.io).await?;

        let frames = segment(payload, FrameType::Data, peer, self.config.max_payload());
        let last = frames.len() as u32;
        let report = ArqEngine::from_config(&self.config)
            .transfer(&mut self.io, frames)
            .await?;

        let early = self
            .handshake
            .close(&mut self.io, FIRST_DATA_SEQUENCE..=last)
            .await?;

        let response = receive_stream(&mut self.io, self.config.response_timeout, early).await?;
        info!(
            sent = payload.len(),
            received = response.len(),
            retransmissions = report.retransmissions,
            "exchange complete"
        );
        Ok(Exchange { response, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionConfigBuilder;
    use crate::transport::testing::ScriptedPeer;
    use crate::transport::{Frame, TransportError};
    use std::time::Duration;

    fn peer() -> SocketAddrV4 {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn config() -> SessionConfig {
        SessionConfigBuilder::new()
            .max_frame_len(16)
            .retransmit_timeout(Duration::from_millis(30))
            .handshake_timeout(Duration::from_millis(30))
            .response_timeout(Duration::from_millis(200))
            .build()
            .unwrap()
    }

    /// A well-behaved responder that echoes the request back in upper case.
    fn echo_server() -> ScriptedPeer {
        let mut received = Vec::new();
        ScriptedPeer::responding(move |frame| match frame.frame_type {
            FrameType::Syn => vec![Frame::syn_ack(900, frame.sequence_number.wrapping_add(1), frame.peer)],
            FrameType::Data => {
                received.extend_from_slice(&frame.payload);
                vec![Frame::ack(frame.sequence_number, frame.peer)]
            }
            FrameType::Fin => {
                let mut replies = vec![Frame::handshake_ack(frame.sequence_number.wrapping_add(1), frame.peer)];
                replies.extend(segment(
                    &received.to_ascii_uppercase(),
                    FrameType::Data,
                    frame.peer,
                    5,
                ));
                replies.push(Frame::fin(4242, frame.peer));
                replies
            }
            _ => Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_full_exchange() {
        let mut session = ClientSession::new(echo_server(), peer(), config());
        let exchange = session.exchange(b"hello over udp, in pieces").await.unwrap();

        assert_eq!(exchange.response, b"HELLO OVER UDP, IN PIECES");
        assert_eq!(exchange.report.frames, 5);
        assert_eq!(exchange.report.retransmissions, 0);
        assert_eq!(session.state(), HandshakeState::Closed);

        let sent = session.io().sent();
        let last = sent.last().unwrap();
        assert_eq!(last.frame_type, FrameType::Ack);
        assert_eq!(last.sequence_number, 4243);
    }

    #[tokio::test]
    async fn test_bad_syn_ack_aborts() {
        let io = ScriptedPeer::responding(|frame| {
            vec![Frame::syn_ack(1, frame.sequence_number.wrapping_add(7), frame.peer)]
        });
        let mut session = ClientSession::new(io, peer(), config());

        let err = session.exchange(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::HandshakeFailed { .. }));
        assert!(session.io().sent().iter().all(|f| f.frame_type != FrameType::Data));
    }
}
