//! Responder side of one session.
//!
//! A session runs strictly in sequence: accept the handshake, read the
//! request stream, build the response, send it, close.

use std::net::SocketAddrV4;

use tracing::{info, warn};

use super::handler::Handler;
use crate::core::constants::FIRST_DATA_SEQUENCE;
use crate::core::{Result, SessionConfig};
use crate::http::{Request, Response, Status};
use crate::transport::{
    ArqEngine, Frame, FrameIo, FrameType, Handshake, PeerBound, Phase, TransferReport, TransportError,
    receive_stream, segment,
};

/// What one served session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Client endpoint.
    pub peer: SocketAddrV4,
    /// Status sent back.
    pub status: u16,
    /// Request payload size.
    pub request_len: usize,
    /// Response payload size.
    pub response_len: usize,
    /// Counters from sending the response.
    pub report: TransferReport,
}

/// Serve the session opened by `syn`.
///
/// Frames from other peers are ignored until the session ends. A client
/// that never acknowledges the closing FIN already holds the full response,
/// so that case is logged rather than reported as a failure.
#[tracing::instrument(skip_all, fields(peer = %syn.peer))]
pub async fn serve_session<E, H>(io: &mut E, syn: &Frame, handler: &H, config: &SessionConfig) -> Result<SessionSummary>
where
    E: FrameIo,
    H: Handler,
{
    let peer = syn.peer;
    let mut io = PeerBound::new(io, peer);
    let mut handshake = Handshake::new(peer, config);

    let early = handshake.accept(&mut io, syn).await?;
    let payload = receive_stream(&mut io, config.response_timeout, early).await?;

    let response = match Request::parse(&payload) {
        Ok(request) => {
            info!(method = %request.method, target = %request.target(), "request");
            handler.handle(&request).await
        }
        Err(err) => {
            warn!(error = %err, "unparseable request");
            Response::new(Status::BadRequest)
        }
    };

    let bytes = response.to_bytes();
    let frames = segment(&bytes, FrameType::Data, peer, config.max_payload());
    let last = frames.len() as u32;
    let report = ArqEngine::from_config(config).transfer(&mut io, frames).await?;

    match handshake.close(&mut io, FIRST_DATA_SEQUENCE..=last).await {
        Ok(_) => {}
        Err(TransportError::Timeout(Phase::Close)) => {
            warn!("client never acknowledged FIN; giving up on close");
        }
        Err(err) => return Err(err.into()),
    }

    info!(status = response.status, sent = bytes.len(), "session served");
    Ok(SessionSummary {
        peer,
        status: response.status,
        request_len: payload.len(),
        response_len: bytes.len(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionConfigBuilder;
    use crate::transport::testing::ScriptedPeer;
    use std::time::Duration;

    struct Fixed;

    impl Handler for Fixed {
        async fn handle(&self, request: &Request) -> Response {
            Response::new(Status::Ok).with_body(format!("you asked for {}", request.path))
        }
    }

    fn client() -> SocketAddrV4 {
        "127.0.0.1:5555".parse().unwrap()
    }

    fn config() -> SessionConfig {
        SessionConfigBuilder::new()
            .max_frame_len(32)
            .retransmit_timeout(Duration::from_millis(30))
            .handshake_timeout(Duration::from_millis(30))
            .handshake_retries(1)
            .response_timeout(Duration::from_millis(200))
            .build()
            .unwrap()
    }

    /// Plays the client after the SYN: final ACK, the request, FIN, then
    /// acknowledges the response stream and its FIN.
    fn scripted_client(request: &'static [u8]) -> ScriptedPeer {
        let mut response = Vec::new();
        ScriptedPeer::responding(move |frame| match frame.frame_type {
            FrameType::SynAck => {
                let mut replies = vec![Frame::handshake_ack(frame.sequence_number.wrapping_add(1), frame.peer)];
                replies.extend(segment(request, FrameType::Data, frame.peer, 8));
                replies.push(Frame::fin(77, frame.peer));
                replies
            }
            FrameType::Data => {
                response.extend_from_slice(&frame.payload);
                vec![Frame::ack(frame.sequence_number, frame.peer)]
            }
            FrameType::Fin => vec![Frame::handshake_ack(frame.sequence_number.wrapping_add(1), frame.peer)],
            _ => Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_serves_request() {
        let mut io = scripted_client(b"GET /a.txt HTTP/1.0\r\nHost: x\r\n\r\n");
        let syn = Frame::syn(10, client());

        let summary = serve_session(&mut io, &syn, &Fixed, &config()).await.unwrap();
        assert_eq!(summary.status, 200);
        assert_eq!(summary.peer, client());

        let sent = io.sent();
        assert_eq!(sent[0].frame_type, FrameType::SynAck);
        assert_eq!(sent[0].acknowledgment().unwrap(), 11);
        let fin_ack = sent.iter().find(|f| f.frame_type == FrameType::Ack && f.sequence_number == 78);
        assert!(fin_ack.is_some());

        let body: Vec<u8> = sent
            .iter()
            .filter(|f| f.frame_type == FrameType::Data)
            .flat_map(|f| f.payload.clone())
            .collect();
        let response = Response::interpret(&body).unwrap();
        assert_eq!(response.body, b"you asked for /a.txt");
        assert_eq!(sent.last().map(|f| f.frame_type), Some(FrameType::Fin));
    }

    #[tokio::test]
    async fn test_garbage_request_is_bad_request() {
        let mut io = scripted_client(b"not http at all");
        let summary = serve_session(&mut io, &Frame::syn(1, client()), &Fixed, &config())
            .await
            .unwrap();
        assert_eq!(summary.status, 400);
    }
}
