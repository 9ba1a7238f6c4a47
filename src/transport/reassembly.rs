//! Receive side of a stream: acknowledge, buffer and reorder DATA frames.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{Phase, TransportError, TransportResult};
use super::frame::{Frame, FrameType};
use super::io::FrameIo;
use crate::core::constants::{FIRST_DATA_SEQUENCE, MAX_REORDER_DISTANCE};

/// Buffers DATA payloads by sequence number until the stream ends.
///
/// Out-of-order segments are only kept within [`MAX_REORDER_DISTANCE`] of
/// the next missing one, so a peer cannot grow the buffer with sequence
/// numbers far ahead of the stream.
#[derive(Debug, Clone)]
pub struct Reassembler {
    segments: BTreeMap<u32, Vec<u8>>,
    next_expected: u32,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self {
            segments: BTreeMap::new(),
            next_expected: FIRST_DATA_SEQUENCE,
        }
    }
}

impl Reassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `sequence_number` is close enough to the stream to buffer.
    pub fn in_reach(&self, sequence_number: u32) -> bool {
        sequence_number < self.next_expected.saturating_add(MAX_REORDER_DISTANCE)
    }

    /// Store a DATA frame. Returns `false` for duplicates, for sequence
    /// numbers below the first valid one and for frames out of reach.
    pub fn insert(&mut self, frame: &Frame) -> bool {
        let sequence_number = frame.sequence_number;
        if sequence_number < FIRST_DATA_SEQUENCE
            || !self.in_reach(sequence_number)
            || self.segments.contains_key(&sequence_number)
        {
            return false;
        }
        self.segments.insert(sequence_number, frame.payload.clone());
        while self.segments.contains_key(&self.next_expected) {
            self.next_expected += 1;
        }
        true
    }

    /// Segments buffered so far.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First sequence number missing below the highest one received.
    pub fn first_gap(&self) -> Option<u32> {
        self.segments
            .keys()
            .zip(FIRST_DATA_SEQUENCE..)
            .find(|(received, expected)| **received != *expected)
            .map(|(_, expected)| expected)
    }

    /// Concatenate the payloads in sequence order.
    pub fn assemble(self) -> TransportResult<Vec<u8>> {
        if let Some(sequence_number) = self.first_gap() {
            return Err(TransportError::StreamGap { sequence_number });
        }
        Ok(self.segments.into_values().flatten().collect())
    }
}

/// Read the peer's stream until its FIN.
///
/// Every DATA frame is acknowledged, duplicates included, since the earlier
/// ACK may have been lost. The FIN is answered with `ACK(fsn + 1)`. `first`
/// feeds a frame that arrived before this call (for example DATA that raced
/// the final handshake ACK). Fails with [`TransportError::Timeout`] when the
/// peer stays silent for `idle_timeout`.
#[tracing::instrument(skip_all)]
pub async fn receive_stream<E: FrameIo>(
    io: &mut E,
    idle_timeout: Duration,
    first: Option<Frame>,
) -> TransportResult<Vec<u8>> {
    let mut reassembler = Reassembler::new();
    let mut pending = first;

    loop {
        let frame = match pending.take() {
            Some(frame) => frame,
            None => match io.receive_within(idle_timeout, Phase::Receive).await {
                Ok(frame) => frame,
                Err(err) if err.is_recoverable_loss() => {
                    warn!(error = %err, "discarding malformed frame while receiving");
                    continue;
                }
                Err(err) => return Err(err),
            },
        };

        match frame.frame_type {
            FrameType::Data if !reassembler.in_reach(frame.sequence_number) => {
                warn!(seq = frame.sequence_number, "dropping data far ahead of the stream");
            }
            FrameType::Data => {
                let fresh = reassembler.insert(&frame);
                io.send_ack(frame.sequence_number, frame.peer).await?;
                debug!(seq = frame.sequence_number, fresh, "acked data");
            }
            FrameType::Fin => {
                if let Some(sequence_number) = reassembler.first_gap() {
                    return Err(TransportError::StreamGap { sequence_number });
                }
                io.send_handshake_ack(frame.sequence_number.wrapping_add(1), frame.peer)
                    .await?;
                info!(segments = reassembler.len(), "stream complete");
                return reassembler.assemble();
            }
            other => {
                debug!(frame_type = %other, seq = frame.sequence_number, "ignoring frame while receiving");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::frame::segment;
    use crate::transport::testing::ScriptedPeer;
    use std::net::SocketAddrV4;

    fn peer() -> SocketAddrV4 {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn test_reorders_and_drops_duplicates() {
        let frames = segment(b"abcdefghij", FrameType::Data, peer(), 3);
        let mut reassembler = Reassembler::new();

        assert!(reassembler.insert(&frames[2]));
        assert!(reassembler.insert(&frames[0]));
        assert_eq!(reassembler.first_gap(), Some(2));
        assert!(!reassembler.insert(&frames[0]));
        assert!(reassembler.insert(&frames[3]));
        assert!(reassembler.insert(&frames[1]));
        assert_eq!(reassembler.first_gap(), None);

        assert_eq!(reassembler.assemble().unwrap(), b"abcdefghij");
    }

    #[test]
    fn test_gap_is_an_error() {
        let frames = segment(b"abcdef", FrameType::Data, peer(), 2);
        let mut reassembler = Reassembler::new();
        reassembler.insert(&frames[0]);
        reassembler.insert(&frames[2]);

        assert!(matches!(
            reassembler.assemble(),
            Err(TransportError::StreamGap { sequence_number: 2 })
        ));
    }

    #[test]
    fn test_sequence_zero_rejected() {
        let mut reassembler = Reassembler::new();
        assert!(!reassembler.insert(&Frame::data(0, peer(), b"x".to_vec())));
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_far_ahead_segments_not_buffered() {
        let mut reassembler = Reassembler::new();
        let limit = FIRST_DATA_SEQUENCE + MAX_REORDER_DISTANCE;

        assert!(reassembler.insert(&Frame::data(limit - 1, peer(), b"x".to_vec())));
        assert!(!reassembler.insert(&Frame::data(limit, peer(), b"x".to_vec())));
        assert!(!reassembler.insert(&Frame::data(u32::MAX, peer(), b"x".to_vec())));
        assert_eq!(reassembler.len(), 1);

        // Filling the head of the stream moves the limit forward.
        assert!(reassembler.insert(&Frame::data(1, peer(), b"a".to_vec())));
        assert!(reassembler.in_reach(limit));
        assert!(reassembler.insert(&Frame::data(limit, peer(), b"x".to_vec())));
    }

    #[tokio::test]
    async fn test_receive_stream_ignores_far_ahead_data() {
        let mut io = ScriptedPeer::new();
        for offset in 0..3 {
            io.push(Frame::data(MAX_REORDER_DISTANCE + 10 + offset, peer(), vec![0; 8]));
        }
        io.push(Frame::data(1, peer(), b"ok".to_vec()));
        io.push(Frame::fin(40, peer()));

        let payload = receive_stream(&mut io, Duration::from_millis(50), None)
            .await
            .unwrap();
        assert_eq!(payload, b"ok");
        let acks: Vec<u32> = io.sent().iter().map(|f| f.sequence_number).collect();
        assert_eq!(acks, vec![1, 41]);
    }

    #[tokio::test]
    async fn test_receive_stream_acks_everything() {
        let frames = segment(b"hello world", FrameType::Data, peer(), 4);
        let mut io = ScriptedPeer::new();
        io.push(frames[1].clone());
        io.push(frames[2].clone());
        io.push(Frame::syn(5, peer()));
        io.push(frames[1].clone());
        io.push(Frame::fin(900, peer()));

        let payload = receive_stream(&mut io, Duration::from_millis(50), Some(frames[0].clone()))
            .await
            .unwrap();
        assert_eq!(payload, b"hello world");

        let sent = io.sent();
        let acks: Vec<u32> = sent.iter().map(|f| f.sequence_number).collect();
        assert_eq!(acks, vec![1, 2, 3, 2, 901]);
        assert!(sent.iter().all(|f| f.frame_type == FrameType::Ack));
        assert_eq!(sent[4].acknowledgment().unwrap(), 901);
    }

    #[tokio::test]
    async fn test_receive_stream_times_out() {
        let mut io = ScriptedPeer::new();
        let err = receive_stream(&mut io, Duration::from_millis(10), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(Phase::Receive)));
    }

    #[tokio::test]
    async fn test_fin_with_gap_is_not_acked() {
        let frames = segment(b"abcdef", FrameType::Data, peer(), 2);
        let mut io = ScriptedPeer::new();
        io.push(frames[0].clone());
        io.push(frames[2].clone());
        io.push(Frame::fin(1, peer()));

        let err = receive_stream(&mut io, Duration::from_millis(50), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::StreamGap { sequence_number: 2 }));
        assert_eq!(io.sent().len(), 2);
    }
}
