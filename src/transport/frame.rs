//! Frame encoding, decoding and payload segmentation.
//!
//! Wire format (all integers big-endian):
//! ```text
//! +--------+------------------+------------------+-----------+-------------------+
//! | Type   | Sequence Number  | Peer Address     | Peer Port | Payload           |
//! | 1 byte | 4 bytes (BE32)   | 4 bytes (IPv4)   | 2 (BE16)  | 0..MAX_PAYLOAD    |
//! +--------+------------------+------------------+-----------+-------------------+
//! ```

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use thiserror::Error;

use crate::core::constants::{
    FIRST_DATA_SEQUENCE, FRAME_TYPE_ACK, FRAME_TYPE_DATA, FRAME_TYPE_FIN, FRAME_TYPE_NAK,
    FRAME_TYPE_SYN, FRAME_TYPE_SYN_ACK, HEADER_LEN,
};

/// Frame parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer shorter than required.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length required.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Type tag is not one of the six known values.
    #[error("invalid frame type: 0x{0:02x}")]
    InvalidType(u8),
}

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Open request.
    Syn = FRAME_TYPE_SYN,
    /// Open acknowledgment.
    SynAck = FRAME_TYPE_SYN_ACK,
    /// Acknowledgment.
    Ack = FRAME_TYPE_ACK,
    /// Negative acknowledgment.
    Nak = FRAME_TYPE_NAK,
    /// Application data.
    Data = FRAME_TYPE_DATA,
    /// End of stream.
    Fin = FRAME_TYPE_FIN,
}

impl FrameType {
    /// Parse frame type from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            FRAME_TYPE_SYN => Some(Self::Syn),
            FRAME_TYPE_SYN_ACK => Some(Self::SynAck),
            FRAME_TYPE_ACK => Some(Self::Ack),
            FRAME_TYPE_NAK => Some(Self::Nak),
            FRAME_TYPE_DATA => Some(Self::Data),
            FRAME_TYPE_FIN => Some(Self::Fin),
            _ => None,
        }
    }

    /// Convert frame type to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FrameType::Syn => "SYN",
            FrameType::SynAck => "SYN_ACK",
            FrameType::Ack => "ACK",
            FrameType::Nak => "NAK",
            FrameType::Data => "DATA",
            FrameType::Fin => "FIN",
        };
        f.write_str(name)
    }
}

/// One datagram unit.
///
/// `peer` names the far end: the destination on send, the origin on receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame type.
    pub frame_type: FrameType,
    /// Sequence number (meaning depends on the type).
    pub sequence_number: u32,
    /// Remote endpoint.
    pub peer: SocketAddrV4,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame.
    pub fn new(frame_type: FrameType, sequence_number: u32, peer: SocketAddrV4, payload: Vec<u8>) -> Self {
        Self {
            frame_type,
            sequence_number,
            peer,
            payload,
        }
    }

    /// Open request carrying the initial sequence number.
    pub fn syn(isn: u32, peer: SocketAddrV4) -> Self {
        Self::new(FrameType::Syn, isn, peer, Vec::new())
    }

    /// Open acknowledgment: our own sequence number in the header, the
    /// acknowledged value (`isn + 1`) in the payload.
    pub fn syn_ack(sequence_number: u32, acknowledgment: u32, peer: SocketAddrV4) -> Self {
        Self::new(
            FrameType::SynAck,
            sequence_number,
            peer,
            acknowledgment.to_be_bytes().to_vec(),
        )
    }

    /// Data acknowledgment: the acknowledged DATA sequence number in the header.
    pub fn ack(sequence_number: u32, peer: SocketAddrV4) -> Self {
        Self::new(FrameType::Ack, sequence_number, peer, Vec::new())
    }

    /// Handshake acknowledgment: the value in both the header and the payload.
    pub fn handshake_ack(acknowledgment: u32, peer: SocketAddrV4) -> Self {
        Self::new(
            FrameType::Ack,
            acknowledgment,
            peer,
            acknowledgment.to_be_bytes().to_vec(),
        )
    }

    /// Negative acknowledgment.
    pub fn nak(peer: SocketAddrV4) -> Self {
        Self::new(FrameType::Nak, 0, peer, Vec::new())
    }

    /// Application data segment.
    pub fn data(sequence_number: u32, peer: SocketAddrV4, payload: Vec<u8>) -> Self {
        Self::new(FrameType::Data, sequence_number, peer, payload)
    }

    /// End of stream.
    pub fn fin(sequence_number: u32, peer: SocketAddrV4) -> Self {
        Self::new(FrameType::Fin, sequence_number, peer, Vec::new())
    }

    /// Remote endpoint as a generic socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.peer)
    }

    /// Encoded length of this frame.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialize to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.frame_type.as_byte());
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.peer.ip().octets());
        buf.extend_from_slice(&self.peer.port().to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a frame from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::TooShort {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let frame_type = FrameType::from_byte(bytes[0]).ok_or(FrameError::InvalidType(bytes[0]))?;

        let mut seq_bytes = [0u8; 4];
        seq_bytes.copy_from_slice(&bytes[1..5]);
        let sequence_number = u32::from_be_bytes(seq_bytes);

        let address = Ipv4Addr::new(bytes[5], bytes[6], bytes[7], bytes[8]);
        let port = u16::from_be_bytes([bytes[9], bytes[10]]);

        Ok(Self {
            frame_type,
            sequence_number,
            peer: SocketAddrV4::new(address, port),
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Read the big-endian acknowledgment value carried in the payload.
    pub fn acknowledgment(&self) -> Result<u32, FrameError> {
        if self.payload.len() < 4 {
            return Err(FrameError::TooShort {
                expected: HEADER_LEN + 4,
                actual: self.encoded_len(),
            });
        }
        let mut value = [0u8; 4];
        value.copy_from_slice(&self.payload[..4]);
        Ok(u32::from_be_bytes(value))
    }
}

/// Split `payload` into frames of at most `max_payload` bytes each.
///
/// Sequence numbers start at 1 and increase by one per frame; only the last
/// frame may be shorter than `max_payload`. An empty payload yields no frames.
///
/// # Panics
///
/// Panics if `max_payload` is zero.
pub fn segment(payload: &[u8], frame_type: FrameType, peer: SocketAddrV4, max_payload: usize) -> Vec<Frame> {
    assert!(max_payload > 0, "max_payload must be at least 1");

    payload
        .chunks(max_payload)
        .zip(FIRST_DATA_SEQUENCE..)
        .map(|(chunk, sequence_number)| Frame::new(frame_type, sequence_number, peer, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::MAX_PAYLOAD;

    fn peer() -> SocketAddrV4 {
        "10.0.0.1:8080".parse().unwrap()
    }

    #[test]
    fn test_frame_type_roundtrip() {
        for byte in 1..=6u8 {
            let frame_type = FrameType::from_byte(byte).unwrap();
            assert_eq!(frame_type.as_byte(), byte);
        }
        assert_eq!(FrameType::from_byte(0), None);
        assert_eq!(FrameType::from_byte(7), None);
    }

    #[test]
    fn test_wire_layout() {
        let frame = Frame::data(0x0102_0304, peer(), b"hi".to_vec());
        let encoded = frame.encode();
        assert_eq!(encoded, hex::decode("05010203040a0000011f906869").unwrap());
        assert_eq!(encoded.len(), HEADER_LEN + 2);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let frames = [
            Frame::syn(u32::MAX, peer()),
            Frame::syn_ack(7, 101, peer()),
            Frame::ack(3, peer()),
            Frame::handshake_ack(42, peer()),
            Frame::nak(peer()),
            Frame::data(1, peer(), vec![0xAB; MAX_PAYLOAD]),
            Frame::fin(9, peer()),
        ];
        for frame in frames {
            assert_eq!(Frame::decode(&frame.encode()).unwrap(), frame);
        }
    }

    #[test]
    fn test_decode_too_short() {
        let result = Frame::decode(&[5, 0, 0, 0]);
        assert_eq!(
            result,
            Err(FrameError::TooShort {
                expected: HEADER_LEN,
                actual: 4
            })
        );
    }

    #[test]
    fn test_decode_invalid_type() {
        let mut bytes = Frame::fin(1, peer()).encode();
        bytes[0] = 0x2A;
        assert_eq!(Frame::decode(&bytes), Err(FrameError::InvalidType(0x2A)));
    }

    #[test]
    fn test_acknowledgment_payload() {
        let frame = Frame::syn_ack(500, 101, peer());
        assert_eq!(frame.sequence_number, 500);
        assert_eq!(frame.acknowledgment().unwrap(), 101);
        assert_eq!(frame.payload, vec![0, 0, 0, 101]);

        assert!(Frame::ack(1, peer()).acknowledgment().is_err());
    }

    #[test]
    fn test_segment_sizes_and_sequence() {
        let payload: Vec<u8> = (0..25u8).collect();
        let frames = segment(&payload, FrameType::Data, peer(), 10);

        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames.iter().map(|f| f.sequence_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(frames[0].payload.len(), 10);
        assert_eq!(frames[1].payload.len(), 10);
        assert_eq!(frames[2].payload.len(), 5);
        assert!(frames.iter().all(|f| f.frame_type == FrameType::Data && f.peer == peer()));
    }

    #[test]
    fn test_segment_reassembles_exactly() {
        for len in [1usize, 9, 10, 11, 100, 1013, 1014, 5000] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            for max_payload in [1usize, 7, 10, MAX_PAYLOAD] {
                let frames = segment(&payload, FrameType::Data, peer(), max_payload);
                let joined: Vec<u8> = frames.iter().flat_map(|f| f.payload.clone()).collect();
                assert_eq!(joined, payload);
                let (last, rest) = frames.split_last().unwrap();
                assert!(rest.iter().all(|f| f.payload.len() == max_payload));
                assert!(!last.payload.is_empty() && last.payload.len() <= max_payload);
            }
        }
    }

    #[test]
    fn test_segment_empty_payload() {
        assert!(segment(&[], FrameType::Data, peer(), 10).is_empty());
    }

    #[test]
    #[should_panic]
    fn test_segment_zero_max_payload() {
        segment(b"abc", FrameType::Data, peer(), 0);
    }
}
