//! Transport layer error types.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use super::frame::{FrameError, FrameType};

/// Protocol phase a handshake check or a timeout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// SYN / SYN-ACK / ACK exchange.
    Open,
    /// Selective-repeat DATA transfer.
    Transfer,
    /// FIN / ACK exchange.
    Close,
    /// Reading the peer's stream.
    Receive,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Open => "open",
            Phase::Transfer => "transfer",
            Phase::Close => "close",
            Phase::Receive => "receive",
        };
        f.write_str(name)
    }
}

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Datagram could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    /// Received frame does not match what the protocol expects next.
    #[error("unexpected frame type: expected {expected}, got {actual}")]
    UnexpectedFrameType {
        /// Type the state machine was waiting for.
        expected: FrameType,
        /// Type that arrived.
        actual: FrameType,
    },

    /// Sequence-number mismatch during open or close.
    #[error("{phase} handshake failed: expected {expected}, got {actual}")]
    HandshakeFailed {
        /// Handshake that failed.
        phase: Phase,
        /// Acknowledgment value required.
        expected: u32,
        /// Acknowledgment value received.
        actual: u32,
    },

    /// A DATA frame exhausted its retransmission budget.
    #[error("frame {sequence_number} unacknowledged after {attempts} transmissions")]
    WindowTimeout {
        /// Sequence number of the frame.
        sequence_number: u32,
        /// Transmissions made, original included.
        attempts: u32,
    },

    /// Nothing arrived within the allowed time.
    #[error("timed out during {0}")]
    Timeout(Phase),

    /// The peer finished its stream with a segment missing.
    #[error("stream ended with segment {sequence_number} missing")]
    StreamGap {
        /// First missing sequence number.
        sequence_number: u32,
    },

    /// Only IPv4 peers can be named in a frame header.
    #[error("unsupported address family: {0}")]
    AddressFamily(SocketAddr),

    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Check if this error is fatal to the session.
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable_loss()
    }

    /// Check if the ARQ loop absorbs this error as ordinary loss.
    ///
    /// A malformed datagram during transfer is treated like a dropped one:
    /// the affected frame times out and is resent.
    pub fn is_recoverable_loss(&self) -> bool {
        matches!(self, TransportError::MalformedFrame(_))
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
