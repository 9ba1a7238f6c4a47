//! Protocol constants.
//!
//! Wire sizes are fixed by the frame format and MUST NOT be changed. Timing
//! values are defaults only; [`crate::core::SessionConfig`] overrides them.

use std::time::Duration;

// =============================================================================
// FRAME SIZES
// =============================================================================

/// Frame header size: type (1) + sequence number (4) + peer IPv4 (4) + peer port (2).
pub const HEADER_LEN: usize = 1 + 4 + 4 + 2;

/// Largest frame the protocol emits by default.
pub const MAX_FRAME_LEN: usize = 1024;

/// Largest payload carried by one default-sized frame.
pub const MAX_PAYLOAD: usize = MAX_FRAME_LEN - HEADER_LEN;

/// Upper bound for a configured frame length (largest UDP/IPv4 payload).
pub const MAX_DATAGRAM_LEN: usize = 65_507;

/// Receive buffer size; large enough for any datagram.
pub const RECV_BUFFER_SIZE: usize = 65_535;

// =============================================================================
// FRAME TYPE TAGS
// =============================================================================

/// Open request.
pub const FRAME_TYPE_SYN: u8 = 1;

/// Open acknowledgment carrying `isn + 1` in its payload.
pub const FRAME_TYPE_SYN_ACK: u8 = 2;

/// Acknowledgment (data or handshake).
pub const FRAME_TYPE_ACK: u8 = 3;

/// Negative acknowledgment: the peer's frame was rejected.
pub const FRAME_TYPE_NAK: u8 = 4;

/// Application data segment.
pub const FRAME_TYPE_DATA: u8 = 5;

/// Sender has finished its stream.
pub const FRAME_TYPE_FIN: u8 = 6;

// =============================================================================
// ARQ DEFAULTS
// =============================================================================

/// Number of DATA frames that may be in flight at once.
pub const DEFAULT_WINDOW_SIZE: usize = 4;

/// Per-frame retransmission timeout.
pub const RETRANSMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retransmissions allowed per frame before the session is abandoned.
pub const MAX_RETRANSMITS: u32 = 10;

/// First DATA sequence number of every stream.
pub const FIRST_DATA_SEQUENCE: u32 = 1;

/// How far past the next missing segment a receiver buffers DATA. Frames
/// beyond it are dropped unacknowledged. Bounds `window_size`.
pub const MAX_REORDER_DISTANCE: u32 = 1024;

// =============================================================================
// HANDSHAKE DEFAULTS
// =============================================================================

/// How long to wait for SYN-ACK or for the ACK of a FIN.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// SYN/FIN retransmissions before giving up.
pub const HANDSHAKE_RETRIES: u32 = 3;

/// Idle limit while reading a peer's stream.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// HTTP
// =============================================================================

/// Redirects followed before a request chain fails.
pub const MAX_REDIRECTS: u32 = 5;

/// Port used when a URL carries none.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Protocol version written on request and status lines.
pub const HTTP_VERSION: &str = "HTTP/1.0";

/// Line terminator.
pub const EOL: &str = "\r\n";

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = "courier";
