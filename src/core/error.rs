//! Error types for the request/response layer.

use thiserror::Error;

use crate::transport::TransportError;

/// Top-level errors returned by [`crate::client::HttpClient::perform`] and the
/// server.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport error (handshake, transfer, or I/O on the datagram socket).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A redirect chain exceeded the configured number of follows.
    #[error("redirect limit of {limit} exceeded")]
    RedirectLimitExceeded {
        /// Maximum number of follows allowed.
        limit: u32,
    },

    /// A redirect status arrived without a usable `Location` header.
    #[error("redirect status {status} without a usable Location header")]
    RedirectLocationMissing {
        /// Status code of the offending response.
        status: u16,
    },

    /// The peer's response could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The peer's request could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A URL or redirect target could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error outside the transport (name resolution, files).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error ends a whole redirect chain rather than one session.
    pub fn is_redirect_error(&self) -> bool {
        matches!(
            self,
            Error::RedirectLimitExceeded { .. } | Error::RedirectLocationMissing { .. }
        )
    }
}

/// Result type for request/response operations.
pub type Result<T> = std::result::Result<T, Error>;
