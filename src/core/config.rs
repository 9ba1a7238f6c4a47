//! Session configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::constants;
use super::error::{Error, Result};

/// Tunables for one request/response exchange.
///
/// Both peers read the same struct: the client uses every field, the server
/// ignores `max_redirects`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// DATA frames allowed in flight at once.
    pub window_size: usize,
    /// Per-frame retransmission timeout.
    pub retransmit_timeout: Duration,
    /// Retransmissions allowed per frame before `WindowTimeout`.
    pub max_retransmits: u32,
    /// Wait for SYN-ACK, for the final handshake ACK, or for the ACK of a FIN.
    pub handshake_timeout: Duration,
    /// SYN/FIN retransmissions before the handshake times out.
    pub handshake_retries: u32,
    /// Idle limit while reading the peer's stream.
    pub response_timeout: Duration,
    /// Largest frame this side emits (header included).
    pub max_frame_len: usize,
    /// Redirects followed per request chain.
    pub max_redirects: u32,
    /// Forward every datagram through this router instead of sending direct.
    pub router: Option<SocketAddr>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: constants::DEFAULT_WINDOW_SIZE,
            retransmit_timeout: constants::RETRANSMIT_TIMEOUT,
            max_retransmits: constants::MAX_RETRANSMITS,
            handshake_timeout: constants::HANDSHAKE_TIMEOUT,
            handshake_retries: constants::HANDSHAKE_RETRIES,
            response_timeout: constants::RESPONSE_TIMEOUT,
            max_frame_len: constants::MAX_FRAME_LEN,
            max_redirects: constants::MAX_REDIRECTS,
            router: None,
        }
    }
}

impl SessionConfig {
    /// Largest payload one frame can carry under this configuration.
    pub fn max_payload(&self) -> usize {
        self.max_frame_len.saturating_sub(constants::HEADER_LEN)
    }

    /// Reject configurations the transport cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::Config("window_size must be at least 1".into()));
        }
        if self.window_size > constants::MAX_REORDER_DISTANCE as usize {
            return Err(Error::Config(format!(
                "window_size {} exceeds the receiver's reorder limit of {}",
                self.window_size,
                constants::MAX_REORDER_DISTANCE
            )));
        }
        if self.max_frame_len <= constants::HEADER_LEN {
            return Err(Error::Config(format!(
                "max_frame_len {} leaves no room for payload (header is {} bytes)",
                self.max_frame_len,
                constants::HEADER_LEN
            )));
        }
        if self.max_frame_len > constants::MAX_DATAGRAM_LEN {
            return Err(Error::Config(format!(
                "max_frame_len {} exceeds the datagram limit of {}",
                self.max_frame_len,
                constants::MAX_DATAGRAM_LEN
            )));
        }
        for (name, value) in [
            ("retransmit_timeout", self.retransmit_timeout),
            ("handshake_timeout", self.handshake_timeout),
            ("response_timeout", self.response_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a builder holding the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sliding window size.
    pub fn window_size(mut self, size: usize) -> Self {
        self.config.window_size = size;
        self
    }

    /// Set the per-frame retransmission timeout.
    pub fn retransmit_timeout(mut self, timeout: Duration) -> Self {
        self.config.retransmit_timeout = timeout;
        self
    }

    /// Set the retransmission budget per frame.
    pub fn max_retransmits(mut self, max: u32) -> Self {
        self.config.max_retransmits = max;
        self
    }

    /// Set the handshake wait.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set how often SYN and FIN are resent.
    pub fn handshake_retries(mut self, retries: u32) -> Self {
        self.config.handshake_retries = retries;
        self
    }

    /// Set the idle limit for stream reads.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Set the largest emitted frame.
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.max_frame_len = len;
        self
    }

    /// Set the redirect budget.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Route every datagram through `router`.
    pub fn router(mut self, router: SocketAddr) -> Self {
        self.config.router = Some(router);
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_payload(), constants::MAX_PAYLOAD);
        assert_eq!(config.retransmit_timeout, Duration::from_secs(10));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfigBuilder::new()
            .window_size(2)
            .retransmit_timeout(Duration::from_millis(50))
            .max_frame_len(64)
            .router("127.0.0.1:3000".parse().unwrap())
            .build()
            .unwrap();

        assert_eq!(config.window_size, 2);
        assert_eq!(config.max_payload(), 64 - constants::HEADER_LEN);
        assert_eq!(config.router, Some("127.0.0.1:3000".parse().unwrap()));
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = SessionConfigBuilder::new().window_size(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_window_beyond_reorder_limit() {
        let limit = constants::MAX_REORDER_DISTANCE as usize;
        assert!(SessionConfigBuilder::new().window_size(limit).build().is_ok());
        let err = SessionConfigBuilder::new().window_size(limit + 1).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_frame_without_payload_room() {
        assert!(
            SessionConfigBuilder::new()
                .max_frame_len(constants::HEADER_LEN)
                .build()
                .is_err()
        );
        assert!(
            SessionConfigBuilder::new()
                .max_frame_len(constants::MAX_DATAGRAM_LEN + 1)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = SessionConfigBuilder::new()
            .handshake_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("handshake_timeout"));
    }
}
