//! High-level server API.
//!
//! Provides [`Server`], which waits for SYNs on one endpoint and serves each
//! session to completion before accepting the next.

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::handler::{FileHandler, Handler};
use super::session::{SessionSummary, serve_session};
use crate::core::constants::DEFAULT_HTTP_PORT;
use crate::core::{Result, SessionConfig};
use crate::transport::{DatagramEndpoint, Frame, FrameIo, FrameType, TransportResult};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,

    /// Directory served by [`FileHandler`].
    pub root: PathBuf,

    /// Transport tunables for every session.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            root: PathBuf::from("."),
            session: SessionConfig::default(),
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the port, keeping the bind address's IP.
    pub fn port(mut self, port: u16) -> Self {
        self.config.bind_addr.set_port(port);
        self
    }

    /// Set the served directory.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Set the transport tunables.
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    /// Route every datagram through `router`.
    pub fn router(mut self, router: SocketAddr) -> Self {
        self.config.session.router = Some(router);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<ServerConfig> {
        self.config.session.validate()?;
        Ok(self.config)
    }
}

/// Serves one session at a time over a [`FrameIo`].
#[derive(Debug)]
pub struct Server<E, H> {
    io: E,
    handler: H,
    config: SessionConfig,
}

impl Server<DatagramEndpoint, FileHandler> {
    /// Bind a UDP endpoint and serve `config.root`.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        Self::bind_with(config, FileHandler::new(&config.root)).await
    }
}

impl<H: Handler> Server<DatagramEndpoint, H> {
    /// Bind a UDP endpoint serving requests with `handler`.
    pub async fn bind_with(config: &ServerConfig, handler: H) -> Result<Self> {
        config.session.validate()?;
        let endpoint = DatagramEndpoint::bind(config.bind_addr)
            .await?
            .with_router(config.session.router);
        info!(addr = %endpoint.local_addr(), "server listening");
        Ok(Self::new(endpoint, handler, config.session.clone()))
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.io.local_addr()
    }
}

impl<E: FrameIo, H: Handler> Server<E, H> {
    /// Serve over an existing endpoint.
    pub fn new(io: E, handler: H, config: SessionConfig) -> Self {
        Self { io, handler, config }
    }

    /// The endpoint.
    pub fn io(&self) -> &E {
        &self.io
    }

    /// The request handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Serve sessions until the endpoint fails.
    ///
    /// A failed session is logged and the server moves on to the next SYN.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let syn = self.next_syn().await?;
            match serve_session(&mut self.io, &syn, &self.handler, &self.config).await {
                Ok(summary) => debug!(?summary, "session finished"),
                Err(err) => warn!(peer = %syn.peer, error = %err, "session failed"),
            }
        }
    }

    /// Wait for the next SYN and serve that one session.
    pub async fn serve_one(&mut self) -> Result<SessionSummary> {
        let syn = self.next_syn().await?;
        serve_session(&mut self.io, &syn, &self.handler, &self.config).await
    }

    /// Skip everything up to the next SYN. Leftovers from finished sessions
    /// (late ACKs, retransmitted FINs) land here.
    async fn next_syn(&mut self) -> TransportResult<Frame> {
        loop {
            match self.io.receive().await {
                Ok(frame) if frame.frame_type == FrameType::Syn => return Ok(frame),
                Ok(frame) => {
                    debug!(
                        frame_type = %frame.frame_type,
                        seq = frame.sequence_number,
                        peer = %frame.peer,
                        "ignoring frame outside a session"
                    );
                }
                Err(err) if err.is_recoverable_loss() => {
                    warn!(error = %err, "discarding malformed frame");
                }
                Err(err) => return Err(err),
            }
        }
    }
}
