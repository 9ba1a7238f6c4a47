//! # Courier
//!
//! HTTP/1.0 request/response over UDP, made reliable by a small transport of
//! its own:
//!
//! - **Handshake**: three-way open, FIN/ACK close, strict sequence checks
//! - **Framing**: an 11-byte header (type, sequence number, peer IPv4 and port)
//! - **Selective repeat**: a sliding window with a retransmission deadline per frame
//! - **Sessions**: one session per request, with bounded redirect following
//!
//! ## Feature Flags
//!
//! - `client` (default): [`client::HttpClient`] and the `httpc` binary
//! - `server` (default): [`server::Server`], [`server::FileHandler`] and the `httpfs` binary
//!
//! ## Modules
//!
//! - [`core`]: Constants, configuration and error types (always included)
//! - [`transport`]: Frames, handshake, ARQ engine, endpoints (always included)
//! - [`http`]: Request formatting and response interpretation (always included)
//! - [`client`]: Client API (requires `client` feature)
//! - [`server`]: Server API (requires `server` feature)
//!
//! ## Example Usage
//!
//! ```ignore
//! use courier::prelude::*;
//!
//! let client = HttpClient::builder().build()?;
//! let outcome = client
//!     .perform(Request::get("http://127.0.0.1:8080/index.html")?)
//!     .await?;
//! assert_eq!(outcome.response.status, 200);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Wire protocol and reliability layer
pub mod transport;

// Payload formatting
pub mod http;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

// Server API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::http::{Method, Request, Response, Status};

    pub use crate::transport::{
        ArqEngine, DatagramEndpoint, Frame, FrameIo, FrameType, Handshake, HandshakeState, TransferReport,
        TransportError, TransportResult,
    };

    #[cfg(feature = "client")]
    pub use crate::client::{ClientSession, HttpClient, HttpClientBuilder, Outcome};

    #[cfg(feature = "server")]
    pub use crate::server::{FileHandler, Handler, Server, ServerConfig, ServerConfigBuilder};
}

// Re-export commonly used items at crate root
pub use crate::core::{Error, Result, SessionConfig, SessionConfigBuilder};
pub use crate::transport::{Frame, FrameType, TransportError};
