//! The HTTP/1.0 text carried over the transport.
//!
//! Requests and responses are plain byte payloads to the transport; this
//! module formats and parses them and holds the redirect rules.

mod request;
mod response;

pub use request::{Method, Request};
pub use response::{Response, Status};
