//! Client library.
//!
//! [`HttpClient`] for whole request chains, [`ClientSession`] for a single
//! exchange over any [`crate::transport::FrameIo`].

#[allow(clippy::module_inception)]
mod client;
mod session;

pub use client::*;
pub use session::*;
