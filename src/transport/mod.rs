//! Reliable request/response transport over UDP.
//!
//! This module implements a miniature connection-oriented transport on top of
//! a connectionless socket. It provides:
//!
//! - **Frame encoding/decoding**: [`Frame`], [`FrameType`] and [`segment`]
//! - **Frame I/O**: the [`FrameIo`] seam and its UDP implementation [`DatagramEndpoint`]
//! - **Handshake**: [`Handshake`] for the 3-way open and the FIN/ACK close
//! - **Selective repeat**: [`SelectiveRepeatWindow`] bookkeeping driven by [`ArqEngine`]
//! - **Receive side**: [`Reassembler`] and [`receive_stream`]
//! - **Fault injection**: [`LossyEndpoint`] for deterministic loss in tests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Session (client / server)         │
//! ├─────────────────────────────────────────┤
//! │  Handshake │ ArqEngine │ receive_stream │  ← This module
//! ├─────────────────────────────────────────┤
//! │     FrameIo (DatagramEndpoint, ...)     │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```

mod arq;
mod endpoint;
mod error;
mod frame;
mod handshake;
mod io;
mod reassembly;
mod simulator;
#[cfg(test)]
pub(crate) mod testing;
mod window;

pub use arq::{ArqEngine, TransferReport};
pub use endpoint::{DatagramEndpoint, PeerBound, ipv4_peer, random_initial_sequence_number};
pub use error::*;
pub use frame::*;
pub use handshake::{Handshake, HandshakeState};
pub use io::FrameIo;
pub use reassembly::{Reassembler, receive_stream};
pub use simulator::{DropRule, FaultPlan, LossyEndpoint};
pub use window::{AckOutcome, SelectiveRepeatWindow};
