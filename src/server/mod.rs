//! Server library.
//!
//! [`Server`] accepts sessions on one endpoint and answers them through a
//! [`Handler`]; [`FileHandler`] serves a directory.

mod handler;
#[allow(clippy::module_inception)]
mod server;
mod session;

pub use handler::*;
pub use server::*;
pub use session::*;
