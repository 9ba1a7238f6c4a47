//! Core types shared by every layer: constants, configuration and errors.

mod config;
pub mod constants;
mod error;

pub use config::*;
pub use error::*;
