//! Telemetry link sessions.
//!
//! A [`LinkSession`] binds one byte-stream transport (a serial port, a TCP
//! stream, a file) to a frame builder, a stream reassembler and a parser.
//! Each session owns its own buffers, so any number of links can run side by
//! side. [`relay`] forwards frames between two sessions unchanged, which is
//! all a relay node does.

mod config;
mod error;
mod session;

pub use config::LinkConfig;
pub use error::{LinkError, LinkResult};
pub use session::{relay, LinkSession, LinkStats};
