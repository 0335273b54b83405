//! Error types for link sessions.

use aero_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by link sessions and their configuration.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid link config: {0}")]
    InvalidConfig(String),

    /// Both sides of a relay must agree on the frame size.
    #[error("frame format mismatch: source carries {source_capacity} byte payloads, sink {sink_capacity}")]
    FormatMismatch {
        source_capacity: usize,
        sink_capacity: usize,
    },
}

/// Result type for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
