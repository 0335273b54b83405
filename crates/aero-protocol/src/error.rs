//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when building or parsing telemetry frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Signature ordinal outside the registry.
    #[error("unknown signature ordinal: {0}")]
    Schema(u8),

    /// Pending segments do not fit in the payload field.
    #[error("capacity exceeded: segments need {required} bytes, payload holds {capacity}")]
    CapacityExceeded {
        /// Bytes the pending segments would occupy.
        required: usize,
        /// Payload capacity of the frame format.
        capacity: usize,
    },

    /// Stored checksum does not match the recomputed one.
    #[error("checksum mismatch: frame carries 0x{expected:04X}, computed 0x{actual:04X}")]
    ChecksumMismatch {
        /// Checksum stored in the frame.
        expected: u16,
        /// Checksum computed over the received bytes.
        actual: u16,
    },

    /// Bitmask, length field or buffer size would require reading past the data.
    #[error("frame underflow: need {required} bytes, only {available} available")]
    UnderflowFrame {
        /// Bytes the frame claims to need.
        required: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// Link byte does not name a known endpoint.
    #[error("unknown endpoint id: {0}")]
    UnknownEndpoint(u8),

    /// Frame format parameters are unusable.
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),
}

impl ProtocolError {
    /// Create an underflow error.
    pub fn underflow(required: usize, available: usize) -> Self {
        ProtocolError::UnderflowFrame {
            required,
            available,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Schema(_) => "schema",
            ProtocolError::CapacityExceeded { .. } => "capacity",
            ProtocolError::ChecksumMismatch { .. } => "checksum",
            ProtocolError::UnderflowFrame { .. } => "underflow",
            ProtocolError::UnknownEndpoint(_) => "endpoint",
            ProtocolError::InvalidFormat(_) => "format",
        }
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::underflow(21, 4);
        assert!(err.to_string().contains("need 21 bytes"));

        let err = ProtocolError::ChecksumMismatch {
            expected: 0x00AB,
            actual: 0x1234,
        };
        assert!(err.to_string().contains("0x00AB"));
        assert_eq!(err.kind(), "checksum");
    }
}
