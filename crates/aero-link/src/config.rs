//! Link configuration.

use std::path::Path;

use aero_protocol::{Endpoint, FrameFormat, DEFAULT_PAYLOAD_CAPACITY};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};

/// Default bytes requested from the transport per read.
pub const DEFAULT_READ_CHUNK: usize = 256;

/// Configuration for one end of a link.
///
/// ```yaml
/// name: ground-station
/// local: ground
/// remote: plane
/// payload_capacity: 200
/// clear_after_send: false
/// read_chunk: 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Name used in logs and metric labels.
    pub name: String,
    /// Endpoint this side sends as.
    pub local: Endpoint,
    /// Endpoint frames are addressed to by default.
    pub remote: Endpoint,
    /// Payload field size; must match the peer.
    pub payload_capacity: usize,
    /// Empty the builder slots after every send.
    pub clear_after_send: bool,
    /// Bytes requested per transport read.
    pub read_chunk: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            name: "link".to_string(),
            local: Endpoint::Ground,
            remote: Endpoint::Plane,
            payload_capacity: DEFAULT_PAYLOAD_CAPACITY,
            clear_after_send: false,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

impl LinkConfig {
    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> LinkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> LinkResult<Self> {
        let config: LinkConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges.
    pub fn validate(&self) -> LinkResult<()> {
        self.frame_format()?;
        if self.read_chunk == 0 {
            return Err(LinkError::InvalidConfig("read_chunk must be non-zero".to_string()));
        }
        if self.local == self.remote {
            return Err(LinkError::InvalidConfig(format!(
                "local and remote are both {}",
                self.local
            )));
        }
        Ok(())
    }

    /// Frame format for the configured capacity.
    pub fn frame_format(&self) -> LinkResult<FrameFormat> {
        Ok(FrameFormat::new(self.payload_capacity)?)
    }
}
