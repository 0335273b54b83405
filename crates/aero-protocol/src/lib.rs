//! Aero Telemetry Protocol
//!
//! This crate provides the frame codec used between the ground station and the
//! aircraft. A frame multiplexes a closed set of fixed-size payloads
//! ("segments"); a 16-bit bitmask says which are present and the segments are
//! packed back to back in ascending signature order, without length prefixes.
//!
//! # Protocol Overview
//!
//! - **Segment registry**: each [`Signature`] has one payload struct and one
//!   fixed encoded size ([`registry::size_of`]).
//! - **Builder**: [`MessageBuilder`] keeps the latest payload per signature and
//!   serializes the occupied slots into a [`RawFrame`].
//! - **Validator / parser**: [`validate`] compares checksums, [`ParsedMessage`]
//!   decodes a frame into owned per-signature blocks.
//! - **Reassembly**: [`FrameReassembler`] finds frames in a raw byte stream.
//!
//! # Example
//!
//! ```rust
//! use aero_protocol::{Battery, Endpoint, FrameFormat, MessageBuilder, ParsedMessage, validate};
//!
//! let mut builder = MessageBuilder::new();
//! builder.add_battery(Battery { voltage: 25, current: 12 });
//! let frame = builder.build(Endpoint::Ground, Endpoint::RelayG1, false)?.to_bytes();
//!
//! let format = FrameFormat::default();
//! assert!(validate(&frame, &format));
//! let message = ParsedMessage::decode(&frame, &format)?;
//! assert_eq!(message.battery(), Some(Battery { voltage: 25, current: 12 }));
//! # Ok::<(), aero_protocol::ProtocolError>(())
//! ```

mod builder;
pub mod checksum;
mod constants;
mod error;
mod frame;
mod parser;
mod payloads;
pub mod registry;
mod types;

pub use builder::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use parser::*;
pub use payloads::*;
pub use types::*;
