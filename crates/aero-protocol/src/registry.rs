//! Segment registry.
//!
//! Static table mapping each signature to its fixed encoded size. Wire sizing
//! comes only from this table; segments never describe their own length.

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::Signature;

/// Encoded size of each signature, indexed by ordinal.
pub const SEGMENT_SIZES: [usize; SIGNATURE_COUNT] = [
    PITOT_SIZE,
    IMU_SIZE,
    GPS_SIZE,
    ENVIRO_SIZE,
    BATTERY_SIZE,
    CONFIG_SIZE,
    STATUS_SIZE,
    ACTUATORS_SIZE,
    AIRDATA_SIZE,
    COMMANDS_SIZE,
    DROP_SIZE,
    RESERVED_SIZE,
];

const fn arena_offsets() -> [usize; SIGNATURE_COUNT] {
    let mut offsets = [0usize; SIGNATURE_COUNT];
    let mut i = 1;
    while i < SIGNATURE_COUNT {
        offsets[i] = offsets[i - 1] + SEGMENT_SIZES[i - 1];
        i += 1;
    }
    offsets
}

/// Start of each signature's block inside a decode arena.
const ARENA_OFFSETS: [usize; SIGNATURE_COUNT] = arena_offsets();

/// Bytes needed to hold every segment at once.
pub const ARENA_SIZE: usize =
    ARENA_OFFSETS[SIGNATURE_COUNT - 1] + SEGMENT_SIZES[SIGNATURE_COUNT - 1];

/// Encoded size of `signature`.
pub const fn size_of(signature: Signature) -> usize {
    SEGMENT_SIZES[signature as usize]
}

/// Encoded size for a raw ordinal.
pub fn size_of_ordinal(ordinal: u8) -> ProtocolResult<usize> {
    SEGMENT_SIZES
        .get(ordinal as usize)
        .copied()
        .ok_or(ProtocolError::Schema(ordinal))
}

/// Offset of `signature`'s block in a decode arena of [`ARENA_SIZE`] bytes.
pub const fn arena_offset(signature: Signature) -> usize {
    ARENA_OFFSETS[signature as usize]
}

/// Payload bytes implied by the signature bits of `bitmask`. Bits 12..15 are ignored.
pub fn implied_length(bitmask: u16) -> usize {
    Signature::iter_bitmask(bitmask).map(size_of).sum()
}
