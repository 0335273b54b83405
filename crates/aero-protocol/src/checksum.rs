//! Frame checksum.
//!
//! CRC-16/IBM-3740 (poly 0x1021, init 0xFFFF) over the link, bitmask, full
//! payload field and length byte. Sentinels and the checksum itself are not
//! covered.

use crc::{Crc, CRC_16_IBM_3740};

use crate::constants::LINK_OFFSET;
use crate::types::FrameFormat;

/// CRC-16 algorithm used for frame integrity.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Calculate the CRC-16 of `data`.
pub fn calculate_crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Checksum of a frame from its decoded fields.
pub fn fields_checksum(link: u16, bitmask: u16, payload: &[u8], length: u8) -> u16 {
    let mut digest = CRC16.digest();
    digest.update(&link.to_le_bytes());
    digest.update(&bitmask.to_le_bytes());
    digest.update(payload);
    digest.update(&[length]);
    digest.finalize()
}

/// Checksum of an encoded frame, or `None` if `frame` is too short for `format`.
pub fn frame_checksum(frame: &[u8], format: &FrameFormat) -> Option<u16> {
    frame
        .get(LINK_OFFSET..format.checksum_offset())
        .map(calculate_crc16)
}

/// Checksum stored in an encoded frame, or `None` if `frame` is too short.
pub fn stored_checksum(frame: &[u8], format: &FrameFormat) -> Option<u16> {
    let offset = format.checksum_offset();
    frame
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}
