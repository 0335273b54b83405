//! Frame validation and parsing.
//!
//! [`validate`] and [`ParsedMessage::decode`] are independent: validation only
//! compares checksums, parsing only checks that the frame's own length claims
//! are consistent with the buffer. Callers that need integrity call both.

use crate::checksum;
use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::payloads::*;
use crate::registry::{self, ARENA_SIZE};
use crate::types::{unpack_link, Endpoint, FrameFormat, Signature};

/// Check the stored checksum of an encoded frame against a recomputed one.
///
/// Sentinels and bitmask consistency are not inspected. A buffer too short
/// for `format` is never valid.
pub fn validate(frame: &[u8], format: &FrameFormat) -> bool {
    match (
        checksum::stored_checksum(frame, format),
        checksum::frame_checksum(frame, format),
    ) {
        (Some(stored), Some(computed)) => stored == computed,
        _ => false,
    }
}

/// Like [`validate`], reporting the two checksums on mismatch.
pub fn verify(frame: &[u8], format: &FrameFormat) -> ProtocolResult<()> {
    let stored = checksum::stored_checksum(frame, format)
        .ok_or_else(|| ProtocolError::underflow(format.frame_len(), frame.len()))?;
    let computed = checksum::frame_checksum(frame, format)
        .ok_or_else(|| ProtocolError::underflow(format.frame_len(), frame.len()))?;
    if stored != computed {
        return Err(ProtocolError::ChecksumMismatch {
            expected: stored,
            actual: computed,
        });
    }
    Ok(())
}

/// A decoded frame.
///
/// Segment bytes live in a fixed arena with one block per signature. The
/// arena is reset at the start of every decode, so a reused message never
/// exposes segments from an earlier frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    from: Endpoint,
    to: Endpoint,
    /// Signature bits that were decoded.
    present: u16,
    /// Declared payload length of the source frame.
    length: usize,
    arena: [u8; ARENA_SIZE],
}

impl Default for ParsedMessage {
    fn default() -> Self {
        ParsedMessage {
            from: Endpoint::default(),
            to: Endpoint::default(),
            present: 0,
            length: 0,
            arena: [0u8; ARENA_SIZE],
        }
    }
}

impl ParsedMessage {
    /// Parse an encoded frame into a new message.
    pub fn decode(frame: &[u8], format: &FrameFormat) -> ProtocolResult<Self> {
        let mut message = ParsedMessage::default();
        message.decode_from(frame, format)?;
        Ok(message)
    }

    /// Parse an encoded frame into this message, replacing its contents.
    ///
    /// On error the message is left empty.
    pub fn decode_from(&mut self, frame: &[u8], format: &FrameFormat) -> ProtocolResult<()> {
        self.reset();

        let frame_len = format.frame_len();
        if frame.len() < frame_len {
            return Err(ProtocolError::underflow(frame_len, frame.len()));
        }

        let link = u16::from_le_bytes([frame[LINK_OFFSET], frame[LINK_OFFSET + 1]]);
        let bitmask = u16::from_le_bytes([frame[BITMASK_OFFSET], frame[BITMASK_OFFSET + 1]]);
        let declared = frame[format.length_offset()] as usize;

        let capacity = format.payload_capacity();
        if declared > capacity {
            return Err(ProtocolError::underflow(declared, capacity));
        }

        let implied = registry::implied_length(bitmask);
        if implied > declared {
            return Err(ProtocolError::underflow(implied, declared));
        }

        let (from_id, to_id) = unpack_link(link);
        let from = Endpoint::try_from(from_id)?;
        let to = Endpoint::try_from(to_id)?;

        if bitmask & !SIGNATURE_MASK != 0 {
            log::debug!("ignoring unassigned bitmask bits 0x{:04X}", bitmask & !SIGNATURE_MASK);
        }

        let payload = &frame[PAYLOAD_OFFSET..PAYLOAD_OFFSET + declared];
        let mut offset = 0;
        for signature in Signature::iter_bitmask(bitmask) {
            let size = registry::size_of(signature);
            let block = registry::arena_offset(signature);
            self.arena[block..block + size].copy_from_slice(&payload[offset..offset + size]);
            self.present |= signature.bit();
            log::trace!("unpacked {} ({} bytes) from offset {}", signature, size, offset);
            offset += size;
        }

        self.from = from;
        self.to = to;
        self.length = declared;
        Ok(())
    }

    /// Drop all decoded segments.
    pub fn reset(&mut self) {
        self.from = Endpoint::default();
        self.to = Endpoint::default();
        self.present = 0;
        self.length = 0;
        self.arena = [0u8; ARENA_SIZE];
    }

    /// Sender.
    pub fn from(&self) -> Endpoint {
        self.from
    }

    /// Recipient.
    pub fn to(&self) -> Endpoint {
        self.to
    }

    /// Signature bits that were decoded.
    pub fn bitmask(&self) -> u16 {
        self.present
    }

    /// Declared payload length of the source frame.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Whether no segment was decoded.
    pub fn is_empty(&self) -> bool {
        self.present == 0
    }

    /// Whether `signature` was present.
    pub fn is_present(&self, signature: Signature) -> bool {
        self.present & signature.bit() != 0
    }

    /// Raw bytes of a decoded segment.
    pub fn segment(&self, signature: Signature) -> Option<&[u8]> {
        if !self.is_present(signature) {
            return None;
        }
        let block = registry::arena_offset(signature);
        Some(&self.arena[block..block + registry::size_of(signature)])
    }

    /// Decode the segment for `T`.
    pub fn get<T: Segment>(&self) -> Option<T> {
        self.segment(T::SIGNATURE).map(|mut data| T::decode(&mut data))
    }

    /// Pitot segment, if present.
    pub fn pitot(&self) -> Option<Pitot> {
        self.get()
    }

    /// IMU segment, if present.
    pub fn imu(&self) -> Option<Imu> {
        self.get()
    }

    /// GPS segment, if present.
    pub fn gps(&self) -> Option<Gps> {
        self.get()
    }

    /// Environmental segment, if present.
    pub fn enviro(&self) -> Option<Enviro> {
        self.get()
    }

    /// Battery segment, if present.
    pub fn battery(&self) -> Option<Battery> {
        self.get()
    }

    /// System config segment, if present.
    pub fn config(&self) -> Option<SystemConfig> {
        self.get()
    }

    /// Status segment, if present.
    pub fn status(&self) -> Option<Status> {
        self.get()
    }

    /// Actuator segment, if present.
    pub fn actuators(&self) -> Option<Actuators> {
        self.get()
    }

    /// Air data segment, if present.
    pub fn airdata(&self) -> Option<AirData> {
        self.get()
    }

    /// Command segment, if present.
    pub fn cmds(&self) -> Option<Commands> {
        self.get()
    }

    /// Drop algorithm segment, if present.
    pub fn drop(&self) -> Option<DropAlgo> {
        self.get()
    }

    /// Every decoded payload, in signature order. The reserved slot is skipped.
    pub fn payloads(&self) -> impl Iterator<Item = Payload> + '_ {
        Signature::iter_bitmask(self.present).filter_map(move |signature| {
            self.segment(signature)
                .and_then(|data| Payload::decode(signature, data).ok())
        })
    }
}

/// Validator and parser bound to one frame format, reusing a single result.
#[derive(Debug, Clone, Default)]
pub struct MessageParser {
    format: FrameFormat,
    message: ParsedMessage,
}

impl MessageParser {
    /// Create a parser for `format`.
    pub fn new(format: FrameFormat) -> Self {
        MessageParser {
            format,
            message: ParsedMessage::default(),
        }
    }

    /// Frame format this parser reads.
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// See [`validate`].
    pub fn validate(&self, frame: &[u8]) -> bool {
        validate(frame, &self.format)
    }

    /// Parse `frame` into the reused message and return it.
    pub fn parse(&mut self, frame: &[u8]) -> ProtocolResult<&ParsedMessage> {
        self.message.decode_from(frame, &self.format)?;
        Ok(&self.message)
    }

    /// Result of the last parse. Empty if it failed.
    pub fn message(&self) -> &ParsedMessage {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MessageBuilder;

    fn battery_frame() -> Vec<u8> {
        let mut builder = MessageBuilder::new();
        builder.add_battery(Battery { voltage: 25, current: 12 });
        builder
            .build(Endpoint::Ground, Endpoint::RelayG1, false)
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_validate_short_buffer() {
        let format = FrameFormat::default();
        assert!(!validate(&[START_BYTE, 0, 0], &format));
        assert!(!validate(&[], &format));
    }

    #[test]
    fn test_validate_ignores_sentinels() {
        let format = FrameFormat::default();
        let mut frame = battery_frame();
        frame[0] = 0x00;
        let end = format.end_offset();
        frame[end] = 0x00;
        assert!(validate(&frame, &format));
    }

    #[test]
    fn test_verify_reports_both_checksums() {
        let format = FrameFormat::default();
        let mut frame = battery_frame();
        frame[PAYLOAD_OFFSET] ^= 0xFF;
        match verify(&frame, &format) {
            Err(ProtocolError::ChecksumMismatch { expected, actual }) => {
                assert_ne!(expected, actual)
            }
            other => panic!("expected checksum mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_battery() {
        let format = FrameFormat::default();
        let message = ParsedMessage::decode(&battery_frame(), &format).unwrap();

        assert_eq!(message.from(), Endpoint::Ground);
        assert_eq!(message.to(), Endpoint::RelayG1);
        assert_eq!(message.bitmask(), Signature::Battery.bit());
        assert_eq!(message.length(), BATTERY_SIZE);
        assert_eq!(message.battery(), Some(Battery { voltage: 25, current: 12 }));
        assert_eq!(message.segment(Signature::Battery), Some(&[25u8, 0, 12, 0][..]));
        assert!(message.imu().is_none());
    }

    #[test]
    fn test_parse_short_buffer() {
        let format = FrameFormat::default();
        let frame = battery_frame();
        let err = ParsedMessage::decode(&frame[..100], &format).unwrap_err();
        assert_eq!(err, ProtocolError::underflow(format.frame_len(), 100));
    }

    #[test]
    fn test_parse_length_past_capacity() {
        let format = FrameFormat::new(16).unwrap();
        let mut frame = vec![0u8; format.frame_len()];
        frame[format.length_offset()] = 17;
        let err = ParsedMessage::decode(&frame, &format).unwrap_err();
        assert_eq!(err, ProtocolError::underflow(17, 16));
    }

    #[test]
    fn test_parse_bitmask_exceeds_length() {
        let format = FrameFormat::default();
        let mut frame = battery_frame();
        // Claim an IMU segment as well without growing the length
        frame[BITMASK_OFFSET] |= Signature::Imu.bit() as u8;
        let err = ParsedMessage::decode(&frame, &format).unwrap_err();
        assert_eq!(err, ProtocolError::underflow(IMU_SIZE + BATTERY_SIZE, BATTERY_SIZE));
    }

    #[test]
    fn test_parse_unknown_endpoint() {
        let format = FrameFormat::default();
        let mut frame = battery_frame();
        frame[LINK_OFFSET + 1] = 7; // from
        let err = ParsedMessage::decode(&frame, &format).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownEndpoint(7));
    }

    #[test]
    fn test_parse_ignores_high_bits() {
        let format = FrameFormat::default();
        let mut frame = battery_frame();
        frame[BITMASK_OFFSET + 1] |= 0x80;
        let message = ParsedMessage::decode(&frame, &format).unwrap();
        assert_eq!(message.bitmask(), Signature::Battery.bit());
    }

    #[test]
    fn test_parser_reuse_drops_stale_segments() {
        let format = FrameFormat::default();
        let mut builder = MessageBuilder::new();
        builder
            .add_imu(Imu { ax: 1, ..Default::default() })
            .add_gps(Gps { satellites: 7, ..Default::default() });
        let first = builder.build(Endpoint::Plane, Endpoint::Ground, true).unwrap();
        builder.add_drop(DropAlgo { heading: 5, distance: 6 });
        let second = builder.build(Endpoint::Plane, Endpoint::Ground, true).unwrap();

        let mut parser = MessageParser::new(format);
        parser.parse(&first.to_bytes()).unwrap();
        assert!(parser.message().imu().is_some());

        let message = parser.parse(&second.to_bytes()).unwrap();
        assert!(message.imu().is_none());
        assert!(message.gps().is_none());
        assert_eq!(message.drop(), Some(DropAlgo { heading: 5, distance: 6 }));
    }

    #[test]
    fn test_parser_error_leaves_message_empty() {
        let mut parser = MessageParser::default();
        parser.parse(&battery_frame()).unwrap();
        assert!(!parser.message().is_empty());

        assert!(parser.parse(&[START_BYTE]).is_err());
        assert!(parser.message().is_empty());
        assert!(parser.message().battery().is_none());
    }

    #[test]
    fn test_payloads_iterator() {
        let format = FrameFormat::default();
        let mut builder = MessageBuilder::new();
        builder
            .add_drop(DropAlgo { heading: 1, distance: 2 })
            .add_pitot(Pitot { differential_pressure: 3 });
        let frame = builder.build(Endpoint::Ground, Endpoint::Plane, false).unwrap();

        let message = ParsedMessage::decode(&frame.to_bytes(), &format).unwrap();
        let payloads: Vec<_> = message.payloads().collect();
        assert_eq!(
            payloads,
            vec![
                Payload::Pitot(Pitot { differential_pressure: 3 }),
                Payload::Drop(DropAlgo { heading: 1, distance: 2 }),
            ]
        );
    }
}
