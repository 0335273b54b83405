//! Raw frame encoding and stream reassembly.
//!
//! A frame has a fixed size for a given [`FrameFormat`]; the payload field is
//! always `capacity` bytes and unused bytes are zero. All multi-byte header
//! fields are little-endian.
//!
//! ```text
//! +-------+--------+---------+------------------+--------+----------+-----+
//! | start |  link  | bitmask | payload[cap]     | length | checksum | end |
//! |  0x0A | to,frm | lo, hi  | segments, zeros  |   u8   |  lo, hi  | 0x0F|
//! +-------+--------+---------+------------------+--------+----------+-----+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum;
use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{unpack_link, FrameFormat};

/// A frame as laid out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub start: u8,
    /// `(from << 8) | to`.
    pub link: u16,
    /// Bit i set when signature i is present.
    pub bitmask: u16,
    /// Full payload field, `capacity` bytes.
    pub payload: Vec<u8>,
    /// Bytes of `payload` in use.
    pub length: u8,
    pub checksum: u16,
    pub end: u8,
}

impl RawFrame {
    /// An empty frame for `format`: sentinels set, everything else zero.
    pub fn empty(format: &FrameFormat) -> Self {
        RawFrame {
            start: START_BYTE,
            link: 0,
            bitmask: 0,
            payload: vec![0u8; format.payload_capacity()],
            length: 0,
            checksum: 0,
            end: END_BYTE,
        }
    }

    /// Raw sender id.
    pub fn from_id(&self) -> u8 {
        unpack_link(self.link).0
    }

    /// Raw recipient id.
    pub fn to_id(&self) -> u8 {
        unpack_link(self.link).1
    }

    /// Payload field capacity.
    pub fn capacity(&self) -> usize {
        self.payload.len()
    }

    /// The used part of the payload field.
    pub fn payload_bytes(&self) -> &[u8] {
        let used = (self.length as usize).min(self.payload.len());
        &self.payload[..used]
    }

    /// Encoded size of this frame.
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Checksum over the covered fields as they currently stand.
    pub fn compute_checksum(&self) -> u16 {
        checksum::fields_checksum(self.link, self.bitmask, &self.payload, self.length)
    }

    /// Write the frame to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.start);
        buf.put_u16_le(self.link);
        buf.put_u16_le(self.bitmask);
        buf.put_slice(&self.payload);
        buf.put_u8(self.length);
        buf.put_u16_le(self.checksum);
        buf.put_u8(self.end);
    }

    /// Encode into a new buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Reinterpret `data` as a frame of `format`.
    ///
    /// Only the buffer size is checked; sentinels, checksum and bitmask are
    /// taken as they are.
    pub fn decode(data: &[u8], format: &FrameFormat) -> ProtocolResult<Self> {
        let frame_len = format.frame_len();
        if data.len() < frame_len {
            return Err(ProtocolError::underflow(frame_len, data.len()));
        }

        let mut buf = &data[..frame_len];
        let start = buf.get_u8();
        let link = buf.get_u16_le();
        let bitmask = buf.get_u16_le();
        let payload = buf[..format.payload_capacity()].to_vec();
        buf.advance(format.payload_capacity());
        let length = buf.get_u8();
        let checksum = buf.get_u16_le();
        let end = buf.get_u8();

        Ok(RawFrame {
            start,
            link,
            bitmask,
            payload,
            length,
            checksum,
            end,
        })
    }
}

/// Per-connection delimiter scanner.
///
/// Accumulates bytes from a stream and yields complete candidate frames: a
/// start sentinel followed by `frame_len - 1` bytes whose last byte is the end
/// sentinel. Candidates are not checksum-verified.
#[derive(Debug)]
pub struct FrameReassembler {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    format: FrameFormat,
    /// Bytes dropped while hunting for a frame.
    discarded: u64,
}

impl FrameReassembler {
    /// Create a reassembler for frames of `format`.
    pub fn new(format: FrameFormat) -> Self {
        FrameReassembler {
            buffer: BytesMut::with_capacity(format.frame_len() * 2),
            format,
            discarded: 0,
        }
    }

    /// Frame format this reassembler scans for.
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Add received data to the buffer.
    ///
    /// At most [`max_buffered`](Self::max_buffered) bytes are kept, so
    /// callers holding larger input push it in pieces and drain in between.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        let limit = self.max_buffered();
        if self.buffer.len() > limit {
            let excess = self.buffer.len() - limit;
            log::debug!("reassembler over limit, dropping {} oldest bytes", excess);
            self.buffer.advance(excess);
            self.discarded += excess as u64;
        }
    }

    /// Add a single byte and return a frame if it completed one.
    pub fn push_byte(&mut self, byte: u8) -> Option<Bytes> {
        self.push(&[byte]);
        self.next_frame()
    }

    /// Try to extract a complete frame from the buffer.
    ///
    /// Returns `None` if more data is needed.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        self.peek_frame()?;
        self.consume_frame()
    }

    /// Scan to the next candidate frame and return it without consuming it.
    ///
    /// Follow with [`consume_frame`](Self::consume_frame) to take the
    /// candidate, or [`reject_frame`](Self::reject_frame) to drop only its
    /// start byte and keep scanning inside it. A rejected candidate may
    /// overlap the real frame that follows a lost byte.
    pub fn peek_frame(&mut self) -> Option<&[u8]> {
        let frame_len = self.format.frame_len();

        loop {
            // Discard anything before the next start sentinel
            let skip = self
                .buffer
                .iter()
                .position(|&b| b == START_BYTE)
                .unwrap_or(self.buffer.len());
            if skip > 0 {
                log::trace!("skipping {} bytes before start sentinel", skip);
                self.buffer.advance(skip);
                self.discarded += skip as u64;
            }

            if self.buffer.len() < frame_len {
                return None;
            }

            if self.buffer[frame_len - 1] == END_BYTE {
                return Some(&self.buffer[..frame_len]);
            }

            // False start: resynchronise on the next start sentinel
            self.reject_frame();
        }
    }

    /// Take the candidate found by [`peek_frame`](Self::peek_frame).
    pub fn consume_frame(&mut self) -> Option<Bytes> {
        let frame_len = self.format.frame_len();
        if self.buffer.len() < frame_len {
            return None;
        }
        Some(self.buffer.split_to(frame_len).freeze())
    }

    /// Drop the start byte of the current candidate.
    pub fn reject_frame(&mut self) {
        if !self.buffer.is_empty() {
            self.buffer.advance(1);
            self.discarded += 1;
        }
    }

    /// Most bytes held between drains; older bytes are dropped on push.
    pub fn max_buffered(&self) -> usize {
        self.format.frame_len() * MAX_BUFFERED_FRAMES
    }

    /// Total bytes dropped while searching for frames.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        FrameReassembler::new(FrameFormat::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_format() -> FrameFormat {
        FrameFormat::new(8).unwrap()
    }

    fn sample_frame(format: &FrameFormat) -> RawFrame {
        let mut frame = RawFrame::empty(format);
        frame.link = 0x0102;
        frame.bitmask = 1 << 4;
        frame.payload[..4].copy_from_slice(&[25, 0, 12, 0]);
        frame.length = 4;
        frame.checksum = frame.compute_checksum();
        frame
    }

    #[test]
    fn test_encode_layout() {
        let format = small_format();
        let bytes = sample_frame(&format).to_bytes();

        assert_eq!(bytes.len(), format.frame_len());
        assert_eq!(bytes[0], START_BYTE);
        assert_eq!(&bytes[1..3], &[0x02, 0x01]); // to, from
        assert_eq!(&bytes[3..5], &[0x10, 0x00]);
        assert_eq!(&bytes[5..9], &[25, 0, 12, 0]);
        assert_eq!(bytes[format.length_offset()], 4);
        assert_eq!(bytes[format.end_offset()], END_BYTE);
    }

    #[test]
    fn test_decode_reinterprets() {
        let format = small_format();
        let frame = sample_frame(&format);
        let decoded = RawFrame::decode(&frame.to_bytes(), &format).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.from_id(), 1);
        assert_eq!(decoded.to_id(), 2);
        assert_eq!(decoded.payload_bytes(), &[25, 0, 12, 0]);
    }

    #[test]
    fn test_decode_short_buffer() {
        let format = small_format();
        let err = RawFrame::decode(&[START_BYTE; 5], &format).unwrap_err();
        assert_eq!(err, ProtocolError::underflow(17, 5));
    }

    #[test]
    fn test_reassembler_skips_garbage() {
        let format = small_format();
        let frame = sample_frame(&format).to_bytes();
        let mut reassembler = FrameReassembler::new(format);

        reassembler.push(&[0xFF, 0x00, 0x42]);
        reassembler.push(&frame);
        assert_eq!(reassembler.next_frame(), Some(frame));
        assert_eq!(reassembler.discarded(), 3);
        assert!(reassembler.next_frame().is_none());
    }

    #[test]
    fn test_reassembler_partial() {
        let format = small_format();
        let frame = sample_frame(&format).to_bytes();
        let mut reassembler = FrameReassembler::new(format);

        reassembler.push(&frame[..6]);
        assert!(reassembler.next_frame().is_none());
        assert_eq!(reassembler.buffered_len(), 6);

        reassembler.push(&frame[6..]);
        assert_eq!(reassembler.next_frame(), Some(frame));
    }

    #[test]
    fn test_reassembler_byte_at_a_time() {
        let format = small_format();
        let frame = sample_frame(&format).to_bytes();
        let mut reassembler = FrameReassembler::new(format);

        let mut emitted = None;
        for (i, &byte) in frame.iter().enumerate() {
            let out = reassembler.push_byte(byte);
            if i + 1 < frame.len() {
                assert!(out.is_none());
            } else {
                emitted = out;
            }
        }
        assert_eq!(emitted, Some(frame));
    }

    #[test]
    fn test_reassembler_false_start() {
        let format = small_format();
        let frame = sample_frame(&format).to_bytes();
        let mut reassembler = FrameReassembler::new(format);

        // A stray start sentinel, line noise, then a real frame
        reassembler.push(&[START_BYTE]);
        reassembler.push(&[0u8; 20]);
        reassembler.push(&frame);
        assert_eq!(reassembler.next_frame(), Some(frame));
        assert_eq!(reassembler.discarded(), 21);
    }

    #[test]
    fn test_reassembler_multiple() {
        let format = small_format();
        let frame = sample_frame(&format).to_bytes();
        let mut reassembler = FrameReassembler::new(format);

        reassembler.push(&frame);
        reassembler.push(&frame);
        assert!(reassembler.next_frame().is_some());
        assert!(reassembler.next_frame().is_some());
        assert!(reassembler.next_frame().is_none());
    }

    #[test]
    fn test_reassembler_bounded() {
        let format = small_format();
        let mut reassembler = FrameReassembler::new(format);

        reassembler.push(&vec![START_BYTE; format.frame_len() * (MAX_BUFFERED_FRAMES + 2)]);
        assert_eq!(
            reassembler.buffered_len(),
            format.frame_len() * MAX_BUFFERED_FRAMES
        );
        assert!(reassembler.next_frame().is_none());
    }

    #[test]
    fn test_reassembler_keeps_newest_frames_when_undrained() {
        let format = small_format();
        let frame = sample_frame(&format).to_bytes();
        let mut reassembler = FrameReassembler::new(format);

        let burst: Vec<u8> = frame.iter().copied().cycle().take(frame.len() * 6).collect();
        reassembler.push(&burst);
        assert_eq!(reassembler.buffered_len(), reassembler.max_buffered());
        assert_eq!(reassembler.discarded(), (frame.len() * 2) as u64);

        let frames: Vec<_> = std::iter::from_fn(|| reassembler.next_frame()).collect();
        assert_eq!(frames.len(), MAX_BUFFERED_FRAMES);
    }

    #[test]
    fn test_reassembler_large_input_in_pieces() {
        let format = small_format();
        let frame = sample_frame(&format).to_bytes();
        let mut reassembler = FrameReassembler::new(format);

        let stream: Vec<u8> = frame.iter().copied().cycle().take(frame.len() * 10).collect();
        let mut frames = Vec::new();
        for piece in stream.chunks(format.frame_len()) {
            reassembler.push(piece);
            frames.extend(std::iter::from_fn(|| reassembler.next_frame()));
        }

        assert_eq!(frames.len(), 10);
        assert!(frames.iter().all(|f| *f == frame));
        assert_eq!(reassembler.discarded(), 0);
    }

    #[test]
    fn test_rejected_candidate_rescans_inside() {
        let format = small_format();
        let mut frame = RawFrame::empty(&format);
        frame.link = 0x0102;
        frame.bitmask = 1 << 4;
        // current = 15 puts an end sentinel at stream offset 7
        frame.payload[..4].copy_from_slice(&[25, 0, END_BYTE, 0]);
        frame.length = 4;
        frame.checksum = frame.compute_checksum();
        let frame = frame.to_bytes();

        // Tail of a frame whose start was missed: a start byte, then padding
        let mut stream = vec![START_BYTE];
        stream.extend_from_slice(&[0u8; 8]);
        stream.extend_from_slice(&frame);

        let mut reassembler = FrameReassembler::new(format);
        reassembler.push(&stream);

        let candidate = reassembler.peek_frame().unwrap().to_vec();
        assert_eq!(candidate[..], stream[..format.frame_len()]);
        assert_ne!(candidate[..], frame[..]);

        reassembler.reject_frame();
        assert_eq!(reassembler.peek_frame(), Some(&frame[..]));
        assert_eq!(reassembler.consume_frame(), Some(frame));
        assert_eq!(reassembler.discarded(), 9);
        assert_eq!(reassembler.buffered_len(), 0);
    }
}
