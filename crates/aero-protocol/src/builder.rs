//! Message builder.
//!
//! Holds at most one payload per signature and serializes the occupied slots
//! into a [`RawFrame`]. Slots are owned copies, so the caller's structs do not
//! need to outlive the builder. Slot contents survive `build` unless the
//! caller asks for a clear, so the last known value of each payload keeps
//! being sent.

use crate::constants::SIGNATURE_COUNT;
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::RawFrame;
use crate::payloads::*;
use crate::registry;
use crate::types::{pack_link, Endpoint, FrameFormat, Signature};

/// Builds frames from typed payloads.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    format: FrameFormat,
    slots: [Option<Payload>; SIGNATURE_COUNT],
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBuilder {
    /// Create a builder for the default frame format.
    pub fn new() -> Self {
        Self::with_format(FrameFormat::default())
    }

    /// Create a builder for `format`.
    pub fn with_format(format: FrameFormat) -> Self {
        MessageBuilder {
            format,
            slots: [None; SIGNATURE_COUNT],
        }
    }

    /// Frame format this builder emits.
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Set the pitot tube reading.
    pub fn add_pitot(&mut self, data: Pitot) -> &mut Self {
        self.set(Payload::Pitot(data))
    }

    /// Set the IMU sample.
    pub fn add_imu(&mut self, data: Imu) -> &mut Self {
        self.set(Payload::Imu(data))
    }

    /// Set the GPS fix.
    pub fn add_gps(&mut self, data: Gps) -> &mut Self {
        self.set(Payload::Gps(data))
    }

    /// Set the environmental sensor reading.
    pub fn add_enviro(&mut self, data: Enviro) -> &mut Self {
        self.set(Payload::Enviro(data))
    }

    /// Set battery voltage and current.
    pub fn add_battery(&mut self, data: Battery) -> &mut Self {
        self.set(Payload::Battery(data))
    }

    /// Set the (empty) system config segment.
    pub fn add_config(&mut self, data: SystemConfig) -> &mut Self {
        self.set(Payload::Config(data))
    }

    /// Set link and system status.
    pub fn add_status(&mut self, data: Status) -> &mut Self {
        self.set(Payload::Status(data))
    }

    /// Set servo channel limits.
    pub fn add_actuators(&mut self, data: Actuators) -> &mut Self {
        self.set(Payload::Actuators(data))
    }

    /// Set derived air data.
    pub fn add_airdata(&mut self, data: AirData) -> &mut Self {
        self.set(Payload::AirData(data))
    }

    /// Set ground commands.
    pub fn add_cmds(&mut self, data: Commands) -> &mut Self {
        self.set(Payload::Commands(data))
    }

    /// Set the drop algorithm output.
    pub fn add_drop(&mut self, data: DropAlgo) -> &mut Self {
        self.set(Payload::Drop(data))
    }

    /// Add an already tagged payload. The slot is taken from the variant.
    pub fn add_payload(&mut self, payload: Payload) -> &mut Self {
        self.set(payload)
    }

    /// Overwrite the slot for the payload's signature.
    pub(crate) fn set(&mut self, payload: Payload) -> &mut Self {
        let slot = payload.signature().ordinal() as usize;
        self.slots[slot] = Some(payload);
        self
    }

    /// Whether a payload is pending for `signature`.
    pub fn is_set(&self, signature: Signature) -> bool {
        self.slots[signature.ordinal() as usize].is_some()
    }

    /// Pending payload for `signature`.
    pub fn get(&self, signature: Signature) -> Option<&Payload> {
        self.slots[signature.ordinal() as usize].as_ref()
    }

    /// Signatures with a pending payload, in serialization order.
    pub fn pending(&self) -> impl Iterator<Item = Signature> + '_ {
        self.slots
            .iter()
            .flatten()
            .map(|payload| payload.signature())
    }

    /// Payload bytes the next build would use.
    pub fn pending_len(&self) -> usize {
        self.pending().map(registry::size_of).sum()
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        self.slots = [None; SIGNATURE_COUNT];
    }

    /// Serialize the pending payloads into a frame addressed `from` → `to`.
    ///
    /// Segments are packed in ascending signature order with no gaps. If
    /// `clear` is set the slots are emptied afterwards. Fails with
    /// [`ProtocolError::CapacityExceeded`] before writing anything when the
    /// segments do not fit; the slots are left as they were.
    pub fn build(&mut self, from: Endpoint, to: Endpoint, clear: bool) -> ProtocolResult<RawFrame> {
        let capacity = self.format.payload_capacity();
        let required = self.pending_len();
        if required > capacity {
            return Err(ProtocolError::CapacityExceeded { required, capacity });
        }

        let mut frame = RawFrame::empty(&self.format);
        frame.link = pack_link(from, to);

        let mut offset = 0;
        for payload in self.slots.iter().flatten() {
            let signature = payload.signature();
            let size = registry::size_of(signature);

            frame.bitmask |= signature.bit();
            let mut segment = &mut frame.payload[offset..offset + size];
            payload.encode(&mut segment);
            debug_assert!(segment.is_empty(), "{} wrote a short segment", signature);

            log::trace!("packed {} ({} bytes) at offset {}", signature, size, offset);
            offset += size;
        }

        // Capacity is at most 255, checked above
        frame.length = offset as u8;
        frame.checksum = frame.compute_checksum();

        if clear {
            self.clear();
        }

        Ok(frame)
    }
}
