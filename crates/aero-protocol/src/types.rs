//! Common types used in the protocol.

use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};

/// Payload kind carried in a frame.
///
/// The ordinal is both the bitmask bit and the serialization order key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum Signature {
    /// Pitot tube differential pressure.
    Pitot = 0,
    /// Accelerometer, gyro, magnetometer and attitude.
    Imu = 1,
    /// GPS fix.
    Gps = 2,
    /// Environmental sensor.
    Enviro = 3,
    /// Battery voltage and current.
    Battery = 4,
    /// System configuration (reserved, empty).
    Config = 5,
    /// Link and system status.
    Status = 6,
    /// Servo channel limits.
    Actuators = 7,
    /// Derived flight quantities.
    AirData = 8,
    /// Ground commands.
    Commands = 9,
    /// Drop algorithm output.
    Drop = 10,
    /// Unassigned slot.
    Reserved = 11,
}

impl Signature {
    /// All signatures in ordinal order.
    pub const ALL: [Signature; SIGNATURE_COUNT] = [
        Signature::Pitot,
        Signature::Imu,
        Signature::Gps,
        Signature::Enviro,
        Signature::Battery,
        Signature::Config,
        Signature::Status,
        Signature::Actuators,
        Signature::AirData,
        Signature::Commands,
        Signature::Drop,
        Signature::Reserved,
    ];

    /// Ordinal of this signature.
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Bitmask bit for this signature.
    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Look up a signature by ordinal.
    pub fn from_ordinal(ordinal: u8) -> ProtocolResult<Self> {
        Signature::ALL
            .get(ordinal as usize)
            .copied()
            .ok_or(ProtocolError::Schema(ordinal))
    }

    /// Lowercase name used in logs and metric labels.
    pub const fn name(self) -> &'static str {
        match self {
            Signature::Pitot => "pitot",
            Signature::Imu => "imu",
            Signature::Gps => "gps",
            Signature::Enviro => "enviro",
            Signature::Battery => "battery",
            Signature::Config => "config",
            Signature::Status => "status",
            Signature::Actuators => "actuators",
            Signature::AirData => "air_data",
            Signature::Commands => "commands",
            Signature::Drop => "drop",
            Signature::Reserved => "reserved",
        }
    }

    /// Signatures whose bits are set in `bitmask`, in ascending order.
    pub fn iter_bitmask(bitmask: u16) -> impl Iterator<Item = Signature> {
        Signature::ALL
            .into_iter()
            .filter(move |sig| bitmask & sig.bit() != 0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Signature {
    type Error = ProtocolError;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        Signature::from_ordinal(ordinal)
    }
}

/// A named party on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum Endpoint {
    /// Ground station.
    #[default]
    Ground = 0,
    /// Aircraft.
    Plane = 1,
    /// First ground relay.
    RelayG1 = 2,
    /// Second ground relay.
    RelayG2 = 3,
}

impl Endpoint {
    /// All endpoints in id order.
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Ground,
        Endpoint::Plane,
        Endpoint::RelayG1,
        Endpoint::RelayG2,
    ];

    /// Wire id of this endpoint.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Lowercase name used in logs and metric labels.
    pub const fn name(self) -> &'static str {
        match self {
            Endpoint::Ground => "ground",
            Endpoint::Plane => "plane",
            Endpoint::RelayG1 => "relay_g1",
            Endpoint::RelayG2 => "relay_g2",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Endpoint {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Endpoint::ALL
            .get(id as usize)
            .copied()
            .ok_or(ProtocolError::UnknownEndpoint(id))
    }
}

impl From<Endpoint> for u8 {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.id()
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "ground" | "gnd" => Ok(Endpoint::Ground),
            "plane" => Ok(Endpoint::Plane),
            "relay_g1" | "g1" => Ok(Endpoint::RelayG1),
            "relay_g2" | "g2" => Ok(Endpoint::RelayG2),
            other => Err(format!("unknown endpoint '{}'", other)),
        }
    }
}

/// Pack sender and recipient into the link field. Sender occupies the high byte.
pub const fn pack_link(from: Endpoint, to: Endpoint) -> u16 {
    ((from as u16) << 8) | to as u16
}

/// Split a link field into raw (from, to) ids.
pub const fn unpack_link(link: u16) -> (u8, u8) {
    ((link >> 8) as u8, (link & 0xFF) as u8)
}

/// Frame geometry shared by both ends of a link.
///
/// The payload field always occupies `payload_capacity` bytes on the wire, so
/// the receiver must be configured with the same capacity as the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameFormat {
    payload_capacity: usize,
}

impl FrameFormat {
    /// Create a format with the given payload capacity (1..=255).
    pub fn new(payload_capacity: usize) -> ProtocolResult<Self> {
        if payload_capacity == 0 || payload_capacity > MAX_PAYLOAD_CAPACITY {
            return Err(ProtocolError::InvalidFormat(format!(
                "payload capacity must be 1..={}, got {}",
                MAX_PAYLOAD_CAPACITY, payload_capacity
            )));
        }
        Ok(FrameFormat { payload_capacity })
    }

    /// Payload field size in bytes.
    pub const fn payload_capacity(&self) -> usize {
        self.payload_capacity
    }

    /// Total encoded frame size.
    pub const fn frame_len(&self) -> usize {
        self.payload_capacity + FRAME_OVERHEAD
    }

    /// Offset of the length byte.
    pub const fn length_offset(&self) -> usize {
        PAYLOAD_OFFSET + self.payload_capacity
    }

    /// Offset of the little-endian checksum.
    pub const fn checksum_offset(&self) -> usize {
        self.length_offset() + 1
    }

    /// Offset of the end sentinel.
    pub const fn end_offset(&self) -> usize {
        self.checksum_offset() + 2
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        FrameFormat {
            payload_capacity: DEFAULT_PAYLOAD_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_ordinals() {
        for (i, sig) in Signature::ALL.iter().enumerate() {
            assert_eq!(sig.ordinal() as usize, i);
            assert_eq!(Signature::from_ordinal(i as u8).unwrap(), *sig);
        }
        assert_eq!(Signature::Battery.bit(), 1 << 4);
        assert_eq!(
            Signature::from_ordinal(12),
            Err(ProtocolError::Schema(12))
        );
    }

    #[test]
    fn test_iter_bitmask() {
        let mask = Signature::Imu.bit() | Signature::Commands.bit() | 0x8000;
        let sigs: Vec<_> = Signature::iter_bitmask(mask).collect();
        assert_eq!(sigs, vec![Signature::Imu, Signature::Commands]);
    }

    #[test]
    fn test_link_packing() {
        let link = pack_link(Endpoint::Ground, Endpoint::RelayG1);
        assert_eq!(link, 2);
        assert_eq!(unpack_link(link), (0, 2));

        let link = pack_link(Endpoint::Plane, Endpoint::RelayG2);
        assert_eq!(link, 0x0103);
    }

    #[test]
    fn test_endpoint_ids() {
        assert_eq!(Endpoint::try_from(1).unwrap(), Endpoint::Plane);
        assert_eq!(Endpoint::try_from(9), Err(ProtocolError::UnknownEndpoint(9)));
        assert_eq!("relay-g1".parse::<Endpoint>().unwrap(), Endpoint::RelayG1);
        assert_eq!("GND".parse::<Endpoint>().unwrap(), Endpoint::Ground);
        assert!("tower".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_frame_format() {
        let format = FrameFormat::default();
        assert_eq!(format.frame_len(), 209);
        assert_eq!(format.length_offset(), 205);
        assert_eq!(format.checksum_offset(), 206);
        assert_eq!(format.end_offset(), 208);

        assert!(FrameFormat::new(0).is_err());
        assert!(FrameFormat::new(256).is_err());
        assert_eq!(FrameFormat::new(255).unwrap().frame_len(), 264);
    }
}
