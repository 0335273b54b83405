//! Fixed-layout payload structs, one per signature.
//!
//! Every payload encodes to exactly the number of bytes the registry declares
//! for its signature: packed, little-endian, no padding and no length prefix.

use bytes::{Buf, BufMut};

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::registry;
use crate::types::Signature;

/// A payload that occupies one signature slot.
pub trait Segment: Sized {
    /// Slot this payload is carried in.
    const SIGNATURE: Signature;

    /// Write exactly `registry::size_of(Self::SIGNATURE)` bytes.
    fn encode(&self, buf: &mut impl BufMut);

    /// Read the payload back. `buf` must hold at least the registry size.
    fn decode(buf: &mut impl Buf) -> Self;

    /// Encode into a freshly allocated buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(registry::size_of(Self::SIGNATURE));
        self.encode(&mut buf);
        buf
    }

    /// Decode from a slice, checking its length first.
    fn from_slice(data: &[u8]) -> ProtocolResult<Self> {
        let size = registry::size_of(Self::SIGNATURE);
        if data.len() < size {
            return Err(ProtocolError::underflow(size, data.len()));
        }
        let mut buf = &data[..size];
        Ok(Self::decode(&mut buf))
    }
}

/// Pitot tube differential pressure, fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pitot {
    pub differential_pressure: i16,
}

impl Segment for Pitot {
    const SIGNATURE: Signature = Signature::Pitot;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i16_le(self.differential_pressure);
    }

    fn decode(buf: &mut impl Buf) -> Self {
        Pitot {
            differential_pressure: buf.get_i16_le(),
        }
    }
}

/// Raw nine-axis IMU sample with attitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Imu {
    pub ax: i16,
    pub ay: i16,
    pub az: i16,
    pub gx: i16,
    pub gy: i16,
    pub gz: i16,
    pub mx: i16,
    pub my: i16,
    pub mz: i16,
    pub yaw: i16,
    pub pitch: i16,
    pub roll: i16,
}

impl Imu {
    fn fields(&self) -> [i16; 12] {
        [
            self.ax, self.ay, self.az, self.gx, self.gy, self.gz, self.mx, self.my, self.mz,
            self.yaw, self.pitch, self.roll,
        ]
    }
}

impl Segment for Imu {
    const SIGNATURE: Signature = Signature::Imu;

    fn encode(&self, buf: &mut impl BufMut) {
        for value in self.fields() {
            buf.put_i16_le(value);
        }
    }

    fn decode(buf: &mut impl Buf) -> Self {
        Imu {
            ax: buf.get_i16_le(),
            ay: buf.get_i16_le(),
            az: buf.get_i16_le(),
            gx: buf.get_i16_le(),
            gy: buf.get_i16_le(),
            gz: buf.get_i16_le(),
            mx: buf.get_i16_le(),
            my: buf.get_i16_le(),
            mz: buf.get_i16_le(),
            yaw: buf.get_i16_le(),
            pitch: buf.get_i16_le(),
            roll: buf.get_i16_le(),
        }
    }
}

/// GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gps {
    pub lat: i32,
    pub lon: i32,
    pub speed: u16,
    pub satellites: u8,
    pub altitude: u16,
    /// Packed `XX HH MM SS`.
    pub time: u32,
    /// Packed `XX YY MM DD`.
    pub date: u32,
}

impl Segment for Gps {
    const SIGNATURE: Signature = Signature::Gps;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.lat);
        buf.put_i32_le(self.lon);
        buf.put_u16_le(self.speed);
        buf.put_u8(self.satellites);
        buf.put_u16_le(self.altitude);
        buf.put_u32_le(self.time);
        buf.put_u32_le(self.date);
    }

    fn decode(buf: &mut impl Buf) -> Self {
        Gps {
            lat: buf.get_i32_le(),
            lon: buf.get_i32_le(),
            speed: buf.get_u16_le(),
            satellites: buf.get_u8(),
            altitude: buf.get_u16_le(),
            time: buf.get_u32_le(),
            date: buf.get_u32_le(),
        }
    }
}

/// Environmental sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Enviro {
    pub pressure: u16,
    pub humidity: u16,
    pub temperature: u16,
}

impl Segment for Enviro {
    const SIGNATURE: Signature = Signature::Enviro;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.pressure);
        buf.put_u16_le(self.humidity);
        buf.put_u16_le(self.temperature);
    }

    fn decode(buf: &mut impl Buf) -> Self {
        Enviro {
            pressure: buf.get_u16_le(),
            humidity: buf.get_u16_le(),
            temperature: buf.get_u16_le(),
        }
    }
}

/// Battery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Battery {
    pub voltage: u16,
    pub current: u16,
}

impl Segment for Battery {
    const SIGNATURE: Signature = Signature::Battery;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.voltage);
        buf.put_u16_le(self.current);
    }

    fn decode(buf: &mut impl Buf) -> Self {
        Battery {
            voltage: buf.get_u16_le(),
            current: buf.get_u16_le(),
        }
    }
}

/// System configuration. Reserved; encodes to zero bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystemConfig {}

impl Segment for SystemConfig {
    const SIGNATURE: Signature = Signature::Config;

    fn encode(&self, _buf: &mut impl BufMut) {}

    fn decode(_buf: &mut impl Buf) -> Self {
        SystemConfig {}
    }
}

/// Link and system status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status {
    /// Signal strength.
    pub rssi: i16,
    /// State bit fields.
    pub state: u32,
}

impl Segment for Status {
    const SIGNATURE: Signature = Signature::Status;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i16_le(self.rssi);
        buf.put_u32_le(self.state);
    }

    fn decode(buf: &mut impl Buf) -> Self {
        Status {
            rssi: buf.get_i16_le(),
            state: buf.get_u32_le(),
        }
    }
}

/// Pulse limits of one servo channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServoRange {
    pub min: u16,
    pub max: u16,
}

/// Servo channel limits. Each channel packs max in the high 16 bits, min in the low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Actuators {
    pub servos: [u32; SERVO_CHANNELS],
}

impl Actuators {
    /// Limits of `channel`, or `None` past the last channel.
    pub fn channel(&self, channel: usize) -> Option<ServoRange> {
        self.servos.get(channel).map(|&packed| ServoRange {
            min: (packed & 0xFFFF) as u16,
            max: (packed >> 16) as u16,
        })
    }

    /// Set the limits of `channel`. Out-of-range channels are ignored.
    pub fn set_channel(&mut self, channel: usize, range: ServoRange) -> &mut Self {
        if let Some(slot) = self.servos.get_mut(channel) {
            *slot = ((range.max as u32) << 16) | range.min as u32;
        }
        self
    }
}

impl Segment for Actuators {
    const SIGNATURE: Signature = Signature::Actuators;

    fn encode(&self, buf: &mut impl BufMut) {
        for packed in self.servos {
            buf.put_u32_le(packed);
        }
    }

    fn decode(buf: &mut impl Buf) -> Self {
        let mut servos = [0u32; SERVO_CHANNELS];
        for slot in servos.iter_mut() {
            *slot = buf.get_u32_le();
        }
        Actuators { servos }
    }
}

/// Flight quantities derived from raw sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AirData {
    pub ias: u32,
    pub eas: u32,
    pub tas: u32,
    pub agl: u32,
    pub pressure_alt: u32,
    pub msl: u32,
    pub density_alt: u32,
    pub approx_temp: u32,
    pub density: u32,
}

impl Segment for AirData {
    const SIGNATURE: Signature = Signature::AirData;

    fn encode(&self, buf: &mut impl BufMut) {
        for value in [
            self.ias,
            self.eas,
            self.tas,
            self.agl,
            self.pressure_alt,
            self.msl,
            self.density_alt,
            self.approx_temp,
            self.density,
        ] {
            buf.put_u32_le(value);
        }
    }

    fn decode(buf: &mut impl Buf) -> Self {
        AirData {
            ias: buf.get_u32_le(),
            eas: buf.get_u32_le(),
            tas: buf.get_u32_le(),
            agl: buf.get_u32_le(),
            pressure_alt: buf.get_u32_le(),
            msl: buf.get_u32_le(),
            density_alt: buf.get_u32_le(),
            approx_temp: buf.get_u32_le(),
            density: buf.get_u32_le(),
        }
    }
}

/// Commands sent from the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Commands {
    /// Payload release flag.
    pub drop: u8,
    /// One bit per servo.
    pub servos: u16,
    pub pitch: u8,
}

impl Segment for Commands {
    const SIGNATURE: Signature = Signature::Commands;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.drop);
        buf.put_u16_le(self.servos);
        buf.put_u8(self.pitch);
    }

    fn decode(buf: &mut impl Buf) -> Self {
        Commands {
            drop: buf.get_u8(),
            servos: buf.get_u16_le(),
            pitch: buf.get_u8(),
        }
    }
}

/// Drop algorithm output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DropAlgo {
    pub heading: i16,
    pub distance: u16,
}

impl Segment for DropAlgo {
    const SIGNATURE: Signature = Signature::Drop;

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i16_le(self.heading);
        buf.put_u16_le(self.distance);
    }

    fn decode(buf: &mut impl Buf) -> Self {
        DropAlgo {
            heading: buf.get_i16_le(),
            distance: buf.get_u16_le(),
        }
    }
}

/// Any payload, tagged by its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Payload {
    Pitot(Pitot),
    Imu(Imu),
    Gps(Gps),
    Enviro(Enviro),
    Battery(Battery),
    Config(SystemConfig),
    Status(Status),
    Actuators(Actuators),
    AirData(AirData),
    Commands(Commands),
    Drop(DropAlgo),
}

impl Payload {
    /// Slot this payload belongs in.
    pub fn signature(&self) -> Signature {
        match self {
            Payload::Pitot(_) => Pitot::SIGNATURE,
            Payload::Imu(_) => Imu::SIGNATURE,
            Payload::Gps(_) => Gps::SIGNATURE,
            Payload::Enviro(_) => Enviro::SIGNATURE,
            Payload::Battery(_) => Battery::SIGNATURE,
            Payload::Config(_) => SystemConfig::SIGNATURE,
            Payload::Status(_) => Status::SIGNATURE,
            Payload::Actuators(_) => Actuators::SIGNATURE,
            Payload::AirData(_) => AirData::SIGNATURE,
            Payload::Commands(_) => Commands::SIGNATURE,
            Payload::Drop(_) => DropAlgo::SIGNATURE,
        }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        registry::size_of(self.signature())
    }

    /// Write the segment bytes.
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Payload::Pitot(p) => p.encode(buf),
            Payload::Imu(p) => p.encode(buf),
            Payload::Gps(p) => p.encode(buf),
            Payload::Enviro(p) => p.encode(buf),
            Payload::Battery(p) => p.encode(buf),
            Payload::Config(p) => p.encode(buf),
            Payload::Status(p) => p.encode(buf),
            Payload::Actuators(p) => p.encode(buf),
            Payload::AirData(p) => p.encode(buf),
            Payload::Commands(p) => p.encode(buf),
            Payload::Drop(p) => p.encode(buf),
        }
    }

    /// Decode the segment for `signature` from `data`.
    pub fn decode(signature: Signature, data: &[u8]) -> ProtocolResult<Self> {
        Ok(match signature {
            Signature::Pitot => Payload::Pitot(Pitot::from_slice(data)?),
            Signature::Imu => Payload::Imu(Imu::from_slice(data)?),
            Signature::Gps => Payload::Gps(Gps::from_slice(data)?),
            Signature::Enviro => Payload::Enviro(Enviro::from_slice(data)?),
            Signature::Battery => Payload::Battery(Battery::from_slice(data)?),
            Signature::Config => Payload::Config(SystemConfig::from_slice(data)?),
            Signature::Status => Payload::Status(Status::from_slice(data)?),
            Signature::Actuators => Payload::Actuators(Actuators::from_slice(data)?),
            Signature::AirData => Payload::AirData(AirData::from_slice(data)?),
            Signature::Commands => Payload::Commands(Commands::from_slice(data)?),
            Signature::Drop => Payload::Drop(DropAlgo::from_slice(data)?),
            Signature::Reserved => return Err(ProtocolError::Schema(signature.ordinal())),
        })
    }
}

macro_rules! impl_payload_from {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Payload::$variant(value)
                }
            }
        )*
    };
}

impl_payload_from! {
    Pitot => Pitot,
    Imu => Imu,
    Gps => Gps,
    Enviro => Enviro,
    Battery => Battery,
    SystemConfig => Config,
    Status => Status,
    Actuators => Actuators,
    AirData => AirData,
    Commands => Commands,
    DropAlgo => Drop,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payloads() -> Vec<Payload> {
        let mut actuators = Actuators::default();
        actuators.set_channel(3, ServoRange { min: 1000, max: 2000 });
        vec![
            Pitot { differential_pressure: -42 }.into(),
            Imu { ax: 5, ay: 10, az: 15, roll: -3, ..Default::default() }.into(),
            Gps {
                lat: 47_606_200,
                lon: -122_332_100,
                speed: 31,
                satellites: 9,
                altitude: 120,
                time: 0x0012_3456,
                date: 0x0019_0807,
            }
            .into(),
            Enviro { pressure: 20, humidity: 10, temperature: 25 }.into(),
            Battery { voltage: 25, current: 12 }.into(),
            SystemConfig {}.into(),
            Status { rssi: -70, state: 0xDEAD_BEEF }.into(),
            actuators.into(),
            AirData { ias: 1, eas: 2, tas: 3, density: 9, ..Default::default() }.into(),
            Commands { drop: 99, servos: 8, pitch: 1 }.into(),
            DropAlgo { heading: -90, distance: 400 }.into(),
        ]
    }

    #[test]
    fn test_encoded_sizes_match_registry() {
        for payload in sample_payloads() {
            let mut buf = Vec::new();
            payload.encode(&mut buf);
            assert_eq!(
                buf.len(),
                registry::size_of(payload.signature()),
                "size mismatch for {}",
                payload.signature()
            );
        }
    }

    #[test]
    fn test_decode_matches_original() {
        for payload in sample_payloads() {
            let mut buf = Vec::new();
            payload.encode(&mut buf);
            let decoded = Payload::decode(payload.signature(), &buf).unwrap();
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn test_battery_layout_is_little_endian() {
        let bytes = Battery { voltage: 25, current: 0x0102 }.to_bytes();
        assert_eq!(bytes, vec![25, 0, 0x02, 0x01]);
    }

    #[test]
    fn test_from_slice_short_input() {
        let err = Gps::from_slice(&[0u8; 10]).unwrap_err();
        assert_eq!(err, ProtocolError::underflow(GPS_SIZE, 10));
    }

    #[test]
    fn test_reserved_has_no_payload() {
        assert_eq!(
            Payload::decode(Signature::Reserved, &[]),
            Err(ProtocolError::Schema(11))
        );
    }

    #[test]
    fn test_servo_channel_packing() {
        let mut actuators = Actuators::default();
        actuators.set_channel(0, ServoRange { min: 1100, max: 1900 });
        assert_eq!(actuators.servos[0], (1900 << 16) | 1100);
        assert_eq!(
            actuators.channel(0),
            Some(ServoRange { min: 1100, max: 1900 })
        );
        assert_eq!(actuators.channel(SERVO_CHANNELS), None);
    }
}
