//! Protocol constants
//!
//! Sentinels, frame offsets and per-segment encoded sizes for the telemetry
//! wire format.

// ============================================================================
// Sentinels
// ============================================================================

/// First byte of every frame.
pub const START_BYTE: u8 = 0x0A;
/// Last byte of every frame.
pub const END_BYTE: u8 = 0x0F;

// ============================================================================
// Frame Layout
// ============================================================================

/// Number of signature slots (bits 0..11 of the bitmask).
pub const SIGNATURE_COUNT: usize = 12;

/// Bitmask bits that name a signature. Bits 12..15 are unused.
pub const SIGNATURE_MASK: u16 = (1 << SIGNATURE_COUNT) - 1;

/// Payload capacity used when no format is configured.
pub const DEFAULT_PAYLOAD_CAPACITY: usize = 200;

/// Largest payload capacity the one-byte length field can describe.
pub const MAX_PAYLOAD_CAPACITY: usize = u8::MAX as usize;

/// Offset of the little-endian link field.
pub const LINK_OFFSET: usize = 1;
/// Offset of the little-endian bitmask field.
pub const BITMASK_OFFSET: usize = 3;
/// Offset of the payload field.
pub const PAYLOAD_OFFSET: usize = 5;

/// Bytes in a frame besides the payload field:
/// start(1) + link(2) + bitmask(2) + length(1) + checksum(2) + end(1).
pub const FRAME_OVERHEAD: usize = 9;

/// How many frames' worth of bytes a reassembler holds before dropping the oldest.
pub const MAX_BUFFERED_FRAMES: usize = 4;

// ============================================================================
// Segment Sizes
// ============================================================================

/// Differential pressure (i16).
pub const PITOT_SIZE: usize = 2;
/// Nine-axis IMU plus attitude, twelve i16 values.
pub const IMU_SIZE: usize = 24;
/// lat(4) + lon(4) + speed(2) + satellites(1) + altitude(2) + time(4) + date(4).
pub const GPS_SIZE: usize = 21;
/// Pressure, humidity, temperature (u16 each).
pub const ENVIRO_SIZE: usize = 6;
/// Voltage, current (u16 each).
pub const BATTERY_SIZE: usize = 4;
/// Reserved, carries no bytes.
pub const CONFIG_SIZE: usize = 0;
/// rssi(2) + state(4).
pub const STATUS_SIZE: usize = 6;
/// Sixteen packed min/max servo channels (u32 each).
pub const ACTUATORS_SIZE: usize = 64;
/// Nine derived flight quantities (u32 each).
pub const AIRDATA_SIZE: usize = 36;
/// drop(1) + servos(2) + pitch(1).
pub const COMMANDS_SIZE: usize = 4;
/// heading(2) + distance(2).
pub const DROP_SIZE: usize = 4;
/// Reserved slot 11.
pub const RESERVED_SIZE: usize = 0;

/// Number of servo channels carried by the actuator segment.
pub const SERVO_CHANNELS: usize = 16;
