/*!
    FASTECH commands: frame type codes and payload encodings

    payload integers are all little endian, packed with [packbytes].
*/

use heapless::Vec;
use packbytes::{FromBytes, ToBytes, ByteArray};
use crate::FrameError;


/// maximum size of a frame payload, before stuffing
pub const MAX_PAYLOAD: usize = 64;
/// bounded buffer for frame payloads
pub type Payload = Vec<u8, MAX_PAYLOAD>;


/**
    frame type code of each command

    these codes were established empirically against one drive, other firmware revisions use different values
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CommandTable {
    pub alarm_reset: u8,
    pub read_position: u8,
    pub read_status: u8,
    pub clear_position: u8,
    pub homing: u8,
    pub set_position: u8,
    pub stop: u8,
    pub jog: u8,
    pub move_absolute: u8,
    pub move_relative: u8,
    pub read_parameter: u8,
    pub set_speed: u8,
    pub write_parameter: u8,
    pub servo_on: u8,
    pub servo_off: u8,
    pub teaching_mode: u8,
}
impl CommandTable {
    /// codes understood by the Ezi-STEP Plus-R drive on the bench
    pub const EZI_STEP: Self = Self {
        alarm_reset: 0x04,
        read_position: 0x0C,
        read_status: 0x0D,
        clear_position: 0x20,
        homing: 0x23,
        set_position: 0x24,
        stop: 0x31,
        jog: 0x37,
        move_absolute: 0x38,
        move_relative: 0x39,
        read_parameter: 0x52,
        set_speed: 0x57,
        write_parameter: 0x58,
        servo_on: 0x83,
        servo_off: 0x84,
        teaching_mode: 0xA0,
    };
}
impl Default for CommandTable {
    fn default() -> Self {Self::EZI_STEP}
}


/// rotation direction of a jog
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Reverse = 0,
    Forward = 1,
}
impl Direction {
    /// direction to follow to travel the given signed distance
    pub fn of(delta: i64) -> Self {
        if delta < 0 {Self::Reverse} else {Self::Forward}
    }
    /// +1 or -1
    pub fn sign(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }
}
impl From<Direction> for u8 {
    fn from(direction: Direction) -> u8 {direction as u8}
}
impl TryFrom<u8> for Direction {
    type Error = FrameError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Reverse),
            1 => Ok(Self::Forward),
            _ => Err(FrameError::FrameFormat("invalid direction byte")),
        }
    }
}


/// payload of a jog command
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq)]
pub struct Velocity {
    /// pulses per second
    pub speed: u32,
    /// 1 forward, 0 reverse
    pub direction: u8,
}
/// payload of positioning commands
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq)]
pub struct Positioning {
    /// target position or relative distance in pulses
    pub position: i32,
    /// pulses per second
    pub speed: u32,
}
/// payload of the speed/acceleration setting
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq)]
pub struct Ramp {
    pub speed: u32,
    pub acceleration: u32,
}
/// payload of a parameter write
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq)]
pub struct Parameter {
    pub address: u16,
    pub value: u32,
}

/// drive parameter telling the homing sequence has completed
pub const HOMING_DONE: u16 = 0x20;


/// every command the motion controller sends
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MotionCommand {
    ServoOn,
    ServoOff,
    Stop,
    Jog {speed: u32, direction: Direction},
    MoveAbsolute {target: i32, speed: u32},
    MoveRelative {delta: i32, speed: u32},
    Home {speed: u32},
    ReadPosition,
    ReadStatus,
    AlarmReset,
    SetSpeed {speed: u32, acceleration: u32},
    TeachingMode(bool),
    SetPosition(i32),
    ClearPosition,
    WriteParameter {address: u16, value: u32},
    ReadParameter {address: u16},
}
impl MotionCommand {
    /// frame type code of this command in the given table
    pub fn code(&self, table: &CommandTable) -> u8 {
        match self {
            Self::ServoOn => table.servo_on,
            Self::ServoOff => table.servo_off,
            Self::Stop => table.stop,
            Self::Jog{..} => table.jog,
            Self::MoveAbsolute{..} => table.move_absolute,
            Self::MoveRelative{..} => table.move_relative,
            Self::Home{..} => table.homing,
            Self::ReadPosition => table.read_position,
            Self::ReadStatus => table.read_status,
            Self::AlarmReset => table.alarm_reset,
            Self::SetSpeed{..} => table.set_speed,
            Self::TeachingMode(_) => table.teaching_mode,
            Self::SetPosition(_) => table.set_position,
            Self::ClearPosition => table.clear_position,
            Self::WriteParameter{..} => table.write_parameter,
            Self::ReadParameter{..} => table.read_parameter,
        }
    }
    /// frame payload of this command
    pub fn payload(&self) -> Result<Payload, FrameError> {
        match *self {
            Self::ServoOn
            | Self::ServoOff
            | Self::Stop
            | Self::ReadPosition
            | Self::ReadStatus
            | Self::AlarmReset
            | Self::ClearPosition
                => Ok(Payload::new()),
            Self::Jog{speed, direction} => encode(Velocity {speed, direction: direction.into()}),
            Self::MoveAbsolute{target, speed} => encode(Positioning {position: target, speed}),
            Self::MoveRelative{delta, speed} => encode(Positioning {position: delta, speed}),
            Self::Home{speed} => encode(speed),
            Self::SetSpeed{speed, acceleration} => encode(Ramp {speed, acceleration}),
            Self::TeachingMode(enable) => encode(u8::from(enable)),
            Self::SetPosition(position) => encode(position),
            Self::WriteParameter{address, value} => encode(Parameter {address, value}),
            Self::ReadParameter{address} => encode(address),
        }
    }
}

/// little endian payload of the given value
pub fn encode<T: ToBytes>(value: T) -> Result<Payload, FrameError> {
    Payload::from_slice(value.to_le_bytes().as_ref()) .map_err(|_| FrameError::TooLong)
}
/// decode a little endian value from the start of `data`, extra bytes are ignored
pub fn decode<T: FromBytes>(data: &[u8]) -> Result<T, FrameError> {
    let mut bytes = T::Bytes::zeroed();
    let src = data.get(.. T::Bytes::SIZE)
        .ok_or(FrameError::FrameFormat("response data too short"))?;
    bytes.as_mut().copy_from_slice(src);
    Ok(T::from_le_bytes(bytes))
}
