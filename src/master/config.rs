use std::{
    string::String,
    time::Duration,
    };
use serde::{Serialize, Deserialize};

use crate::{
    fastech::FrameProfile,
    modbus::READ_INPUT_REGISTERS,
    };


/// parity bit of a serial link
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}
/// number of stop bits of a serial link
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// settings of one serial link
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// serial device, like `/dev/ttyUSB0` or `COM3`
    pub path: String,
    pub baud_rate: u32,
    /// data bits per character, 5 to 8
    pub char_size: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// how long to wait for an answer
    pub timeout: Duration,
}
impl PortConfig {
    /// 9600 bps 8N1, as the sensor ships
    pub fn sensor(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: 9600,
            char_size: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_secs(1),
        }
    }
    /// 115200 bps 8N1, as the drive is set
    pub fn motor(path: impl Into<String>) -> Self {
        Self {
            baud_rate: 115_200,
            timeout: Duration::from_millis(500),
            .. Self::sensor(path)
        }
    }
}
impl Default for PortConfig {
    fn default() -> Self {Self::sensor("/dev/ttyUSB0")}
}


/// allowed travel of the motor, in pulses
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub min_position: i32,
    pub max_position: i32,
}
impl Limits {
    pub fn contains(&self, position: i64) -> bool {
        i64::from(self.min_position) <= position && position <= i64::from(self.max_position)
    }
}
impl Default for Limits {
    fn default() -> Self {
        Self {min_position: -100_000, max_position: 100_000}
    }
}

/// how positioning moves are carried out
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Positioning {
    /**
        jog toward the target for `distance / speed` seconds then stop.

        open loop and approximate, for drives not executing positioning commands
    */
    #[default]
    TimedJog,
    /// send the absolute/relative move commands and let the drive position itself
    Direct,
}

/// settings of the stepper motor drive
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// log target of this device
    pub name: String,
    pub port: PortConfig,
    /// address of the drive on the bus
    pub slave_id: u8,
    pub profile: FrameProfile,
    pub limits: Limits,
    /// pulses per revolution
    pub resolution: u32,
    /// maximum motor speed in rpm
    pub max_rpm: u32,
    /// lowest step rate the drive accepts, in pps
    pub min_speed: u32,
    /// speed set when enabling the servo, in pps
    pub default_speed: u32,
    /// acceleration set when enabling the servo, in pps/s
    pub acceleration: u32,
    /// distance under which a positioning is considered already done, in pulses
    pub arrival_threshold: u32,
    /// delay between sending a command and reading its answer
    pub settle: Duration,
    pub positioning: Positioning,
}
impl MotorConfig {
    /// highest step rate allowed, in pps
    pub fn max_speed(&self) -> u32 {
        let speed = u64::from(self.max_rpm) * u64::from(self.resolution) / 60;
        u32::try_from(speed).unwrap_or(u32::MAX)
    }
}
impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            name: "motor".into(),
            port: PortConfig::motor("/dev/ttyUSB1"),
            slave_id: 2,
            profile: FrameProfile::default(),
            limits: Limits::default(),
            resolution: 10_000,
            max_rpm: 3000,
            min_speed: 5000,
            default_speed: 5000,
            acceleration: 10_000,
            arrival_threshold: 10,
            settle: Duration::from_millis(100),
            positioning: Positioning::default(),
        }
    }
}


/// soft limits of the measures, values outside are reported but kept
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorLimits {
    pub temp_min: f32,
    pub temp_max: f32,
    pub humidity_min: f32,
    pub humidity_max: f32,
}
impl Default for SensorLimits {
    fn default() -> Self {
        Self {
            temp_min: -40.,
            temp_max: 60.,
            humidity_min: 0.,
            humidity_max: 80.,
        }
    }
}

/// settings of the temperature/humidity sensor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// log target of this device
    pub name: String,
    pub port: PortConfig,
    /// modbus address of the sensor
    pub slave_id: u8,
    /// function code used to read measures, input or holding registers
    pub read_function: u8,
    pub limits: SensorLimits,
    /// delay between sending a request and reading its answer
    pub settle: Duration,
}
impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: "sensor".into(),
            port: PortConfig::sensor("/dev/ttyUSB0"),
            slave_id: 1,
            read_function: READ_INPUT_REGISTERS,
            limits: SensorLimits::default(),
            settle: Duration::from_millis(50),
        }
    }
}
