/*!
    asynchronous RS-485 master in `std` environment.

    one [Channel] owns one serial link and runs one transaction at a time. On top of it:

    - [MotionController] drives the stepper motor over the FASTECH protocol
    - [SensorClient] reads the temperature/humidity sensor over Modbus RTU

    both never share a channel, so they can be driven from separate tasks.

    operations expecting an answer from a device return a `bool` or an `Option` and log the reason of a failure, since a missing answer is a normal outcome on a half-duplex bus. The `try_*` variants and [MotionController::command] return the [Error] instead.
*/

/// serial transactions, send a frame and wait for the answer
mod networking;
/// stepper motor state machine and position estimation
mod motion;
/// temperature/humidity sensor
mod sensor;
/// link and device settings
mod config;


pub use networking::Channel;
pub use motion::*;
pub use sensor::*;
pub use config::*;


use crate::{
    FrameError,
    status::AxisStatus,
    };
use thiserror::Error;

/// error regarding communication with a device
#[derive(Error, Debug)]
pub enum Error {
    #[error("serial port unavailable")]
    PortUnavailable(#[source] std::io::Error),
    #[error("problem with serial bus")]
    Bus(#[source] std::io::Error),
    #[error("no data arrived in expected time")]
    Timeout,
    #[error("invalid frame received")]
    Frame(#[from] FrameError),
    #[error("response does not match request: {0}")]
    Mismatch(&'static str),
    #[error("device refused command with status {0:#04x}")]
    Refused(u8),
    #[error("drive alarm is active ({0:?})")]
    DeviceAlarm(AxisStatus),
    #[error("position {position} is outside limits [{min}, {max}]")]
    LimitViolation { position: i64, min: i32, max: i32 },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Bus(error)
    }
}
