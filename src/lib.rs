/*!
    drivers for two independent RS-485 links:

    - a stepper motor controller speaking the FASTECH framed binary protocol
    - a temperature/humidity sensor speaking Modbus RTU

    the protocol core (checksum, byte stuffing, frame codecs, status word) is `no_std` and allocation free.
    The serial master side (transaction channel, motion controller, sensor client) lives in [master], the simulated devices in [slave].
*/
#![no_std]
#[cfg(feature = "std")]
extern crate std;

mod utils;

pub mod crc;
pub mod stuffing;
pub mod fastech;
pub mod command;
pub mod status;
pub mod modbus;
pub mod registers;
#[cfg(feature = "master")]
pub mod master;
#[cfg(feature = "slave")]
pub mod slave;


use thiserror::Error;

/// error raised when decoding or encoding a frame, whatever the protocol
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// missing or garbled header/tail, truncated frame, inconsistent length field
    #[error("malformed frame: {0}")]
    FrameFormat(&'static str),
    /// checksum computed on received bytes differs from the transmitted one
    #[error("checksum mismatch: computed {expected:#06x}, received {received:#06x}")]
    Checksum { expected: u16, received: u16 },
    /// frame content does not fit in the bounded frame buffers
    #[error("frame exceeds maximum size")]
    TooLong,
    /// the modbus slave answered with an exception code
    #[error("modbus exception code {0:#04x}")]
    Exception(u8),
}
