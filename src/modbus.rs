/*!
    Modbus RTU frame codec, restricted to the function codes used by the sensor

    RTU frames are delimited by line silence, so there is no stuffing: a frame is slave id, function code, big endian fields and a little endian CRC-16.
*/

use heapless::Vec;
use crate::{
    FrameError,
    crc::{crc16, crc16_verify_trailing},
    };


pub const READ_HOLDING_REGISTERS: u8 = 0x03;
pub const READ_INPUT_REGISTERS: u8 = 0x04;
pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
/// bit set in the function code of an exception response
pub const EXCEPTION: u8 = 0x80;

/// largest RTU frame
pub const MAX_ADU: usize = 256;
/// largest number of registers in a single read
pub const MAX_REGISTERS: usize = 125;

/// slave ids that can be given to a device, 0 being broadcast
pub const VALID_SLAVE_IDS: core::ops::RangeInclusive<u8> = 1 ..= 247;

/// bounded buffer for a frame
pub type Adu = Vec<u8, MAX_ADU>;
/// registers carried by a read response
pub type Registers = Vec<u16, MAX_REGISTERS>;


/// request sent to the sensor, all supported requests have the same layout
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub slave_id: u8,
    pub function_code: u8,
    /// first register
    pub address: u16,
    /// number of registers to read, or value to write
    pub value: u16,
}
impl Request {
    pub fn read(slave_id: u8, function_code: u8, address: u16, count: u16) -> Self {
        Self {slave_id, function_code, address, value: count}
    }
    pub fn write(slave_id: u8, address: u16, value: u16) -> Self {
        Self {slave_id, function_code: WRITE_SINGLE_REGISTER, address, value}
    }

    pub fn encode(&self) -> [u8; 8] {
        let mut frame = [0; 8];
        frame[0] = self.slave_id;
        frame[1] = self.function_code;
        frame[2 .. 4].copy_from_slice(&self.address.to_be_bytes());
        frame[4 .. 6].copy_from_slice(&self.value.to_be_bytes());
        let crc = crc16(&frame[.. 6]);
        frame[6 .. 8].copy_from_slice(&crc.to_le_bytes());
        frame
    }
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() != 8
            {return Err(FrameError::FrameFormat("request must be 8 bytes"))}
        check_crc(raw)?;
        Ok(Self {
            slave_id: raw[0],
            function_code: raw[1],
            address: u16::from_be_bytes([raw[2], raw[3]]),
            value: u16::from_be_bytes([raw[4], raw[5]]),
        })
    }
}


/// response of the sensor to a [Request]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub slave_id: u8,
    pub function_code: u8,
    pub data: ResponseData,
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseData {
    /// values of the registers read
    Registers(Registers),
    /// echo of a single register write
    Written {address: u16, value: u16},
}
impl Response {
    /// parse a response, an exception response is returned as [FrameError::Exception]
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < 5
            {return Err(FrameError::FrameFormat("truncated frame"))}
        check_crc(raw)?;
        let (slave_id, function_code) = (raw[0], raw[1]);
        if function_code & EXCEPTION != 0
            {return Err(FrameError::Exception(raw[2]))}

        let data = match function_code {
            READ_HOLDING_REGISTERS | READ_INPUT_REGISTERS => {
                let count = usize::from(raw[2]);
                if count % 2 != 0 || raw.len() != 3 + count + 2
                    {return Err(FrameError::FrameFormat("byte count mismatch"))}
                let mut registers = Registers::new();
                for word in raw[3 .. 3+count].chunks_exact(2) {
                    registers.push(u16::from_be_bytes([word[0], word[1]]))
                        .map_err(|_| FrameError::TooLong)?;
                }
                ResponseData::Registers(registers)
            },
            WRITE_SINGLE_REGISTER => {
                if raw.len() != 8
                    {return Err(FrameError::FrameFormat("write echo must be 8 bytes"))}
                ResponseData::Written {
                    address: u16::from_be_bytes([raw[2], raw[3]]),
                    value: u16::from_be_bytes([raw[4], raw[5]]),
                }
            },
            _ => return Err(FrameError::FrameFormat("unsupported function code")),
        };
        Ok(Self {slave_id, function_code, data})
    }

    pub fn encode(&self) -> Result<Adu, FrameError> {
        let overflow = |_| FrameError::TooLong;
        let mut frame = Adu::new();
        frame.extend_from_slice(&[self.slave_id, self.function_code]) .map_err(overflow)?;
        match &self.data {
            ResponseData::Registers(registers) => {
                let count = u8::try_from(2 * registers.len()) .map_err(|_| FrameError::TooLong)?;
                frame.push(count) .map_err(|_| FrameError::TooLong)?;
                for register in registers {
                    frame.extend_from_slice(&register.to_be_bytes()) .map_err(overflow)?;
                }
            },
            ResponseData::Written {address, value} => {
                frame.extend_from_slice(&address.to_be_bytes()) .map_err(overflow)?;
                frame.extend_from_slice(&value.to_be_bytes()) .map_err(overflow)?;
            },
        }
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes()) .map_err(overflow)?;
        Ok(frame)
    }
}

/// exception response to the given function code
pub fn encode_exception(slave_id: u8, function_code: u8, code: u8) -> [u8; 5] {
    let mut frame = [slave_id, function_code | EXCEPTION, code, 0, 0];
    let crc = crc16(&frame[.. 3]);
    frame[3 .. 5].copy_from_slice(&crc.to_le_bytes());
    frame
}

fn check_crc(raw: &[u8]) -> Result<(), FrameError> {
    if crc16_verify_trailing(raw)
        {return Ok(())}
    let split = raw.len() - 2;
    Err(FrameError::Checksum {
        expected: crc16(&raw[.. split]),
        received: u16::from_le_bytes([raw[split], raw[split+1]]),
    })
}
