/*!
    FASTECH frame codec

    wire format:

    ```text
    | header (2) | stuffed( slave id (1) | frame type (1) | payload (n) | crc16 le (2) ) | tail (2) |
    ```

    the checksum covers slave id, frame type and payload before stuffing. Header and tail are part of the [FrameProfile] because firmware revisions disagree on them.
*/

use heapless::Vec;
use crate::{
    FrameError,
    crc::crc16,
    stuffing::{stuff, destuff},
    command::{CommandTable, Payload, MAX_PAYLOAD},
    };


/// size of slave id, frame type and checksum around the payload
const OVERHEAD: usize = 4;
/// largest possible frame on the wire, with every byte of the stuffed region doubled
pub const MAX_FRAME: usize = 2 + 2*(MAX_PAYLOAD + OVERHEAD) + 2;
/// bounded buffer for a whole frame
pub type FrameBuffer = Vec<u8, MAX_FRAME>;
/// unstuffed region of a frame
type Body = Vec<u8, {MAX_PAYLOAD + OVERHEAD}>;


/// marker bytes and command codes of one firmware revision
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrameProfile {
    pub header: [u8; 2],
    pub tail: [u8; 2],
    pub commands: CommandTable,
}
impl FrameProfile {
    /// profile of the Ezi-STEP Plus-R drive on the bench
    pub const EZI_STEP: Self = Self {
        header: [0xAA, 0xCC],
        tail: [0xAA, 0xEE],
        commands: CommandTable::EZI_STEP,
    };
}
impl Default for FrameProfile {
    fn default() -> Self {Self::EZI_STEP}
}


/// one FASTECH frame, without its markers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// address of the drive on the bus
    pub slave_id: u8,
    /// command code
    pub frame_type: u8,
    pub payload: Payload,
}
impl Frame {
    pub fn new(slave_id: u8, frame_type: u8, payload: &[u8]) -> Result<Self, FrameError> {
        Ok(Self {
            slave_id,
            frame_type,
            payload: Payload::from_slice(payload) .map_err(|_| FrameError::TooLong)?,
        })
    }

    /// checksum over slave id, frame type and payload
    pub fn crc(&self) -> u16 {
        // the body buffer always fits the unstuffed content
        let mut body = Body::new();
        body.push(self.slave_id).ok();
        body.push(self.frame_type).ok();
        body.extend_from_slice(&self.payload).ok();
        crc16(&body)
    }

    /// serialize the frame with its markers, ready to send
    pub fn encode(&self, profile: &FrameProfile) -> Result<FrameBuffer, FrameError> {
        let mut frame = FrameBuffer::new();
        let overflow = |_| FrameError::TooLong;
        frame.extend_from_slice(&profile.header) .map_err(overflow)?;
        stuff(&[self.slave_id, self.frame_type], &mut frame)?;
        stuff(&self.payload, &mut frame)?;
        stuff(&self.crc().to_le_bytes(), &mut frame)?;
        frame.extend_from_slice(&profile.tail) .map_err(overflow)?;
        Ok(frame)
    }

    /// parse a frame received from the wire, checking markers and checksum
    pub fn decode(profile: &FrameProfile, raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < 4
            {return Err(FrameError::FrameFormat("frame shorter than its markers"))}
        let (header, rest) = raw.split_at(2);
        let (stuffed, tail) = rest.split_at(rest.len() - 2);
        if header != profile.header
            {return Err(FrameError::FrameFormat("bad header"))}
        if tail != profile.tail
            {return Err(FrameError::FrameFormat("bad tail"))}

        let mut body = Body::new();
        destuff(stuffed, &mut body)?;
        if body.len() < OVERHEAD
            {return Err(FrameError::FrameFormat("truncated frame"))}

        let (content, crc) = body.split_at(body.len() - 2);
        let received = u16::from_le_bytes([crc[0], crc[1]]);
        let expected = crc16(content);
        if received != expected
            {return Err(FrameError::Checksum {expected, received})}

        Self::new(content[0], content[1], &content[2 ..])
    }
}


/// acknowledgment frame sent back by the drive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub slave_id: u8,
    pub frame_type: u8,
    /// communication status, 0 on success
    pub comm_status: u8,
    /// command specific data following the status
    pub data: Payload,
}
impl Response {
    /// true if the drive reported the command as executed
    pub fn success(&self) -> bool {
        self.comm_status == 0
    }
}
impl From<Frame> for Response {
    fn from(frame: Frame) -> Self {
        // a bare acknowledgment without status byte counts as success
        let (comm_status, data) = match frame.payload.split_first() {
            Some((&status, data)) => (status, data),
            None => (0, &[][..]),
        };
        Self {
            slave_id: frame.slave_id,
            frame_type: frame.frame_type,
            comm_status,
            // data is a suffix of the payload so it fits
            data: Payload::from_slice(data).unwrap_or_default(),
        }
    }
}
