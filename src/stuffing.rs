/*!
    byte stuffing of FASTECH frames

    the header and tail markers both start with [ESCAPE], so any occurence of this byte between them is doubled on transmission and collapsed back on reception.
*/

use heapless::Vec;
use crate::FrameError;

/// reserved byte value escaped by doubling
pub const ESCAPE: u8 = 0xAA;

/// append `data` to `dst`, doubling every [ESCAPE] byte
pub fn stuff<const N: usize>(data: &[u8], dst: &mut Vec<u8, N>) -> Result<(), FrameError> {
    for &byte in data {
        dst.push(byte) .map_err(|_| FrameError::TooLong)?;
        if byte == ESCAPE {
            dst.push(byte) .map_err(|_| FrameError::TooLong)?;
        }
    }
    Ok(())
}

/// append `data` to `dst`, collapsing every pair of [ESCAPE] bytes into one
pub fn destuff<const N: usize>(data: &[u8], dst: &mut Vec<u8, N>) -> Result<(), FrameError> {
    let mut i = 0;
    while i < data.len() {
        dst.push(data[i]) .map_err(|_| FrameError::TooLong)?;
        if data[i] == ESCAPE && data.get(i+1) == Some(&ESCAPE)
            {i += 2}
        else
            {i += 1}
    }
    Ok(())
}
