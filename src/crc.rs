/*!
    CRC-16/MODBUS, shared by the FASTECH and Modbus RTU protocols

    reflected polynomial `0xA001`, seed `0xFFFF`, no final xor. Both protocols transmit it little endian.
*/

/// reflected form of polynomial 0x8005
pub const POLYNOMIAL: u16 = 0xA001;
/// initial value of the running checksum
pub const SEED: u16 = 0xFFFF;

/// checksum of the given bytes
pub const fn crc16(data: &[u8]) -> u16 {
    let mut crc = SEED;
    let mut i = 0;
    while i < data.len() {
        crc ^= data[i] as u16;
        let mut bit = 0;
        while bit < 8 {
            if crc & 1 != 0
                {crc = (crc >> 1) ^ POLYNOMIAL}
            else
                {crc >>= 1}
            bit += 1;
        }
        i += 1;
    }
    crc
}

/// true if `expected` is the checksum of `data`
pub fn crc16_verify(data: &[u8], expected: u16) -> bool {
    crc16(data) == expected
}

/// check a buffer ending with its own little endian checksum, as Modbus RTU frames do
pub fn crc16_verify_trailing(frame: &[u8]) -> bool {
    let Some(split) = frame.len().checked_sub(2)
        else {return false};
    let (data, crc) = frame.split_at(split);
    crc16_verify(data, u16::from_le_bytes([crc[0], crc[1]]))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_vectors() {
        // standard check value of CRC-16/MODBUS
        assert_eq!(crc16(b"123456789"), 0x4B37);
        assert_eq!(crc16(&[]), SEED);
        // servo on for slave 2
        assert_eq!(crc16(&[0x02, 0x83]), 0x7141);
        // read input register 1 of slave 1
        assert_eq!(crc16(&[0x01, 0x04, 0x00, 0x01, 0x00, 0x01]), 0x0A60);
    }

    #[test]
    fn verify_random() {
        for len in 0 .. 64 {
            let data = (0 .. len).map(|_| rand::random::<u8>()).collect::<std::vec::Vec<u8>>();
            assert!(crc16_verify(&data, crc16(&data)));
            assert!(!crc16_verify(&data, crc16(&data) ^ 1));
        }
    }

    #[test]
    fn trailing() {
        assert!(crc16_verify_trailing(&[0x01, 0x04, 0x00, 0x01, 0x00, 0x01, 0x60, 0x0A]));
        assert!(!crc16_verify_trailing(&[0x01, 0x04, 0x00, 0x01, 0x00, 0x01, 0x0A, 0x60]));
        assert!(!crc16_verify_trailing(&[0x01]));
    }
}
