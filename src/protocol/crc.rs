//! Sensirion CRC-8.
//!
//! Polynomial 0x31 (x⁸ + x⁵ + x⁴ + 1), init 0xFF, MSB first, no reflection,
//! no final XOR.  Frames carry it over `ADDR..DATA`.

const POLYNOMIAL: u8 = 0x31;
const INIT: u8 = 0xFF;

pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = INIT;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(crc8(b"123456789"), 0xF7);
    }

    #[test]
    fn sensirion_datasheet_vector() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
    }

    #[test]
    fn empty_input_is_init() {
        assert_eq!(crc8(&[]), 0xFF);
    }

    #[test]
    fn single_bit_flip_detected() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x00, 0x09, 0x3F];
        let reference = crc8(&data);
        for i in 0..data.len() {
            for bit in 0..8 {
                let mut corrupted = data;
                corrupted[i] ^= 1 << bit;
                assert_ne!(crc8(&corrupted), reference);
            }
        }
    }
}
