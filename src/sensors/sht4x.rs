//! Sensirion SHT4x temperature / relative-humidity sensor (I²C 0x44).
//!
//! One high-repeatability measurement per control tick: write the command,
//! wait 10 ms, read two CRC-protected words.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::SensorError;

pub const ADDRESS: u8 = 0x44;

const CMD_SOFT_RESET: u8 = 0x94;
const CMD_MEASURE_HIGH: u8 = 0xFD;
const RESET_WAIT_MS: u32 = 1;
const MEASURE_WAIT_MS: u32 = 10;

/// Sensirion word CRC (poly 0x31, init 0xFF).  Shared with the SGP40.
pub fn sensirion_crc(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Big-endian word followed by its CRC.
pub(crate) fn checked_word(chunk: &[u8; 3]) -> Result<u16, SensorError> {
    if sensirion_crc(&chunk[..2]) != chunk[2] {
        return Err(SensorError::CrcMismatch);
    }
    Ok(u16::from_be_bytes([chunk[0], chunk[1]]))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sht4xReading {
    pub temperature_c: f32,
    /// Percent; may fall slightly outside 0..=100 near saturation.
    pub relative_humidity: f32,
}

pub struct Sht4x {
    address: u8,
}

impl Default for Sht4x {
    fn default() -> Self {
        Self::new()
    }
}

impl Sht4x {
    pub fn new() -> Self {
        Self { address: ADDRESS }
    }

    pub fn reset<I: I2c, D: DelayNs>(&self, i2c: &mut I, delay: &mut D) -> Result<(), SensorError> {
        i2c.write(self.address, &[CMD_SOFT_RESET])
            .map_err(|_| SensorError::BusFailed)?;
        delay.delay_ms(RESET_WAIT_MS);
        Ok(())
    }

    pub fn measure<I: I2c, D: DelayNs>(
        &self,
        i2c: &mut I,
        delay: &mut D,
    ) -> Result<Sht4xReading, SensorError> {
        i2c.write(self.address, &[CMD_MEASURE_HIGH])
            .map_err(|_| SensorError::BusFailed)?;
        delay.delay_ms(MEASURE_WAIT_MS);

        let mut rx = [0u8; 6];
        i2c.read(self.address, &mut rx)
            .map_err(|_| SensorError::BusFailed)?;

        let t_ticks = checked_word(&[rx[0], rx[1], rx[2]])?;
        let rh_ticks = checked_word(&[rx[3], rx[4], rx[5]])?;

        Ok(Sht4xReading {
            temperature_c: f32::from(t_ticks) * 175.0 / 65535.0 - 45.0,
            relative_humidity: f32::from(rh_ticks) * 125.0 / 65535.0 - 6.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_datasheet_vector() {
        assert_eq!(sensirion_crc(&[0xBE, 0xEF]), 0x92);
    }

    #[test]
    fn checked_word_rejects_bad_crc() {
        assert_eq!(checked_word(&[0xBE, 0xEF, 0x92]), Ok(0xBEEF));
        assert_eq!(
            checked_word(&[0xBE, 0xEF, 0x00]),
            Err(SensorError::CrcMismatch)
        );
    }
}
