//! Lite-On LTR-303ALS ambient light sensor (I²C 0x29).
//!
//! Gain 1x, 100 ms integration, 500 ms measurement rate.  Lux is computed
//! from the visible+IR (CH0) and IR-only (CH1) channels with the
//! piecewise formula from the application note.

use embedded_hal::i2c::I2c;

use crate::error::SensorError;

pub const ADDRESS: u8 = 0x29;

const REG_CONTR: u8 = 0x80;
const REG_MEAS_RATE: u8 = 0x85;
const REG_PART_ID: u8 = 0x86;
/// CH1 low byte; CH1 must be read before CH0 to latch a coherent pair.
const REG_DATA_CH1_0: u8 = 0x88;

const GAIN_1X: u8 = 0;
const MODE_ACTIVE: u8 = 0x01;
const INTEGRATION_100MS: u8 = 0;
const RATE_500MS: u8 = 0x03;
const PART_ID: u8 = 0x0A;

const GAIN_FACTOR: f32 = 1.0;
const INTEGRATION_FACTOR: f32 = 1.0;

pub struct Ltr303 {
    address: u8,
}

impl Default for Ltr303 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ltr303 {
    pub fn new() -> Self {
        Self { address: ADDRESS }
    }

    /// Configure gain and rate, then check the part ID.
    pub fn init<I: I2c>(&self, i2c: &mut I) -> Result<(), SensorError> {
        i2c.write(self.address, &[REG_CONTR, (GAIN_1X << 2) | MODE_ACTIVE])
            .map_err(|_| SensorError::BusFailed)?;
        i2c.write(
            self.address,
            &[REG_MEAS_RATE, (INTEGRATION_100MS << 3) | RATE_500MS],
        )
        .map_err(|_| SensorError::BusFailed)?;

        let mut id = [0u8; 1];
        i2c.write_read(self.address, &[REG_PART_ID], &mut id)
            .map_err(|_| SensorError::BusFailed)?;
        if id[0] >> 4 != PART_ID {
            return Err(SensorError::BusFailed);
        }
        Ok(())
    }

    pub fn measure_lux<I: I2c>(&self, i2c: &mut I) -> Result<f32, SensorError> {
        let mut rx = [0u8; 4];
        i2c.write_read(self.address, &[REG_DATA_CH1_0], &mut rx)
            .map_err(|_| SensorError::BusFailed)?;
        let ch1 = u16::from_le_bytes([rx[0], rx[1]]);
        let ch0 = u16::from_le_bytes([rx[2], rx[3]]);
        Ok(lux_from_channels(ch0, ch1))
    }
}

pub fn lux_from_channels(ch0: u16, ch1: u16) -> f32 {
    let (ch0, ch1) = (f32::from(ch0), f32::from(ch1));
    if ch0 + ch1 == 0.0 {
        return 0.0;
    }
    let ratio = ch1 / (ch0 + ch1);
    let raw = if ratio < 0.45 {
        1.7743 * ch0 + 1.1059 * ch1
    } else if ratio < 0.64 {
        4.2785 * ch0 - 1.9548 * ch1
    } else if ratio < 0.85 {
        0.5926 * ch0 + 0.1185 * ch1
    } else {
        0.0
    };
    raw / GAIN_FACTOR / INTEGRATION_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_is_zero() {
        assert_eq!(lux_from_channels(0, 0), 0.0);
    }

    #[test]
    fn mostly_visible_uses_first_segment() {
        let lux = lux_from_channels(100, 10);
        assert!((lux - (177.43 + 11.059)).abs() < 0.01);
    }

    #[test]
    fn mostly_infrared_is_zero() {
        assert_eq!(lux_from_channels(10, 100), 0.0);
    }
}
