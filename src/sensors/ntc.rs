//! Airflow NTC thermistor.
//!
//! Wired as the low leg of a divider with a fixed 66.5 kΩ resistor and
//! read in millivolts.  Resistance is converted to temperature by linear
//! interpolation over the manufacturer's 5 °C table; readings outside the
//! table clamp to its ends.

use crate::error::SensorError;

const VIN_MV: u32 = 3300;
const LEG_RESISTANCE: u32 = 66_500;

/// (resistance Ω, centidegrees), descending resistance.
const TABLE: [(u32, i32); 19] = [
    (235_800, -4000),
    (173_900, -3500),
    (129_900, -3000),
    (98_180, -2500),
    (75_020, -2000),
    (57_930, -1500),
    (45_170, -1000),
    (35_550, -500),
    (28_200, 0),
    (22_600, 500),
    (18_230, 1000),
    (14_820, 1500),
    (12_130, 2000),
    (10_000, 2500),
    (8_295, 3000),
    (6_922, 3500),
    (5_810, 4000),
    (4_903, 4500),
    (4_160, 5000),
];

/// NTC resistance for a divider voltage.  An open NTC reads full scale.
pub fn resistance(millivolts: u32) -> Result<u32, SensorError> {
    if millivolts >= VIN_MV {
        return Err(SensorError::AdcReadFailed);
    }
    Ok(millivolts * LEG_RESISTANCE / (VIN_MV - millivolts))
}

/// Temperature in centidegrees for an NTC resistance.
pub fn centidegrees(ohms: u32) -> i16 {
    let Some(i) = TABLE.iter().position(|&(r, _)| r <= ohms) else {
        return TABLE[TABLE.len() - 1].1 as i16;
    };
    if i == 0 {
        return TABLE[0].1 as i16;
    }
    let (r_hi, t_lo) = TABLE[i - 1];
    let (r_lo, t_hi) = TABLE[i];
    let span = (r_hi - r_lo) as i64;
    let offset = (r_hi - ohms) as i64;
    (t_lo as i64 + offset * (t_hi - t_lo) as i64 / span) as i16
}

pub fn read_centidegrees(millivolts: u32) -> Result<i16, SensorError> {
    resistance(millivolts).map(centidegrees)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_knots() {
        assert_eq!(centidegrees(10_000), 2500);
        assert_eq!(centidegrees(28_200), 0);
    }

    #[test]
    fn interpolates_between_knots() {
        // Halfway between 20 °C and 25 °C.
        assert_eq!(centidegrees((12_130 + 10_000) / 2), 2250);
    }

    #[test]
    fn clamps_outside_table() {
        assert_eq!(centidegrees(1_000_000), -4000);
        assert_eq!(centidegrees(100), 5000);
    }

    #[test]
    fn open_circuit_is_an_error() {
        assert_eq!(read_centidegrees(3300), Err(SensorError::AdcReadFailed));
    }

    #[test]
    fn divider_math() {
        // Equal legs: half the supply.
        assert_eq!(resistance(1650).unwrap(), 66_500);
    }
}
