//! Sensirion SGP40 VOC sensor (I²C 0x59) and the adaptive VOC index.
//!
//! The sensor returns raw MOx ticks, humidity-compensated with the latest
//! SHT4x reading.  [`VocIndex`] turns the raw stream into an index where
//! 100 is the learned baseline of the room and higher values mean more VOC
//! than usual (1..=500).

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::sht4x::{checked_word, sensirion_crc};
use crate::error::SensorError;

pub const ADDRESS: u8 = 0x59;

const CMD_MEASURE_RAW: [u8; 2] = [0x26, 0x0F];
const MEASURE_WAIT_MS: u32 = 30;

/// Compensation words used when no valid SHT4x reading is available.
const DEFAULT_RH_TICKS: u16 = 0x8000;
const DEFAULT_T_TICKS: u16 = 0x6666;

pub struct Sgp40 {
    address: u8,
}

impl Default for Sgp40 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sgp40 {
    pub fn new() -> Self {
        Self { address: ADDRESS }
    }

    /// One raw measurement.  `compensation` is `(°C, %RH)` from the SHT4x.
    pub fn measure_raw<I: I2c, D: DelayNs>(
        &self,
        i2c: &mut I,
        delay: &mut D,
        compensation: Option<(f32, f32)>,
    ) -> Result<u16, SensorError> {
        let (rh_ticks, t_ticks) = match compensation {
            Some((t, rh)) => (
                (rh.clamp(0.0, 100.0) * 65535.0 / 100.0) as u16,
                ((t.clamp(-45.0, 130.0) + 45.0) * 65535.0 / 175.0) as u16,
            ),
            None => (DEFAULT_RH_TICKS, DEFAULT_T_TICKS),
        };

        let rh = rh_ticks.to_be_bytes();
        let t = t_ticks.to_be_bytes();
        let tx = [
            CMD_MEASURE_RAW[0],
            CMD_MEASURE_RAW[1],
            rh[0],
            rh[1],
            sensirion_crc(&rh),
            t[0],
            t[1],
            sensirion_crc(&t),
        ];
        i2c.write(self.address, &tx)
            .map_err(|_| SensorError::BusFailed)?;
        delay.delay_ms(MEASURE_WAIT_MS);

        let mut rx = [0u8; 3];
        i2c.read(self.address, &mut rx)
            .map_err(|_| SensorError::BusFailed)?;
        checked_word(&rx)
    }
}

// ───────────────────────────────────────────────────────────────
// VOC index
// ───────────────────────────────────────────────────────────────

/// Samples ignored after power-up while the hot plate settles.
const BLACKOUT_SAMPLES: u32 = 45;
/// Learning window of the baseline, in samples (12 h at 1 Hz).
const LEARNING_SAMPLES: u32 = 12 * 3600;
/// Lower bound of the spread so a very stable room does not amplify noise.
const MIN_STD_TICKS: f32 = 50.0;
const INDEX_MAX: f32 = 500.0;

/// Running mean/variance of the raw signal mapped to a 1..=500 index.
#[derive(Debug, Clone, Default)]
pub struct VocIndex {
    mean: f32,
    variance: f32,
    samples: u32,
}

impl VocIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw sample.  Returns 0 during the blackout.
    pub fn process(&mut self, raw: u16) -> u16 {
        let x = f32::from(raw);
        if self.samples == 0 {
            self.mean = x;
            self.variance = 0.0;
        }
        self.samples = self.samples.saturating_add(1);

        let alpha = 1.0 / self.samples.min(LEARNING_SAMPLES) as f32;
        let delta = x - self.mean;
        self.mean += alpha * delta;
        self.variance = (1.0 - alpha) * (self.variance + alpha * delta * delta);

        if self.samples < BLACKOUT_SAMPLES {
            return 0;
        }

        // MOx resistance drops as VOC rises.
        let std = self.variance.sqrt().max(MIN_STD_TICKS);
        let index = 100.0 + (self.mean - x) / std * 100.0;
        index.clamp(1.0, INDEX_MAX) as u16
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_settled(raw: u16) -> VocIndex {
        let mut voc = VocIndex::new();
        for _ in 0..BLACKOUT_SAMPLES {
            voc.process(raw);
        }
        voc
    }

    #[test]
    fn blackout_reports_zero() {
        let mut voc = VocIndex::new();
        for _ in 0..BLACKOUT_SAMPLES - 1 {
            assert_eq!(voc.process(30_000), 0);
        }
        assert_eq!(voc.process(30_000), 100);
    }

    #[test]
    fn baseline_is_one_hundred() {
        let mut voc = make_settled(28_000);
        assert_eq!(voc.process(28_000), 100);
    }

    #[test]
    fn falling_raw_raises_index() {
        let mut voc = make_settled(30_000);
        let index = voc.process(29_800);
        assert!(index > 100, "index {index}");
    }

    #[test]
    fn index_is_clamped() {
        let mut voc = make_settled(30_000);
        assert_eq!(voc.process(0), 500);
        let mut voc = make_settled(30_000);
        assert_eq!(voc.process(u16::MAX), 1);
    }
}
