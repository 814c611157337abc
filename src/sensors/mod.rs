//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! ```text
//!   I²C ──┬── SHT4x  (temperature, RH)
//!         ├── SGP40  (raw VOC ──▶ VocIndex)
//!         └── LTR-303 (lux)
//!   ADC ───── NTC in the airflow (internal / external by fan direction)
//! ```
//!
//! The hub samples once per control tick and keeps the last value of every
//! channel.  Room readings are only refreshed while the fan is not pulling
//! outdoor air over the sensors; the single airflow NTC reads the indoor
//! side while blowing out and the outdoor side while pulling in.

pub mod ltr303;
pub mod ntc;
pub mod sgp40;
pub mod sht4x;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;

use crate::error::SensorError;
use crate::fsm::context::SensorSnapshot;
use crate::model::{
    Direction, LUX_INVALID, RELATIVE_HUMIDITY_INVALID, TEMPERATURE_INVALID, VOC_INVALID,
};
use ltr303::Ltr303;
use sgp40::{Sgp40, VocIndex};
use sht4x::Sht4x;

/// Aggregates all sensor drivers and produces a unified snapshot.
pub struct SensorHub<I, D> {
    i2c: I,
    delay: D,
    sht4x: Sht4x,
    sgp40: Sgp40,
    voc_index: VocIndex,
    ltr303: Ltr303,
    last: SensorSnapshot,
}

impl<I: I2c, D: DelayNs> SensorHub<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            sht4x: Sht4x::new(),
            sgp40: Sgp40::new(),
            voc_index: VocIndex::new(),
            ltr303: Ltr303::new(),
            last: SensorSnapshot::default(),
        }
    }

    /// Reset the SHT4x and configure the light sensor.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.sht4x.reset(&mut self.i2c, &mut self.delay)?;
        self.ltr303.init(&mut self.i2c)
    }

    /// Sample every sensor.
    ///
    /// `direction` is the fan direction currently applied; `ntc_millivolts`
    /// the averaged divider voltage of the airflow NTC.  A failed read
    /// stores the channel's invalid sentinel.
    pub fn sample(
        &mut self,
        direction: Direction,
        ntc_millivolts: Result<u32, SensorError>,
    ) -> SensorSnapshot {
        if direction != Direction::In {
            let room = match self.sht4x.measure(&mut self.i2c, &mut self.delay) {
                Ok(r) => Some((r.temperature_c, r.relative_humidity)),
                Err(e) => {
                    warn!("SensorHub: SHT4x read failed: {}", e);
                    None
                }
            };
            let (temperature, relative_humidity) = match room {
                Some((t, rh)) => (
                    (t * 100.0) as i16,
                    (rh * 10.0).clamp(0.0, 1000.0) as u16,
                ),
                None => (TEMPERATURE_INVALID, RELATIVE_HUMIDITY_INVALID),
            };
            self.last.temperature = temperature;
            self.last.relative_humidity = relative_humidity;

            self.last.voc = match self.sgp40.measure_raw(&mut self.i2c, &mut self.delay, room) {
                Ok(raw) => self.voc_index.process(raw),
                Err(e) => {
                    warn!("SensorHub: SGP40 read failed: {}", e);
                    VOC_INVALID
                }
            };
        }

        self.last.lux = match self.ltr303.measure_lux(&mut self.i2c) {
            Ok(lux) => lux.clamp(0.0, f32::from(LUX_INVALID - 1)) as u16,
            Err(e) => {
                warn!("SensorHub: LTR-303 read failed: {}", e);
                LUX_INVALID
            }
        };

        match ntc_millivolts.and_then(ntc::read_centidegrees) {
            Ok(t) => match direction {
                Direction::Out => self.last.ntc_internal = t,
                Direction::In => self.last.ntc_external = t,
                Direction::None => {}
            },
            Err(e) => warn!("SensorHub: NTC read failed: {}", e),
        }

        self.last
    }

    pub fn last(&self) -> SensorSnapshot {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use sht4x::sensirion_crc;

    /// Minimal I²C bus answering the three sensors from canned data.
    struct MockBus {
        sht_word_t: u16,
        sht_word_rh: u16,
        sgp_raw: u16,
        ch0: u16,
        ch1: u16,
        fail: bool,
        last_addr: u8,
    }

    #[derive(Debug)]
    struct BusError;

    impl embedded_hal::i2c::Error for BusError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    impl ErrorType for MockBus {
        type Error = BusError;
    }

    fn word(w: u16) -> [u8; 3] {
        let b = w.to_be_bytes();
        [b[0], b[1], sensirion_crc(&b)]
    }

    impl I2c for MockBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(BusError);
            }
            for op in operations {
                match op {
                    Operation::Write(_) => self.last_addr = address,
                    Operation::Read(buf) => match address {
                        sht4x::ADDRESS => {
                            let t = word(self.sht_word_t);
                            let rh = word(self.sht_word_rh);
                            buf[..3].copy_from_slice(&t);
                            buf[3..6].copy_from_slice(&rh);
                        }
                        sgp40::ADDRESS => buf.copy_from_slice(&word(self.sgp_raw)),
                        ltr303::ADDRESS => {
                            let c1 = self.ch1.to_le_bytes();
                            let c0 = self.ch0.to_le_bytes();
                            if buf.len() == 4 {
                                buf.copy_from_slice(&[c1[0], c1[1], c0[0], c0[1]]);
                            } else {
                                buf[0] = 0xA0;
                            }
                        }
                        _ => return Err(BusError),
                    },
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn make_hub() -> SensorHub<MockBus, NoDelay> {
        SensorHub::new(
            MockBus {
                // 25.0 °C and 50.0 %RH
                sht_word_t: 26_214,
                sht_word_rh: 29_359,
                sgp_raw: 30_000,
                ch0: 100,
                ch1: 10,
                fail: false,
                last_addr: 0,
            },
            NoDelay,
        )
    }

    #[test]
    fn init_checks_part_id() {
        let mut hub = make_hub();
        assert!(hub.init().is_ok());
        assert_eq!(hub.i2c.last_addr, ltr303::ADDRESS);
    }

    #[test]
    fn samples_room_when_blowing_out() {
        let mut hub = make_hub();
        let s = hub.sample(Direction::Out, Ok(1650));
        assert!((s.temperature - 2500).abs() <= 1, "t={}", s.temperature);
        assert!((i32::from(s.relative_humidity) - 500).abs() <= 1);
        assert_eq!(s.lux, 188);
        assert_eq!(s.voc, 0); // still in blackout
        assert_eq!(s.ntc_internal, ntc::centidegrees(66_500));
        assert_eq!(s.ntc_external, 0);
    }

    #[test]
    fn pulling_in_keeps_room_readings() {
        let mut hub = make_hub();
        let first = hub.sample(Direction::None, Ok(1650));
        hub.i2c.sht_word_t = 40_000;
        let second = hub.sample(Direction::In, Ok(1000));
        assert_eq!(second.temperature, first.temperature);
        assert_eq!(second.ntc_external, ntc::read_centidegrees(1000).unwrap());
    }

    #[test]
    fn bus_failure_reports_sentinels() {
        let mut hub = make_hub();
        hub.i2c.fail = true;
        let s = hub.sample(Direction::Out, Err(SensorError::AdcReadFailed));
        assert_eq!(s.temperature, TEMPERATURE_INVALID);
        assert_eq!(s.relative_humidity, RELATIVE_HUMIDITY_INVALID);
        assert_eq!(s.voc, VOC_INVALID);
        assert_eq!(s.lux, LUX_INVALID);
    }
}
