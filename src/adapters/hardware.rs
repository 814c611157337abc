//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the [`FanDriver`], exposing them through
//! [`SensorPort`] and [`FanPort`].  Generic over the `embedded-hal` bus,
//! delay, PWM and GPIO types so the same adapter runs on ESP-IDF drivers
//! and on host doubles.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::{FanPort, SensorPort};
use crate::drivers::fan::{FanDriver, FanState};
use crate::error::SensorError;
use crate::fsm::context::SensorSnapshot;
use crate::model::{Direction, Speed};
use crate::sensors::SensorHub;

/// Averaged NTC divider voltage, in millivolts.
pub type NtcReader = fn() -> Result<u32, SensorError>;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<I, D, P, O> {
    sensors: SensorHub<I, D>,
    fan: FanDriver<P, O>,
    ntc: NtcReader,
}

impl<I, D, P, O> HardwareAdapter<I, D, P, O>
where
    I: I2c,
    D: DelayNs,
    P: SetDutyCycle,
    O: OutputPin,
{
    pub fn new(sensors: SensorHub<I, D>, fan: FanDriver<P, O>, ntc: NtcReader) -> Self {
        Self { sensors, fan, ntc }
    }

    pub fn fan_state(&self) -> FanState {
        self.fan.state()
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I, D, P, O> SensorPort for HardwareAdapter<I, D, P, O>
where
    I: I2c,
    D: DelayNs,
    P: SetDutyCycle,
    O: OutputPin,
{
    fn read_all(&mut self) -> SensorSnapshot {
        let direction = self.fan.state().direction;
        self.sensors.sample(direction, (self.ntc)())
    }
}

// ── FanPort implementation ────────────────────────────────────

impl<I, D, P, O> FanPort for HardwareAdapter<I, D, P, O>
where
    I: I2c,
    D: DelayNs,
    P: SetDutyCycle,
    O: OutputPin,
{
    fn set_fan(&mut self, direction: Direction, speed: Speed) {
        let current = self.fan.state();
        if current.direction == direction && current.speed == speed {
            return;
        }
        if let Err(e) = self.fan.set(direction, speed) {
            warn!("Hardware: fan command {:?}/{:?} failed: {}", direction, speed, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    /// Bus with nothing attached.
    struct EmptyBus;

    #[derive(Debug)]
    struct Nack;

    impl embedded_hal::i2c::Error for Nack {
        fn kind(&self) -> ErrorKind {
            ErrorKind::NoAcknowledge(embedded_hal::i2c::NoAcknowledgeSource::Address)
        }
    }

    impl ErrorType for EmptyBus {
        type Error = Nack;
    }

    impl I2c for EmptyBus {
        fn transaction(&mut self, _: u8, _: &mut [Operation<'_>]) -> Result<(), Nack> {
            Err(Nack)
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[derive(Default)]
    struct Pwm(u16);

    impl embedded_hal::pwm::ErrorType for Pwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for Pwm {
        fn max_duty_cycle(&self) -> u16 {
            100
        }
        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            self.0 = duty;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Pin;

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    fn ntc_room() -> Result<u32, SensorError> {
        Ok(1650)
    }

    fn make_adapter() -> HardwareAdapter<EmptyBus, NoDelay, Pwm, Pin> {
        HardwareAdapter::new(
            SensorHub::new(EmptyBus, NoDelay),
            FanDriver::new(Pwm::default(), Pin),
            ntc_room,
        )
    }

    #[test]
    fn ntc_follows_applied_direction() {
        let mut hw = make_adapter();
        hw.set_fan(Direction::In, Speed::Low);
        let s = hw.read_all();
        assert_eq!(s.ntc_external, crate::sensors::ntc::centidegrees(66_500));
        assert_eq!(s.ntc_internal, 0);
    }

    #[test]
    fn fan_command_reaches_driver() {
        let mut hw = make_adapter();
        hw.set_fan(Direction::Out, Speed::High);
        let state = hw.fan_state();
        assert_eq!(state.direction, Direction::Out);
        assert_eq!(state.duty_percent, 85);
    }
}
