//! Reversible fan driver.
//!
//! Speed through a PWM duty taken from the per-direction fan curve, air
//! direction through a digital pin (LOW = in, HIGH = out).  Generic over the
//! `embedded-hal` PWM and GPIO traits: on ESP-IDF the LEDC channel and
//! direction `PinDriver`; on host, test doubles.
//!
//! `Direction::None` only zeroes the duty and leaves the direction pin
//! where it was, so a brief stop does not toggle the motor bridge.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::control::fan_curve;
use crate::error::FanError;
use crate::model::{Direction, Speed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanState {
    pub direction: Direction,
    pub speed: Speed,
    pub duty_percent: u8,
}

pub struct FanDriver<P, O> {
    pwm: P,
    dir_pin: O,
    state: FanState,
}

impl<P: SetDutyCycle, O: OutputPin> FanDriver<P, O> {
    pub fn new(pwm: P, dir_pin: O) -> Self {
        Self {
            pwm,
            dir_pin,
            state: FanState {
                direction: Direction::None,
                speed: Speed::None,
                duty_percent: 0,
            },
        }
    }

    pub fn set(&mut self, direction: Direction, speed: Speed) -> Result<(), FanError> {
        match direction {
            Direction::In => self.dir_pin.set_low(),
            Direction::Out => self.dir_pin.set_high(),
            Direction::None => Ok(()),
        }
        .map_err(|_| FanError::GpioWriteFailed)?;

        let duty = fan_curve::duty_for(direction, speed);
        self.pwm
            .set_duty_cycle_percent(duty)
            .map_err(|_| FanError::PwmWriteFailed)?;

        self.state = FanState {
            direction,
            speed,
            duty_percent: duty,
        };
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), FanError> {
        self.set(Direction::None, Speed::None)
    }

    pub fn state(&self) -> FanState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.duty_percent > 0
    }
}
