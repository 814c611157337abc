//! Fan PWM curve
//!
//! Maps a speed level to a PWM duty percentage.  The impeller is not
//! symmetric, so pulling air in and pushing it out use slightly different
//! curves to move the same volume.

use crate::model::{Direction, Speed};

/// Duty (%) per speed level when pulling air in.
const CURVE_IN: [u8; Speed::COUNT] = [0, 20, 40, 65, 90, 100];
/// Duty (%) per speed level when pushing air out.
const CURVE_OUT: [u8; Speed::COUNT] = [0, 22, 39, 62, 85, 100];

/// Duty for a raw speed level.  Levels above BOOST clamp to BOOST.
pub fn duty_percent(direction: Direction, level: u8) -> u8 {
    let idx = usize::from(level).min(Speed::COUNT - 1);
    match direction {
        Direction::None => 0,
        Direction::In => CURVE_IN[idx],
        Direction::Out => CURVE_OUT[idx],
    }
}

/// Duty for a typed speed.
pub fn duty_for(direction: Direction, speed: Speed) -> u8 {
    duty_percent(direction, speed as u8)
}
