//! Shared mutable context threaded through every controller handler.
//!
//! `ControllerContext` is the single struct that mode handlers read from
//! and write to: the user settings copied in before each tick, the latest
//! sensor snapshot, the transient mode/speed/direction state, the phase
//! timers and the fan command produced by the tick.  Think of it as the
//! "blackboard" in a blackboard architecture.

use crate::config::{ControlTimings, SystemConfig, ThresholdTable};
use crate::control::ExtraCycleBudget;
use crate::model::{
    Direction, LUX_INVALID, Mode, RELATIVE_HUMIDITY_INVALID, Speed, TEMPERATURE_INVALID,
    ThresholdSetting, VOC_INVALID,
};

use super::timer::PhaseTimers;
use super::triggers::TriggerState;

/// Wire bit carried by the mode state while an extra cycle runs.
pub const MODE_FLAG_EXTRA_CYCLE: u8 = 0x10;
/// Wire bit carried by the mode state while the duration probe runs.
pub const MODE_FLAG_CALCULATE_DURATION: u8 = 0x20;

// ---------------------------------------------------------------------------
// Sensor snapshot (read-only to handlers; written by the sensor feed)
// ---------------------------------------------------------------------------

/// A point-in-time snapshot of every sensor, offsets already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSnapshot {
    /// Room temperature (centidegrees), `TEMPERATURE_INVALID` when unread.
    pub temperature: i16,
    /// Relative humidity (tenths of %), `RELATIVE_HUMIDITY_INVALID` when unread.
    pub relative_humidity: u16,
    /// VOC index, `VOC_INVALID` when unread.
    pub voc: u16,
    /// Ambient light (lux), `LUX_INVALID` when unread.
    pub lux: u16,
    /// Indoor-side NTC (centidegrees).
    pub ntc_internal: i16,
    /// Outdoor-side NTC (centidegrees).
    pub ntc_external: i16,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE_INVALID,
            relative_humidity: RELATIVE_HUMIDITY_INVALID,
            voc: VOC_INVALID,
            lux: LUX_INVALID,
            ntc_internal: 0,
            ntc_external: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// User settings (copied in from DeviceState before each tick)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSettings {
    pub mode_set: Mode,
    pub speed_set: Speed,
    pub relative_humidity_set: ThresholdSetting,
    pub lux_set: ThresholdSetting,
    pub voc_set: ThresholdSetting,
}

// ---------------------------------------------------------------------------
// Transient state
// ---------------------------------------------------------------------------

/// Actual mode plus the two AUTOMATIC_CYCLE sub-phase flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeState {
    pub base: Mode,
    pub extra_cycle: bool,
    pub calculating_duration: bool,
}

impl ModeState {
    pub fn clear_flags(&mut self) {
        self.extra_cycle = false;
        self.calculating_duration = false;
    }

    /// Wire encoding: base mode with the flag bits OR-ed in.
    pub fn to_wire(self) -> u8 {
        let mut raw = self.base as u8;
        if self.extra_cycle {
            raw |= MODE_FLAG_EXTRA_CYCLE;
        }
        if self.calculating_duration {
            raw |= MODE_FLAG_CALCULATE_DURATION;
        }
        raw
    }
}

/// Actual speed plus the light (night) and air-quality (boost) overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeedState {
    pub base: Speed,
    pub force_night: bool,
    pub force_boost: bool,
}

impl SpeedState {
    /// Speed actually driven: NIGHT wins over BOOST, BOOST over base.
    pub fn effective(self) -> Speed {
        if self.force_night {
            Speed::Night
        } else if self.force_boost {
            Speed::Boost
        } else {
            self.base
        }
    }
}

/// Output of one controller tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanCommand {
    pub direction: Direction,
    pub speed: Speed,
}

// ---------------------------------------------------------------------------
// ControllerContext
// ---------------------------------------------------------------------------

pub struct ControllerContext {
    // -- Timing --
    /// Controller seconds since boot (one per tick).
    pub now: u64,
    pub timings: ControlTimings,
    pub timers: PhaseTimers,

    // -- Inputs --
    pub settings: ControlSettings,
    pub sensors: SensorSnapshot,
    pub thresholds: ThresholdTable,

    // -- Transient state --
    pub mode: ModeState,
    pub speed: SpeedState,
    pub direction: Direction,
    /// Flip period computed by the last duration probe (seconds).
    pub duration: u16,
    pub probe_inversions: u8,
    pub extra_inversions: u8,
    pub triggers: TriggerState,
    pub budget: ExtraCycleBudget,

    // -- Outputs --
    /// Mode the controller wants persisted as the new mode set.
    pub pending_mode_set: Option<Mode>,
    pub fan: FanCommand,
}

impl ControllerContext {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            now: 0,
            timings: config.timings,
            timers: PhaseTimers::default(),
            settings: ControlSettings::default(),
            sensors: SensorSnapshot::default(),
            thresholds: config.thresholds,
            mode: ModeState::default(),
            speed: SpeedState::default(),
            direction: Direction::None,
            duration: 0,
            probe_inversions: 0,
            extra_inversions: 0,
            triggers: TriggerState::default(),
            budget: ExtraCycleBudget::default(),
            pending_mode_set: None,
            fan: FanCommand::default(),
        }
    }

    /// Ask for a new mode set.  Takes effect on the next tick, once the
    /// owner has persisted it and copied it back into `settings`.
    pub fn request_mode_set(&mut self, mode: Mode) {
        self.settings.mode_set = mode;
        self.pending_mode_set = Some(mode);
    }

    pub fn arm_cycle(&mut self, secs: u32) {
        self.timers.cycle.arm(self.now, secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_speed_priority() {
        let mut s = SpeedState {
            base: Speed::Medium,
            ..Default::default()
        };
        assert_eq!(s.effective(), Speed::Medium);
        s.force_boost = true;
        assert_eq!(s.effective(), Speed::Boost);
        s.force_night = true;
        assert_eq!(s.effective(), Speed::Night);
    }

    #[test]
    fn mode_state_wire_flags() {
        let mut m = ModeState {
            base: Mode::AutomaticCycle,
            ..Default::default()
        };
        assert_eq!(m.to_wire(), 4);
        m.calculating_duration = true;
        assert_eq!(m.to_wire(), 0x24);
        m.extra_cycle = true;
        assert_eq!(m.to_wire(), 0x34);
        m.clear_flags();
        assert_eq!(m.to_wire(), 4);
    }

    #[test]
    fn fresh_context_is_stopped() {
        let ctx = ControllerContext::new(&SystemConfig::default());
        assert_eq!(ctx.mode.base, Mode::Off);
        assert_eq!(ctx.fan, FanCommand::default());
        assert_eq!(ctx.sensors.voc, VOC_INVALID);
        assert_eq!(ctx.budget.available(), crate::control::EXTRA_CYCLE_COUNT_MAX);
    }

    #[test]
    fn request_mode_set_is_visible_immediately() {
        let mut ctx = ControllerContext::new(&SystemConfig::default());
        ctx.request_mode_set(Mode::FixedCycle);
        assert_eq!(ctx.settings.mode_set, Mode::FixedCycle);
        assert_eq!(ctx.pending_mode_set, Some(Mode::FixedCycle));
    }
}
