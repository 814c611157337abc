//! System configuration parameters
//!
//! All tunable parameters for the air-exchange unit: phase timings of the
//! ventilation controller, environmental trigger thresholds, the filter
//! usage monitor and the TCP link.  The blob is persisted through
//! [`ConfigPort`](crate::app::ports::ConfigPort); per-device settings that a
//! remote peer can change (mode, speed, thresholds, credentials) live in
//! [`DeviceState`](crate::app::state::DeviceState) instead.

use serde::{Deserialize, Serialize};

use crate::model::ThresholdSetting;

// ───────────────────────────────────────────────────────────────
// Controller phase timings
// ───────────────────────────────────────────────────────────────

/// Phase durations of the ventilation controller, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlTimings {
    /// Single-direction run before IMMISSION/EMISSION falls back to FIXED_CYCLE.
    pub immission_emission_secs: u32,
    /// Half-period of FIXED_CYCLE and of the extra-cycle tail.
    pub fixed_cycle_secs: u32,
    /// Outbound half of the duration probe.
    pub automatic_cycle_out_secs: u32,
    /// Inbound halves of the duration probe.
    pub automatic_cycle_in_secs: u32,
    /// Period after which AUTOMATIC_CYCLE re-measures its duration.
    pub restart_automatic_cycle_secs: u32,
    /// Boosted outbound run that opens an extra cycle.
    pub extra_cycle_boost_secs: u32,
    /// Period after which the extra-cycle budget is replenished.
    pub restart_extra_cycle_secs: u32,
}

impl Default for ControlTimings {
    fn default() -> Self {
        Self {
            immission_emission_secs: 3600,
            fixed_cycle_secs: 70,
            automatic_cycle_out_secs: 120,
            automatic_cycle_in_secs: 120,
            restart_automatic_cycle_secs: 14_400,
            extra_cycle_boost_secs: 600,
            restart_extra_cycle_secs: 10_800,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Environmental trigger thresholds
// ───────────────────────────────────────────────────────────────

/// Threshold levels and hysteresis band for one environmental trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerThresholds {
    /// Thresholds for the LOW, MEDIUM and HIGH settings.
    pub levels: [u16; 3],
    /// Margin above the threshold that counts as "over".
    pub diff_high: u16,
    /// Margin below the threshold that counts as "under" (lux only).
    pub diff_low: u16,
}

impl TriggerThresholds {
    /// Numeric threshold for a setting, `None` when not configured.
    pub fn level(&self, setting: ThresholdSetting) -> Option<u16> {
        match setting {
            ThresholdSetting::NotConfigured => None,
            ThresholdSetting::Low => Some(self.levels[0]),
            ThresholdSetting::Medium => Some(self.levels[1]),
            ThresholdSetting::High => Some(self.levels[2]),
        }
    }
}

/// Trigger thresholds for relative humidity (tenths of %), luminosity
/// (lux) and VOC index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub relative_humidity: TriggerThresholds,
    pub lux: TriggerThresholds,
    pub voc: TriggerThresholds,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            relative_humidity: TriggerThresholds {
                levels: [600, 700, 800],
                diff_high: 20,
                diff_low: 0,
            },
            lux: TriggerThresholds {
                levels: [10, 30, 60],
                diff_high: 10,
                diff_low: 5,
            },
            voc: TriggerThresholds {
                levels: [150, 250, 350],
                diff_high: 20,
                diff_low: 0,
            },
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Filter usage monitor
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Accumulated weighted usage (tenths of a MEDIUM-second) that raises
    /// the filter warning.  Default is 4380 h at MEDIUM.
    pub threshold: u64,
    /// Minimum spacing between two persists of the usage counter.
    pub persist_interval_secs: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: 157_680_000,
            persist_interval_secs: 3600,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// TCP link
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Delay before the client retries a failed or dropped connection.
    pub reconnect_delay_secs: u32,
    /// Inbound frames accepted per second per connection.
    pub frames_per_sec: u64,
    /// Burst allowance of the inbound frame gate.
    pub frame_burst: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: 10,
            frames_per_sec: 10,
            frame_burst: 10,
        }
    }
}

/// Period of the control tick.  Every controller, filter, statistics and
/// link deadline counts one tick as one second, so this is not configurable.
pub const CONTROL_TICK_MS: u32 = 1000;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub timings: ControlTimings,
    pub thresholds: ThresholdTable,
    pub filter: FilterConfig,
    pub link: LinkConfig,
    /// Telemetry snapshot period (seconds).
    pub telemetry_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timings: ControlTimings::default(),
            thresholds: ThresholdTable::default(),
            filter: FilterConfig::default(),
            link: LinkConfig::default(),
            telemetry_interval_secs: 60,
        }
    }
}
