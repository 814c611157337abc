//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, BLE notification, ...).

use crate::model::{Direction, Mode, Speed};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The controller moved to another mode.
    ModeChanged { from: Mode, to: Mode },

    /// A duration probe finished.
    CycleDurationComputed(u16),

    /// An extra cycle was admitted; `remaining` budget after admission.
    ExtraCycleStarted { remaining: u8 },

    /// Filter usage crossed the replacement threshold.
    FilterWarning { usage: u64 },

    /// The filter counter was reset.
    FilterCleared,

    /// Server link established / lost.
    LinkUp,
    LinkDown,

    /// The application service has started (carries the mode set).
    Started(Mode),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryData {
    pub mode: Mode,
    /// Mode state in wire form (base plus flag bits).
    pub mode_wire: u8,
    pub speed: Speed,
    pub direction: Direction,
    pub duration: u16,
    pub temperature: i16,
    pub relative_humidity: u16,
    pub voc: u16,
    pub lux: u16,
    pub ntc_internal: i16,
    pub ntc_external: i16,
    pub filter_usage: u64,
    pub extra_cycles_available: u8,
}
