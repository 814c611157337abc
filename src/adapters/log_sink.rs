//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::model::TEMPERATURE_SCALE;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | mode={:?} (0x{:02X}) | fan={:?}/{:?} | cycle={}s | \
                     T={}.{:02}\u{00b0}C RH={}.{}% VOC={} lux={} | \
                     ntc_in={} ntc_out={} | filter={} extra={}",
                    t.mode,
                    t.mode_wire,
                    t.direction,
                    t.speed,
                    t.duration,
                    i32::from(t.temperature) / TEMPERATURE_SCALE,
                    (i32::from(t.temperature) % TEMPERATURE_SCALE).abs(),
                    t.relative_humidity / 10,
                    t.relative_humidity % 10,
                    t.voc,
                    t.lux,
                    t.ntc_internal,
                    t.ntc_external,
                    t.filter_usage,
                    t.extra_cycles_available,
                );
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE | {:?} -> {:?}", from, to);
            }
            AppEvent::CycleDurationComputed(secs) => {
                info!("CYCLE | duration={}s", secs);
            }
            AppEvent::ExtraCycleStarted { remaining } => {
                info!("CYCLE | extra cycle started, remaining={}", remaining);
            }
            AppEvent::FilterWarning { usage } => {
                warn!("FILTER | replacement due, usage={}", usage);
            }
            AppEvent::FilterCleared => {
                info!("FILTER | counter reset");
            }
            AppEvent::LinkUp => {
                info!("LINK | up");
            }
            AppEvent::LinkDown => {
                info!("LINK | down");
            }
            AppEvent::Started(mode) => {
                info!("START | mode_set={:?}", mode);
            }
        }
    }
}
