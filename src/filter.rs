//! Filter usage monitor
//!
//! Accumulates fan run time weighted by speed (faster air wears the filter
//! faster) and raises the filter warning once the configured budget is
//! spent.  The counter survives reboots through the `filter` storage key,
//! written at most once per `persist_interval_secs` to spare the flash.

use crate::config::FilterConfig;
use crate::model::Speed;

/// Wear per second at each speed, in tenths of a MEDIUM-second.
pub fn wear_weight(speed: Speed) -> u64 {
    match speed {
        Speed::None => 0,
        Speed::Night => 2,
        Speed::Low => 6,
        Speed::Medium => 10,
        Speed::High => 14,
        Speed::Boost => 15,
    }
}

/// What one accumulation step asks the owner to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStep {
    /// The threshold was crossed on this step.
    pub warning_raised: bool,
    /// The counter is due to be persisted.
    pub persist: bool,
}

pub struct FilterMonitor {
    usage: u64,
    config: FilterConfig,
    secs_since_persist: u32,
    dirty: bool,
}

impl FilterMonitor {
    pub fn new(config: FilterConfig, usage: u64) -> Self {
        Self {
            usage,
            config,
            secs_since_persist: 0,
            dirty: false,
        }
    }

    pub fn usage(&self) -> u64 {
        self.usage
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage >= self.config.threshold
    }

    /// Account one second of running at `speed`.
    pub fn accumulate(&mut self, speed: Speed) -> FilterStep {
        let was_exhausted = self.is_exhausted();
        let weight = wear_weight(speed);
        if weight > 0 {
            self.usage = self.usage.saturating_add(weight);
            self.dirty = true;
        }

        self.secs_since_persist = self.secs_since_persist.saturating_add(1);
        let persist = self.dirty && self.secs_since_persist >= self.config.persist_interval_secs;
        if persist {
            self.secs_since_persist = 0;
            self.dirty = false;
        }

        FilterStep {
            warning_raised: !was_exhausted && self.is_exhausted(),
            persist,
        }
    }

    pub fn set_config(&mut self, config: FilterConfig) {
        self.config = config;
    }

    /// Filter replaced: start over.
    pub fn reset(&mut self) {
        self.usage = 0;
        self.secs_since_persist = 0;
        self.dirty = false;
    }
}
