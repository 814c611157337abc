//! Environmental triggers and per-tick speed regulation.
//!
//! ```text
//!   lux  ≤ thr − diff_low   ──(3 ticks)──▶  FORCE_NIGHT
//!   lux  > thr + diff_high  ──(3 ticks)──▶  release
//!   RH   > thr + diff_high  ──(3 ticks)──▶  extra cycle (budgeted)
//!   VOC  > thr + diff_high  ──(3 ticks)──▶  extra cycle (budgeted)
//! ```
//!
//! Light uses a symmetric debounce (count up to arm, count down to
//! release).  Humidity and VOC count up while over the threshold and drop
//! straight back to zero on any other reading.

use crate::config::TriggerThresholds;
use crate::model::{LUX_INVALID, Mode, RELATIVE_HUMIDITY_INVALID, Speed, ThresholdSetting, VOC_INVALID};

use super::context::ControllerContext;

/// Consecutive ticks a condition must hold before it arms.
pub const CONDITION_COUNT_MAX: u8 = 3;

/// Debounced state of one environmental condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Condition {
    pub armed: bool,
    pub count: u8,
}

impl Condition {
    pub fn clear(&mut self) {
        self.armed = false;
        self.count = 0;
    }

    fn step_up(&mut self) {
        if self.count < CONDITION_COUNT_MAX {
            self.count += 1;
        } else {
            self.armed = true;
        }
    }

    fn step_down(&mut self) {
        if self.count > 0 {
            self.count -= 1;
        } else {
            self.armed = false;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerState {
    pub lux: Condition,
    pub relative_humidity: Condition,
    pub voc: Condition,
}

impl TriggerState {
    pub fn clear_all(&mut self) {
        self.lux.clear();
        self.relative_humidity.clear();
        self.voc.clear();
    }

    /// RH or VOC has asked for an extra cycle.
    pub fn air_quality_armed(&self) -> bool {
        self.relative_humidity.armed || self.voc.armed
    }
}

/// Light condition.  Invalid readings leave it untouched.
pub fn evaluate_lux(
    cond: &mut Condition,
    reading: u16,
    setting: ThresholdSetting,
    table: &TriggerThresholds,
) {
    let Some(threshold) = table.level(setting) else {
        cond.clear();
        return;
    };
    if reading == LUX_INVALID {
        return;
    }
    let reading = u32::from(reading);
    if reading > u32::from(threshold) + u32::from(table.diff_high) {
        cond.step_down();
    }
    if i64::from(reading) <= i64::from(threshold) - i64::from(table.diff_low) {
        cond.step_up();
    }
}

/// Over-threshold condition shared by RH and VOC.  `invalid` readings are
/// treated as "not over".
pub fn evaluate_over(
    cond: &mut Condition,
    reading: u16,
    invalid: u16,
    setting: ThresholdSetting,
    table: &TriggerThresholds,
) {
    let Some(threshold) = table.level(setting) else {
        cond.clear();
        return;
    };
    if reading != invalid && u32::from(reading) > u32::from(threshold) + u32::from(table.diff_high) {
        cond.step_up();
    } else {
        cond.clear();
    }
}

/// Per-tick speed sync and trigger evaluation.
///
/// Returns `true` when an extra cycle was admitted this tick; the caller
/// then runs the AUTOMATIC_CYCLE work step and arms the budget restart.
pub fn regulate(ctx: &mut ControllerContext) -> bool {
    let settings = ctx.settings;

    if ctx.speed.base != settings.speed_set {
        ctx.speed.base = settings.speed_set;
        if ctx.mode.calculating_duration && ctx.speed.base == Speed::None {
            ctx.speed.force_night = true;
        }
    }

    if settings.mode_set != Mode::AutomaticCycle {
        ctx.triggers.clear_all();
        ctx.speed.force_night = false;
        ctx.speed.force_boost = false;
        return false;
    }

    if ctx.mode.extra_cycle || ctx.mode.calculating_duration {
        ctx.triggers.clear_all();
        return false;
    }

    let table = ctx.thresholds;
    evaluate_lux(&mut ctx.triggers.lux, ctx.sensors.lux, settings.lux_set, &table.lux);
    ctx.speed.force_night = ctx.triggers.lux.armed;

    evaluate_over(
        &mut ctx.triggers.relative_humidity,
        ctx.sensors.relative_humidity,
        RELATIVE_HUMIDITY_INVALID,
        settings.relative_humidity_set,
        &table.relative_humidity,
    );
    evaluate_over(
        &mut ctx.triggers.voc,
        ctx.sensors.voc,
        VOC_INVALID,
        settings.voc_set,
        &table.voc,
    );

    if !ctx.triggers.air_quality_armed() {
        ctx.speed.force_boost = false;
        return false;
    }

    // extra_cycle is known clear here; a refused budget retries next tick
    if !ctx.budget.try_acquire() {
        return false;
    }

    ctx.mode.extra_cycle = true;
    if ctx.speed.base > Speed::Night {
        ctx.speed.force_boost = true;
    }
    ctx.triggers.relative_humidity.clear();
    ctx.triggers.voc.clear();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SystemConfig, ThresholdTable};

    fn make_ctx() -> ControllerContext {
        let mut ctx = ControllerContext::new(&SystemConfig::default());
        ctx.settings.mode_set = Mode::AutomaticCycle;
        ctx.settings.speed_set = Speed::Medium;
        ctx.mode.base = Mode::AutomaticCycle;
        ctx
    }

    #[test]
    fn lux_arms_after_debounce_and_releases_symmetrically() {
        let table = ThresholdTable::default().lux;
        let mut c = Condition::default();
        // MEDIUM = 30, diff_low 5: 25 or less counts as dark
        for _ in 0..CONDITION_COUNT_MAX {
            evaluate_lux(&mut c, 25, ThresholdSetting::Medium, &table);
            assert!(!c.armed);
        }
        evaluate_lux(&mut c, 25, ThresholdSetting::Medium, &table);
        assert!(c.armed);

        // inside the band: no change
        evaluate_lux(&mut c, 35, ThresholdSetting::Medium, &table);
        assert!(c.armed);
        assert_eq!(c.count, CONDITION_COUNT_MAX);

        // 41 > 30 + 10: count down, then release
        for _ in 0..CONDITION_COUNT_MAX {
            evaluate_lux(&mut c, 41, ThresholdSetting::Medium, &table);
            assert!(c.armed);
        }
        evaluate_lux(&mut c, 41, ThresholdSetting::Medium, &table);
        assert!(!c.armed);
    }

    #[test]
    fn lux_invalid_reading_is_ignored() {
        let table = ThresholdTable::default().lux;
        let mut c = Condition {
            armed: true,
            count: 2,
        };
        evaluate_lux(&mut c, LUX_INVALID, ThresholdSetting::Low, &table);
        assert_eq!(c, Condition { armed: true, count: 2 });
    }

    #[test]
    fn lux_low_setting_cannot_underflow() {
        let mut table = ThresholdTable::default().lux;
        table.diff_low = 50;
        let mut c = Condition::default();
        evaluate_lux(&mut c, 0, ThresholdSetting::Low, &table);
        assert_eq!(c.count, 0);
    }

    #[test]
    fn over_condition_resets_on_any_normal_reading() {
        let table = ThresholdTable::default().relative_humidity;
        let mut c = Condition::default();
        // MEDIUM = 700 + 20
        evaluate_over(&mut c, 721, RELATIVE_HUMIDITY_INVALID, ThresholdSetting::Medium, &table);
        evaluate_over(&mut c, 721, RELATIVE_HUMIDITY_INVALID, ThresholdSetting::Medium, &table);
        assert_eq!(c.count, 2);
        evaluate_over(&mut c, 720, RELATIVE_HUMIDITY_INVALID, ThresholdSetting::Medium, &table);
        assert_eq!(c, Condition::default());
    }

    #[test]
    fn over_condition_ignores_sentinel() {
        let table = ThresholdTable::default().voc;
        let mut c = Condition::default();
        for _ in 0..10 {
            evaluate_over(&mut c, VOC_INVALID, VOC_INVALID, ThresholdSetting::Low, &table);
        }
        assert!(!c.armed);
    }

    #[test]
    fn not_configured_clears() {
        let table = ThresholdTable::default().voc;
        let mut c = Condition {
            armed: true,
            count: 3,
        };
        evaluate_over(&mut c, 999, VOC_INVALID, ThresholdSetting::NotConfigured, &table);
        assert_eq!(c, Condition::default());
    }

    #[test]
    fn speed_sync_keeps_overrides() {
        let mut ctx = make_ctx();
        ctx.speed.force_boost = true;
        ctx.mode.extra_cycle = true;
        regulate(&mut ctx);
        assert_eq!(ctx.speed.base, Speed::Medium);
        assert!(ctx.speed.force_boost);
    }

    #[test]
    fn probe_with_speed_none_forces_night() {
        let mut ctx = make_ctx();
        ctx.settings.speed_set = Speed::None;
        ctx.speed.base = Speed::Low;
        ctx.mode.calculating_duration = true;
        regulate(&mut ctx);
        assert!(ctx.speed.force_night);
        assert_eq!(ctx.speed.effective(), Speed::Night);
    }

    #[test]
    fn humid_air_admits_extra_cycle_with_boost() {
        let mut ctx = make_ctx();
        ctx.settings.relative_humidity_set = ThresholdSetting::Low;
        ctx.sensors.relative_humidity = 900;
        let mut admitted = false;
        for _ in 0..=CONDITION_COUNT_MAX {
            admitted = regulate(&mut ctx);
        }
        assert!(admitted);
        assert!(ctx.mode.extra_cycle);
        assert!(ctx.speed.force_boost);
        assert_eq!(ctx.triggers.relative_humidity, Condition::default());
        assert_eq!(ctx.budget.used(), 1);
    }

    #[test]
    fn night_speed_gets_no_boost() {
        let mut ctx = make_ctx();
        ctx.settings.speed_set = Speed::Night;
        ctx.settings.voc_set = ThresholdSetting::High;
        ctx.sensors.voc = 400;
        for _ in 0..=CONDITION_COUNT_MAX {
            regulate(&mut ctx);
        }
        assert!(ctx.mode.extra_cycle);
        assert!(!ctx.speed.force_boost);
    }

    #[test]
    fn exhausted_budget_keeps_condition_armed() {
        let mut ctx = make_ctx();
        while ctx.budget.try_acquire() {}
        ctx.settings.voc_set = ThresholdSetting::Low;
        ctx.sensors.voc = 400;
        for _ in 0..10 {
            assert!(!regulate(&mut ctx));
        }
        assert!(ctx.triggers.voc.armed);
        assert!(!ctx.mode.extra_cycle);
    }

    #[test]
    fn leaving_automatic_clears_everything() {
        let mut ctx = make_ctx();
        ctx.triggers.lux = Condition {
            armed: true,
            count: 3,
        };
        ctx.speed.force_night = true;
        ctx.speed.force_boost = true;
        ctx.settings.mode_set = Mode::FixedCycle;
        regulate(&mut ctx);
        assert_eq!(ctx.triggers, TriggerState::default());
        assert!(!ctx.speed.force_night && !ctx.speed.force_boost);
    }

    #[test]
    fn no_air_quality_request_drops_boost() {
        let mut ctx = make_ctx();
        ctx.speed.force_boost = true;
        regulate(&mut ctx);
        assert!(!ctx.speed.force_boost);
    }
}
