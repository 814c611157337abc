//! Concrete mode handler functions and table builder.
//!
//! Each mode is defined by two plain `fn` pointers: `on_enter` runs once
//! when the mode set changes to it, `on_work` runs every time the cycle
//! timer expires.
//!
//! ```text
//!  OFF            stopped
//!  IMMISSION      IN  ──[1 h]──▶ mode set := FIXED_CYCLE
//!  EMISSION       OUT ──[1 h]──▶ mode set := FIXED_CYCLE
//!  FIXED_CYCLE    OUT ⇄ IN every 70 s
//!  AUTOMATIC      probe: OUT 120 s → IN 120 s → duration from ΔT
//!                 then OUT ⇄ IN every `duration` s
//!                 extra: OUT boost 10 min → 5 × 70 s flips → back
//! ```

use log::{debug, info};

use super::context::ControllerContext;
use super::duration::automatic_cycle_duration;
use super::StateDescriptor;
use crate::model::{Direction, Mode, Speed};

/// Probe phases after the first outbound run.
pub const CALCULATE_DURATION_INVERSIONS_MAX: u8 = 1;
/// Fixed-period flips that follow the boosted run of an extra cycle.
pub const EXTRA_CYCLE_INVERSIONS_MAX: u8 = 4;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static mode table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; Mode::COUNT] {
    [
        StateDescriptor {
            id: Mode::Off,
            name: "Off",
            on_enter: off_enter,
            on_work: off_work,
        },
        StateDescriptor {
            id: Mode::Immission,
            name: "Immission",
            on_enter: immission_enter,
            on_work: single_direction_work,
        },
        StateDescriptor {
            id: Mode::Emission,
            name: "Emission",
            on_enter: emission_enter,
            on_work: single_direction_work,
        },
        StateDescriptor {
            id: Mode::FixedCycle,
            name: "FixedCycle",
            on_enter: fixed_cycle_enter,
            on_work: fixed_cycle_work,
        },
        StateDescriptor {
            id: Mode::AutomaticCycle,
            name: "AutomaticCycle",
            on_enter: automatic_cycle_enter,
            on_work: automatic_cycle_work,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFF
// ═══════════════════════════════════════════════════════════════════════════

fn off_enter(ctx: &mut ControllerContext) {
    ctx.direction = Direction::None;
    ctx.speed.base = Speed::None;
    ctx.duration = 0;
}

fn off_work(_ctx: &mut ControllerContext) {}

// ═══════════════════════════════════════════════════════════════════════════
//  IMMISSION / EMISSION
// ═══════════════════════════════════════════════════════════════════════════

fn immission_enter(ctx: &mut ControllerContext) {
    ctx.direction = Direction::In;
    ctx.duration = 0;
    ctx.arm_cycle(ctx.timings.immission_emission_secs);
}

fn emission_enter(ctx: &mut ControllerContext) {
    ctx.direction = Direction::Out;
    ctx.duration = 0;
    ctx.arm_cycle(ctx.timings.immission_emission_secs);
}

fn single_direction_work(ctx: &mut ControllerContext) {
    info!("Controller: single-direction run elapsed, falling back to fixed cycle");
    ctx.request_mode_set(Mode::FixedCycle);
}

// ═══════════════════════════════════════════════════════════════════════════
//  FIXED_CYCLE
// ═══════════════════════════════════════════════════════════════════════════

fn fixed_cycle_enter(ctx: &mut ControllerContext) {
    ctx.direction = Direction::Out;
    ctx.duration = 0;
    ctx.arm_cycle(ctx.timings.fixed_cycle_secs);
}

fn fixed_cycle_work(ctx: &mut ControllerContext) {
    ctx.direction = ctx.direction.flipped();
    ctx.arm_cycle(ctx.timings.fixed_cycle_secs);
}

// ═══════════════════════════════════════════════════════════════════════════
//  AUTOMATIC_CYCLE
// ═══════════════════════════════════════════════════════════════════════════

fn automatic_cycle_enter(ctx: &mut ControllerContext) {
    ctx.mode.calculating_duration = true;
    ctx.duration = 0;
    ctx.timers
        .restart_automatic
        .arm(ctx.now, ctx.timings.restart_automatic_cycle_secs);
    automatic_cycle_work(ctx);
}

/// Flip, then advance whichever sub-phase is running.  When neither the
/// probe nor an extra cycle holds the cycle timer, plain cycling resumes
/// with the last computed duration.
pub(crate) fn automatic_cycle_work(ctx: &mut ControllerContext) {
    ctx.direction = ctx.direction.flipped();

    if ctx.mode.calculating_duration && ctx.extra_inversions == 0 {
        probe_step(ctx);
    }

    if ctx.mode.extra_cycle && ctx.probe_inversions == 0 {
        extra_cycle_step(ctx);
    }

    if ctx.probe_inversions == 0 && ctx.extra_inversions == 0 {
        ctx.arm_cycle(u32::from(ctx.duration));
    }
}

fn probe_step(ctx: &mut ControllerContext) {
    if ctx.probe_inversions == 0 {
        ctx.probe_inversions = 1;
        ctx.direction = Direction::Out;
        ctx.arm_cycle(ctx.timings.automatic_cycle_out_secs);
        debug!("Controller: duration probe started");
    } else if ctx.probe_inversions <= CALCULATE_DURATION_INVERSIONS_MAX {
        ctx.probe_inversions += 1;
        ctx.arm_cycle(ctx.timings.automatic_cycle_in_secs);
    } else {
        ctx.probe_inversions = 0;
        ctx.duration = automatic_cycle_duration(ctx.sensors.ntc_internal, ctx.sensors.ntc_external);
        ctx.mode.calculating_duration = false;
        info!(
            "Controller: cycle duration {} s (internal={} external={})",
            ctx.duration, ctx.sensors.ntc_internal, ctx.sensors.ntc_external
        );
    }
}

fn extra_cycle_step(ctx: &mut ControllerContext) {
    if ctx.extra_inversions == 0 {
        ctx.extra_inversions = 1;
        ctx.direction = Direction::Out;
        ctx.arm_cycle(ctx.timings.extra_cycle_boost_secs);
        info!("Controller: extra cycle started ({} used)", ctx.budget.used());
    } else if ctx.extra_inversions <= EXTRA_CYCLE_INVERSIONS_MAX {
        ctx.extra_inversions += 1;
        ctx.speed.force_boost = false;
        ctx.arm_cycle(ctx.timings.fixed_cycle_secs);
    } else {
        ctx.extra_inversions = 0;
        ctx.mode.extra_cycle = false;
        info!("Controller: extra cycle finished");
    }
}
