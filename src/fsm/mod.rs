//! Function-pointer ventilation controller.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │  StateTable                                       │
//! │  ┌────────────────┬───────────┬────────────────┐  │
//! │  │ Mode           │ on_enter  │ on_work        │  │
//! │  ├────────────────┼───────────┼────────────────┤  │
//! │  │ Off            │ fn(ctx)   │ fn(ctx)        │  │
//! │  │ Immission      │ fn(ctx)   │ fn(ctx)        │  │
//! │  │ Emission       │ fn(ctx)   │ fn(ctx)        │  │
//! │  │ FixedCycle     │ fn(ctx)   │ fn(ctx)        │  │
//! │  │ AutomaticCycle │ fn(ctx)   │ fn(ctx)        │  │
//! │  └────────────────┴───────────┴────────────────┘  │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! One tick is one second of controller time:
//!
//! 1. If the mode set differs from the mode state, stop the cycle and
//!    restart timers, zero both inversion counters, clear the mode flags,
//!    then run `on_enter` of the new mode.
//! 2. Poll the phase timers: cycle expiry runs `on_work`, the automatic
//!    restart re-arms the duration probe, the extra restart refills the
//!    extra-cycle budget.
//! 3. Regulate speed and environmental triggers; an admitted extra cycle
//!    runs `on_work` immediately.
//! 4. Publish `(direction, effective speed)` as the fan command.
//!
//! The controller never fails: every input it cannot use degrades to "no
//! state change".

pub mod context;
pub mod duration;
pub mod states;
pub mod timer;
pub mod triggers;

use context::{ControllerContext, FanCommand};
use log::{debug, info};

use crate::model::Mode;

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_work` actions.
pub type StateActionFn = fn(&mut ControllerContext);

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single mode.
/// Stored in a fixed-size array, no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: Mode,
    pub name: &'static str,
    pub on_enter: StateActionFn,
    pub on_work: StateActionFn,
}

// ---------------------------------------------------------------------------
// Controller engine
// ---------------------------------------------------------------------------

/// Owns the mode table and the index of the active mode.  The mutable
/// [`ControllerContext`] is threaded through every handler call.
pub struct Controller {
    /// Fixed-size table indexed by `Mode as usize`.
    table: [StateDescriptor; Mode::COUNT],
    current: usize,
}

impl Controller {
    pub fn new(table: [StateDescriptor; Mode::COUNT]) -> Self {
        Self {
            table,
            current: Mode::Off as usize,
        }
    }

    /// Bring the context to the OFF entry state.  Call once after
    /// construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut ControllerContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.mode.base = Mode::Off;
        (self.table[self.current].on_enter)(ctx);
        ctx.fan = FanCommand::default();
    }

    /// Advance the controller by one second and return the fan command.
    pub fn tick(&mut self, ctx: &mut ControllerContext) -> FanCommand {
        ctx.now = ctx.now.wrapping_add(1);

        let wanted = ctx.settings.mode_set;
        if wanted as usize != self.current {
            self.transition(wanted, ctx);
        }

        if ctx.timers.cycle.take_expired(ctx.now) {
            debug!("FSM: cycle timer expired in {}", self.table[self.current].name);
            (self.table[self.current].on_work)(ctx);
        }

        if ctx.timers.restart_automatic.take_expired(ctx.now) {
            debug!("FSM: scheduling a new duration probe");
            ctx.mode.calculating_duration = true;
            ctx.timers
                .restart_automatic
                .arm(ctx.now, ctx.timings.restart_automatic_cycle_secs);
        }

        if ctx.timers.restart_extra.take_expired(ctx.now) {
            debug!("FSM: extra-cycle budget replenished");
            ctx.budget.replenish_to_max();
        }

        if triggers::regulate(ctx) {
            (self.table[self.current].on_work)(ctx);
            if !ctx.timers.restart_extra.is_armed() {
                ctx.timers
                    .restart_extra
                    .arm(ctx.now, ctx.timings.restart_extra_cycle_secs);
            }
        }

        ctx.fan = FanCommand {
            direction: ctx.direction,
            speed: ctx.speed.effective(),
        };
        ctx.fan
    }

    /// The current mode state (without flags).
    pub fn current_mode(&self) -> Mode {
        self.table[self.current].id
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: Mode, ctx: &mut ControllerContext) {
        let next_idx = next as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        ctx.timers.cycle.stop();
        ctx.timers.restart_automatic.stop();
        ctx.probe_inversions = 0;
        ctx.extra_inversions = 0;
        ctx.mode.clear_flags();

        self.current = next_idx;
        ctx.mode.base = next;
        (self.table[self.current].on_enter)(ctx);
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(states::build_state_table())
    }
}
