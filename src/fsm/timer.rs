//! One-shot phase deadlines driven by the control tick.
//!
//! A [`PhaseTimer`] is the simulated-time replacement for a software timer:
//! it records the second at which it should fire and is polled once per
//! tick.  Firing disarms it; the handler re-arms it if the phase continues.

/// A one-shot deadline in controller seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimer {
    deadline: Option<u64>,
}

impl PhaseTimer {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm (or re-arm) the timer to fire `secs` seconds after `now`.
    pub fn arm(&mut self, now: u64, secs: u32) {
        self.deadline = Some(now.saturating_add(u64::from(secs)));
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Seconds until the deadline, `None` when idle.
    pub fn remaining(&self, now: u64) -> Option<u64> {
        self.deadline.map(|d| d.saturating_sub(now))
    }

    /// Returns `true` exactly once when the deadline has been reached,
    /// disarming the timer.
    pub fn take_expired(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// The three deadlines owned by the ventilation controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimers {
    /// Drives direction flips and probe/extra-cycle phases.
    pub cycle: PhaseTimer,
    /// Forces a new duration probe while AUTOMATIC_CYCLE runs.
    pub restart_automatic: PhaseTimer,
    /// Replenishes the extra-cycle budget.
    pub restart_extra: PhaseTimer,
}
