//! Extra-cycle budget
//!
//! Bounded counter limiting how many humidity/VOC extra cycles may start
//! between two replenishments.

/// Admissions available before the budget must be replenished.
pub const EXTRA_CYCLE_COUNT_MAX: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraCycleBudget {
    available: u8,
    max: u8,
}

impl ExtraCycleBudget {
    /// A full budget of `max` admissions.
    pub fn new(max: u8) -> Self {
        Self {
            available: max,
            max,
        }
    }

    /// Take one admission.  Returns `false` without side effects when the
    /// budget is exhausted.
    pub fn try_acquire(&mut self) -> bool {
        if self.available == 0 {
            return false;
        }
        self.available -= 1;
        true
    }

    /// Refill to `max`.  Idempotent.
    pub fn replenish_to_max(&mut self) {
        self.available = self.max;
    }

    pub fn available(&self) -> u8 {
        self.available
    }

    /// Admissions consumed since the last replenish.
    pub fn used(&self) -> u8 {
        self.max - self.available
    }
}

impl Default for ExtraCycleBudget {
    fn default() -> Self {
        Self::new(EXTRA_CYCLE_COUNT_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full() {
        let b = ExtraCycleBudget::default();
        assert_eq!(b.available(), EXTRA_CYCLE_COUNT_MAX);
        assert_eq!(b.used(), 0);
    }

    #[test]
    fn exhausts_after_max_admissions() {
        let mut b = ExtraCycleBudget::default();
        assert!(b.try_acquire());
        assert!(b.try_acquire());
        assert!(b.try_acquire());
        assert!(!b.try_acquire());
        assert_eq!(b.available(), 0);
    }

    #[test]
    fn replenish_is_idempotent() {
        let mut b = ExtraCycleBudget::default();
        b.try_acquire();
        b.replenish_to_max();
        b.replenish_to_max();
        assert_eq!(b.available(), EXTRA_CYCLE_COUNT_MAX);
    }

    #[test]
    fn zero_budget_never_admits() {
        let mut b = ExtraCycleBudget::new(0);
        assert!(!b.try_acquire());
        b.replenish_to_max();
        assert!(!b.try_acquire());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// `true` = try_acquire, `false` = replenish.
        #[test]
        fn stays_within_bounds(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
            let mut b = ExtraCycleBudget::default();
            let mut admitted_since_refill = 0u8;
            for op in ops {
                if op {
                    if b.try_acquire() {
                        admitted_since_refill += 1;
                    }
                } else {
                    b.replenish_to_max();
                    admitted_since_refill = 0;
                }
                prop_assert!(b.available() <= EXTRA_CYCLE_COUNT_MAX);
                prop_assert!(admitted_since_refill <= EXTRA_CYCLE_COUNT_MAX);
                prop_assert_eq!(b.used(), admitted_since_refill);
            }
        }
    }
}
