//! Control primitives used by the ventilation controller and the fan driver.

pub mod budget;
pub mod fan_curve;

pub use budget::{EXTRA_CYCLE_COUNT_MAX, ExtraCycleBudget};
