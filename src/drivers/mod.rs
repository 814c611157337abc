//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod fan;
pub mod hw_init;
pub mod hw_timer;
pub mod ir_nec;
pub mod task_pin;
pub mod watchdog;
