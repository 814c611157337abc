//! Application core: domain orchestration, zero direct I/O.
//!
//! This module holds the business rules of the air-exchange unit: the
//! service that runs the ventilation controller each second, the device
//! settings it persists, and the commands and events crossing its
//! boundary.  All interaction with hardware, radios and storage happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod state;
