//! AirExchange firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod filter;
pub mod fsm;
pub mod model;
pub mod protocol;
pub mod router;
pub mod stats;
pub mod ux;

pub mod pins;

// Hardware-facing modules; platform code is cfg-gated inside, every
// adapter has a host simulation backend.
pub mod adapters;
pub mod drivers;
pub mod sensors;
