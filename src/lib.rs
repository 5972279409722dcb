//! Mesh node firmware library.
//!
//! Exposes the domain modules for integration testing and fuzzing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! inside each module, with a simulated counterpart for host builds.

#![deny(unused_must_use)]

pub mod app;
pub mod coap;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod provisioning;
pub mod registration;
pub mod safety;

pub mod pins;

pub mod adapters;
pub mod drivers;
pub mod sensors;
