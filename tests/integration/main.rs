//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below maps to a file that drives the node service against
//! the simulated board and OpenThread adapter.  All tests run on the host
//! with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod mock_hw;
mod registration_tests;
mod service_tests;
