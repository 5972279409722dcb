//! Board drivers: peripheral bring-up, indicator outputs, button, timers
//! and the loop watchdog.

pub mod board;
pub mod button;
pub mod hw_init;
pub mod hw_timer;
pub mod led;
pub mod watchdog;
