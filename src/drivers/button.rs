//! ISR-debounced provisioning button.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up.  The GPIO fires on the
//! falling edge; the ISR records the raw timestamp into an atomic, and
//! [`ButtonDriver::poll`] (called from the main loop) confirms the press
//! after the debounce interval.
//!
//! ```text
//!  IDLE ──[edge]──▶ DEBOUNCE ──[50 ms, still low]──▶ HELD ──[released]──▶ IDLE
//!                      │                               (press reported)
//!                      └──[50 ms, high again]──▶ IDLE  (bounce)
//! ```

use core::sync::atomic::{AtomicU32, Ordering};
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::AtomicBool;

use log::debug;

const DEBOUNCE_MS: u32 = 50;

/// Raw ISR timestamp (milliseconds since boot, truncated to u32).
static BUTTON_ISR_TIMESTAMP: AtomicU32 = AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
static SIM_BUTTON_DOWN: AtomicBool = AtomicBool::new(false);

/// Simulated button level for host runs and tests.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_button_down(down: bool) {
    SIM_BUTTON_DOWN.store(down, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Idle,
    Debounce { since_ms: u32 },
    Held,
}

pub struct ButtonDriver {
    state: PressState,
    last_isr_ms: u32,
}

impl ButtonDriver {
    pub fn new() -> Self {
        Self {
            state: PressState::Idle,
            last_isr_ms: BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire),
        }
    }

    /// Advance the debounce machine.  Returns `true` once per confirmed
    /// press.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        let isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);
        let new_edge = isr_ms != self.last_isr_ms;

        match self.state {
            PressState::Idle => {
                if new_edge {
                    self.last_isr_ms = isr_ms;
                    self.state = PressState::Debounce { since_ms: now_ms };
                }
                false
            }
            PressState::Debounce { since_ms } => {
                if now_ms.wrapping_sub(since_ms) < DEBOUNCE_MS {
                    return false;
                }
                if Self::is_pressed_hw() {
                    self.state = PressState::Held;
                    debug!("BUTTON: press");
                    true
                } else {
                    self.state = PressState::Idle;
                    false
                }
            }
            PressState::Held => {
                if !Self::is_pressed_hw() {
                    // Edges while held are contact bounce.
                    self.last_isr_ms = isr_ms;
                    self.state = PressState::Idle;
                }
                false
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn is_pressed_hw() -> bool {
        !crate::drivers::hw_init::gpio_read(crate::pins::BUTTON_GPIO)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_pressed_hw() -> bool {
        SIM_BUTTON_DOWN.load(Ordering::Relaxed)
    }
}

impl Default for ButtonDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// ISR handler for the button's falling edge.  Lock-free.
pub fn button_isr_handler(now_ms: u32) {
    BUTTON_ISR_TIMESTAMP.store(now_ms, Ordering::Release);
}
