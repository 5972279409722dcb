//! Task watchdog for the event loop.
//!
//! The event loop subscribes itself to the ESP-IDF TWDT and feeds it once
//! per iteration.  A handler that blocks (stuck OpenThread lock, runaway
//! ADC read) resets the node instead of leaving the light energised.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

/// Loop stall that triggers a reset.
pub const LOOP_STALL_TIMEOUT_MS: u32 = 5_000;

pub struct LoopWatchdog {
    armed: bool,
    feeds: u32,
}

impl LoopWatchdog {
    /// Subscribe the calling task.  A failed subscription is logged and the
    /// node keeps running unguarded.
    #[cfg(target_os = "espidf")]
    pub fn subscribe(timeout_ms: u32) -> Self {
        let cfg = esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: plain config struct; ESP_ERR_INVALID_STATE means the TWDT
        // was never initialised by the bootloader config and is handled below.
        let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
        if ret != ESP_OK {
            let ret = unsafe { esp_task_wdt_init(&cfg) };
            if ret != ESP_OK {
                warn!("WDT: init failed (rc={}), loop unguarded", ret);
                return Self { armed: false, feeds: 0 };
            }
        }
        // SAFETY: null subscribes the current task.
        let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
        let armed = ret == ESP_OK;
        if armed {
            info!("WDT: event loop guarded ({}ms)", timeout_ms);
        } else {
            warn!("WDT: subscribe failed (rc={})", ret);
        }
        Self { armed, feeds: 0 }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn subscribe(timeout_ms: u32) -> Self {
        info!("WDT(sim): {}ms guard not enforced", timeout_ms);
        Self { armed: true, feeds: 0 }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Number of feeds since subscription (wrapping).
    pub fn feeds(&self) -> u32 {
        self.feeds
    }

    pub fn feed(&mut self) {
        if !self.armed {
            return;
        }
        self.feeds = self.feeds.wrapping_add(1);
        #[cfg(target_os = "espidf")]
        // SAFETY: the task is subscribed.
        unsafe {
            esp_task_wdt_reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_watchdog_counts_feeds() {
        let mut wdt = LoopWatchdog::subscribe(LOOP_STALL_TIMEOUT_MS);
        assert!(wdt.is_armed());
        wdt.feed();
        wdt.feed();
        assert_eq!(wdt.feeds(), 2);
    }
}
