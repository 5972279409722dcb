//! Provisioning window.
//!
//! A button press opens a short window during which the `provisioning`
//! resource answers with the node's mesh-local EID, so a commissioning
//! tool on the mesh can learn the address of the node the user is holding.
//! The provisioning LED blinks while the window is open.
//!
//! The window closes when:
//! - the `ProvisioningWindow` timer fires,
//! - an address has been served (one answer per window),
//! - the node leaves the attached state.

use core::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::{IndicatorChannel, IndicatorPort, TimerHandle, TimerId, TimerPort};
use crate::error::TimerError;

/// Result of a provisioning timer expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTick {
    Blinked,
    Closed,
    /// Belongs to an earlier opening, or the window is already closed.
    Stale,
}

pub struct ProvisioningWindow {
    duration: Duration,
    blink_period: Duration,
    window: Option<TimerHandle>,
    blink: Option<TimerHandle>,
    led_on: bool,
}

impl ProvisioningWindow {
    pub fn new(duration: Duration, blink_period: Duration) -> Self {
        Self {
            duration,
            blink_period,
            window: None,
            blink: None,
            led_on: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.window.is_some()
    }

    /// Open the window, or restart its countdown if already open.
    pub fn open(&mut self, hw: &mut (impl IndicatorPort + TimerPort)) -> Result<(), TimerError> {
        let window = match hw.start_one_shot(TimerId::ProvisioningWindow, self.duration) {
            Ok(h) => h,
            Err(e) => {
                warn!("PROV: cannot arm window timer ({e})");
                return Err(e);
            }
        };
        let reopened = self.window.replace(window).is_some();

        if self.blink.is_none() {
            match hw.start_periodic(TimerId::ProvisioningBlink, self.blink_period) {
                Ok(h) => self.blink = Some(h),
                // The window still works without the blink.
                Err(e) => warn!("PROV: cannot arm blink timer ({e})"),
            }
        }

        self.led_on = true;
        hw.set(IndicatorChannel::Provisioning, true);
        if reopened {
            info!("PROV: window restarted ({}s)", self.duration.as_secs());
        } else {
            info!("PROV: window open ({}s)", self.duration.as_secs());
        }
        Ok(())
    }

    /// Close the window.  Returns `true` if it was open.
    pub fn close(&mut self, hw: &mut (impl IndicatorPort + TimerPort)) -> bool {
        let Some(window) = self.window.take() else {
            return false;
        };
        hw.stop(window);
        if let Some(blink) = self.blink.take() {
            hw.stop(blink);
        }
        self.led_on = false;
        hw.set(IndicatorChannel::Provisioning, false);
        info!("PROV: window closed");
        true
    }

    /// Handle a `ProvisioningWindow` or `ProvisioningBlink` expiry.
    pub fn on_timer(
        &mut self,
        handle: TimerHandle,
        hw: &mut (impl IndicatorPort + TimerPort),
    ) -> WindowTick {
        match handle.id {
            TimerId::ProvisioningBlink if self.blink == Some(handle) => {
                self.led_on = !self.led_on;
                hw.set(IndicatorChannel::Provisioning, self.led_on);
                WindowTick::Blinked
            }
            TimerId::ProvisioningWindow if self.window == Some(handle) => {
                info!("PROV: window expired");
                self.close(hw);
                WindowTick::Closed
            }
            _ => {
                debug!("PROV: stale {} expiry ignored", handle.id.name());
                WindowTick::Stale
            }
        }
    }

    /// Hand out `address` if the window is open, closing it.
    ///
    /// With the window open but no address known yet, nothing is served
    /// and the window stays open.
    pub fn claim(
        &mut self,
        address: Option<[u8; 16]>,
        hw: &mut (impl IndicatorPort + TimerPort),
    ) -> Option<[u8; 16]> {
        if !self.is_open() {
            return None;
        }
        let Some(address) = address else {
            warn!("PROV: no mesh-local address yet");
            return None;
        };
        self.close(hw);
        Some(address)
    }
}
