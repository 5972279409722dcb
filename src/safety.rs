//! Actuator safety controller.
//!
//! Owns the on/off state of the light/pump output and guarantees it can
//! never stay on longer than `max_active`, whatever happens to the command
//! stream.
//!
//! ## Backstop lifecycle
//!
//! 1. `activate()` arms the single-shot `SafetyCutoff` timer **before**
//!    driving the output.  If the timer cannot be armed the output is
//!    never driven.
//! 2. `deactivate()` drives the output off and disarms the timer.
//! 3. When the timer fires, `on_timer_expired()` drives the output off
//!    regardless of the recorded state.
//!
//! Activate and deactivate are idempotent: repeating either is a no-op,
//! so at most one backstop is ever armed.

use core::time::Duration;

use log::{debug, error, info, warn};

use crate::app::ports::{IndicatorChannel, IndicatorPort, TimerHandle, TimerId, TimerPort};
use crate::error::TimerError;

/// Outcome of a `SafetyCutoff` expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The actuator was on and has been forced off.
    CutOff,
    /// The actuator was already off; the output was driven off again.
    AlreadyOff,
    /// The expiry belongs to an earlier arming and was ignored.
    Stale,
}

pub struct SafetyController {
    active: bool,
    armed: Option<TimerHandle>,
    max_active: Duration,
}

impl SafetyController {
    pub fn new(max_active: Duration) -> Self {
        Self {
            active: false,
            armed: None,
            max_active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Handle of the armed backstop, if any.
    pub fn armed(&self) -> Option<TimerHandle> {
        self.armed
    }

    pub fn max_active(&self) -> Duration {
        self.max_active
    }

    /// Turn the actuator on.  Returns `Ok(true)` if the state changed.
    pub fn activate(&mut self, hw: &mut (impl IndicatorPort + TimerPort)) -> Result<bool, TimerError> {
        if self.active {
            debug!("SAFETY: activate while active, ignored");
            return Ok(false);
        }

        let handle = match hw.start_one_shot(TimerId::SafetyCutoff, self.max_active) {
            Ok(h) => h,
            Err(e) => {
                error!("SAFETY: cannot arm cutoff timer ({e}), actuator stays off");
                return Err(e);
            }
        };

        self.armed = Some(handle);
        self.active = true;
        hw.set(IndicatorChannel::Light, true);
        info!(
            "SAFETY: actuator on, cutoff in {}s",
            self.max_active.as_secs()
        );
        Ok(true)
    }

    /// Turn the actuator off.  Returns `true` if the state changed.
    pub fn deactivate(&mut self, hw: &mut (impl IndicatorPort + TimerPort)) -> bool {
        if !self.active {
            debug!("SAFETY: deactivate while inactive, ignored");
            return false;
        }

        self.active = false;
        hw.set(IndicatorChannel::Light, false);
        if let Some(handle) = self.armed.take() {
            hw.stop(handle);
        }
        info!("SAFETY: actuator off");
        true
    }

    /// Flip the actuator.  Returns the resulting state.
    pub fn toggle(&mut self, hw: &mut (impl IndicatorPort + TimerPort)) -> Result<bool, TimerError> {
        if self.active {
            self.deactivate(hw);
        } else {
            self.activate(hw)?;
        }
        Ok(self.active)
    }

    /// Backstop entry point, called when a `SafetyCutoff` timer fires.
    pub fn on_timer_expired(&mut self, handle: TimerHandle, hw: &mut impl IndicatorPort) -> Expiry {
        if let Some(armed) = self.armed {
            if armed != handle {
                debug!(
                    "SAFETY: stale cutoff (gen {}, armed gen {}), ignored",
                    handle.generation, armed.generation
                );
                return Expiry::Stale;
            }
        }

        self.armed = None;
        hw.set(IndicatorChannel::Light, false);
        if self.active {
            self.active = false;
            warn!(
                "SAFETY: actuator forced off after {}s without deactivate",
                self.max_active.as_secs()
            );
            Expiry::CutOff
        } else {
            Expiry::AlreadyOff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Bench {
        light: bool,
        light_writes: Vec<bool>,
        armed: Vec<TimerHandle>,
        stopped: Vec<TimerHandle>,
        generation: u32,
        refuse_timers: bool,
    }

    impl IndicatorPort for Bench {
        fn set(&mut self, channel: IndicatorChannel, on: bool) {
            if channel == IndicatorChannel::Light {
                self.light = on;
                self.light_writes.push(on);
            }
        }

        fn is_on(&self, channel: IndicatorChannel) -> bool {
            channel == IndicatorChannel::Light && self.light
        }
    }

    impl TimerPort for Bench {
        fn start_one_shot(&mut self, id: TimerId, _after: Duration) -> Result<TimerHandle, TimerError> {
            if self.refuse_timers {
                return Err(TimerError::StartFailed(-1));
            }
            self.generation += 1;
            let h = TimerHandle {
                id,
                generation: self.generation,
            };
            self.armed.push(h);
            Ok(h)
        }

        fn start_periodic(&mut self, id: TimerId, period: Duration) -> Result<TimerHandle, TimerError> {
            self.start_one_shot(id, period)
        }

        fn stop(&mut self, handle: TimerHandle) {
            self.stopped.push(handle);
        }
    }

    fn ctl() -> SafetyController {
        SafetyController::new(Duration::from_secs(10))
    }

    #[test]
    fn double_activate_arms_once() {
        let mut c = ctl();
        let mut hw = Bench::default();
        assert_eq!(c.activate(&mut hw), Ok(true));
        assert_eq!(c.activate(&mut hw), Ok(false));
        assert_eq!(hw.armed.len(), 1);
        assert_eq!(hw.light_writes, vec![true]);
        assert!(c.is_active());
    }

    #[test]
    fn expiry_forces_off() {
        let mut c = ctl();
        let mut hw = Bench::default();
        c.activate(&mut hw).unwrap();
        let h = hw.armed[0];
        assert_eq!(c.on_timer_expired(h, &mut hw), Expiry::CutOff);
        assert!(!c.is_active());
        assert!(!hw.light);
        assert_eq!(c.armed(), None);
    }

    #[test]
    fn deactivate_disarms_backstop() {
        let mut c = ctl();
        let mut hw = Bench::default();
        c.activate(&mut hw).unwrap();
        let h = hw.armed[0];
        assert!(c.deactivate(&mut hw));
        assert_eq!(hw.stopped, vec![h]);
        assert_eq!(c.armed(), None);

        // A late expiry that raced the stop leaves the actuator off.
        assert_eq!(c.on_timer_expired(h, &mut hw), Expiry::AlreadyOff);
        assert!(!c.is_active());
        assert!(!hw.light);
    }

    #[test]
    fn double_deactivate_is_noop() {
        let mut c = ctl();
        let mut hw = Bench::default();
        assert!(!c.deactivate(&mut hw));
        assert!(hw.light_writes.is_empty());
        assert!(hw.stopped.is_empty());
    }

    #[test]
    fn stale_expiry_does_not_cut_new_activation() {
        let mut c = ctl();
        let mut hw = Bench::default();
        c.activate(&mut hw).unwrap();
        let first = hw.armed[0];
        c.deactivate(&mut hw);
        c.activate(&mut hw).unwrap();

        assert_eq!(c.on_timer_expired(first, &mut hw), Expiry::Stale);
        assert!(c.is_active());

        let second = hw.armed[1];
        assert_eq!(c.on_timer_expired(second, &mut hw), Expiry::CutOff);
        assert!(!c.is_active());
    }

    #[test]
    fn refuses_activation_without_backstop() {
        let mut c = ctl();
        let mut hw = Bench {
            refuse_timers: true,
            ..Default::default()
        };
        assert!(c.activate(&mut hw).is_err());
        assert!(!c.is_active());
        assert!(hw.light_writes.is_empty());
    }

    #[test]
    fn toggle_round_trip() {
        let mut c = ctl();
        let mut hw = Bench::default();
        assert_eq!(c.toggle(&mut hw), Ok(true));
        assert_eq!(c.toggle(&mut hw), Ok(false));
        assert_eq!(hw.light_writes, vec![true, false]);
    }
}
