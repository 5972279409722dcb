//! Timer service behind [`TimerPort`].
//!
//! One timer per [`TimerId`], created at boot.  Every start bumps the id's
//! generation; the expiry carries the generation the timer was armed with,
//! so the domain can tell a stale expiry from the live one.
//!
//! - [`EspTimerService`]: `esp_timer` in task-dispatch mode.  The callback
//!   runs in the esp_timer task (not ISR) and pushes
//!   [`NodeEvent::TimerExpired`] onto the event queue.
//! - [`SimTimerService`]: virtual clock for host runs and tests; the
//!   caller advances time and receives the expired handles.

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use crate::app::ports::{TimerHandle, TimerId, TimerPort};
use crate::error::TimerError;

/// Generation each timer was armed with, read by the expiry callback.
///
/// `0` marks a slot that is not armed (stopped, or being re-armed); an
/// expiry that races with a stop or re-arm reads `0` and is dropped
/// instead of being tagged with the new generation.
pub struct ArmedGenerations([AtomicU32; TimerId::COUNT]);

impl ArmedGenerations {
    pub const fn new() -> Self {
        Self([const { AtomicU32::new(0) }; TimerId::COUNT])
    }

    /// Clear the slot before its timer is stopped or restarted.
    pub fn disarm(&self, id: TimerId) {
        self.0[id.index()].store(0, Ordering::Release);
    }

    /// Publish the generation of a timer that has just been started.
    pub fn arm(&self, id: TimerId, generation: u32) {
        self.0[id.index()].store(generation, Ordering::Release);
    }

    /// Handle to report for an expiry of `id`, if the slot is armed.
    pub fn expiry(&self, id: TimerId) -> Option<TimerHandle> {
        match self.0[id.index()].load(Ordering::Acquire) {
            0 => None,
            generation => Some(TimerHandle { id, generation }),
        }
    }

    /// Whether `handle` is the live arming of its slot.
    pub fn is_current(&self, handle: TimerHandle) -> bool {
        self.0[handle.id.index()].load(Ordering::Acquire) == handle.generation
    }
}

impl Default for ArmedGenerations {
    fn default() -> Self {
        Self::new()
    }
}

/// Next generation after `current`, skipping the unarmed marker.
fn next_generation(current: u32) -> u32 {
    match current.wrapping_add(1) {
        0 => 1,
        g => g,
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspTimerService;

#[cfg(target_os = "espidf")]
mod esp {
    use core::ffi::{c_void, CStr};

    use esp_idf_svc::sys::*;
    use log::{debug, error, info};

    use super::*;
    use crate::events::{push_event, NodeEvent};

    static ARMED: ArmedGenerations = ArmedGenerations::new();

    fn c_name(id: TimerId) -> &'static CStr {
        match id {
            TimerId::SafetyCutoff => c"safety",
            TimerId::ProvisioningWindow => c"prov_win",
            TimerId::ProvisioningBlink => c"prov_blink",
            TimerId::SensorRefresh => c"sensor",
            TimerId::RegistrationRetry => c"srp_retry",
        }
    }

    unsafe extern "C" fn timer_cb(arg: *mut c_void) {
        let Some(id) = TimerId::from_index(arg as usize) else {
            return;
        };
        if let Some(handle) = ARMED.expiry(id) {
            push_event(NodeEvent::TimerExpired(handle));
        }
    }

    pub struct EspTimerService {
        timers: [esp_timer_handle_t; TimerId::COUNT],
        generations: [u32; TimerId::COUNT],
    }

    impl EspTimerService {
        /// Create (but do not start) one esp_timer per [`TimerId`].
        pub fn new() -> Result<Self, TimerError> {
            let mut timers = [core::ptr::null_mut(); TimerId::COUNT];
            for id in TimerId::ALL {
                let args = esp_timer_create_args_t {
                    callback: Some(timer_cb),
                    arg: id.index() as *mut c_void,
                    dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                    name: c_name(id).as_ptr(),
                    skip_unhandled_events: true,
                };
                // SAFETY: args outlives the call; the name is 'static.
                let ret = unsafe { esp_timer_create(&args, &mut timers[id.index()]) };
                if ret != ESP_OK {
                    error!("hw_timer: create {} failed (rc={})", id.name(), ret);
                    return Err(TimerError::StartFailed(ret));
                }
            }
            info!("hw_timer: {} timers created", TimerId::COUNT);
            Ok(Self {
                timers,
                generations: [0; TimerId::COUNT],
            })
        }

        fn start(&mut self, id: TimerId, period: Duration, periodic: bool) -> Result<TimerHandle, TimerError> {
            let timer = self.timers[id.index()];
            if timer.is_null() {
                return Err(TimerError::NotCreated);
            }
            let micros = u64::try_from(period.as_micros()).unwrap_or(u64::MAX);
            ARMED.disarm(id);
            // SAFETY: timer is a live handle from esp_timer_create.  Stopping
            // an idle timer returns ESP_ERR_INVALID_STATE, which is fine.
            unsafe { esp_timer_stop(timer) };
            let generation = next_generation(self.generations[id.index()]);
            self.generations[id.index()] = generation;
            ARMED.arm(id, generation);
            let ret = unsafe {
                if periodic {
                    esp_timer_start_periodic(timer, micros)
                } else {
                    esp_timer_start_once(timer, micros)
                }
            };
            if ret != ESP_OK {
                ARMED.disarm(id);
                error!("hw_timer: start {} failed (rc={})", id.name(), ret);
                return Err(TimerError::StartFailed(ret));
            }
            debug!("hw_timer: {} gen {} armed for {}ms", id.name(), generation, period.as_millis());
            Ok(TimerHandle { id, generation })
        }
    }

    impl TimerPort for EspTimerService {
        fn start_one_shot(&mut self, id: TimerId, after: Duration) -> Result<TimerHandle, TimerError> {
            self.start(id, after, false)
        }

        fn start_periodic(&mut self, id: TimerId, period: Duration) -> Result<TimerHandle, TimerError> {
            self.start(id, period, true)
        }

        fn stop(&mut self, handle: TimerHandle) {
            if !ARMED.is_current(handle) {
                return;
            }
            // Expiries already queued for this arming are stale from here.
            ARMED.disarm(handle.id);
            // SAFETY: live handle from esp_timer_create.
            unsafe { esp_timer_stop(self.timers[handle.id.index()]) };
        }
    }

    impl Drop for EspTimerService {
        fn drop(&mut self) {
            for (id, timer) in TimerId::ALL.into_iter().zip(self.timers) {
                ARMED.disarm(id);
                if !timer.is_null() {
                    // SAFETY: handles are only deleted here.
                    unsafe {
                        esp_timer_stop(timer);
                        esp_timer_delete(timer);
                    }
                }
            }
        }
    }
}

// ── Simulated timers ──────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SimTimer {
    generation: u32,
    deadline_ms: u64,
    period_ms: Option<u64>,
}

/// Virtual-clock timer service.
#[derive(Debug, Default)]
pub struct SimTimerService {
    now_ms: u64,
    armed: [Option<SimTimer>; TimerId::COUNT],
    generations: [u32; TimerId::COUNT],
    refuse: bool,
}

impl SimTimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent start fail (platform timer exhaustion).
    pub fn refuse_starts(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.armed[id.index()].is_some()
    }

    pub fn armed_count(&self) -> usize {
        self.armed.iter().filter(|t| t.is_some()).count()
    }

    /// Move the clock forward and return every expiry in firing order.
    pub fn advance(&mut self, ms: u64) -> Vec<TimerHandle> {
        let target = self.now_ms + ms;
        let mut fired = Vec::new();
        loop {
            let next = TimerId::ALL
                .iter()
                .filter_map(|id| self.armed[id.index()].map(|t| (*id, t)))
                .filter(|(_, t)| t.deadline_ms <= target)
                .min_by_key(|(_, t)| t.deadline_ms);
            let Some((id, timer)) = next else {
                break;
            };
            self.now_ms = timer.deadline_ms;
            fired.push(TimerHandle {
                id,
                generation: timer.generation,
            });
            self.armed[id.index()] = timer.period_ms.map(|p| SimTimer {
                deadline_ms: timer.deadline_ms + p.max(1),
                ..timer
            });
        }
        self.now_ms = target;
        fired
    }

    fn start(&mut self, id: TimerId, period: Duration, periodic: bool) -> Result<TimerHandle, TimerError> {
        if self.refuse {
            return Err(TimerError::StartFailed(-1));
        }
        let ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        let generation = next_generation(self.generations[id.index()]);
        self.generations[id.index()] = generation;
        self.armed[id.index()] = Some(SimTimer {
            generation,
            deadline_ms: self.now_ms.saturating_add(ms),
            period_ms: periodic.then_some(ms),
        });
        Ok(TimerHandle { id, generation })
    }
}

impl TimerPort for SimTimerService {
    fn start_one_shot(&mut self, id: TimerId, after: Duration) -> Result<TimerHandle, TimerError> {
        self.start(id, after, false)
    }

    fn start_periodic(&mut self, id: TimerId, period: Duration) -> Result<TimerHandle, TimerError> {
        self.start(id, period, true)
    }

    fn stop(&mut self, handle: TimerHandle) {
        let slot = &mut self.armed[handle.id.index()];
        if slot.is_some_and(|t| t.generation == handle.generation) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let mut t = SimTimerService::new();
        let h = t
            .start_one_shot(TimerId::SafetyCutoff, Duration::from_secs(10))
            .unwrap();
        assert!(t.advance(9_999).is_empty());
        assert_eq!(t.advance(1), vec![h]);
        assert!(t.advance(60_000).is_empty());
        assert!(!t.is_armed(TimerId::SafetyCutoff));
    }

    #[test]
    fn rearm_replaces_pending_expiry() {
        let mut t = SimTimerService::new();
        let first = t
            .start_one_shot(TimerId::SafetyCutoff, Duration::from_secs(10))
            .unwrap();
        t.advance(5_000);
        let second = t
            .start_one_shot(TimerId::SafetyCutoff, Duration::from_secs(10))
            .unwrap();
        assert_ne!(first.generation, second.generation);
        assert!(t.advance(5_000).is_empty());
        assert_eq!(t.advance(5_000), vec![second]);
    }

    #[test]
    fn periodic_repeats_until_stopped() {
        let mut t = SimTimerService::new();
        let h = t
            .start_periodic(TimerId::ProvisioningBlink, Duration::from_millis(100))
            .unwrap();
        assert_eq!(t.advance(350).len(), 3);
        t.stop(h);
        assert!(t.advance(1_000).is_empty());
    }

    #[test]
    fn stale_stop_is_ignored() {
        let mut t = SimTimerService::new();
        let old = t
            .start_one_shot(TimerId::ProvisioningWindow, Duration::from_secs(5))
            .unwrap();
        let new = t
            .start_one_shot(TimerId::ProvisioningWindow, Duration::from_secs(5))
            .unwrap();
        t.stop(old);
        assert_eq!(t.advance(5_000), vec![new]);
    }

    #[test]
    fn expiries_in_deadline_order() {
        let mut t = SimTimerService::new();
        let late = t
            .start_one_shot(TimerId::ProvisioningWindow, Duration::from_millis(300))
            .unwrap();
        let early = t
            .start_one_shot(TimerId::SafetyCutoff, Duration::from_millis(100))
            .unwrap();
        assert_eq!(t.advance(1_000), vec![early, late]);
        assert_eq!(t.now_ms(), 1_000);
    }

    #[test]
    fn expiry_during_rearm_is_dropped() {
        let armed = ArmedGenerations::new();
        armed.arm(TimerId::SafetyCutoff, 1);
        let first = armed.expiry(TimerId::SafetyCutoff).unwrap();
        assert_eq!(first.generation, 1);

        // Old timer fires between stop and the new arming.
        armed.disarm(TimerId::SafetyCutoff);
        assert_eq!(armed.expiry(TimerId::SafetyCutoff), None);

        armed.arm(TimerId::SafetyCutoff, 2);
        assert_eq!(
            armed.expiry(TimerId::SafetyCutoff),
            Some(TimerHandle { id: TimerId::SafetyCutoff, generation: 2 })
        );
        assert!(!armed.is_current(first));
        assert_eq!(armed.expiry(TimerId::ProvisioningWindow), None);
    }

    #[test]
    fn generation_skips_unarmed_marker() {
        assert_eq!(next_generation(u32::MAX), 1);
        assert_eq!(next_generation(7), 8);
    }

    #[test]
    fn refusal_injection() {
        let mut t = SimTimerService::new();
        t.refuse_starts(true);
        assert_eq!(
            t.start_one_shot(TimerId::SafetyCutoff, Duration::from_secs(1)),
            Err(TimerError::StartFailed(-1))
        );
        assert_eq!(t.armed_count(), 0);
    }
}
