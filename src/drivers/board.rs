//! The node's local hardware as one value: indicator outputs plus the
//! timer service, which is what the node service drives.

use core::time::Duration;

use crate::app::ports::{IndicatorChannel, IndicatorPort, TimerHandle, TimerId, TimerPort};
use crate::error::TimerError;

pub struct Board<I, T> {
    pub indicators: I,
    pub timers: T,
}

impl<I, T> Board<I, T> {
    pub fn new(indicators: I, timers: T) -> Self {
        Self { indicators, timers }
    }
}

impl<I: IndicatorPort, T> IndicatorPort for Board<I, T> {
    fn set(&mut self, channel: IndicatorChannel, on: bool) {
        self.indicators.set(channel, on);
    }

    fn is_on(&self, channel: IndicatorChannel) -> bool {
        self.indicators.is_on(channel)
    }
}

impl<I, T: TimerPort> TimerPort for Board<I, T> {
    fn start_one_shot(&mut self, id: TimerId, after: Duration) -> Result<TimerHandle, TimerError> {
        self.timers.start_one_shot(id, after)
    }

    fn start_periodic(&mut self, id: TimerId, period: Duration) -> Result<TimerHandle, TimerError> {
        self.timers.start_periodic(id, period)
    }

    fn stop(&mut self, handle: TimerHandle) {
        self.timers.stop(handle);
    }
}
