//! Discrete LED / actuator outputs.
//!
//! [`LedBank`] drives one `embedded-hal` output pin per
//! [`IndicatorChannel`] and remembers the last level written, so the
//! domain can read back the output state.  On target the pins are
//! `esp-idf-hal` `PinDriver`s; on host any `OutputPin` mock works.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::{IndicatorChannel, IndicatorPort};

pub struct LedBank<P> {
    pins: [P; IndicatorChannel::COUNT],
    levels: [bool; IndicatorChannel::COUNT],
}

impl<P: OutputPin> LedBank<P> {
    /// `pins` in [`IndicatorChannel`] order: connection, provisioning,
    /// light.  All outputs start low.
    pub fn new(pins: [P; IndicatorChannel::COUNT]) -> Self {
        let mut bank = Self {
            pins,
            levels: [false; IndicatorChannel::COUNT],
        };
        for pin in &mut bank.pins {
            if pin.set_low().is_err() {
                warn!("LED: cannot drive output low at init");
            }
        }
        bank
    }
}

impl<P: OutputPin> IndicatorPort for LedBank<P> {
    fn set(&mut self, channel: IndicatorChannel, on: bool) {
        let pin = &mut self.pins[channel.index()];
        let result = if on { pin.set_high() } else { pin.set_low() };
        match result {
            Ok(()) => self.levels[channel.index()] = on,
            Err(_) => warn!("LED: write to {:?} failed", channel),
        }
    }

    fn is_on(&self, channel: IndicatorChannel) -> bool {
        self.levels[channel.index()]
    }
}
