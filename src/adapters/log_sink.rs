//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as one
//! `TAG | key=value` line to the ESP-IDF logger (UART / USB-CDC).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted since boot (wrapping).
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started(state) => {
                info!("START | connectivity={:?}", state);
            }
            AppEvent::ConnectivityChanged { from, to, role } => {
                info!("CONN | {:?} -> {:?} | role={}", from, to, role.name());
            }
            AppEvent::RegistrationSubmitted { host } => {
                info!("SRP | submitted | host={}", host);
            }
            AppEvent::RegistrationIncomplete(err) => {
                warn!("SRP | incomplete | {}", err);
            }
            AppEvent::RegistrationRetryScheduled { attempt, delay_secs } => {
                info!("SRP | retry #{} in {}s", attempt, delay_secs);
            }
            AppEvent::RegistrationUpdate(update) => {
                info!("SRP | server update | {:?}", update);
            }
            AppEvent::LightChanged { on, cause } => {
                info!("LIGHT | {} | cause={:?}", if *on { "ON" } else { "OFF" }, cause);
            }
            AppEvent::LightRefused(err) => {
                warn!("LIGHT | ON refused | {}", err);
            }
            AppEvent::Measurement(reading) => {
                debug!("SENSOR | value={} | quality={:?}", reading.value, reading.quality);
            }
            AppEvent::ResponseSent { resource } => {
                debug!("COAP | response | {:?}", resource);
            }
            AppEvent::ResponseFailed { resource, error } => {
                warn!("COAP | send failed | {:?} | {}", resource, error);
            }
            AppEvent::RequestDropped { resource, reason } => {
                debug!("COAP | dropped | {:?} | {:?}", resource, reason);
            }
            AppEvent::ProvisioningChanged(open) => {
                info!("PROV | window {}", if *open { "open" } else { "closed" });
            }
        }
    }
}
