//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  The adapter on the
//! other side decides what to do with them; on target they are logged.

use crate::coap::dispatcher::DropReason;
use crate::coap::resources::Resource;
use crate::config::NameString;
use crate::error::{RegistrationError, ResponseError, TimerError};
use crate::fsm::{DeviceRole, StateId};
use crate::registration::DirectoryUpdate;
use crate::sensors::Reading;

/// Why the actuator changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCause {
    /// A `light` PUT from a peer.
    Request,
    /// The max-active backstop fired.
    SafetyCutoff,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the initial connectivity state).
    Started(StateId),

    /// The connectivity state machine moved.
    ConnectivityChanged {
        from: StateId,
        to: StateId,
        role: DeviceRole,
    },

    /// Every registration step succeeded; the SRP client takes it from here.
    RegistrationSubmitted { host: NameString },

    /// The registration sequence finished with failed steps.
    RegistrationIncomplete(RegistrationError),

    /// A failed registration will be re-run after `delay_secs`.
    RegistrationRetryScheduled { attempt: u8, delay_secs: u64 },

    /// Asynchronous result from the directory server.
    RegistrationUpdate(DirectoryUpdate),

    LightChanged { on: bool, cause: LightCause },

    /// A light ON was refused because the backstop could not be armed.
    LightRefused(TimerError),

    /// A fresh measurement was taken (request or background refresh).
    Measurement(Reading),

    /// A request was answered.
    ResponseSent { resource: Resource },

    /// A response was built but the transport failed to send it.
    ResponseFailed { resource: Resource, error: ResponseError },

    RequestDropped {
        resource: Option<Resource>,
        reason: DropReason,
    },

    /// The provisioning window opened (`true`) or closed (`false`).
    ProvisioningChanged(bool),
}
