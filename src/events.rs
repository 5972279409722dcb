//! Inbound event queue.
//!
//! Every stimulus the node reacts to is turned into a [`NodeEvent`] by the
//! adapter that observes it and pushed here.  The main loop is the only
//! consumer, which gives the domain a single serialized execution context.
//!
//! ```text
//! ┌──────────────────┐
//! │ OT role callback │──┐
//! │ CoAP handlers    │──┤    ┌──────────────┐     ┌──────────────┐
//! │ SRP callback     │──┼───▶│  EVENTS      │────▶│  Main Loop   │
//! │ esp_timer task   │──┤    │  (bounded)   │     │  (consumer)  │
//! │ Button ISR       │──┘    └──────────────┘     └──────────────┘
//! ```
//!
//! Producers never block: when the queue is full the event is dropped
//! with a warning.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::ports::TimerHandle;
use crate::coap::Request;
use crate::fsm::DeviceRole;
use crate::registration::DirectoryUpdate;

/// Queue depth.
pub const EVENT_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The mesh stack reported a (possibly unchanged) device role.
    RoleChanged(DeviceRole),
    /// A parsed CoAP request for one of the registered resources, or for
    /// an unknown path via the default handler.
    Request(Request),
    TimerExpired(TimerHandle),
    /// Asynchronous result from the SRP client.
    RegistrationUpdate(DirectoryUpdate),
    /// Debounced press of the provisioning button.
    ButtonPressed,
}

impl NodeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoleChanged(_) => "role",
            Self::Request(_) => "request",
            Self::TimerExpired(_) => "timer",
            Self::RegistrationUpdate(_) => "srp_update",
            Self::ButtonPressed => "button",
        }
    }
}

pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, NodeEvent, EVENT_QUEUE_DEPTH>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue without blocking.  Returns `false` if the event was dropped.
    pub fn push(&self, event: NodeEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(embassy_sync::channel::TrySendError::Full(ev)) => {
                warn!("EVENTS: queue full, dropping {} event", ev.name());
                false
            }
        }
    }

    pub fn pop(&self) -> Option<NodeEvent> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Pop everything currently queued, in arrival order.
    pub fn drain(&self) -> impl Iterator<Item = NodeEvent> + '_ {
        core::iter::from_fn(move || self.pop())
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The firmware-wide queue, fed from stack callbacks, timer callbacks and
/// the button ISR.
pub static EVENTS: EventQueue = EventQueue::new();

/// Shorthand for `EVENTS.push(event)`.
pub fn push_event(event: NodeEvent) -> bool {
    EVENTS.push(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q = EventQueue::new();
        assert!(q.push(NodeEvent::ButtonPressed));
        assert!(q.push(NodeEvent::RoleChanged(DeviceRole::Child)));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(NodeEvent::ButtonPressed));
        assert_eq!(q.pop(), Some(NodeEvent::RoleChanged(DeviceRole::Child)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn full_queue_drops_newest() {
        let q = EventQueue::new();
        for _ in 0..EVENT_QUEUE_DEPTH {
            assert!(q.push(NodeEvent::ButtonPressed));
        }
        assert!(!q.push(NodeEvent::RoleChanged(DeviceRole::Leader)));
        let drained: Vec<_> = q.drain().collect();
        assert_eq!(drained.len(), EVENT_QUEUE_DEPTH);
        assert!(drained.iter().all(|e| *e == NodeEvent::ButtonPressed));
        assert!(q.is_empty());
    }
}
