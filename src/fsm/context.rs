//! Shared mutable context threaded through every connectivity handler.
//!
//! Handlers read the latest role and write [`MonitorCommands`]; the
//! monitor drains the commands after each step and applies them to the
//! indicator, the registration manager and the provisioning window.

use super::DeviceRole;

/// One-shot gate in front of service registration.
///
/// Starts `Unclaimed`; the first [`claim`](Self::claim) flips it to
/// `Claimed` for the rest of the process lifetime.  There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationGuard {
    #[default]
    Unclaimed,
    Claimed,
}

impl RegistrationGuard {
    /// Returns `true` exactly once.
    pub fn claim(&mut self) -> bool {
        match self {
            Self::Unclaimed => {
                *self = Self::Claimed;
                true
            }
            Self::Claimed => false,
        }
    }

    pub fn is_claimed(&self) -> bool {
        *self == Self::Claimed
    }
}

/// Side effects requested by state handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorCommands {
    /// New level for the connection LED, if it should change.
    pub connection_indicator: Option<bool>,
    /// Run the registration sequence.
    pub register: bool,
    /// Close the provisioning window.
    pub close_provisioning: bool,
}

impl MonitorCommands {
    /// Drain pending commands, leaving none behind.
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }
}

pub struct MonitorContext {
    /// Role carried by the event being processed.
    pub role: DeviceRole,
    /// Role events since the current state was entered.
    pub events_in_state: u64,
    pub registration: RegistrationGuard,
    pub commands: MonitorCommands,
}

impl MonitorContext {
    pub fn new() -> Self {
        Self {
            role: DeviceRole::Detached,
            events_in_state: 0,
            registration: RegistrationGuard::default(),
            commands: MonitorCommands::default(),
        }
    }
}

impl Default for MonitorContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_claims_once() {
        let mut g = RegistrationGuard::default();
        assert!(!g.is_claimed());
        assert!(g.claim());
        assert!(g.is_claimed());
        assert!(!g.claim());
        assert!(!g.claim());
    }

    #[test]
    fn take_clears_commands() {
        let mut c = MonitorCommands {
            connection_indicator: Some(true),
            register: true,
            close_provisioning: false,
        };
        let taken = c.take();
        assert!(taken.register);
        assert_eq!(c, MonitorCommands::default());
    }
}
