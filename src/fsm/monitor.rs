//! Connectivity monitor: the state machine plus the effects it drives.

use log::{info, warn};

use super::context::MonitorContext;
use super::{states, DeviceRole, Fsm, StateId};
use crate::app::ports::{DirectoryPort, IdentityPort, IndicatorChannel, IndicatorPort};
use crate::config::{NameString, NodeConfig, SuffixSource};
use crate::error::RegistrationError;
use crate::registration::identity::{compute_identity, DeviceIdentity};
use crate::registration::{DirectoryUpdate, RegistrationManager};

/// What a single role event caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleOutcome {
    pub from: StateId,
    pub to: StateId,
    /// Result of the registration run this event triggered, if any.
    pub registration: Option<Result<(), RegistrationError>>,
    /// The provisioning window must close.
    pub close_provisioning: bool,
}

pub struct ConnectivityMonitor {
    fsm: Fsm,
    ctx: MonitorContext,
    registration: RegistrationManager,
    base_host: NameString,
    base_instance: NameString,
    suffix_source: SuffixSource,
    identity: Option<DeviceIdentity>,
}

impl ConnectivityMonitor {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            fsm: Fsm::new(states::build_state_table(), StateId::Detached),
            ctx: MonitorContext::new(),
            registration: RegistrationManager::new(config),
            base_host: config.host_name.clone(),
            base_instance: config.service_instance.clone(),
            suffix_source: config.suffix_source,
            identity: None,
        }
    }

    /// Enter the initial state and apply its indicator level.
    pub fn start(&mut self, hw: &mut impl IndicatorPort) {
        self.fsm.start(&mut self.ctx);
        let cmds = self.ctx.commands.take();
        if let Some(on) = cmds.connection_indicator {
            hw.set(IndicatorChannel::Connection, on);
        }
    }

    /// Process one role-change notification from the mesh stack.
    pub fn on_role_changed(
        &mut self,
        role: DeviceRole,
        hw: &mut impl IndicatorPort,
        net: &mut (impl DirectoryPort + IdentityPort),
    ) -> RoleOutcome {
        let from = self.fsm.current_state();
        self.ctx.role = role;
        self.fsm.step(&mut self.ctx);
        let cmds = self.ctx.commands.take();

        if let Some(on) = cmds.connection_indicator {
            hw.set(IndicatorChannel::Connection, on);
        }

        let registration = cmds.register.then(|| self.run_registration(net));

        RoleOutcome {
            from,
            to: self.fsm.current_state(),
            registration,
            close_provisioning: cmds.close_provisioning,
        }
    }

    /// Re-run the steps the last registration left failed.  Only possible
    /// once the guard has been claimed; never claims it.
    pub fn retry_registration(
        &mut self,
        net: &mut (impl DirectoryPort + IdentityPort),
    ) -> Option<Result<(), RegistrationError>> {
        if !self.ctx.registration.is_claimed() {
            warn!("SRP: retry requested before first registration, ignored");
            return None;
        }
        info!("SRP: retry {}", self.registration.retries());
        Some(self.run_registration(net))
    }

    fn run_registration(
        &mut self,
        net: &mut (impl DirectoryPort + IdentityPort),
    ) -> Result<(), RegistrationError> {
        let identity = self.identity.get_or_insert_with(|| {
            compute_identity(&self.base_host, &self.base_instance, self.suffix_source, net)
        });
        self.registration.register(identity, net)
    }

    pub fn on_registration_update(&mut self, update: DirectoryUpdate) {
        self.registration.on_update(update);
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn role(&self) -> DeviceRole {
        self.ctx.role
    }

    pub fn is_registration_claimed(&self) -> bool {
        self.ctx.registration.is_claimed()
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    pub fn registration(&self) -> &RegistrationManager {
        &self.registration
    }

    pub fn registration_mut(&mut self) -> &mut RegistrationManager {
        &mut self.registration
    }
}
