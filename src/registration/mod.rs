//! Service registration with the mesh's SRP directory.
//!
//! [`RegistrationManager::register`] walks the fixed step sequence below.
//! Every step runs even if an earlier one failed; failures are collected
//! into a [`RegistrationError`] bitfield instead of aborting.
//!
//! ```text
//!   set callback → host name → auto host address → allocate entry
//!        → instance/service names → port → add service → auto start
//! ```
//!
//! Steps that need a service entry (names, port, add) are marked failed
//! without being attempted when allocation fails.  Auto start still runs.
//!
//! A failed run leaves its failed steps pending, together with the service
//! entry it allocated.  The next run repeats only the pending steps, so a
//! retry never re-adds a service or allocates a second entry.

pub mod identity;

use core::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::{DirectoryPort, ServiceSlot};
use crate::config::{NameString, NodeConfig, RetryPolicy};
use crate::error::{DirectoryError, RegistrationError, RegistrationStep};
use identity::DeviceIdentity;

/// Asynchronous result delivered by the directory client after a
/// registration attempt reached (or failed to reach) the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryUpdate {
    Registered,
    Removed,
    Failed(DirectoryError),
}

/// Write `name` into a stack-owned buffer as a NUL-terminated string.
///
/// At most `buf.len() - 1` bytes are copied.  Returns the number of name
/// bytes written.
pub fn write_c_name(buf: &mut [u8], name: &str) -> Result<usize, DirectoryError> {
    let Some(max) = buf.len().checked_sub(1) else {
        return Err(DirectoryError::InvalidArgs);
    };
    let len = name.len().min(max);
    buf[..len].copy_from_slice(&name.as_bytes()[..len]);
    buf[len] = 0;
    if len < name.len() {
        warn!(
            "SRP: '{}' cut to {} bytes by directory buffer",
            name, len
        );
    }
    Ok(len)
}

pub struct RegistrationManager {
    service_name: NameString,
    service_port: u16,
    retry: Option<RetryPolicy>,
    retries: u8,
    last_update: Option<DirectoryUpdate>,
    /// Steps that failed on the last run.
    pending: Option<RegistrationError>,
    slot: Option<ServiceSlot>,
}

impl RegistrationManager {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            service_name: config.service_name.clone(),
            service_port: config.service_port,
            retry: config.registration_retry,
            retries: 0,
            last_update: None,
            pending: None,
            slot: None,
        }
    }

    /// Run the registration sequence for `identity`.
    ///
    /// Best effort: the sequence always runs to the end.  After a failed
    /// run only the steps that failed are run again.  `Ok` means every
    /// step succeeded.
    pub fn register(
        &mut self,
        identity: &DeviceIdentity,
        dir: &mut impl DirectoryPort,
    ) -> Result<(), RegistrationError> {
        let pending = self.pending.take();
        match pending {
            None => {
                self.slot = None;
                info!(
                    "SRP: registering {}.{} on host {} port {}",
                    identity.instance_name, self.service_name, identity.host_name, self.service_port
                );
            }
            Some(err) => info!("SRP: retrying, last run {err}"),
        }

        let mut failed = 0u8;
        for step in RegistrationStep::ALL {
            if pending.is_some_and(|err| !err.has_failed(step)) {
                continue;
            }
            match self.run_step(step, identity, dir) {
                Ok(()) => debug!("SRP: {step} ok"),
                Err(e) => {
                    warn!("SRP: {step} failed: {e}");
                    failed |= step.mask();
                }
            }
        }

        if failed == 0 {
            info!("SRP: registration submitted");
            self.retries = 0;
            Ok(())
        } else {
            let err = RegistrationError { failed };
            warn!("SRP: registration {err}");
            self.pending = Some(err);
            Err(err)
        }
    }

    fn run_step(
        &mut self,
        step: RegistrationStep,
        identity: &DeviceIdentity,
        dir: &mut impl DirectoryPort,
    ) -> Result<(), DirectoryError> {
        match step {
            RegistrationStep::SetCallback => dir.set_update_callback(),
            RegistrationStep::SetHostName => {
                write_c_name(dir.host_name_buffer(), &identity.host_name)?;
                dir.set_host_name()
            }
            RegistrationStep::EnableAutoHostAddress => dir.enable_auto_host_address(),
            RegistrationStep::AllocateService => {
                self.slot = Some(dir.allocate_service_entry()?);
                Ok(())
            }
            RegistrationStep::SetNames => {
                let slot = self.entry()?;
                write_c_name(dir.instance_name_buffer(slot), &identity.instance_name)?;
                write_c_name(dir.service_name_buffer(slot), &self.service_name).map(|_| ())
            }
            RegistrationStep::SetPort => dir.configure_service(self.entry()?, self.service_port),
            RegistrationStep::AddService => dir.add_service(self.entry()?),
            RegistrationStep::EnableAutoStart => dir.enable_auto_start(),
        }
    }

    /// Service entry from the allocation step; entry steps cannot run
    /// without one.
    fn entry(&self) -> Result<ServiceSlot, DirectoryError> {
        self.slot.ok_or(DirectoryError::InvalidState)
    }

    /// Steps left failed by the last run.
    pub fn pending(&self) -> Option<RegistrationError> {
        self.pending
    }

    /// Record an asynchronous directory result.  Observation only; never
    /// triggers registration.
    pub fn on_update(&mut self, update: DirectoryUpdate) {
        match update {
            DirectoryUpdate::Registered => info!("SRP: host and service registered"),
            DirectoryUpdate::Removed => info!("SRP: registration removed"),
            DirectoryUpdate::Failed(e) => warn!("SRP: server reported error: {e}"),
        }
        self.last_update = Some(update);
    }

    pub fn last_update(&self) -> Option<DirectoryUpdate> {
        self.last_update
    }

    /// Delay before the next re-run of a failed registration, consuming one
    /// attempt.  `None` when retries are disabled or exhausted.
    pub fn next_retry_delay(&mut self) -> Option<Duration> {
        let policy = self.retry?;
        if self.retries >= policy.max_attempts {
            warn!("SRP: giving up after {} retries", self.retries);
            return None;
        }
        let factor = 1u32.checked_shl(u32::from(self.retries)).unwrap_or(u32::MAX);
        let secs = policy
            .first_delay_secs
            .saturating_mul(factor)
            .min(policy.max_delay_secs);
        self.retries += 1;
        Some(Duration::from_secs(u64::from(secs)))
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }
}
