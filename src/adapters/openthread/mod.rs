//! OpenThread adapter.
//!
//! Implements the three driven ports the node needs from the mesh stack:
//!
//! | Port            | OpenThread API                          | File       |
//! |-----------------|-----------------------------------------|------------|
//! | `DirectoryPort` | SRP client + SRP client buffers         | `srp.rs`   |
//! | `CoapTransport` | CoAP resources, `otCoapSendResponse*`   | `coap.rs`  |
//! | `IdentityPort`  | factory EUI-64, `esp_random`            | here       |
//!
//! Stack callbacks (role change, SRP result, inbound CoAP) run in the
//! OpenThread task.  They never touch domain state: each one converts its
//! arguments into a [`NodeEvent`](crate::events::NodeEvent) and pushes it
//! onto the event queue.  The conversions are plain functions so they are
//! exercised on host too.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: raw `esp-idf-sys` OpenThread calls, every
//!   main-task call made under the esp_openthread API lock.
//! - **all other targets**: an in-memory stack with failure injection that
//!   records what the domain asked of it.

pub mod coap;
pub mod srp;
pub mod state;

use log::info;

use crate::app::ports::IdentityPort;
use crate::error::DirectoryError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use crate::coap::{Request, Response};
#[cfg(not(target_os = "espidf"))]
use crate::error::ResponseError;
#[cfg(not(target_os = "espidf"))]
use crate::fsm::DeviceRole;

/// SRP service entries the client buffer pool holds
/// (`CONFIG_OPENTHREAD_SRP_CLIENT_MAX_SERVICES`).
pub const MAX_SERVICES: usize = 2;

// ── otError ───────────────────────────────────────────────────

/// Stable `otError` values the adapter distinguishes.
pub mod ot_error {
    pub const NONE: u32 = 0;
    pub const NO_BUFS: u32 = 3;
    pub const INVALID_ARGS: u32 = 7;
    pub const INVALID_STATE: u32 = 13;
    pub const DUPLICATED: u32 = 24;
}

/// Map an `otError` from an SRP call.  `None` for `OT_ERROR_NONE`.
pub fn directory_error(code: u32) -> Option<DirectoryError> {
    match code {
        ot_error::NONE => None,
        ot_error::NO_BUFS => Some(DirectoryError::NoBufs),
        ot_error::INVALID_ARGS => Some(DirectoryError::InvalidArgs),
        ot_error::INVALID_STATE => Some(DirectoryError::InvalidState),
        ot_error::DUPLICATED => Some(DirectoryError::Duplicated),
        other => Some(DirectoryError::Stack(other as i32)),
    }
}

#[cfg(any(target_os = "espidf", test))]
pub(crate) fn check_ot(code: u32) -> Result<(), DirectoryError> {
    directory_error(code).map_or(Ok(()), Err)
}

// ───────────────────────────────────────────────────────────────
// Target adapter
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct OpenThreadAdapter {
    instance: *mut otInstance,
    services: heapless::Vec<*mut otSrpClientBuffersServiceEntry, MAX_SERVICES>,
}

/// Holds the esp_openthread API lock for its lifetime.
#[cfg(target_os = "espidf")]
pub(crate) struct StackLock;

#[cfg(target_os = "espidf")]
impl StackLock {
    pub(crate) fn acquire() -> Self {
        // SAFETY: blocking acquire of the recursive stack mutex.
        unsafe { esp_openthread_lock_acquire(portMAX_DELAY) };
        Self
    }
}

#[cfg(target_os = "espidf")]
impl Drop for StackLock {
    fn drop(&mut self) {
        // SAFETY: paired with the acquire in `StackLock::acquire`.
        unsafe { esp_openthread_lock_release() };
    }
}

/// Initialise the native-radio OpenThread stack and run its main loop on a
/// dedicated thread.  The network dataset comes from the stack's own
/// settings partition; commissioning happens out of band.
#[cfg(target_os = "espidf")]
pub fn spawn_stack() -> Result<(), crate::error::Error> {
    // SAFETY: zero is a valid bit pattern for the platform config; the
    // fields the native radio needs are filled in below.
    let mut cfg: esp_openthread_platform_config_t = unsafe { core::mem::zeroed() };
    cfg.radio_config.radio_mode = esp_openthread_radio_mode_t_RADIO_MODE_NATIVE;
    cfg.host_config.host_connection_mode =
        esp_openthread_host_connection_mode_t_HOST_CONNECTION_MODE_NONE;
    cfg.port_config.storage_partition_name = c"nvs".as_ptr();
    cfg.port_config.netif_queue_size = 10;
    cfg.port_config.task_queue_size = 10;

    // SAFETY: called once from main before any other OpenThread call.
    if unsafe { esp_openthread_init(&cfg) } != ESP_OK {
        return Err(crate::error::Error::Init("openthread"));
    }

    std::thread::Builder::new()
        .name("ot_main".into())
        .stack_size(8 * 1024)
        .spawn(|| {
            // SAFETY: the stack was initialised above; this call blocks
            // for the lifetime of the node.
            let ret = unsafe { esp_openthread_launch_mainloop() };
            log::error!("OT: main loop exited (rc={})", ret);
        })
        .map_err(|_| crate::error::Error::Init("openthread task"))?;

    info!("OT: stack running");
    Ok(())
}

#[cfg(target_os = "espidf")]
impl OpenThreadAdapter {
    /// Bind to the running stack, start CoAP on `coap_port`, hook the
    /// role-change callback and bring the interface up.
    pub fn attach(coap_port: u16) -> Result<Self, crate::error::Error> {
        // SAFETY: the instance pointer is valid once esp_openthread_init
        // returned.
        let instance = unsafe { esp_openthread_get_instance() };
        if instance.is_null() {
            return Err(crate::error::Error::Init("openthread instance"));
        }
        let adapter = Self {
            instance,
            services: heapless::Vec::new(),
        };
        {
            let _lock = StackLock::acquire();
            coap::start(instance, coap_port)?;
            state::register_callback(instance)?;
            // SAFETY: the instance is live; the lock is held.
            unsafe {
                if otIp6SetEnabled(instance, true) != ot_error::NONE
                    || otThreadSetEnabled(instance, true) != ot_error::NONE
                {
                    return Err(crate::error::Error::Init("thread interface"));
                }
            }
        }
        info!("OT: adapter attached (CoAP port {})", coap_port);
        Ok(adapter)
    }

    pub(crate) fn instance(&self) -> *mut otInstance {
        self.instance
    }
}

#[cfg(target_os = "espidf")]
impl IdentityPort for OpenThreadAdapter {
    fn device_id(&self) -> [u8; 8] {
        let mut eui = otExtAddress { m8: [0; 8] };
        let _lock = StackLock::acquire();
        // SAFETY: writes 8 bytes into `eui`.
        unsafe { otLinkGetFactoryAssignedIeeeEui64(self.instance, &mut eui) };
        eui.m8
    }

    fn random_u32(&mut self) -> u32 {
        // SAFETY: hardware RNG read.
        unsafe { esp_random() }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated stack
// ───────────────────────────────────────────────────────────────

/// Host name buffer size of the simulated SRP client.
#[cfg(not(target_os = "espidf"))]
pub const SIM_HOST_NAME_SIZE: usize = 64;
#[cfg(not(target_os = "espidf"))]
pub const SIM_INSTANCE_NAME_SIZE: usize = 64;
#[cfg(not(target_os = "espidf"))]
pub const SIM_SERVICE_NAME_SIZE: usize = 96;

/// SRP client calls, in the order the simulated stack saw them.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrpCall {
    SetCallback,
    SetHostName,
    EnableAutoHostAddress,
    AllocateService,
    AddService,
    EnableAutoStart,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub(crate) struct SimServiceEntry {
    pub(crate) instance: [u8; SIM_INSTANCE_NAME_SIZE],
    pub(crate) service: [u8; SIM_SERVICE_NAME_SIZE],
    pub(crate) port: u16,
    pub(crate) added: bool,
}

#[cfg(not(target_os = "espidf"))]
pub struct OpenThreadAdapter {
    pub(crate) host_buf: [u8; SIM_HOST_NAME_SIZE],
    pub(crate) host_name: Option<heapless::String<SIM_HOST_NAME_SIZE>>,
    pub(crate) services: heapless::Vec<SimServiceEntry, MAX_SERVICES>,
    pub(crate) calls: Vec<SrpCall>,
    pub(crate) failures: Vec<(SrpCall, DirectoryError)>,
    pub(crate) auto_host_address: bool,
    pub(crate) auto_start: bool,
    pub(crate) role: DeviceRole,
    pub(crate) eid: Option<[u8; 16]>,
    pub(crate) sent: Vec<(Request, Response)>,
    pub(crate) send_failure: Option<ResponseError>,
    eui: [u8; 8],
    rng: u32,
}

#[cfg(not(target_os = "espidf"))]
impl OpenThreadAdapter {
    pub fn simulated(eui: [u8; 8]) -> Self {
        info!("OT(sim): adapter with EUI {:02x?}", eui);
        Self {
            host_buf: [0; SIM_HOST_NAME_SIZE],
            host_name: None,
            services: heapless::Vec::new(),
            calls: Vec::new(),
            failures: Vec::new(),
            auto_host_address: false,
            auto_start: false,
            role: DeviceRole::Disabled,
            eid: None,
            sent: Vec::new(),
            send_failure: None,
            eui,
            rng: 0x2545_F491,
        }
    }

    /// Make the next `call` fail with `error` (one shot per injection).
    pub fn sim_fail(&mut self, call: SrpCall, error: DirectoryError) {
        self.failures.push((call, error));
    }

    pub(crate) fn sim_record(&mut self, call: SrpCall) -> Result<(), DirectoryError> {
        self.calls.push(call);
        match self.failures.iter().position(|(c, _)| *c == call) {
            Some(i) => Err(self.failures.remove(i).1),
            None => Ok(()),
        }
    }

    /// Role the stack reports; an attached role also gives the node its EID.
    pub fn sim_set_role(&mut self, role: DeviceRole) {
        self.role = role;
    }

    pub fn sim_set_eid(&mut self, eid: Option<[u8; 16]>) {
        self.eid = eid;
    }

    pub fn sim_fail_sends(&mut self, error: Option<ResponseError>) {
        self.send_failure = error;
    }

    pub fn calls(&self) -> &[SrpCall] {
        &self.calls
    }

    pub fn registered_host(&self) -> Option<&str> {
        self.host_name.as_deref()
    }

    /// `(instance, service, port)` of every service added so far.
    pub fn added_services(&self) -> Vec<(String, String, u16)> {
        self.services
            .iter()
            .filter(|s| s.added)
            .map(|s| (c_str(&s.instance), c_str(&s.service), s.port))
            .collect()
    }

    pub fn auto_start_enabled(&self) -> bool {
        self.auto_start
    }

    pub fn auto_host_address_enabled(&self) -> bool {
        self.auto_host_address
    }

    pub fn sent(&self) -> &[(Request, Response)] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<(Request, Response)> {
        core::mem::take(&mut self.sent)
    }
}

/// Read a NUL-terminated name back out of a buffer.
#[cfg(not(target_os = "espidf"))]
pub(crate) fn c_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(not(target_os = "espidf"))]
impl IdentityPort for OpenThreadAdapter {
    fn device_id(&self) -> [u8; 8] {
        self.eui
    }

    fn random_u32(&mut self) -> u32 {
        // xorshift32: deterministic per adapter.
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ot_errors_map_to_directory_errors() {
        assert_eq!(directory_error(ot_error::NONE), None);
        assert_eq!(directory_error(ot_error::NO_BUFS), Some(DirectoryError::NoBufs));
        assert_eq!(directory_error(ot_error::DUPLICATED), Some(DirectoryError::Duplicated));
        assert_eq!(directory_error(99), Some(DirectoryError::Stack(99)));
        assert!(check_ot(ot_error::NONE).is_ok());
    }

    #[test]
    fn sim_random_is_deterministic_and_varies() {
        let mut a = OpenThreadAdapter::simulated([0; 8]);
        let mut b = OpenThreadAdapter::simulated([0; 8]);
        let first = a.random_u32();
        assert_eq!(first, b.random_u32());
        assert_ne!(first, a.random_u32());
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut ot = OpenThreadAdapter::simulated([0; 8]);
        ot.sim_fail(SrpCall::AddService, DirectoryError::NoBufs);
        assert_eq!(ot.sim_record(SrpCall::AddService), Err(DirectoryError::NoBufs));
        assert_eq!(ot.sim_record(SrpCall::AddService), Ok(()));
        assert_eq!(ot.calls(), &[SrpCall::AddService, SrpCall::AddService]);
    }
}
