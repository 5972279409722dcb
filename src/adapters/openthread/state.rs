//! Role tracking: the state-changed callback feeds role changes to the
//! connectivity monitor through the event queue.

#[cfg(target_os = "espidf")]
use core::ffi::c_void;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use super::OpenThreadAdapter;
use crate::events::NodeEvent;
use crate::fsm::DeviceRole;

/// `OT_CHANGED_THREAD_ROLE` bit of `otChangedFlags`.
pub const CHANGED_THREAD_ROLE: u32 = 1 << 2;

/// Event for a state-changed notification, if it touched the role.
pub fn role_event(flags: u32, role_raw: u32) -> Option<NodeEvent> {
    (flags & CHANGED_THREAD_ROLE != 0).then(|| NodeEvent::RoleChanged(DeviceRole::from_raw(role_raw)))
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn state_changed_cb(flags: otChangedFlags, ctx: *mut c_void) {
    if flags & CHANGED_THREAD_ROLE == 0 {
        return;
    }
    // SAFETY: ctx is the instance registered below; runs in the OT task.
    let role = unsafe { otThreadGetDeviceRole(ctx.cast()) } as u32;
    if let Some(event) = role_event(flags, role) {
        crate::events::push_event(event);
    }
}

/// Caller holds the stack lock.
#[cfg(target_os = "espidf")]
pub(super) fn register_callback(instance: *mut otInstance) -> Result<(), crate::error::Error> {
    // SAFETY: live instance; the callback is 'static.
    let ret = unsafe { otSetStateChangedCallback(instance, Some(state_changed_cb), instance.cast()) };
    if ret != super::ot_error::NONE {
        return Err(crate::error::Error::Init("state callback"));
    }
    Ok(())
}

impl OpenThreadAdapter {
    /// Role right now, for seeding the monitor at boot.
    #[cfg(target_os = "espidf")]
    pub fn current_role(&self) -> DeviceRole {
        let _lock = super::StackLock::acquire();
        // SAFETY: live instance, lock held.
        DeviceRole::from_raw(unsafe { otThreadGetDeviceRole(self.instance()) } as u32)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn current_role(&self) -> DeviceRole {
        self.role
    }
}
