//! SRP client side of the adapter: [`DirectoryPort`] plus the result
//! callback.

#[cfg(target_os = "espidf")]
use core::ffi::c_void;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use super::OpenThreadAdapter;
use crate::app::ports::{DirectoryPort, ServiceSlot};
use crate::error::DirectoryError;
use crate::registration::DirectoryUpdate;

#[cfg(target_os = "espidf")]
use super::{check_ot, StackLock};
#[cfg(not(target_os = "espidf"))]
use super::{c_str, SimServiceEntry, SrpCall, SIM_INSTANCE_NAME_SIZE, SIM_SERVICE_NAME_SIZE};

/// Translate the arguments of the SRP client callback.
pub fn directory_update(error: u32, host_removed: bool) -> DirectoryUpdate {
    match super::directory_error(error) {
        Some(e) => DirectoryUpdate::Failed(e),
        None if host_removed => DirectoryUpdate::Removed,
        None => DirectoryUpdate::Registered,
    }
}

// ───────────────────────────────────────────────────────────────
// Target
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn srp_client_cb(
    error: otError,
    host_info: *const otSrpClientHostInfo,
    _services: *const otSrpClientService,
    _removed_services: *const otSrpClientService,
    _ctx: *mut c_void,
) {
    // SAFETY: the stack passes a valid host info for the call's duration.
    let removed = !host_info.is_null()
        && unsafe { (*host_info).mState } == otSrpClientItemState_OT_SRP_CLIENT_ITEM_STATE_REMOVED;
    crate::events::push_event(crate::events::NodeEvent::RegistrationUpdate(directory_update(
        error, removed,
    )));
}

#[cfg(target_os = "espidf")]
fn buffer<'a>(ptr: *mut core::ffi::c_char, size: u16) -> &'a mut [u8] {
    if ptr.is_null() {
        return &mut [];
    }
    // SAFETY: the SRP client buffers are static pool storage of `size`
    // bytes, owned by this adapter until the service is added.
    unsafe { core::slice::from_raw_parts_mut(ptr.cast::<u8>(), usize::from(size)) }
}

#[cfg(target_os = "espidf")]
impl OpenThreadAdapter {
    fn entry(&self, slot: ServiceSlot) -> Option<*mut otSrpClientBuffersServiceEntry> {
        self.services.get(usize::from(slot.0)).copied()
    }
}

#[cfg(target_os = "espidf")]
impl DirectoryPort for OpenThreadAdapter {
    fn set_update_callback(&mut self) -> Result<(), DirectoryError> {
        let _lock = StackLock::acquire();
        // SAFETY: live instance, lock held; the callback is 'static.
        unsafe { otSrpClientSetCallback(self.instance(), Some(srp_client_cb), core::ptr::null_mut()) };
        Ok(())
    }

    fn host_name_buffer(&mut self) -> &mut [u8] {
        let _lock = StackLock::acquire();
        let mut size: u16 = 0;
        // SAFETY: live instance, lock held.
        let ptr = unsafe { otSrpClientBuffersGetHostNameString(self.instance(), &mut size) };
        buffer(ptr, size)
    }

    fn set_host_name(&mut self) -> Result<(), DirectoryError> {
        let _lock = StackLock::acquire();
        let mut size: u16 = 0;
        // SAFETY: live instance, lock held; the buffer holds a NUL-terminated
        // name written by the caller.
        unsafe {
            let ptr = otSrpClientBuffersGetHostNameString(self.instance(), &mut size);
            check_ot(otSrpClientSetHostName(self.instance(), ptr))
        }
    }

    fn enable_auto_host_address(&mut self) -> Result<(), DirectoryError> {
        let _lock = StackLock::acquire();
        // SAFETY: live instance, lock held.
        check_ot(unsafe { otSrpClientEnableAutoHostAddress(self.instance()) })
    }

    fn allocate_service_entry(&mut self) -> Result<ServiceSlot, DirectoryError> {
        if self.services.is_full() {
            return Err(DirectoryError::NoBufs);
        }
        let entry = {
            let _lock = StackLock::acquire();
            // SAFETY: live instance, lock held.
            unsafe { otSrpClientBuffersAllocateService(self.instance()) }
        };
        if entry.is_null() {
            return Err(DirectoryError::NoBufs);
        }
        let slot = ServiceSlot(self.services.len() as u8);
        self.services.push(entry).map_err(|_| DirectoryError::NoBufs)?;
        Ok(slot)
    }

    fn instance_name_buffer(&mut self, slot: ServiceSlot) -> &mut [u8] {
        let Some(entry) = self.entry(slot) else {
            return &mut [];
        };
        let mut size: u16 = 0;
        // SAFETY: entry comes from otSrpClientBuffersAllocateService.
        let ptr = unsafe { otSrpClientBuffersGetServiceEntryInstanceNameString(entry, &mut size) };
        buffer(ptr, size)
    }

    fn service_name_buffer(&mut self, slot: ServiceSlot) -> &mut [u8] {
        let Some(entry) = self.entry(slot) else {
            return &mut [];
        };
        let mut size: u16 = 0;
        // SAFETY: entry comes from otSrpClientBuffersAllocateService.
        let ptr = unsafe { otSrpClientBuffersGetServiceEntryServiceNameString(entry, &mut size) };
        buffer(ptr, size)
    }

    fn configure_service(&mut self, slot: ServiceSlot, port: u16) -> Result<(), DirectoryError> {
        let entry = self.entry(slot).ok_or(DirectoryError::InvalidArgs)?;
        // SAFETY: entry is pool storage owned by this adapter until added.
        unsafe {
            (*entry).mService.mPort = port;
            (*entry).mService.mNumTxtEntries = 0;
        }
        Ok(())
    }

    fn add_service(&mut self, slot: ServiceSlot) -> Result<(), DirectoryError> {
        let entry = self.entry(slot).ok_or(DirectoryError::InvalidArgs)?;
        let _lock = StackLock::acquire();
        // SAFETY: live instance, lock held; the entry stays allocated.
        check_ot(unsafe { otSrpClientAddService(self.instance(), &mut (*entry).mService) })
    }

    fn enable_auto_start(&mut self) -> Result<(), DirectoryError> {
        let _lock = StackLock::acquire();
        // SAFETY: live instance, lock held.
        unsafe { otSrpClientEnableAutoStartMode(self.instance(), None, core::ptr::null_mut()) };
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Host
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl DirectoryPort for OpenThreadAdapter {
    fn set_update_callback(&mut self) -> Result<(), DirectoryError> {
        self.sim_record(SrpCall::SetCallback)
    }

    fn host_name_buffer(&mut self) -> &mut [u8] {
        &mut self.host_buf
    }

    fn set_host_name(&mut self) -> Result<(), DirectoryError> {
        self.sim_record(SrpCall::SetHostName)?;
        let name = c_str(&self.host_buf);
        if name.is_empty() {
            return Err(DirectoryError::InvalidArgs);
        }
        let mut stored = heapless::String::new();
        stored.push_str(&name).map_err(|()| DirectoryError::InvalidArgs)?;
        self.host_name = Some(stored);
        Ok(())
    }

    fn enable_auto_host_address(&mut self) -> Result<(), DirectoryError> {
        self.sim_record(SrpCall::EnableAutoHostAddress)?;
        self.auto_host_address = true;
        Ok(())
    }

    fn allocate_service_entry(&mut self) -> Result<ServiceSlot, DirectoryError> {
        self.sim_record(SrpCall::AllocateService)?;
        let slot = ServiceSlot(self.services.len() as u8);
        self.services
            .push(SimServiceEntry {
                instance: [0; SIM_INSTANCE_NAME_SIZE],
                service: [0; SIM_SERVICE_NAME_SIZE],
                port: 0,
                added: false,
            })
            .map_err(|_| DirectoryError::NoBufs)?;
        Ok(slot)
    }

    fn instance_name_buffer(&mut self, slot: ServiceSlot) -> &mut [u8] {
        match self.services.get_mut(usize::from(slot.0)) {
            Some(entry) => &mut entry.instance,
            None => &mut [],
        }
    }

    fn service_name_buffer(&mut self, slot: ServiceSlot) -> &mut [u8] {
        match self.services.get_mut(usize::from(slot.0)) {
            Some(entry) => &mut entry.service,
            None => &mut [],
        }
    }

    fn configure_service(&mut self, slot: ServiceSlot, port: u16) -> Result<(), DirectoryError> {
        let entry = self
            .services
            .get_mut(usize::from(slot.0))
            .ok_or(DirectoryError::InvalidArgs)?;
        entry.port = port;
        Ok(())
    }

    fn add_service(&mut self, slot: ServiceSlot) -> Result<(), DirectoryError> {
        self.sim_record(SrpCall::AddService)?;
        let entry = self
            .services
            .get(usize::from(slot.0))
            .ok_or(DirectoryError::InvalidArgs)?;
        let (instance, service) = (c_str(&entry.instance), c_str(&entry.service));
        if instance.is_empty() || service.is_empty() {
            return Err(DirectoryError::InvalidArgs);
        }
        let duplicate = self
            .services
            .iter()
            .any(|s| s.added && c_str(&s.instance) == instance && c_str(&s.service) == service);
        if duplicate {
            return Err(DirectoryError::Duplicated);
        }
        if let Some(entry) = self.services.get_mut(usize::from(slot.0)) {
            entry.added = true;
        }
        Ok(())
    }

    fn enable_auto_start(&mut self) -> Result<(), DirectoryError> {
        self.sim_record(SrpCall::EnableAutoStart)?;
        self.auto_start = true;
        Ok(())
    }
}
