//! CoAP side of the adapter: resource registration, inbound request
//! capture and [`CoapTransport`].
//!
//! Every [`Resource`] gets an `otCoapResource` whose handler copies the
//! message into a [`Request`] and queues it.  Unmatched paths reach the
//! default handler and are queued with an empty path, which the
//! dispatcher drops.

#[cfg(target_os = "espidf")]
use core::ffi::c_void;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::{debug, info};

use super::OpenThreadAdapter;
use crate::app::ports::CoapTransport;
use crate::coap::{Code, MessageType, Peer, Request, Response};
use crate::error::ResponseError;

#[cfg(target_os = "espidf")]
use super::StackLock;
#[cfg(target_os = "espidf")]
use crate::coap::resources::Resource;
#[cfg(target_os = "espidf")]
use crate::coap::MAX_PAYLOAD_LEN;

/// Path recorded for requests that matched no resource.
pub const UNMATCHED_PATH: &str = "";

/// Header fields and body of an inbound message, as the stack reports them.
#[derive(Debug, Clone, Copy)]
pub struct RawRequest<'a> {
    pub message_type: u8,
    pub code: u8,
    pub message_id: u16,
    pub token: &'a [u8],
    pub payload: &'a [u8],
    pub peer: Peer,
}

/// Build the queued [`Request`] for a message delivered to `path`.
pub fn request_from_raw(path: &str, raw: &RawRequest<'_>) -> Request {
    Request::new(
        path,
        MessageType::from_raw(raw.message_type),
        Code::from_raw(raw.code),
        raw.token,
        raw.payload,
    )
    .with_peer(raw.peer, raw.message_id)
}

// ───────────────────────────────────────────────────────────────
// Target
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn capture(path: &str, message: *mut otMessage, info: *const otMessageInfo) {
    // SAFETY (whole body): the stack guarantees `message` and `info` are
    // valid for the duration of the handler call.
    unsafe {
        let token_len = usize::from(otCoapMessageGetTokenLength(message));
        let token_ptr = otCoapMessageGetToken(message);
        let token: &[u8] = if token_ptr.is_null() {
            &[]
        } else {
            core::slice::from_raw_parts(token_ptr, token_len)
        };

        let offset = otMessageGetOffset(message);
        let available = otMessageGetLength(message).saturating_sub(offset);
        let mut body = [0u8; MAX_PAYLOAD_LEN];
        let wanted = usize::from(available).min(MAX_PAYLOAD_LEN) as u16;
        let read = otMessageRead(message, offset, body.as_mut_ptr().cast(), wanted);

        let raw = RawRequest {
            message_type: otCoapMessageGetType(message) as u8,
            code: otCoapMessageGetCode(message) as u8,
            message_id: otCoapMessageGetMessageId(message),
            token,
            payload: &body[..usize::from(read)],
            peer: Peer {
                address: (*info).mPeerAddr.mFields.m8,
                port: (*info).mPeerPort,
            },
        };
        let request = request_from_raw(path, &raw);
        crate::events::push_event(crate::events::NodeEvent::Request(request));
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn resource_handler(ctx: *mut c_void, message: *mut otMessage, info: *const otMessageInfo) {
    let path = Resource::ALL
        .get(ctx as usize)
        .map_or(UNMATCHED_PATH, |r| r.path());
    // SAFETY: forwarded from the stack.
    unsafe { capture(path, message, info) };
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn default_handler(_ctx: *mut c_void, message: *mut otMessage, info: *const otMessageInfo) {
    // SAFETY: forwarded from the stack.
    unsafe { capture(UNMATCHED_PATH, message, info) };
}

/// Register every resource and the default handler, then start CoAP.
/// Caller holds the stack lock.
#[cfg(target_os = "espidf")]
pub(super) fn start(instance: *mut otInstance, port: u16) -> Result<(), crate::error::Error> {
    const PATHS: [&core::ffi::CStr; 4] = [c"light", c"temperature", c"info", c"provisioning"];
    // SAFETY: live instance, lock held.  Resources are leaked: the stack
    // keeps pointers to them for the node's lifetime.
    unsafe {
        if otCoapStart(instance, port) != super::ot_error::NONE {
            return Err(crate::error::Error::Init("coap"));
        }
        otCoapSetDefaultHandler(instance, Some(default_handler), core::ptr::null_mut());
        for (idx, resource) in Resource::ALL.iter().enumerate() {
            let entry = Box::leak(Box::new(otCoapResource {
                mUriPath: PATHS[idx].as_ptr(),
                mHandler: Some(resource_handler),
                mContext: idx as *mut c_void,
                mNext: core::ptr::null_mut(),
            }));
            otCoapAddResource(instance, entry);
            debug!("CoAP: resource /{} registered", resource.path());
        }
    }
    info!("CoAP: server started on port {}", port);
    Ok(())
}

#[cfg(target_os = "espidf")]
impl CoapTransport for OpenThreadAdapter {
    fn send_response(&mut self, request: &Request, response: &Response) -> Result<(), ResponseError> {
        let _lock = StackLock::acquire();
        let instance = self.instance();
        // SAFETY: live instance, lock held.  The message is freed on every
        // path where the stack did not take ownership.
        unsafe {
            let msg = otCoapNewMessage(instance, core::ptr::null());
            if msg.is_null() {
                return Err(ResponseError::NoBufs);
            }
            otCoapMessageInit(msg, response.message_type as otCoapType, response.code.raw() as otCoapCode);
            let mut built = otCoapMessageSetToken(msg, response.token.as_ptr(), response.token.len() as u8)
                == super::ot_error::NONE;
            if built && !response.payload.is_empty() {
                built = otCoapMessageSetPayloadMarker(msg) == super::ot_error::NONE
                    && otMessageAppend(msg, response.payload.as_ptr().cast(), response.payload.len() as u16)
                        == super::ot_error::NONE;
            }
            if !built {
                otMessageFree(msg);
                return Err(ResponseError::Build);
            }

            // Zeroed socket address: the stack picks the source.
            let mut info: otMessageInfo = core::mem::zeroed();
            info.mPeerAddr.mFields.m8 = request.peer.address;
            info.mPeerPort = request.peer.port;
            let ret = otCoapSendResponseWithParameters(instance, msg, &info, core::ptr::null());
            if ret != super::ot_error::NONE {
                otMessageFree(msg);
                return Err(ResponseError::Send(ret as i32));
            }
        }
        Ok(())
    }

    fn mesh_local_eid(&self) -> Option<[u8; 16]> {
        let _lock = StackLock::acquire();
        // SAFETY: live instance, lock held; the EID pointer is read at once.
        unsafe {
            let role = crate::fsm::DeviceRole::from_raw(otThreadGetDeviceRole(self.instance()) as u32);
            if !role.is_attached() {
                return None;
            }
            let eid = otThreadGetMeshLocalEid(self.instance());
            (!eid.is_null()).then(|| (*eid).mFields.m8)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl CoapTransport for OpenThreadAdapter {
    fn send_response(&mut self, request: &Request, response: &Response) -> Result<(), ResponseError> {
        if let Some(e) = self.send_failure {
            return Err(e);
        }
        self.sent.push((request.clone(), response.clone()));
        Ok(())
    }

    fn mesh_local_eid(&self) -> Option<[u8; 16]> {
        if self.role.is_attached() { self.eid } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::DeviceRole;

    const PEER: Peer = Peer {
        address: [0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
        port: 5683,
    };

    #[test]
    fn raw_message_becomes_request() {
        let raw = RawRequest {
            message_type: 1,
            code: 0x03,
            message_id: 0x1234,
            token: &[0xAB, 0xCD],
            payload: b"1",
            peer: PEER,
        };
        let req = request_from_raw("light", &raw);
        assert_eq!(req.path.as_str(), "light");
        assert_eq!(req.message_type, MessageType::NonConfirmable);
        assert_eq!(req.code, Code::Put);
        assert_eq!(req.message_id, 0x1234);
        assert_eq!(req.token.as_slice(), &[0xAB, 0xCD]);
        assert_eq!(req.payload.as_slice(), b"1");
        assert_eq!(req.peer, PEER);
    }

    #[test]
    fn unmatched_path_is_unknown_resource() {
        let raw = RawRequest {
            message_type: 1,
            code: 0x01,
            message_id: 1,
            token: &[],
            payload: &[],
            peer: PEER,
        };
        let req = request_from_raw(UNMATCHED_PATH, &raw);
        assert!(crate::coap::resources::Resource::from_path(&req.path).is_none());
    }

    #[test]
    fn sim_records_sent_responses() {
        let mut ot = OpenThreadAdapter::simulated([0; 8]);
        let req = Request::new("info", MessageType::NonConfirmable, Code::Get, &[7], &[]);
        let resp = Response::to(&req, Code::Content, b"v");
        ot.send_response(&req, &resp).unwrap();
        assert_eq!(ot.sent().len(), 1);

        ot.sim_fail_sends(Some(ResponseError::NoBufs));
        assert_eq!(ot.send_response(&req, &resp), Err(ResponseError::NoBufs));
        assert_eq!(ot.take_sent().len(), 1);
    }

    #[test]
    fn eid_only_while_attached() {
        let mut ot = OpenThreadAdapter::simulated([0; 8]);
        ot.sim_set_eid(Some([0xfd; 16]));
        assert_eq!(ot.mesh_local_eid(), None);
        ot.sim_set_role(DeviceRole::Child);
        assert_eq!(ot.mesh_local_eid(), Some([0xfd; 16]));
    }
}
