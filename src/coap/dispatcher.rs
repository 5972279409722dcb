//! Request dispatcher.
//!
//! Routes a parsed [`Request`] to its resource, enforces the resource's
//! contract, and decides the reply.  It never sends anything itself: the
//! caller gets back either a [`Response`] to hand to the transport or the
//! reason the request was dropped.
//!
//! | Resource       | Method | Payload          | Reply                        |
//! |----------------|--------|------------------|------------------------------|
//! | `light`        | PUT    | exactly 1 byte   | 2.04, 1 byte resulting state |
//! | `light`        | GET    | ignored          | 2.05, 1 byte state           |
//! | `temperature`  | GET    | ignored          | 2.05, 1 byte signed reading  |
//! | `info`         | GET    | ignored          | 2.05, 8 byte version string  |
//! | `provisioning` | GET    | ignored          | 2.05, 16 byte ML-EID         |

use log::{debug, info, warn};

use super::resources::{firmware_version_payload, LightCommand, Resource, INFO_PAYLOAD_LEN};
use super::{Code, Request, Response};

/// What the resources act on.  Implemented by the node service over its
/// safety controller, sensor reader and provisioning window.
pub trait ResourceTargets {
    /// Apply a light command; returns the resulting state.
    fn apply_light(&mut self, command: LightCommand) -> bool;

    fn light_state(&self) -> bool;

    /// Read the measurement for the `temperature` resource.
    fn read_measurement(&mut self) -> i8;

    /// Mesh-local address if the provisioning window is open.  Serving it
    /// closes the window.
    fn claim_provisioning_address(&mut self) -> Option<[u8; 16]>;
}

/// Why a request got no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No resource registered at the path.
    UnknownResource,
    /// Message type differs from the resource's contract.
    UnexpectedType,
    /// Method not served by the resource.
    UnexpectedCode,
    /// PUT payload missing or longer than one byte.
    PayloadLength(usize),
    /// Provisioning address requested outside the window.
    ProvisioningClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Respond { resource: Resource, response: Response },
    Drop { resource: Option<Resource>, reason: DropReason },
}

pub struct Dispatcher {
    version: [u8; INFO_PAYLOAD_LEN],
}

impl Dispatcher {
    pub fn new(firmware_version: &str) -> Self {
        Self {
            version: firmware_version_payload(firmware_version),
        }
    }

    pub fn dispatch(&self, request: &Request, targets: &mut impl ResourceTargets) -> Dispatch {
        let Some(resource) = Resource::from_path(&request.path) else {
            info!("CoAP: no handler for '{}', dropped", request.path);
            return Dispatch::Drop {
                resource: None,
                reason: DropReason::UnknownResource,
            };
        };

        if let Err(reason) = check_contract(resource, request) {
            warn!(
                "CoAP: {} {:?}/{:?} rejected ({:?})",
                resource.path(),
                request.message_type,
                request.code,
                reason
            );
            return Dispatch::Drop {
                resource: Some(resource),
                reason,
            };
        }

        let reply = match (resource, request.code) {
            (Resource::Light, Code::Put) => Self::light_put(request, targets),
            (Resource::Light, _) => Ok(Response::to(
                request,
                Code::Content,
                &[u8::from(targets.light_state())],
            )),
            (Resource::Temperature, _) => {
                let value = targets.read_measurement();
                Ok(Response::to(request, Code::Content, &value.to_be_bytes()))
            }
            (Resource::Info, _) => Ok(Response::to(request, Code::Content, &self.version)),
            (Resource::Provisioning, _) => match targets.claim_provisioning_address() {
                Some(address) => Ok(Response::to(request, Code::Content, &address)),
                None => {
                    info!("CoAP: provisioning request outside window, dropped");
                    Err(DropReason::ProvisioningClosed)
                }
            },
        };

        match reply {
            Ok(response) => Dispatch::Respond { resource, response },
            Err(reason) => Dispatch::Drop {
                resource: Some(resource),
                reason,
            },
        }
    }

    fn light_put(request: &Request, targets: &mut impl ResourceTargets) -> Result<Response, DropReason> {
        let [byte] = request.payload.as_slice() else {
            warn!(
                "CoAP: light PUT with {}-byte payload, dropped",
                request.payload.len()
            );
            return Err(DropReason::PayloadLength(request.payload.len()));
        };

        let state = match LightCommand::from_byte(*byte) {
            Some(command) => {
                debug!("CoAP: light command {:?}", command);
                targets.apply_light(command)
            }
            None => {
                warn!("CoAP: unknown light command 0x{:02x}, state unchanged", byte);
                targets.light_state()
            }
        };
        Ok(Response::to(request, Code::Changed, &[u8::from(state)]))
    }
}

fn check_contract(resource: Resource, request: &Request) -> Result<(), DropReason> {
    let contract = resource.contract();
    if request.message_type != contract.message_type {
        return Err(DropReason::UnexpectedType);
    }
    if !contract.methods.contains(&request.code) {
        return Err(DropReason::UnexpectedCode);
    }
    Ok(())
}
