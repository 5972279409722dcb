//! Application core: domain orchestration, zero direct I/O.
//!
//! [`service::NodeService`] ties the connectivity monitor, the safety
//! controller, the sensor reader, the provisioning window and the request
//! dispatcher together.  Hardware and the mesh stack are reached only
//! through the **port traits** in [`ports`], so the whole core runs on
//! host against mocks.

pub mod events;
pub mod ports;
pub mod service;
