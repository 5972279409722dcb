//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements                      | Connects to            |
//! |--------------|---------------------------------|------------------------|
//! | `openthread` | DirectoryPort, CoapTransport,   | OpenThread SRP client, |
//! |              | IdentityPort                    | CoAP, factory EUI-64   |
//! | `log_sink`   | EventSink                       | Serial log output      |
//! | `nvs`        | ConfigPort                      | NVS / in-memory store  |
//!
//! The indicator and timer ports are implemented by drivers
//! (`drivers::led`, `drivers::hw_timer`).

pub mod log_sink;
pub mod nvs;
pub mod openthread;
