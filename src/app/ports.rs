//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (LEDs, timers, the OpenThread stack, measurement
//! sources, event sinks, storage) implement these traits.  The
//! [`NodeService`](super::service::NodeService) consumes them via generics,
//! so the domain core never touches the radio or GPIO directly.

use core::time::Duration;

use crate::coap::{Request, Response};
use crate::config::NodeConfig;
use crate::error::{ConversionError, DirectoryError, ResponseError, SampleError, TimerError};

// ───────────────────────────────────────────────────────────────
// Indicator port (driven adapter: domain → LEDs / actuator output)
// ───────────────────────────────────────────────────────────────

/// The board's discrete outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndicatorChannel {
    /// Lit while the node is attached to the mesh.
    Connection = 0,
    /// Blinks while the provisioning window is open.
    Provisioning = 1,
    /// The light / pump actuator itself.
    Light = 2,
}

impl IndicatorChannel {
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Write-side port for on/off outputs.
pub trait IndicatorPort {
    fn set(&mut self, channel: IndicatorChannel, on: bool);

    /// Last level written to `channel`.
    fn is_on(&self, channel: IndicatorChannel) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: domain ↔ one-shot / periodic timers)
// ───────────────────────────────────────────────────────────────

/// Every timed behaviour owns exactly one timer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerId {
    /// Forces the actuator off after the max-active duration.
    SafetyCutoff = 0,
    /// Closes the provisioning window.
    ProvisioningWindow = 1,
    /// Toggles the provisioning LED.
    ProvisioningBlink = 2,
    /// Background sensor refresh (disabled by default).
    SensorRefresh = 3,
    /// Re-runs a failed service registration.
    RegistrationRetry = 4,
}

impl TimerId {
    pub const COUNT: usize = 5;

    pub const ALL: [Self; Self::COUNT] = [
        Self::SafetyCutoff,
        Self::ProvisioningWindow,
        Self::ProvisioningBlink,
        Self::SensorRefresh,
        Self::RegistrationRetry,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SafetyCutoff => "safety",
            Self::ProvisioningWindow => "prov_win",
            Self::ProvisioningBlink => "prov_blink",
            Self::SensorRefresh => "sensor",
            Self::RegistrationRetry => "srp_retry",
        }
    }
}

/// Identifies one arming of a timer.
///
/// Re-arming an id bumps its generation, so an expiry carrying an older
/// generation is recognisably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub id: TimerId,
    pub generation: u32,
}

pub trait TimerPort {
    /// Arm a single-shot timer.  Re-arming an already armed id cancels
    /// the pending expiry.
    fn start_one_shot(&mut self, id: TimerId, after: Duration) -> Result<TimerHandle, TimerError>;

    /// Arm a periodic timer.  Same re-arm semantics as `start_one_shot`.
    fn start_periodic(&mut self, id: TimerId, period: Duration) -> Result<TimerHandle, TimerError>;

    /// Disarm `handle`.  A stale handle (already re-armed) is ignored.
    fn stop(&mut self, handle: TimerHandle);
}

// ───────────────────────────────────────────────────────────────
// Measurement port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// A source of raw samples plus their conversion to engineering units.
pub trait MeasurementPort {
    /// Take one raw sample (ADC counts, millivolts, ...).
    fn sample(&mut self) -> Result<i32, SampleError>;

    /// Convert a raw sample to the reported unit.
    fn to_engineering_units(&self, raw: i32) -> Result<f32, ConversionError>;

    /// Unit suffix for log lines.
    fn unit(&self) -> &'static str;
}

// ───────────────────────────────────────────────────────────────
// Directory port (driven adapter: domain → SRP client)
// ───────────────────────────────────────────────────────────────

/// A service entry allocated from the directory client's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSlot(pub u8);

/// Service-advertisement client of the mesh stack.
///
/// Name buffers are owned by the stack; their slice length is the
/// capacity the stack reports.  Callers write a NUL-terminated string
/// into them and never more than `len()` bytes.
pub trait DirectoryPort {
    /// Route asynchronous registration results into the event queue.
    fn set_update_callback(&mut self) -> Result<(), DirectoryError>;

    fn host_name_buffer(&mut self) -> &mut [u8];

    /// Commit the name previously written into `host_name_buffer`.
    fn set_host_name(&mut self) -> Result<(), DirectoryError>;

    fn enable_auto_host_address(&mut self) -> Result<(), DirectoryError>;

    fn allocate_service_entry(&mut self) -> Result<ServiceSlot, DirectoryError>;

    fn instance_name_buffer(&mut self, slot: ServiceSlot) -> &mut [u8];

    fn service_name_buffer(&mut self, slot: ServiceSlot) -> &mut [u8];

    /// Set the advertised port and clear any TXT entries.
    fn configure_service(&mut self, slot: ServiceSlot, port: u16) -> Result<(), DirectoryError>;

    fn add_service(&mut self, slot: ServiceSlot) -> Result<(), DirectoryError>;

    /// Let the client find a server and (re)register on its own.
    fn enable_auto_start(&mut self) -> Result<(), DirectoryError>;
}

// ───────────────────────────────────────────────────────────────
// CoAP transport port (driven adapter: domain → CoAP stack)
// ───────────────────────────────────────────────────────────────

pub trait CoapTransport {
    /// Send `response` to the peer that issued `request`.
    fn send_response(&mut self, request: &Request, response: &Response) -> Result<(), ResponseError>;

    /// The node's mesh-local EID, once the stack has one.
    fn mesh_local_eid(&self) -> Option<[u8; 16]>;
}

// ───────────────────────────────────────────────────────────────
// Identity port (driven adapter: factory data / RNG → domain)
// ───────────────────────────────────────────────────────────────

pub trait IdentityPort {
    /// Factory-assigned IEEE EUI-64.
    fn device_id(&self) -> [u8; 8];

    fn random_u32(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST run [`validate_config`](crate::config::validate_config)
/// before persisting.
pub trait ConfigPort {
    /// Returns [`NodeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("storage i/o"),
        }
    }
}
