//! Node configuration parameters
//!
//! All tunable parameters for the mesh node.  Values can be overridden via
//! NVS; every field is range-checked by [`validate_config`] before it is
//! persisted or applied.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Capacity of every advertised name (host, instance, service), in bytes.
pub const NAME_CAPACITY: usize = 32;

/// Bounded name string used for configured and advertised names.
pub type NameString = heapless::String<NAME_CAPACITY>;

/// Where the unique suffix of the advertised names comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuffixSource {
    /// Advertise the configured base names unchanged.
    None,
    /// 32-bit random value, fresh on every boot.
    Random,
    /// Factory-assigned 64-bit EUI, stable per device.
    DeviceId,
}

/// Which physical quantity the `temperature` resource reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementKind {
    /// NTC thermistor on the ADC, degrees Celsius.
    Temperature,
    /// Battery state of charge from the fuel gauge, percent.
    BatteryCharge,
    /// Bench source that walks between 16 and 39 °C.
    Simulated,
}

/// Backoff policy for re-running a failed service registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub first_delay_secs: u32,
    /// Upper bound for the doubling delay.
    pub max_delay_secs: u32,
    /// Retries after the initial attempt before giving up.
    pub max_attempts: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            first_delay_secs: 2,
            max_delay_secs: 60,
            max_attempts: 5,
        }
    }
}

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Service registration ---
    /// Base SRP host name; a suffix is appended per [`SuffixSource`]
    pub host_name: NameString,
    /// Base SRP service instance name
    pub service_instance: NameString,
    /// SRP service type
    pub service_name: NameString,
    /// Port advertised in the SRP service record
    pub service_port: u16,
    /// Suffix appended to host and instance names
    pub suffix_source: SuffixSource,
    /// Re-run a failed registration with backoff (`None` = one attempt per boot)
    pub registration_retry: Option<RetryPolicy>,

    // --- CoAP ---
    /// UDP port the CoAP resources listen on
    pub coap_port: u16,

    // --- Actuator ---
    /// Maximum time the light/pump may stay on without a new command (seconds)
    pub light_max_active_secs: u16,

    // --- Sensor ---
    /// Source behind the `temperature` resource
    pub measurement: MeasurementKind,
    /// Background refresh period for the cached reading (seconds, 0 = off)
    pub sensor_refresh_secs: u32,

    // --- Provisioning ---
    /// How long the provisioning window stays open after a button press (seconds)
    pub provisioning_window_secs: u16,
    /// Provisioning LED blink half-period (milliseconds)
    pub provisioning_blink_ms: u16,
}

fn name(s: &str) -> NameString {
    let mut n = NameString::new();
    let _ = n.push_str(s);
    n
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Service registration
            host_name: name("meshnode"),
            service_instance: name("meshnode"),
            service_name: name("_ot._udp"),
            service_port: 49154,
            suffix_source: SuffixSource::DeviceId,
            registration_retry: None,

            // CoAP
            coap_port: 5683,

            // Actuator
            light_max_active_secs: 10,

            // Sensor
            measurement: MeasurementKind::Simulated,
            sensor_refresh_secs: 0, // disabled

            // Provisioning
            provisioning_window_secs: 5,
            provisioning_blink_ms: 100,
        }
    }
}

impl NodeConfig {
    pub fn light_max_active(&self) -> Duration {
        Duration::from_secs(u64::from(self.light_max_active_secs))
    }

    /// Background refresh period, `None` when disabled.
    pub fn sensor_refresh(&self) -> Option<Duration> {
        (self.sensor_refresh_secs > 0)
            .then(|| Duration::from_secs(u64::from(self.sensor_refresh_secs)))
    }

    pub fn provisioning_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.provisioning_window_secs))
    }

    pub fn provisioning_blink(&self) -> Duration {
        Duration::from_millis(u64::from(self.provisioning_blink_ms))
    }
}

// ── Validation ────────────────────────────────────────────────

fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn is_service_type(s: &str) -> bool {
    s.starts_with('_')
        && (s.ends_with("._udp") || s.ends_with("._tcp"))
        && s.len() >= "_x._udp".len()
}

/// Range-check every field.  Invalid values are rejected, never clamped.
pub fn validate_config(cfg: &NodeConfig) -> Result<(), ConfigError> {
    if !is_dns_label(&cfg.host_name) {
        return Err(ConfigError::ValidationFailed(
            "host_name must be a non-empty DNS label (A-Z, a-z, 0-9, '-')",
        ));
    }
    if cfg.service_instance.is_empty() || !is_printable_ascii(&cfg.service_instance) {
        return Err(ConfigError::ValidationFailed(
            "service_instance must be non-empty printable ASCII",
        ));
    }
    if !is_service_type(&cfg.service_name) {
        return Err(ConfigError::ValidationFailed(
            "service_name must look like _name._udp or _name._tcp",
        ));
    }
    if cfg.service_port == 0 {
        return Err(ConfigError::ValidationFailed("service_port must be non-zero"));
    }
    if cfg.coap_port == 0 {
        return Err(ConfigError::ValidationFailed("coap_port must be non-zero"));
    }
    if !(1..=3600).contains(&cfg.light_max_active_secs) {
        return Err(ConfigError::ValidationFailed(
            "light_max_active_secs must be 1–3600",
        ));
    }
    if cfg.sensor_refresh_secs > 86_400 {
        return Err(ConfigError::ValidationFailed(
            "sensor_refresh_secs must be 0–86400",
        ));
    }
    if !(1..=120).contains(&cfg.provisioning_window_secs) {
        return Err(ConfigError::ValidationFailed(
            "provisioning_window_secs must be 1–120",
        ));
    }
    if !(20..=2000).contains(&cfg.provisioning_blink_ms) {
        return Err(ConfigError::ValidationFailed(
            "provisioning_blink_ms must be 20–2000",
        ));
    }
    if let Some(retry) = cfg.registration_retry {
        if !(1..=3600).contains(&retry.first_delay_secs) {
            return Err(ConfigError::ValidationFailed(
                "registration_retry.first_delay_secs must be 1–3600",
            ));
        }
        if retry.max_delay_secs < retry.first_delay_secs || retry.max_delay_secs > 86_400 {
            return Err(ConfigError::ValidationFailed(
                "registration_retry.max_delay_secs must be first_delay_secs–86400",
            ));
        }
        if !(1..=20).contains(&retry.max_attempts) {
            return Err(ConfigError::ValidationFailed(
                "registration_retry.max_attempts must be 1–20",
            ));
        }
    }
    Ok(())
}
