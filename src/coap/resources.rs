//! Resource table: paths, per-resource request contracts, and payload formats.

use super::{Code, MessageType};

/// The resources this node serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Light / pump actuator.  GET state, PUT command.
    Light,
    /// Latest measurement as one signed byte.
    Temperature,
    /// Firmware version string.
    Info,
    /// Mesh-local address, only while the provisioning window is open.
    Provisioning,
}

/// What a resource accepts.  Anything else is dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contract {
    pub message_type: MessageType,
    pub methods: &'static [Code],
}

impl Resource {
    pub const ALL: [Self; 4] = [Self::Light, Self::Temperature, Self::Info, Self::Provisioning];

    pub const fn path(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Temperature => "temperature",
            Self::Info => "info",
            Self::Provisioning => "provisioning",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    pub const fn contract(self) -> Contract {
        match self {
            Self::Light => Contract {
                message_type: MessageType::NonConfirmable,
                methods: &[Code::Get, Code::Put],
            },
            Self::Temperature | Self::Info | Self::Provisioning => Contract {
                message_type: MessageType::NonConfirmable,
                methods: &[Code::Get],
            },
        }
    }
}

// ── Light commands ────────────────────────────────────────────

/// Single-byte commands accepted by `PUT /light` (ASCII digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LightCommand {
    Off = b'0',
    On = b'1',
    Toggle = b'2',
}

impl LightCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(Self::Off),
            b'1' => Some(Self::On),
            b'2' => Some(Self::Toggle),
            _ => None,
        }
    }
}

// ── Info payload ──────────────────────────────────────────────

pub const INFO_PAYLOAD_LEN: usize = 8;

/// Fixed-length `MAJOR.MINOR.PATCH` string, NUL-padded (cut at 8 bytes).
pub fn firmware_version_payload(version: &str) -> [u8; INFO_PAYLOAD_LEN] {
    let mut out = [0u8; INFO_PAYLOAD_LEN];
    let bytes = version.as_bytes();
    let len = bytes.len().min(INFO_PAYLOAD_LEN);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}
