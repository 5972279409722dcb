//! Advertised device identity.
//!
//! The SRP host and instance names are the configured base names plus a
//! `-<hex>` suffix so that several nodes can share one configuration:
//!
//! | Source     | Suffix                          | Example                      |
//! |------------|---------------------------------|------------------------------|
//! | `None`     | —                               | `meshnode`                   |
//! | `Random`   | 8 hex digits, new every boot    | `meshnode-5f0c21ab`          |
//! | `DeviceId` | 16 hex digits of the EUI-64     | `meshnode-f4ce36000012ab9c`  |
//!
//! The result is bounded by the name capacity.  When the suffix does not
//! fit it is shortened; the base name is never cut.

use core::fmt::Write;

use log::{info, warn};

use crate::app::ports::IdentityPort;
use crate::config::{NameString, SuffixSource};

pub const SUFFIX_SEPARATOR: char = '-';

/// Longest suffix (EUI-64 in hex).
pub type Suffix = heapless::String<16>;

/// Names the node registers under.  Computed once, then immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub host_name: NameString,
    pub instance_name: NameString,
}

/// Hex suffix for `source`; empty for [`SuffixSource::None`].
pub fn suffix_for(source: SuffixSource, ids: &mut impl IdentityPort) -> Suffix {
    let mut s = Suffix::new();
    match source {
        SuffixSource::None => {}
        SuffixSource::Random => {
            let _ = write!(s, "{:08x}", ids.random_u32());
        }
        SuffixSource::DeviceId => {
            for b in ids.device_id() {
                let _ = write!(s, "{b:02x}");
            }
        }
    }
    s
}

/// `base` + separator + as much of `suffix` as fits in `N` bytes.
///
/// If not even one suffix character fits, the separator is left out too.
/// A base longer than `N` is itself cut at `N` bytes; configured base
/// names are [`NameString`]s and always fit.
pub fn append_suffix<const N: usize>(base: &str, suffix: &str) -> heapless::String<N> {
    let mut out = heapless::String::<N>::new();
    for ch in base.chars() {
        if out.push(ch).is_err() {
            warn!("IDENTITY: base name '{}' exceeds {} bytes", base, N);
            return out;
        }
    }
    if suffix.is_empty() {
        return out;
    }

    let room = N - out.len();
    if room < SUFFIX_SEPARATOR.len_utf8() + 1 {
        warn!("IDENTITY: no room for suffix after '{}'", base);
        return out;
    }
    let _ = out.push(SUFFIX_SEPARATOR);
    let take = suffix.len().min(room - SUFFIX_SEPARATOR.len_utf8());
    if take < suffix.len() {
        warn!(
            "IDENTITY: suffix cut to {} of {} chars for '{}'",
            take,
            suffix.len(),
            base
        );
    }
    // Suffixes are ASCII hex, so a byte index is a char boundary.
    let _ = out.push_str(&suffix[..take]);
    out
}

/// Build the advertised names.  Deterministic for a given device and
/// source, except that `Random` draws a new value on every call.
pub fn compute_identity(
    base_host: &str,
    base_instance: &str,
    source: SuffixSource,
    ids: &mut impl IdentityPort,
) -> DeviceIdentity {
    let suffix = suffix_for(source, ids);
    let identity = DeviceIdentity {
        host_name: append_suffix(base_host, &suffix),
        instance_name: append_suffix(base_instance, &suffix),
    };
    info!(
        "IDENTITY: host '{}', instance '{}' ({:?})",
        identity.host_name, identity.instance_name, source
    );
    identity
}
