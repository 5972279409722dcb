//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the whole [`NodeConfig`] is one `postcard`
//! blob under namespace `meshnode`, key `nodecfg`.  Every save and every
//! load goes through [`validate_config`], so a blob written by an older
//! firmware with out-of-range values is reported as corrupted rather than
//! applied.  On host the blob lives in an in-memory map.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{validate_config, NodeConfig};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &core::ffi::CStr = c"meshnode";
const CONFIG_KEY: &core::ffi::CStr = c"nodecfg";

/// Largest blob accepted back from flash.
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<&'static str, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.  A full or version-mismatched partition is
    /// erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from main before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing partition (rc={})", ret);
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NVS: flash initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS(sim): in-memory backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    fn decode(bytes: &[u8]) -> Result<NodeConfig, ConfigError> {
        let cfg: NodeConfig = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
        if let Err(e) = validate_config(&cfg) {
            warn!("NVS: stored config rejected: {}", e);
            return Err(ConfigError::Corrupted);
        }
        Ok(cfg)
    }

    /// Open the config namespace, run `f`, close.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(write: bool, f: impl FnOnce(nvs_handle_t) -> Result<T, i32>) -> Result<T, i32> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: namespace is a NUL-terminated literal.
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_handle(false, |handle| {
            let mut size: usize = 0;
            // SAFETY: a null buffer queries the stored size.
            let ret = unsafe { nvs_get_blob(handle, CONFIG_KEY.as_ptr(), core::ptr::null_mut(), &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe { nvs_get_blob(handle, CONFIG_KEY.as_ptr(), buf.as_mut_ptr().cast(), &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });
        match result {
            Ok(buf) => Ok(Some(buf)),
            // A namespace that was never written cannot be opened read-only.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NVS: read failed (rc={})", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let store = self.store.borrow();
        match store.get("nodecfg") {
            Some(b) if b.len() > MAX_BLOB_SIZE => Err(ConfigError::Corrupted),
            other => Ok(other.cloned()),
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        Self::with_handle(true, |handle| {
            // SAFETY: key is a NUL-terminated literal; bytes outlives the call.
            let ret = unsafe { nvs_set_blob(handle, CONFIG_KEY.as_ptr(), bytes.as_ptr().cast(), bytes.len()) };
            if ret != ESP_OK {
                return Err(ret);
            }
            match unsafe { nvs_commit(handle) } {
                ESP_OK => Ok(()),
                rc => Err(rc),
            }
        })
        .map_err(|rc| {
            warn!("NVS: write failed (rc={})", rc);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.store.borrow_mut().insert("nodecfg", bytes.to_vec());
        Ok(())
    }

    /// Overwrite the stored blob with arbitrary bytes (host only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_put_raw(&self, bytes: &[u8]) {
        self.store.borrow_mut().insert("nodecfg", bytes.to_vec());
    }
}

impl ConfigPort for NvsAdapter {
    /// Stored config, or defaults when nothing was ever saved.
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        match self.read_blob()? {
            Some(bytes) => {
                let cfg = Self::decode(&bytes)?;
                info!("NVS: loaded {:?}/{:?} ({} bytes)", CONFIG_NAMESPACE, CONFIG_KEY, bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NVS: no stored config, using defaults");
                Ok(NodeConfig::default())
            }
        }
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(&bytes)?;
        info!("NVS: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuffixSource;

    #[test]
    fn first_boot_loads_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load().unwrap(), NodeConfig::default());
    }

    #[test]
    fn saved_config_is_loaded_back() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = NodeConfig {
            light_max_active_secs: 30,
            suffix_source: SuffixSource::Random,
            ..Default::default()
        };
        nvs.save(&cfg).unwrap();
        assert_eq!(nvs.load().unwrap(), cfg);
    }

    #[test]
    fn invalid_config_is_not_saved() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = NodeConfig {
            light_max_active_secs: 0,
            ..Default::default()
        };
        assert!(matches!(nvs.save(&cfg), Err(ConfigError::ValidationFailed(_))));
        assert_eq!(nvs.load().unwrap(), NodeConfig::default());
    }

    #[test]
    fn garbage_blob_is_corrupted() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.sim_put_raw(&[0xFF; 7]);
        assert!(matches!(nvs.load(), Err(ConfigError::Corrupted)));
    }

    #[test]
    fn out_of_range_blob_is_corrupted() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = NodeConfig {
            coap_port: 0,
            ..Default::default()
        };
        nvs.sim_put_raw(&postcard::to_allocvec(&cfg).unwrap());
        assert!(matches!(nvs.load(), Err(ConfigError::Corrupted)));
    }
}
