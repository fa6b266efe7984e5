//! A single named `f64` that survives deep sleep.
//!
//! Values are stored as 8 little-endian bytes under the key `name` in the
//! [`NAMESPACE`] namespace.  The in-RAM cache only changes after the store
//! accepted the write, so a failed update never leaves the cache ahead of
//! flash.

use log::{debug, error, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::error::{Error, Result};

/// NVS namespace shared by every persisted value.
pub const NAMESPACE: &str = "greenhouse";
/// NVS key length limit.
pub const MAX_NAME_LEN: usize = 15;

#[derive(Debug, Clone)]
pub struct PersistedValue {
    name: &'static str,
    value: f64,
}

impl PersistedValue {
    /// Bind a value to storage key `name`.  The cache starts at `0.0`
    /// until [`load`](Self::load) runs.
    pub fn new(name: &'static str) -> Result<Self> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(Error::InvalidParams("config value name must be 1-15 bytes"));
        }
        Ok(Self { name, value: 0.0 })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cached value.  Never touches storage.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Refresh the cache from storage, falling back to `default` when the
    /// key has never been written.
    pub fn load(&mut self, store: &impl StoragePort, default: f64) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.value = match store.read(NAMESPACE, self.name, &mut buf) {
            Ok(8) => f64::from_le_bytes(buf),
            Ok(n) => {
                warn!("config: '{}' has {} bytes, expected 8", self.name, n);
                return Err(Error::Config("stored value has wrong size"));
            }
            Err(StorageError::NotFound) => {
                debug!("config: '{}' unset, default {}", self.name, default);
                default
            }
            Err(e) => {
                error!("config: failed to read '{}': {}", self.name, e);
                return Err(e.into());
            }
        };
        Ok(self.value)
    }

    /// Write `value` through to storage, then cache it.
    pub fn update(&mut self, store: &mut impl StoragePort, value: f64) -> Result<()> {
        store
            .write(NAMESPACE, self.name, &value.to_le_bytes())
            .map_err(|e| {
                error!("config: failed to write '{}': {}", self.name, e);
                Error::from(e)
            })?;
        self.value = value;
        Ok(())
    }
}

/// Commit two values as a unit.
///
/// Writes `first` then `second`; if the second write fails the first is
/// restored to its previous value so storage never holds a mixed pair.
pub fn update_pair(
    store: &mut impl StoragePort,
    first: (&mut PersistedValue, f64),
    second: (&mut PersistedValue, f64),
) -> Result<()> {
    let (a, a_new) = first;
    let (b, b_new) = second;
    let a_prev = a.value();

    a.update(store, a_new)?;
    if let Err(e) = b.update(store, b_new) {
        if let Err(rb) = a.update(store, a_prev) {
            error!("config: rollback of '{}' failed: {}", a.name(), rb);
        }
        return Err(e);
    }
    Ok(())
}
