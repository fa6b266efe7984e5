//! Operator-tunable irrigation settings.
//!
//! Each setting is an individually persisted `f64` so that the remote
//! resync and the shell can change one without rewriting the rest.
//!
//! | Key             | Meaning                          | Default          |
//! |-----------------|----------------------------------|------------------|
//! | `waterThresh`   | soil moisture % to water below   | unconfigured     |
//! | `waterDuration` | pump run time (seconds)          | unconfigured     |
//! | `waterStartHr`  | first hour watering is allowed   | 0                |
//! | `waterEndHr`    | hour watering stops being allowed| 24               |
//! | `waterMinSOC`   | minimum battery SOC to water     | 0                |

pub mod persisted;

use log::info;

use crate::app::ports::StoragePort;
use crate::error::{Error, Result};
use persisted::{PersistedValue, update_pair};

/// Stored in place of a threshold or duration nobody has set yet.
pub const UNCONFIGURED: f64 = -1.0;
/// Upper bound accepted for a remotely pushed watering duration.
pub const MAX_WATERING_SECS: f64 = 3600.0;

pub struct IrrigationSettings {
    threshold: PersistedValue,
    duration: PersistedValue,
    start_hour: PersistedValue,
    end_hour: PersistedValue,
    min_soc: PersistedValue,
}

impl IrrigationSettings {
    pub fn new() -> Result<Self> {
        Ok(Self {
            threshold: PersistedValue::new("waterThresh")?,
            duration: PersistedValue::new("waterDuration")?,
            start_hour: PersistedValue::new("waterStartHr")?,
            end_hour: PersistedValue::new("waterEndHr")?,
            min_soc: PersistedValue::new("waterMinSOC")?,
        })
    }

    /// Load every setting.  Any storage failure aborts the load.
    pub fn load(&mut self, store: &impl StoragePort) -> Result<()> {
        self.threshold.load(store, UNCONFIGURED)?;
        self.duration.load(store, UNCONFIGURED)?;
        self.start_hour.load(store, 0.0)?;
        self.end_hour.load(store, 24.0)?;
        self.min_soc.load(store, 0.0)?;
        info!(
            "settings: threshold={:?} duration={:?} hours={}..{} min_soc={}",
            self.threshold(),
            self.duration_secs(),
            self.start_hour.value(),
            self.end_hour.value(),
            self.min_soc.value()
        );
        Ok(())
    }

    /// Soil-moisture threshold, `None` while unconfigured.
    pub fn threshold(&self) -> Option<f64> {
        configured(self.threshold.value())
    }

    /// Watering duration in seconds, `None` while unconfigured.
    pub fn duration_secs(&self) -> Option<f64> {
        configured(self.duration.value())
    }

    pub fn water_hours(&self) -> (f64, f64) {
        (self.start_hour.value(), self.end_hour.value())
    }

    pub fn min_soc(&self) -> f64 {
        self.min_soc.value()
    }

    /// Whether threshold-driven watering may run now.
    ///
    /// An unsynced clock does not block watering.
    pub fn watering_permitted(&self, hour: Option<u8>, soc_pct: f64) -> bool {
        let (start, end) = self.water_hours();
        let in_window = hour.is_none_or(|h| {
            let h = f64::from(h);
            h >= start && h < end
        });
        in_window && soc_pct >= self.min_soc()
    }

    /// Validate and atomically commit a remotely pushed threshold/duration.
    pub fn apply_remote(
        &mut self,
        store: &mut impl StoragePort,
        threshold: f64,
        duration_secs: f64,
    ) -> Result<()> {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(Error::Config("threshold must be 0-100 %"));
        }
        if !(duration_secs > 0.0 && duration_secs <= MAX_WATERING_SECS) {
            return Err(Error::Config("duration must be 1-3600 s"));
        }
        update_pair(
            store,
            (&mut self.threshold, threshold),
            (&mut self.duration, duration_secs),
        )?;
        info!("settings: threshold={} duration={}s", threshold, duration_secs);
        Ok(())
    }

    pub fn set_water_hours(&mut self, store: &mut impl StoragePort, start: f64, end: f64) -> Result<()> {
        let valid_hour = |h: f64| (0.0..=24.0).contains(&h) && h.fract() == 0.0;
        if !valid_hour(start) || !valid_hour(end) || start >= end {
            return Err(Error::InvalidParams("hours must be whole, 0-24, start < end"));
        }
        update_pair(store, (&mut self.start_hour, start), (&mut self.end_hour, end))?;
        info!("settings: water hours {}..{}", start, end);
        Ok(())
    }

    pub fn set_min_soc(&mut self, store: &mut impl StoragePort, soc_pct: f64) -> Result<()> {
        if !(0.0..=100.0).contains(&soc_pct) {
            return Err(Error::InvalidParams("SOC must be 0-100 %"));
        }
        self.min_soc.update(store, soc_pct)?;
        info!("settings: min SOC {}", soc_pct);
        Ok(())
    }
}

fn configured(v: f64) -> Option<f64> {
    (v >= 0.0).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;

    fn loaded() -> (IrrigationSettings, NvsAdapter) {
        let nvs = NvsAdapter::new().unwrap();
        let mut s = IrrigationSettings::new().unwrap();
        s.load(&nvs).unwrap();
        (s, nvs)
    }

    #[test]
    fn fresh_device_is_unconfigured() {
        let (s, _) = loaded();
        assert_eq!(s.threshold(), None);
        assert_eq!(s.duration_secs(), None);
        assert_eq!(s.water_hours(), (0.0, 24.0));
    }

    #[test]
    fn apply_remote_validates_before_writing() {
        let (mut s, mut nvs) = loaded();
        assert!(s.apply_remote(&mut nvs, 130.0, 60.0).is_err());
        assert!(s.apply_remote(&mut nvs, 30.0, 0.0).is_err());
        assert!(!nvs.exists(persisted::NAMESPACE, "waterThresh"));

        s.apply_remote(&mut nvs, 30.0, 60.0).unwrap();
        assert_eq!(s.threshold(), Some(30.0));
        assert_eq!(s.duration_secs(), Some(60.0));
    }

    #[test]
    fn water_window_gates_by_hour_and_soc() {
        let (mut s, mut nvs) = loaded();
        s.set_water_hours(&mut nvs, 6.0, 10.0).unwrap();
        s.set_min_soc(&mut nvs, 40.0).unwrap();

        assert!(s.watering_permitted(Some(6), 50.0));
        assert!(!s.watering_permitted(Some(10), 50.0));
        assert!(!s.watering_permitted(Some(7), 39.9));
        assert!(s.watering_permitted(None, 40.0));
    }

    #[test]
    fn rejects_inverted_hours() {
        let (mut s, mut nvs) = loaded();
        assert!(s.set_water_hours(&mut nvs, 10.0, 6.0).is_err());
        assert!(s.set_water_hours(&mut nvs, 0.0, 25.0).is_err());
        assert_eq!(s.water_hours(), (0.0, 24.0));
    }
}
