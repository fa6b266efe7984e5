//! Reservoir water level by ultrasonic ranging.
//!
//! The ranger looks down at the water surface from the reservoir lid.
//! Distance is reduced from a burst of pings by taking the **median** echo
//! time, which rejects single-ping outliers from lid reflections.
//!
//! ```text
//!   distance:  full_cm ─────────────── empty_cm
//!   level:       100 %  ──────────────    0 %     (clamped outside)
//! ```
//!
//! Calibration is two persisted values, `waterFull` and `waterEmpty`, and
//! must satisfy `0 < full < empty <= MAX_RANGE_CM`.

use log::{info, warn};

use crate::app::ports::{RangingPort, StoragePort};
use crate::error::{Error, Result, TimeoutKind};
use crate::settings::persisted::{PersistedValue, update_pair};

/// Pings per measurement.
pub const PINGS_PER_READING: usize = 10;
/// Round-trip echo time per centimetre of distance.
pub const US_PER_CM: u32 = 57;
/// Echoes are accepted up to this far past the empty mark.
pub const RANGE_MARGIN_CM: u32 = 5;
/// Furthest distance the ranger reports reliably.
pub const MAX_RANGE_CM: f64 = 400.0;

pub const DEFAULT_EMPTY_CM: f64 = 60.0;
pub const DEFAULT_FULL_CM: f64 = 5.0;

/// Linear map of `x` from `[in_min, in_max]` to `[out_min, out_max]`,
/// pinned to the output bounds outside the input interval.
pub fn map_range_clamped(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    if x <= in_min {
        return out_min;
    }
    if x >= in_max {
        return out_max;
    }
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Percentage full for a distance `d` under calibration `(full, empty)`.
pub fn level_percent(d: f64, full_cm: f64, empty_cm: f64) -> f64 {
    100.0 - map_range_clamped(d, full_cm, empty_cm, 0.0, 100.0)
}

/// Median of the valid echo times, as whole centimetres (minimum 1).
pub fn median_distance_cm(echoes_us: &mut [u32]) -> Option<u32> {
    if echoes_us.is_empty() {
        return None;
    }
    echoes_us.sort_unstable();
    let n = echoes_us.len();
    let median_us = if n % 2 == 1 {
        echoes_us[n / 2]
    } else {
        u32::midpoint(echoes_us[n / 2 - 1], echoes_us[n / 2])
    };
    Some(((median_us + US_PER_CM / 2) / US_PER_CM).max(1))
}

pub struct WaterLevelSensor<R> {
    ranger: R,
    empty: PersistedValue,
    full: PersistedValue,
}

impl<R: RangingPort> WaterLevelSensor<R> {
    pub fn new(ranger: R) -> Result<Self> {
        Ok(Self {
            ranger,
            empty: PersistedValue::new("waterEmpty")?,
            full: PersistedValue::new("waterFull")?,
        })
    }

    /// Load calibration, falling back to 60 cm empty / 5 cm full.
    pub fn init(&mut self, store: &impl StoragePort) -> Result<()> {
        self.empty.load(store, DEFAULT_EMPTY_CM)?;
        self.full.load(store, DEFAULT_FULL_CM)?;
        info!(
            "water: calibration full={}cm empty={}cm",
            self.full.value(),
            self.empty.value()
        );
        Ok(())
    }

    /// `(full_cm, empty_cm)`
    pub fn calibration(&self) -> (f64, f64) {
        (self.full.value(), self.empty.value())
    }

    /// Echo cut-off for the current empty mark.  A stored mark outside
    /// the ranger's reach is clamped to it.
    fn max_echo_us(&self) -> u32 {
        let empty_cm = self.empty.value().clamp(0.0, MAX_RANGE_CM) as u32;
        (empty_cm + RANGE_MARGIN_CM) * US_PER_CM
    }

    /// Median distance over a burst of pings; `None` when nothing echoed.
    pub fn water_distance_cm(&mut self) -> Option<u32> {
        let max_us = self.max_echo_us();
        let mut echoes = heapless::Vec::<u32, PINGS_PER_READING>::new();
        for _ in 0..PINGS_PER_READING {
            if let Some(us) = self.ranger.ping_echo_us(max_us).filter(|&us| us <= max_us) {
                // Capacity equals the ping count.
                let _ = echoes.push(us);
            }
        }
        median_distance_cm(&mut echoes)
    }

    /// Write the fill level into `out`.
    ///
    /// No echo yields `Timeout` and leaves `out` untouched.
    pub fn water_level_percent(&mut self, out: &mut f64) -> Result<()> {
        let Some(d) = self.water_distance_cm() else {
            warn!("water: no echo");
            return Err(Error::Timeout(TimeoutKind::NoEcho));
        };
        let (full, empty) = self.calibration();
        *out = level_percent(f64::from(d), full, empty);
        Ok(())
    }

    /// Persist a new calibration.  Both values are checked before either is
    /// written, and a failed second write rolls the first back.
    pub fn update_calibration(
        &mut self,
        store: &mut impl StoragePort,
        full_cm: f64,
        empty_cm: f64,
    ) -> Result<()> {
        if !(full_cm.is_finite() && empty_cm.is_finite()) {
            return Err(Error::InvalidParams("calibration must be finite"));
        }
        if !(full_cm > 0.0 && full_cm < empty_cm && empty_cm <= MAX_RANGE_CM) {
            return Err(Error::InvalidParams("calibration needs 0 < full < empty <= 400"));
        }
        update_pair(store, (&mut self.empty, empty_cm), (&mut self.full, full_cm))?;
        info!("water: calibration updated full={}cm empty={}cm", full_cm, empty_cm);
        Ok(())
    }
}
