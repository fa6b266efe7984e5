//! Capacitive soil moisture probe on ADC1.
//!
//! The probe's output falls as water content rises.  Raw counts are
//! averaged over a long window (probe noise is mostly mains pickup on the
//! cable) and mapped between the in-water and in-air calibration counts.

use embedded_hal::delay::DelayNs;

use crate::app::ports::AdcPort;
use crate::error::Result;
use crate::sensors::water_level::map_range_clamped;

/// Raw count with the probe submerged.
pub const WATER_COUNT: f64 = 100.0;
/// Raw count with the probe in free air.
pub const AIR_COUNT: f64 = 3575.0;

pub const SAMPLES: u32 = 100;
pub const SAMPLE_SPACING_MS: u32 = 10;

/// Moisture % for an averaged raw count.
pub fn counts_to_percent(raw: f64) -> f64 {
    100.0 - map_range_clamped(raw, WATER_COUNT, AIR_COUNT, 0.0, 100.0)
}

pub struct SoilMoistureProbe {
    channel: u32,
}

impl SoilMoistureProbe {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }

    pub fn read_percent(&self, adc: &mut impl AdcPort, delay: &mut impl DelayNs) -> Result<f64> {
        let mut sum = 0.0;
        for _ in 0..SAMPLES {
            sum += f64::from(adc.read_raw(self.channel)?);
            delay.delay_ms(SAMPLE_SPACING_MS);
        }
        Ok(counts_to_percent(sum / f64::from(SAMPLES)))
    }
}
