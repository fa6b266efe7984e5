//! Soil NTC thermistor (10 kOhm @ 25 C, B = 3950).
//!
//! Wired in a voltage divider with a fixed 10 kOhm resistor to the top of
//! the 3V3 rail and read through ADC1.  The ESP32 ADC is notably non-linear
//! near both ends of its range, so each averaged raw count is first
//! corrected with a fitted polynomial before the simplified Beta equation
//! converts resistance to temperature.

use crate::app::ports::AdcPort;
use crate::error::{Error, Result, SensorError};

const R25: f64 = 10_000.0;
const BETA: f64 = 3950.0;
const T25_K: f64 = 298.15;
const R_DIVIDER: f64 = 10_000.0;
const V_REF: f64 = 3.3;

/// Samples averaged per reading.
pub const SAMPLES: u32 = 10;

/// Corrected input voltage for a raw 12-bit ESP32 ADC count.
///
/// Counts outside `1..=4095` are rail readings and map to 0 V.
pub fn adc_to_voltage(raw: f64) -> f64 {
    if !(1.0..=4095.0).contains(&raw) {
        return 0.0;
    }
    -0.000_000_000_000_016 * raw.powi(4) + 0.000_000_000_118_171 * raw.powi(3)
        - 0.000_000_301_211_691 * raw.powi(2)
        + 0.001_109_019_271_794 * raw
        + 0.034_143_524_634_089
}

/// Thermistor temperature for a divider output voltage.
pub fn voltage_to_celsius(v: f64) -> Option<f64> {
    if v <= 0.0 || v >= V_REF {
        return None;
    }
    let r_ntc = v * R_DIVIDER / (V_REF - v);
    let inv_t = 1.0 / T25_K + (r_ntc / R25).ln() / BETA;
    (inv_t > 0.0).then(|| 1.0 / inv_t - 273.15)
}

pub struct SoilThermistor {
    channel: u32,
}

impl SoilThermistor {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }

    pub fn read_celsius(&self, adc: &mut impl AdcPort) -> Result<f64> {
        let mut sum = 0.0;
        for _ in 0..SAMPLES {
            sum += f64::from(adc.read_raw(self.channel)?);
        }
        let v = adc_to_voltage(sum / f64::from(SAMPLES));
        voltage_to_celsius(v).ok_or(Error::Sensor(SensorError::OutOfRange))
    }
}
