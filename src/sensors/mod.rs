//! Sensor subsystem: individual probes and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor and produces a fresh [`SensorSnapshot`] each
//! wake cycle.  I2C chips are reached through [`SensorDriverPort`]; the
//! soil probes and the reservoir ranger are driven directly.
//!
//! ```text
//!   3V3 rail on ─▶ begin(BME280, CCS811, LC709203F, INA219) ─▶ update_all()
//! ```

pub mod moisture;
pub mod temperature;
pub mod water_level;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::{AdcPort, GpioPort, RangingPort, SensorDriverPort, StoragePort};
use crate::error::{Error, Result, SensorDevice, SensorError};
use crate::pins;
use crate::power::{PowerChannel, PowerSequencer};
use moisture::SoilMoistureProbe;
use temperature::SoilThermistor;
use water_level::WaterLevelSensor;

/// One cycle's worth of readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSnapshot {
    pub air_temperature_c: f64,
    pub air_humidity_pct: f64,
    pub co2_ppm: f64,
    pub battery_soc_pct: f64,
    pub battery_voltage_v: f64,
    pub soil_temperature_c: f64,
    pub soil_moisture_pct: f64,
    /// `None` when the ranger heard no echo this cycle.
    pub water_level_pct: Option<f64>,
    pub solar_voltage_v: f64,
    pub solar_current_ma: f64,
    pub solar_power_mw: f64,
}

/// Retry budget for chip initialisation.
#[derive(Debug, Clone, Copy)]
pub struct InitPolicy {
    pub retries: u8,
    pub retry_ms: u32,
}

pub struct SensorHub<S, A, R> {
    drivers: S,
    adc: A,
    pub water_level: WaterLevelSensor<R>,
    moisture: SoilMoistureProbe,
    soil_temp: SoilThermistor,
    policy: InitPolicy,
}

impl<S, A, R> SensorHub<S, A, R>
where
    S: SensorDriverPort,
    A: AdcPort,
    R: RangingPort,
{
    pub fn new(drivers: S, adc: A, ranger: R, policy: InitPolicy) -> Result<Self> {
        Ok(Self {
            drivers,
            adc,
            water_level: WaterLevelSensor::new(ranger)?,
            moisture: SoilMoistureProbe::new(pins::SOIL_MOISTURE_ADC_CH),
            soil_temp: SoilThermistor::new(pins::SOIL_TEMP_ADC_CH),
            policy,
        })
    }

    /// Load the ranger calibration.  Needs storage only, no power.
    pub fn load_calibration(&mut self, store: &impl StoragePort) -> Result<()> {
        self.water_level.init(store)
    }

    /// Power the sensor rail and bring every chip up, with bounded retries.
    pub fn init<G: GpioPort, D: DelayNs>(&mut self, power: &mut PowerSequencer<G, D>) -> Result<()> {
        power.set(PowerChannel::Logic3v3, true)?;

        for device in SensorDevice::ALL {
            let mut attempt = 1;
            loop {
                match self.drivers.begin(device) {
                    Ok(()) => break,
                    Err(e) if attempt < self.policy.retries => {
                        warn!("sensors: {} begin failed ({}), attempt {}", device, e, attempt);
                        power.delay_mut().delay_ms(self.policy.retry_ms);
                        attempt += 1;
                    }
                    Err(_) => {
                        return Err(SensorError::InitFailed(device).into());
                    }
                }
            }
            info!("sensors: {} ready", device);
        }
        Ok(())
    }

    /// Read everything.  A silent ranger is reported as a missing water
    /// level, not as an error.
    pub fn update_all(&mut self, delay: &mut impl DelayNs) -> Result<SensorSnapshot> {
        let env = self.drivers.read_environment()?;
        let co2_ppm = self.drivers.read_co2_ppm()?;
        let battery = self.drivers.read_battery()?;
        let solar = self.drivers.read_solar()?;
        let soil_temperature_c = self.soil_temp.read_celsius(&mut self.adc)?;
        let soil_moisture_pct = self.moisture.read_percent(&mut self.adc, delay)?;

        let mut level = 0.0;
        let water_level_pct = match self.water_level.water_level_percent(&mut level) {
            Ok(()) => Some(level),
            Err(Error::Timeout(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(SensorSnapshot {
            air_temperature_c: env.temperature_c,
            air_humidity_pct: env.humidity_pct,
            co2_ppm,
            battery_soc_pct: battery.soc_pct,
            battery_voltage_v: battery.cell_voltage_v,
            soil_temperature_c,
            soil_moisture_pct,
            water_level_pct,
            solar_voltage_v: solar.voltage_v,
            solar_current_ma: solar.current_ma,
            solar_power_mw: solar.power_mw,
        })
    }
}
