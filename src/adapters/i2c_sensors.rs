//! I2C sensor chips behind [`SensorDriverPort`].
//!
//! | Chip      | Addr | Provides                          |
//! |-----------|------|-----------------------------------|
//! | BME280    | 0x76 | air temperature, humidity         |
//! | CCS811    | 0x5A | eCO2                              |
//! | LC709203F | 0x0B | battery state of charge, voltage  |
//! | INA219    | 0x40 | solar panel voltage/current/power |
//!
//! Generic over any `embedded_hal::i2c::I2c`, so the same code runs on the
//! board (`esp_idf_hal::i2c::I2cDriver` shared through
//! `embedded_hal_bus::i2c::RefCellDevice`) and in host tests.  The BME280
//! goes through the `bme280` driver crate; the other three chips are
//! driven at register level, touching only what the firmware needs.

use bme280::i2c::BME280;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, warn};

use crate::app::ports::{BatteryStatus, Environment, SensorDriverPort, SolarStatus};
use crate::error::{SensorDevice, SensorError};

// ───────────────────────────────────────────────────────────────
// Register maps
// ───────────────────────────────────────────────────────────────

mod ccs811 {
    pub const ADDR: u8 = 0x5A;
    pub const HW_ID: u8 = 0x81;
    pub const REG_STATUS: u8 = 0x00;
    pub const REG_MEAS_MODE: u8 = 0x01;
    pub const REG_ALG_RESULT: u8 = 0x02;
    pub const REG_BASELINE: u8 = 0x11;
    pub const REG_HW_ID: u8 = 0x20;
    pub const REG_APP_START: u8 = 0xF4;
    pub const STATUS_ERROR: u8 = 0x01;
    pub const STATUS_DATA_READY: u8 = 0x08;
    pub const STATUS_FW_MODE: u8 = 0x80;
    /// Drive mode 1: one measurement per second.
    pub const MEAS_MODE_1S: u8 = 0x10;
    /// Known-good baseline for this enclosure, rewritten before each read.
    pub const BASELINE: u16 = 0x3480;
    pub const READY_POLLS: u8 = 10;
    pub const READY_POLL_MS: u32 = 500;
}

mod lc709203f {
    pub const ADDR: u8 = 0x0B;
    pub const REG_APA: u8 = 0x0B;
    pub const REG_CELL_VOLTAGE: u8 = 0x09;
    pub const REG_CELL_ITE: u8 = 0x0F;
    pub const REG_IC_VERSION: u8 = 0x11;
    pub const REG_PROFILE: u8 = 0x12;
    pub const REG_ALARM_VOLTAGE: u8 = 0x14;
    pub const REG_POWER_MODE: u8 = 0x15;
    pub const POWER_OPERATIONAL: u16 = 0x0001;
    /// Adjustment pack application value for a 2000 mAh cell.
    pub const APA_2000MAH: u16 = 0x2D;
    /// 3.7 V nominal, 4.2 V charge.
    pub const PROFILE_3V7_4V2: u16 = 0x0001;
    pub const ALARM_MV: u16 = 3_400;
}

mod ina219 {
    pub const ADDR: u8 = 0x40;
    pub const REG_CONFIG: u8 = 0x00;
    pub const REG_BUS_VOLTAGE: u8 = 0x02;
    pub const REG_POWER: u8 = 0x03;
    pub const REG_CURRENT: u8 = 0x04;
    pub const REG_CALIBRATION: u8 = 0x05;
    /// 32 V range, /8 gain, 12-bit, shunt and bus continuous.
    pub const CONFIG_32V_2A: u16 = 0x399F;
    /// 0.1 Ω shunt, 100 µA current LSB.
    pub const CALIBRATION_32V_2A: u16 = 4_096;
    pub const CURRENT_LSB_MA: f64 = 0.1;
    pub const POWER_LSB_MW: f64 = 2.0;
}

// ───────────────────────────────────────────────────────────────
// Gas gauge framing
// ───────────────────────────────────────────────────────────────

/// CRC-8 (poly 0x07, init 0) used by the LC709203F on every word.
fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |mut crc, b| {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
        crc
    })
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct I2cSensors<I, D> {
    bus: I,
    climate: BME280<I>,
    delay: D,
    climate_ready: bool,
    co2_ready: bool,
    gauge_ready: bool,
    solar_ready: bool,
}

impl<I: I2c, D: DelayNs> I2cSensors<I, D> {
    /// `bus` and `climate_bus` are two handles on the same physical bus;
    /// the BME280 driver owns the second one.
    pub fn new(bus: I, climate_bus: I, delay: D) -> Self {
        Self {
            bus,
            climate: BME280::new_primary(climate_bus),
            delay,
            climate_ready: false,
            co2_ready: false,
            gauge_ready: false,
            solar_ready: false,
        }
    }

    // ── raw access ────────────────────────────────────────────

    fn read_regs(&mut self, dev: SensorDevice, addr: u8, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.bus.write_read(addr, &[reg], buf).map_err(|e| {
            debug!("i2c: {} read 0x{:02x} failed: {:?}", dev, reg, e);
            SensorError::ReadFailed(dev)
        })
    }

    fn write_regs(&mut self, dev: SensorDevice, addr: u8, bytes: &[u8]) -> Result<(), SensorError> {
        self.bus.write(addr, bytes).map_err(|e| {
            debug!("i2c: {} write failed: {:?}", dev, e);
            SensorError::ReadFailed(dev)
        })
    }

    fn read_u8(&mut self, dev: SensorDevice, addr: u8, reg: u8) -> Result<u8, SensorError> {
        let mut b = [0u8; 1];
        self.read_regs(dev, addr, reg, &mut b)?;
        Ok(b[0])
    }

    fn read_be16(&mut self, dev: SensorDevice, addr: u8, reg: u8) -> Result<u16, SensorError> {
        let mut b = [0u8; 2];
        self.read_regs(dev, addr, reg, &mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    fn write_be16(&mut self, dev: SensorDevice, addr: u8, reg: u8, value: u16) -> Result<(), SensorError> {
        let [hi, lo] = value.to_be_bytes();
        self.write_regs(dev, addr, &[reg, hi, lo])
    }

    fn gauge_read(&mut self, reg: u8) -> Result<u16, SensorError> {
        let dev = SensorDevice::GasGauge;
        let mut b = [0u8; 3];
        self.read_regs(dev, lc709203f::ADDR, reg, &mut b)?;
        let addr_w = lc709203f::ADDR << 1;
        if crc8(&[addr_w, reg, addr_w | 1, b[0], b[1]]) != b[2] {
            warn!("i2c: {} crc mismatch on 0x{:02x}", dev, reg);
            return Err(SensorError::ReadFailed(dev));
        }
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn gauge_write(&mut self, reg: u8, value: u16) -> Result<(), SensorError> {
        let [lo, hi] = value.to_le_bytes();
        let crc = crc8(&[lc709203f::ADDR << 1, reg, lo, hi]);
        self.write_regs(SensorDevice::GasGauge, lc709203f::ADDR, &[reg, lo, hi, crc])
    }

    // ── per-chip bring-up ─────────────────────────────────────

    fn begin_climate(&mut self) -> Result<(), SensorError> {
        let dev = SensorDevice::Climate;
        // Soft reset, chip id check, trim readout, forced-mode config.
        self.climate.init(&mut self.delay).map_err(|e| {
            debug!("i2c: {} init failed: {:?}", dev, e);
            SensorError::InitFailed(dev)
        })?;
        self.climate_ready = true;
        Ok(())
    }

    fn begin_co2(&mut self) -> Result<(), SensorError> {
        use ccs811::*;
        let dev = SensorDevice::Co2;
        if self.read_u8(dev, ADDR, REG_HW_ID)? != HW_ID {
            return Err(SensorError::InitFailed(dev));
        }
        self.write_regs(dev, ADDR, &[REG_APP_START])?;
        self.delay.delay_ms(2);
        if self.read_u8(dev, ADDR, REG_STATUS)? & STATUS_FW_MODE == 0 {
            warn!("i2c: {} stayed in boot mode", dev);
            return Err(SensorError::InitFailed(dev));
        }
        self.write_regs(dev, ADDR, &[REG_MEAS_MODE, MEAS_MODE_1S])?;
        self.co2_ready = true;
        Ok(())
    }

    fn begin_gauge(&mut self) -> Result<(), SensorError> {
        use lc709203f::*;
        let version = self.gauge_read(REG_IC_VERSION)?;
        debug!("i2c: LC709203F ic version 0x{:04x}", version);
        self.gauge_write(REG_POWER_MODE, POWER_OPERATIONAL)?;
        self.gauge_write(REG_APA, APA_2000MAH)?;
        self.gauge_write(REG_ALARM_VOLTAGE, ALARM_MV)?;
        self.gauge_write(REG_PROFILE, PROFILE_3V7_4V2)?;
        self.gauge_ready = true;
        Ok(())
    }

    fn begin_solar(&mut self) -> Result<(), SensorError> {
        use ina219::*;
        let dev = SensorDevice::SolarMonitor;
        self.write_be16(dev, ADDR, REG_CONFIG, CONFIG_32V_2A)?;
        self.write_be16(dev, ADDR, REG_CALIBRATION, CALIBRATION_32V_2A)?;
        if self.read_be16(dev, ADDR, REG_CONFIG)? != CONFIG_32V_2A {
            return Err(SensorError::InitFailed(dev));
        }
        self.solar_ready = true;
        Ok(())
    }
}

impl<I: I2c, D: DelayNs> SensorDriverPort for I2cSensors<I, D> {
    fn begin(&mut self, device: SensorDevice) -> Result<(), SensorError> {
        match device {
            SensorDevice::Climate => self.begin_climate(),
            SensorDevice::Co2 => self.begin_co2(),
            SensorDevice::GasGauge => self.begin_gauge(),
            SensorDevice::SolarMonitor => self.begin_solar(),
        }
    }

    fn read_environment(&mut self) -> Result<Environment, SensorError> {
        let dev = SensorDevice::Climate;
        if !self.climate_ready {
            return Err(SensorError::ReadFailed(dev));
        }
        let m = self.climate.measure(&mut self.delay).map_err(|e| {
            debug!("i2c: {} measure failed: {:?}", dev, e);
            SensorError::ReadFailed(dev)
        })?;
        Ok(Environment {
            temperature_c: f64::from(m.temperature),
            humidity_pct: f64::from(m.humidity).clamp(0.0, 100.0),
        })
    }

    fn read_co2_ppm(&mut self) -> Result<f64, SensorError> {
        use ccs811::*;
        let dev = SensorDevice::Co2;
        if !self.co2_ready {
            return Err(SensorError::ReadFailed(dev));
        }
        let [hi, lo] = BASELINE.to_be_bytes();
        self.write_regs(dev, ADDR, &[REG_BASELINE, hi, lo])?;

        for poll in 0..READY_POLLS {
            let status = self.read_u8(dev, ADDR, REG_STATUS)?;
            if status & STATUS_ERROR != 0 {
                return Err(SensorError::ReadFailed(dev));
            }
            if status & STATUS_DATA_READY != 0 {
                let mut r = [0u8; 2];
                self.read_regs(dev, ADDR, REG_ALG_RESULT, &mut r)?;
                return Ok(f64::from(u16::from_be_bytes(r)));
            }
            debug!("i2c: {} not ready (poll {})", dev, poll + 1);
            self.delay.delay_ms(READY_POLL_MS);
        }
        Err(SensorError::ReadFailed(dev))
    }

    fn read_battery(&mut self) -> Result<BatteryStatus, SensorError> {
        if !self.gauge_ready {
            return Err(SensorError::ReadFailed(SensorDevice::GasGauge));
        }
        let ite = self.gauge_read(lc709203f::REG_CELL_ITE)?;
        let mv = self.gauge_read(lc709203f::REG_CELL_VOLTAGE)?;
        Ok(BatteryStatus {
            soc_pct: f64::from(ite) / 10.0,
            cell_voltage_v: f64::from(mv) / 1_000.0,
        })
    }

    fn read_solar(&mut self) -> Result<SolarStatus, SensorError> {
        use ina219::*;
        let dev = SensorDevice::SolarMonitor;
        if !self.solar_ready {
            return Err(SensorError::ReadFailed(dev));
        }
        let bus = self.read_be16(dev, ADDR, REG_BUS_VOLTAGE)?;
        let current = self.read_be16(dev, ADDR, REG_CURRENT)? as i16;
        let power = self.read_be16(dev, ADDR, REG_POWER)?;
        Ok(SolarStatus {
            voltage_v: f64::from((bus >> 3) * 4) / 1_000.0,
            current_ma: f64::from(current) * CURRENT_LSB_MA,
            power_mw: f64::from(power) * POWER_LSB_MW,
        })
    }
}
