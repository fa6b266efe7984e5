//! GPIO / peripheral pin assignments for the greenhouse controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Power rails (high-side load switches)
// ---------------------------------------------------------------------------

/// Digital output: enables the 3V3 sensor rail.
pub const RAIL_3V3_GPIO: i32 = 23;
/// Digital output: enables the 9–12 V motor rail.
pub const RAIL_MOTOR_GPIO: i32 = 26;

// ---------------------------------------------------------------------------
// Irrigation pump
// ---------------------------------------------------------------------------

/// Pump MOSFET gate.  Driven HIGH to run; floated (input) when stopped so
/// the gate pull-down holds it off while the motor rail is unpowered.
pub const PUMP_ENABLE_GPIO: i32 = 33;

// ---------------------------------------------------------------------------
// Ultrasonic ranger (HC-SR04 style, reservoir lid mounted)
// ---------------------------------------------------------------------------

pub const RANGER_TRIG_GPIO: i32 = 27;
pub const RANGER_ECHO_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Soil probes (ADC1)
// ---------------------------------------------------------------------------

/// Capacitive soil moisture probe.  ADC1 channel 6 (GPIO 34).
pub const SOIL_MOISTURE_GPIO: i32 = 34;
pub const SOIL_MOISTURE_ADC_CH: u32 = 6;

/// NTC thermistor, 10 kΩ @ 25 °C in a divider.  ADC1 channel 4 (GPIO 32).
pub const SOIL_TEMP_GPIO: i32 = 32;
pub const SOIL_TEMP_ADC_CH: u32 = 4;

// ---------------------------------------------------------------------------
// I²C bus (BME280, CCS811, LC709203F, INA219)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Standard-mode bus clock; the CCS811 clock-stretches above this.
pub const I2C_FREQ_HZ: u32 = 100_000;
