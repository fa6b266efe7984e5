//! Unified error types for the greenhouse firmware.
//!
//! Every subsystem converts into the single [`Error`] enum so the wake-cycle
//! coordinator can treat failures uniformly.  All variants are `Copy`; they
//! are passed through the cycle report and the shell without allocation.
//!
//! [`Status`] is the coarse three-way outcome (`InvalidParams` / `Fail` /
//! `Timeout`) that log lines and shell replies are phrased in.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Coarse status taxonomy
// ---------------------------------------------------------------------------

/// Outcome classes reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    InvalidParams,
    Fail,
    Timeout,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::InvalidParams => write!(f, "INVALID_PARAMS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A caller passed an argument outside its contract.
    InvalidParams(&'static str),
    /// A sensor could not be initialised or read.
    Sensor(SensorError),
    /// An actuator or power rail command failed.
    Actuator(ActuatorError),
    /// A network or remote-shell operation failed.
    Comms(CommsError),
    /// The key/value store rejected a read or write.
    Storage(StorageError),
    /// A stored or remote configuration value is unusable.
    Config(&'static str),
    /// A bounded wait expired without a result.
    Timeout(TimeoutKind),
}

impl Error {
    /// Project onto the operator-facing status taxonomy.
    pub const fn status(&self) -> Status {
        match self {
            Self::InvalidParams(_) => Status::InvalidParams,
            Self::Timeout(_) => Status::Timeout,
            _ => Status::Fail,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParams(msg) => write!(f, "invalid params: {msg}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Timeout(kind) => write!(f, "timeout: {kind}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Driver `begin()` kept failing after all retries.
    InitFailed(SensorDevice),
    /// A bus transaction or conversion failed.
    ReadFailed(SensorDevice),
    /// ADC read returned an error.
    AdcReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed(dev) => write!(f, "{dev} init failed"),
            Self::ReadFailed(dev) => write!(f, "{dev} read failed"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

/// The external sensor chips sitting on the I2C bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorDevice {
    /// BME280 air temperature / humidity.
    Climate,
    /// CCS811 eCO2.
    Co2,
    /// LC709203F battery fuel gauge.
    GasGauge,
    /// INA219 solar panel monitor.
    SolarMonitor,
}

impl SensorDevice {
    /// Initialisation order used by the sensor hub.
    pub const ALL: [Self; 4] = [Self::Climate, Self::Co2, Self::GasGauge, Self::SolarMonitor];
}

impl fmt::Display for SensorDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Climate => write!(f, "BME280"),
            Self::Co2 => write!(f, "CCS811"),
            Self::GasGauge => write!(f, "LC709203F"),
            Self::SolarMonitor => write!(f, "INA219"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO configuration failed.
    GpioConfigFailed,
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioConfigFailed => write!(f, "GPIO config failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    MqttConnectFailed,
    MqttDisconnected,
    MqttPublishFailed,
    MqttSubscribeFailed,
    /// No value arrived on the set topic within the poll budget.
    NoResponse,
    ShellStartFailed,
    ShellIo,
    ShellDisconnected,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::MqttConnectFailed => write!(f, "MQTT connect failed"),
            Self::MqttDisconnected => write!(f, "MQTT disconnected"),
            Self::MqttPublishFailed => write!(f, "MQTT publish failed"),
            Self::MqttSubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::NoResponse => write!(f, "no response on set topic"),
            Self::ShellStartFailed => write!(f, "shell listener failed to start"),
            Self::ShellIo => write!(f, "shell I/O error"),
            Self::ShellDisconnected => write!(f, "shell peer disconnected"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The ultrasonic ranger heard no echo.
    NoEcho,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEcho => write!(f, "no echo"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
