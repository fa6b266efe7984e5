//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Coordinator (domain)
//! ```
//!
//! Driven adapters (GPIO, ADC, I2C sensors, MQTT, NVS, telnet, logger) implement
//! these traits.  The [`Coordinator`](super::service::Coordinator) and the
//! domain components consume them via generics, so the domain core never
//! touches hardware directly and every wake cycle can be replayed against
//! recording fakes on the host.
//!
//! Blocking waits are not a port of their own: every component that must
//! honour a settle or backoff delay takes an [`embedded_hal::delay::DelayNs`].
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - All port errors are typed; callers must handle every variant explicitly.

use core::net::Ipv4Addr;

use crate::config::SystemConfig;
use crate::error::{ActuatorError, CommsError, SensorDevice, SensorError};

// ───────────────────────────────────────────────────────────────
// GPIO port (driven adapter: domain → pins)
// ───────────────────────────────────────────────────────────────

/// Minimal digital-output surface needed by rail switches and the pump.
pub trait GpioPort {
    /// Configure `pin` as a push-pull output.
    fn configure_output(&mut self, pin: i32) -> Result<(), ActuatorError>;

    /// Drive an output pin high or low.
    fn write(&mut self, pin: i32, high: bool) -> Result<(), ActuatorError>;

    /// Reconfigure `pin` as an input, leaving the line high-impedance.
    fn float(&mut self, pin: i32) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Analog / ranging ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw 12-bit ADC1 oneshot reads.
pub trait AdcPort {
    fn read_raw(&mut self, channel: u32) -> Result<u16, SensorError>;
}

/// One ultrasonic ping.
pub trait RangingPort {
    /// Trigger a ping and measure the echo pulse width.
    ///
    /// Returns `None` when no echo arrives within `max_echo_us`.
    fn ping_echo_us(&mut self, max_echo_us: u32) -> Option<u32>;
}

// ───────────────────────────────────────────────────────────────
// I2C sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Air temperature / humidity from the climate sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

/// Fuel-gauge reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    pub soc_pct: f64,
    pub cell_voltage_v: f64,
}

/// Solar panel monitor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarStatus {
    pub voltage_v: f64,
    pub current_ma: f64,
    pub power_mw: f64,
}

/// Capability surface of the I2C sensor chips.
pub trait SensorDriverPort {
    /// Probe and configure one chip.  Called with the 3V3 rail already up.
    fn begin(&mut self, device: SensorDevice) -> Result<(), SensorError>;

    fn read_environment(&mut self) -> Result<Environment, SensorError>;

    fn read_co2_ppm(&mut self) -> Result<f64, SensorError>;

    fn read_battery(&mut self) -> Result<BatteryStatus, SensorError>;

    fn read_solar(&mut self) -> Result<SolarStatus, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Pub/sub port (driven adapter: domain ↔ telemetry service)
// ───────────────────────────────────────────────────────────────

/// Longest feed topic the firmware builds (`<user>/feeds/<feed>/get`).
pub const MAX_TOPIC_LEN: usize = 96;
/// Largest inbound payload retained; config values are short scalars.
pub const MAX_PAYLOAD_LEN: usize = 64;

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<MAX_TOPIC_LEN>,
    pub payload: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
}

impl InboundMessage {
    /// Build a message, truncating an oversized payload.
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        let mut t = heapless::String::new();
        t.push_str(topic).ok()?;
        let n = payload.len().min(MAX_PAYLOAD_LEN);
        let mut p = heapless::Vec::new();
        p.extend_from_slice(&payload[..n]).ok()?;
        Some(Self { topic: t, payload: p })
    }
}

/// Topic-based publish/subscribe transport over a secured session.
pub trait PubSubPort {
    /// Open the broker session.  One attempt; the caller owns retries.
    fn connect(&mut self) -> Result<(), CommsError>;

    fn is_connected(&self) -> bool;

    /// Register interest in `topic`.  May be called before `connect()`;
    /// the adapter replays subscriptions when the session comes up.
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;

    /// Block for up to `timeout_ms` waiting for the next inbound message.
    fn poll_incoming(&mut self, timeout_ms: u32) -> Option<InboundMessage>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: domain → WiFi station)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl core::fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

/// Station-mode network association.
pub trait ConnectivityPort {
    /// Kick off association.  Returns once the request is issued; poll
    /// [`is_connected`](Self::is_connected) for the outcome.
    fn begin(&mut self) -> Result<(), ConnectivityError>;

    fn is_connected(&self) -> bool;

    fn local_ip(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Remote shell port (driven adapter: domain ↔ telnet session)
// ───────────────────────────────────────────────────────────────

/// Line-oriented operator session.
pub trait ShellPort {
    /// Start listening for an operator connection.
    fn open(&mut self) -> Result<(), CommsError>;

    /// Wait up to `timeout_ms` for one complete input line.
    ///
    /// `Ok(None)` means nothing arrived in time (including "no client yet").
    /// `Err(ShellDisconnected)` means the peer hung up.
    fn read_line(&mut self, timeout_ms: u32) -> Result<Option<heapless::String<128>>, CommsError>;

    fn write_line(&mut self, line: &str) -> Result<(), CommsError>;

    /// Drop the client and stop listening.
    fn close(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock / sleep ports
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;

    /// Local hour-of-day, `None` until the wall clock is synced.
    fn current_hour(&self) -> Option<u8>;
}

pub trait SleepPort {
    /// Arm the wake timer and enter deep sleep.  On hardware this never
    /// returns; simulation backends record the request and return.
    fn deep_sleep(&mut self, secs: u32);
}

// ───────────────────────────────────────────────────────────────
// Remote log port (driven adapter: logger queue → domain)
// ───────────────────────────────────────────────────────────────

/// Longest log record forwarded to the log feed.
pub const MAX_LOG_LINE: usize = 128;

pub type LogLine = heapless::String<MAX_LOG_LINE>;

/// Records captured by the logger for the remote log feed.
pub trait LogForwardPort {
    /// Start or stop capturing records.  Nothing is queued while off.
    fn set_forwarding(&mut self, enabled: bool);

    fn pending(&self) -> usize;

    /// Oldest queued record.
    fn next_line(&mut self) -> Option<LogLine>;

    /// Records discarded because the queue was full.
    fn dropped(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges should be rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Keys are at most 15 bytes (the NVS key limit).
/// - Write operations MUST be atomic, with no partial writes on power loss.
pub trait StoragePort {
    /// Read a value into `buf`.  Returns the stored length, so a caller
    /// expecting a fixed size can detect a mismatch.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
