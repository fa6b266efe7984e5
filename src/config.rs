//! System configuration parameters
//!
//! Static deployment tunables for the greenhouse controller: cycle timing,
//! retry budgets, and feed ownership.  Stored as a single postcard blob in
//! NVS by [`NvsAdapter`](crate::adapters::nvs::NvsAdapter).
//!
//! The irrigation thresholds that operators change at runtime are *not*
//! here; they live in individually persisted values (see
//! [`settings`](crate::settings)) so a remote resync can update them
//! without rewriting this blob.

use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, ConfigPort};

/// Log verbosity as stored in the config blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub const fn to_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Feeds ---
    /// Owner segment of every feed topic (`<user>/feeds/<feed>`).
    pub feed_user: heapless::String<32>,

    // --- Cycle ---
    /// Deep-sleep interval between wake cycles (seconds)
    pub sleep_interval_secs: u32,

    // --- Connectivity ---
    /// WiFi association polls before giving up
    pub wifi_retries: u8,
    /// Delay between WiFi association polls (milliseconds)
    pub wifi_poll_ms: u32,
    /// MQTT session attempts before giving up
    pub mqtt_retries: u8,
    /// Delay between MQTT session attempts (milliseconds)
    pub mqtt_backoff_ms: u32,

    // --- Remote config mirror ---
    /// Polls per mirror refresh
    pub mirror_poll_tries: u8,
    /// Timeout per poll (milliseconds)
    pub mirror_poll_timeout_ms: u32,

    // --- Power / actuators ---
    /// Settle delay after switching a power rail (milliseconds)
    pub rail_settle_ms: u32,
    /// Motor-rail pre-charge before driving the pump enable (milliseconds)
    pub pump_precharge_ms: u32,

    // --- Sensors ---
    /// `begin()` attempts per sensor chip
    pub sensor_init_retries: u8,
    /// Delay between sensor init attempts (milliseconds)
    pub sensor_retry_ms: u32,

    // --- Remote shell ---
    /// Session closes after this long without input (seconds)
    pub shell_inactivity_secs: u32,

    // --- Logging ---
    pub console_log_level: LogLevel,
    /// Records at or above this level are mirrored to the log feed
    pub remote_log_level: LogLevel,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut feed_user = heapless::String::new();
        // "greenhouse" always fits in 32 bytes.
        let _ = feed_user.push_str("greenhouse");

        Self {
            feed_user,

            // Cycle
            sleep_interval_secs: 120,

            // Connectivity
            wifi_retries: 20,
            wifi_poll_ms: 500,
            mqtt_retries: 3,
            mqtt_backoff_ms: 5_000,

            // Mirror
            mirror_poll_tries: 10,
            mirror_poll_timeout_ms: 50,

            // Power / actuators
            rail_settle_ms: 20,
            pump_precharge_ms: 100,

            // Sensors
            sensor_init_retries: 5,
            sensor_retry_ms: 500,

            // Shell
            shell_inactivity_secs: 30,

            // Logging
            console_log_level: LogLevel::Info,
            remote_log_level: LogLevel::Warn,
        }
    }
}

/// Load the stored config.  A blob that no longer decodes is replaced
/// with the defaults so the next wake starts clean.
pub fn load_or_restore(store: &impl ConfigPort) -> Result<SystemConfig, ConfigError> {
    match store.load() {
        Err(ConfigError::Corrupted) => {
            let defaults = SystemConfig::default();
            store.save(&defaults)?;
            Ok(defaults)
        }
        other => other,
    }
}
