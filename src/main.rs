//! Greenhouse Firmware: Main Entry Point
//!
//! One boot is one wake cycle.  `main` wires the adapters to the
//! coordinator, runs the cycle, and the cycle ends in deep sleep.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BoardGpio/Adc   I2cSensors     NvsAdapter     BoardClock      │
//! │  UltrasonicRanger (drivers)     (Config+NVS)   DeepSleep       │
//! │  WifiAdapter     MqttAdapter    TelnetShell    RemoteLogger    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Coordinator (pure logic)                  │    │
//! │  │  Power sequencing · Sensors · Mirrors · Irrigation     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Credentials are baked in at build time: `WIFI_SSID`, `WIFI_PASS`,
//! `MQTT_BROKER`, `MQTT_CLIENT_ID`, `MQTT_USER`, `MQTT_PASS`.
#![deny(unused_must_use)]

use std::cell::RefCell;

use anyhow::{anyhow, Result};
use embedded_hal_bus::i2c::RefCellDevice;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::wifi::EspWifi;

use greenhouse::adapters::hardware::{BoardAdc, BoardGpio, UltrasonicRanger};
use greenhouse::adapters::i2c_sensors::I2cSensors;
use greenhouse::adapters::log_sink::{LogEventSink, RemoteLogger};
use greenhouse::adapters::mqtt::{MqttAdapter, MqttSettings};
use greenhouse::adapters::nvs::NvsAdapter;
use greenhouse::adapters::telnet::{TelnetShell, TELNET_PORT};
use greenhouse::adapters::time::{BoardClock, BoardDelay, DeepSleep};
use greenhouse::adapters::wifi::WifiAdapter;
use greenhouse::app::ports::SleepPort;
use greenhouse::app::service::{Coordinator, CyclePorts};
use greenhouse::config::{self, SystemConfig};
use greenhouse::drivers::hw_init;
use greenhouse::pins;
use greenhouse::power::PowerSequencer;
use greenhouse::sensors::{InitPolicy, SensorHub};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    // Logging is not up yet; failures are reported once it is.
    let nvs = NvsAdapter::new();
    let (mut config, config_note) = match &nvs {
        Ok(store) => match config::load_or_restore(store) {
            Ok(cfg) => (cfg, None),
            Err(e) => (SystemConfig::default(), Some(format!("config load failed ({}), using defaults", e))),
        },
        Err(e) => (SystemConfig::default(), Some(format!("NVS init failed ({}), no persistence", e))),
    };

    // ── 3. Logger ─────────────────────────────────────────────
    let (logger, mut log_queue) = RemoteLogger::new(
        config.console_log_level.to_filter(),
        config.remote_log_level.to_filter(),
    );
    logger.install().map_err(|e| anyhow!("logger: {}", e))?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Greenhouse v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    if let Some(note) = config_note {
        warn!("{}", note);
    }
    let mut sleeper = DeepSleep::default();
    let Ok(mut store) = nvs else {
        error!("no persistent storage; retrying next wake");
        sleeper.deep_sleep(config.sleep_interval_secs);
        return Ok(());
    };

    // Feeds live under the broker account.
    config.feed_user.clear();
    config
        .feed_user
        .push_str(env!("MQTT_USER"))
        .map_err(|()| anyhow!("MQTT_USER longer than 32 bytes"))?;

    // ── 4. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}; retrying next wake", e);
        sleeper.deep_sleep(config.sleep_interval_secs);
        return Ok(());
    }

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(pins::I2C_FREQ_HZ.Hz()),
    )?;

    let i2c_bus = RefCell::new(i2c);

    let sensors = SensorHub::new(
        I2cSensors::new(
            RefCellDevice::new(&i2c_bus),
            RefCellDevice::new(&i2c_bus),
            BoardDelay,
        ),
        BoardAdc,
        UltrasonicRanger,
        InitPolicy {
            retries: config.sensor_init_retries,
            retry_ms: config.sensor_retry_ms,
        },
    )?;
    let power = PowerSequencer::new(BoardGpio, BoardDelay, config.rail_settle_ms);

    // ── 5. Network adapters ───────────────────────────────────
    let mut wifi = WifiAdapter::new(env!("WIFI_SSID"), env!("WIFI_PASS"))
        .map_err(|e| anyhow!("wifi: {}", e))?
        .with_driver(EspWifi::new(peripherals.modem, sysloop, None)?);

    let mut mqtt = MqttAdapter::new(MqttSettings {
        url: env!("MQTT_BROKER"),
        client_id: env!("MQTT_CLIENT_ID"),
        username: env!("MQTT_USER"),
        password: env!("MQTT_PASS"),
    });
    let mut telnet = TelnetShell::new(TELNET_PORT);

    // ── 6. Run one wake cycle ─────────────────────────────────
    let clock = BoardClock::new();
    let mut sink = LogEventSink::new();
    let mut coordinator = Coordinator::new(config, power, sensors)?;

    let mut io = CyclePorts {
        store: &mut store,
        bus: &mut mqtt,
        net: &mut wifi,
        shell: &mut telnet,
        clock: &clock,
        sleeper: &mut sleeper,
        logs: &mut log_queue,
        sink: &mut sink,
    };
    let report = coordinator.run_cycle(&mut io);

    // Deep sleep does not return on hardware; reaching here means it failed.
    warn!("deep sleep returned after {:?}; restarting", report.reached);
    unsafe { esp_idf_svc::sys::esp_restart() };
    Ok(())
}
