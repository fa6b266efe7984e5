//! Log-based adapters.
//!
//! - [`LogEventSink`] implements [`EventSink`] by writing structured
//!   cycle events to the logger (UART / USB-CDC in production).
//! - [`RemoteLogger`] is the process-wide `log` backend.  It prints to
//!   the console and, while forwarding is on, copies records at or above
//!   the remote level into a bounded queue.
//! - [`RemoteLogQueue`] is the coordinator's handle on that queue
//!   ([`LogForwardPort`]); drained lines go to the log feed.

use core::fmt::Write as _;
use std::sync::{Arc, Mutex};

use log::{info, warn, LevelFilter, Log, Metadata, Record};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, LogForwardPort, LogLine, MAX_LOG_LINE};

// ───────────────────────────────────────────────────────────────
// Event sink
// ───────────────────────────────────────────────────────────────

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::CycleStarted { uptime_ms } => {
                info!("CYCLE | start at {} ms", uptime_ms);
            }
            AppEvent::PhaseEntered(phase) => {
                info!("PHASE | {:?}", phase);
            }
            AppEvent::Telemetry(s) => {
                info!(
                    "TELEM | air={:.1}\u{00b0}C/{:.0}% co2={:.0}ppm | bat={:.0}%/{:.2}V | \
                     soil={:.1}\u{00b0}C/{:.1}% | water={} | solar={:.2}V/{:.0}mA/{:.0}mW",
                    s.air_temperature_c,
                    s.air_humidity_pct,
                    s.co2_ppm,
                    s.battery_soc_pct,
                    s.battery_voltage_v,
                    s.soil_temperature_c,
                    s.soil_moisture_pct,
                    WaterLevel(s.water_level_pct),
                    s.solar_voltage_v,
                    s.solar_current_ma,
                    s.solar_power_mw,
                );
            }
            AppEvent::SettingsSynced { threshold, duration_secs } => {
                info!("SYNC  | threshold={:.1}% duration={:.0}s", threshold, duration_secs);
            }
            AppEvent::ShellSession(end) => {
                info!("SHELL | session ended ({:?})", end);
            }
            AppEvent::Watered { reason, secs } => {
                info!("WATER | {:?}, ran {} s", reason, secs);
            }
            AppEvent::WateringSkipped(why) => {
                info!("WATER | skipped: {}", why);
            }
            AppEvent::Fatal { phase, error } => {
                warn!("FATAL | {:?}: {}", phase, error);
            }
            AppEvent::Sleeping { secs } => {
                info!("SLEEP | {} s", secs);
            }
        }
    }
}

struct WaterLevel(Option<f64>);

impl core::fmt::Display for WaterLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(pct) => write!(f, "{:.1}%", pct),
            None => write!(f, "n/a"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Remote log capture
// ───────────────────────────────────────────────────────────────

/// Records held while the broker is busy.  Oldest are dropped first.
pub const QUEUE_DEPTH: usize = 32;

struct Shared {
    forwarding: bool,
    lines: heapless::Deque<LogLine, QUEUE_DEPTH>,
    dropped: u32,
}

/// Console logger that also feeds the remote log queue.
pub struct RemoteLogger {
    console_level: LevelFilter,
    remote_level: LevelFilter,
    shared: Arc<Mutex<Shared>>,
    #[cfg(target_os = "espidf")]
    console: esp_idf_svc::log::EspLogger,
}

impl RemoteLogger {
    pub fn new(console_level: LevelFilter, remote_level: LevelFilter) -> (Self, RemoteLogQueue) {
        let shared = Arc::new(Mutex::new(Shared {
            forwarding: false,
            lines: heapless::Deque::new(),
            dropped: 0,
        }));
        let logger = Self {
            console_level,
            remote_level,
            shared: Arc::clone(&shared),
            #[cfg(target_os = "espidf")]
            console: esp_idf_svc::log::EspLogger::new(),
        };
        (logger, RemoteLogQueue { shared })
    }

    /// Make this the global `log` backend.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let max = self.console_level.max(self.remote_level);
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn write_console(&self, record: &Record<'_>) {
        self.console.log(record);
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_console(&self, record: &Record<'_>) {
        eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
    }

    fn capture(&self, record: &Record<'_>) {
        let Ok(mut shared) = self.shared.lock() else {
            return;
        };
        if !shared.forwarding {
            return;
        }
        let mut line = Truncating(LogLine::new());
        let _ = write!(line, "[{}] {}", record.level(), record.args());
        if shared.lines.is_full() {
            shared.lines.pop_front();
            shared.dropped = shared.dropped.saturating_add(1);
        }
        let _ = shared.lines.push_back(line.0);
    }
}

impl Log for RemoteLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.console_level || metadata.level() <= self.remote_level
    }

    fn log(&self, record: &Record<'_>) {
        if record.level() <= self.console_level {
            self.write_console(record);
        }
        if record.level() <= self.remote_level {
            self.capture(record);
        }
    }

    fn flush(&self) {}
}

/// Writer that keeps what fits and silently drops the rest.
struct Truncating(LogLine);

impl core::fmt::Write for Truncating {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.len() + c.len_utf8() > MAX_LOG_LINE {
                break;
            }
            let _ = self.0.push(c);
        }
        Ok(())
    }
}

/// Drain side of the remote log queue.
#[derive(Clone)]
pub struct RemoteLogQueue {
    shared: Arc<Mutex<Shared>>,
}

impl LogForwardPort for RemoteLogQueue {
    fn set_forwarding(&mut self, enabled: bool) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.forwarding = enabled;
            if !enabled {
                shared.lines.clear();
            }
        }
    }

    fn pending(&self) -> usize {
        self.shared.lock().map(|s| s.lines.len()).unwrap_or(0)
    }

    fn next_line(&mut self) -> Option<LogLine> {
        self.shared.lock().ok()?.lines.pop_front()
    }

    fn dropped(&self) -> u32 {
        self.shared.lock().map(|s| s.dropped).unwrap_or(0)
    }
}
