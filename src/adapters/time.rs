//! ESP32 time adapter.
//!
//! Monotonic time, wall-clock hour, blocking delays and the deep-sleep
//! entry point.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic),
//!   FreeRTOS delays and the RTC sleep controller.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` and
//!   `std::thread::sleep` for host-side testing and simulation.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::{ClockPort, SleepPort};

/// Time since boot.  Also the time provider for token buckets.
#[cfg(target_os = "espidf")]
pub fn monotonic_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

/// Time since first call.  Also the time provider for token buckets.
#[cfg(not(target_os = "espidf"))]
pub fn monotonic_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Uptime plus local hour-of-day.
pub struct BoardClock {
    #[cfg(not(target_os = "espidf"))]
    sim_hour: Option<u8>,
}

impl Default for BoardClock {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim_hour: None,
        }
    }

    /// Simulation only: pretend the wall clock is synced to `hour`.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_hour(hour: u8) -> Self {
        Self { sim_hour: Some(hour % 24) }
    }
}

impl ClockPort for BoardClock {
    fn uptime_ms(&self) -> u64 {
        monotonic_now().as_millis() as u64
    }

    /// `None` if the wall clock is not synced (e.g. before SNTP).
    #[cfg(target_os = "espidf")]
    fn current_hour(&self) -> Option<u8> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        // Anything before 2020-01-01 is an unsynced RTC.
        const EPOCH_2020: i64 = 1_577_836_800;
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        u8::try_from(tm.tm_hour).ok().filter(|h| *h < 24)
    }

    #[cfg(not(target_os = "espidf"))]
    fn current_hour(&self) -> Option<u8> {
        self.sim_hour
    }
}

// ───────────────────────────────────────────────────────────────
// Delay
// ───────────────────────────────────────────────────────────────

/// Blocking delay.  Millisecond waits yield to FreeRTOS; shorter ones spin.
#[derive(Default, Clone, Copy)]
pub struct BoardDelay;

impl DelayNs for BoardDelay {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::Ets::delay_us(ns.div_ceil(1_000));
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

// ───────────────────────────────────────────────────────────────
// Deep sleep
// ───────────────────────────────────────────────────────────────

/// Timer-wake deep sleep.  The simulation records the request.
#[derive(Default)]
pub struct DeepSleep {
    #[cfg(not(target_os = "espidf"))]
    pub requested_secs: Option<u32>,
}

impl SleepPort for DeepSleep {
    #[cfg(target_os = "espidf")]
    fn deep_sleep(&mut self, secs: u32) {
        info!("sleep: deep sleep for {} s", secs);
        unsafe {
            esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(u64::from(secs) * 1_000_000);
            esp_idf_svc::sys::esp_deep_sleep_start();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn deep_sleep(&mut self, secs: u32) {
        info!("sleep(sim): deep sleep for {} s", secs);
        self.requested_secs = Some(secs);
    }
}
