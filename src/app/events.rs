//! Outbound application events.
//!
//! The [`Coordinator`](super::service::Coordinator) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them; the stock one logs to the console.

use crate::error::Error;
use crate::sensors::SensorSnapshot;
use crate::shell::SessionEnd;

use super::decision::WaterReason;
use super::service::Phase;

/// Structured events emitted by the wake cycle.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A cycle has begun.
    CycleStarted { uptime_ms: u64 },

    /// The cycle moved into a new phase.
    PhaseEntered(Phase),

    /// A fresh set of readings was taken.
    Telemetry(SensorSnapshot),

    /// Irrigation settings were replaced from the remote feeds.
    SettingsSynced { threshold: f64, duration_secs: f64 },

    /// A remote shell session finished.
    ShellSession(SessionEnd),

    /// The pump ran.
    Watered { reason: WaterReason, secs: u32 },

    /// Watering was due but did not happen.
    WateringSkipped(&'static str),

    /// A phase failed and the cycle is going straight to sleep.
    Fatal { phase: Phase, error: Error },

    /// About to deep sleep.
    Sleeping { secs: u32 },
}
