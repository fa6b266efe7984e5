//! Wake-cycle coordinator, the hexagonal core.
//!
//! [`Coordinator`] owns the power sequencer, the sensor hub, the pump and
//! the remote config mirrors.  One call to [`Coordinator::run_cycle`] is
//! one wake: every phase runs to completion in order, and any fatal
//! failure jumps straight to sleep.
//!
//! ```text
//!  Bootstrap ─▶ RemoteSubscribe ─▶ Connectivity ─▶ SensorInit ─▶ RemoteShell
//!                                                                   │
//!  Sleep ◀── Irrigation ◀── ConfigResync ◀── SenseAndPublish ◀──────┘
//!    ▲
//!    └── (any fatal error)
//! ```
//!
//! All I/O flows through the ports in [`CyclePorts`], so a whole cycle
//! can be replayed on the host against recording mocks.

use core::time::Duration;

use burster::Limiter;
use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::adapters::time::monotonic_now;
use crate::config::SystemConfig;
use crate::drivers::pump::WaterPump;
use crate::error::{CommsError, Error, Result};
use crate::pins;
use crate::power::PowerSequencer;
use crate::remote::mirror::{PollPolicy, RemoteConfigMirror};
use crate::remote::{Feed, format_reading};
use crate::sensors::{SensorHub, SensorSnapshot};
use crate::settings::IrrigationSettings;
use crate::shell::{self, ShellContext};

use super::decision::{self, WaterReason};
use super::events::AppEvent;
use super::ports::{
    AdcPort, ClockPort, ConnectivityPort, EventSink, GpioPort, LogForwardPort, PubSubPort,
    RangingPort, SensorDriverPort, ShellPort, SleepPort, StoragePort,
};

// ───────────────────────────────────────────────────────────────
// Phases and report
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Bootstrap,
    RemoteSubscribe,
    Connectivity,
    SensorInit,
    RemoteShell,
    SenseAndPublish,
    ConfigResync,
    Irrigation,
    Sleep,
}

/// Outcome of one wake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Last phase entered before sleep.
    pub reached: Phase,
    pub watered: bool,
    /// The failure that cut the cycle short, with the phase it hit.
    pub fatal: Option<(Phase, Error)>,
    /// Log records lost to a full forwarding queue.
    pub logs_dropped: u32,
}

fn at(phase: Phase) -> impl FnOnce(Error) -> (Phase, Error) {
    move |e| (phase, e)
}

// ───────────────────────────────────────────────────────────────
// Ports
// ───────────────────────────────────────────────────────────────

/// Everything outside the board that a cycle talks to.
pub struct CyclePorts<'a, St, B, W, Sh, C, Sl, L, E> {
    pub store: &'a mut St,
    pub bus: &'a mut B,
    pub net: &'a mut W,
    pub shell: &'a mut Sh,
    pub clock: &'a C,
    pub sleeper: &'a mut Sl,
    pub logs: &'a mut L,
    pub sink: &'a mut E,
}

// ───────────────────────────────────────────────────────────────
// Coordinator
// ───────────────────────────────────────────────────────────────

pub struct Coordinator<G, D, S, A, R> {
    config: SystemConfig,
    power: PowerSequencer<G, D>,
    sensors: SensorHub<S, A, R>,
    pump: WaterPump,
    settings: IrrigationSettings,

    pump_override: RemoteConfigMirror,
    shell_enable: RemoteConfigMirror,
    update_gate: RemoteConfigMirror,
    threshold_feed: RemoteConfigMirror,
    duration_feed: RemoteConfigMirror,

    remote_logging: bool,
    log_budget: burster::TokenBucket<fn() -> Duration>,
}

impl<G, D, S, A, R> Coordinator<G, D, S, A, R>
where
    G: GpioPort,
    D: DelayNs,
    S: SensorDriverPort,
    A: AdcPort,
    R: RangingPort,
{
    pub fn new(config: SystemConfig, power: PowerSequencer<G, D>, sensors: SensorHub<S, A, R>) -> Result<Self> {
        let policy = PollPolicy {
            tries: config.mirror_poll_tries,
            timeout_ms: config.mirror_poll_timeout_ms,
        };
        let user = config.feed_user.as_str();
        let mirror = |feed| RemoteConfigMirror::new(feed, user, policy);

        Ok(Self {
            pump_override: mirror(Feed::PumpOverride)?,
            shell_enable: mirror(Feed::ShellEnable)?,
            update_gate: mirror(Feed::UpdateConfig)?,
            threshold_feed: mirror(Feed::MoistureThreshold)?,
            duration_feed: mirror(Feed::WateringDuration)?,
            pump: WaterPump::new(pins::PUMP_ENABLE_GPIO, config.pump_precharge_ms),
            settings: IrrigationSettings::new()?,
            remote_logging: false,
            log_budget: burster::TokenBucket::new_with_time_provider(
                2,
                10, // 2 records per second, 10 burst capacity
                monotonic_now as fn() -> Duration,
            ),
            config,
            power,
            sensors,
        })
    }

    pub fn settings(&self) -> &IrrigationSettings {
        &self.settings
    }

    pub fn sensors(&self) -> &SensorHub<S, A, R> {
        &self.sensors
    }

    pub fn power(&self) -> &PowerSequencer<G, D> {
        &self.power
    }

    /// Run one wake cycle, ending in deep sleep.
    ///
    /// On hardware the final `deep_sleep` does not return; simulation
    /// backends return and the report describes what happened.
    pub fn run_cycle<St, B, W, Sh, C, Sl, L, E>(
        &mut self,
        io: &mut CyclePorts<'_, St, B, W, Sh, C, Sl, L, E>,
    ) -> CycleReport
    where
        St: StoragePort,
        B: PubSubPort,
        W: ConnectivityPort,
        Sh: ShellPort,
        C: ClockPort,
        Sl: SleepPort,
        L: LogForwardPort,
        E: EventSink,
    {
        io.sink.emit(&AppEvent::CycleStarted {
            uptime_ms: io.clock.uptime_ms(),
        });

        let mut report = CycleReport {
            reached: Phase::Bootstrap,
            watered: false,
            fatal: None,
            logs_dropped: 0,
        };

        if let Err((phase, e)) = self.run_phases(io, &mut report) {
            error!("cycle: {:?} failed: {} ({})", phase, e, e.status());
            io.sink.emit(&AppEvent::Fatal { phase, error: e });
            report.fatal = Some((phase, e));
        }

        io.sink.emit(&AppEvent::PhaseEntered(Phase::Sleep));
        report.logs_dropped = io.logs.dropped();
        if report.logs_dropped > 0 {
            warn!("log feed: {} records lost to queue overflow", report.logs_dropped);
        }
        self.go_to_sleep(io);
        report
    }

    fn run_phases<St, B, W, Sh, C, Sl, L, E>(
        &mut self,
        io: &mut CyclePorts<'_, St, B, W, Sh, C, Sl, L, E>,
        report: &mut CycleReport,
    ) -> core::result::Result<(), (Phase, Error)>
    where
        St: StoragePort,
        B: PubSubPort,
        W: ConnectivityPort,
        Sh: ShellPort,
        C: ClockPort,
        Sl: SleepPort,
        L: LogForwardPort,
        E: EventSink,
    {
        self.enter(Phase::Bootstrap, io, report);
        self.bootstrap(&*io.store).map_err(at(Phase::Bootstrap))?;

        self.enter(Phase::RemoteSubscribe, io, report);
        self.subscribe_mirrors(io.bus).map_err(at(Phase::RemoteSubscribe))?;

        self.enter(Phase::Connectivity, io, report);
        self.connect(io.net, io.bus).map_err(at(Phase::Connectivity))?;
        io.logs.set_forwarding(true);
        self.remote_logging = true;

        self.enter(Phase::SensorInit, io, report);
        self.sensors.init(&mut self.power).map_err(at(Phase::SensorInit))?;

        self.enter(Phase::RemoteShell, io, report);
        self.remote_shell(io);

        self.enter(Phase::SenseAndPublish, io, report);
        let snapshot = self.sense_and_publish(io.bus, io.sink).map_err(at(Phase::SenseAndPublish))?;

        self.enter(Phase::ConfigResync, io, report);
        match self.resync_settings(io.bus, io.store) {
            Ok(Some((threshold, duration_secs))) => {
                io.sink.emit(&AppEvent::SettingsSynced { threshold, duration_secs });
            }
            Ok(None) => {}
            Err(e) => warn!("resync: settings unchanged: {}", e),
        }

        self.enter(Phase::Irrigation, io, report);
        report.watered = self.irrigate(io, &snapshot).map_err(at(Phase::Irrigation))?;
        Ok(())
    }

    fn enter<St, B, W, Sh, C, Sl, L, E>(
        &mut self,
        phase: Phase,
        io: &mut CyclePorts<'_, St, B, W, Sh, C, Sl, L, E>,
        report: &mut CycleReport,
    ) where
        B: PubSubPort,
        L: LogForwardPort,
        E: EventSink,
    {
        self.forward_logs(io.bus, io.logs);
        report.reached = phase;
        io.sink.emit(&AppEvent::PhaseEntered(phase));
    }

    // ── Phases ────────────────────────────────────────────────

    fn bootstrap(&mut self, store: &impl StoragePort) -> Result<()> {
        self.settings.load(store)?;
        self.sensors.load_calibration(store)?;
        self.pump.init(&mut self.power)
    }

    fn subscribe_mirrors(&mut self, bus: &mut impl PubSubPort) -> Result<()> {
        for m in [
            &mut self.pump_override,
            &mut self.shell_enable,
            &mut self.update_gate,
            &mut self.threshold_feed,
            &mut self.duration_feed,
        ] {
            m.init(bus)?;
        }
        Ok(())
    }

    fn connect(&mut self, net: &mut impl ConnectivityPort, bus: &mut impl PubSubPort) -> Result<()> {
        net.begin().map_err(|e| {
            error!("wifi: {}", e);
            Error::Comms(CommsError::WifiConnectFailed)
        })?;

        let mut polls = 0;
        while !net.is_connected() {
            if polls >= self.config.wifi_retries {
                error!("wifi: not associated after {} polls", polls);
                return Err(CommsError::WifiConnectFailed.into());
            }
            self.power.delay_mut().delay_ms(self.config.wifi_poll_ms);
            polls += 1;
        }
        match net.local_ip() {
            Some(ip) => info!("wifi: connected, ip {}", ip),
            None => info!("wifi: connected"),
        }

        if bus.is_connected() {
            return Ok(());
        }
        let retries = self.config.mqtt_retries.max(1);
        for attempt in 1..=retries {
            match bus.connect() {
                Ok(()) => {
                    info!("mqtt: connected");
                    return Ok(());
                }
                Err(e) if attempt < retries => {
                    warn!(
                        "mqtt: connect failed ({}), retrying in {} ms",
                        e, self.config.mqtt_backoff_ms
                    );
                    self.power.delay_mut().delay_ms(self.config.mqtt_backoff_ms);
                }
                Err(e) => {
                    error!("mqtt: giving up after {} attempts: {}", attempt, e);
                }
            }
        }
        Err(CommsError::MqttConnectFailed.into())
    }

    fn remote_shell<St, B, W, Sh, C, Sl, L, E>(&mut self, io: &mut CyclePorts<'_, St, B, W, Sh, C, Sl, L, E>)
    where
        St: StoragePort,
        B: PubSubPort,
        W: ConnectivityPort,
        Sh: ShellPort,
        E: EventSink,
    {
        if !refresh_flag(&mut self.shell_enable, io.bus) {
            debug!("shell: disabled");
            return;
        }

        if let Some(ip) = io.net.local_ip() {
            let mut text = heapless::String::<16>::new();
            let _ = core::fmt::write(&mut text, format_args!("{}", ip));
            if let Err(e) = self.publish(io.bus, Feed::LocalIp, &text) {
                warn!("shell: could not publish ip: {}", e);
            }
        }

        let mut ctx = ShellContext {
            water: &mut self.sensors.water_level,
            settings: &mut self.settings,
            store: &mut *io.store,
        };
        let inactivity_ms = self.config.shell_inactivity_secs.saturating_mul(1000);
        match shell::serve(io.shell, &mut ctx, inactivity_ms) {
            Ok(end) => io.sink.emit(&AppEvent::ShellSession(end)),
            Err(e) => warn!("shell: session failed: {}", e),
        }
    }

    fn sense_and_publish(&mut self, bus: &mut impl PubSubPort, sink: &mut impl EventSink) -> Result<SensorSnapshot> {
        let snapshot = self.sensors.update_all(self.power.delay_mut())?;
        sink.emit(&AppEvent::Telemetry(snapshot));

        for (feed, value) in telemetry(&snapshot) {
            self.publish(bus, feed, &format_reading(value))?;
        }
        if snapshot.water_level_pct.is_none() {
            warn!("telemetry: water level skipped, no echo");
        }
        Ok(snapshot)
    }

    /// Pull threshold and duration when the update gate is on.
    fn resync_settings(
        &mut self,
        bus: &mut impl PubSubPort,
        store: &mut impl StoragePort,
    ) -> Result<Option<(f64, f64)>> {
        if !refresh_flag(&mut self.update_gate, bus) {
            return Ok(None);
        }
        self.threshold_feed.update_value(bus)?;
        self.duration_feed.update_value(bus)?;
        let threshold = self.threshold_feed.value_f64()?;
        let duration = self.duration_feed.value_f64()?;
        self.settings.apply_remote(store, threshold, duration)?;
        Ok(Some((threshold, duration)))
    }

    fn irrigate<St, B, W, Sh, C, Sl, L, E>(
        &mut self,
        io: &mut CyclePorts<'_, St, B, W, Sh, C, Sl, L, E>,
        snapshot: &SensorSnapshot,
    ) -> Result<bool>
    where
        B: PubSubPort,
        C: ClockPort,
        E: EventSink,
    {
        let override_on = refresh_flag(&mut self.pump_override, io.bus);
        let Some(reason) =
            decision::should_water(override_on, self.settings.threshold(), snapshot.soil_moisture_pct)
        else {
            info!("irrigation: not needed ({:.2} %)", snapshot.soil_moisture_pct);
            return Ok(false);
        };

        if reason == WaterReason::BelowThreshold
            && !self
                .settings
                .watering_permitted(io.clock.current_hour(), snapshot.battery_soc_pct)
        {
            info!("irrigation: outside watering window or battery too low");
            io.sink.emit(&AppEvent::WateringSkipped("outside window or low battery"));
            return Ok(false);
        }

        let Some(duration) = self.settings.duration_secs() else {
            error!("irrigation: watering duration not configured");
            io.sink.emit(&AppEvent::WateringSkipped("duration not configured"));
            return Ok(false);
        };

        let ms = (duration * 1000.0) as u32;
        info!("irrigation: watering for {} s ({:?})", duration, reason);
        let on = self.pump.turn_on(&mut self.power);
        if on.is_ok() {
            self.power.delay_mut().delay_ms(ms);
        }
        let off = self.pump.turn_off(&mut self.power);
        on?;
        off?;

        io.sink.emit(&AppEvent::Watered {
            reason,
            secs: ms / 1000,
        });
        Ok(true)
    }

    fn go_to_sleep<St, B, W, Sh, C, Sl, L, E>(&mut self, io: &mut CyclePorts<'_, St, B, W, Sh, C, Sl, L, E>)
    where
        B: PubSubPort,
        Sl: SleepPort,
        L: LogForwardPort,
        E: EventSink,
    {
        if let Err(e) = self.power.all_off() {
            error!("power: rails not all off: {}", e);
        }
        let secs = self.config.sleep_interval_secs;
        info!("Going to sleep for (seconds): {}", secs);
        self.forward_logs(io.bus, io.logs);
        io.sink.emit(&AppEvent::Sleeping { secs });
        io.sleeper.deep_sleep(secs);
    }

    // ── Helpers ───────────────────────────────────────────────

    fn publish(&self, bus: &mut impl PubSubPort, feed: Feed, payload: &str) -> Result<()> {
        let topic = feed.topic(&self.config.feed_user)?;
        bus.publish(&topic, payload.as_bytes())?;
        Ok(())
    }

    /// Push queued log records to the log feed within the rate budget.
    fn forward_logs(&mut self, bus: &mut impl PubSubPort, logs: &mut impl LogForwardPort) {
        if !self.remote_logging || !bus.is_connected() {
            return;
        }
        let Ok(topic) = Feed::Log.topic(&self.config.feed_user) else {
            return;
        };
        while logs.pending() > 0 && self.log_budget.try_consume(1).is_ok() {
            let Some(line) = logs.next_line() else { break };
            if bus.publish(&topic, line.as_bytes()).is_err() {
                // debug! stays below the forwarding level, so this cannot recurse.
                debug!("log feed: publish failed, forwarding stopped");
                self.remote_logging = false;
                logs.set_forwarding(false);
                break;
            }
        }
    }
}

/// Refresh an ON/OFF mirror.  A failed refresh reads as OFF.
fn refresh_flag(mirror: &mut RemoteConfigMirror, bus: &mut impl PubSubPort) -> bool {
    match mirror.update_value(bus) {
        Ok(()) => mirror.value_on_off(),
        Err(e) => {
            warn!("{}: refresh failed, treating as OFF: {}", mirror.feed().name(), e);
            false
        }
    }
}

/// Feed/value pairs for one snapshot.  A missing water level is omitted.
pub fn telemetry(s: &SensorSnapshot) -> heapless::Vec<(Feed, f64), 11> {
    let mut out = heapless::Vec::new();
    let mut add = |feed, value| {
        // Capacity covers every telemetry feed.
        let _ = out.push((feed, value));
    };
    add(Feed::BatterySoc, s.battery_soc_pct);
    add(Feed::BatteryCellVoltage, s.battery_voltage_v);
    add(Feed::Co2, s.co2_ppm);
    add(Feed::AirTemperature, s.air_temperature_c);
    add(Feed::AirHumidity, s.air_humidity_pct);
    add(Feed::SoilTemperature, s.soil_temperature_c);
    add(Feed::SoilMoisture, s.soil_moisture_pct);
    if let Some(level) = s.water_level_pct {
        add(Feed::WaterLevel, level);
    }
    add(Feed::SolarPanelVoltage, s.solar_voltage_v);
    add(Feed::SolarPanelCurrent, s.solar_current_ma);
    add(Feed::SolarPanelPower, s.solar_power_mw);
    out
}
