//! Whole wake cycles against mock adapters.
//!
//! Each test seeds storage and the broker, runs one cycle, then checks
//! what reached the pins, the feeds and the sleep timer.

use greenhouse::app::decision::WaterReason;
use greenhouse::app::events::AppEvent;
use greenhouse::app::ports::LogForwardPort;
use greenhouse::app::service::{Coordinator, CycleReport, CyclePorts, Phase};
use greenhouse::config::SystemConfig;
use greenhouse::error::{CommsError, Error, SensorDevice, SensorError};
use greenhouse::pins::{PUMP_ENABLE_GPIO, RAIL_3V3_GPIO, RAIL_MOTOR_GPIO};
use greenhouse::power::PowerSequencer;
use greenhouse::remote::Feed;
use greenhouse::sensors::{InitPolicy, SensorHub};
use greenhouse::shell::SessionEnd;

use crate::mock_hw::*;

struct Rig {
    trace: Trace,
    config: SystemConfig,
    drivers: Option<MockDrivers>,
    adc: Option<MockAdc>,
    ranger: Option<MockRanger>,
    store: FlakyStore,
    bus: MockBroker,
    wifi: MockWifi,
    shell: ScriptedShell,
    clock: FixedClock,
    sleeper: RecordingSleep,
    logs: MockLogs,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        let trace = new_trace();
        Self {
            drivers: Some(MockDrivers::new(&trace)),
            adc: Some(MockAdc::default()),
            ranger: Some(MockRanger::at_cm(20)),
            config: SystemConfig::default(),
            store: FlakyStore::new(),
            bus: MockBroker::default(),
            wifi: MockWifi::associating_after(0),
            shell: ScriptedShell::default(),
            clock: FixedClock { hour: Some(12) },
            sleeper: RecordingSleep::default(),
            logs: MockLogs::default(),
            sink: RecordingSink::default(),
            trace,
        }
    }

    /// Threshold 30 %, 60 s watering, every remote flag OFF.
    fn configured() -> Self {
        let mut rig = Self::new();
        rig.store.seed("waterThresh", 30.0);
        rig.store.seed("waterDuration", 60.0);
        rig.bus.set_feed(Feed::PumpOverride, "OFF");
        rig.bus.set_feed(Feed::ShellEnable, "OFF");
        rig.bus.set_feed(Feed::UpdateConfig, "OFF");
        rig
    }

    fn drivers(&mut self) -> &mut MockDrivers {
        self.drivers.as_mut().unwrap()
    }

    fn run(&mut self) -> CycleReport {
        let policy = InitPolicy {
            retries: self.config.sensor_init_retries,
            retry_ms: self.config.sensor_retry_ms,
        };
        let sensors = SensorHub::new(
            self.drivers.take().unwrap(),
            self.adc.take().unwrap(),
            self.ranger.take().unwrap(),
            policy,
        )
        .unwrap();
        let power = PowerSequencer::new(
            MockGpio::new(&self.trace),
            MockDelay::new(&self.trace),
            self.config.rail_settle_ms,
        );
        let mut coordinator = Coordinator::new(self.config.clone(), power, sensors).unwrap();

        let mut io = CyclePorts {
            store: &mut self.store,
            bus: &mut self.bus,
            net: &mut self.wifi,
            shell: &mut self.shell,
            clock: &self.clock,
            sleeper: &mut self.sleeper,
            logs: &mut self.logs,
            sink: &mut self.sink,
        };
        coordinator.run_cycle(&mut io)
    }

    fn pump_ran(&self) -> bool {
        position(&self.trace, Op::Write(PUMP_ENABLE_GPIO, true)).is_some()
    }

    fn ends_with_rails_off(&self) -> bool {
        let trace = self.trace.borrow();
        let writes: Vec<_> = trace.iter().filter(|o| matches!(o, Op::Write(..))).collect();
        writes.ends_with(&[&Op::Write(RAIL_3V3_GPIO, false), &Op::Write(RAIL_MOTOR_GPIO, false)])
    }
}

const TELEMETRY: [Feed; 11] = [
    Feed::BatterySoc,
    Feed::BatteryCellVoltage,
    Feed::Co2,
    Feed::AirTemperature,
    Feed::AirHumidity,
    Feed::SoilTemperature,
    Feed::SoilMoisture,
    Feed::WaterLevel,
    Feed::SolarPanelVoltage,
    Feed::SolarPanelCurrent,
    Feed::SolarPanelPower,
];

// ── Happy path ────────────────────────────────────────────────

#[test]
fn dry_soil_is_watered_for_configured_duration() {
    let mut rig = Rig::configured();
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert_eq!(report.reached, Phase::Irrigation);
    assert!(report.watered);

    let on = position(&rig.trace, Op::Write(PUMP_ENABLE_GPIO, true)).unwrap();
    let wait = position(&rig.trace, Op::Delay(60_000)).unwrap();
    let off = rposition(&rig.trace, Op::Float(PUMP_ENABLE_GPIO)).unwrap();
    let rail = position(&rig.trace, Op::Write(RAIL_MOTOR_GPIO, true)).unwrap();
    assert!(rail < on && on < wait && wait < off);

    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Watered {
            reason: WaterReason::BelowThreshold,
            secs: 60
        }
    )));
    assert_eq!(rig.sleeper.requested, vec![120]);
    assert!(rig.ends_with_rails_off());
}

#[test]
fn every_reading_is_published_once_with_two_decimals() {
    let mut rig = Rig::configured();
    rig.run();

    for feed in TELEMETRY {
        assert_eq!(rig.bus.published_on(feed).len(), 1, "{}", feed.name());
    }
    assert_eq!(rig.bus.published_on(Feed::Co2), vec!["415.00"]);
    assert_eq!(rig.bus.published_on(Feed::SoilMoisture), vec!["25.01"]);
    // 20 cm with the default 5/60 cm calibration.
    assert_eq!(rig.bus.published_on(Feed::WaterLevel), vec!["72.73"]);
}

#[test]
fn sensor_rail_comes_up_before_any_chip() {
    let mut rig = Rig::configured();
    rig.run();

    let rail = position(&rig.trace, Op::Write(RAIL_3V3_GPIO, true)).unwrap();
    let first_begin = position(&rig.trace, Op::Begin(SensorDevice::Climate)).unwrap();
    assert!(rail < first_begin);
}

#[test]
fn moist_soil_is_left_alone() {
    let mut rig = Rig::configured();
    rig.adc.as_mut().unwrap().moisture_raw = 500;
    let report = rig.run();

    assert_eq!(report.reached, Phase::Irrigation);
    assert!(!report.watered);
    assert!(!rig.pump_ran());
}

// ── Irrigation gates ──────────────────────────────────────────

#[test]
fn override_waters_outside_window_without_threshold() {
    let mut rig = Rig::new();
    rig.store.seed("waterDuration", 10.0);
    rig.store.seed("waterStartHr", 6.0);
    rig.store.seed("waterEndHr", 20.0);
    rig.store.seed("waterMinSOC", 95.0);
    rig.clock.hour = Some(3);
    rig.bus.set_feed(Feed::PumpOverride, "ON");
    rig.adc.as_mut().unwrap().moisture_raw = 500;

    let report = rig.run();
    assert!(report.watered);
    assert_eq!(count(&rig.trace, Op::Delay(10_000)), 1);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Watered {
            reason: WaterReason::Override,
            ..
        }
    )));
}

#[test]
fn threshold_watering_waits_for_window() {
    let mut rig = Rig::configured();
    rig.store.seed("waterStartHr", 6.0);
    rig.store.seed("waterEndHr", 20.0);
    rig.clock.hour = Some(3);

    let report = rig.run();
    assert!(!report.watered);
    assert_eq!(report.fatal, None);
    assert!(!rig.pump_ran());
    assert!(rig.sink.events.iter().any(|e| matches!(e, AppEvent::WateringSkipped(_))));
}

#[test]
fn unsynced_clock_does_not_block_watering() {
    let mut rig = Rig::configured();
    rig.store.seed("waterStartHr", 6.0);
    rig.store.seed("waterEndHr", 20.0);
    rig.clock.hour = None;

    assert!(rig.run().watered);
}

#[test]
fn low_battery_blocks_threshold_watering() {
    let mut rig = Rig::configured();
    rig.store.seed("waterMinSOC", 90.0);
    rig.drivers().battery.soc_pct = 40.0;

    assert!(!rig.run().watered);
    assert!(!rig.pump_ran());
}

#[test]
fn missing_duration_skips_watering() {
    let mut rig = Rig::new();
    rig.store.seed("waterThresh", 30.0);

    let report = rig.run();
    assert!(!report.watered);
    assert_eq!(report.fatal, None);
    assert!(!rig.pump_ran());
}

#[test]
fn unconfigured_device_only_reports() {
    let mut rig = Rig::new();
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert!(!report.watered);
    assert_eq!(rig.bus.published_on(Feed::SoilMoisture).len(), 1);
}

// ── Connectivity ──────────────────────────────────────────────

#[test]
fn wifi_that_never_associates_sends_device_to_sleep() {
    let mut rig = Rig::configured();
    rig.wifi = MockWifi::never_up();
    let report = rig.run();

    assert_eq!(
        report.fatal,
        Some((Phase::Connectivity, Error::Comms(CommsError::WifiConnectFailed)))
    );
    assert_eq!(report.reached, Phase::Connectivity);
    assert_eq!(count(&rig.trace, Op::Delay(500)), usize::from(rig.config.wifi_retries));
    assert!(rig.bus.published.is_empty());
    assert_eq!(rig.sleeper.requested, vec![120]);
    assert!(rig.ends_with_rails_off());
    assert!(!rig.pump_ran());
}

#[test]
fn wifi_association_is_polled() {
    let mut rig = Rig::configured();
    rig.wifi = MockWifi::associating_after(3);
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert_eq!(count(&rig.trace, Op::Delay(500)), 3);
}

#[test]
fn mqtt_connect_is_retried_with_backoff() {
    let mut rig = Rig::configured();
    rig.bus.connect_failures = 2;
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert_eq!(rig.bus.connect_attempts, 3);
    assert_eq!(count(&rig.trace, Op::Delay(5_000)), 2);
}

#[test]
fn mqtt_gives_up_after_retry_budget() {
    let mut rig = Rig::configured();
    rig.bus.connect_failures = 99;
    let report = rig.run();

    assert_eq!(
        report.fatal,
        Some((Phase::Connectivity, Error::Comms(CommsError::MqttConnectFailed)))
    );
    assert_eq!(rig.bus.connect_attempts, 3);
    assert_eq!(rig.sleeper.requested, vec![120]);
}

#[test]
fn subscriptions_are_registered_before_connecting() {
    let mut rig = Rig::configured();
    rig.bus.connect_failures = 99;
    rig.run();

    assert_eq!(rig.bus.subscriptions.len(), 5);
    assert!(
        rig.bus
            .subscriptions
            .iter()
            .any(|t| t == "greenhouse/feeds/pump-control-override")
    );
}

// ── Sensors ───────────────────────────────────────────────────

#[test]
fn flaky_chip_is_retried() {
    let mut rig = Rig::configured();
    rig.drivers().begin_failures = Some((SensorDevice::Co2, 2));
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert_eq!(count(&rig.trace, Op::Begin(SensorDevice::Co2)), 3);
    assert_eq!(count(&rig.trace, Op::Delay(500)), 2);
}

#[test]
fn dead_chip_aborts_the_cycle() {
    let mut rig = Rig::configured();
    rig.drivers().begin_failures = Some((SensorDevice::Co2, u32::MAX));
    let report = rig.run();

    assert_eq!(
        report.fatal,
        Some((
            Phase::SensorInit,
            Error::Sensor(SensorError::InitFailed(SensorDevice::Co2))
        ))
    );
    assert_eq!(count(&rig.trace, Op::Begin(SensorDevice::Co2)), 5);
    assert_eq!(count(&rig.trace, Op::Begin(SensorDevice::GasGauge)), 0);
    assert!(rig.bus.published_on(Feed::Co2).is_empty());
    assert!(rig.ends_with_rails_off());
}

#[test]
fn failed_read_aborts_before_irrigation() {
    let mut rig = Rig::configured();
    rig.drivers().fail_reads = true;
    let report = rig.run();

    assert!(matches!(report.fatal, Some((Phase::SenseAndPublish, Error::Sensor(_)))));
    assert!(!rig.pump_ran());
}

#[test]
fn silent_ranger_omits_only_water_level() {
    let mut rig = Rig::configured();
    rig.ranger = Some(MockRanger::silent());
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert!(rig.bus.published_on(Feed::WaterLevel).is_empty());
    assert_eq!(rig.bus.published_on(Feed::SolarPanelPower).len(), 1);
    assert!(report.watered);
}

#[test]
fn publish_failure_is_fatal() {
    let mut rig = Rig::configured();
    rig.bus.fail_publish = true;
    let report = rig.run();

    assert_eq!(
        report.fatal,
        Some((Phase::SenseAndPublish, Error::Comms(CommsError::MqttPublishFailed)))
    );
    assert!(!rig.pump_ran());
}

// ── Config resync ─────────────────────────────────────────────

#[test]
fn open_gate_pulls_new_settings() {
    let mut rig = Rig::configured();
    rig.bus.set_feed(Feed::UpdateConfig, "ON");
    rig.bus.set_feed(Feed::MoistureThreshold, "40");
    rig.bus.set_feed(Feed::WateringDuration, "15");
    let report = rig.run();

    assert_eq!(rig.store.stored("waterThresh"), Some(40.0));
    assert_eq!(rig.store.stored("waterDuration"), Some(15.0));
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::SettingsSynced {
            threshold,
            duration_secs
        } if *threshold == 40.0 && *duration_secs == 15.0
    )));
    assert!(report.watered);
    assert_eq!(count(&rig.trace, Op::Delay(15_000)), 1);
}

#[test]
fn closed_gate_leaves_settings_untouched() {
    let mut rig = Rig::configured();
    rig.bus.set_feed(Feed::MoistureThreshold, "40");
    rig.run();

    assert_eq!(rig.bus.requests_for(Feed::UpdateConfig), 1);
    assert_eq!(rig.bus.requests_for(Feed::MoistureThreshold), 0);
    assert_eq!(rig.store.stored("waterThresh"), Some(30.0));
}

#[test]
fn malformed_remote_value_keeps_previous_settings() {
    let mut rig = Rig::configured();
    rig.bus.set_feed(Feed::UpdateConfig, "ON");
    rig.bus.set_feed(Feed::MoistureThreshold, "40");
    rig.bus.set_feed(Feed::WateringDuration, "abc");
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert_eq!(rig.store.stored("waterThresh"), Some(30.0));
    assert_eq!(rig.store.stored("waterDuration"), Some(60.0));
    assert_eq!(count(&rig.trace, Op::Delay(60_000)), 1);
}

#[test]
fn failed_second_write_rolls_back_the_first() {
    let mut rig = Rig::configured();
    rig.bus.set_feed(Feed::UpdateConfig, "ON");
    rig.bus.set_feed(Feed::MoistureThreshold, "40");
    rig.bus.set_feed(Feed::WateringDuration, "15");
    rig.store.fail_write_key = Some("waterDuration");
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert_eq!(rig.store.stored("waterThresh"), Some(30.0));
    assert_eq!(rig.store.stored("waterDuration"), Some(60.0));
}

#[test]
fn unanswered_override_reads_as_off() {
    let mut rig = Rig::configured();
    rig.bus.retained.clear();
    rig.adc.as_mut().unwrap().moisture_raw = 500;
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert!(!report.watered);
}

// ── Remote shell ──────────────────────────────────────────────

#[test]
fn shell_session_runs_when_enabled() {
    let mut rig = Rig::configured();
    rig.bus.set_feed(Feed::ShellEnable, "ON");
    rig.shell = ScriptedShell::with_lines(&["ping", "waterLevelCal 80 10", "close"]);
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert!(rig.shell.opened && rig.shell.closed);
    assert!(rig.shell.saw("> pong"));
    assert!(rig.shell.saw("> Success: updated water level cal"));
    assert!(rig.shell.saw("> Goodbye"));
    assert_eq!(rig.bus.published_on(Feed::LocalIp), vec!["10.0.0.42"]);
    assert!(
        rig.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::ShellSession(SessionEnd::Closed)))
    );

    // The new calibration is used for this cycle's reading.
    assert_eq!(rig.store.stored("waterEmpty"), Some(80.0));
    assert_eq!(rig.store.stored("waterFull"), Some(10.0));
    assert_eq!(rig.bus.published_on(Feed::WaterLevel), vec!["85.71"]);
    assert!(report.watered);
}

#[test]
fn disabled_shell_is_never_opened() {
    let mut rig = Rig::configured();
    rig.run();

    assert!(!rig.shell.opened);
    assert!(rig.bus.published_on(Feed::LocalIp).is_empty());
}

#[test]
fn shell_failure_does_not_end_the_cycle() {
    let mut rig = Rig::configured();
    rig.bus.set_feed(Feed::ShellEnable, "ON");
    rig.shell.fail_open = true;
    let report = rig.run();

    assert_eq!(report.fatal, None);
    assert!(report.watered);
}

// ── Bootstrap / logging ───────────────────────────────────────

#[test]
fn unreadable_storage_is_fatal_at_bootstrap() {
    let mut rig = Rig::configured();
    rig.store.fail_reads = true;
    let report = rig.run();

    assert!(matches!(report.fatal, Some((Phase::Bootstrap, Error::Storage(_)))));
    assert!(rig.bus.subscriptions.is_empty());
    assert_eq!(rig.sleeper.requested, vec![120]);
}

#[test]
fn queued_log_lines_reach_the_log_feed() {
    let mut rig = Rig::configured();
    rig.logs.staged = vec!["[WARN] battery low", "[ERROR] ranger timeout"];
    rig.run();

    assert_eq!(
        rig.bus.published_on(Feed::Log),
        vec!["[WARN] battery low", "[ERROR] ranger timeout"]
    );
    assert_eq!(rig.logs.pending(), 0);
}

#[test]
fn log_overflow_is_reported_before_sleep() {
    let mut rig = Rig::configured();
    assert_eq!(rig.run().logs_dropped, 0);

    let mut rig = Rig::configured();
    rig.logs.overflowed = 4;
    let report = rig.run();
    assert_eq!(report.logs_dropped, 4);
    assert_eq!(rig.sleeper.requested, vec![120]);
}

#[test]
fn events_trace_the_phases_in_order() {
    let mut rig = Rig::configured();
    rig.run();

    let phases: Vec<Phase> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PhaseEntered(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            Phase::Bootstrap,
            Phase::RemoteSubscribe,
            Phase::Connectivity,
            Phase::SensorInit,
            Phase::RemoteShell,
            Phase::SenseAndPublish,
            Phase::ConfigResync,
            Phase::Irrigation,
            Phase::Sleep,
        ]
    );
    assert!(matches!(rig.sink.events.last(), Some(AppEvent::Sleeping { secs: 120 })));
}
