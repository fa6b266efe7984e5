//! Mock adapters for integration tests.
//!
//! GPIO writes and delays land in one shared [`Trace`] so tests can assert
//! on the exact order of rail, pump and wait operations across the whole
//! wake cycle.  Network-side mocks keep their own records and are
//! inspected after the cycle returns.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

use greenhouse::adapters::nvs::NvsAdapter;
use greenhouse::app::events::AppEvent;
use greenhouse::app::ports::{
    AdcPort, BatteryStatus, ClockPort, ConnectivityError, ConnectivityPort, Environment, EventSink,
    GpioPort, InboundMessage, LogForwardPort, LogLine, PubSubPort, RangingPort, SensorDriverPort,
    ShellPort, SleepPort, SolarStatus, StorageError, StoragePort,
};
use greenhouse::error::{ActuatorError, CommsError, SensorDevice, SensorError};
use greenhouse::pins;
use greenhouse::remote::Feed;
use greenhouse::settings::persisted::NAMESPACE;

/// Feed owner used by `SystemConfig::default()`.
pub const USER: &str = "greenhouse";

/// Averaged moisture count that maps to just over 25 %.
pub const MOISTURE_RAW_25PCT: u16 = 2706;
/// Thermistor count for a room-temperature soil reading.
pub const SOIL_TEMP_RAW: u16 = 2048;

// ── Shared hardware trace ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Output(i32),
    Write(i32, bool),
    Float(i32),
    Delay(u32),
    Begin(SensorDevice),
}

pub type Trace = Rc<RefCell<Vec<Op>>>;

pub fn new_trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

#[allow(dead_code)]
pub fn position(trace: &Trace, op: Op) -> Option<usize> {
    trace.borrow().iter().position(|o| *o == op)
}

#[allow(dead_code)]
pub fn rposition(trace: &Trace, op: Op) -> Option<usize> {
    trace.borrow().iter().rposition(|o| *o == op)
}

#[allow(dead_code)]
pub fn count(trace: &Trace, op: Op) -> usize {
    trace.borrow().iter().filter(|o| **o == op).count()
}

// ── GPIO / delay ──────────────────────────────────────────────

pub struct MockGpio {
    trace: Trace,
    pub fail_writes: bool,
}

impl MockGpio {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: Rc::clone(trace),
            fail_writes: false,
        }
    }
}

impl GpioPort for MockGpio {
    fn configure_output(&mut self, pin: i32) -> Result<(), ActuatorError> {
        self.trace.borrow_mut().push(Op::Output(pin));
        Ok(())
    }

    fn write(&mut self, pin: i32, high: bool) -> Result<(), ActuatorError> {
        if self.fail_writes {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.trace.borrow_mut().push(Op::Write(pin, high));
        Ok(())
    }

    fn float(&mut self, pin: i32) -> Result<(), ActuatorError> {
        self.trace.borrow_mut().push(Op::Float(pin));
        Ok(())
    }
}

/// Records millisecond waits instead of sleeping.
pub struct MockDelay {
    trace: Trace,
}

impl MockDelay {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: Rc::clone(trace),
        }
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.trace.borrow_mut().push(Op::Delay(ms));
    }
}

// ── Sensors ───────────────────────────────────────────────────

pub struct MockDrivers {
    trace: Trace,
    pub environment: Environment,
    pub co2_ppm: f64,
    pub battery: BatteryStatus,
    pub solar: SolarStatus,
    /// `begin()` for this chip fails this many times before succeeding.
    pub begin_failures: Option<(SensorDevice, u32)>,
    pub fail_reads: bool,
}

impl MockDrivers {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: Rc::clone(trace),
            environment: Environment {
                temperature_c: 22.5,
                humidity_pct: 61.0,
            },
            co2_ppm: 415.0,
            battery: BatteryStatus {
                soc_pct: 87.0,
                cell_voltage_v: 4.05,
            },
            solar: SolarStatus {
                voltage_v: 5.5,
                current_ma: 120.0,
                power_mw: 660.0,
            },
            begin_failures: None,
            fail_reads: false,
        }
    }

    fn read<T>(&self, device: SensorDevice, value: T) -> Result<T, SensorError> {
        if self.fail_reads {
            return Err(SensorError::ReadFailed(device));
        }
        Ok(value)
    }
}

impl SensorDriverPort for MockDrivers {
    fn begin(&mut self, device: SensorDevice) -> Result<(), SensorError> {
        self.trace.borrow_mut().push(Op::Begin(device));
        if let Some((failing, left)) = self.begin_failures.as_mut() {
            if *failing == device && *left > 0 {
                *left -= 1;
                return Err(SensorError::InitFailed(device));
            }
        }
        Ok(())
    }

    fn read_environment(&mut self) -> Result<Environment, SensorError> {
        self.read(SensorDevice::Climate, self.environment)
    }

    fn read_co2_ppm(&mut self) -> Result<f64, SensorError> {
        self.read(SensorDevice::Co2, self.co2_ppm)
    }

    fn read_battery(&mut self) -> Result<BatteryStatus, SensorError> {
        self.read(SensorDevice::GasGauge, self.battery)
    }

    fn read_solar(&mut self) -> Result<SolarStatus, SensorError> {
        self.read(SensorDevice::SolarMonitor, self.solar)
    }
}

pub struct MockAdc {
    pub moisture_raw: u16,
    pub soil_temp_raw: u16,
}

impl Default for MockAdc {
    fn default() -> Self {
        Self {
            moisture_raw: MOISTURE_RAW_25PCT,
            soil_temp_raw: SOIL_TEMP_RAW,
        }
    }
}

impl AdcPort for MockAdc {
    fn read_raw(&mut self, channel: u32) -> Result<u16, SensorError> {
        match channel {
            pins::SOIL_MOISTURE_ADC_CH => Ok(self.moisture_raw),
            pins::SOIL_TEMP_ADC_CH => Ok(self.soil_temp_raw),
            _ => Err(SensorError::AdcReadFailed),
        }
    }
}

/// Ranger that always answers with the same echo (or never answers).
pub struct MockRanger {
    pub echo_us: Option<u32>,
}

impl MockRanger {
    pub fn at_cm(cm: u32) -> Self {
        Self {
            echo_us: Some(cm * 57),
        }
    }

    #[allow(dead_code)]
    pub fn silent() -> Self {
        Self { echo_us: None }
    }
}

impl RangingPort for MockRanger {
    fn ping_echo_us(&mut self, _max_echo_us: u32) -> Option<u32> {
        self.echo_us
    }
}

// ── Broker ────────────────────────────────────────────────────

/// In-memory broker.  A publish on `<topic>/get` re-sends the retained
/// value of `<topic>` if the client subscribed to it.
#[derive(Default)]
pub struct MockBroker {
    pub connected: bool,
    /// Failed `connect()` calls before one succeeds.
    pub connect_failures: u32,
    pub connect_attempts: u32,
    pub fail_publish: bool,
    pub subscriptions: Vec<String>,
    pub retained: HashMap<String, String>,
    pub published: Vec<(String, String)>,
    inbox: VecDeque<InboundMessage>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn set_feed(&mut self, feed: Feed, value: &str) {
        let topic = feed.topic(USER).unwrap().to_string();
        self.retained.insert(topic, value.to_string());
    }

    /// Payloads published on a feed's plain topic, in order.
    pub fn published_on(&self, feed: Feed) -> Vec<String> {
        let topic = feed.topic(USER).unwrap();
        self.published
            .iter()
            .filter(|(t, _)| t == topic.as_str())
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn requests_for(&self, feed: Feed) -> usize {
        let topic = feed.get_topic(USER).unwrap();
        self.published.iter().filter(|(t, _)| t == topic.as_str()).count()
    }

    /// Queue a message that arrives ahead of any requested reply.
    pub fn inject(&mut self, topic: &str, payload: &str) {
        self.inbox
            .push_back(InboundMessage::new(topic, payload.as_bytes()).unwrap());
    }
}

impl PubSubPort for MockBroker {
    fn connect(&mut self) -> Result<(), CommsError> {
        self.connect_attempts += 1;
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(CommsError::MqttConnectFailed);
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.connected {
            return Err(CommsError::MqttDisconnected);
        }
        if self.fail_publish {
            return Err(CommsError::MqttPublishFailed);
        }
        let text = String::from_utf8_lossy(payload).into_owned();
        self.published.push((topic.to_string(), text));

        if let Some(set_topic) = topic.strip_suffix("/get") {
            let subscribed = self.subscriptions.iter().any(|t| t == set_topic);
            if let (true, Some(value)) = (subscribed, self.retained.get(set_topic)) {
                let msg = InboundMessage::new(set_topic, value.as_bytes()).unwrap();
                self.inbox.push_back(msg);
            }
        }
        Ok(())
    }

    fn poll_incoming(&mut self, _timeout_ms: u32) -> Option<InboundMessage> {
        self.inbox.pop_front()
    }
}

// ── WiFi ──────────────────────────────────────────────────────

pub struct MockWifi {
    /// Polls before association; `None` never associates.
    pub polls_until_up: Option<u32>,
    pub fail_begin: bool,
    polls: Cell<u32>,
    begun: bool,
}

impl MockWifi {
    pub fn associating_after(polls: u32) -> Self {
        Self {
            polls_until_up: Some(polls),
            fail_begin: false,
            polls: Cell::new(0),
            begun: false,
        }
    }

    #[allow(dead_code)]
    pub fn never_up() -> Self {
        Self {
            polls_until_up: None,
            ..Self::associating_after(0)
        }
    }

    #[allow(dead_code)]
    pub fn polls(&self) -> u32 {
        self.polls.get()
    }
}

impl ConnectivityPort for MockWifi {
    fn begin(&mut self) -> Result<(), ConnectivityError> {
        if self.fail_begin {
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.begun = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if !self.begun {
            return false;
        }
        let n = self.polls.get();
        self.polls.set(n + 1);
        self.polls_until_up.is_some_and(|up| n >= up)
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.begun.then_some(Ipv4Addr::new(10, 0, 0, 42))
    }
}

// ── Shell ─────────────────────────────────────────────────────

/// Replays scripted input; an exhausted script reads as inactivity.
#[derive(Default)]
pub struct ScriptedShell {
    pub input: VecDeque<Result<Option<&'static str>, CommsError>>,
    pub output: Vec<String>,
    pub opened: bool,
    pub closed: bool,
    pub fail_open: bool,
}

#[allow(dead_code)]
impl ScriptedShell {
    pub fn with_lines(lines: &[&'static str]) -> Self {
        Self {
            input: lines.iter().map(|l| Ok(Some(*l))).collect(),
            ..Self::default()
        }
    }

    pub fn saw(&self, text: &str) -> bool {
        self.output.iter().any(|l| l == text)
    }
}

impl ShellPort for ScriptedShell {
    fn open(&mut self) -> Result<(), CommsError> {
        if self.fail_open {
            return Err(CommsError::ShellStartFailed);
        }
        self.opened = true;
        Ok(())
    }

    fn read_line(&mut self, _timeout_ms: u32) -> Result<Option<heapless::String<128>>, CommsError> {
        match self.input.pop_front() {
            Some(Ok(Some(s))) => {
                let mut line = heapless::String::new();
                line.push_str(s).unwrap();
                Ok(Some(line))
            }
            Some(Ok(None)) | None => Ok(None),
            Some(Err(e)) => Err(e),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), CommsError> {
        self.output.push(line.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ── Clock / sleep / logs / events ─────────────────────────────

pub struct FixedClock {
    pub hour: Option<u8>,
}

impl ClockPort for FixedClock {
    fn uptime_ms(&self) -> u64 {
        1_000
    }

    fn current_hour(&self) -> Option<u8> {
        self.hour
    }
}

#[derive(Default)]
pub struct RecordingSleep {
    pub requested: Vec<u32>,
}

impl SleepPort for RecordingSleep {
    fn deep_sleep(&mut self, secs: u32) {
        self.requested.push(secs);
    }
}

/// Log queue whose staged lines become visible once forwarding starts.
#[derive(Default)]
pub struct MockLogs {
    pub forwarding: bool,
    pub staged: Vec<&'static str>,
    pub overflowed: u32,
    queue: VecDeque<LogLine>,
}

impl LogForwardPort for MockLogs {
    fn set_forwarding(&mut self, enabled: bool) {
        self.forwarding = enabled;
        if !enabled {
            self.queue.clear();
            return;
        }
        for s in self.staged.drain(..) {
            let mut line = LogLine::new();
            line.push_str(s).unwrap();
            self.queue.push_back(line);
        }
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn next_line(&mut self) -> Option<LogLine> {
        self.queue.pop_front()
    }

    fn dropped(&self) -> u32 {
        self.overflowed
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Storage ───────────────────────────────────────────────────

/// Host NVS with write-failure injection.
pub struct FlakyStore {
    inner: NvsAdapter,
    pub fail_write_key: Option<&'static str>,
    pub fail_reads: bool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: NvsAdapter::new().unwrap(),
            fail_write_key: None,
            fail_reads: false,
        }
    }

    /// Seed a persisted setting directly.
    pub fn seed(&mut self, key: &str, value: f64) {
        self.inner.write(NAMESPACE, key, &value.to_le_bytes()).unwrap();
    }

    pub fn stored(&self, key: &str) -> Option<f64> {
        let mut buf = [0u8; 8];
        match self.inner.read(NAMESPACE, key, &mut buf) {
            Ok(8) => Some(f64::from_le_bytes(buf)),
            _ => None,
        }
    }
}

impl StoragePort for FlakyStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        if self.fail_reads {
            return Err(StorageError::IoError);
        }
        self.inner.read(namespace, key, buf)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_write_key == Some(key) {
            return Err(StorageError::IoError);
        }
        self.inner.write(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.inner.delete(namespace, key)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.inner.exists(namespace, key)
    }
}
