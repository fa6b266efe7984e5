//! MQTT adapter for the telemetry service.
//!
//! Implements [`PubSubPort`].  Inbound messages arrive on the client's
//! event callback and are queued for [`poll_incoming`], which the
//! config mirrors drain with a timeout.
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`
//!   over TLS, credentials supplied by the caller.
//! - **all other targets**: an in-memory broker that retains the last
//!   value per topic and answers `<topic>/get` the way the service does.
//!
//! [`poll_incoming`]: PubSubPort::poll_incoming

#[cfg(not(target_os = "espidf"))]
use std::collections::{HashMap, VecDeque};

use log::{debug, info, warn};

use crate::app::ports::{InboundMessage, PubSubPort};
use crate::error::CommsError;
use crate::remote::Topic;

/// Subscriptions held for replay on connect.
pub const MAX_SUBSCRIPTIONS: usize = 8;

/// Broker endpoint and account.
#[derive(Debug, Clone, Copy)]
pub struct MqttSettings {
    /// e.g. `mqtts://io.adafruit.com:8883`
    pub url: &'static str,
    pub client_id: &'static str,
    pub username: &'static str,
    pub password: &'static str,
}

pub struct MqttAdapter {
    settings: MqttSettings,
    subscriptions: heapless::Vec<Topic, MAX_SUBSCRIPTIONS>,
    #[cfg(target_os = "espidf")]
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    connected: std::sync::Arc<std::sync::atomic::AtomicBool>,
    #[cfg(target_os = "espidf")]
    inbox_tx: std::sync::mpsc::Sender<InboundMessage>,
    #[cfg(target_os = "espidf")]
    inbox: std::sync::mpsc::Receiver<InboundMessage>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

impl MqttAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(settings: MqttSettings) -> Self {
        let (inbox_tx, inbox) = std::sync::mpsc::channel();
        Self {
            settings,
            subscriptions: heapless::Vec::new(),
            client: None,
            connected: std::sync::Arc::default(),
            inbox_tx,
            inbox,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            subscriptions: heapless::Vec::new(),
            sim: SimBroker::default(),
        }
    }

    fn remember(&mut self, topic: &str) -> Result<bool, CommsError> {
        if self.subscriptions.iter().any(|t| t.as_str() == topic) {
            return Ok(false);
        }
        let mut t = Topic::new();
        t.push_str(topic).map_err(|_| CommsError::MqttSubscribeFailed)?;
        self.subscriptions.push(t).map_err(|_| {
            warn!("mqtt: subscription table full, dropping {}", topic);
            CommsError::MqttSubscribeFailed
        })?;
        Ok(true)
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

/// How long `connect()` waits for the broker's CONNACK.
#[cfg(target_os = "espidf")]
const CONNECT_WAIT_MS: u32 = 10_000;

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    fn start_client(&mut self) -> Result<(), CommsError> {
        use core::time::Duration;
        use std::sync::atomic::Ordering;

        use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};

        let conf = MqttClientConfiguration {
            client_id: Some(self.settings.client_id),
            username: Some(self.settings.username),
            password: Some(self.settings.password),
            keep_alive_interval: Some(Duration::from_secs(60)),
            network_timeout: Duration::from_secs(10),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };

        let connected = std::sync::Arc::clone(&self.connected);
        let inbox = self.inbox_tx.clone();
        let client = EspMqttClient::new_cb(self.settings.url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                info!("mqtt: connected");
                connected.store(true, Ordering::Release);
            }
            EventPayload::Disconnected => {
                warn!("mqtt: disconnected");
                connected.store(false, Ordering::Release);
            }
            EventPayload::Received { topic: Some(topic), data, .. } => {
                if let Some(msg) = InboundMessage::new(topic, data) {
                    let _ = inbox.send(msg);
                }
            }
            EventPayload::Error(e) => warn!("mqtt: {:?}", e),
            _ => {}
        })
        .map_err(|e| {
            warn!("mqtt: client start failed: {}", e);
            CommsError::MqttConnectFailed
        })?;
        self.client = Some(client);
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl PubSubPort for MqttAdapter {
    fn connect(&mut self) -> Result<(), CommsError> {
        use std::sync::atomic::Ordering;

        use esp_idf_svc::hal::delay::FreeRtos;
        use esp_idf_svc::mqtt::client::QoS;

        if self.client.is_none() {
            info!("mqtt: connecting to {}", self.settings.url);
            self.start_client()?;
        }

        let mut waited = 0;
        while !self.connected.load(Ordering::Acquire) {
            if waited >= CONNECT_WAIT_MS {
                return Err(CommsError::MqttConnectFailed);
            }
            FreeRtos::delay_ms(50);
            waited += 50;
        }

        let client = self.client.as_mut().ok_or(CommsError::MqttConnectFailed)?;
        for topic in &self.subscriptions {
            client
                .subscribe(topic.as_str(), QoS::AtLeastOnce)
                .map_err(|_| CommsError::MqttSubscribeFailed)?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::Acquire)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        use esp_idf_svc::mqtt::client::QoS;

        let fresh = self.remember(topic)?;
        if fresh && self.is_connected() {
            if let Some(client) = self.client.as_mut() {
                client
                    .subscribe(topic, QoS::AtLeastOnce)
                    .map_err(|_| CommsError::MqttSubscribeFailed)?;
            }
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        use esp_idf_svc::mqtt::client::QoS;

        if !self.is_connected() {
            return Err(CommsError::MqttDisconnected);
        }
        let client = self.client.as_mut().ok_or(CommsError::MqttDisconnected)?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| {
                debug!("mqtt: publish to {} failed: {}", topic, e);
                CommsError::MqttPublishFailed
            })?;
        Ok(())
    }

    fn poll_incoming(&mut self, timeout_ms: u32) -> Option<InboundMessage> {
        self.inbox
            .recv_timeout(core::time::Duration::from_millis(u64::from(timeout_ms)))
            .ok()
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation broker
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimBroker {
    connected: bool,
    retained: HashMap<String, Vec<u8>>,
    published: Vec<(String, String)>,
    inbox: VecDeque<InboundMessage>,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// Seed the value the service holds for `topic`.
    pub fn set_retained(&mut self, topic: &str, value: &str) {
        self.sim.retained.insert(topic.to_owned(), value.as_bytes().to_vec());
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> &[(String, String)] {
        &self.sim.published
    }
}

#[cfg(not(target_os = "espidf"))]
impl PubSubPort for MqttAdapter {
    fn connect(&mut self) -> Result<(), CommsError> {
        info!("mqtt(sim): connected to {} as {}", self.settings.url, self.settings.username);
        self.sim.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.sim.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.remember(topic)?;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.sim.connected {
            return Err(CommsError::MqttDisconnected);
        }
        self.sim
            .published
            .push((topic.to_owned(), String::from_utf8_lossy(payload).into_owned()));

        if let Some(base) = topic.strip_suffix("/get") {
            let subscribed = self.subscriptions.iter().any(|t| t.as_str() == base);
            if let (true, Some(value)) = (subscribed, self.sim.retained.get(base)) {
                if let Some(msg) = InboundMessage::new(base, value) {
                    self.sim.inbox.push_back(msg);
                }
            }
        } else {
            self.sim.retained.insert(topic.to_owned(), payload.to_vec());
        }
        Ok(())
    }

    fn poll_incoming(&mut self, _timeout_ms: u32) -> Option<InboundMessage> {
        let msg = self.sim.inbox.pop_front();
        if let Some(m) = &msg {
            debug!("mqtt(sim): delivering {}", m.topic);
        }
        msg
    }
}
