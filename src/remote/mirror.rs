//! Remote config mirror: a local copy of one config feed, refreshed by an
//! explicit request/response exchange over pub/sub.
//!
//! ```text
//!   update_value():  publish "" ──▶ <feed>/get
//!                    poll ×N    ◀── <feed>        (first match wins)
//! ```
//!
//! Pub/sub carries no correlation id, so a reply is recognised purely by
//! arriving on this mirror's set topic.  That is sound only while mirrors
//! refresh one at a time; the coordinator never interleaves them.
//! Messages on other topics seen during the poll window are dropped.

use log::{debug, error, warn};

use crate::app::ports::{MAX_PAYLOAD_LEN, PubSubPort};
use crate::error::{CommsError, Error, Result};

use super::{Feed, Topic};

/// Poll budget for one refresh.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub tries: u8,
    pub timeout_ms: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            tries: 10,
            timeout_ms: 50,
        }
    }
}

pub struct RemoteConfigMirror {
    feed: Feed,
    set_topic: Topic,
    get_topic: Topic,
    last: Option<heapless::Vec<u8, MAX_PAYLOAD_LEN>>,
    policy: PollPolicy,
}

impl RemoteConfigMirror {
    pub fn new(feed: Feed, user: &str, policy: PollPolicy) -> Result<Self> {
        Ok(Self {
            feed,
            set_topic: feed.topic(user)?,
            get_topic: feed.get_topic(user)?,
            last: None,
            policy,
        })
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    /// Subscribe to the set topic.
    pub fn init(&mut self, bus: &mut impl PubSubPort) -> Result<()> {
        bus.subscribe(&self.set_topic).map_err(|e| {
            error!("mirror: subscribe {} failed: {}", self.set_topic, e);
            Error::from(e)
        })
    }

    /// Request the current value and wait for it on the set topic.
    pub fn update_value(&mut self, bus: &mut impl PubSubPort) -> Result<()> {
        bus.publish(&self.get_topic, b"").map_err(|e| {
            error!("mirror: request on {} failed: {}", self.get_topic, e);
            Error::from(e)
        })?;

        for attempt in 1..=self.policy.tries {
            let Some(msg) = bus.poll_incoming(self.policy.timeout_ms) else {
                continue;
            };
            if msg.topic != self.set_topic {
                debug!("mirror: dropping message on {} while waiting for {}", msg.topic, self.set_topic);
                continue;
            }
            debug!("mirror: {} answered on poll {}", self.feed.name(), attempt);
            self.last = Some(msg.payload);
            return Ok(());
        }

        warn!(
            "mirror: no value for {} after {} polls",
            self.feed.name(),
            self.policy.tries
        );
        Err(Error::Comms(CommsError::NoResponse))
    }

    /// Last received payload as text.
    pub fn raw(&self) -> Option<&str> {
        self.last
            .as_deref()
            .and_then(|b| core::str::from_utf8(b).ok())
            .map(str::trim)
    }

    /// Interpret the last payload as a float.
    pub fn value_f64(&self) -> Result<f64> {
        let Some(raw) = self.raw() else {
            return Err(Error::Config("no value received"));
        };
        raw.parse::<f64>().map_err(|_| {
            error!("mirror: {} value '{}' is not a number", self.feed.name(), raw);
            Error::Config("remote value is not a number")
        })
    }

    /// Interpret the last payload as `ON`/`OFF`.  Anything else is off.
    pub fn value_on_off(&self) -> bool {
        match self.raw() {
            Some("ON") => true,
            Some("OFF") => false,
            other => {
                error!("mirror: {} value {:?} is not ON/OFF", self.feed.name(), other);
                false
            }
        }
    }
}
