//! Fuzz target: remote config mirror payloads
//!
//! Delivers arbitrary bytes as the reply to a mirror refresh and checks
//! that interpreting them never panics, and that `ON` is the only
//! payload read as on.
//!
//! cargo fuzz run fuzz_remote_value

#![no_main]

use std::collections::VecDeque;

use greenhouse::app::ports::{InboundMessage, PubSubPort};
use greenhouse::error::CommsError;
use greenhouse::remote::mirror::{PollPolicy, RemoteConfigMirror};
use greenhouse::remote::Feed;
use libfuzzer_sys::fuzz_target;

struct OneShot {
    inbox: VecDeque<InboundMessage>,
}

impl PubSubPort for OneShot {
    fn connect(&mut self) -> Result<(), CommsError> {
        Ok(())
    }
    fn is_connected(&self) -> bool {
        true
    }
    fn subscribe(&mut self, _topic: &str) -> Result<(), CommsError> {
        Ok(())
    }
    fn publish(&mut self, _topic: &str, _payload: &[u8]) -> Result<(), CommsError> {
        Ok(())
    }
    fn poll_incoming(&mut self, _timeout_ms: u32) -> Option<InboundMessage> {
        self.inbox.pop_front()
    }
}

fuzz_target!(|data: &[u8]| {
    let policy = PollPolicy { tries: 1, timeout_ms: 0 };
    let Ok(mut mirror) = RemoteConfigMirror::new(Feed::UpdateConfig, "fuzz", policy) else {
        return;
    };
    let Some(msg) = InboundMessage::new("fuzz/feeds/update-config", data) else {
        return;
    };
    let mut bus = OneShot {
        inbox: VecDeque::from([msg]),
    };

    assert!(mirror.update_value(&mut bus).is_ok());
    let on = mirror.value_on_off();
    assert_eq!(on, mirror.raw() == Some("ON"));
    if mirror.value_f64().is_ok() {
        assert!(mirror.raw().is_some_and(|r| !r.is_empty()));
    }
});
