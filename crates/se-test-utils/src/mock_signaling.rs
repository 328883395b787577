//! Mock signaling socket.
//!
//! Records every request and answers from a per-event script. Unscripted
//! events get a sensible default ack:
//! - `createWebRtcTransport` returns transport parameters
//! - `requestScreenShare` allows the share
//! - everything else succeeds
//!
//! # Example
//!
//! ```rust,ignore
//! use se_test_utils::MockSignaling;
//!
//! let signaling = MockSignaling::builder()
//!     .reject("requestScreenShare", "not now")
//!     .build();
//!
//! // Hand `Arc::clone(&signaling)` to the session, then inspect:
//! signaling.wait_for("pauseProducerMedia", 1).await;
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use session_engine::signaling::{events, Ack, Signaling};
use session_engine::EngineError;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// How the mock answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Ack(Ack),
    Fail(EngineError),
    /// Never answer; the caller's deadline decides.
    Silent,
}

/// A request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub event: String,
    pub payload: Value,
}

/// Scriptable [`Signaling`] implementation.
#[derive(Debug)]
pub struct MockSignaling {
    connected: AtomicBool,
    socket_id: Option<String>,
    /// One-shot replies, consumed in order before `standing`.
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    standing: Mutex<HashMap<String, Reply>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
    notify: Notify,
}

impl MockSignaling {
    #[must_use]
    pub fn builder() -> MockSignalingBuilder {
        MockSignalingBuilder::default()
    }

    /// Connected socket answering every event with its default ack.
    #[must_use]
    pub fn accepting() -> Arc<Self> {
        Self::builder().build()
    }

    /// Socket that reports itself as disconnected.
    #[must_use]
    pub fn disconnected() -> Arc<Self> {
        Self::builder().disconnected().build()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Queue a one-shot reply for the next `event` request.
    pub fn push_reply(&self, event: &str, reply: Reply) {
        self.queued
            .lock()
            .unwrap()
            .entry(event.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Payloads of every `event` request, oldest first.
    #[must_use]
    pub fn payloads(&self, event: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event == event)
            .map(|r| r.payload.clone())
            .collect()
    }

    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.payloads(event).len()
    }

    /// Event names in the order they were requested.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.event.clone())
            .collect()
    }

    /// Wait until at least `count` `event` requests have arrived.
    ///
    /// Panics after five seconds so a missing emission fails the test rather
    /// than hanging it.
    pub async fn wait_for(&self, event: &str, count: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                if self.count(event) >= count {
                    return;
                }
                notified.await;
            }
        })
        .await;
        assert!(
            waited.is_ok(),
            "timed out waiting for {count} `{event}` request(s), saw {:?}",
            self.event_names()
        );
    }

    fn next_reply(&self, event: &str) -> Reply {
        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(event)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        if let Some(reply) = self.standing.lock().unwrap().get(event) {
            return reply.clone();
        }
        Reply::Ack(default_ack(event))
    }
}

fn default_ack(event: &str) -> Ack {
    match event {
        events::CREATE_WEBRTC_TRANSPORT => Ack::ok_with(json!({
            "params": {
                "id": format!("transport-{}", uuid::Uuid::new_v4()),
                "iceParameters": {},
                "iceCandidates": [],
                "dtlsParameters": {}
            }
        })),
        events::REQUEST_SCREEN_SHARE => Ack::ok_with(json!({ "allowScreenShare": true })),
        _ => Ack::ok(),
    }
}

#[async_trait]
impl Signaling for MockSignaling {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn socket_id(&self) -> Option<String> {
        self.socket_id.clone()
    }

    async fn request(&self, event: &str, payload: Value) -> Result<Ack, EngineError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            event: event.to_string(),
            payload,
        });
        self.notify.notify_waiters();

        let reply = self.next_reply(event);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Reply::Ack(ack) => Ok(ack),
            Reply::Fail(e) => Err(e),
            Reply::Silent => std::future::pending().await,
        }
    }
}

/// Builder for [`MockSignaling`].
#[derive(Debug)]
pub struct MockSignalingBuilder {
    connected: bool,
    socket_id: Option<String>,
    standing: HashMap<String, Reply>,
    delay: Option<Duration>,
}

impl Default for MockSignalingBuilder {
    fn default() -> Self {
        Self {
            connected: true,
            socket_id: Some("socket-local".to_string()),
            standing: HashMap::new(),
            delay: None,
        }
    }
}

impl MockSignalingBuilder {
    #[must_use]
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    #[must_use]
    pub fn with_socket_id(mut self, socket_id: Option<&str>) -> Self {
        self.socket_id = socket_id.map(str::to_string);
        self
    }

    /// Always answer `event` with `ack`.
    #[must_use]
    pub fn respond(mut self, event: &str, ack: Ack) -> Self {
        self.standing.insert(event.to_string(), Reply::Ack(ack));
        self
    }

    /// Always reject `event` with `reason`.
    #[must_use]
    pub fn reject(self, event: &str, reason: &str) -> Self {
        self.respond(event, Ack::rejected(reason))
    }

    /// Always fail `event` at the transport level.
    #[must_use]
    pub fn fail(mut self, event: &str, error: EngineError) -> Self {
        self.standing.insert(event.to_string(), Reply::Fail(error));
        self
    }

    /// Never answer `event`.
    #[must_use]
    pub fn silent(mut self, event: &str) -> Self {
        self.standing.insert(event.to_string(), Reply::Silent);
        self
    }

    /// Delay every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<MockSignaling> {
        Arc::new(MockSignaling {
            connected: AtomicBool::new(self.connected),
            socket_id: self.socket_id,
            queued: Mutex::new(HashMap::new()),
            standing: Mutex::new(self.standing),
            delay: self.delay,
            requests: Mutex::new(Vec::new()),
            notify: Notify::new(),
        })
    }
}
