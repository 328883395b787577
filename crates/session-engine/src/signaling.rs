//! Signaling boundary.
//!
//! The host application supplies a [`Signaling`] implementation wrapping its
//! socket. Every round-trip goes through [`request_with_timeout`] so that a
//! silent server surfaces as [`EngineError::Timeout`] instead of a hang.
//!
//! Emissions decided inside the session actor are queued on an [`Outbox`] and
//! sent, in order, by a dispatcher task so the actor never waits on the network.
//! The queue is unbounded: a slow server delays emissions but never loses them.

use crate::errors::EngineError;
use crate::observability::metrics;
use crate::render::{AlertSeverity, AlertSink, DEFAULT_ALERT_DURATION_MS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Signaling event names.
pub mod events {
    pub const CREATE_WEBRTC_TRANSPORT: &str = "createWebRtcTransport";
    pub const CONSUMER_RESUME: &str = "consumer-resume";
    pub const PAUSE_PRODUCER_MEDIA: &str = "pauseProducerMedia";
    pub const RESUME_PRODUCER_AUDIO: &str = "resumeProducerAudio";
    pub const CLOSE_SCREEN_PRODUCER: &str = "closeScreenProducer";
    pub const REQUEST_SCREEN_SHARE: &str = "requestScreenShare";
    pub const PARTICIPANT_REQUEST: &str = "participantRequest";
    pub const UPDATE_HOST_BREAKOUT: &str = "updateHostBreakout";
    pub const UPDATE_SCREEN_CLIENT: &str = "updateScreenClient";
}

/// Server acknowledgment `{success, reason?, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Any other fields returned with the ack.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Ack {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// Successful ack carrying extra fields. Non-object data is ignored.
    #[must_use]
    pub fn ok_with(data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            success: true,
            reason: None,
            data,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
            data: Map::new(),
        }
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    #[must_use]
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.field(key).and_then(Value::as_bool)
    }
}

/// Socket abstraction supplied by the host application.
#[async_trait]
pub trait Signaling: Send + Sync {
    /// Whether the underlying socket is connected.
    fn is_connected(&self) -> bool;

    /// Socket id as assigned by the server.
    fn socket_id(&self) -> Option<String>;

    /// Emit `event` with `payload` and wait for the acknowledgment.
    async fn request(&self, event: &str, payload: Value) -> Result<Ack, EngineError>;
}

/// Run a signaling round-trip under a deadline.
///
/// # Errors
///
/// - `Signaling` if the socket is disconnected or the request fails
/// - `Timeout` if no ack arrives within `timeout`
pub async fn request_with_timeout(
    signaling: &dyn Signaling,
    event: &str,
    payload: Value,
    timeout: Duration,
) -> Result<Ack, EngineError> {
    if !signaling.is_connected() {
        metrics::record_signaling_request(event, "unavailable");
        return Err(EngineError::Signaling(
            "socket connection is unavailable".to_string(),
        ));
    }

    let started = Instant::now();
    let result = tokio::time::timeout(timeout, signaling.request(event, payload)).await;
    metrics::record_signaling_latency(event, started.elapsed());

    match result {
        Ok(Ok(ack)) => {
            let status = if ack.success { "success" } else { "rejected" };
            metrics::record_signaling_request(event, status);
            Ok(ack)
        }
        Ok(Err(e)) => {
            metrics::record_signaling_request(event, "error");
            Err(e)
        }
        Err(_) => {
            metrics::record_signaling_request(event, "timeout");
            Err(EngineError::timeout(event, timeout))
        }
    }
}

/// An emission queued by the session actor.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub event: &'static str,
    pub payload: Value,
}

/// Sending half of the ordered outbound queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::UnboundedSender<OutboundEvent>,
}

impl Outbox {
    /// Queue an emission without waiting. Only fails once the dispatcher
    /// has stopped.
    pub fn emit(&self, event: &'static str, payload: Value) {
        if self.sender.send(OutboundEvent { event, payload }).is_err() {
            warn!(
                target: "se.signaling",
                event,
                "Outbound event dropped, dispatcher stopped"
            );
            metrics::record_signaling_request(event, "dropped");
        }
    }

    /// Build an outbox whose events are delivered to `sender` (for tests).
    #[must_use]
    pub fn from_sender(sender: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self { sender }
    }
}

/// Spawn the task that drains the outbox in order.
///
/// Rejections with a reason and timeouts are shown through the alert sink.
pub fn spawn_dispatcher(
    signaling: Arc<dyn Signaling>,
    alerts: Arc<dyn AlertSink>,
    timeout: Duration,
    cancel_token: CancellationToken,
) -> (Outbox, JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_dispatcher(
        receiver,
        signaling,
        alerts,
        timeout,
        cancel_token,
    ));
    (Outbox { sender }, task)
}

#[instrument(skip_all, name = "se.signaling.dispatcher")]
async fn run_dispatcher(
    mut receiver: mpsc::UnboundedReceiver<OutboundEvent>,
    signaling: Arc<dyn Signaling>,
    alerts: Arc<dyn AlertSink>,
    timeout: Duration,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            next = receiver.recv() => {
                let Some(OutboundEvent { event, payload }) = next else {
                    break;
                };
                match request_with_timeout(signaling.as_ref(), event, payload, timeout).await {
                    Ok(ack) if ack.success => {
                        debug!(target: "se.signaling", event, "Outbound event acknowledged");
                    }
                    Ok(ack) => {
                        warn!(
                            target: "se.signaling",
                            event,
                            reason = ?ack.reason,
                            "Outbound event rejected"
                        );
                        if let Some(reason) = ack.reason {
                            alerts.show_alert(&reason, AlertSeverity::Danger, DEFAULT_ALERT_DURATION_MS);
                        }
                    }
                    Err(e) => {
                        warn!(target: "se.signaling", event, error = %e, "Outbound event failed");
                        if matches!(e, EngineError::Timeout { .. }) {
                            alerts.show_alert(&e.alert_message(), e.severity(), DEFAULT_ALERT_DURATION_MS);
                        }
                    }
                }
            }
        }
    }

    debug!(target: "se.signaling", "Outbound dispatcher stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::render::mock::RecordingAlerts;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Signaling stub answering every request with a fixed result.
    struct StubSignaling {
        connected: AtomicBool,
        ack: Option<Ack>,
        delay: Duration,
        seen: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl StubSignaling {
        fn answering(ack: Ack) -> Self {
            Self {
                connected: AtomicBool::new(true),
                ack: Some(ack),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn silent() -> Self {
            Self {
                delay: Duration::from_secs(3600),
                ..Self::answering(Ack::ok())
            }
        }
    }

    #[async_trait]
    impl Signaling for StubSignaling {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn socket_id(&self) -> Option<String> {
            Some("socket-1".to_string())
        }

        async fn request(&self, event: &str, _payload: Value) -> Result<Ack, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(event.to_string());
            tokio::time::sleep(self.delay).await;
            self.ack
                .clone()
                .ok_or_else(|| EngineError::Signaling("no answer".to_string()))
        }
    }

    #[test]
    fn test_ack_deserializes_extra_fields() {
        let ack: Ack = serde_json::from_value(json!({
            "success": true,
            "allowScreenShare": false,
            "params": {"id": "t-1"}
        }))
        .unwrap();

        assert!(ack.success);
        assert_eq!(ack.bool_field("allowScreenShare"), Some(false));
        assert!(ack.field("params").is_some());
        assert_eq!(ack.reason, None);
    }

    #[test]
    fn test_ack_missing_success_is_false() {
        let ack: Ack = serde_json::from_value(json!({"reason": "nope"})).unwrap();
        assert!(!ack.success);
        assert_eq!(ack.reason.as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn test_request_with_timeout_returns_ack() {
        let signaling = StubSignaling::answering(Ack::ok());

        let ack = request_with_timeout(&signaling, "ping", json!({}), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(ack.success);
        assert_eq!(signaling.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_request_with_timeout_rejects_when_disconnected() {
        let signaling = StubSignaling::answering(Ack::ok());
        signaling.connected.store(false, Ordering::SeqCst);

        let err = request_with_timeout(&signaling, "ping", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Signaling(_)));
        assert_eq!(signaling.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_with_timeout_times_out() {
        let signaling = StubSignaling::silent();

        let err = request_with_timeout(&signaling, "ping", json!({}), Duration::from_secs(10))
            .await
            .unwrap_err();

        assert!(
            matches!(err, EngineError::Timeout { ref operation, timeout } if operation == "ping" && timeout == Duration::from_secs(10))
        );
    }

    #[tokio::test]
    async fn test_dispatcher_preserves_order_and_alerts_on_rejection() {
        let signaling = Arc::new(StubSignaling::answering(Ack::rejected("room is full")));
        let alerts = Arc::new(RecordingAlerts::default());
        let cancel = CancellationToken::new();

        let (outbox, task) = spawn_dispatcher(
            signaling.clone(),
            alerts.clone(),
            Duration::from_secs(1),
            cancel.clone(),
        );

        outbox.emit("first", json!({}));
        outbox.emit("second", json!({}));
        drop(outbox);
        task.await.unwrap();

        assert_eq!(
            *signaling.seen.lock().unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
        let shown = alerts.messages();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].0, "room is full");
        assert_eq!(shown[0].1, AlertSeverity::Danger);
    }

    #[tokio::test]
    async fn test_outbox_from_sender_delivers_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outbox = Outbox::from_sender(tx);

        outbox.emit(events::UPDATE_HOST_BREAKOUT, json!({"newRoom": 1}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "updateHostBreakout");
        assert_eq!(event.payload["newRoom"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_server_does_not_lose_queued_events() {
        // Each ack takes 5 s, so the first request is still in flight while
        // the rest pile up behind it.
        let signaling = Arc::new(StubSignaling {
            delay: Duration::from_secs(5),
            ..StubSignaling::answering(Ack::ok())
        });
        let alerts = Arc::new(RecordingAlerts::default());
        let cancel = CancellationToken::new();
        let (outbox, task) = spawn_dispatcher(
            signaling.clone(),
            alerts.clone(),
            Duration::from_secs(10),
            cancel.clone(),
        );

        let emitted = 200;
        for _ in 0..emitted {
            outbox.emit(events::CONSUMER_RESUME, json!({"serverConsumerId": "c-1"}));
        }
        outbox.emit(events::UPDATE_HOST_BREAKOUT, json!({"newRoom": 0}));
        drop(outbox);
        task.await.unwrap();

        let seen = signaling.seen.lock().unwrap();
        assert_eq!(seen.len(), emitted + 1);
        assert_eq!(seen.last().map(String::as_str), Some(events::UPDATE_HOST_BREAKOUT));
        assert!(alerts.messages().is_empty());
    }
}
