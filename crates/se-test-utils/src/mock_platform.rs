//! Mock WebRTC platform handles.
//!
//! Every handle records its pause/resume/close calls so tests can assert on
//! what the engine did to the media plane.
//!
//! # Example
//!
//! ```rust,ignore
//! use se_test_utils::{MockConsumer, MockDevice};
//!
//! let device = MockDevice::new();
//! let consumer = MockConsumer::new("p-video-bob", MediaKind::Video);
//! assert!(consumer.is_paused());
//! ```

use async_trait::async_trait;
use session_engine::model::MediaKind;
use session_engine::platform::{
    Consumer, Device, MediaStream, ProduceOptions, Producer, ScreenConstraints, Transport,
    TransportDirection,
};
use session_engine::EngineError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Captured or received media stream.
#[derive(Debug)]
pub struct MockMediaStream {
    id: String,
    stopped: AtomicBool,
}

impl MockMediaStream {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            stopped: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaStream for MockMediaStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Outbound producer.
#[derive(Debug)]
pub struct MockProducer {
    id: String,
    kind: MediaKind,
    paused: AtomicBool,
    closed: AtomicBool,
}

impl MockProducer {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            kind,
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Producer for MockProducer {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Inbound consumer. Starts paused, like a freshly created consumer.
#[derive(Debug)]
pub struct MockConsumer {
    id: String,
    producer_id: String,
    kind: MediaKind,
    paused: AtomicBool,
    closed: AtomicBool,
    stream: Arc<MockMediaStream>,
}

impl MockConsumer {
    #[must_use]
    pub fn new(producer_id: impl Into<String>, kind: MediaKind) -> Arc<Self> {
        let producer_id = producer_id.into();
        Arc::new(Self {
            id: format!("consumer-{producer_id}"),
            stream: MockMediaStream::new(format!("stream-{producer_id}")),
            producer_id,
            kind,
            paused: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Consumer for MockConsumer {
    fn id(&self) -> &str {
        &self.id
    }

    fn producer_id(&self) -> &str {
        &self.producer_id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn stream(&self) -> Option<Arc<dyn MediaStream>> {
        let stream: Arc<dyn MediaStream> = self.stream.clone();
        Some(stream)
    }
}

/// Send or receive transport. `produce` hands out [`MockProducer`]s.
#[derive(Debug)]
pub struct MockTransport {
    id: String,
    direction: TransportDirection,
    closed: AtomicBool,
    fail_produce: bool,
    produce_delay: Option<Duration>,
    producers: Mutex<Vec<Arc<MockProducer>>>,
}

impl MockTransport {
    #[must_use]
    pub fn send() -> Arc<Self> {
        Self::build(TransportDirection::Send, false, None)
    }

    #[must_use]
    pub fn recv() -> Arc<Self> {
        Self::build(TransportDirection::Recv, false, None)
    }

    fn build(direction: TransportDirection, fail_produce: bool, produce_delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            id: format!("transport-{}", Uuid::new_v4()),
            direction,
            closed: AtomicBool::new(false),
            fail_produce,
            produce_delay,
            producers: Mutex::new(Vec::new()),
        })
    }

    /// Producers created on this transport, oldest first.
    #[must_use]
    pub fn producers(&self) -> Vec<Arc<MockProducer>> {
        self.producers.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn direction(&self) -> TransportDirection {
        self.direction
    }

    async fn produce(
        &self,
        _source: Arc<dyn MediaStream>,
        options: ProduceOptions,
    ) -> Result<Arc<dyn Producer>, EngineError> {
        if let Some(delay) = self.produce_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_produce {
            return Err(EngineError::Transport("produce rejected".to_string()));
        }
        let index = self.producers.lock().unwrap().len();
        let producer = MockProducer::new(
            format!("{}-{}-{index}", options.kind.as_str(), self.id),
            options.kind,
        );
        self.producers.lock().unwrap().push(Arc::clone(&producer));
        Ok(producer)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Loaded device. Keeps every transport and capture it hands out.
#[derive(Debug, Default)]
pub struct MockDevice {
    fail_transport: bool,
    fail_produce: bool,
    fail_capture: bool,
    produce_delay: Option<Duration>,
    capture_delay: Option<Duration>,
    transports: Mutex<Vec<(MediaKind, Arc<MockTransport>)>>,
    captures: Mutex<Vec<Arc<MockMediaStream>>>,
    capture_count: AtomicUsize,
}

impl MockDevice {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn builder() -> MockDeviceBuilder {
        MockDeviceBuilder::default()
    }

    /// Send transports created so far, with the kind they were created for.
    #[must_use]
    pub fn transports(&self) -> Vec<(MediaKind, Arc<MockTransport>)> {
        self.transports.lock().unwrap().clone()
    }

    /// Most recent send transport created for `kind`.
    #[must_use]
    pub fn transport(&self, kind: MediaKind) -> Option<Arc<MockTransport>> {
        self.transports
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, t)| Arc::clone(t))
    }

    /// Display captures handed out so far.
    #[must_use]
    pub fn captures(&self) -> Vec<Arc<MockMediaStream>> {
        self.captures.lock().unwrap().clone()
    }
}

#[async_trait]
impl Device for MockDevice {
    fn create_send_transport(
        &self,
        kind: MediaKind,
        _params: &serde_json::Value,
    ) -> Result<Arc<dyn Transport>, EngineError> {
        if self.fail_transport {
            return Err(EngineError::Transport("device refused transport".to_string()));
        }
        let transport = MockTransport::build(TransportDirection::Send, self.fail_produce, self.produce_delay);
        self.transports
            .lock()
            .unwrap()
            .push((kind, Arc::clone(&transport)));
        Ok(transport)
    }

    async fn capture_display(
        &self,
        _constraints: ScreenConstraints,
    ) -> Result<Arc<dyn MediaStream>, EngineError> {
        if let Some(delay) = self.capture_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_capture {
            return Err(EngineError::Transport("display capture denied".to_string()));
        }
        let n = self.capture_count.fetch_add(1, Ordering::SeqCst);
        let capture = MockMediaStream::new(format!("display-{n}"));
        self.captures.lock().unwrap().push(Arc::clone(&capture));
        Ok(capture)
    }
}

/// Builder for [`MockDevice`] failure modes.
#[derive(Debug, Default)]
pub struct MockDeviceBuilder {
    device: MockDevice,
}

impl MockDeviceBuilder {
    #[must_use]
    pub fn fail_transport(mut self) -> Self {
        self.device.fail_transport = true;
        self
    }

    /// Transports created by this device reject `produce`.
    #[must_use]
    pub fn fail_produce(mut self) -> Self {
        self.device.fail_produce = true;
        self
    }

    #[must_use]
    pub fn fail_capture(mut self) -> Self {
        self.device.fail_capture = true;
        self
    }

    #[must_use]
    pub fn with_produce_delay(mut self, delay: Duration) -> Self {
        self.device.produce_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.device.capture_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<MockDevice> {
        Arc::new(self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_tracks_transports_and_producers() {
        let device = MockDevice::new();
        let transport = device
            .create_send_transport(MediaKind::Video, &serde_json::Value::Null)
            .unwrap();
        let source: Arc<dyn MediaStream> = MockMediaStream::new("camera");
        let producer = transport.produce(source, ProduceOptions::video()).await.unwrap();

        assert_eq!(producer.kind(), MediaKind::Video);
        let mock = device.transport(MediaKind::Video).unwrap();
        assert_eq!(mock.producers().len(), 1);
        assert!(device.transport(MediaKind::Audio).is_none());
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let device = MockDevice::builder().fail_produce().fail_capture().build();
        let transport = device
            .create_send_transport(MediaKind::Audio, &serde_json::Value::Null)
            .unwrap();
        let source: Arc<dyn MediaStream> = MockMediaStream::new("mic");
        assert!(transport.produce(source, ProduceOptions::audio()).await.is_err());
        assert!(device
            .capture_display(session_engine::platform::ScreenResolution::Hd.into())
            .await
            .is_err());

        let device = MockDevice::builder().fail_transport().build();
        assert!(device
            .create_send_transport(MediaKind::Audio, &serde_json::Value::Null)
            .is_err());
    }

    #[test]
    fn test_consumer_starts_paused() {
        let consumer = MockConsumer::new("p1", MediaKind::Audio);
        assert!(consumer.is_paused());
        consumer.resume();
        assert!(!consumer.is_paused());
        assert!(consumer.stream().is_some());
    }
}
