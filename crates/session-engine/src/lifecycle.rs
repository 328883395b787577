//! Transport, producer and consumer lifecycle.
//!
//! Two halves:
//! - [`Lifecycle`] performs the network and platform calls (transport
//!   creation, produce, signaling acks) under deadlines. It runs in the
//!   caller's task and never touches session state.
//! - The `Orchestrator` methods below commit the results: consumer
//!   registration, resume, producer closure and consumer visibility.

use crate::errors::EngineError;
use crate::model::{ConsumerTransportInfo, DisplayType, EventType, Level, MediaKind, SessionIdentity, Stream};
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;
use crate::platform::{
    Consumer, Device, MediaStream, ProduceOptions, Producer, ScreenConstraints, Transport,
};
use crate::signaling::{events, request_with_timeout, Signaling};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Network side of the lifecycle manager.
#[derive(Clone)]
pub struct Lifecycle {
    signaling: Arc<dyn Signaling>,
    device: Arc<dyn Device>,
    room_name: String,
    level: Level,
    signaling_timeout: Duration,
}

impl Lifecycle {
    pub fn new(
        signaling: Arc<dyn Signaling>,
        device: Arc<dyn Device>,
        identity: &SessionIdentity,
        signaling_timeout: Duration,
    ) -> Self {
        Self {
            signaling,
            device,
            room_name: identity.room_name.clone(),
            level: identity.level,
            signaling_timeout,
        }
    }

    /// Request transport parameters and build a send transport.
    ///
    /// # Errors
    ///
    /// - `Signaling` when the socket is unavailable
    /// - `Timeout` when the server does not answer within `timeout`
    /// - `Transport` when the server rejects or the device fails
    #[instrument(skip_all, name = "se.lifecycle.create_transport", fields(kind = kind.as_str()))]
    pub async fn create_transport(
        &self,
        kind: MediaKind,
        timeout: Duration,
    ) -> Result<Arc<dyn Transport>, EngineError> {
        let payload = json!({ "consumer": false, "islevel": self.level.as_str() });
        let ack = request_with_timeout(
            self.signaling.as_ref(),
            events::CREATE_WEBRTC_TRANSPORT,
            payload,
            timeout,
        )
        .await?;

        if !ack.success {
            return Err(EngineError::Transport(
                ack.reason
                    .unwrap_or_else(|| "transport creation rejected".to_string()),
            ));
        }
        let params = ack
            .field("params")
            .cloned()
            .ok_or_else(|| EngineError::Transport("transport parameters missing".to_string()))?;

        let transport = self.device.create_send_transport(kind, &params)?;
        debug!(target: "se.lifecycle", transport_id = %transport.id(), "Send transport created");
        Ok(transport)
    }

    /// Produce `source` on `transport` under `timeout`.
    ///
    /// # Errors
    ///
    /// `Timeout`, or whatever the transport reports.
    pub async fn produce(
        &self,
        transport: &Arc<dyn Transport>,
        source: Arc<dyn MediaStream>,
        options: ProduceOptions,
        timeout: Duration,
    ) -> Result<Arc<dyn Producer>, EngineError> {
        let kind = options.kind;
        tokio::time::timeout(timeout, transport.produce(source, options))
            .await
            .map_err(|_| EngineError::timeout(format!("produce {}", kind.as_str()), timeout))?
    }

    /// Ask the server to start forwarding to `consumer`.
    ///
    /// # Errors
    ///
    /// `Timeout`, `Signaling`, or `Signaling` with the rejection reason.
    pub async fn request_consumer_resume(&self, consumer: &Arc<dyn Consumer>) -> Result<(), EngineError> {
        let ack = request_with_timeout(
            self.signaling.as_ref(),
            events::CONSUMER_RESUME,
            json!({ "serverConsumerId": consumer.id() }),
            self.signaling_timeout,
        )
        .await?;
        if ack.success {
            Ok(())
        } else {
            Err(EngineError::Signaling(
                ack.reason
                    .unwrap_or_else(|| "consumer resume rejected".to_string()),
            ))
        }
    }

    async fn announce(&self, event: &'static str, payload: Value) -> Result<(), EngineError> {
        let ack = request_with_timeout(
            self.signaling.as_ref(),
            event,
            payload,
            self.signaling_timeout,
        )
        .await?;
        if !ack.success {
            warn!(target: "se.lifecycle", event, reason = ?ack.reason, "Server rejected announcement");
        }
        Ok(())
    }

    /// `pauseProducerMedia {mediaTag, roomName}`.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Signaling`.
    pub async fn announce_pause(&self, kind: MediaKind) -> Result<(), EngineError> {
        self.announce(
            events::PAUSE_PRODUCER_MEDIA,
            json!({ "mediaTag": kind.as_str(), "roomName": self.room_name }),
        )
        .await
    }

    /// `resumeProducerAudio {mediaTag, roomName}`.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Signaling`.
    pub async fn announce_audio_resume(&self) -> Result<(), EngineError> {
        self.announce(
            events::RESUME_PRODUCER_AUDIO,
            json!({ "mediaTag": "audio", "roomName": self.room_name }),
        )
        .await
    }

    /// `closeScreenProducer`.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Signaling`.
    pub async fn announce_screen_closed(&self) -> Result<(), EngineError> {
        self.announce(events::CLOSE_SCREEN_PRODUCER, json!({})).await
    }

    /// Ask the server whether this member may share. Returns the verdict.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Signaling`.
    pub async fn request_screen_share(&self) -> Result<bool, EngineError> {
        let ack = request_with_timeout(
            self.signaling.as_ref(),
            events::REQUEST_SCREEN_SHARE,
            json!({}),
            self.signaling_timeout,
        )
        .await?;
        Ok(ack.bool_field("allowScreenShare").unwrap_or(ack.success))
    }

    /// Capture the display under `timeout`.
    ///
    /// # Errors
    ///
    /// `Timeout`, or the device error.
    pub async fn capture_display(
        &self,
        constraints: ScreenConstraints,
        timeout: Duration,
    ) -> Result<Arc<dyn MediaStream>, EngineError> {
        tokio::time::timeout(timeout, self.device.capture_display(constraints))
            .await
            .map_err(|_| EngineError::timeout("capture display", timeout))?
    }
}

/// Result of a producer-closed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerClosedOutcome {
    /// The matching consumer entry was closed and removed.
    Removed(MediaKind),
    /// No entry matched; the layout was still recomputed.
    Unknown(MediaKind),
}

impl Orchestrator {
    /// Register a receive-side entry. A stale entry for the same producer is
    /// closed.
    pub fn register_consumer_transport(&mut self, info: ConsumerTransportInfo) {
        let producer_id = info.producer_id.clone();
        if let Some(stale) = self.state.register_consumer_transport(info) {
            warn!(
                target: "se.lifecycle",
                producer_id = %producer_id,
                "Replacing stale consumer entry"
            );
            stale.close();
        }
        metrics::set_consumer_transports_active(self.state.consumer_transports().len());
    }

    /// The server acknowledged `consumer-resume` for `producer_id`.
    ///
    /// Returns `false` when the entry was removed while the request was in
    /// flight; the late resume is dropped.
    pub fn consumer_resumed(&mut self, producer_id: &str) -> bool {
        let Some(entry) = self.state.consumer_transport(producer_id) else {
            debug!(target: "se.lifecycle", producer_id, "Late consumer resume dropped");
            return false;
        };
        let kind = entry.kind;
        let consumer = Arc::clone(&entry.consumer);
        consumer.resume();

        let owner = self.state.owner_of(producer_id).map(str::to_string);
        if owner.is_none() {
            warn!(target: "se.lifecycle", producer_id, "Consumed producer has no known owner");
        }
        let mut stream = Stream::remote(producer_id, owner.unwrap_or_default(), kind);
        if let Some(media) = consumer.stream() {
            stream = stream.with_media(&media);
        }
        self.resume_consumer(stream);
        true
    }

    /// Add a resumed remote stream and re-rank.
    pub fn resume_consumer(&mut self, stream: Stream) {
        let kind = stream.kind;
        debug!(target: "se.lifecycle", producer_id = %stream.producer_id, kind = kind.as_str(), "Consumer resumed");
        match kind {
            MediaKind::Audio => {
                self.state.apply_stream_added(stream);
                if self.state.identity().display_type != DisplayType::Video {
                    self.reorder_streams(true, false, &[]);
                }
            }
            MediaKind::Video => {
                self.state.apply_stream_added(stream);
                self.reorder_streams(true, false, &[]);
            }
            MediaKind::Screen => {
                self.state
                    .apply_share_started(&stream.producer_id, &stream.owner, false);
                self.state.apply_stream_added(stream);
                self.reorder_streams(false, true, &[]);
            }
        }
    }

    /// Handle a server producer-closed notification. Never fails.
    #[instrument(skip_all, name = "se.lifecycle.producer_closed", fields(producer_id = %producer_id))]
    pub fn producer_closed(&mut self, producer_id: &str) -> ProducerClosedOutcome {
        let is_screen = self.state.screen().producer_id.as_deref() == Some(producer_id);
        let outcome = match self.state.take_consumer_transport(producer_id) {
            Some(entry) => {
                entry.close();
                metrics::record_producer_closed("removed");
                let kind = if is_screen { MediaKind::Screen } else { entry.kind };
                info!(target: "se.lifecycle", kind = kind.as_str(), "Consumer closed");
                ProducerClosedOutcome::Removed(kind)
            }
            None => {
                let error = EngineError::Consistency(format!(
                    "no consumer entry for producer {producer_id}"
                ));
                warn!(target: "se.lifecycle", error = %error, "Producer closed for unknown consumer");
                metrics::record_producer_closed("unknown");
                let kind = if is_screen {
                    MediaKind::Screen
                } else {
                    self.state
                        .streams()
                        .iter()
                        .find(|s| s.producer_id == producer_id)
                        .map_or(MediaKind::Video, |s| s.kind)
                };
                ProducerClosedOutcome::Unknown(kind)
            }
        };
        metrics::set_consumer_transports_active(self.state.consumer_transports().len());

        let (ProducerClosedOutcome::Removed(kind) | ProducerClosedOutcome::Unknown(kind)) = outcome;
        self.close_and_resize(producer_id, kind);
        outcome
    }

    /// Recompute the layout as if `producer_id` vanished.
    pub fn close_and_resize(&mut self, producer_id: &str, kind: MediaKind) {
        let display_video = self.state.identity().display_type == DisplayType::Video;
        match kind {
            MediaKind::Audio => {
                self.state.apply_stream_removed(producer_id);
                if !display_video {
                    self.reorder_streams(true, false, &[]);
                }
            }
            MediaKind::Video => {
                let removed = self.state.apply_stream_removed(producer_id);
                let host_video = removed
                    .as_ref()
                    .is_some_and(|s| self.state.host_name() == Some(s.owner.as_str()));
                if host_video {
                    self.state.set_update_main_window(true);
                }
                self.refresh_visible_page();
                self.reorder_streams(display_video, false, &[]);
                self.state.set_update_main_window(false);
            }
            MediaKind::Screen => {
                self.state.apply_stream_removed(producer_id);
                self.state.apply_share_ended();
                self.state.set_update_main_window(true);
                if self.state.identity().event_type == EventType::Conference {
                    self.state.set_main_area_percent(0);
                }
                self.reorder_streams(false, true, &[]);
                self.state.set_update_main_window(false);
                if self.state.identity().event_type != EventType::Chat {
                    self.re_port(true);
                }
            }
        }
    }

    /// Pause consumers that left the visible set and resume those entering it.
    pub(crate) fn sync_consumer_visibility(&self) {
        let view = self.state.visible();
        let mut wanted: Vec<&str> = view.visible.iter().map(|s| s.producer_id.as_str()).collect();
        if let Some(main) = &view.main_screen {
            wanted.push(&main.producer_id);
        }
        if let Some(screen) = self.state.screen().producer_id.as_deref() {
            wanted.push(screen);
        }
        if let Some(host_video) = self.state.host().and_then(|h| h.video_id.as_deref()) {
            wanted.push(host_video);
        }

        for entry in self
            .state
            .consumer_transports()
            .iter()
            .filter(|entry| entry.kind.is_visual())
        {
            let show = wanted.contains(&entry.producer_id.as_str());
            let paused = entry.consumer.is_paused();
            if show && paused {
                entry.consumer.resume();
                self.outbox.emit(
                    events::CONSUMER_RESUME,
                    json!({ "serverConsumerId": entry.consumer.id() }),
                );
                debug!(target: "se.lifecycle", producer_id = %entry.producer_id, "Consumer entered view");
            } else if !show && !paused {
                entry.consumer.pause();
                debug!(target: "se.lifecycle", producer_id = %entry.producer_id, "Consumer left view");
            }
        }
    }

    /// Close every consumer entry, local producer and send transport.
    pub fn close_all(&mut self) {
        let entries = self.state.drain_consumer_transports();
        let consumers = entries.len();
        for entry in entries {
            entry.close();
        }
        for kind in [MediaKind::Audio, MediaKind::Video, MediaKind::Screen] {
            let Some(slot) = self.state.take_send_transport(kind) else {
                continue;
            };
            if let Some(producer) = slot.producer {
                producer.close();
            }
            if let Some(source) = slot.source {
                source.stop();
            }
            slot.transport.close();
        }
        metrics::set_consumer_transports_active(0);
        info!(target: "se.lifecycle", consumers, "Session media closed");
    }

    // ------------------------------------------------------------------
    // Send side
    // ------------------------------------------------------------------

    #[must_use]
    pub fn send_transport(&self, kind: MediaKind) -> Option<Arc<dyn Transport>> {
        self.state
            .send_slot(kind)
            .map(|slot| Arc::clone(&slot.transport))
    }

    /// Install a freshly created transport. If another caller won the race
    /// the newcomer is closed and the installed one returned.
    pub fn install_send_transport(
        &mut self,
        kind: MediaKind,
        transport: Arc<dyn Transport>,
    ) -> Arc<dyn Transport> {
        match self.state.install_send_transport(kind, Arc::clone(&transport)) {
            Some(existing) => {
                if existing.id() != transport.id() {
                    debug!(target: "se.lifecycle", kind = kind.as_str(), "Send transport already installed, closing duplicate");
                    transport.close();
                }
                existing
            }
            None => {
                info!(target: "se.lifecycle", kind = kind.as_str(), transport_id = %transport.id(), "Send transport installed");
                transport
            }
        }
    }

    /// Store a new producer. A previous producer of the same kind is closed.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the transport went away while producing; the
    /// producer is closed.
    pub fn attach_producer(
        &mut self,
        kind: MediaKind,
        producer: Arc<dyn Producer>,
        source: Arc<dyn MediaStream>,
    ) -> Result<(), EngineError> {
        if self.state.send_slot(kind).is_none() {
            producer.close();
            return Err(EngineError::InvalidState(format!(
                "{} transport closed before the producer attached",
                kind.as_str()
            )));
        }

        let producer_id = producer.id().to_string();
        if let Some(previous) = self
            .state
            .set_producer(kind, producer, Arc::clone(&source))
        {
            debug!(target: "se.lifecycle", kind = kind.as_str(), "Replacing existing producer");
            previous.close();
            if kind == MediaKind::Video {
                self.state.apply_stream_removed(previous.id());
            }
        }
        info!(target: "se.lifecycle", kind = kind.as_str(), producer_id = %producer_id, "Producer attached");

        if kind == MediaKind::Video {
            let member = self.state.identity().member.clone();
            self.state
                .apply_stream_added(Stream::local(producer_id, member, MediaKind::Video).with_media(&source));
            self.reorder_streams(true, false, &[]);
        }
        Ok(())
    }

    /// Pause (audio) or close (video, screen) the local producer.
    ///
    /// Returns whether there was a producer to act on.
    pub fn detach_producer(&mut self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => {
                let Some(producer) = self
                    .state
                    .send_slot(kind)
                    .and_then(|slot| slot.producer.clone())
                else {
                    return false;
                };
                producer.pause();
                true
            }
            MediaKind::Video | MediaKind::Screen => {
                let Some((producer, _source)) = self.state.take_producer(kind) else {
                    return false;
                };
                producer.close();
                if kind == MediaKind::Video {
                    self.state.apply_stream_removed(producer.id());
                    self.refresh_visible_page();
                }
                true
            }
        }
    }

    /// Resume a paused local producer. Returns whether it was resumed.
    pub fn resume_producer(&mut self, kind: MediaKind) -> bool {
        match self.state.send_slot(kind).and_then(|slot| slot.producer.clone()) {
            Some(producer) if producer.is_paused() => {
                producer.resume();
                true
            }
            _ => false,
        }
    }
}
