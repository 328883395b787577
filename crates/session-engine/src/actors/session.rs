//! `SessionActor` - single writer of one conference session.
//!
//! The actor owns the [`Orchestrator`] and applies [`SessionCommand`]s one at
//! a time. [`SessionHandle`] is the public surface: operations that need the
//! network (transport creation, produce, consumer resume, screen capture)
//! run their I/O in the caller's task under a deadline and send the result
//! to the actor to be committed.
//!
//! # Lifecycle
//!
//! 1. [`SessionActor::spawn`] starts the actor and the outbound dispatcher
//! 2. Runs until cancelled or every handle is dropped
//! 3. On exit all consumers, producers and send transports are closed

use super::messages::{SessionCommand, SessionSnapshot};
use super::metrics::MailboxMonitor;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::layout::PaginationDirection;
use crate::lifecycle::{Lifecycle, ProducerClosedOutcome};
use crate::model::{
    ComponentSizes, ConsumerTransportInfo, EventType, MediaKind, MediaUpdate, Participant,
    RoomSettings, SessionIdentity, Stream, TransportKind,
};
use crate::orchestrator::{Orchestrator, Sinks};
use crate::platform::{Consumer, Device, MediaStream, ProduceOptions, ScreenResolution, Transport};
use crate::render::{AlertSink, CardStrategy, RenderSink};
use crate::reorder::ReorderOutcome;
use crate::screenshare::{ScreenShareOutcome, ScreenSharePlan, SERVER_DENIED_MESSAGE};
use crate::signaling::{spawn_dispatcher, Signaling};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Boundaries supplied by the host application.
#[derive(Clone)]
pub struct SessionDeps {
    pub signaling: Arc<dyn Signaling>,
    pub device: Arc<dyn Device>,
    pub render: Arc<dyn RenderSink>,
    pub alerts: Arc<dyn AlertSink>,
    pub cards: CardStrategy,
}

/// Handle to a `SessionActor`.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    cancel_token: CancellationToken,
    session_id: String,
    mailbox: Arc<MailboxMonitor>,
    lifecycle: Lifecycle,
    signaling: Arc<dyn Signaling>,
    member: String,
    transport_timeout: Duration,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("member", &self.member)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn send(&self, command: SessionCommand) -> Result<(), EngineError> {
        self.mailbox.record_enqueue();
        self.sender.send(command).await.map_err(|e| {
            self.mailbox.record_dequeue();
            EngineError::Internal(format!("channel send failed: {e}"))
        })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await
            .map_err(|e| EngineError::Internal(format!("response receive failed: {e}")))
    }

    /// Log `error` and show it through the alert sink.
    async fn surface(&self, operation: &'static str, error: &EngineError) {
        warn!(target: "se.actor.session", operation, error = %error, "Session operation failed");
        if let Err(e) = self
            .send(SessionCommand::SurfaceError {
                error: error.clone(),
            })
            .await
        {
            debug!(target: "se.actor.session", error = %e, "Session gone, alert dropped");
        }
    }

    // ------------------------------------------------------------------
    // Send transports
    // ------------------------------------------------------------------

    /// Create (or reuse) the outbound transport(s) for `kind`.
    ///
    /// # Errors
    ///
    /// - `Signaling` when the socket is disconnected
    /// - `Timeout` when the server does not answer within `timeout`
    /// - `Transport` when the server or device rejects the transport
    #[instrument(skip_all, name = "se.session.create_send_transport", fields(session_id = %self.session_id))]
    pub async fn create_send_transport(
        &self,
        kind: TransportKind,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        for &media in kind.media_kinds() {
            self.ensure_send_transport(media, timeout).await?;
        }
        Ok(())
    }

    async fn ensure_send_transport(
        &self,
        kind: MediaKind,
        timeout: Duration,
    ) -> Result<Arc<dyn Transport>, EngineError> {
        if let Some(existing) = self
            .request(|respond_to| SessionCommand::SendTransport { kind, respond_to })
            .await?
        {
            debug!(target: "se.actor.session", kind = kind.as_str(), "Reusing send transport");
            return Ok(existing);
        }

        let transport = match self.lifecycle.create_transport(kind, timeout).await {
            Ok(transport) => transport,
            Err(e) => {
                self.surface("create_send_transport", &e).await;
                return Err(e);
            }
        };
        self.request(|respond_to| SessionCommand::InstallSendTransport {
            kind,
            transport,
            respond_to,
        })
        .await
    }

    async fn connect(
        &self,
        kind: MediaKind,
        source: Arc<dyn MediaStream>,
        options: ProduceOptions,
    ) -> Result<(), EngineError> {
        let transport = self
            .request(|respond_to| SessionCommand::SendTransport { kind, respond_to })
            .await?
            .ok_or_else(|| {
                EngineError::InvalidState(format!("{} transport has not been created", kind.as_str()))
            })?;

        let producer = match self
            .lifecycle
            .produce(&transport, Arc::clone(&source), options, self.transport_timeout)
            .await
        {
            Ok(producer) => producer,
            Err(e) => {
                self.surface("connect_send_transport", &e).await;
                return Err(e);
            }
        };

        self.request(|respond_to| SessionCommand::AttachProducer {
            kind,
            producer,
            source,
            respond_to,
        })
        .await?
    }

    /// Produce the local microphone.
    ///
    /// # Errors
    ///
    /// `InvalidState` without an audio transport, `Timeout` or `Transport`.
    pub async fn connect_audio_transport(&self, stream: Arc<dyn MediaStream>) -> Result<(), EngineError> {
        self.connect(MediaKind::Audio, stream, ProduceOptions::audio()).await
    }

    /// Produce the local camera with simulcast layers.
    ///
    /// # Errors
    ///
    /// `InvalidState` without a video transport, `Timeout` or `Transport`.
    pub async fn connect_video_transport(&self, stream: Arc<dyn MediaStream>) -> Result<(), EngineError> {
        self.connect(MediaKind::Video, stream, ProduceOptions::video()).await
    }

    /// Produce an already captured display stream.
    ///
    /// # Errors
    ///
    /// `InvalidState` without a screen transport, `Timeout` or `Transport`.
    pub async fn connect_screen_transport(&self, stream: Arc<dyn MediaStream>) -> Result<(), EngineError> {
        self.connect(MediaKind::Screen, stream, ProduceOptions::screen()).await
    }

    /// Pause (audio) or close (video, screen) the local producer and tell the
    /// server. Returns whether there was a producer.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Signaling` when the announcement fails.
    pub async fn disconnect_send_transport(&self, kind: MediaKind) -> Result<bool, EngineError> {
        if kind == MediaKind::Screen {
            return self.stop_screen_share().await;
        }
        let detached = self
            .request(|respond_to| SessionCommand::DetachProducer { kind, respond_to })
            .await?;
        if detached {
            self.lifecycle.announce_pause(kind).await?;
        }
        Ok(detached)
    }

    /// Resume a paused local producer. Returns whether it was resumed.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Signaling` when the audio announcement fails.
    pub async fn resume_send_transport(&self, kind: MediaKind) -> Result<bool, EngineError> {
        let resumed = self
            .request(|respond_to| SessionCommand::ResumeProducer { kind, respond_to })
            .await?;
        if resumed && kind == MediaKind::Audio {
            self.lifecycle.announce_audio_resume().await?;
        }
        Ok(resumed)
    }

    // ------------------------------------------------------------------
    // Receive side
    // ------------------------------------------------------------------

    /// Register a consumer and ask the server to start forwarding.
    ///
    /// Returns `false` when the producer closed while the request was in
    /// flight.
    ///
    /// # Errors
    ///
    /// `Timeout` or `Signaling` from `consumer-resume`. The entry stays
    /// registered and is cleaned up by `producer_closed`.
    #[instrument(skip_all, name = "se.session.connect_receive_transport", fields(producer_id = %remote_producer_id))]
    pub async fn connect_receive_transport(
        &self,
        consumer: Arc<dyn Consumer>,
        transport: Arc<dyn Transport>,
        remote_producer_id: &str,
        server_consumer_transport_id: &str,
    ) -> Result<bool, EngineError> {
        let info = ConsumerTransportInfo {
            kind: consumer.kind(),
            consumer: Arc::clone(&consumer),
            transport,
            producer_id: remote_producer_id.to_string(),
            server_consumer_transport_id: server_consumer_transport_id.to_string(),
        };
        self.request(|respond_to| SessionCommand::RegisterConsumer { info, respond_to })
            .await?;

        if let Err(e) = self.lifecycle.request_consumer_resume(&consumer).await {
            self.surface("consumer_resume", &e).await;
            return Err(e);
        }

        let producer_id = remote_producer_id.to_string();
        self.request(|respond_to| SessionCommand::ConsumerResumed {
            producer_id,
            respond_to,
        })
        .await
    }

    /// Add a resumed remote stream and re-rank.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn resume_consumer(&self, stream: Stream) -> Result<(), EngineError> {
        self.request(|respond_to| SessionCommand::ResumeConsumer { stream, respond_to })
            .await
    }

    /// Server notification that a remote producer closed.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn producer_closed(&self, remote_producer_id: &str) -> Result<ProducerClosedOutcome, EngineError> {
        let producer_id = remote_producer_id.to_string();
        self.request(|respond_to| SessionCommand::ProducerClosed {
            producer_id,
            respond_to,
        })
        .await
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn reorder_streams(
        &self,
        add: bool,
        screen_changed: bool,
        streams: Vec<Stream>,
    ) -> Result<ReorderOutcome, EngineError> {
        self.request(|respond_to| SessionCommand::Reorder {
            add,
            screen_changed,
            streams,
            respond_to,
        })
        .await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn on_screen_changes(&self, changed: bool) -> Result<ReorderOutcome, EngineError> {
        self.request(|respond_to| SessionCommand::OnScreenChanges { changed, respond_to })
            .await
    }

    /// Navigate to `page`.
    ///
    /// # Errors
    ///
    /// `AccessDenied` for another breakout room, `InvalidRequest` for an
    /// unknown page.
    pub async fn generate_page_content(&self, page: usize) -> Result<(), EngineError> {
        self.request(|respond_to| SessionCommand::GeneratePageContent { page, respond_to })
            .await?
    }

    /// Re-run both comparators and re-broadcast the screen-client state.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn re_port(&self, restart: bool) -> Result<bool, EngineError> {
        self.request(|respond_to| SessionCommand::RePort { restart, respond_to })
            .await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn update_component_sizes(&self, sizes: ComponentSizes) -> Result<(), EngineError> {
        self.send(SessionCommand::SetComponentSizes { sizes }).await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn set_wide_screen(&self, wide: bool) -> Result<(), EngineError> {
        self.send(SessionCommand::SetWideScreen { wide }).await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn set_pagination_bar(
        &self,
        direction: PaginationDirection,
        extent: f64,
    ) -> Result<(), EngineError> {
        self.send(SessionCommand::SetPaginationBar { direction, extent })
            .await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn set_event_type(&self, event_type: EventType) -> Result<(), EngineError> {
        self.send(SessionCommand::SetEventType { event_type }).await
    }

    // ------------------------------------------------------------------
    // Roster and room
    // ------------------------------------------------------------------

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn participant_joined(&self, participant: Participant) -> Result<(), EngineError> {
        self.send(SessionCommand::ParticipantJoined { participant })
            .await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn participant_left(&self, name: impl Into<String>) -> Result<(), EngineError> {
        self.send(SessionCommand::ParticipantLeft { name: name.into() })
            .await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn participant_media_changed(
        &self,
        name: impl Into<String>,
        update: MediaUpdate,
    ) -> Result<(), EngineError> {
        self.send(SessionCommand::ParticipantMedia {
            name: name.into(),
            update,
        })
        .await
    }

    /// Record a loudness sample.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn update_participant_audio_decibels(
        &self,
        name: impl Into<String>,
        average_loudness: f64,
    ) -> Result<(), EngineError> {
        self.send(SessionCommand::AudioDecibels {
            name: name.into(),
            average_loudness,
        })
        .await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn update_room_settings(&self, settings: RoomSettings) -> Result<(), EngineError> {
        self.send(SessionCommand::SetRoomSettings { settings }).await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn set_whiteboard_active(&self, active: bool) -> Result<(), EngineError> {
        self.send(SessionCommand::SetWhiteboard { active }).await
    }

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn update_breakout(
        &self,
        rooms: Vec<Vec<String>>,
        started: bool,
        ended: bool,
    ) -> Result<(), EngineError> {
        self.send(SessionCommand::UpdateBreakout {
            rooms,
            started,
            ended,
        })
        .await
    }

    // ------------------------------------------------------------------
    // Screen share
    // ------------------------------------------------------------------

    /// Start sharing the local display.
    ///
    /// # Errors
    ///
    /// - `Conflict` or `AccessDenied` when a precondition fails
    /// - `AccessDenied` when the server refuses
    /// - `Timeout` or `Transport` from capture, transport creation or produce
    ///
    /// Every failure after the precondition checks returns the share to idle.
    #[instrument(skip_all, name = "se.session.start_screen_share", fields(session_id = %self.session_id))]
    pub async fn start_screen_share(
        &self,
        resolution: ScreenResolution,
    ) -> Result<ScreenShareOutcome, EngineError> {
        let requester_id = self
            .signaling
            .socket_id()
            .unwrap_or_else(|| self.member.clone());
        let plan = self
            .request(|respond_to| SessionCommand::BeginScreenShare {
                requester_id,
                respond_to,
            })
            .await??;
        let installed = match plan {
            ScreenSharePlan::AwaitingApproval => return Ok(ScreenShareOutcome::ApprovalRequested),
            ScreenSharePlan::Proceed { transport } => transport,
        };

        match self.lifecycle.request_screen_share().await {
            Ok(true) => {}
            Ok(false) => {
                return Err(self
                    .abort_share(EngineError::AccessDenied(SERVER_DENIED_MESSAGE.to_string()), None)
                    .await);
            }
            Err(e) => return Err(self.abort_share(e, None).await),
        }

        let capture = match self
            .lifecycle
            .capture_display(resolution.into(), self.transport_timeout)
            .await
        {
            Ok(capture) => capture,
            Err(e) => return Err(self.abort_share(e, None).await),
        };

        let transport = match installed {
            Some(transport) => transport,
            None => match self
                .ensure_send_transport(MediaKind::Screen, self.transport_timeout)
                .await
            {
                Ok(transport) => transport,
                Err(e) => return Err(self.abort_share(e, Some(capture)).await),
            },
        };

        let producer = match self
            .lifecycle
            .produce(
                &transport,
                Arc::clone(&capture),
                ProduceOptions::screen(),
                self.transport_timeout,
            )
            .await
        {
            Ok(producer) => producer,
            Err(e) => return Err(self.abort_share(e, Some(capture)).await),
        };

        self.request(|respond_to| SessionCommand::CompleteScreenShare {
            producer,
            capture,
            respond_to,
        })
        .await??;
        Ok(ScreenShareOutcome::Started)
    }

    async fn abort_share(&self, error: EngineError, capture: Option<Arc<dyn MediaStream>>) -> EngineError {
        let result = self
            .request(|respond_to| SessionCommand::AbortScreenShare {
                error: error.clone(),
                capture,
                respond_to,
            })
            .await;
        if let Err(e) = result {
            warn!(target: "se.actor.session", error = %e, "Could not revert screen share");
        }
        error
    }

    /// Stop the local share. Returns `false` when nothing was being shared.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has stopped. Announcement failures are
    /// surfaced as alerts; the local share is released regardless.
    #[instrument(skip_all, name = "se.session.stop_screen_share", fields(session_id = %self.session_id))]
    pub async fn stop_screen_share(&self) -> Result<bool, EngineError> {
        let stopping = self
            .request(|respond_to| SessionCommand::BeginStopScreenShare { respond_to })
            .await?;
        if !stopping {
            return Ok(false);
        }

        let announced = match self.lifecycle.announce_screen_closed().await {
            Ok(()) => self.lifecycle.announce_pause(MediaKind::Screen).await,
            Err(e) => Err(e),
        };
        self.request(|respond_to| SessionCommand::FinishStopScreenShare { respond_to })
            .await?;
        if let Err(e) = announced {
            self.surface("stop_screen_share", &e).await;
        }
        Ok(true)
    }

    /// The host answered this member's share request.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn on_share_request_response(&self, approved: bool) -> Result<(), EngineError> {
        self.send(SessionCommand::ShareRequestResponse { approved })
            .await
    }

    // ------------------------------------------------------------------
    // Diagnostics and shutdown
    // ------------------------------------------------------------------

    /// # Errors
    ///
    /// `Internal` if the session has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, EngineError> {
        self.request(|respond_to| SessionCommand::Snapshot { respond_to })
            .await
    }

    /// Stop the session actor and the outbound dispatcher.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The session actor.
pub struct SessionActor {
    session_id: String,
    core: Orchestrator,
    receiver: mpsc::Receiver<SessionCommand>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    dispatcher: JoinHandle<()>,
}

impl SessionActor {
    /// Spawn a session actor and its outbound dispatcher.
    ///
    /// Returns a handle and the actor's join handle.
    pub fn spawn(
        identity: SessionIdentity,
        config: EngineConfig,
        deps: SessionDeps,
        cancel_token: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let session_id = Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::channel(config.mailbox_capacity.max(1));
        let mailbox = Arc::new(MailboxMonitor::new(&session_id));

        let (outbox, dispatcher) = spawn_dispatcher(
            Arc::clone(&deps.signaling),
            Arc::clone(&deps.alerts),
            config.signaling_timeout,
            cancel_token.child_token(),
        );
        let lifecycle = Lifecycle::new(
            Arc::clone(&deps.signaling),
            deps.device,
            &identity,
            config.signaling_timeout,
        );
        let member = identity.member.clone();
        let transport_timeout = config.transport_timeout;

        let core = Orchestrator::new(
            identity,
            config,
            Sinks {
                render: deps.render,
                alerts: deps.alerts,
            },
            deps.cards,
            outbox,
        );

        let actor = Self {
            session_id: session_id.clone(),
            core,
            receiver,
            cancel_token: cancel_token.clone(),
            mailbox: Arc::clone(&mailbox),
            dispatcher,
        };
        let task_handle = tokio::spawn(actor.run());

        let handle = SessionHandle {
            sender,
            cancel_token,
            session_id,
            mailbox,
            lifecycle,
            signaling: deps.signaling,
            member,
            transport_timeout,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "se.actor.session", fields(session_id = %self.session_id))]
    async fn run(mut self) {
        info!(target: "se.actor.session", session_id = %self.session_id, "SessionActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "se.actor.session",
                        session_id = %self.session_id,
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                command = self.receiver.recv() => {
                    match command {
                        Some(command) => {
                            self.handle_message(command);
                            self.mailbox.record_processed();
                        }
                        None => {
                            info!(
                                target: "se.actor.session",
                                session_id = %self.session_id,
                                "SessionActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.core.close_all();
        info!(
            target: "se.actor.session",
            session_id = %self.session_id,
            messages_processed = self.mailbox.messages_processed(),
            "SessionActor stopped"
        );

        // Dropping the core closes the outbox so the dispatcher drains and exits.
        let Self { core, dispatcher, .. } = self;
        drop(core);
        if let Err(e) = dispatcher.await {
            warn!(target: "se.actor.session", error = %e, "Outbound dispatcher task failed");
        }
    }

    fn handle_message(&mut self, command: SessionCommand) {
        let core = &mut self.core;
        match command {
            SessionCommand::SendTransport { kind, respond_to } => {
                let _ = respond_to.send(core.send_transport(kind));
            }
            SessionCommand::InstallSendTransport {
                kind,
                transport,
                respond_to,
            } => {
                let _ = respond_to.send(core.install_send_transport(kind, transport));
            }
            SessionCommand::AttachProducer {
                kind,
                producer,
                source,
                respond_to,
            } => {
                let _ = respond_to.send(core.attach_producer(kind, producer, source));
            }
            SessionCommand::DetachProducer { kind, respond_to } => {
                let _ = respond_to.send(core.detach_producer(kind));
            }
            SessionCommand::ResumeProducer { kind, respond_to } => {
                let _ = respond_to.send(core.resume_producer(kind));
            }
            SessionCommand::RegisterConsumer { info, respond_to } => {
                core.register_consumer_transport(info);
                let _ = respond_to.send(());
            }
            SessionCommand::ConsumerResumed {
                producer_id,
                respond_to,
            } => {
                let _ = respond_to.send(core.consumer_resumed(&producer_id));
            }
            SessionCommand::ResumeConsumer { stream, respond_to } => {
                core.resume_consumer(stream);
                let _ = respond_to.send(());
            }
            SessionCommand::ProducerClosed {
                producer_id,
                respond_to,
            } => {
                let _ = respond_to.send(core.producer_closed(&producer_id));
            }
            SessionCommand::Reorder {
                add,
                screen_changed,
                streams,
                respond_to,
            } => {
                let _ = respond_to.send(core.reorder_streams(add, screen_changed, &streams));
            }
            SessionCommand::OnScreenChanges {
                changed,
                respond_to,
            } => {
                let _ = respond_to.send(core.on_screen_changes(changed));
            }
            SessionCommand::GeneratePageContent { page, respond_to } => {
                let _ = respond_to.send(core.generate_page_content(page));
            }
            SessionCommand::RePort {
                restart,
                respond_to,
            } => {
                let _ = respond_to.send(core.re_port(restart));
            }
            SessionCommand::SetComponentSizes { sizes } => core.update_component_sizes(sizes),
            SessionCommand::SetWideScreen { wide } => core.set_wide_screen(wide),
            SessionCommand::SetPaginationBar { direction, extent } => {
                core.set_pagination_bar(direction, extent);
            }
            SessionCommand::SetEventType { event_type } => core.set_event_type(event_type),
            SessionCommand::ParticipantJoined { participant } => core.participant_joined(participant),
            SessionCommand::ParticipantLeft { name } => core.participant_left(&name),
            SessionCommand::ParticipantMedia { name, update } => {
                core.participant_media_changed(&name, update);
            }
            SessionCommand::AudioDecibels {
                name,
                average_loudness,
            } => core.update_participant_audio_decibels(&name, average_loudness),
            SessionCommand::SetRoomSettings { settings } => core.update_room_settings(settings),
            SessionCommand::SetWhiteboard { active } => core.set_whiteboard_active(active),
            SessionCommand::UpdateBreakout {
                rooms,
                started,
                ended,
            } => core.update_breakout(rooms, started, ended),
            SessionCommand::BeginScreenShare {
                requester_id,
                respond_to,
            } => {
                let _ = respond_to.send(core.begin_screen_share(&requester_id));
            }
            SessionCommand::CompleteScreenShare {
                producer,
                capture,
                respond_to,
            } => {
                let _ = respond_to.send(core.complete_screen_share(producer, capture));
            }
            SessionCommand::AbortScreenShare {
                error,
                capture,
                respond_to,
            } => {
                core.abort_screen_share(&error, capture);
                let _ = respond_to.send(());
            }
            SessionCommand::BeginStopScreenShare { respond_to } => {
                let _ = respond_to.send(core.begin_stop_screen_share());
            }
            SessionCommand::FinishStopScreenShare { respond_to } => {
                core.finish_stop_screen_share();
                let _ = respond_to.send(());
            }
            SessionCommand::ShareRequestResponse { approved } => {
                core.on_share_request_response(approved);
            }
            SessionCommand::SurfaceError { error } => core.alert_error(&error),
            SessionCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let state = self.core.state();
        fn ids(streams: &[Stream]) -> Vec<String> {
            streams.iter().map(|s| s.producer_id.clone()).collect()
        }
        SessionSnapshot {
            session_id: self.session_id.clone(),
            participants: state.participants().len(),
            ordered: ids(state.ordered()),
            visible: ids(state.visible().visible.as_slice()),
            current_page: state.current_page(),
            total_pages: state.pages().len(),
            active_names: state.active_names().to_vec(),
            screen: state.screen_states().current.clone(),
            share_state: state.screen().state,
            share_active: state.screen().share_active,
            main_area_percent: state.layout().main_area_percent,
            consumer_transports: state.consumer_transports().len(),
            send_transports: [MediaKind::Audio, MediaKind::Video, MediaKind::Screen]
                .into_iter()
                .filter(|kind| state.send_slot(*kind).is_some())
                .collect(),
        }
    }
}
