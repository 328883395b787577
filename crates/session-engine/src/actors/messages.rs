//! Commands accepted by the session actor.
//!
//! Every command is applied to the session core synchronously. Commands that
//! return something carry a `oneshot` reply channel.

use crate::errors::EngineError;
use crate::layout::PaginationDirection;
use crate::lifecycle::ProducerClosedOutcome;
use crate::model::{
    ComponentSizes, ConsumerTransportInfo, EventType, MediaKind, MediaUpdate, Participant,
    RoomSettings, ScreenState, Stream,
};
use crate::platform::{MediaStream, Producer, Transport};
use crate::reorder::ReorderOutcome;
use crate::screenshare::{ScreenSharePlan, ScreenShareState};
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum SessionCommand {
    // Send side
    SendTransport {
        kind: MediaKind,
        respond_to: oneshot::Sender<Option<Arc<dyn Transport>>>,
    },
    InstallSendTransport {
        kind: MediaKind,
        transport: Arc<dyn Transport>,
        respond_to: oneshot::Sender<Arc<dyn Transport>>,
    },
    AttachProducer {
        kind: MediaKind,
        producer: Arc<dyn Producer>,
        source: Arc<dyn MediaStream>,
        respond_to: oneshot::Sender<Result<(), EngineError>>,
    },
    DetachProducer {
        kind: MediaKind,
        respond_to: oneshot::Sender<bool>,
    },
    ResumeProducer {
        kind: MediaKind,
        respond_to: oneshot::Sender<bool>,
    },

    // Receive side
    RegisterConsumer {
        info: ConsumerTransportInfo,
        respond_to: oneshot::Sender<()>,
    },
    ConsumerResumed {
        producer_id: String,
        respond_to: oneshot::Sender<bool>,
    },
    ResumeConsumer {
        stream: Stream,
        respond_to: oneshot::Sender<()>,
    },
    ProducerClosed {
        producer_id: String,
        respond_to: oneshot::Sender<ProducerClosedOutcome>,
    },

    // Layout
    Reorder {
        add: bool,
        screen_changed: bool,
        streams: Vec<Stream>,
        respond_to: oneshot::Sender<ReorderOutcome>,
    },
    OnScreenChanges {
        changed: bool,
        respond_to: oneshot::Sender<ReorderOutcome>,
    },
    GeneratePageContent {
        page: usize,
        respond_to: oneshot::Sender<Result<(), EngineError>>,
    },
    RePort {
        restart: bool,
        respond_to: oneshot::Sender<bool>,
    },
    SetComponentSizes {
        sizes: ComponentSizes,
    },
    SetWideScreen {
        wide: bool,
    },
    SetPaginationBar {
        direction: PaginationDirection,
        extent: f64,
    },
    SetEventType {
        event_type: EventType,
    },

    // Roster and room
    ParticipantJoined {
        participant: Participant,
    },
    ParticipantLeft {
        name: String,
    },
    ParticipantMedia {
        name: String,
        update: MediaUpdate,
    },
    AudioDecibels {
        name: String,
        average_loudness: f64,
    },
    SetRoomSettings {
        settings: RoomSettings,
    },
    SetWhiteboard {
        active: bool,
    },
    UpdateBreakout {
        rooms: Vec<Vec<String>>,
        started: bool,
        ended: bool,
    },

    // Screen share
    BeginScreenShare {
        requester_id: String,
        respond_to: oneshot::Sender<Result<ScreenSharePlan, EngineError>>,
    },
    CompleteScreenShare {
        producer: Arc<dyn Producer>,
        capture: Arc<dyn MediaStream>,
        respond_to: oneshot::Sender<Result<(), EngineError>>,
    },
    AbortScreenShare {
        error: EngineError,
        capture: Option<Arc<dyn MediaStream>>,
        respond_to: oneshot::Sender<()>,
    },
    BeginStopScreenShare {
        respond_to: oneshot::Sender<bool>,
    },
    FinishStopScreenShare {
        respond_to: oneshot::Sender<()>,
    },
    ShareRequestResponse {
        approved: bool,
    },

    /// Show a failure from the caller's task through the alert sink.
    SurfaceError {
        error: EngineError,
    },
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

/// Point-in-time view of the session, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub participants: usize,
    /// Producer ids in ranked order.
    pub ordered: Vec<String>,
    /// Producer ids on the current page.
    pub visible: Vec<String>,
    pub current_page: usize,
    pub total_pages: usize,
    pub active_names: Vec<String>,
    pub screen: ScreenState,
    pub share_state: ScreenShareState,
    pub share_active: bool,
    pub main_area_percent: u8,
    pub consumer_transports: usize,
    /// Kinds with an installed send transport.
    pub send_transports: Vec<MediaKind>,
}
