//! Session state store.
//!
//! One [`SessionState`] per session, owned by the session actor. Every
//! mutation goes through a named update method; readers get borrowed views.
//! The store also implements the narrow capability traits the layout,
//! ranking and pagination code read through.

use crate::config::EngineConfig;
use crate::layout::{LayoutParams, PaginationDirection};
use crate::model::{
    AudioDecibels, BreakoutState, ComponentSizes, ConsumerTransportInfo, DisplayType, EventType,
    GridSizes, MediaKind, MediaUpdate, PaginatedStreams, Participant, RoomSettings, ScreenState,
    SessionIdentity, Stream,
};
use crate::pagination::BreakoutView;
use crate::platform::{MediaStream, Producer, Transport};
use crate::reorder::RankingSource;
use crate::screenshare::ScreenShareState;
use std::sync::Arc;

/// Page size limits in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub item: usize,
    pub screen: usize,
    pub fixed: usize,
    pub strip: usize,
}

impl PageLimits {
    fn from_config(config: &EngineConfig) -> Self {
        Self {
            item: config.item_page_limit,
            screen: config.screen_page_limit,
            fixed: config.fixed_page_limit,
            strip: config.strip_layout_limit,
        }
    }
}

/// Screen-share flags, local and remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenShareFlags {
    /// Local share state machine.
    pub state: ScreenShareState,
    /// Someone (local or remote) is sharing.
    pub share_active: bool,
    /// The local member is the one sharing.
    pub local_share: bool,
    pub producer_id: Option<String>,
    pub owner: Option<String>,
    pub share_ended: bool,
    pub annotate: bool,
    pub force_full_display: bool,
    /// `force_full_display` before the local share started.
    pub prev_force_full_display: bool,
    /// A host-approval request is outstanding.
    pub request_pending: bool,
    /// The host approved this member's share request.
    pub approved: bool,
}

/// One outbound transport and its producer.
#[derive(Debug, Clone)]
pub struct SendSlot {
    pub transport: Arc<dyn Transport>,
    pub producer: Option<Arc<dyn Producer>>,
    /// Local capture feeding the producer. Strong reference.
    pub source: Option<Arc<dyn MediaStream>>,
}

/// Outbound transports by media kind.
#[derive(Debug, Clone, Default)]
pub struct SendTransports {
    audio: Option<SendSlot>,
    video: Option<SendSlot>,
    screen: Option<SendSlot>,
}

impl SendTransports {
    #[must_use]
    pub fn get(&self, kind: MediaKind) -> Option<&SendSlot> {
        match kind {
            MediaKind::Audio => self.audio.as_ref(),
            MediaKind::Video => self.video.as_ref(),
            MediaKind::Screen => self.screen.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: MediaKind) -> &mut Option<SendSlot> {
        match kind {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
            MediaKind::Screen => &mut self.screen,
        }
    }
}

/// Layout results and inputs that persist between passes.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutState {
    pub component_sizes: ComponentSizes,
    pub grid_sizes: GridSizes,
    pub main_area_percent: u8,
    pub wide_screen: bool,
    pub pagination_direction: PaginationDirection,
    pub pagination_extent: f64,
    pub main_grid_rows: usize,
    pub main_grid_cols: usize,
    pub alt_grid_rows: usize,
    pub alt_grid_cols: usize,
    pub remove_alt_grid: bool,
}

impl Default for LayoutState {
    fn default() -> Self {
        Self {
            component_sizes: ComponentSizes::default(),
            grid_sizes: GridSizes::default(),
            main_area_percent: 0,
            wide_screen: true,
            pagination_direction: PaginationDirection::Horizontal,
            pagination_extent: 40.0,
            main_grid_rows: 0,
            main_grid_cols: 0,
            alt_grid_rows: 0,
            alt_grid_cols: 0,
            remove_alt_grid: true,
        }
    }
}

/// Output of one layout pass over the visible page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleLayout {
    pub visible: Vec<Stream>,
    pub main_screen: Option<Stream>,
    pub main_grid: Vec<Stream>,
    pub alt_grid: Vec<Stream>,
    /// Owners of the visible streams, in display order, deduplicated.
    pub active_names: Vec<String>,
}

/// Previous and current main-screen snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenHistory {
    pub previous: ScreenState,
    pub current: ScreenState,
}

/// Authoritative per-session state.
#[derive(Debug)]
pub struct SessionState {
    identity: SessionIdentity,
    limits: PageLimits,
    sort_audio_loudness: bool,
    loudness_threshold: f64,
    participants: Vec<Participant>,
    streams: Vec<Stream>,
    ordered: Vec<Stream>,
    pages: PaginatedStreams,
    current_page: usize,
    layout_view: VisibleLayout,
    prev_active_names: Vec<String>,
    audio_levels: Vec<AudioDecibels>,
    consumer_transports: Vec<ConsumerTransportInfo>,
    send: SendTransports,
    screen: ScreenShareFlags,
    room: RoomSettings,
    breakout: BreakoutState,
    layout: LayoutState,
    screen_states: ScreenHistory,
    update_main_window: bool,
}

impl SessionState {
    #[must_use]
    pub fn new(identity: SessionIdentity, config: &EngineConfig) -> Self {
        Self {
            identity,
            limits: PageLimits::from_config(config),
            sort_audio_loudness: config.sort_audio_loudness,
            loudness_threshold: config.loudness_threshold,
            participants: Vec::new(),
            streams: Vec::new(),
            ordered: Vec::new(),
            pages: PaginatedStreams::default(),
            current_page: 0,
            layout_view: VisibleLayout::default(),
            prev_active_names: Vec::new(),
            audio_levels: Vec::new(),
            consumer_transports: Vec::new(),
            send: SendTransports::default(),
            screen: ScreenShareFlags::default(),
            room: RoomSettings::default(),
            breakout: BreakoutState::default(),
            layout: LayoutState::default(),
            screen_states: ScreenHistory::default(),
            update_main_window: false,
        }
    }

    // ------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------

    #[must_use]
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    #[must_use]
    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn host(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_host())
    }

    /// Name of the host, falling back to the local member when they host.
    #[must_use]
    pub fn host_name(&self) -> Option<&str> {
        self.host().map(|p| p.name.as_str()).or_else(|| {
            self.identity
                .is_host()
                .then_some(self.identity.member.as_str())
        })
    }

    /// Owner of a remote producer, by the ids participants advertise.
    #[must_use]
    pub fn owner_of(&self, producer_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.owns_producer(producer_id))
            .map(|p| p.name.as_str())
    }

    #[must_use]
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    #[must_use]
    pub fn ordered(&self) -> &[Stream] {
        &self.ordered
    }

    #[must_use]
    pub fn pages(&self) -> &PaginatedStreams {
        &self.pages
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn visible(&self) -> &VisibleLayout {
        &self.layout_view
    }

    #[must_use]
    pub fn active_names(&self) -> &[String] {
        &self.layout_view.active_names
    }

    #[must_use]
    pub fn prev_active_names(&self) -> &[String] {
        &self.prev_active_names
    }

    #[must_use]
    pub fn loudness(&self, name: &str) -> Option<f64> {
        self.audio_levels
            .iter()
            .find(|level| level.name == name)
            .map(|level| level.average_loudness)
    }

    #[must_use]
    pub fn consumer_transports(&self) -> &[ConsumerTransportInfo] {
        &self.consumer_transports
    }

    #[must_use]
    pub fn consumer_transport(&self, producer_id: &str) -> Option<&ConsumerTransportInfo> {
        self.consumer_transports
            .iter()
            .find(|entry| entry.producer_id == producer_id)
    }

    #[must_use]
    pub fn send_slot(&self, kind: MediaKind) -> Option<&SendSlot> {
        self.send.get(kind)
    }

    #[must_use]
    pub fn screen(&self) -> &ScreenShareFlags {
        &self.screen
    }

    #[must_use]
    pub fn room(&self) -> &RoomSettings {
        &self.room
    }

    #[must_use]
    pub fn breakout(&self) -> &BreakoutState {
        &self.breakout
    }

    #[must_use]
    pub fn layout(&self) -> &LayoutState {
        &self.layout
    }

    #[must_use]
    pub fn screen_states(&self) -> &ScreenHistory {
        &self.screen_states
    }

    #[must_use]
    pub fn update_main_window(&self) -> bool {
        self.update_main_window
    }

    // ------------------------------------------------------------------
    // Roster and media updates
    // ------------------------------------------------------------------

    /// Insert or replace a participant (matched by id).
    pub fn apply_participant_joined(&mut self, participant: Participant) {
        match self.participants.iter_mut().find(|p| p.id == participant.id) {
            Some(existing) => *existing = participant,
            None => self.participants.push(participant),
        }
    }

    /// Remove a participant and every stream they own. Returns the streams.
    pub fn apply_participant_left(&mut self, name: &str) -> Vec<Stream> {
        self.participants.retain(|p| p.name != name);
        self.audio_levels.retain(|level| level.name != name);
        let (removed, kept): (Vec<Stream>, Vec<Stream>) =
            self.streams.drain(..).partition(|s| s.owner == name);
        self.streams = kept;
        self.ordered.retain(|s| s.owner != name);
        removed
    }

    /// Apply a media change. Returns `false` for an unknown participant.
    pub fn apply_participant_media(&mut self, name: &str, update: MediaUpdate) -> bool {
        let Some(participant) = self.participants.iter_mut().find(|p| p.name == name) else {
            return false;
        };
        if let Some(muted) = update.muted {
            participant.muted = muted;
        }
        if let Some(video_on) = update.video_on {
            participant.video_on = video_on;
        }
        if let Some(audio_id) = update.audio_id {
            participant.audio_id = audio_id;
        }
        if let Some(video_id) = update.video_id {
            participant.video_id = video_id;
        }
        if let Some(use_board) = update.use_board {
            participant.use_board = use_board;
        }
        if let Some(muted) = update.muted {
            for stream in self.streams.iter_mut().filter(|s| s.owner == name) {
                stream.muted = muted;
            }
        }
        true
    }

    /// Upsert the latest loudness sample.
    pub fn apply_audio_level(&mut self, name: &str, average_loudness: f64) {
        match self.audio_levels.iter_mut().find(|level| level.name == name) {
            Some(level) => level.average_loudness = average_loudness,
            None => self.audio_levels.push(AudioDecibels {
                name: name.to_string(),
                average_loudness,
            }),
        }
    }

    /// Add a stream, replacing any stream with the same producer id.
    pub fn apply_stream_added(&mut self, stream: Stream) {
        match self
            .streams
            .iter_mut()
            .find(|s| s.producer_id == stream.producer_id)
        {
            Some(existing) => *existing = stream,
            None => self.streams.push(stream),
        }
    }

    /// Remove a stream from the pool and the ranked order.
    pub fn apply_stream_removed(&mut self, producer_id: &str) -> Option<Stream> {
        self.ordered.retain(|s| s.producer_id != producer_id);
        let index = self.streams.iter().position(|s| s.producer_id == producer_id)?;
        Some(self.streams.remove(index))
    }

    // ------------------------------------------------------------------
    // Receive-side transports
    // ------------------------------------------------------------------

    /// Register a consumer entry. Returns the stale entry it replaced.
    pub fn register_consumer_transport(
        &mut self,
        info: ConsumerTransportInfo,
    ) -> Option<ConsumerTransportInfo> {
        let stale = self.take_consumer_transport(&info.producer_id);
        self.consumer_transports.push(info);
        stale
    }

    /// Remove every consumer entry.
    pub fn drain_consumer_transports(&mut self) -> Vec<ConsumerTransportInfo> {
        std::mem::take(&mut self.consumer_transports)
    }

    pub fn take_consumer_transport(&mut self, producer_id: &str) -> Option<ConsumerTransportInfo> {
        let index = self
            .consumer_transports
            .iter()
            .position(|entry| entry.producer_id == producer_id)?;
        Some(self.consumer_transports.remove(index))
    }

    // ------------------------------------------------------------------
    // Send-side transports
    // ------------------------------------------------------------------

    /// Install an outbound transport. If one is already installed it is kept
    /// and returned, and `transport` is not stored.
    pub fn install_send_transport(
        &mut self,
        kind: MediaKind,
        transport: Arc<dyn Transport>,
    ) -> Option<Arc<dyn Transport>> {
        let slot = self.send.slot_mut(kind);
        if let Some(existing) = slot {
            return Some(Arc::clone(&existing.transport));
        }
        *slot = Some(SendSlot {
            transport,
            producer: None,
            source: None,
        });
        None
    }

    pub fn take_send_transport(&mut self, kind: MediaKind) -> Option<SendSlot> {
        self.send.slot_mut(kind).take()
    }

    /// Attach a producer and its source. Returns the previous producer.
    ///
    /// Has no effect when no transport is installed for `kind`.
    pub fn set_producer(
        &mut self,
        kind: MediaKind,
        producer: Arc<dyn Producer>,
        source: Arc<dyn MediaStream>,
    ) -> Option<Arc<dyn Producer>> {
        let slot = self.send.slot_mut(kind).as_mut()?;
        slot.source = Some(source);
        slot.producer.replace(producer)
    }

    /// Detach the producer and its source, keeping the transport.
    pub fn take_producer(
        &mut self,
        kind: MediaKind,
    ) -> Option<(Arc<dyn Producer>, Option<Arc<dyn MediaStream>>)> {
        let slot = self.send.slot_mut(kind).as_mut()?;
        let producer = slot.producer.take()?;
        Some((producer, slot.source.take()))
    }

    // ------------------------------------------------------------------
    // Layout results
    // ------------------------------------------------------------------

    pub fn apply_ranked(&mut self, ordered: Vec<Stream>) {
        self.ordered = ordered;
    }

    /// Store new pages, clamping the current page into range.
    pub fn apply_pages(&mut self, pages: PaginatedStreams) {
        self.pages = pages;
        let last = self.pages.len().saturating_sub(1);
        if self.current_page > last {
            self.current_page = last;
        }
    }

    pub fn set_current_page(&mut self, page: usize) {
        self.current_page = page;
    }

    pub fn apply_visible(&mut self, view: VisibleLayout) {
        self.layout_view = view;
    }

    /// Snapshot the current active names as the comparison baseline.
    pub fn commit_active_names(&mut self) {
        self.prev_active_names = self.layout_view.active_names.clone();
    }

    /// Roll the screen-state history. Returns the previous snapshot.
    pub fn roll_screen_state(&mut self, next: ScreenState) -> &ScreenState {
        self.screen_states.previous = std::mem::replace(&mut self.screen_states.current, next);
        &self.screen_states.previous
    }

    pub fn apply_grid_layout(
        &mut self,
        grid_sizes: GridSizes,
        main_shape: (usize, usize),
        alt_shape: (usize, usize),
        remove_alt_grid: bool,
    ) {
        self.layout.grid_sizes = grid_sizes;
        (self.layout.main_grid_rows, self.layout.main_grid_cols) = main_shape;
        (self.layout.alt_grid_rows, self.layout.alt_grid_cols) = alt_shape;
        self.layout.remove_alt_grid = remove_alt_grid;
    }

    pub fn set_main_area_percent(&mut self, percent: u8) {
        self.layout.main_area_percent = percent.min(100);
    }

    pub fn apply_component_sizes(&mut self, sizes: ComponentSizes) {
        self.layout.component_sizes = sizes;
    }

    pub fn apply_wide_screen(&mut self, wide: bool) {
        self.layout.wide_screen = wide;
    }

    pub fn apply_pagination_bar(&mut self, direction: PaginationDirection, extent: f64) {
        self.layout.pagination_direction = direction;
        self.layout.pagination_extent = extent;
    }

    pub fn apply_event_type(&mut self, event_type: EventType) {
        self.identity.event_type = event_type;
    }

    pub fn set_item_page_limit(&mut self, limit: usize) {
        self.limits.item = limit.max(1);
    }

    pub fn set_update_main_window(&mut self, value: bool) {
        self.update_main_window = value;
    }

    // ------------------------------------------------------------------
    // Room settings and breakout
    // ------------------------------------------------------------------

    pub fn apply_room_settings(&mut self, settings: RoomSettings) {
        self.room = settings;
    }

    pub fn apply_whiteboard(&mut self, active: bool) {
        self.room.whiteboard_active = active;
    }

    /// Replace the breakout assignment and recompute the member's room.
    ///
    /// Ending a breakout clears the host's visited room.
    pub fn apply_breakout_update(&mut self, rooms: Vec<Vec<String>>, started: bool, ended: bool) {
        self.breakout.rooms = rooms;
        self.breakout.started = started;
        self.breakout.ended = ended;
        self.breakout.member_room = self.breakout.room_of(&self.identity.member);
        if !self.breakout.is_active() {
            self.breakout.host_new_room = None;
        }
    }

    pub fn set_host_room(&mut self, room: Option<usize>) {
        self.breakout.host_new_room = room;
    }

    // ------------------------------------------------------------------
    // Screen share
    // ------------------------------------------------------------------

    pub fn set_screen_share_state(&mut self, state: ScreenShareState) {
        self.screen.state = state;
    }

    /// Someone started sharing `producer_id`.
    pub fn apply_share_started(&mut self, producer_id: &str, owner: &str, local: bool) {
        self.screen.share_active = true;
        self.screen.share_ended = false;
        self.screen.local_share = local;
        self.screen.producer_id = Some(producer_id.to_string());
        self.screen.owner = Some(owner.to_string());
    }

    /// Clear share flags after a local or remote share ended.
    pub fn apply_share_ended(&mut self) {
        self.screen.share_active = false;
        self.screen.share_ended = true;
        self.screen.local_share = false;
        self.screen.producer_id = None;
        self.screen.owner = None;
        self.screen.annotate = false;
    }

    pub fn set_request_pending(&mut self, pending: bool) {
        self.screen.request_pending = pending;
    }

    /// Record the host's answer to a share request.
    pub fn apply_share_approval(&mut self, approved: bool) {
        self.screen.request_pending = false;
        self.screen.approved = approved;
    }

    pub fn set_annotation(&mut self, active: bool) {
        self.screen.annotate = active;
    }

    /// Force full display, remembering the prior value for restore.
    pub fn set_force_full_display(&mut self, value: bool) {
        self.screen.prev_force_full_display = self.screen.force_full_display;
        self.screen.force_full_display = value;
    }

    pub fn restore_force_full_display(&mut self) {
        self.screen.force_full_display = self.screen.prev_force_full_display;
    }
}

impl LayoutParams for SessionState {
    fn item_page_limit(&self) -> usize {
        self.limits.item
    }

    fn screen_page_limit(&self) -> usize {
        self.limits.screen
    }

    fn fixed_page_limit(&self) -> usize {
        self.limits.fixed
    }

    fn strip_layout_limit(&self) -> usize {
        self.limits.strip
    }

    fn share_active(&self) -> bool {
        self.screen.share_active
    }

    fn event_type(&self) -> EventType {
        self.identity.event_type
    }

    fn is_wide_screen(&self) -> bool {
        self.layout.wide_screen
    }
}

impl RankingSource for SessionState {
    fn roster(&self) -> &[Participant] {
        &self.participants
    }

    fn local_member(&self) -> &str {
        &self.identity.member
    }

    fn ranking_event(&self) -> EventType {
        self.identity.event_type
    }

    fn display_type(&self) -> DisplayType {
        self.identity.display_type
    }

    fn sort_by_loudness(&self) -> bool {
        self.sort_audio_loudness
    }

    fn loudness_threshold(&self) -> f64 {
        self.loudness_threshold
    }

    fn loudness_of(&self, name: &str) -> Option<f64> {
        self.loudness(name)
    }

    fn shared_screen(&self) -> Option<&str> {
        if self.screen.share_active {
            self.screen.producer_id.as_deref()
        } else {
            None
        }
    }
}

impl BreakoutView for SessionState {
    fn breakout_state(&self) -> &BreakoutState {
        &self.breakout
    }

    fn viewer_is_host(&self) -> bool {
        self.identity.is_host()
    }

    fn viewed_page(&self) -> usize {
        self.current_page
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn main_page_count(&self) -> usize {
        self.pages.main_rooms_length
    }
}
