//! Session data model.
//!
//! Plain data shared between the state store, the layout algorithms and the
//! boundaries. Platform handles are referenced through the traits in
//! [`crate::platform`].

use crate::platform::{Consumer, MediaStream, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// Participant privilege level. Serialized as `"1"` / `"2"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "1")]
    Attendee,
    #[serde(rename = "2")]
    Host,
}

impl Level {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Attendee => "1",
            Level::Host => "2",
        }
    }
}

/// Media kind of a producer or consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Screen,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Screen => "screen",
        }
    }

    /// Video and screen streams occupy a video card.
    #[must_use]
    pub const fn is_visual(&self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Screen)
    }
}

/// Outbound transport selector for `create_send_transport`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Audio,
    Video,
    Screen,
    /// Audio and video together.
    All,
}

impl TransportKind {
    /// Media kinds covered by this selector.
    #[must_use]
    pub fn media_kinds(&self) -> &'static [MediaKind] {
        match self {
            TransportKind::Audio => &[MediaKind::Audio],
            TransportKind::Video => &[MediaKind::Video],
            TransportKind::Screen => &[MediaKind::Screen],
            TransportKind::All => &[MediaKind::Audio, MediaKind::Video],
        }
    }
}

/// Kind of meeting, which drives the main-screen and grid rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Conference,
    Webinar,
    Broadcast,
    Chat,
}

impl EventType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::Conference => "conference",
            EventType::Webinar => "webinar",
            EventType::Broadcast => "broadcast",
            EventType::Chat => "chat",
        }
    }
}

/// Which participants get a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    /// Only video and screen streams.
    Video,
    /// Video streams plus unmuted audio-only participants.
    Media,
    /// Every participant with any stream.
    All,
}

/// Host setting for member screen sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSetting {
    #[default]
    Allow,
    Approval,
    Disallow,
}

/// Who this engine instance is acting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub room_name: String,
    /// Local member's display name.
    pub member: String,
    pub level: Level,
    pub event_type: EventType,
    pub display_type: DisplayType,
}

impl SessionIdentity {
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.level == Level::Host
    }
}

/// A meeting participant as known from signaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    #[serde(rename = "islevel")]
    pub level: Level,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub video_on: bool,
    /// Producer id of the participant's audio, if any.
    #[serde(default, rename = "audioID")]
    pub audio_id: Option<String>,
    /// Producer id of the participant's camera, if any.
    #[serde(default, rename = "videoID")]
    pub video_id: Option<String>,
    /// Producer id of the participant's screen share, if any.
    #[serde(default, rename = "ScreenID")]
    pub screen_id: Option<String>,
    #[serde(default)]
    pub breakout_room: Option<usize>,
    #[serde(default)]
    pub use_board: bool,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, level: Level) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
            muted: false,
            video_on: false,
            audio_id: None,
            video_id: None,
            screen_id: None,
            breakout_room: None,
            use_board: false,
        }
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.level == Level::Host
    }

    /// Whether `producer_id` belongs to this participant.
    #[must_use]
    pub fn owns_producer(&self, producer_id: &str) -> bool {
        [&self.audio_id, &self.video_id, &self.screen_id]
            .into_iter()
            .any(|id| id.as_deref() == Some(producer_id))
    }
}

/// Media-state change for a participant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaUpdate {
    pub muted: Option<bool>,
    pub video_on: Option<bool>,
    pub audio_id: Option<Option<String>>,
    pub video_id: Option<Option<String>>,
    pub use_board: Option<bool>,
}

/// Where a stream comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamOrigin {
    /// Captured on this device (self view, local screen preview).
    Local,
    /// Received from a remote producer.
    Remote,
}

/// Weak reference to a platform media stream.
///
/// Strong references live with the lifecycle manager (consumer entries,
/// local captures); everything else holds one of these.
#[derive(Clone)]
pub struct MediaStreamRef(Weak<dyn MediaStream>);

impl MediaStreamRef {
    #[must_use]
    pub fn new(stream: &Arc<dyn MediaStream>) -> Self {
        Self(Arc::downgrade(stream))
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<dyn MediaStream>> {
        self.0.upgrade()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for MediaStreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStreamRef")
            .field("live", &self.is_live())
            .finish()
    }
}

/// A renderable stream.
#[derive(Debug, Clone)]
pub struct Stream {
    pub producer_id: String,
    /// Display name of the owning participant.
    pub owner: String,
    pub kind: MediaKind,
    pub origin: StreamOrigin,
    pub media: Option<MediaStreamRef>,
    pub muted: bool,
    pub paused: bool,
}

impl Stream {
    pub fn remote(producer_id: impl Into<String>, owner: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            producer_id: producer_id.into(),
            owner: owner.into(),
            kind,
            origin: StreamOrigin::Remote,
            media: None,
            muted: false,
            paused: false,
        }
    }

    pub fn local(producer_id: impl Into<String>, owner: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            origin: StreamOrigin::Local,
            ..Self::remote(producer_id, owner, kind)
        }
    }

    #[must_use]
    pub fn with_media(mut self, media: &Arc<dyn MediaStream>) -> Self {
        self.media = Some(MediaStreamRef::new(media));
        self
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.origin == StreamOrigin::Local
    }
}

// Media handles are compared by the producer they carry, not by pointer.
impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.producer_id == other.producer_id
            && self.owner == other.owner
            && self.kind == other.kind
            && self.origin == other.origin
            && self.muted == other.muted
            && self.paused == other.paused
    }
}

/// Receive-side pairing of a consumer with its transport.
///
/// At most one entry exists per `producer_id`.
#[derive(Debug, Clone)]
pub struct ConsumerTransportInfo {
    pub consumer: Arc<dyn Consumer>,
    pub transport: Arc<dyn Transport>,
    pub producer_id: String,
    pub server_consumer_transport_id: String,
    pub kind: MediaKind,
}

impl ConsumerTransportInfo {
    /// Close the consumer, then its transport.
    pub fn close(&self) {
        self.consumer.close();
        self.transport.close();
    }
}

/// Snapshot of what occupies the primary viewing slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenState {
    pub main_screen_person: Option<String>,
    pub main_screen_producer_id: Option<String>,
    pub main_screen_filled: bool,
    pub admin_on_main_screen: bool,
}

/// Card pixel sizes for the primary and alternate overflow grids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSizes {
    pub grid_width: u32,
    pub grid_height: u32,
    pub alt_grid_width: u32,
    pub alt_grid_height: u32,
}

/// Available pixel area for the main region and the overflow region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSizes {
    pub main_width: f64,
    pub main_height: f64,
    pub other_width: f64,
    pub other_height: f64,
}

/// Active streams split into pages. Page 0 is the main view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginatedStreams {
    pub pages: Vec<Vec<Stream>>,
    /// Number of leading pages that belong to the main room.
    pub main_rooms_length: usize,
}

impl PaginatedStreams {
    #[must_use]
    pub fn page(&self, index: usize) -> &[Stream] {
        self.pages.get(index).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Breakout session as seen by this member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakoutState {
    /// Participant names per room, in room order.
    pub rooms: Vec<Vec<String>>,
    pub started: bool,
    pub ended: bool,
    /// Room the host is currently visiting.
    pub host_new_room: Option<usize>,
    /// Room the local member is assigned to.
    pub member_room: Option<usize>,
}

impl BreakoutState {
    /// Room indices are only meaningful while this holds.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.started && !self.ended
    }

    #[must_use]
    pub fn room_of(&self, name: &str) -> Option<usize> {
        self.rooms
            .iter()
            .position(|room| room.iter().any(|member| member == name))
    }
}

/// Latest loudness sample for a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDecibels {
    pub name: String,
    pub average_loudness: f64,
}

/// Room-level settings that gate screen sharing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomSettings {
    pub audio_only: bool,
    /// Host blocks member screen sharing outright.
    pub screenshare_restricted: bool,
    pub screenshare_permission: PermissionSetting,
    pub whiteboard_active: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_level_wire_format() {
        assert_eq!(serde_json::to_string(&Level::Host).unwrap(), "\"2\"");
        assert_eq!(serde_json::to_string(&Level::Attendee).unwrap(), "\"1\"");
        let level: Level = serde_json::from_str("\"2\"").unwrap();
        assert_eq!(level, Level::Host);
    }

    #[test]
    fn test_participant_deserializes_signaling_shape() {
        let json = r#"{
            "id": "p1",
            "name": "alice",
            "islevel": "1",
            "muted": true,
            "videoOn": true,
            "audioID": "a-1",
            "videoID": "v-1"
        }"#;

        let participant: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(participant.name, "alice");
        assert_eq!(participant.level, Level::Attendee);
        assert!(participant.muted);
        assert_eq!(participant.video_id.as_deref(), Some("v-1"));
        assert_eq!(participant.breakout_room, None);
    }

    #[test]
    fn test_stream_equality_ignores_media_handle() {
        let a = Stream::remote("v-1", "alice", MediaKind::Video);
        let mut b = a.clone();
        b.media = None;
        assert_eq!(a, b);

        let c = Stream::local("v-1", "alice", MediaKind::Video);
        assert_ne!(a, c);
    }

    #[test]
    fn test_breakout_room_lookup() {
        let breakout = BreakoutState {
            rooms: vec![vec!["alice".to_string()], vec!["bob".to_string(), "carol".to_string()]],
            started: true,
            ..Default::default()
        };

        assert!(breakout.is_active());
        assert_eq!(breakout.room_of("carol"), Some(1));
        assert_eq!(breakout.room_of("dave"), None);

        let ended = BreakoutState {
            ended: true,
            ..breakout
        };
        assert!(!ended.is_active());
    }

    #[test]
    fn test_transport_kind_expansion() {
        assert_eq!(
            TransportKind::All.media_kinds(),
            &[MediaKind::Audio, MediaKind::Video]
        );
        assert_eq!(TransportKind::Screen.media_kinds(), &[MediaKind::Screen]);
    }

    #[test]
    fn test_paginated_page_out_of_range_is_empty() {
        let pages = PaginatedStreams::default();
        assert!(pages.page(3).is_empty());
        assert!(pages.is_empty());
    }
}
