//! Pre-configured session fixtures.
//!
//! Provides builders for:
//! - Session identities (host or attendee, event type)
//! - Participants with audio, video and screen producers
//! - A spawned session wired to recording mocks

use crate::mock_platform::MockDevice;
use crate::mock_render::{MockAlerts, MockRender};
use crate::mock_signaling::MockSignaling;
use session_engine::model::{DisplayType, EventType, Level, Participant, SessionIdentity};
use session_engine::render::CardStrategy;
use session_engine::{EngineConfig, SessionActor, SessionDeps, SessionHandle};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identity builder. Defaults to an attendee named `local` in a conference.
#[derive(Debug, Clone)]
pub struct TestIdentity {
    identity: SessionIdentity,
}

impl Default for TestIdentity {
    fn default() -> Self {
        Self {
            identity: SessionIdentity {
                room_name: "room-test".to_string(),
                member: "local".to_string(),
                level: Level::Attendee,
                event_type: EventType::Conference,
                display_type: DisplayType::Video,
            },
        }
    }
}

impl TestIdentity {
    #[must_use]
    pub fn attendee() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host() -> Self {
        let mut fixture = Self::default();
        fixture.identity.level = Level::Host;
        fixture
    }

    #[must_use]
    pub fn named(mut self, member: impl Into<String>) -> Self {
        self.identity.member = member.into();
        self
    }

    #[must_use]
    pub fn in_room(mut self, room_name: impl Into<String>) -> Self {
        self.identity.room_name = room_name.into();
        self
    }

    #[must_use]
    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.identity.event_type = event_type;
        self
    }

    #[must_use]
    pub fn with_display_type(mut self, display_type: DisplayType) -> Self {
        self.identity.display_type = display_type;
        self
    }

    #[must_use]
    pub fn build(self) -> SessionIdentity {
        self.identity
    }
}

/// Participant builder. Producer ids follow `p-{kind}-{name}`.
#[derive(Debug, Clone)]
pub struct TestParticipant {
    participant: Participant,
}

impl TestParticipant {
    #[must_use]
    pub fn attendee(name: &str) -> Self {
        Self {
            participant: Participant::new(format!("socket-{name}"), name, Level::Attendee),
        }
    }

    #[must_use]
    pub fn host(name: &str) -> Self {
        Self {
            participant: Participant::new(format!("socket-{name}"), name, Level::Host),
        }
    }

    /// Unmuted, with an audio producer.
    #[must_use]
    pub fn with_audio(mut self) -> Self {
        self.participant.audio_id = Some(audio_id(&self.participant.name));
        self.participant.muted = false;
        self
    }

    /// Camera on, with a video producer.
    #[must_use]
    pub fn with_video(mut self) -> Self {
        self.participant.video_id = Some(video_id(&self.participant.name));
        self.participant.video_on = true;
        self
    }

    #[must_use]
    pub fn with_screen(mut self) -> Self {
        self.participant.screen_id = Some(screen_id(&self.participant.name));
        self
    }

    #[must_use]
    pub fn muted(mut self) -> Self {
        self.participant.muted = true;
        self
    }

    #[must_use]
    pub fn in_breakout_room(mut self, room: usize) -> Self {
        self.participant.breakout_room = Some(room);
        self
    }

    #[must_use]
    pub fn build(self) -> Participant {
        self.participant
    }
}

#[must_use]
pub fn audio_id(name: &str) -> String {
    format!("p-audio-{name}")
}

#[must_use]
pub fn video_id(name: &str) -> String {
    format!("p-video-{name}")
}

#[must_use]
pub fn screen_id(name: &str) -> String {
    format!("p-screen-{name}")
}

/// A running session plus the mocks behind it.
pub struct TestSession {
    pub handle: SessionHandle,
    pub task: JoinHandle<()>,
    pub signaling: Arc<MockSignaling>,
    pub device: Arc<MockDevice>,
    pub render: Arc<MockRender>,
    pub alerts: Arc<MockAlerts>,
}

impl TestSession {
    /// Spawn with default config, an accepting socket and a working device.
    #[must_use]
    pub fn spawn(identity: SessionIdentity) -> Self {
        Self::spawn_with(identity, EngineConfig::default(), MockSignaling::accepting(), MockDevice::new())
    }

    #[must_use]
    pub fn spawn_with(
        identity: SessionIdentity,
        config: EngineConfig,
        signaling: Arc<MockSignaling>,
        device: Arc<MockDevice>,
    ) -> Self {
        let render = Arc::new(MockRender::default());
        let alerts = Arc::new(MockAlerts::default());
        let deps = SessionDeps {
            signaling: signaling.clone(),
            device: device.clone(),
            render: render.clone(),
            alerts: alerts.clone(),
            cards: CardStrategy::Default,
        };
        let (handle, task) = SessionActor::spawn(identity, config, deps, CancellationToken::new());
        Self {
            handle,
            task,
            signaling,
            device,
            render,
            alerts,
        }
    }

    /// Cancel the session and wait for the actor to exit.
    pub async fn shutdown(self) {
        self.handle.cancel();
        self.task.await.unwrap();
    }
}
