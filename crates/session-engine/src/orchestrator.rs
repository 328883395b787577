//! Synchronous session core.
//!
//! [`Orchestrator`] owns the [`SessionState`] and the render, alert and
//! outbound boundaries. It never awaits: network round-trips happen in the
//! caller's task (see [`crate::actors::SessionHandle`]) and their results are
//! committed here. Operations are split across modules:
//!
//! - `reorder`: ranking and the layout pass
//! - `compare`: change detection and `updateScreenClient`
//! - `pagination`: page navigation and breakout rooms
//! - `lifecycle`: consumer bookkeeping and producer closure
//! - `screenshare`: local share state machine

use crate::compare::TriggerThrottle;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::layout::{LayoutParams, PaginationDirection};
use crate::model::{
    ComponentSizes, EventType, MediaUpdate, Participant, RoomSettings, SessionIdentity,
};
use crate::render::{AlertSeverity, AlertSink, CardStrategy, RenderSink, DEFAULT_ALERT_DURATION_MS};
use crate::reorder::{ReorderGate, ReorderOutcome};
use crate::signaling::Outbox;
use crate::state::SessionState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rendering and alert sinks.
#[derive(Clone)]
pub struct Sinks {
    pub render: Arc<dyn RenderSink>,
    pub alerts: Arc<dyn AlertSink>,
}

/// Session core. Single writer of the session state.
pub struct Orchestrator {
    pub(crate) state: SessionState,
    pub(crate) config: EngineConfig,
    pub(crate) render: Arc<dyn RenderSink>,
    pub(crate) alerts: Arc<dyn AlertSink>,
    pub(crate) cards: CardStrategy,
    pub(crate) outbox: Outbox,
    pub(crate) gate: ReorderGate,
    pub(crate) throttle: TriggerThrottle,
    pub(crate) in_followup_pass: bool,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        identity: SessionIdentity,
        config: EngineConfig,
        sinks: Sinks,
        cards: CardStrategy,
        outbox: Outbox,
    ) -> Self {
        Self {
            state: SessionState::new(identity, &config),
            config,
            render: sinks.render,
            alerts: sinks.alerts,
            cards,
            outbox,
            gate: ReorderGate::default(),
            throttle: TriggerThrottle::default(),
            in_followup_pass: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn alert(&self, message: &str, severity: AlertSeverity) {
        self.alerts
            .show_alert(message, severity, DEFAULT_ALERT_DURATION_MS);
    }

    /// Surface an error to the user if its kind is user-visible.
    pub(crate) fn alert_error(&self, error: &EngineError) {
        if error.is_user_visible() {
            self.alert(&error.alert_message(), error.severity());
        }
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    pub fn participant_joined(&mut self, participant: Participant) {
        debug!(target: "se.reorder", participant_id = %participant.id, "Participant joined");
        self.state.apply_participant_joined(participant);
        self.reorder_streams(false, false, &[]);
    }

    /// Drop a participant, close the consumers of their producers and
    /// re-render.
    pub fn participant_left(&mut self, name: &str) {
        let owned: Vec<String> = self
            .state
            .consumer_transports()
            .iter()
            .map(|entry| entry.producer_id.clone())
            .filter(|producer_id| {
                self.state.owner_of(producer_id) == Some(name)
                    || self
                        .state
                        .streams()
                        .iter()
                        .any(|s| s.producer_id == *producer_id && s.owner == name)
            })
            .collect();
        for producer_id in &owned {
            self.producer_closed(producer_id);
        }

        let removed = self.state.apply_participant_left(name);
        debug!(target: "se.reorder", removed = removed.len(), "Participant left");
        self.refresh_visible_page();
    }

    pub fn participant_media_changed(&mut self, name: &str, update: MediaUpdate) {
        if !self.state.apply_participant_media(name, update) {
            warn!(target: "se.reorder", "Media update for unknown participant ignored");
            return;
        }
        self.reorder_streams(false, false, &[]);
    }

    /// Record a loudness sample. Re-ranking follows the reorder gate.
    pub fn update_participant_audio_decibels(&mut self, name: &str, average_loudness: f64) {
        if !average_loudness.is_finite() {
            return;
        }
        self.state.apply_audio_level(name, average_loudness);
        self.reorder_streams(false, false, &[]);
    }

    // ------------------------------------------------------------------
    // View configuration
    // ------------------------------------------------------------------

    /// Apply event-specific page limits and re-rank.
    pub fn on_screen_changes(&mut self, changed: bool) -> ReorderOutcome {
        let event_type = self.state.event_type();
        match event_type {
            EventType::Broadcast => {
                self.state.set_item_page_limit(1);
                self.state.set_main_area_percent(100);
            }
            EventType::Chat => {
                self.state.set_item_page_limit(2);
                self.state.set_main_area_percent(0);
            }
            EventType::Conference if !self.state.share_active() => {
                self.state.set_main_area_percent(0);
            }
            _ => {}
        }
        debug!(target: "se.layout", event_type = event_type.as_str(), changed, "Screen changes applied");
        self.reorder_streams(false, changed, &[])
    }

    pub fn set_event_type(&mut self, event_type: EventType) {
        info!(target: "se.layout", event_type = event_type.as_str(), "Event type changed");
        self.state.apply_event_type(event_type);
        self.on_screen_changes(true);
    }

    pub fn update_component_sizes(&mut self, sizes: ComponentSizes) {
        self.state.apply_component_sizes(sizes);
        self.refresh_visible_page();
    }

    pub fn set_wide_screen(&mut self, wide: bool) {
        if self.state.layout().wide_screen != wide {
            self.state.apply_wide_screen(wide);
            self.refresh_visible_page();
        }
    }

    pub fn set_pagination_bar(&mut self, direction: PaginationDirection, extent: f64) {
        self.state.apply_pagination_bar(direction, extent);
        self.refresh_visible_page();
    }

    pub fn update_room_settings(&mut self, settings: RoomSettings) {
        self.state.apply_room_settings(settings);
    }

    /// Whiteboard toggles can move the host onto the main screen.
    pub fn set_whiteboard_active(&mut self, active: bool) {
        self.state.apply_whiteboard(active);
        self.refresh_visible_page();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::{DisplayType, Level};
    use crate::render::mock::{RecordingAlerts, RecordingRender};
    use crate::signaling::OutboundEvent;
    use tokio::sync::mpsc;

    pub(crate) struct Fixture {
        pub(crate) core: Orchestrator,
        pub(crate) render: Arc<RecordingRender>,
        pub(crate) alerts: Arc<RecordingAlerts>,
        pub(crate) outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    }

    impl Fixture {
        pub(crate) fn drain_events(&mut self) -> Vec<OutboundEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.outbound.try_recv() {
                events.push(event);
            }
            events
        }
    }

    pub(crate) fn identity(level: Level, event_type: EventType) -> SessionIdentity {
        SessionIdentity {
            room_name: "room-1".to_string(),
            member: "me".to_string(),
            level,
            event_type,
            display_type: DisplayType::Video,
        }
    }

    pub(crate) fn fixture(identity: SessionIdentity, config: EngineConfig) -> Fixture {
        let render = Arc::new(RecordingRender::default());
        let alerts = Arc::new(RecordingAlerts::default());
        let (sender, outbound) = mpsc::unbounded_channel();
        let core = Orchestrator::new(
            identity,
            config,
            Sinks {
                render: render.clone(),
                alerts: alerts.clone(),
            },
            CardStrategy::Default,
            Outbox::from_sender(sender),
        );
        Fixture {
            core,
            render,
            alerts,
            outbound,
        }
    }
}
