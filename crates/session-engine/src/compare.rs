//! Change detection and the host's screen-client broadcast.
//!
//! After each layout pass the active-name set and the main-screen snapshot
//! are compared with the previous pass. Any difference triggers an
//! `updateScreenClient` emission when the local member hosts.

use crate::layout::{auto_adjust, LayoutParams};
use crate::model::{EventType, ScreenState};
use crate::orchestrator::Orchestrator;
use crate::signaling::events;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Identical payloads inside this window are not re-sent.
pub const TRIGGER_DEDUP_WINDOW: Duration = Duration::from_secs(1);

/// Whether two name lists differ as sets.
#[must_use]
pub fn names_changed(previous: &[String], current: &[String]) -> bool {
    current.iter().any(|name| !previous.contains(name))
        || previous.iter().any(|name| !current.contains(name))
}

/// Fields that differ between two screen snapshots.
#[must_use]
pub fn changed_fields(previous: &ScreenState, current: &ScreenState) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if previous.main_screen_person != current.main_screen_person {
        fields.push("main_screen_person");
    }
    if previous.main_screen_producer_id != current.main_screen_producer_id {
        fields.push("main_screen_producer_id");
    }
    if previous.main_screen_filled != current.main_screen_filled {
        fields.push("main_screen_filled");
    }
    if previous.admin_on_main_screen != current.admin_on_main_screen {
        fields.push("admin_on_main_screen");
    }
    fields
}

/// `updateScreenClient` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenClientUpdate {
    pub room_name: String,
    /// Active names, host first.
    pub names: Vec<String>,
    pub main_percent: u8,
    pub main_screen_person: String,
    pub main_screen_filled: bool,
    pub admin_on_main_screen: bool,
    pub view_type: String,
}

/// Inputs for [`plan_screen_client_update`].
#[derive(Debug, Clone, Copy)]
pub struct TriggerInput<'a> {
    pub room_name: &'a str,
    pub event_type: EventType,
    pub share_active: bool,
    pub screen: &'a ScreenState,
    pub active_names: &'a [String],
    pub host_name: Option<&'a str>,
}

/// Build the screen-client update, or `None` when nothing occupies the main
/// screen and the event is not a conference without a share.
#[must_use]
pub fn plan_screen_client_update(input: TriggerInput<'_>) -> Option<ScreenClientUpdate> {
    let host = input.host_name.unwrap_or_default();
    let conference_grid = input.event_type == EventType::Conference && !input.share_active;

    let person = if conference_grid {
        host.to_string()
    } else if input.screen.main_screen_filled {
        input.screen.main_screen_person.clone()?
    } else {
        return None;
    };

    let mut names = input.active_names.to_vec();
    let counted = names.len();
    if !host.is_empty() {
        names.retain(|name| name != host);
        names.insert(0, host.to_string());
    }

    let main_percent = auto_adjust(counted, input.event_type, input.share_active).main_percent();

    Some(ScreenClientUpdate {
        room_name: input.room_name.to_string(),
        names,
        main_percent,
        admin_on_main_screen: !host.is_empty() && person == host,
        main_screen_person: person,
        main_screen_filled: input.screen.main_screen_filled || conference_grid,
        view_type: input.event_type.as_str().to_string(),
    })
}

/// Last emitted payload, for duplicate suppression.
#[derive(Debug, Default)]
pub struct TriggerThrottle {
    last: Option<(Instant, Value)>,
}

impl TriggerThrottle {
    fn is_duplicate(&self, now: Instant, payload: &Value) -> bool {
        self.last.as_ref().is_some_and(|(at, previous)| {
            previous == payload && now.saturating_duration_since(*at) < TRIGGER_DEDUP_WINDOW
        })
    }

    fn record(&mut self, now: Instant, payload: Value) {
        self.last = Some((now, payload));
    }
}

impl Orchestrator {
    /// Main-screen snapshot for the current layout.
    pub(crate) fn current_screen_state(&self) -> ScreenState {
        let main = self.state.visible().main_screen.as_ref();
        let host = self.state.host();
        let whiteboard_host = self.state.room().whiteboard_active && host.is_some_and(|h| h.use_board);

        let person = if whiteboard_host {
            host.map(|h| h.name.clone())
        } else {
            main.map(|s| s.owner.clone())
        };
        let admin_on_main_screen = person
            .as_deref()
            .is_some_and(|p| self.state.host_name() == Some(p));

        ScreenState {
            main_screen_person: person,
            main_screen_producer_id: main.map(|s| s.producer_id.clone()),
            main_screen_filled: main.is_some() || whiteboard_host,
            admin_on_main_screen,
        }
    }

    fn detect_active_name_change(&mut self, restart: bool) -> bool {
        let changed = restart
            || names_changed(self.state.prev_active_names(), self.state.active_names());
        if changed {
            debug!(
                target: "se.compare",
                restart,
                active = self.state.active_names().len(),
                "Active names changed"
            );
        }
        self.state.commit_active_names();
        changed
    }

    /// Returns `(changed, main_person_changed)`.
    fn detect_screen_state_change(&mut self, restart: bool) -> (bool, bool) {
        let next = self.current_screen_state();
        let current = next.clone();
        let previous = self.state.roll_screen_state(next);
        let fields = changed_fields(previous, &current);
        let main_person_changed = fields.contains(&"main_screen_person");
        if !fields.is_empty() {
            debug!(target: "se.compare", ?fields, "Screen state changed");
        }
        (restart || !fields.is_empty(), main_person_changed)
    }

    /// Compare the visible participants with the previous pass.
    pub fn compare_active_names(&mut self, restart: bool) -> bool {
        let changed = self.detect_active_name_change(restart);
        if changed {
            self.trigger(false);
        }
        changed
    }

    /// Compare the main-screen snapshot with the previous pass.
    pub fn compare_screen_states(&mut self, restart: bool) -> bool {
        let (changed, _) = self.detect_screen_state_change(restart);
        if changed {
            self.trigger(false);
        }
        changed
    }

    /// Run both comparators after a layout pass.
    pub(crate) fn run_comparators(&mut self) {
        let names = self.detect_active_name_change(false);
        let (screen, main_person_changed) = self.detect_screen_state_change(false);
        if names || screen {
            self.trigger(false);
        }
        if main_person_changed && !self.in_followup_pass {
            debug!(target: "se.compare", "Main screen person changed, re-ranking once");
            self.in_followup_pass = true;
            self.reorder_streams(false, true, &[]);
            self.in_followup_pass = false;
        }
    }

    /// Force both comparators and re-broadcast the screen-client state.
    pub fn re_port(&mut self, restart: bool) -> bool {
        self.detect_active_name_change(restart);
        self.detect_screen_state_change(restart);
        self.trigger(true)
    }

    /// Broadcast `updateScreenClient`. Only the host emits. Returns whether
    /// an emission was queued.
    pub fn trigger(&mut self, force: bool) -> bool {
        if !self.state.identity().is_host() {
            return false;
        }

        let screen = self.state.screen_states().current.clone();
        let update = plan_screen_client_update(TriggerInput {
            room_name: &self.state.identity().room_name,
            event_type: self.state.event_type(),
            share_active: self.state.share_active(),
            screen: &screen,
            active_names: self.state.active_names(),
            host_name: self.state.host_name(),
        });
        let Some(update) = update else {
            debug!(target: "se.compare", "Nothing on the main screen, no screen-client update");
            return false;
        };

        let payload = match serde_json::to_value(&update) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "se.compare", error = %e, "Failed to encode screen-client update");
                return false;
            }
        };

        let now = Instant::now();
        if !force && self.throttle.is_duplicate(now, &payload) {
            debug!(target: "se.compare", "Duplicate screen-client update suppressed");
            return false;
        }

        debug!(
            target: "se.compare",
            names = update.names.len(),
            main_percent = update.main_percent,
            force,
            "Emitting screen-client update"
        );
        self.outbox.emit(events::UPDATE_SCREEN_CLIENT, payload.clone());
        self.throttle.record(now, payload);
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_names_compared_as_sets() {
        assert!(!names_changed(&strings(&["a", "b"]), &strings(&["b", "a"])));
        assert!(names_changed(&strings(&["a"]), &strings(&["a", "b"])));
        assert!(names_changed(&strings(&["a", "b"]), &strings(&["a"])));
        assert!(!names_changed(&[], &[]));
    }

    #[test]
    fn test_changed_fields_lists_differences() {
        let previous = ScreenState::default();
        let current = ScreenState {
            main_screen_person: Some("alice".to_string()),
            main_screen_filled: true,
            ..ScreenState::default()
        };
        assert_eq!(
            changed_fields(&previous, &current),
            vec!["main_screen_person", "main_screen_filled"]
        );
        assert!(changed_fields(&current, &current).is_empty());
    }

    #[test]
    fn test_conference_without_share_puts_host_first() {
        let screen = ScreenState::default();
        let names = strings(&["alice", "host", "bob"]);
        let update = plan_screen_client_update(TriggerInput {
            room_name: "room-1",
            event_type: EventType::Conference,
            share_active: false,
            screen: &screen,
            active_names: &names,
            host_name: Some("host"),
        })
        .unwrap();

        assert_eq!(update.names, strings(&["host", "alice", "bob"]));
        assert_eq!(update.main_screen_person, "host");
        assert!(update.admin_on_main_screen);
        assert_eq!(update.main_percent, 0);
        assert_eq!(update.view_type, "conference");
    }

    #[test]
    fn test_share_fills_main_screen() {
        let screen = ScreenState {
            main_screen_person: Some("alice".to_string()),
            main_screen_producer_id: Some("s-1".to_string()),
            main_screen_filled: true,
            admin_on_main_screen: false,
        };
        let names = strings(&["alice", "bob"]);
        let update = plan_screen_client_update(TriggerInput {
            room_name: "room-1",
            event_type: EventType::Conference,
            share_active: true,
            screen: &screen,
            active_names: &names,
            host_name: Some("host"),
        })
        .unwrap();

        assert_eq!(update.names, strings(&["host", "alice", "bob"]));
        assert_eq!(update.main_screen_person, "alice");
        assert!(!update.admin_on_main_screen);
        assert_eq!(update.main_percent, 84);

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["mainScreenPerson"], "alice");
        assert_eq!(json["viewType"], "conference");
    }

    #[test]
    fn test_empty_main_screen_in_webinar_emits_nothing() {
        let screen = ScreenState::default();
        let update = plan_screen_client_update(TriggerInput {
            room_name: "room-1",
            event_type: EventType::Webinar,
            share_active: false,
            screen: &screen,
            active_names: &[],
            host_name: Some("host"),
        });
        assert!(update.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_window() {
        let mut throttle = TriggerThrottle::default();
        let payload = serde_json::json!({"names": ["a"]});
        let now = Instant::now();
        assert!(!throttle.is_duplicate(now, &payload));
        throttle.record(now, payload.clone());
        assert!(throttle.is_duplicate(Instant::now(), &payload));
        assert!(!throttle.is_duplicate(Instant::now(), &serde_json::json!({"names": ["b"]})));

        tokio::time::advance(TRIGGER_DEDUP_WINDOW).await;
        assert!(!throttle.is_duplicate(Instant::now(), &payload));
    }
}
