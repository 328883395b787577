//! Pagination and breakout-room navigation.
//!
//! Ranked streams are split into pages: page 0 holds one extra card, later
//! pages hold `limit` each. While a breakout is active, room-assigned streams
//! leave the main pages and every room gets one page after them.

use crate::errors::EngineError;
use crate::model::{BreakoutState, PaginatedStreams, Stream};
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;
use crate::render::AlertSeverity;
use crate::signaling::events;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Read surface for navigation decisions.
pub trait BreakoutView {
    fn breakout_state(&self) -> &BreakoutState;
    fn viewer_is_host(&self) -> bool;
    fn viewed_page(&self) -> usize;
    fn page_count(&self) -> usize;
    /// Leading pages that belong to the main room.
    fn main_page_count(&self) -> usize;
}

/// Split `ordered` into pages.
///
/// `host_name` follows the host's visited room rather than their assignment.
#[must_use]
pub fn paginate(
    ordered: &[Stream],
    limit: usize,
    breakout: &BreakoutState,
    host_name: Option<&str>,
) -> PaginatedStreams {
    let limit = limit.max(1);

    if !breakout.is_active() {
        let pages = chunk_main(ordered.to_vec(), limit);
        let main_rooms_length = pages.len();
        return PaginatedStreams {
            pages,
            main_rooms_length,
        };
    }

    let mut rooms: Vec<Vec<Stream>> = vec![Vec::new(); breakout.rooms.len()];
    let mut main = Vec::new();
    for stream in ordered {
        let room = if host_name == Some(stream.owner.as_str()) {
            breakout.host_new_room
        } else {
            breakout.room_of(&stream.owner)
        };
        match room.and_then(|index| rooms.get_mut(index)) {
            Some(page) => page.push(stream.clone()),
            None => main.push(stream.clone()),
        }
    }

    let mut pages = chunk_main(main, limit);
    let main_rooms_length = pages.len();
    pages.extend(rooms);
    PaginatedStreams {
        pages,
        main_rooms_length,
    }
}

/// Main-room pages; always at least one, possibly empty.
fn chunk_main(streams: Vec<Stream>, limit: usize) -> Vec<Vec<Stream>> {
    let first_len = (limit + 1).min(streams.len());
    let mut rest = streams;
    let tail = rest.split_off(first_len);
    let mut pages = vec![rest];
    pages.extend(tail.chunks(limit).map(<[Stream]>::to_vec));
    pages
}

/// Labels for the page selector.
#[must_use]
pub fn page_labels(pages: &PaginatedStreams) -> Vec<String> {
    (0..pages.len())
        .map(|index| {
            if index < pages.main_rooms_length {
                (index + 1).to_string()
            } else {
                format!("Room {}", index - pages.main_rooms_length + 1)
            }
        })
        .collect()
}

/// Host room change implied by a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRoomChange {
    Keep,
    Enter(usize),
    Leave,
}

/// Decided navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPlan {
    /// Already on the requested page.
    Unchanged,
    Navigate { page: usize, host_room: HostRoomChange },
}

/// Payload for `updateHostBreakout`. Rooms are zero-based, `-1` is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostBreakoutUpdate {
    pub prev_room: i64,
    pub new_room: i64,
    pub room_name: String,
}

impl HostBreakoutUpdate {
    fn room_index(room: Option<usize>) -> i64 {
        room.and_then(|r| i64::try_from(r).ok()).unwrap_or(-1)
    }

    #[must_use]
    pub fn new(prev: Option<usize>, next: Option<usize>, room_name: &str) -> Self {
        Self {
            prev_room: Self::room_index(prev),
            new_room: Self::room_index(next),
            room_name: room_name.to_string(),
        }
    }
}

/// Decide whether the viewer may move to `page`.
///
/// # Errors
///
/// - `InvalidRequest` when `page` is out of range
/// - `AccessDenied` when a member targets a breakout room they are not in
pub fn plan_navigation(page: usize, view: &impl BreakoutView) -> Result<NavigationPlan, EngineError> {
    if page == view.viewed_page() {
        return Ok(NavigationPlan::Unchanged);
    }
    if page >= view.page_count() {
        return Err(EngineError::InvalidRequest(format!(
            "page {page} is out of range ({} pages)",
            view.page_count()
        )));
    }

    let breakout = view.breakout_state();
    let host_room = if breakout.is_active() && page >= view.main_page_count() {
        let room = page - view.main_page_count();
        if breakout.member_room == Some(room) {
            HostRoomChange::Keep
        } else if !view.viewer_is_host() {
            return Err(EngineError::AccessDenied(format!(
                "You are not part of the breakout room {}.",
                room + 1
            )));
        } else if breakout.host_new_room == Some(room) {
            HostRoomChange::Keep
        } else {
            HostRoomChange::Enter(room)
        }
    } else if view.viewer_is_host() && breakout.host_new_room.is_some() {
        HostRoomChange::Leave
    } else {
        HostRoomChange::Keep
    };

    Ok(NavigationPlan::Navigate { page, host_room })
}

impl Orchestrator {
    /// Navigate to `page` and render it.
    ///
    /// A denied or invalid request leaves the current page unchanged.
    ///
    /// # Errors
    ///
    /// See [`plan_navigation`]. Denials are also shown as a danger alert.
    pub fn generate_page_content(&mut self, page: usize) -> Result<(), EngineError> {
        let plan = match plan_navigation(page, &self.state) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(target: "se.pagination", page, error = %e, "Page navigation refused");
                if let EngineError::AccessDenied(message) = &e {
                    self.alert(message, AlertSeverity::Danger);
                    metrics::record_breakout_navigation("denied");
                } else {
                    metrics::record_breakout_navigation("invalid");
                }
                return Err(e);
            }
        };

        let NavigationPlan::Navigate { page, host_room } = plan else {
            debug!(target: "se.pagination", page, "Already on requested page");
            metrics::record_breakout_navigation("unchanged");
            return Ok(());
        };

        self.state.set_current_page(page);
        let previous = self.state.breakout().host_new_room;
        let next = match host_room {
            HostRoomChange::Keep => previous,
            HostRoomChange::Enter(room) => Some(room),
            HostRoomChange::Leave => None,
        };
        if next != previous {
            self.state.set_host_room(next);
            let update =
                HostBreakoutUpdate::new(previous, next, &self.state.identity().room_name);
            info!(
                target: "se.pagination",
                prev_room = update.prev_room,
                new_room = update.new_room,
                "Host moved between breakout rooms"
            );
            match serde_json::to_value(&update) {
                Ok(payload) => self.outbox.emit(events::UPDATE_HOST_BREAKOUT, payload),
                Err(e) => warn!(target: "se.pagination", error = %e, "Failed to encode host breakout update"),
            }
        }

        metrics::record_breakout_navigation("navigated");
        self.refresh_visible_page();
        Ok(())
    }

    /// Replace the breakout assignment and re-page.
    pub fn update_breakout(&mut self, rooms: Vec<Vec<String>>, started: bool, ended: bool) {
        let was_active = self.state.breakout().is_active();
        self.state.apply_breakout_update(rooms, started, ended);
        let active = self.state.breakout().is_active();
        if was_active && !active {
            info!(target: "se.pagination", "Breakout ended, returning to main room");
            self.state.set_current_page(0);
        }
        self.refresh_visible_page();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::MediaKind;

    fn streams(owners: &[&str]) -> Vec<Stream> {
        owners
            .iter()
            .enumerate()
            .map(|(i, owner)| Stream::remote(format!("v-{i}"), *owner, MediaKind::Video))
            .collect()
    }

    fn names(page: &[Stream]) -> Vec<&str> {
        page.iter().map(|s| s.owner.as_str()).collect()
    }

    struct View {
        breakout: BreakoutState,
        host: bool,
        page: usize,
        pages: usize,
        main_pages: usize,
    }

    impl BreakoutView for View {
        fn breakout_state(&self) -> &BreakoutState {
            &self.breakout
        }
        fn viewer_is_host(&self) -> bool {
            self.host
        }
        fn viewed_page(&self) -> usize {
            self.page
        }
        fn page_count(&self) -> usize {
            self.pages
        }
        fn main_page_count(&self) -> usize {
            self.main_pages
        }
    }

    fn active_breakout(member_room: Option<usize>) -> BreakoutState {
        BreakoutState {
            rooms: vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]],
            started: true,
            ended: false,
            host_new_room: None,
            member_room,
        }
    }

    #[test]
    fn test_first_page_holds_one_extra() {
        let ordered = streams(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let pages = paginate(&ordered, 3, &BreakoutState::default(), None);

        let sizes: Vec<usize> = pages.pages.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 3, 1]);
        assert_eq!(pages.main_rooms_length, 3);
    }

    #[test]
    fn test_empty_input_yields_single_empty_page() {
        let pages = paginate(&[], 4, &BreakoutState::default(), None);
        assert_eq!(pages.len(), 1);
        assert!(pages.page(0).is_empty());
    }

    #[test]
    fn test_breakout_rooms_follow_main_pages() {
        let ordered = streams(&["host", "a", "b", "x", "y", "c"]);
        let mut breakout = active_breakout(None);
        breakout.host_new_room = Some(1);

        let pages = paginate(&ordered, 4, &breakout, Some("host"));

        assert_eq!(pages.main_rooms_length, 1);
        assert_eq!(pages.len(), 4);
        assert_eq!(names(pages.page(0)), vec!["x", "y"]);
        assert_eq!(names(pages.page(1)), vec!["a"]);
        assert_eq!(names(pages.page(2)), vec!["host", "b"]);
        assert_eq!(names(pages.page(3)), vec!["c"]);
    }

    #[test]
    fn test_inactive_breakout_ignores_rooms() {
        let ordered = streams(&["a", "b"]);
        let mut breakout = active_breakout(None);
        breakout.ended = true;

        let pages = paginate(&ordered, 4, &breakout, None);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.page(0).len(), 2);
    }

    #[test]
    fn test_page_labels_name_rooms() {
        let pages = PaginatedStreams {
            pages: vec![vec![], vec![], vec![], vec![]],
            main_rooms_length: 2,
        };
        assert_eq!(page_labels(&pages), vec!["1", "2", "Room 1", "Room 2"]);
    }

    #[test]
    fn test_member_denied_foreign_room() {
        let view = View {
            breakout: active_breakout(Some(0)),
            host: false,
            page: 0,
            pages: 4,
            main_pages: 1,
        };

        let err = plan_navigation(3, &view).unwrap_err();
        assert!(matches!(
            err,
            EngineError::AccessDenied(ref msg) if msg == "You are not part of the breakout room 3."
        ));

        let own = plan_navigation(1, &view).unwrap();
        assert_eq!(
            own,
            NavigationPlan::Navigate {
                page: 1,
                host_room: HostRoomChange::Keep
            }
        );
    }

    #[test]
    fn test_host_enters_and_leaves_rooms() {
        let mut view = View {
            breakout: active_breakout(None),
            host: true,
            page: 0,
            pages: 4,
            main_pages: 1,
        };

        assert_eq!(
            plan_navigation(2, &view).unwrap(),
            NavigationPlan::Navigate {
                page: 2,
                host_room: HostRoomChange::Enter(1)
            }
        );

        view.breakout.host_new_room = Some(1);
        view.page = 2;
        assert_eq!(
            plan_navigation(0, &view).unwrap(),
            NavigationPlan::Navigate {
                page: 0,
                host_room: HostRoomChange::Leave
            }
        );
    }

    #[test]
    fn test_out_of_range_and_same_page() {
        let view = View {
            breakout: BreakoutState::default(),
            host: false,
            page: 1,
            pages: 2,
            main_pages: 2,
        };
        assert!(matches!(
            plan_navigation(2, &view),
            Err(EngineError::InvalidRequest(_))
        ));
        assert_eq!(plan_navigation(1, &view).unwrap(), NavigationPlan::Unchanged);
    }

    #[test]
    fn test_host_breakout_payload_shape() {
        let update = HostBreakoutUpdate::new(None, Some(2), "room-1");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"prevRoom": -1, "newRoom": 2, "roomName": "room-1"})
        );
    }
}
