//! Local screen-share state machine.
//!
//! `Idle -> Requesting -> Active -> Ending -> Idle`. Preconditions are checked
//! before any transport work; capture, transport creation and produce happen
//! in the caller's task between [`Orchestrator::begin_screen_share`] and
//! [`Orchestrator::complete_screen_share`].

use crate::errors::EngineError;
use crate::model::{MediaKind, PermissionSetting, Stream};
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;
use crate::platform::{MediaStream, Producer, Transport};
use crate::render::AlertSeverity;
use crate::signaling::events;
use crate::state::SessionState;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const IN_PROGRESS_MESSAGE: &str = "A screen share is already in progress.";
pub const AUDIO_ONLY_MESSAGE: &str = "You cannot share your screen in an audio-only event.";
pub const RESTRICTED_MESSAGE: &str = "You cannot start screen share. Access denied by host.";
pub const BREAKOUT_MESSAGE: &str = "Screen share is not allowed when breakout room is active";
pub const WHITEBOARD_MESSAGE: &str = "Screen share is not allowed when whiteboard is active";
pub const DISALLOWED_MESSAGE: &str = "You are not allowed to start screen share.";
pub const SERVER_DENIED_MESSAGE: &str = "You are not allowed to share screen";
pub const REQUEST_SENT_MESSAGE: &str = "Your request has been sent to the host.";
pub const REQUEST_PENDING_MESSAGE: &str =
    "A request is already pending. Please wait for the host to respond.";

/// Local share state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScreenShareState {
    #[default]
    Idle,
    Requesting,
    Active,
    Ending,
}

impl ScreenShareState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScreenShareState::Idle => "idle",
            ScreenShareState::Requesting => "requesting",
            ScreenShareState::Active => "active",
            ScreenShareState::Ending => "ending",
        }
    }
}

/// Result of the precondition and permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    Proceed,
    RequestApproval,
    AlreadyPending,
}

/// Check whether the local member may start sharing now.
///
/// # Errors
///
/// - `Conflict` when a share is in progress, a breakout session is active or
///   the whiteboard is open
/// - `AccessDenied` for audio-only rooms, host restrictions and a `disallow`
///   permission setting
pub fn check_start(state: &SessionState) -> Result<StartDecision, EngineError> {
    let current = state.screen().state;
    if current != ScreenShareState::Idle {
        debug!(target: "se.screenshare", state = current.as_str(), "Share already in progress");
        return Err(EngineError::Conflict(IN_PROGRESS_MESSAGE.to_string()));
    }

    let room = state.room();
    if room.audio_only {
        return Err(EngineError::AccessDenied(AUDIO_ONLY_MESSAGE.to_string()));
    }
    if room.screenshare_restricted {
        return Err(EngineError::AccessDenied(RESTRICTED_MESSAGE.to_string()));
    }
    if state.breakout().is_active() {
        return Err(EngineError::Conflict(BREAKOUT_MESSAGE.to_string()));
    }
    if room.whiteboard_active {
        return Err(EngineError::Conflict(WHITEBOARD_MESSAGE.to_string()));
    }

    if state.identity().is_host() {
        return Ok(StartDecision::Proceed);
    }
    match room.screenshare_permission {
        PermissionSetting::Allow => Ok(StartDecision::Proceed),
        PermissionSetting::Disallow => Err(EngineError::AccessDenied(DISALLOWED_MESSAGE.to_string())),
        PermissionSetting::Approval if state.screen().approved => Ok(StartDecision::Proceed),
        PermissionSetting::Approval if state.screen().request_pending => Ok(StartDecision::AlreadyPending),
        PermissionSetting::Approval => Ok(StartDecision::RequestApproval),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRequest {
    pub id: String,
    pub name: String,
    pub icon: &'static str,
}

/// `participantRequest` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRequest {
    pub user_request: UserRequest,
    pub room_name: String,
}

/// What the caller does next after [`Orchestrator::begin_screen_share`].
#[derive(Debug)]
pub enum ScreenSharePlan {
    /// Capture and produce. `transport` is the installed screen transport,
    /// if any.
    Proceed { transport: Option<Arc<dyn Transport>> },
    /// Waiting on the host; nothing else to do.
    AwaitingApproval,
}

/// Result of a full start attempt through the session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenShareOutcome {
    Started,
    ApprovalRequested,
}

impl Orchestrator {
    fn transition_screen_share(&mut self, next: ScreenShareState) {
        let previous = self.state.screen().state;
        self.state.set_screen_share_state(next);
        metrics::record_screen_share_transition(next.as_str());
        info!(
            target: "se.screenshare",
            from = previous.as_str(),
            to = next.as_str(),
            "Screen share state changed"
        );
    }

    /// Check preconditions and enter `Requesting`, or send a host-approval
    /// request.
    ///
    /// # Errors
    ///
    /// See [`check_start`]. The error is also shown as an alert.
    pub fn begin_screen_share(&mut self, requester_id: &str) -> Result<ScreenSharePlan, EngineError> {
        let decision = match check_start(&self.state) {
            Ok(decision) => decision,
            Err(e) => {
                debug!(target: "se.screenshare", error = %e, "Screen share refused");
                metrics::record_screen_share_transition("refused");
                self.alert_error(&e);
                return Err(e);
            }
        };

        match decision {
            StartDecision::Proceed => {
                self.transition_screen_share(ScreenShareState::Requesting);
                Ok(ScreenSharePlan::Proceed {
                    transport: self.send_transport(MediaKind::Screen),
                })
            }
            StartDecision::AlreadyPending => {
                self.alert(REQUEST_PENDING_MESSAGE, AlertSeverity::Info);
                Ok(ScreenSharePlan::AwaitingApproval)
            }
            StartDecision::RequestApproval => {
                let identity = self.state.identity();
                let request = ParticipantRequest {
                    user_request: UserRequest {
                        id: requester_id.to_string(),
                        name: identity.member.clone(),
                        icon: "fa-desktop",
                    },
                    room_name: identity.room_name.clone(),
                };
                self.outbox
                    .emit(events::PARTICIPANT_REQUEST, serde_json::to_value(&request)?);
                self.state.set_request_pending(true);
                self.alert(REQUEST_SENT_MESSAGE, AlertSeverity::Info);
                Ok(ScreenSharePlan::AwaitingApproval)
            }
        }
    }

    /// Commit a produced screen share and enter `Active`.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the share was abandoned while producing; the
    /// producer is closed and the capture stopped.
    pub fn complete_screen_share(
        &mut self,
        producer: Arc<dyn Producer>,
        capture: Arc<dyn MediaStream>,
    ) -> Result<(), EngineError> {
        if self.state.screen().state != ScreenShareState::Requesting {
            producer.close();
            capture.stop();
            return Err(EngineError::InvalidState(
                "screen share is no longer being requested".to_string(),
            ));
        }

        if let Err(e) = self.attach_producer(MediaKind::Screen, Arc::clone(&producer), Arc::clone(&capture)) {
            self.abort_screen_share(&e, Some(capture));
            return Err(e);
        }

        let member = self.state.identity().member.clone();
        self.state.apply_share_started(producer.id(), &member, true);
        self.state.apply_share_approval(false);
        self.state.set_force_full_display(true);
        self.state
            .apply_stream_added(Stream::local(producer.id(), member, MediaKind::Screen).with_media(&capture));
        self.transition_screen_share(ScreenShareState::Active);

        self.state.set_update_main_window(true);
        self.reorder_streams(false, true, &[]);
        self.state.set_update_main_window(false);
        Ok(())
    }

    /// Revert a failed start to `Idle`, stopping the capture if one exists.
    pub fn abort_screen_share(&mut self, error: &EngineError, capture: Option<Arc<dyn MediaStream>>) {
        warn!(target: "se.screenshare", error = %error, "Screen share start failed");
        if let Some(capture) = capture {
            capture.stop();
        }
        if let Some((producer, source)) = self.state.take_producer(MediaKind::Screen) {
            producer.close();
            if let Some(source) = source {
                source.stop();
            }
        }
        self.transition_screen_share(ScreenShareState::Idle);
        self.alert_error(error);
    }

    /// `Active -> Ending`: release the local share. Returns `false` (and does
    /// nothing) unless a share is active.
    pub fn begin_stop_screen_share(&mut self) -> bool {
        if self.state.screen().state != ScreenShareState::Active {
            debug!(target: "se.screenshare", "No active screen share to stop");
            return false;
        }
        self.transition_screen_share(ScreenShareState::Ending);

        if let Some((producer, source)) = self.state.take_producer(MediaKind::Screen) {
            producer.close();
            self.state.apply_stream_removed(producer.id());
            if let Some(source) = source {
                source.stop();
            }
        }
        if self.state.screen().annotate {
            debug!(target: "se.screenshare", "Annotation overlay off");
            self.state.set_annotation(false);
        }
        self.state.restore_force_full_display();
        self.state.apply_share_ended();
        true
    }

    /// `Ending -> Idle` with a screen-changed pass.
    pub fn finish_stop_screen_share(&mut self) {
        self.transition_screen_share(ScreenShareState::Idle);
        self.state.set_update_main_window(true);
        self.reorder_streams(false, true, &[]);
        self.state.set_update_main_window(false);
    }

    /// The host answered a share request.
    pub fn on_share_request_response(&mut self, approved: bool) {
        self.state.apply_share_approval(approved);
        if approved {
            self.alert("The host approved your screen share request.", AlertSeverity::Success);
        } else {
            self.alert("The host declined your screen share request.", AlertSeverity::Danger);
        }
    }
}
