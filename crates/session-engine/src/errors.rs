//! Session engine error types.
//!
//! Errors are converted to results at operation boundaries. Those that reach
//! the user are surfaced through the alert boundary using [`EngineError::alert_message`];
//! internal details stay in the logs.

use crate::render::AlertSeverity;
use std::time::Duration;
use thiserror::Error;

/// Session engine error type.
///
/// Alert mapping:
/// - `AccessDenied`, `Conflict`, `Timeout`: shown with their own text
/// - `Transport`, `Signaling`: generic connection text, `Danger`
/// - `Consistency`: never shown, logged as a warning and absorbed
/// - `InvalidState`, `InvalidRequest`, `Internal`: generic text
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Transport creation, connect or produce failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A network round-trip exceeded its deadline.
    #[error("Timed out after {timeout:?}: {operation}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Breakout navigation or screen-share permission rejected.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Inconsistent input that is logged and absorbed (unknown producer id,
    /// degenerate grid input).
    #[error("Consistency warning: {0}")]
    Consistency(String),

    /// Signaling channel unavailable or request rejected by the server.
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Screen-share preconditions violated (already sharing, whiteboard, breakout).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation issued in the wrong lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Request with out-of-range arguments (e.g. unknown page).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error with context (actor channel closed, builder failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Build a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        EngineError::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Severity used when the error is shown through the alert boundary.
    #[must_use]
    pub fn severity(&self) -> AlertSeverity {
        match self {
            EngineError::Consistency(_) => AlertSeverity::Info,
            EngineError::Timeout { .. } | EngineError::InvalidRequest(_) => AlertSeverity::Warning,
            EngineError::Transport(_)
            | EngineError::AccessDenied(_)
            | EngineError::Signaling(_)
            | EngineError::Conflict(_)
            | EngineError::InvalidState(_)
            | EngineError::Internal(_) => AlertSeverity::Danger,
        }
    }

    /// Returns a user-facing message.
    ///
    /// Access and conflict messages are written for the user already;
    /// everything else is replaced with generic text.
    #[must_use]
    pub fn alert_message(&self) -> String {
        match self {
            EngineError::AccessDenied(msg) | EngineError::Conflict(msg) => msg.clone(),
            EngineError::Timeout { .. } => {
                "The server took too long to respond. Please try again.".to_string()
            }
            EngineError::Transport(_) | EngineError::Signaling(_) => {
                "Connection problem while setting up media. Please try again.".to_string()
            }
            EngineError::InvalidRequest(_) => "That page is not available.".to_string(),
            EngineError::Consistency(_) | EngineError::InvalidState(_) | EngineError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    /// Whether the caller may retry the operation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::Transport(_) | EngineError::Timeout { .. } | EngineError::Signaling(_)
        )
    }

    /// Whether the error must reach the alert boundary.
    ///
    /// Consistency warnings are logged and absorbed.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, EngineError::Consistency(_))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Signaling(format!("malformed payload: {err}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let err = EngineError::Transport("produce failed".to_string());
        assert_eq!(format!("{err}"), "Transport error: produce failed");

        let err = EngineError::timeout("consumer-resume", Duration::from_secs(10));
        assert_eq!(format!("{err}"), "Timed out after 10s: consumer-resume");

        let err = EngineError::AccessDenied("You are not part of the breakout room 2.".to_string());
        assert_eq!(
            format!("{err}"),
            "Access denied: You are not part of the breakout room 2."
        );
    }

    #[test]
    fn test_alert_message_passes_user_text_through() {
        let err = EngineError::AccessDenied("You are not part of the breakout room 3.".to_string());
        assert_eq!(err.alert_message(), "You are not part of the breakout room 3.");

        let err = EngineError::Conflict("Screen share is not allowed when whiteboard is active".to_string());
        assert_eq!(
            err.alert_message(),
            "Screen share is not allowed when whiteboard is active"
        );
    }

    #[test]
    fn test_alert_message_hides_internal_details() {
        let err = EngineError::Transport("dtls handshake failed at 10.0.0.7".to_string());
        assert!(!err.alert_message().contains("10.0.0.7"));

        let err = EngineError::Internal("channel send failed".to_string());
        assert_eq!(err.alert_message(), "An internal error occurred");
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            EngineError::AccessDenied(String::new()).severity(),
            AlertSeverity::Danger
        );
        assert_eq!(
            EngineError::timeout("x", Duration::from_millis(1)).severity(),
            AlertSeverity::Warning
        );
        assert_eq!(
            EngineError::Consistency(String::new()).severity(),
            AlertSeverity::Info
        );
    }

    #[test]
    fn test_recoverable_and_visibility() {
        assert!(EngineError::Transport(String::new()).is_recoverable());
        assert!(EngineError::timeout("x", Duration::from_secs(1)).is_recoverable());
        assert!(!EngineError::AccessDenied(String::new()).is_recoverable());

        assert!(!EngineError::Consistency(String::new()).is_user_visible());
        assert!(EngineError::Conflict(String::new()).is_user_visible());
    }

    #[test]
    fn test_from_serde_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: EngineError = parse_err.into();
        assert!(matches!(err, EngineError::Signaling(_)));
    }
}
