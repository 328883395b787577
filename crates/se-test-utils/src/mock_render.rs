//! Recording render and alert sinks.

use session_engine::render::{AlertSeverity, AlertSink, GridUpdate, RenderSink};
use std::sync::Mutex;

/// One alert as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAlert {
    pub message: String,
    pub severity: AlertSeverity,
    pub duration_ms: u64,
}

/// Collects every alert.
#[derive(Debug, Default)]
pub struct MockAlerts {
    shown: Mutex<Vec<RecordedAlert>>,
}

impl MockAlerts {
    #[must_use]
    pub fn alerts(&self) -> Vec<RecordedAlert> {
        self.shown.lock().unwrap().clone()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.alerts().into_iter().map(|a| a.message).collect()
    }

    #[must_use]
    pub fn last(&self) -> Option<RecordedAlert> {
        self.shown.lock().unwrap().last().cloned()
    }

    #[must_use]
    pub fn contains(&self, message: &str) -> bool {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .any(|a| a.message == message)
    }
}

impl AlertSink for MockAlerts {
    fn show_alert(&self, message: &str, severity: AlertSeverity, duration_ms: u64) {
        self.shown.lock().unwrap().push(RecordedAlert {
            message: message.to_string(),
            severity,
            duration_ms,
        });
    }
}

/// Collects every grid update.
#[derive(Debug, Default)]
pub struct MockRender {
    updates: Mutex<Vec<GridUpdate>>,
}

impl MockRender {
    #[must_use]
    pub fn last(&self) -> Option<GridUpdate> {
        self.updates.lock().unwrap().last().cloned()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    /// Producer ids across the main slot and both overflow grids of the
    /// latest update.
    #[must_use]
    pub fn last_rendered_ids(&self) -> Vec<String> {
        self.last()
            .map(|u| {
                u.main
                    .iter()
                    .chain(u.overflow.iter())
                    .chain(u.alt_overflow.iter())
                    .map(|c| c.producer_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl RenderSink for MockRender {
    fn publish(&self, update: GridUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
