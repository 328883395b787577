//! Session actor mailbox monitoring.
//!
//! The handle records an enqueue before each send; the actor records the
//! dequeue once the command has been applied. Depth is exported as
//! `se_actor_mailbox_depth`.

use crate::observability::metrics;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Depth above which the mailbox is considered elevated.
pub const SESSION_MAILBOX_NORMAL: usize = 32;

/// Depth above which the mailbox is considered critical.
pub const SESSION_MAILBOX_WARNING: usize = 128;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Shared between a [`super::SessionHandle`] and its actor.
#[derive(Debug)]
pub struct MailboxMonitor {
    session_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// A command is about to be sent.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);
        metrics::set_actor_mailbox_depth(new_depth);

        match Self::level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "se.actor.mailbox",
                    session_id = %self.session_id,
                    depth = new_depth,
                    threshold = SESSION_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            // Log once when crossing into warning.
            MailboxLevel::Warning if new_depth == SESSION_MAILBOX_NORMAL + 1 => {
                debug!(
                    target: "se.actor.mailbox",
                    session_id = %self.session_id,
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// A command was applied, or its send failed.
    pub fn record_dequeue(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_sub(1)))
            .unwrap_or(0);
        metrics::set_actor_mailbox_depth(previous.saturating_sub(1));
    }

    /// A command finished processing.
    pub fn record_processed(&self) {
        self.record_dequeue();
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        Self::level_for_depth(self.current_depth())
    }

    fn level_for_depth(depth: usize) -> MailboxLevel {
        if depth > SESSION_MAILBOX_WARNING {
            MailboxLevel::Critical
        } else if depth > SESSION_MAILBOX_NORMAL {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_tracking() {
        let monitor = MailboxMonitor::new("session-1");
        monitor.record_enqueue();
        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 2);
        assert_eq!(monitor.peak_depth(), 2);

        monitor.record_processed();
        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 2);
        assert_eq!(monitor.messages_processed(), 1);

        monitor.record_dequeue();
        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 0, "depth never underflows");
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_levels() {
        let monitor = MailboxMonitor::new("session-1");
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);
        for _ in 0..=SESSION_MAILBOX_NORMAL {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Warning);
        for _ in 0..SESSION_MAILBOX_WARNING {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);
    }
}
