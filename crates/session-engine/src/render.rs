//! Rendering and alert boundaries.
//!
//! The engine publishes grid component lists and page info through a
//! [`RenderSink`] and user-facing failures through an [`AlertSink`]. Card
//! construction is pluggable via [`CardStrategy`], resolved once per session.

use crate::errors::EngineError;
use crate::model::{GridSizes, Participant, Stream};
use crate::observability::metrics;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Default alert display time.
pub const DEFAULT_ALERT_DURATION_MS: u64 = 3000;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertSeverity {
    Success,
    Info,
    Warning,
    Danger,
}

impl AlertSeverity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Success => "success",
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Danger => "danger",
        }
    }
}

/// `showAlert(message, severity, durationMs)`.
pub trait AlertSink: Send + Sync {
    fn show_alert(&self, message: &str, severity: AlertSeverity, duration_ms: u64);
}

/// Card flavour chosen for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    /// Video or screen content.
    Video,
    /// Audio-only participant with a level meter.
    Audio,
    /// Participant with neither video nor audible loudness.
    Mini,
}

/// Pixel size handed to the card builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardSize {
    pub width: u32,
    pub height: u32,
}

/// One renderable card.
#[derive(Debug, Clone, PartialEq)]
pub struct GridComponent {
    pub producer_id: String,
    pub name: String,
    pub card: CardKind,
    pub muted: bool,
    pub size: CardSize,
}

/// Custom card construction.
pub trait CardBuilder: Send + Sync {
    /// Build the card for `stream`. An error skips this stream only.
    fn build(
        &self,
        stream: &Stream,
        participant: Option<&Participant>,
        size: CardSize,
    ) -> Result<GridComponent, EngineError>;
}

/// Card construction strategy, fixed at session construction.
#[derive(Clone, Default)]
pub enum CardStrategy {
    #[default]
    Default,
    Custom(Arc<dyn CardBuilder>),
}

impl fmt::Debug for CardStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardStrategy::Default => f.write_str("Default"),
            CardStrategy::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl CardStrategy {
    fn build_one(
        &self,
        stream: &Stream,
        participant: Option<&Participant>,
        loud: bool,
        size: CardSize,
    ) -> Result<GridComponent, EngineError> {
        match self {
            CardStrategy::Custom(builder) => builder.build(stream, participant, size),
            CardStrategy::Default => {
                let muted = participant.map_or(stream.muted, |p| p.muted);
                let video_on = participant.is_some_and(|p| p.video_on);
                let card = if stream.kind.is_visual() {
                    CardKind::Video
                } else if !video_on && !loud {
                    CardKind::Mini
                } else {
                    CardKind::Audio
                };
                Ok(GridComponent {
                    producer_id: stream.producer_id.clone(),
                    name: stream.owner.clone(),
                    card,
                    muted,
                    size,
                })
            }
        }
    }

    /// Build cards for a batch. A failing stream is logged and skipped.
    ///
    /// `is_loud` reports whether an owner's latest loudness sample is audible.
    pub fn build_all<'a, F, L>(
        &self,
        streams: &[Stream],
        lookup: F,
        is_loud: L,
        size: CardSize,
    ) -> Vec<GridComponent>
    where
        F: Fn(&str) -> Option<&'a Participant>,
        L: Fn(&str) -> bool,
    {
        streams
            .iter()
            .filter_map(|stream| {
                let loud = is_loud(&stream.owner);
                match self.build_one(stream, lookup(&stream.owner), loud, size) {
                    Ok(component) => Some(component),
                    Err(e) => {
                        warn!(
                            target: "se.reorder",
                            producer_id = %stream.producer_id,
                            error = %e,
                            "Card construction failed, skipping stream"
                        );
                        metrics::record_card_build_failure();
                        None
                    }
                }
            })
            .collect()
    }
}

/// Current page and page count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub current_page: usize,
    pub total_pages: usize,
    /// One label per page: main pages are numbered, breakout pages say "Room n".
    pub labels: Vec<String>,
    pub show_pagination: bool,
}

/// Everything the rendering layer needs after a layout pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridUpdate {
    /// Main-screen slot (screen share or featured host).
    pub main: Vec<GridComponent>,
    /// Primary overflow grid.
    pub overflow: Vec<GridComponent>,
    /// Alternate overflow grid holding the remainder.
    pub alt_overflow: Vec<GridComponent>,
    pub grid_sizes: GridSizes,
    pub main_grid_rows: usize,
    pub main_grid_cols: usize,
    pub remove_alt_grid: bool,
    /// Share of the view given to the main slot, in percent.
    pub main_area_percent: u8,
    pub page: PageInfo,
}

/// Receives layout updates.
pub trait RenderSink: Send + Sync {
    fn publish(&self, update: GridUpdate);
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{Level, MediaKind};

    struct RejectScreens;

    impl CardBuilder for RejectScreens {
        fn build(
            &self,
            stream: &Stream,
            _participant: Option<&Participant>,
            size: CardSize,
        ) -> Result<GridComponent, EngineError> {
            if stream.kind == MediaKind::Screen {
                return Err(EngineError::Internal("no screen cards".to_string()));
            }
            Ok(GridComponent {
                producer_id: stream.producer_id.clone(),
                name: format!("custom:{}", stream.owner),
                card: CardKind::Video,
                muted: false,
                size,
            })
        }
    }

    fn roster() -> Vec<Participant> {
        let mut alice = Participant::new("p1", "alice", Level::Attendee);
        alice.video_on = true;
        let mut muted = Participant::new("p2", "bob", Level::Attendee);
        muted.muted = true;
        let carol = Participant::new("p3", "carol", Level::Attendee);
        let dave = Participant::new("p4", "dave", Level::Attendee);
        vec![alice, muted, carol, dave]
    }

    #[test]
    fn test_default_strategy_picks_card_kind() {
        let people = roster();
        let streams = vec![
            Stream::remote("v-1", "alice", MediaKind::Video),
            Stream::remote("a-1", "alice", MediaKind::Audio),
            Stream::remote("a-2", "bob", MediaKind::Audio),
            Stream::remote("a-3", "carol", MediaKind::Audio),
            Stream::remote("a-4", "dave", MediaKind::Audio),
        ];

        let cards = CardStrategy::Default.build_all(
            &streams,
            |name| people.iter().find(|p| p.name == name),
            |name| name == "carol",
            CardSize { width: 100, height: 80 },
        );

        let kinds: Vec<CardKind> = cards.iter().map(|c| c.card).collect();
        assert_eq!(
            kinds,
            vec![
                CardKind::Video,
                CardKind::Audio,
                CardKind::Mini,
                CardKind::Audio,
                CardKind::Mini,
            ]
        );
        assert!(cards[2].muted);
        assert!(!cards[4].muted, "quiet but unmuted still gets a mini card");
        assert_eq!(cards[0].size.width, 100);
    }

    #[test]
    fn test_failing_card_is_skipped_not_fatal() {
        let people = roster();
        let streams = vec![
            Stream::remote("v-1", "alice", MediaKind::Video),
            Stream::remote("s-1", "bob", MediaKind::Screen),
            Stream::remote("v-2", "bob", MediaKind::Video),
        ];

        let strategy = CardStrategy::Custom(Arc::new(RejectScreens));
        let cards = strategy.build_all(
            &streams,
            |name| people.iter().find(|p| p.name == name),
            |_| false,
            CardSize::default(),
        );

        let ids: Vec<&str> = cards.iter().map(|c| c.producer_id.as_str()).collect();
        assert_eq!(ids, vec!["v-1", "v-2"]);
        assert_eq!(cards[1].name, "custom:bob");
    }

    #[test]
    fn test_strategy_debug_hides_builder() {
        assert_eq!(format!("{:?}", CardStrategy::Default), "Default");
        assert_eq!(
            format!("{:?}", CardStrategy::Custom(Arc::new(RejectScreens))),
            "Custom"
        );
    }
}
