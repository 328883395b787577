//! Stream ranking and the layout pass.
//!
//! [`rank_streams`] is pure. [`ReorderGate`] rate-limits ungated passes.
//! The orchestrator's layout pass re-pages the ranked list, sizes the grids,
//! publishes the result and runs the comparators.

use crate::layout::{readjust, split_visible, update_mini_cards_grid, LayoutParams, MiniGridRequest};
use crate::model::{DisplayType, EventType, GridSizes, MediaKind, Participant, Stream};
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;
use crate::pagination::{page_labels, paginate};
use crate::render::{CardSize, GridUpdate, PageInfo};
use crate::state::VisibleLayout;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Read surface for ranking.
pub trait RankingSource {
    fn roster(&self) -> &[Participant];
    fn local_member(&self) -> &str;
    fn ranking_event(&self) -> EventType;
    fn display_type(&self) -> DisplayType;
    fn sort_by_loudness(&self) -> bool;
    fn loudness_threshold(&self) -> f64;
    fn loudness_of(&self, name: &str) -> Option<f64>;
    /// Producer id of the active screen share, if any.
    fn shared_screen(&self) -> Option<&str>;
}

fn host_of(roster: &[Participant]) -> Option<&str> {
    roster.iter().find(|p| p.is_host()).map(|p| p.name.as_str())
}

/// Rank `streams` for display.
///
/// Order: host video, screen share, local self view, then the rest, with
/// loud unmuted speakers first when loudness sorting applies. Streams of
/// unknown participants are dropped (the local member is always known).
#[must_use]
pub fn rank_streams(streams: &[Stream], source: &impl RankingSource) -> Vec<Stream> {
    let roster = source.roster();
    let local = source.local_member();
    let participant = |name: &str| roster.iter().find(|p| p.name == name);

    let known: Vec<&Stream> = streams
        .iter()
        .filter(|s| s.owner == local || participant(&s.owner).is_some())
        .collect();
    let has_video = |owner: &str| {
        known
            .iter()
            .any(|s| s.owner == owner && s.kind == MediaKind::Video)
    };

    let displayable = known.iter().copied().filter(|s| match s.kind {
        MediaKind::Video | MediaKind::Screen => true,
        MediaKind::Audio => match source.display_type() {
            DisplayType::Video => false,
            DisplayType::Media => {
                !has_video(&s.owner) && participant(&s.owner).is_some_and(|p| !p.muted)
            }
            DisplayType::All => !has_video(&s.owner),
        },
    });

    let host = host_of(roster);
    let shared = source.shared_screen();
    let mut host_video = Vec::new();
    let mut screens = Vec::new();
    let mut self_view = Vec::new();
    let mut rest = Vec::new();
    for stream in displayable {
        if stream.kind == MediaKind::Video && host == Some(stream.owner.as_str()) && host_video.is_empty() {
            host_video.push(stream.clone());
        } else if stream.kind == MediaKind::Screen
            && shared.is_none_or(|id| id == stream.producer_id)
        {
            screens.push(stream.clone());
        } else if stream.is_local() && stream.kind == MediaKind::Video {
            self_view.push(stream.clone());
        } else {
            rest.push(stream.clone());
        }
    }

    let rank_by_loudness = source.sort_by_loudness()
        && !matches!(
            source.ranking_event(),
            EventType::Broadcast | EventType::Chat
        );
    if rank_by_loudness {
        rest = sort_by_loudness(rest, source);
    }

    let mut ranked = host_video;
    ranked.append(&mut screens);
    ranked.append(&mut self_view);
    ranked.append(&mut rest);
    ranked
}

/// Loud, unmuted speakers first (loudest first); everyone else keeps order.
fn sort_by_loudness(streams: Vec<Stream>, source: &impl RankingSource) -> Vec<Stream> {
    let threshold = source.loudness_threshold();
    let roster = source.roster();
    let (mut loud, quiet): (Vec<(Stream, f64)>, Vec<(Stream, f64)>) = streams
        .into_iter()
        .map(|s| {
            let level = source.loudness_of(&s.owner).unwrap_or(0.0);
            (s, level)
        })
        .partition(|(s, level)| {
            let muted = roster
                .iter()
                .find(|p| p.name == s.owner)
                .is_some_and(|p| p.muted);
            *level > threshold && !muted
        });
    loud.sort_by(|a, b| b.1.total_cmp(&a.1));
    loud.into_iter().chain(quiet).map(|(s, _)| s).collect()
}

/// Gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Run,
    Skip,
}

/// Time gate for ungated reorder requests.
#[derive(Debug, Default)]
pub struct ReorderGate {
    last_pass: Option<Instant>,
}

impl ReorderGate {
    /// Admit a pass. Additions and screen changes always run.
    pub fn admit(&mut self, now: Instant, bypass: bool, interval: Duration) -> GateDecision {
        let due = self
            .last_pass
            .is_none_or(|last| now.saturating_duration_since(last) >= interval);
        if bypass || due {
            self.last_pass = Some(now);
            GateDecision::Run
        } else {
            GateDecision::Skip
        }
    }

    #[must_use]
    pub fn last_pass(&self) -> Option<Instant> {
        self.last_pass
    }
}

/// Result of [`Orchestrator::reorder_streams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    Ran,
    Gated,
}

impl Orchestrator {
    /// Rank streams and publish the layout.
    ///
    /// `streams` replaces the known stream list for this pass; an empty
    /// slice ranks everything known. `add` and `screen_changed` bypass the
    /// time gate. Otherwise a pass runs at most once per reorder interval
    /// (the fast interval while a screen share is active).
    #[instrument(skip_all, name = "se.reorder.pass", fields(add = add, screen_changed = screen_changed))]
    pub fn reorder_streams(
        &mut self,
        add: bool,
        screen_changed: bool,
        streams: &[Stream],
    ) -> ReorderOutcome {
        let interval = if self.state.share_active() {
            self.config.fast_reorder_interval
        } else {
            self.config.reorder_interval
        };

        let decision = self
            .gate
            .admit(Instant::now(), add || screen_changed, interval);
        if decision == GateDecision::Skip {
            debug!(target: "se.reorder", "Reorder gated");
            metrics::record_reorder_pass("gated");
            return ReorderOutcome::Gated;
        }

        let source = if streams.is_empty() {
            self.state.streams()
        } else {
            streams
        };
        let ranked = rank_streams(source, &self.state);
        debug!(target: "se.reorder", ranked = ranked.len(), "Streams ranked");
        self.state.apply_ranked(ranked);
        metrics::record_reorder_pass("ran");
        self.publish_layout();
        ReorderOutcome::Ran
    }

    /// Re-page and render the current ranking without re-ranking.
    pub fn refresh_visible_page(&mut self) {
        self.publish_layout();
    }

    fn main_screen_candidate(&self) -> Option<Stream> {
        let ordered = self.state.ordered();
        if let Some(id) = self.state.shared_screen() {
            if let Some(stream) = ordered.iter().find(|s| s.producer_id == id) {
                return Some(stream.clone());
            }
        }
        if matches!(
            self.state.event_type(),
            EventType::Webinar | EventType::Broadcast
        ) {
            let host = self.state.host_name()?;
            return ordered
                .iter()
                .find(|s| s.kind == MediaKind::Video && s.owner == host)
                .cloned();
        }
        None
    }

    /// Page, split, size and publish the current ranking.
    pub(crate) fn publish_layout(&mut self) {
        let host = self.state.host_name().map(str::to_string);
        let limit = if self.state.share_active() {
            self.state.screen_page_limit()
        } else {
            self.state.item_page_limit()
        };
        let pages = paginate(
            self.state.ordered(),
            limit,
            self.state.breakout(),
            host.as_deref(),
        );
        self.state.apply_pages(pages);

        let visible = self
            .state
            .pages()
            .page(self.state.current_page())
            .to_vec();
        let main_screen = self.main_screen_candidate();
        let grid_streams: Vec<Stream> = visible
            .iter()
            .filter(|s| {
                main_screen
                    .as_ref()
                    .is_none_or(|m| m.producer_id != s.producer_id)
            })
            .cloned()
            .collect();
        let split = split_visible(&grid_streams, &self.state);

        let event_type = self.state.event_type();
        let share_active = self.state.share_active();
        let main_area_percent = if main_screen.is_some() {
            readjust(grid_streams.len(), event_type, share_active)
        } else {
            0
        };

        let layout = self.state.layout().clone();
        let total_pages = self.state.pages().len();
        let spacing = if event_type == EventType::Chat {
            0
        } else {
            self.config.card_spacing
        };
        let request = |rows, cols, default_grid| MiniGridRequest {
            rows,
            cols,
            default_grid,
            sizes: layout.component_sizes,
            spacing,
            min_cell: self.config.min_cell_size,
            pagination_extent: layout.pagination_extent,
            paginate: total_pages > 1,
            direction: layout.pagination_direction,
        };
        let main_rows = split.main_check.actual_rows;
        let main_cols = split.main_check.cols;
        let sizes = update_mini_cards_grid(GridSizes::default(), &request(main_rows, main_cols, true));
        let sizes = update_mini_cards_grid(sizes, &request(split.alt_rows, split.alt_cols, false));

        let mut active_names: Vec<String> = Vec::new();
        for stream in &visible {
            if !active_names.contains(&stream.owner) {
                active_names.push(stream.owner.clone());
            }
        }

        self.state.set_main_area_percent(main_area_percent);
        self.state.apply_grid_layout(
            sizes,
            (main_rows, main_cols),
            (split.alt_rows, split.alt_cols),
            split.main_check.remove_alt_grid,
        );

        let participants = self.state.participants();
        let lookup = |name: &str| participants.iter().find(|p| p.name == name);
        let threshold = self.config.loudness_threshold;
        let state = &self.state;
        let is_loud = |name: &str| {
            let muted = lookup(name).is_some_and(|p| p.muted);
            !muted && state.loudness(name).is_some_and(|level| level > threshold)
        };
        let main_size = CardSize {
            width: pixel_extent(layout.component_sizes.main_width),
            height: pixel_extent(layout.component_sizes.main_height),
        };
        let main_cards = self.cards.build_all(
            main_screen.as_slice(),
            lookup,
            is_loud,
            main_size,
        );
        let overflow = self.cards.build_all(
            &split.main,
            lookup,
            is_loud,
            CardSize {
                width: sizes.grid_width,
                height: sizes.grid_height,
            },
        );
        let alt_overflow = self.cards.build_all(
            &split.alt,
            lookup,
            is_loud,
            CardSize {
                width: sizes.alt_grid_width,
                height: sizes.alt_grid_height,
            },
        );

        let update = GridUpdate {
            main: main_cards,
            overflow,
            alt_overflow,
            grid_sizes: sizes,
            main_grid_rows: main_rows,
            main_grid_cols: main_cols,
            remove_alt_grid: split.main_check.remove_alt_grid,
            main_area_percent,
            page: PageInfo {
                current_page: self.state.current_page(),
                total_pages,
                labels: page_labels(self.state.pages()),
                show_pagination: total_pages > 1,
            },
        };

        self.state.apply_visible(VisibleLayout {
            visible,
            main_screen,
            main_grid: split.main,
            alt_grid: split.alt,
            active_names,
        });

        debug!(
            target: "se.reorder",
            page = update.page.current_page,
            total_pages,
            main = update.main.len(),
            overflow = update.overflow.len(),
            alt = update.alt_overflow.len(),
            "Publishing grid update"
        );
        self.render.publish(update);

        self.sync_consumer_visibility();
        self.run_comparators();
    }
}

/// Whole pixels for a layout extent; non-finite or negative is zero.
fn pixel_extent(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    // Bounded by the check above and the clamp.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pixels = value.floor().min(f64::from(u32::MAX)) as u32;
    pixels
}
