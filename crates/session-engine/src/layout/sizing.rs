//! Pixel sizing for cards and the main/overflow area split.

use crate::model::{ComponentSizes, EventType, GridSizes};

/// Twelve-column split between the main slot and the overflow grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaSplit {
    pub main: u8,
    pub other: u8,
}

impl AreaSplit {
    const COLUMNS: u8 = 12;

    const fn with_other(other: u8) -> Self {
        Self {
            main: Self::COLUMNS - other,
            other,
        }
    }

    /// Main slot share in percent: `100 - floor(other / 12 * 100)`.
    #[must_use]
    pub fn main_percent(&self) -> u8 {
        let other_percent = u16::from(self.other) * 100 / u16::from(Self::COLUMNS);
        100u8.saturating_sub(u8::try_from(other_percent).unwrap_or(100))
    }
}

/// Split the view for `n` overflow streams.
#[must_use]
pub fn auto_adjust(n: usize, event_type: EventType, share_active: bool) -> AreaSplit {
    match event_type {
        EventType::Broadcast => return AreaSplit::with_other(0),
        EventType::Chat => return AreaSplit::with_other(12),
        EventType::Conference if !share_active => return AreaSplit::with_other(12),
        _ => {}
    }
    if share_active {
        return AreaSplit::with_other(2);
    }
    let other = match n {
        0 => 1,
        1..=3 => 4,
        4..=11 => 6,
        12..=49 => 8,
        _ => 10,
    };
    AreaSplit::with_other(other)
}

/// Main area percentage for the current event.
#[must_use]
pub fn readjust(n: usize, event_type: EventType, share_active: bool) -> u8 {
    auto_adjust(n, event_type, share_active).main_percent()
}

/// Where the page selector sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationDirection {
    /// Bar below the grid; takes height.
    #[default]
    Horizontal,
    /// Bar beside the grid; takes width.
    Vertical,
}

/// Inputs for [`update_mini_cards_grid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiniGridRequest {
    pub rows: usize,
    pub cols: usize,
    /// Update the primary grid pair (else the alternate pair).
    pub default_grid: bool,
    pub sizes: ComponentSizes,
    pub spacing: u32,
    pub min_cell: u32,
    /// Pagination bar extent, subtracted when `paginate` is set.
    pub pagination_extent: f64,
    pub paginate: bool,
    pub direction: PaginationDirection,
}

fn card_edge(extent: f64, count: usize, spacing: u32, min_cell: u32) -> u32 {
    if count == 0 || !extent.is_finite() || extent <= 0.0 {
        return 0;
    }
    // Counts are small (page limits), the cast is exact.
    #[allow(clippy::cast_precision_loss)]
    let count_f = count as f64;
    let gaps = (count_f - 1.0) * f64::from(spacing);
    let edge = ((extent - gaps) / count_f).floor();
    if !edge.is_finite() || edge <= 0.0 {
        return min_cell;
    }
    // Bounded above by the finite pixel extent.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let edge = edge.min(f64::from(u32::MAX)) as u32;
    edge.max(min_cell)
}

/// Recompute card sizes for one of the two overflow grids.
///
/// Degenerate inputs (no rows or columns, non-finite or non-positive area)
/// produce zero sizes, which hides the grid.
#[must_use]
pub fn update_mini_cards_grid(current: GridSizes, request: &MiniGridRequest) -> GridSizes {
    let mut width = request.sizes.other_width;
    let mut height = request.sizes.other_height;
    if request.paginate && request.pagination_extent.is_finite() {
        match request.direction {
            PaginationDirection::Horizontal => height -= request.pagination_extent,
            PaginationDirection::Vertical => width -= request.pagination_extent,
        }
    }

    let (card_width, card_height) = if request.rows == 0 || request.cols == 0 {
        (0, 0)
    } else {
        let w = card_edge(width, request.cols, request.spacing, request.min_cell);
        let h = card_edge(height, request.rows, request.spacing, request.min_cell);
        if w == 0 || h == 0 {
            (0, 0)
        } else {
            (w, h)
        }
    };

    if request.default_grid {
        GridSizes {
            grid_width: card_width,
            grid_height: card_height,
            ..current
        }
    } else {
        GridSizes {
            alt_grid_width: card_width,
            alt_grid_height: card_height,
            ..current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rows: usize, cols: usize, width: f64, height: f64) -> MiniGridRequest {
        MiniGridRequest {
            rows,
            cols,
            default_grid: true,
            sizes: ComponentSizes {
                main_width: 0.0,
                main_height: 0.0,
                other_width: width,
                other_height: height,
            },
            spacing: 3,
            min_cell: 16,
            pagination_extent: 40.0,
            paginate: false,
            direction: PaginationDirection::Horizontal,
        }
    }

    #[test]
    fn test_auto_adjust_event_rules() {
        assert_eq!(auto_adjust(5, EventType::Broadcast, false).other, 0);
        assert_eq!(auto_adjust(5, EventType::Chat, true).other, 12);
        assert_eq!(auto_adjust(5, EventType::Conference, false).other, 12);
        assert_eq!(auto_adjust(5, EventType::Conference, true).other, 2);
        assert_eq!(auto_adjust(30, EventType::Webinar, true).other, 2);
    }

    #[test]
    fn test_auto_adjust_by_count() {
        let other = |n| auto_adjust(n, EventType::Webinar, false).other;
        assert_eq!(other(0), 1);
        assert_eq!(other(1), 4);
        assert_eq!(other(3), 4);
        assert_eq!(other(4), 6);
        assert_eq!(other(11), 6);
        assert_eq!(other(12), 8);
        assert_eq!(other(49), 8);
        assert_eq!(other(50), 10);

        let split = auto_adjust(7, EventType::Webinar, false);
        assert_eq!(split.main + split.other, 12);
    }

    #[test]
    fn test_readjust_percentages() {
        assert_eq!(readjust(3, EventType::Broadcast, false), 100);
        assert_eq!(readjust(3, EventType::Chat, false), 0);
        // 2/12 = 16.67% overflow -> 84% main
        assert_eq!(readjust(3, EventType::Conference, true), 84);
        // 4/12 = 33.3% overflow -> 67% main
        assert_eq!(readjust(2, EventType::Webinar, false), 67);
        assert_eq!(readjust(0, EventType::Webinar, false), 92);
    }

    #[test]
    fn test_card_sizes_with_spacing() {
        let sizes = update_mini_cards_grid(GridSizes::default(), &request(2, 2, 403.0, 303.0));
        assert_eq!(sizes.grid_width, 200);
        assert_eq!(sizes.grid_height, 150);
        assert_eq!(sizes.alt_grid_width, 0);
    }

    #[test]
    fn test_alt_grid_pair_updated_when_not_default() {
        let current = GridSizes {
            grid_width: 10,
            grid_height: 10,
            ..GridSizes::default()
        };
        let mut req = request(1, 1, 300.0, 100.0);
        req.default_grid = false;

        let sizes = update_mini_cards_grid(current, &req);
        assert_eq!(sizes.grid_width, 10);
        assert_eq!(sizes.alt_grid_width, 300);
        assert_eq!(sizes.alt_grid_height, 100);
    }

    #[test]
    fn test_pagination_bar_reduces_area() {
        let mut req = request(1, 1, 300.0, 140.0);
        req.paginate = true;
        let sizes = update_mini_cards_grid(GridSizes::default(), &req);
        assert_eq!(sizes.grid_height, 100);

        req.direction = PaginationDirection::Vertical;
        let sizes = update_mini_cards_grid(GridSizes::default(), &req);
        assert_eq!(sizes.grid_width, 260);
        assert_eq!(sizes.grid_height, 140);
    }

    #[test]
    fn test_min_cell_floor() {
        let sizes = update_mini_cards_grid(GridSizes::default(), &request(4, 10, 50.0, 30.0));
        assert_eq!(sizes.grid_width, 16);
        assert_eq!(sizes.grid_height, 16);
    }

    #[test]
    fn test_degenerate_inputs_hide_grid() {
        let nan = update_mini_cards_grid(GridSizes::default(), &request(2, 2, f64::NAN, 100.0));
        assert_eq!(nan, GridSizes::default());

        let negative = update_mini_cards_grid(GridSizes::default(), &request(2, 2, -5.0, 100.0));
        assert_eq!(negative, GridSizes::default());

        let no_cols = update_mini_cards_grid(GridSizes::default(), &request(2, 0, 400.0, 300.0));
        assert_eq!(no_cols, GridSizes::default());

        let infinite = update_mini_cards_grid(GridSizes::default(), &request(1, 1, f64::INFINITY, 10.0));
        assert_eq!(infinite, GridSizes::default());
    }
}
