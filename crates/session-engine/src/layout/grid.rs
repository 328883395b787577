//! Row/column estimation and grid validation.

use crate::model::{EventType, Stream};
use tracing::warn;

/// Read surface the grid estimate needs.
pub trait LayoutParams {
    fn item_page_limit(&self) -> usize;
    fn screen_page_limit(&self) -> usize;
    fn fixed_page_limit(&self) -> usize;
    fn strip_layout_limit(&self) -> usize;
    fn share_active(&self) -> bool;
    fn event_type(&self) -> EventType;
    fn is_wide_screen(&self) -> bool;

    /// Cell cap for the estimate.
    fn estimate_cap(&self) -> usize {
        if self.share_active() {
            self.screen_page_limit()
        } else {
            self.fixed_page_limit()
        }
    }

    /// Capacity of the primary overflow grid.
    fn main_grid_capacity(&self) -> usize {
        if self.share_active() {
            self.screen_page_limit()
        } else {
            self.item_page_limit()
        }
    }
}

/// Result of [`get_estimate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridEstimate {
    pub item_count: usize,
    pub rows: usize,
    pub cols: usize,
    /// Small counts collapse into one strip without an alternate grid.
    pub remove_alt_grid: bool,
}

/// Near-square grid for `n` items, wider than tall.
///
/// `rows * cols >= n` and the last row is never empty.
#[must_use]
pub fn calculate_rows_and_columns(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let mut cols = 1;
    while cols * cols < n {
        cols += 1;
    }
    let rows = n.div_ceil(cols);
    (rows, cols)
}

/// Exact near-square factorization of `cap`, `rows <= cols`.
fn factor_exactly(cap: usize) -> (usize, usize) {
    let mut rows = 1;
    let mut candidate = 1;
    while candidate * candidate <= cap {
        if cap % candidate == 0 {
            rows = candidate;
        }
        candidate += 1;
    }
    (rows, cap / rows.max(1))
}

/// Estimate the grid for `n` active streams.
#[must_use]
pub fn get_estimate(n: usize, params: &impl LayoutParams) -> GridEstimate {
    let cap = params.estimate_cap();
    if cap == 0 {
        warn!(target: "se.layout", n, "Grid estimate requested with a zero page limit");
        return GridEstimate {
            remove_alt_grid: true,
            ..GridEstimate::default()
        };
    }

    let m = n.min(cap);
    if m == 0 {
        return GridEstimate {
            remove_alt_grid: true,
            ..GridEstimate::default()
        };
    }

    if m < params.strip_layout_limit() {
        let no_main_screen = params.event_type() == EventType::Chat
            || (params.event_type() == EventType::Conference && !params.share_active());
        let horizontal = params.is_wide_screen() == no_main_screen;
        let (rows, cols) = if horizontal { (1, m) } else { (m, 1) };
        return GridEstimate {
            item_count: m,
            rows,
            cols,
            remove_alt_grid: true,
        };
    }

    let (mut rows, mut cols) = calculate_rows_and_columns(m);
    if rows * cols > cap {
        (rows, cols) = factor_exactly(cap);
    }

    GridEstimate {
        item_count: rows * cols,
        rows,
        cols,
        remove_alt_grid: false,
    }
}

/// Result of [`check_grid`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridCheck {
    pub rows: usize,
    pub cols: usize,
    /// Streams placed in this grid.
    pub num_to_add: usize,
    /// Rows actually occupied.
    pub actual_rows: usize,
    /// Columns used in the last occupied row.
    pub last_row_cols: usize,
    /// Streams left for the alternate grid.
    pub remaining: usize,
    pub remove_alt_grid: bool,
}

/// Validate a `rows x cols` grid against the active count.
#[must_use]
pub fn check_grid(rows: usize, cols: usize, actives: usize) -> GridCheck {
    let capacity = rows * cols;
    if capacity == 0 {
        return GridCheck {
            remaining: actives,
            remove_alt_grid: actives == 0,
            ..GridCheck::default()
        };
    }

    let num_to_add = actives.min(capacity);
    let actual_rows = num_to_add.div_ceil(cols);
    let last_row_cols = if num_to_add == 0 {
        0
    } else {
        num_to_add - (actual_rows - 1) * cols
    };

    GridCheck {
        rows,
        cols,
        num_to_add,
        actual_rows,
        last_row_cols,
        remaining: actives - num_to_add,
        remove_alt_grid: actives <= capacity,
    }
}

/// Visible page split into the primary and alternate overflow grids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSplit {
    pub estimate: GridEstimate,
    pub main_check: GridCheck,
    pub main: Vec<Stream>,
    pub alt: Vec<Stream>,
    pub alt_rows: usize,
    pub alt_cols: usize,
}

/// Split the visible streams between the primary grid (bounded by the page
/// limit) and the alternate grid.
#[must_use]
pub fn split_visible(visible: &[Stream], params: &impl LayoutParams) -> GridSplit {
    let estimate = get_estimate(visible.len(), params);
    let capacity = params.main_grid_capacity().max(1);
    let estimated_cells = estimate.rows * estimate.cols;
    let (rows, cols) = if estimated_cells >= visible.len() && estimated_cells <= capacity {
        (estimate.rows, estimate.cols)
    } else {
        calculate_rows_and_columns(visible.len().min(capacity))
    };
    let main_check = check_grid(rows, cols, visible.len());

    let (main, alt) = visible.split_at(main_check.num_to_add.min(visible.len()));
    let (alt_rows, alt_cols) = calculate_rows_and_columns(alt.len());

    GridSplit {
        estimate,
        main_check,
        main: main.to_vec(),
        alt: alt.to_vec(),
        alt_rows,
        alt_cols,
    }
}
