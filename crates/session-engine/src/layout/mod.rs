//! Grid layout calculator.
//!
//! Pure functions: row/column estimation, grid validation, card pixel sizing
//! and the main/overflow area split. The session state implements
//! [`LayoutParams`] so the orchestrator passes itself in directly.

pub mod grid;
pub mod sizing;

pub use grid::{
    calculate_rows_and_columns, check_grid, get_estimate, split_visible, GridCheck, GridEstimate,
    GridSplit, LayoutParams,
};
pub use sizing::{
    auto_adjust, readjust, update_mini_cards_grid, AreaSplit, MiniGridRequest,
    PaginationDirection,
};
