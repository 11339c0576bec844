//! Common types shared across the chess-rechunk crates.

pub mod error;
pub mod grid;
pub mod time;

pub use error::{CommonError, CommonResult};
pub use grid::{cells_of, tile_bounds, tile_of, tiles_over, Cell, GridExtent, Resolution, TileId};
pub use time::{day_count, days_in_month, month_span, DateRange, MonthKey};
