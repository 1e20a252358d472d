//! Data sources: the embedded decision-grid template and simulated samples.

pub mod simulate;

pub use simulate::*;

/// Default decision grid: nine questions, eight reallocation amounts each.
pub const EMBEDDED_GRID: &str = include_str!("grid.csv");
