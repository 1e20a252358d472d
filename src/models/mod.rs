//! Utility and choice-probability functions.
//!
//! Kept as small, pure functions so the grid solver and tests can call them
//! directly.

pub mod utility;

pub use utility::*;
