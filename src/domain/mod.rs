//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - numeric sentinels shared by the solver, criterion and traces
//! - optimizer selection and per-method options
//! - the model specification read from an initialization file

pub mod types;

pub use types::*;
