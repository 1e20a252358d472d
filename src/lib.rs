//! `interalt` library crate.
//!
//! Structural estimation of an intertemporal altruism model: agents split
//! money between their own and another account across two dates and choose
//! between scenarios by a Luce rule. The binary (`interalt`) is a thin wrapper
//! around this library so that:
//!
//! - the simulate / estimate / criterion flows are testable without spawning processes
//! - the numerical core (`paras`, `models`, `fit`) stays free of CLI and file concerns

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod models;
pub mod paras;
pub mod report;
