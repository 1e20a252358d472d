//! Structural estimation.
//!
//! Responsibilities:
//!
//! - solve the decision grid at candidate parameters (`grid`)
//! - score observed choices (`criterion`)
//! - count and record every evaluation under a budget (`tracker`)
//! - drive argmin solvers over the free parameters (`optimizer`)
//! - orchestrate a full estimation run (`estimate`)

pub mod criterion;
pub mod estimate;
pub mod grid;
pub mod optimizer;
pub mod tracker;

pub use criterion::*;
pub use estimate::*;
pub use grid::*;
pub use optimizer::*;
pub use tracker::*;

use thiserror::Error;

use crate::data::SimulateError;
use crate::domain::UnsupportedOptimizer;
use crate::io::ingest::DataError;
use crate::io::init_file::ConfigError;
use crate::paras::ParaError;
use crate::report::ReportError;

#[derive(Debug, Error)]
pub enum EstimationError {
    /// Raised across the optimizer boundary once the evaluation budget is used
    /// up; caught by [`optimizer::run_optimizer`].
    #[error("maximum number of criterion evaluations reached")]
    BudgetExhausted,
    #[error("estimation run already terminated")]
    AlreadyTerminated,
    #[error(transparent)]
    UnsupportedOptimizer(#[from] UnsupportedOptimizer),
    #[error("invalid optimizer setup: {0}")]
    OptimizerSetup(String),
    #[error(transparent)]
    Para(#[from] ParaError),
    #[error(transparent)]
    Criterion(#[from] CriterionError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Simulate(#[from] SimulateError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write estimation trace: {0}")]
    Trace(#[from] std::io::Error),
}
