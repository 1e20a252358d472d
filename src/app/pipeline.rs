//! Shared run logic behind the subcommands.
//!
//! Each function loads its own init file and returns typed outputs so the
//! binary and the integration tests drive the same code; printing is left to
//! [`crate::app`].

use std::path::{Path, PathBuf};

use crate::data::{SimulationRun, run_simulation};
use crate::debug::Diagnostics;
use crate::domain::{ModelSpec, OptimizerKind};
use crate::error::AppError;
use crate::fit::criterion::criterion;
use crate::fit::estimate::{EstimationReport, estimate};
use crate::fit::grid::DecisionGrid;
use crate::io::ingest::load_estimation_sample;
use crate::io::init_file::read_init_file;
use crate::models::Preferences;

/// The embedded grid, or a template CSV when one is given.
pub fn load_grid(path: Option<&Path>) -> Result<DecisionGrid, AppError> {
    let grid = match path {
        Some(path) => DecisionGrid::from_path(path)?,
        None => DecisionGrid::embedded()?,
    };
    tracing::debug!(rows = grid.len(), custom = path.is_some(), "decision grid loaded");
    Ok(grid)
}

pub fn run_simulate(init: &Path, out_dir: &Path, grid: &DecisionGrid) -> Result<SimulationRun, AppError> {
    let spec = read_init_file(init)?;
    tracing::info!(
        agents = spec.simulation.agents,
        seed = spec.simulation.seed,
        file = %spec.simulation.file,
        "simulation started"
    );
    let run = run_simulation(&spec, grid, out_dir)?;
    tracing::info!(rows = run.data.rows.len(), path = %run.csv_path.display(), "simulation written");
    Ok(run)
}

/// CLI values that take precedence over the init file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateOverrides {
    pub optimizer: Option<OptimizerKind>,
    pub maxfun: Option<usize>,
}

impl EstimateOverrides {
    pub fn apply(&self, spec: &mut ModelSpec) -> Result<(), AppError> {
        if let Some(kind) = self.optimizer {
            spec.estimation.optimizer = kind;
        }
        if let Some(maxfun) = self.maxfun {
            spec.estimation.maxfun = maxfun;
        }
        spec.check_integrity()?;
        Ok(())
    }
}

pub fn run_estimate(
    init: &Path,
    out_dir: &Path,
    overrides: EstimateOverrides,
    grid: &DecisionGrid,
) -> Result<EstimationReport, AppError> {
    let mut spec = read_init_file(init)?;
    overrides.apply(&mut spec)?;
    Ok(estimate(&spec, grid, out_dir)?)
}

/// One criterion evaluation outside an estimation run.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionOutput {
    pub value: f64,
    pub data: PathBuf,
    pub subjects: usize,
    pub rows: usize,
}

pub fn run_criterion(
    init: &Path,
    data: Option<&Path>,
    agents: Option<usize>,
    grid: &DecisionGrid,
) -> Result<CriterionOutput, AppError> {
    let spec = read_init_file(init)?;
    let path = data.map(Path::to_path_buf).unwrap_or_else(|| spec.estimation.file.clone());
    let agents = agents.unwrap_or(spec.estimation.agents);

    let observed = load_estimation_sample(&path, agents)?;
    let prefs = Preferences::from_collection(&spec.paras);
    let mut diag = Diagnostics::new();
    let value = criterion(&observed, grid, &prefs, &mut diag)?;
    diag.flush();

    tracing::info!(criterion = value, rows = observed.len(), "criterion evaluated");
    Ok(CriterionOutput {
        value,
        data: path,
        subjects: observed.subjects().len(),
        rows: observed.len(),
    })
}
