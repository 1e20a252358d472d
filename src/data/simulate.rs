//! Synthetic choice data from a solved grid.

use std::fs;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::debug::Diagnostics;
use crate::domain::ModelSpec;
use crate::fit::criterion::{CriterionError, criterion_on_solved};
use crate::fit::grid::{DecisionGrid, GridError, SolvedGrid, solve_grid};
use crate::io::ingest::{DataError, ObservedData, ObservedRow};
use crate::models::Preferences;
use crate::report::ReportError;

#[derive(Debug, Error)]
pub enum SimulateError {
    #[error("invalid choice probability {prob} at question {question}, m {m}")]
    InvalidProbability { question: u8, m: f64, prob: f64 },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Criterion(#[from] CriterionError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedRow {
    pub subject: String,
    pub question: u8,
    pub i1: f64,
    pub i2: f64,
    pub m: f64,
    pub choice: u8,
    pub eu_a: f64,
    pub eu_b: f64,
    pub prob_a: f64,
    pub prob_b: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedData {
    pub agents: usize,
    pub seed: u64,
    pub rows: Vec<SimulatedRow>,
}

impl SimulatedData {
    /// The columns the criterion and comparison report read.
    pub fn to_observed(&self) -> Result<ObservedData, DataError> {
        let rows = self
            .rows
            .iter()
            .map(|r| ObservedRow {
                subject: r.subject.clone(),
                question: r.question,
                m: r.m,
                choice: r.choice,
            })
            .collect();
        ObservedData::new(rows)
    }
}

/// Draw one choice per agent and grid row, agent-major.
pub fn simulate(solved: &SolvedGrid, agents: usize, seed: u64) -> Result<SimulatedData, SimulateError> {
    let draws = solved
        .rows()
        .iter()
        .map(|r| {
            Bernoulli::new(r.prob_a).map_err(|_| SimulateError::InvalidProbability {
                question: r.row.question,
                m: r.row.m,
                prob: r.prob_a,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(agents * solved.rows().len());
    for agent in 0..agents {
        let subject = agent.to_string();
        for (cell, draw) in solved.rows().iter().zip(&draws) {
            let chose_a = draw.sample(&mut rng);
            rows.push(SimulatedRow {
                subject: subject.clone(),
                question: cell.row.question,
                i1: cell.row.i1,
                i2: cell.row.i2,
                m: cell.row.m,
                choice: u8::from(chose_a),
                eu_a: cell.eu_a,
                eu_b: cell.eu_b,
                prob_a: cell.prob_a,
                prob_b: cell.prob_b,
            });
        }
    }

    Ok(SimulatedData { agents, seed, rows })
}

/// Output of a [`run_simulation`] call.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub data: SimulatedData,
    /// Criterion of the simulated sample at the generating parameters.
    pub criterion: Option<f64>,
    pub csv_path: PathBuf,
    pub info_path: PathBuf,
}

/// Simulate at the model's parameters and write `<file>.csv` and `<file>.info`
/// into `out_dir`.
pub fn run_simulation(spec: &ModelSpec, grid: &DecisionGrid, out_dir: &Path) -> Result<SimulationRun, SimulateError> {
    let prefs = Preferences::from_collection(&spec.paras);
    let mut diag = Diagnostics::new();
    let solved = solve_grid(grid, &prefs, &mut diag)?;
    let data = simulate(&solved, spec.simulation.agents, spec.simulation.seed)?;

    let observed = data.to_observed()?;
    let criterion = if observed.is_empty() {
        None
    } else {
        Some(criterion_on_solved(&observed, &solved)?)
    };
    diag.flush();

    fs::create_dir_all(out_dir).map_err(|source| ReportError::Io {
        path: out_dir.display().to_string(),
        source,
    })?;
    let csv_path = out_dir.join(format!("{}.csv", spec.simulation.file));
    let info_path = out_dir.join(format!("{}.info", spec.simulation.file));
    crate::io::export::write_simulated_csv(&csv_path, &data)?;
    let info = crate::report::format::format_simulation_info(spec, &observed, criterion);
    crate::io::export::write_text(&info_path, &info)?;

    tracing::info!(
        agents = spec.simulation.agents,
        seed = spec.simulation.seed,
        path = %csv_path.display(),
        "simulation written"
    );

    Ok(SimulationRun {
        data,
        criterion,
        csv_path,
        info_path,
    })
}
