//! Reporting: observed vs. simulated choice shares and formatted output.
//!
//! Formatting lives in [`format`] so file writers and the terminal share one
//! layout.

pub mod format;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::fit::grid::CellKey;
use crate::io::ingest::ObservedData;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("observed and simulated data share no grid cells")]
    NoCommonCells,
}

/// `(chose A, total)` per grid cell.
pub fn cell_counts(data: &ObservedData) -> BTreeMap<CellKey, (usize, usize)> {
    let mut out = BTreeMap::new();
    for row in data.rows() {
        let entry = out.entry(row.key()).or_insert((0, 0));
        entry.0 += usize::from(row.chose_a());
        entry.1 += 1;
    }
    out
}

/// `(chose A, total)` per question.
pub fn question_counts(data: &ObservedData) -> BTreeMap<u8, (usize, usize)> {
    let mut out = BTreeMap::new();
    for row in data.rows() {
        let entry = out.entry(row.question).or_insert((0, 0));
        entry.0 += usize::from(row.chose_a());
        entry.1 += 1;
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellShare {
    pub question: u8,
    pub m: f64,
    pub observed: f64,
    pub simulated: f64,
    pub n_observed: usize,
    pub n_simulated: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceComparison {
    pub cells: Vec<CellShare>,
    pub rmse: f64,
}

/// Share of option A per cell present in both samples, plus the RMSE of the
/// differences.
pub fn compare_choice_shares(observed: &ObservedData, simulated: &ObservedData) -> Result<ChoiceComparison, ReportError> {
    let obs = cell_counts(observed);
    let sim = cell_counts(simulated);

    let cells: Vec<CellShare> = obs
        .iter()
        .filter_map(|(key, &(obs_a, obs_n))| {
            sim.get(key).map(|&(sim_a, sim_n)| CellShare {
                question: key.question,
                m: key.m(),
                observed: obs_a as f64 / obs_n as f64,
                simulated: sim_a as f64 / sim_n as f64,
                n_observed: obs_n,
                n_simulated: sim_n,
            })
        })
        .collect();

    if cells.is_empty() {
        return Err(ReportError::NoCommonCells);
    }
    let mse = cells.iter().map(|c| (c.observed - c.simulated).powi(2)).sum::<f64>() / cells.len() as f64;
    Ok(ChoiceComparison { cells, rmse: mse.sqrt() })
}
