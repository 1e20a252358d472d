//! A complete estimation run.
//!
//! [`estimate_with_sink`] is the core loop (start evaluation, optimizer, finish)
//! and works against any [`TraceSink`]. [`estimate`] wraps it with everything a
//! run on disk needs: loading the sample, `est.info`/`est.log`, the optional
//! start/stop simulations and `est.result.json`.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::data::run_simulation;
use crate::debug::Diagnostics;
use crate::domain::{ModelSpec, OptimizerKind};
use crate::fit::EstimationError;
use crate::fit::grid::DecisionGrid;
use crate::fit::optimizer::run_optimizer;
use crate::fit::tracker::{EvaluationTracker, OptimizerOutcome, TraceSink};
use crate::io::ingest::{ObservedData, load_estimation_sample};
use crate::io::trace_files::FileTraceSink;
use crate::paras::{ParaLabel, ParameterCollection, Perspective, Scope};
use crate::report::{ChoiceComparison, ReportError, compare_choice_shares};

#[derive(Debug, Clone, Serialize)]
pub struct EstimationResult {
    pub optimizer: OptimizerKind,
    pub f_start: f64,
    pub f_step: f64,
    pub labels: Vec<ParaLabel>,
    /// Economic values at the best evaluation, canonical order.
    pub x_step: Vec<f64>,
    pub success: bool,
    pub message: String,
    pub num_eval: usize,
    pub num_step: usize,
    #[serde(skip)]
    pub best: ParameterCollection,
}

/// Evaluate the start point, search, and close the trace.
pub fn estimate_with_sink<S: TraceSink>(
    spec: &ModelSpec,
    observed: &ObservedData,
    grid: &DecisionGrid,
    sink: S,
) -> Result<(EstimationResult, S), EstimationError> {
    let est = &spec.estimation;
    let mut diag = Diagnostics::new();
    let x_start = spec.paras.get_values(Perspective::Optimizer, Scope::Free, &mut diag);

    let tracker = RefCell::new(EvaluationTracker::new(observed, grid, spec.paras.clone(), est.maxfun, sink));
    tracker.borrow_mut().diagnostics_mut().absorb(diag);

    tracing::info!(
        optimizer = %est.optimizer,
        maxfun = est.maxfun,
        free = x_start.len(),
        rows = observed.len(),
        "estimation started"
    );
    tracker.borrow_mut().evaluate(&x_start)?;

    let mut outcome = OptimizerOutcome::budget_exhausted();
    if est.maxfun > 1 {
        outcome = if x_start.is_empty() {
            OptimizerOutcome {
                success: true,
                message: "No free parameters, start point is the estimate.".to_string(),
            }
        } else {
            run_optimizer(&tracker, x_start, est.optimizer, &spec.optimizer_options)?
        };
    }

    let mut tracker = tracker.into_inner();
    tracker.finish(&outcome)?;
    let best = tracker.best_parameters()?;
    let trace = tracker.trace();

    tracing::info!(
        criterion = trace.f_step,
        num_eval = trace.num_eval,
        num_step = trace.num_step,
        success = outcome.success,
        "estimation finished"
    );

    let result = EstimationResult {
        optimizer: est.optimizer,
        f_start: trace.f_start,
        f_step: trace.f_step,
        labels: tracker.labels().to_vec(),
        x_step: trace.x_step.clone(),
        success: outcome.success,
        message: outcome.message,
        num_eval: trace.num_eval,
        num_step: trace.num_step,
        best,
    };
    Ok((result, tracker.into_sink()))
}

/// Files and reports produced by [`estimate`].
#[derive(Debug, Clone)]
pub struct EstimationReport {
    pub result: EstimationResult,
    /// Observed vs. simulated shares at the estimate, for detailed runs.
    pub comparison: Option<ChoiceComparison>,
    pub info_path: PathBuf,
    pub log_path: PathBuf,
    pub result_path: PathBuf,
}

pub fn estimate(spec: &ModelSpec, grid: &DecisionGrid, out_dir: &Path) -> Result<EstimationReport, EstimationError> {
    let observed = load_estimation_sample(&spec.estimation.file, spec.estimation.agents)?;
    create_dir(out_dir)?;

    if spec.estimation.detailed {
        simulate_candidate("start", spec, &spec.paras, grid, out_dir, &observed)?;
    }

    let sink = FileTraceSink::create(out_dir)?;
    let info_path = sink.info_path().to_path_buf();
    let log_path = sink.log_path().to_path_buf();
    let (result, _) = estimate_with_sink(spec, &observed, grid, sink)?;

    let comparison = if spec.estimation.detailed {
        let cmp = simulate_candidate("stop", spec, &result.best, grid, out_dir, &observed)?;
        let report = out_dir.join("stop").join("compare.info");
        fs::copy(&report, out_dir.join("compare.info")).map_err(|source| ReportError::Io {
            path: report.display().to_string(),
            source,
        })?;
        Some(cmp)
    } else {
        None
    };

    let result_path = out_dir.join("est.result.json");
    crate::io::export::write_estimation_json(&result_path, &result)?;

    Ok(EstimationReport {
        result,
        comparison,
        info_path,
        log_path,
        result_path,
    })
}

/// Simulate at `paras` into `out_dir/<name>/` and compare with `observed`.
fn simulate_candidate(
    name: &str,
    spec: &ModelSpec,
    paras: &ParameterCollection,
    grid: &DecisionGrid,
    out_dir: &Path,
    observed: &ObservedData,
) -> Result<ChoiceComparison, EstimationError> {
    let dir = out_dir.join(name);
    if dir.exists() {
        fs::remove_dir_all(&dir).map_err(|source| ReportError::Io {
            path: dir.display().to_string(),
            source,
        })?;
    }
    create_dir(&dir)?;

    let candidate = spec.with_parameters(paras.clone()).with_simulation_file("data");
    crate::io::init_file::write_init_file(&candidate, &dir.join("model.ini"))?;
    let run = run_simulation(&candidate, grid, &dir)?;

    let simulated = run.data.to_observed()?;
    let comparison = compare_choice_shares(observed, &simulated)?;
    let text = crate::report::format::format_comparison(&comparison);
    crate::io::export::write_text(&dir.join("compare.info"), &text)?;

    tracing::info!(candidate = name, rmse = comparison.rmse, "candidate simulation compared");
    Ok(comparison)
}

fn create_dir(dir: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.display().to_string(),
        source,
    })
}
