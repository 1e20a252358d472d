//! Evaluation bookkeeping for one estimation run.
//!
//! Every criterion call made by an optimizer goes through
//! [`EvaluationTracker::evaluate`], which:
//!
//! - enforces the evaluation budget
//! - maps the free optimizer vector back to economic values
//! - records start/step/current values in an [`EvaluationTrace`]
//! - hands a snapshot to a [`TraceSink`] and drains the diagnostics

use serde::Serialize;

use crate::debug::{Diagnostics, Warning};
use crate::domain::{HUGE_FLOAT, MAXFUN_MESSAGE};
use crate::fit::EstimationError;
use crate::fit::criterion::criterion;
use crate::fit::grid::DecisionGrid;
use crate::io::ingest::ObservedData;
use crate::models::Preferences;
use crate::paras::{ParaLabel, ParameterCollection, Perspective, Scope};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationTrace {
    pub num_eval: usize,
    pub num_step: usize,
    pub f_start: f64,
    pub f_step: f64,
    pub f_current: f64,
    /// Economic values of all parameters, canonical order.
    pub x_start: Vec<f64>,
    pub x_step: Vec<f64>,
    pub x_current: Vec<f64>,
}

impl EvaluationTrace {
    pub fn new(num_paras: usize) -> Self {
        Self {
            num_eval: 0,
            num_step: 0,
            f_start: HUGE_FLOAT,
            f_step: HUGE_FLOAT,
            f_current: HUGE_FLOAT,
            x_start: vec![HUGE_FLOAT; num_paras],
            x_step: vec![HUGE_FLOAT; num_paras],
            x_current: vec![HUGE_FLOAT; num_paras],
        }
    }

    /// Returns whether the evaluation improved on every earlier one.
    fn update(&mut self, fval: f64, x_econ: Vec<f64>) -> bool {
        self.num_eval += 1;
        self.f_current = fval;
        if self.num_eval == 1 {
            self.f_start = fval;
            self.x_start = x_econ.clone();
        }
        let improved = fval < self.f_step;
        if improved {
            self.f_step = fval;
            self.x_step = x_econ.clone();
            self.num_step += 1;
        }
        self.x_current = x_econ;
        improved
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvalOutcome {
    Continue(f64),
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizerOutcome {
    pub success: bool,
    pub message: String,
}

impl OptimizerOutcome {
    pub fn budget_exhausted() -> Self {
        Self {
            success: false,
            message: MAXFUN_MESSAGE.to_string(),
        }
    }
}

/// What a sink sees after each evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub trace: &'a EvaluationTrace,
    pub labels: &'a [ParaLabel],
    /// Optimizer-space values of all parameters at the current point.
    pub optimizer_values: &'a [f64],
    pub warnings: &'a [Warning],
}

pub trait TraceSink {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> std::io::Result<()>;

    fn finish(
        &mut self,
        trace: &EvaluationTrace,
        labels: &[ParaLabel],
        outcome: &OptimizerOutcome,
    ) -> std::io::Result<()>;
}

impl<S: TraceSink + ?Sized> TraceSink for &mut S {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> std::io::Result<()> {
        (**self).record(snapshot)
    }

    fn finish(
        &mut self,
        trace: &EvaluationTrace,
        labels: &[ParaLabel],
        outcome: &OptimizerOutcome,
    ) -> std::io::Result<()> {
        (**self).finish(trace, labels, outcome)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&mut self, _snapshot: &Snapshot<'_>) -> std::io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, _: &EvaluationTrace, _: &[ParaLabel], _: &OptimizerOutcome) -> std::io::Result<()> {
        Ok(())
    }
}

/// Keeps the criterion history and flushed warnings in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub criteria: Vec<f64>,
    pub warnings: Vec<Warning>,
    pub outcome: Option<OptimizerOutcome>,
}

impl TraceSink for MemorySink {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> std::io::Result<()> {
        self.criteria.push(snapshot.trace.f_current);
        self.warnings.extend_from_slice(snapshot.warnings);
        Ok(())
    }

    fn finish(&mut self, _: &EvaluationTrace, _: &[ParaLabel], outcome: &OptimizerOutcome) -> std::io::Result<()> {
        self.outcome = Some(outcome.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Evaluating,
    Terminated,
}

pub struct EvaluationTracker<'a, S: TraceSink> {
    observed: &'a ObservedData,
    grid: &'a DecisionGrid,
    base: ParameterCollection,
    labels: Vec<ParaLabel>,
    max_eval: usize,
    trace: EvaluationTrace,
    diagnostics: Diagnostics,
    sink: S,
    state: TrackerState,
}

impl<'a, S: TraceSink> EvaluationTracker<'a, S> {
    /// `max_eval <= 1` disables the budget check.
    pub fn new(
        observed: &'a ObservedData,
        grid: &'a DecisionGrid,
        base: ParameterCollection,
        max_eval: usize,
        sink: S,
    ) -> Self {
        let labels = base.labels(Scope::All);
        Self {
            observed,
            grid,
            trace: EvaluationTrace::new(labels.len()),
            labels,
            base,
            max_eval,
            diagnostics: Diagnostics::new(),
            sink,
            state: TrackerState::Uninitialized,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn trace(&self) -> &EvaluationTrace {
        &self.trace
    }

    pub fn labels(&self) -> &[ParaLabel] {
        &self.labels
    }

    pub fn base(&self) -> &ParameterCollection {
        &self.base
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Warnings raised outside `evaluate`, e.g. while computing the start
    /// vector, land in the next evaluation's log entry.
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn budget_exhausted(&self) -> bool {
        self.max_eval > 1 && self.trace.num_eval >= self.max_eval
    }

    /// Evaluate the criterion at the free optimizer-space vector `x`.
    pub fn evaluate(&mut self, x: &[f64]) -> Result<EvalOutcome, EstimationError> {
        if self.state == TrackerState::Terminated {
            return Err(EstimationError::AlreadyTerminated);
        }
        if self.budget_exhausted() {
            tracing::debug!(num_eval = self.trace.num_eval, "evaluation budget exhausted");
            return Ok(EvalOutcome::BudgetExhausted);
        }
        self.state = TrackerState::Evaluating;

        let candidate = self.base.derive(Perspective::Optimizer, Scope::Free, x)?;
        let prefs = Preferences::from_collection(&candidate);
        let fval = criterion(self.observed, self.grid, &prefs, &mut self.diagnostics)?;

        let econ = candidate.get_values(Perspective::Economic, Scope::All, &mut self.diagnostics);
        // Nudges on fixed parameters are not reported.
        let mut fixed_diag = Diagnostics::new();
        let optim: Vec<f64> = candidate
            .iter()
            .map(|p| {
                let diag = if p.is_fixed() { &mut fixed_diag } else { &mut self.diagnostics };
                p.optimizer_value(diag)
            })
            .collect();
        let improved = self.trace.update(fval, econ);

        tracing::debug!(
            num_eval = self.trace.num_eval,
            num_step = self.trace.num_step,
            criterion = fval,
            improved,
            "criterion evaluated"
        );

        let warnings = self.diagnostics.flush();
        self.sink.record(&Snapshot {
            trace: &self.trace,
            labels: &self.labels,
            optimizer_values: &optim,
            warnings: &warnings,
        })?;

        Ok(EvalOutcome::Continue(fval))
    }

    /// Record the optimizer's verdict and close the run.
    pub fn finish(&mut self, outcome: &OptimizerOutcome) -> Result<(), EstimationError> {
        if self.state == TrackerState::Terminated {
            return Err(EstimationError::AlreadyTerminated);
        }
        self.sink.finish(&self.trace, &self.labels, outcome)?;
        self.state = TrackerState::Terminated;
        Ok(())
    }

    /// Parameters at the best evaluation so far, or the base if none ran.
    pub fn best_parameters(&self) -> Result<ParameterCollection, EstimationError> {
        if self.trace.num_eval == 0 {
            return Ok(self.base.clone());
        }
        Ok(self.base.derive(Perspective::Economic, Scope::All, &self.trace.x_step)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::simulate;
    use crate::fit::grid::solve_grid;
    use crate::paras::Parameter;
    use approx::assert_relative_eq;

    fn fixture() -> (DecisionGrid, ObservedData, ParameterCollection) {
        let grid = DecisionGrid::embedded().unwrap();
        let mut diag = Diagnostics::new();
        let solved = solve_grid(&grid, &Preferences::new(0.1, 0.0, 1.0, 1.0), &mut diag).unwrap();
        let observed = simulate(&solved, 5, 1423).unwrap().to_observed().unwrap();
        let paras = ParameterCollection::new(vec![
            Parameter::with_default_bounds(ParaLabel::R, 0.2, false).unwrap(),
            Parameter::with_default_bounds(ParaLabel::Eta, 0.1, false).unwrap(),
            Parameter::with_default_bounds(ParaLabel::B, 1.0, true).unwrap(),
            Parameter::with_default_bounds(ParaLabel::Nu, 2.0, false).unwrap(),
        ])
        .unwrap();
        (grid, observed, paras)
    }

    #[test]
    fn fourth_call_signals_budget_with_max_three() {
        let (grid, observed, paras) = fixture();
        let mut tracker = EvaluationTracker::new(&observed, &grid, paras, 3, MemorySink::default());
        for x in [[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [0.0, 0.1, 0.0]] {
            assert!(matches!(tracker.evaluate(&x).unwrap(), EvalOutcome::Continue(_)));
        }
        assert_eq!(tracker.evaluate(&[0.0, 0.0, 0.1]).unwrap(), EvalOutcome::BudgetExhausted);
        assert_eq!(tracker.trace().num_eval, 3);
        assert_eq!(tracker.sink().criteria.len(), 3);
    }

    #[test]
    fn budget_of_one_or_zero_is_unlimited() {
        let (grid, observed, paras) = fixture();
        let mut tracker = EvaluationTracker::new(&observed, &grid, paras, 1, NullSink);
        for _ in 0..4 {
            assert!(matches!(tracker.evaluate(&[0.0, 0.0, 0.0]).unwrap(), EvalOutcome::Continue(_)));
        }
        assert_eq!(tracker.trace().num_eval, 4);
    }

    #[test]
    fn trace_records_start_and_strict_improvements() {
        let (grid, observed, paras) = fixture();
        let mut diag = Diagnostics::new();
        let start = paras.get_values(Perspective::Optimizer, Scope::Free, &mut diag);
        let mut tracker = EvaluationTracker::new(&observed, &grid, paras.clone(), 0, MemorySink::default());

        let f0 = match tracker.evaluate(&start).unwrap() {
            EvalOutcome::Continue(f) => f,
            EvalOutcome::BudgetExhausted => unreachable!(),
        };
        assert_eq!(tracker.trace().f_start, f0);
        assert_eq!(tracker.trace().num_step, 1);
        for (got, want) in tracker.trace().x_start.iter().zip([0.2, 0.1, 1.0, 2.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }

        // Same point again: no strict improvement.
        tracker.evaluate(&start).unwrap();
        assert_eq!(tracker.trace().num_step, 1);
        assert_eq!(tracker.trace().num_eval, 2);

        let mut best = f0;
        for x in [[0.0, 0.0, -1.0], [0.0, 0.0, -2.0], [0.5, 0.0, 0.0]] {
            if let EvalOutcome::Continue(f) = tracker.evaluate(&x).unwrap() {
                best = best.min(f);
            }
        }
        assert_eq!(tracker.trace().f_step, best);
        assert!(tracker.trace().f_step <= tracker.trace().f_start);
        let best_paras = tracker.best_parameters().unwrap();
        assert_eq!(best_paras.value(ParaLabel::B), 1.0);
    }

    #[test]
    fn finish_closes_the_run() {
        let (grid, observed, paras) = fixture();
        let mut sink = MemorySink::default();
        let mut tracker = EvaluationTracker::new(&observed, &grid, paras, 0, &mut sink);
        tracker.evaluate(&[0.0, 0.0, 0.0]).unwrap();
        tracker.finish(&OptimizerOutcome::budget_exhausted()).unwrap();
        assert_eq!(tracker.state(), TrackerState::Terminated);
        assert!(matches!(tracker.evaluate(&[0.0, 0.0, 0.0]), Err(EstimationError::AlreadyTerminated)));
        drop(tracker);
        assert_eq!(sink.outcome.unwrap().message, MAXFUN_MESSAGE);
    }

    #[test]
    fn fixed_parameter_on_its_bound_does_not_warn() {
        let (grid, observed, _) = fixture();
        let paras = ParameterCollection::new(vec![
            Parameter::with_default_bounds(ParaLabel::R, 0.2, false).unwrap(),
            Parameter::with_default_bounds(ParaLabel::Eta, 0.1, false).unwrap(),
            Parameter::with_default_bounds(ParaLabel::B, 0.0, true).unwrap(),
            Parameter::with_default_bounds(ParaLabel::Nu, 2.0, false).unwrap(),
        ])
        .unwrap();
        let mut tracker = EvaluationTracker::new(&observed, &grid, paras, 0, MemorySink::default());
        for _ in 0..3 {
            tracker.evaluate(&[0.0, 0.0, 0.0]).unwrap();
        }
        assert!(!tracker.sink().warnings.contains(&Warning::BoundAdjustment));
        assert_eq!(tracker.trace().x_current[ParaLabel::B.index()], 0.0);
    }

    #[test]
    fn wrong_length_vector_is_an_error() {
        let (grid, observed, paras) = fixture();
        let mut tracker = EvaluationTracker::new(&observed, &grid, paras, 0, NullSink);
        assert!(matches!(tracker.evaluate(&[0.0]), Err(EstimationError::Para(_))));
        assert_eq!(tracker.trace().num_eval, 0);
    }
}
