//! argmin solvers over the free parameters in optimizer space.
//!
//! The problem adapter borrows the tracker through a `RefCell`, so the trace
//! survives whatever way the executor returns. argmin has no early-stop hook,
//! and L-BFGS folds line-search errors into an ordinary `SolverExit`. The first
//! error raised by an evaluation (budget exhaustion included) is therefore
//! parked in a side slot, every later `cost` call fails immediately, and
//! [`run_optimizer`] inspects the slot before it looks at the executor result.

use std::cell::RefCell;

use argmin::core::{
    CostFunction, Error as ArgminError, Executor, Gradient, State, TerminationReason, TerminationStatus,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;

use crate::domain::{LbfgsOptions, NelderMeadOptions, OptimizerKind, OptimizerOptions};
use crate::fit::EstimationError;
use crate::fit::tracker::{EvalOutcome, EvaluationTracker, OptimizerOutcome, TraceSink};

/// Correction pairs kept by L-BFGS.
pub const LBFGS_MEMORY: usize = 7;

/// The evaluation budget is what normally stops a run.
const MAX_ITERS: u64 = 100_000;

/// First error raised inside the solver loop.
type Interrupt = RefCell<Option<EstimationError>>;

struct CriterionProblem<'t, 'a, S: TraceSink> {
    tracker: &'t RefCell<EvaluationTracker<'a, S>>,
    interrupt: &'t Interrupt,
    eps: f64,
    /// Last point passed to `cost`, reused by `gradient`.
    last: RefCell<Option<(Vec<f64>, f64)>>,
}

impl<'t, 'a, S: TraceSink> CriterionProblem<'t, 'a, S> {
    fn new(tracker: &'t RefCell<EvaluationTracker<'a, S>>, interrupt: &'t Interrupt, eps: f64) -> Self {
        Self {
            tracker,
            interrupt,
            eps,
            last: RefCell::new(None),
        }
    }

    fn evaluate(&self, x: &[f64]) -> Result<f64, ArgminError> {
        if let Some(err) = self.interrupt.borrow().as_ref() {
            return Err(ArgminError::msg(err.to_string()));
        }
        let outcome = self.tracker.borrow_mut().evaluate(x);
        match outcome {
            Ok(EvalOutcome::Continue(fval)) => Ok(fval),
            Ok(EvalOutcome::BudgetExhausted) => Err(self.interrupt_with(EstimationError::BudgetExhausted)),
            Err(err) => Err(self.interrupt_with(err)),
        }
    }

    fn interrupt_with(&self, err: EstimationError) -> ArgminError {
        let message = err.to_string();
        self.interrupt.borrow_mut().get_or_insert(err);
        ArgminError::msg(message)
    }

    fn cached(&self, x: &[f64]) -> Option<f64> {
        match self.last.borrow().as_ref() {
            Some((point, fval)) if point.as_slice() == x => Some(*fval),
            _ => None,
        }
    }
}

impl<S: TraceSink> CostFunction for CriterionProblem<'_, '_, S> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, ArgminError> {
        let fval = self.evaluate(x)?;
        *self.last.borrow_mut() = Some((x.clone(), fval));
        Ok(fval)
    }
}

impl<S: TraceSink> Gradient for CriterionProblem<'_, '_, S> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// Forward differences; every shifted point counts against the budget.
    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        let f0 = match self.cached(x) {
            Some(fval) => fval,
            None => self.cost(x)?,
        };
        let mut shifted = x.clone();
        let mut grad = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            shifted[i] = x[i] + self.eps;
            let fi = self.evaluate(&shifted)?;
            shifted[i] = x[i];
            grad.push((fi - f0) / self.eps);
        }
        Ok(grad)
    }
}

/// Run the configured solver from `x_start` until it converges, fails or runs
/// out of evaluations.
pub fn run_optimizer<S: TraceSink>(
    tracker: &RefCell<EvaluationTracker<'_, S>>,
    x_start: Vec<f64>,
    kind: OptimizerKind,
    options: &OptimizerOptions,
) -> Result<OptimizerOutcome, EstimationError> {
    tracing::info!(optimizer = %kind, free = x_start.len(), "starting optimizer");
    let interrupt = Interrupt::new(None);
    let result = match kind {
        OptimizerKind::Lbfgs => run_lbfgs(tracker, &interrupt, x_start, &options.lbfgs),
        OptimizerKind::NelderMead => run_nelder_mead(tracker, &interrupt, x_start, &options.nelder_mead),
    };
    if let Some(err) = interrupt.into_inner() {
        return match err {
            EstimationError::BudgetExhausted => Ok(OptimizerOutcome::budget_exhausted()),
            other => Err(other),
        };
    }
    match result {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            tracing::warn!(error = %err, "optimizer aborted");
            Ok(OptimizerOutcome {
                success: false,
                message: format!("Optimizer aborted: {err}"),
            })
        }
    }
}

fn outcome_from_status(status: &TerminationStatus) -> OptimizerOutcome {
    let success = matches!(status, TerminationStatus::Terminated(TerminationReason::SolverConverged));
    OptimizerOutcome {
        success,
        message: status.to_string(),
    }
}

fn run_lbfgs<S: TraceSink>(
    tracker: &RefCell<EvaluationTracker<'_, S>>,
    interrupt: &Interrupt,
    x_start: Vec<f64>,
    options: &LbfgsOptions,
) -> Result<OptimizerOutcome, ArgminError> {
    let problem = CriterionProblem::new(tracker, interrupt, options.eps);
    let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> = MoreThuenteLineSearch::new();
    let solver: LBFGS<_, Vec<f64>, Vec<f64>, f64> =
        LBFGS::new(linesearch, LBFGS_MEMORY).with_tolerance_grad(options.gtol)?;

    let res = Executor::new(problem, solver)
        .configure(|state| state.param(x_start).max_iters(MAX_ITERS))
        .run()?;
    Ok(outcome_from_status(res.state().get_termination_status()))
}

fn run_nelder_mead<S: TraceSink>(
    tracker: &RefCell<EvaluationTracker<'_, S>>,
    interrupt: &Interrupt,
    x_start: Vec<f64>,
    options: &NelderMeadOptions,
) -> Result<OptimizerOutcome, ArgminError> {
    let problem = CriterionProblem::new(tracker, interrupt, 0.0);
    let simplex = initial_simplex(&x_start, options.xtol);
    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex).with_sd_tolerance(options.ftol)?;

    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(MAX_ITERS))
        .run()?;
    Ok(outcome_from_status(res.state().get_termination_status()))
}

/// `x_start` plus one vertex per coordinate, offset by `edge`.
pub fn initial_simplex(x_start: &[f64], edge: f64) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(x_start.len() + 1);
    vertices.push(x_start.to_vec());
    for i in 0..x_start.len() {
        let mut vertex = x_start.to_vec();
        vertex[i] += edge;
        vertices.push(vertex);
    }
    vertices
}
