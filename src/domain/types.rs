//! Shared domain types.
//!
//! A [`ModelSpec`] is everything an initialization file describes: the
//! parameter collection plus how to simulate and how to estimate. It is built
//! once at load time and then only read; counterfactual specs are derived with
//! [`ModelSpec::with_parameters`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paras::{ParaLabel, ParameterCollection};

/// Display/trace sentinel for "no value yet".
pub const HUGE_FLOAT: f64 = 1.0e21;
/// Inward nudge applied to values sitting on a finite bound.
pub const SMALL_FLOAT: f64 = 1.0e-5;
/// Floor applied to choice probabilities inside the criterion.
pub const PROB_FLOOR: f64 = 1.0e-20;

pub const MAXFUN_MESSAGE: &str = "Optimization reached maximum number of function evaluations.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported optimizer '{0}', expected LBFGS or NELDER-MEAD")]
pub struct UnsupportedOptimizer(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum OptimizerKind {
    #[serde(rename = "LBFGS")]
    #[value(name = "lbfgs")]
    Lbfgs,
    #[serde(rename = "NELDER-MEAD")]
    #[value(name = "nelder-mead")]
    NelderMead,
}

impl OptimizerKind {
    /// Name as it appears in the init file, also the option section name.
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizerKind::Lbfgs => "LBFGS",
            OptimizerKind::NelderMead => "NELDER-MEAD",
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKind {
    type Err = UnsupportedOptimizer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LBFGS" => Ok(OptimizerKind::Lbfgs),
            "NELDER-MEAD" => Ok(OptimizerKind::NelderMead),
            _ => Err(UnsupportedOptimizer(s.to_string())),
        }
    }
}

/// L-BFGS settings.
///
/// `gtol` is the gradient-norm stopping tolerance, `eps` the forward-difference
/// step used to approximate the gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LbfgsOptions {
    pub gtol: f64,
    pub eps: f64,
}

impl Default for LbfgsOptions {
    fn default() -> Self {
        Self { gtol: 1e-5, eps: 1e-6 }
    }
}

/// Nelder-Mead settings.
///
/// `xtol` is the edge length of the initial simplex in optimizer space, `ftol`
/// the standard-deviation tolerance on the simplex's criterion values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NelderMeadOptions {
    pub xtol: f64,
    pub ftol: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self { xtol: 0.25, ftol: 1e-8 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizerOptions {
    pub lbfgs: LbfgsOptions,
    pub nelder_mead: NelderMeadOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub agents: usize,
    pub seed: u64,
    /// Output stem; the run writes `<file>.csv` and `<file>.info`.
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationRequest {
    /// Simulate at the start and best parameters and compare with the data.
    pub detailed: bool,
    pub optimizer: OptimizerKind,
    pub agents: usize,
    pub file: PathBuf,
    pub maxfun: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model specification failed integrity check: {0}")]
pub struct IntegrityError(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub paras: ParameterCollection,
    pub simulation: SimulationRequest,
    pub estimation: EstimationRequest,
    pub optimizer_options: OptimizerOptions,
}

impl ModelSpec {
    /// Same spec with a different parameter collection.
    pub fn with_parameters(&self, paras: ParameterCollection) -> Self {
        Self {
            paras,
            ..self.clone()
        }
    }

    pub fn with_simulation_file(&self, file: impl Into<String>) -> Self {
        let mut out = self.clone();
        out.simulation.file = file.into();
        out
    }

    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        for para in self.paras.iter() {
            if !para.label().admits(para.value()) {
                return Err(IntegrityError(format!(
                    "parameter '{}' = {} outside its admissible domain",
                    para.label(),
                    para.value()
                )));
            }
        }
        if self.estimation.agents == 0 {
            return Err(IntegrityError("estimation agents must be positive".into()));
        }
        if self.simulation.file.trim().is_empty() {
            return Err(IntegrityError("simulation file stem is empty".into()));
        }
        let lbfgs = self.optimizer_options.lbfgs;
        let nm = self.optimizer_options.nelder_mead;
        for (name, tol) in [("gtol", lbfgs.gtol), ("eps", lbfgs.eps), ("xtol", nm.xtol), ("ftol", nm.ftol)] {
            if !(tol.is_finite() && tol > 0.0) {
                return Err(IntegrityError(format!("optimizer option '{name}' must be positive")));
            }
        }
        Ok(())
    }

    pub fn value(&self, label: ParaLabel) -> f64 {
        self.paras.value(label)
    }
}
