//! The fixed, ordered set of model parameters.
//!
//! Values are exchanged as flat vectors in canonical label order (`r, eta, b,
//! nu`). A [`Perspective`] picks economic or optimizer space and a [`Scope`]
//! picks all parameters or only the free ones.

use std::str::FromStr;

use crate::debug::Diagnostics;
use crate::paras::transform::to_econ;
use crate::paras::{ParaError, ParaLabel, Parameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    Economic,
    Optimizer,
}

impl FromStr for Perspective {
    type Err = ParaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "econ" => Ok(Perspective::Economic),
            "optim" => Ok(Perspective::Optimizer),
            other => Err(ParaError::MisspecifiedRequest(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Free,
}

impl FromStr for Scope {
    type Err = ParaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Scope::All),
            "free" => Ok(Scope::Free),
            other => Err(ParaError::MisspecifiedRequest(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCollection {
    paras: Vec<Parameter>,
}

impl ParameterCollection {
    /// Build a collection holding exactly one parameter per label.
    pub fn new(paras: Vec<Parameter>) -> Result<Self, ParaError> {
        for label in ParaLabel::ALL {
            match paras.iter().filter(|p| p.label() == label).count() {
                0 => return Err(ParaError::MissingLabel(label)),
                1 => {}
                _ => return Err(ParaError::DuplicateLabel(label)),
            }
        }
        let mut paras = paras;
        paras.sort_by_key(|p| p.label());
        Ok(Self { paras })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.paras.iter()
    }

    pub fn get(&self, label: ParaLabel) -> &Parameter {
        &self.paras[label.index()]
    }

    /// Look a parameter up by its label string.
    pub fn find(&self, label: &str) -> Result<&Parameter, ParaError> {
        let label: ParaLabel = label
            .parse()
            .map_err(|_| ParaError::NotFound(label.to_string()))?;
        Ok(self.get(label))
    }

    pub fn value(&self, label: ParaLabel) -> f64 {
        self.get(label).value()
    }

    pub fn num_free(&self) -> usize {
        self.paras.iter().filter(|p| !p.is_fixed()).count()
    }

    pub fn labels(&self, scope: Scope) -> Vec<ParaLabel> {
        self.in_scope(scope).map(|p| p.label()).collect()
    }

    fn in_scope(&self, scope: Scope) -> impl Iterator<Item = &Parameter> {
        self.paras.iter().filter(move |p| match scope {
            Scope::All => true,
            Scope::Free => !p.is_fixed(),
        })
    }

    /// Boundary nudges made while mapping to optimizer space land in `diag`.
    pub fn get_values(&self, perspective: Perspective, scope: Scope, diag: &mut Diagnostics) -> Vec<f64> {
        self.in_scope(scope)
            .map(|p| match perspective {
                Perspective::Economic => p.value(),
                Perspective::Optimizer => p.optimizer_value(diag),
            })
            .collect()
    }

    /// Replace the values in `scope`. Either every value is accepted or the
    /// collection is left untouched.
    pub fn set_values(
        &mut self,
        perspective: Perspective,
        scope: Scope,
        values: &[f64],
    ) -> Result<(), ParaError> {
        let targets: Vec<usize> = self
            .paras
            .iter()
            .enumerate()
            .filter(|(_, p)| scope == Scope::All || !p.is_fixed())
            .map(|(i, _)| i)
            .collect();
        if targets.len() != values.len() {
            return Err(ParaError::LengthMismatch {
                expected: targets.len(),
                actual: values.len(),
            });
        }

        let mut econ = Vec::with_capacity(values.len());
        for (&i, &raw) in targets.iter().zip(values) {
            let para = &self.paras[i];
            let value = match perspective {
                Perspective::Economic => raw,
                Perspective::Optimizer => {
                    if !raw.is_finite() {
                        return Err(ParaError::NonFiniteOptimizerValue {
                            label: para.label(),
                            value: raw,
                        });
                    }
                    to_econ(raw, &para.bounds())
                }
            };
            para.check_value(value)?;
            econ.push(value);
        }

        for (&i, value) in targets.iter().zip(econ) {
            self.paras[i].set_value(value)?;
        }
        Ok(())
    }

    /// A new collection with the given values applied, leaving `self` intact.
    pub fn derive(&self, perspective: Perspective, scope: Scope, values: &[f64]) -> Result<Self, ParaError> {
        let mut out = self.clone();
        out.set_values(perspective, scope, values)?;
        Ok(out)
    }

    pub fn set_fixed(&mut self, label: ParaLabel, is_fixed: bool) {
        self.paras[label.index()].set_fixed(is_fixed);
    }
}
