//! Model parameters and their two representations.
//!
//! - [`para`]: the parameter entity, its label set and bounds.
//! - [`transform`]: maps between bounded economic values and unconstrained
//!   optimizer values.
//! - [`collection`]: the ordered set of parameters handed to solvers and
//!   optimizers.

pub mod collection;
pub mod para;
pub mod transform;

pub use collection::{ParameterCollection, Perspective, Scope};
pub use para::{Bounds, ParaLabel, Parameter, parse_fixed_flag};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParaError {
    #[error("parameter '{0}' not found")]
    NotFound(String),
    #[error("misspecified request '{0}'")]
    MisspecifiedRequest(String),
    #[error("unknown parameter label '{0}'")]
    UnknownLabel(String),
    #[error("invalid fixed flag '{0}', expected True or False")]
    InvalidFixedFlag(String),
    #[error("value {value} for parameter '{label}' outside bounds [{lower}, {upper}]")]
    OutOfBounds {
        label: ParaLabel,
        value: f64,
        lower: String,
        upper: String,
    },
    #[error("malformed bounds for parameter '{label}': {reason}")]
    MalformedBounds { label: ParaLabel, reason: String },
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("parameter '{0}' missing from collection")]
    MissingLabel(ParaLabel),
    #[error("parameter '{0}' specified more than once")]
    DuplicateLabel(ParaLabel),
    #[error("non-finite optimizer value {value} for parameter '{label}'")]
    NonFiniteOptimizerValue { label: ParaLabel, value: f64 },
}
