//! The parameter entity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::debug::Diagnostics;
use crate::domain::SMALL_FLOAT;
use crate::paras::ParaError;
use crate::paras::transform;

/// Closed set of model parameters, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParaLabel {
    /// Inner curvature applied to each account's payment.
    R,
    /// Outer curvature applied to the combined inner utility.
    Eta,
    /// Weight on the other account's payment.
    B,
    /// Luce choice sensitivity.
    Nu,
}

impl ParaLabel {
    pub const ALL: [ParaLabel; 4] = [ParaLabel::R, ParaLabel::Eta, ParaLabel::B, ParaLabel::Nu];

    pub fn as_str(self) -> &'static str {
        match self {
            ParaLabel::R => "r",
            ParaLabel::Eta => "eta",
            ParaLabel::B => "b",
            ParaLabel::Nu => "nu",
        }
    }

    /// Position in canonical order.
    pub fn index(self) -> usize {
        match self {
            ParaLabel::R => 0,
            ParaLabel::Eta => 1,
            ParaLabel::B => 2,
            ParaLabel::Nu => 3,
        }
    }

    pub fn default_bounds(self) -> Bounds {
        match self {
            ParaLabel::R | ParaLabel::Eta => Bounds::new(Some(-0.99), Some(0.99)),
            ParaLabel::B => Bounds::new(Some(0.0), None),
            ParaLabel::Nu => Bounds::new(Some(0.01), Some(5.0)),
        }
    }

    /// Whether `value` lies in the domain where the utility model is defined.
    pub fn admits(self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self {
            ParaLabel::R | ParaLabel::Eta => value > -1.0 && value < 1.0,
            ParaLabel::B => value >= 0.0,
            ParaLabel::Nu => (0.01..=5.0).contains(&value),
        }
    }

    /// Configured bounds must describe a non-degenerate sub-interval of the
    /// admissible domain.
    pub fn check_bounds(self, bounds: &Bounds) -> Result<(), ParaError> {
        let malformed = |reason: &str| ParaError::MalformedBounds {
            label: self,
            reason: reason.to_string(),
        };

        for bound in [bounds.lower, bounds.upper].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(malformed("bounds must be finite or None"));
            }
            if !self.admits(bound) {
                return Err(malformed("bound outside the admissible domain"));
            }
        }

        match self {
            ParaLabel::R | ParaLabel::Eta | ParaLabel::Nu => {
                if bounds.lower.is_none() || bounds.upper.is_none() {
                    return Err(malformed("both bounds are required"));
                }
            }
            ParaLabel::B => {
                if bounds.lower.is_none() {
                    return Err(malformed("a lower bound is required"));
                }
            }
        }

        if let (Some(lower), Some(upper)) = (bounds.lower, bounds.upper) {
            if upper - lower <= 2.0 * SMALL_FLOAT {
                return Err(malformed("lower bound must lie strictly below upper bound"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ParaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParaLabel {
    type Err = ParaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(ParaLabel::R),
            "eta" => Ok(ParaLabel::Eta),
            "b" => Ok(ParaLabel::B),
            "nu" => Ok(ParaLabel::Nu),
            other => Err(ParaError::UnknownLabel(other.to_string())),
        }
    }
}

/// Closed interval; `None` leaves a side unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    pub const fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite()
            && self.lower.is_none_or(|lower| value >= lower)
            && self.upper.is_none_or(|upper| value <= upper)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(lower) = self.lower {
            v = v.max(lower);
        }
        if let Some(upper) = self.upper {
            v = v.min(upper);
        }
        v
    }
}

pub(crate) fn fmt_bound(bound: Option<f64>) -> String {
    match bound {
        Some(v) => format!("{v}"),
        None => "None".to_string(),
    }
}

/// Parse the `True`/`False` token of an init-file parameter line.
pub fn parse_fixed_flag(token: &str) -> Result<bool, ParaError> {
    match token {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        other => Err(ParaError::InvalidFixedFlag(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    label: ParaLabel,
    value: f64,
    is_fixed: bool,
    bounds: Bounds,
}

impl Parameter {
    pub fn new(label: ParaLabel, value: f64, is_fixed: bool, bounds: Bounds) -> Result<Self, ParaError> {
        label.check_bounds(&bounds)?;
        let mut para = Self {
            label,
            value: f64::NAN,
            is_fixed,
            bounds,
        };
        para.set_value(value)?;
        Ok(para)
    }

    pub fn with_default_bounds(label: ParaLabel, value: f64, is_fixed: bool) -> Result<Self, ParaError> {
        Self::new(label, value, is_fixed, label.default_bounds())
    }

    pub fn label(&self) -> ParaLabel {
        self.label
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub(crate) fn set_value(&mut self, value: f64) -> Result<(), ParaError> {
        self.check_value(value)?;
        self.value = value;
        Ok(())
    }

    pub(crate) fn set_fixed(&mut self, is_fixed: bool) {
        self.is_fixed = is_fixed;
    }

    pub(crate) fn check_value(&self, value: f64) -> Result<(), ParaError> {
        if self.bounds.contains(value) {
            Ok(())
        } else {
            Err(ParaError::OutOfBounds {
                label: self.label,
                value,
                lower: fmt_bound(self.bounds.lower),
                upper: fmt_bound(self.bounds.upper),
            })
        }
    }

    pub fn optimizer_value(&self, diag: &mut Diagnostics) -> f64 {
        transform::to_optimizer(self.value, &self.bounds, diag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_are_well_formed() {
        for label in ParaLabel::ALL {
            label.check_bounds(&label.default_bounds()).unwrap();
        }
    }

    #[test]
    fn bounds_outside_domain_are_rejected() {
        let err = ParaLabel::R
            .check_bounds(&Bounds::new(Some(-1.0), Some(0.5)))
            .unwrap_err();
        assert!(matches!(err, ParaError::MalformedBounds { label: ParaLabel::R, .. }));

        assert!(ParaLabel::Nu.check_bounds(&Bounds::new(Some(0.01), None)).is_err());
        assert!(ParaLabel::B.check_bounds(&Bounds::new(Some(2.0), Some(1.0))).is_err());
        assert!(ParaLabel::B.check_bounds(&Bounds::new(Some(0.0), Some(10.0))).is_ok());
    }

    #[test]
    fn value_outside_bounds_is_rejected() {
        let err = Parameter::with_default_bounds(ParaLabel::Nu, 6.0, false).unwrap_err();
        assert!(matches!(err, ParaError::OutOfBounds { label: ParaLabel::Nu, .. }));
        assert!(Parameter::with_default_bounds(ParaLabel::B, f64::INFINITY, true).is_err());
    }

    #[test]
    fn labels_parse_and_print() {
        for label in ParaLabel::ALL {
            assert_eq!(label.as_str().parse::<ParaLabel>().unwrap(), label);
        }
        assert!(matches!("rho".parse::<ParaLabel>(), Err(ParaError::UnknownLabel(_))));
    }

    #[test]
    fn fixed_flag_accepts_capitalised_and_lowercase_booleans() {
        assert!(parse_fixed_flag("True").unwrap());
        assert!(!parse_fixed_flag("False").unwrap());
        assert!(parse_fixed_flag("yes").is_err());
    }
}
