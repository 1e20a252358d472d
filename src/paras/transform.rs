//! Economic <-> optimizer space mappings.
//!
//! The map is picked by the shape of the bounds:
//!
//! - both finite: scaled logistic / logit
//! - lower only: `lower + softplus(x)`
//! - upper only: `upper - softplus(-x)`
//! - neither: identity
//!
//! The inverse cannot be evaluated exactly on a finite bound, so values sitting
//! on one are moved inward by [`SMALL_FLOAT`] first and a
//! [`Warning::BoundAdjustment`] is recorded.

use crate::debug::{Diagnostics, Warning};
use crate::domain::SMALL_FLOAT;
use crate::paras::Bounds;

const ISCLOSE_ATOL: f64 = 1e-8;
const ISCLOSE_RTOL: f64 = 1e-5;
const SOFTPLUS_CUTOFF: f64 = 20.0;

/// Map an unconstrained value into the closed interval `[lower, upper]`.
pub fn to_interval(x: f64, lower: f64, upper: f64) -> f64 {
    let v = lower + (upper - lower) / (1.0 + (-x).exp());
    v.clamp(lower, upper)
}

/// Inverse of [`to_interval`] for a value strictly inside `(lower, upper)`.
pub fn to_real(value: f64, lower: f64, upper: f64) -> f64 {
    let t = (value - lower) / (upper - lower);
    (t / (1.0 - t)).ln()
}

pub fn softplus(x: f64) -> f64 {
    if x > SOFTPLUS_CUTOFF { x } else { x.exp().ln_1p() }
}

/// Solves `softplus(t) = x` for `x > 0`.
pub fn softplus_inv(x: f64) -> f64 {
    if x > SOFTPLUS_CUTOFF { x } else { x.exp_m1().ln() }
}

/// Optimizer value -> economic value. Never leaves `bounds` for finite `x`.
pub fn to_econ(x: f64, bounds: &Bounds) -> f64 {
    let v = match (bounds.lower, bounds.upper) {
        (Some(lower), Some(upper)) => to_interval(x, lower, upper),
        (Some(lower), None) => lower + softplus(x),
        (None, Some(upper)) => upper - softplus(-x),
        (None, None) => x,
    };
    bounds.clamp(v)
}

/// Economic value -> optimizer value.
pub fn to_optimizer(value: f64, bounds: &Bounds, diag: &mut Diagnostics) -> f64 {
    let v = nudge_inward(value, bounds, diag);
    match (bounds.lower, bounds.upper) {
        (Some(lower), Some(upper)) => to_real(v, lower, upper),
        (Some(lower), None) => softplus_inv(v - lower),
        (None, Some(upper)) => -softplus_inv(upper - v),
        (None, None) => v,
    }
}

fn is_close(value: f64, bound: f64) -> bool {
    (value - bound).abs() <= ISCLOSE_ATOL + ISCLOSE_RTOL * bound.abs()
}

fn nudge_inward(value: f64, bounds: &Bounds, diag: &mut Diagnostics) -> f64 {
    if let Some(lower) = bounds.lower {
        if value <= lower || is_close(value, lower) {
            diag.record(Warning::BoundAdjustment);
            return lower + SMALL_FLOAT;
        }
    }
    if let Some(upper) = bounds.upper {
        if value >= upper || is_close(value, upper) {
            diag.record(Warning::BoundAdjustment);
            return upper - SMALL_FLOAT;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paras::ParaLabel;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn value_on_bound_is_nudged_and_recorded() {
        let bounds = ParaLabel::Nu.default_bounds();
        let mut diag = Diagnostics::new();
        let x = to_optimizer(5.0, &bounds, &mut diag);
        assert!(x.is_finite());
        assert_eq!(diag.count(Warning::BoundAdjustment), 1);
        assert_relative_eq!(to_econ(x, &bounds), 5.0 - SMALL_FLOAT, epsilon = 1e-12);

        let b_bounds = ParaLabel::B.default_bounds();
        let xb = to_optimizer(0.0, &b_bounds, &mut diag);
        assert!(xb.is_finite());
        assert_eq!(diag.count(Warning::BoundAdjustment), 2);
    }

    #[test]
    fn interior_value_is_not_adjusted() {
        let mut diag = Diagnostics::new();
        let x = to_optimizer(0.3, &ParaLabel::R.default_bounds(), &mut diag);
        assert!(diag.is_empty());
        assert_relative_eq!(to_econ(x, &ParaLabel::R.default_bounds()), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn extreme_optimizer_values_stay_in_bounds() {
        for label in ParaLabel::ALL {
            let bounds = label.default_bounds();
            for x in [-1e6, -745.0, -40.0, 0.0, 40.0, 745.0, 1e6] {
                let v = to_econ(x, &bounds);
                assert!(bounds.contains(v), "{label}: {x} -> {v}");
            }
        }
    }

    #[test]
    fn upper_only_bounds_round_trip() {
        let bounds = Bounds::new(None, Some(2.0));
        let mut diag = Diagnostics::new();
        let x = to_optimizer(1.25, &bounds, &mut diag);
        assert_relative_eq!(to_econ(x, &bounds), 1.25, epsilon = 1e-12);
        assert!(diag.is_empty());
    }

    proptest! {
        #[test]
        fn optimizer_values_round_trip(x in -10.0f64..10.0, idx in 0usize..4) {
            let bounds = ParaLabel::ALL[idx].default_bounds();
            let mut diag = Diagnostics::new();
            let back = to_optimizer(to_econ(x, &bounds), &bounds, &mut diag);
            prop_assert!((back - x).abs() < 1e-6, "{} -> {}", x, back);
            prop_assert!(diag.is_empty());
        }
    }
}
