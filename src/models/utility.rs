//! Intertemporal-altruism utility and the Luce choice rule.

use serde::{Deserialize, Serialize};

use crate::debug::{Diagnostics, Warning};
use crate::paras::{ParaLabel, ParameterCollection};

/// Economic parameter values in the form the solver consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub r: f64,
    pub eta: f64,
    pub b: f64,
    pub nu: f64,
}

impl Preferences {
    pub fn new(r: f64, eta: f64, b: f64, nu: f64) -> Self {
        Self { r, eta, b, nu }
    }

    pub fn from_collection(paras: &ParameterCollection) -> Self {
        Self {
            r: paras.value(ParaLabel::R),
            eta: paras.value(ParaLabel::Eta),
            b: paras.value(ParaLabel::B),
            nu: paras.value(ParaLabel::Nu),
        }
    }

    pub fn get(&self, label: ParaLabel) -> f64 {
        match label {
            ParaLabel::R => self.r,
            ParaLabel::Eta => self.eta,
            ParaLabel::B => self.b,
            ParaLabel::Nu => self.nu,
        }
    }
}

/// Utility of receiving `own` and having `other` paid to the other account.
///
/// `u = inner^(1-eta) / (1-eta)` with
/// `inner = own^(1-r)/(1-r) + b * other^(1-r)/(1-r)`.
pub fn atemporal_utility(own: f64, other: f64, r: f64, eta: f64, b: f64) -> f64 {
    let inner = own.powf(1.0 - r) / (1.0 - r) + b * other.powf(1.0 - r) / (1.0 - r);
    inner.powf(1.0 - eta) / (1.0 - eta)
}

/// Luce probabilities `(p_a, p_b)` of choosing each option.
///
/// When a power overflows the rule is evaluated in log space instead, which
/// keeps dominance visible.
pub fn luce_prob(eu_a: f64, eu_b: f64, nu: f64, diag: &mut Diagnostics) -> (f64, f64) {
    let x = eu_a.powf(1.0 / nu);
    let y = eu_b.powf(1.0 / nu);
    let total = x + y;

    if x.is_finite() && y.is_finite() && total.is_finite() && total > 0.0 {
        let p_a = x / total;
        return (p_a, 1.0 - p_a);
    }

    diag.record(Warning::LuceOverflow);
    luce_prob_log_space(eu_a, eu_b, nu)
}

/// `p_a = 1 / (1 + exp((ln eu_b - ln eu_a) / nu))`, evaluated without overflow.
pub fn luce_prob_log_space(eu_a: f64, eu_b: f64, nu: f64) -> (f64, f64) {
    let d = (eu_b.ln() - eu_a.ln()) / nu;
    let p_a = if d.is_nan() {
        0.5
    } else if d > 0.0 {
        let e = (-d).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + d.exp())
    };
    (p_a, 1.0 - p_a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_case_is_sum_of_payments() {
        for (own, other) in [(1.0, 1.0), (3.5, 0.25), (1e6, 7.0)] {
            assert_eq!(atemporal_utility(own, other, 0.0, 0.0, 1.0), own + other);
        }
    }

    #[test]
    fn altruism_weight_scales_other_account() {
        let selfish = atemporal_utility(2.0, 5.0, 0.0, 0.0, 0.0);
        assert_eq!(selfish, 2.0);
        let generous = atemporal_utility(2.0, 5.0, 0.0, 0.0, 0.5);
        assert_relative_eq!(generous, 4.5, epsilon = 1e-12);
    }

    #[test]
    fn equal_utilities_split_evenly() {
        let mut diag = Diagnostics::new();
        assert_eq!(luce_prob(3.0, 3.0, 1.7, &mut diag), (0.5, 0.5));
        assert!(diag.is_empty());
    }

    #[test]
    fn overflow_keeps_dominance_and_sums_to_one() {
        let mut diag = Diagnostics::new();
        let (p_a, p_b) = luce_prob(2000.0, 1000.0, 0.01, &mut diag);
        assert_eq!(diag.count(Warning::LuceOverflow), 1);
        assert!(p_a > 0.999);
        assert_eq!(p_a + p_b, 1.0);

        let (p_a, p_b) = luce_prob(1000.0, 2000.0, 0.01, &mut diag);
        assert!(p_a < 1e-12);
        assert_eq!(p_a + p_b, 1.0);
    }

    #[test]
    fn log_space_matches_direct_rule_when_both_are_finite() {
        let mut diag = Diagnostics::new();
        let direct = luce_prob(4.969208328959005, 4.403499712498305, 1.0, &mut diag);
        let logged = luce_prob_log_space(4.969208328959005, 4.403499712498305, 1.0);
        assert_relative_eq!(direct.0, 0.5301785041184714, epsilon = 1e-12);
        assert_relative_eq!(logged.0, direct.0, epsilon = 1e-12);
    }
}
