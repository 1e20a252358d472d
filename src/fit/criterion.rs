//! Negative mean log-likelihood of observed choices.

use thiserror::Error;

use crate::debug::Diagnostics;
use crate::domain::PROB_FLOOR;
use crate::fit::grid::{DecisionGrid, GridError, SolvedGrid, solve_grid};
use crate::io::ingest::ObservedData;
use crate::models::Preferences;
use crate::paras::ParaLabel;

#[derive(Debug, Error)]
pub enum CriterionError {
    #[error("parameter '{label}' = {value} outside the admissible domain")]
    ParameterOutOfBounds { label: ParaLabel, value: f64 },
    #[error("criterion evaluated to non-finite value {0}")]
    NonFinite(f64),
    #[error("observed cell (question {question}, m {m}) is not part of the decision grid")]
    UnknownCell { question: u8, m: f64 },
    #[error("observed dataset is empty")]
    EmptyData,
    #[error(transparent)]
    Grid(#[from] GridError),
}

pub fn check_preferences(prefs: &Preferences) -> Result<(), CriterionError> {
    for label in ParaLabel::ALL {
        let value = prefs.get(label);
        if !label.admits(value) {
            return Err(CriterionError::ParameterOutOfBounds { label, value });
        }
    }
    Ok(())
}

/// Solve the grid at `prefs` and score `observed` against it.
pub fn criterion(
    observed: &ObservedData,
    grid: &DecisionGrid,
    prefs: &Preferences,
    diag: &mut Diagnostics,
) -> Result<f64, CriterionError> {
    check_preferences(prefs)?;
    if observed.is_empty() {
        return Err(CriterionError::EmptyData);
    }
    let solved = solve_grid(grid, prefs, diag)?;
    criterion_on_solved(observed, &solved)
}

pub fn criterion_on_solved(observed: &ObservedData, solved: &SolvedGrid) -> Result<f64, CriterionError> {
    if observed.is_empty() {
        return Err(CriterionError::EmptyData);
    }

    let mut total = 0.0;
    for row in observed.rows() {
        let cell = solved.lookup(row.key()).ok_or(CriterionError::UnknownCell {
            question: row.question,
            m: row.m,
        })?;
        let p = if row.chose_a() { cell.prob_a } else { cell.prob_b };
        total += p.max(PROB_FLOOR).ln();
    }

    let value = -total / observed.len() as f64;
    if !value.is_finite() {
        return Err(CriterionError::NonFinite(value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::ObservedRow;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn unanimous(grid: &DecisionGrid, choice: u8) -> ObservedData {
        let rows = grid
            .rows()
            .iter()
            .map(|r| ObservedRow {
                subject: "0".into(),
                question: r.question,
                m: r.m,
                choice,
            })
            .collect();
        ObservedData::new(rows).unwrap()
    }

    #[test]
    fn pinned_values_on_default_grid() {
        let grid = DecisionGrid::embedded().unwrap();
        let all_a = unanimous(&grid, 1);
        let all_b = unanimous(&grid, 0);
        let mut diag = Diagnostics::new();

        let base = Preferences::new(0.1, 0.0, 1.0, 1.0);
        assert_relative_eq!(criterion(&all_a, &grid, &base, &mut diag).unwrap(), 1.711966663913254, epsilon = 1e-10);
        assert_relative_eq!(criterion(&all_b, &grid, &base, &mut diag).unwrap(), 0.313021724980383, epsilon = 1e-10);

        let alt = Preferences::new(0.3, 0.2, 0.5, 2.0);
        assert_relative_eq!(criterion(&all_a, &grid, &alt, &mut diag).unwrap(), 0.9447000636140026, epsilon = 1e-10);
        assert_relative_eq!(criterion(&all_b, &grid, &alt, &mut diag).unwrap(), 0.5156719512247168, epsilon = 1e-10);
    }

    #[test]
    fn out_of_domain_parameters_fail_fast() {
        let grid = DecisionGrid::embedded().unwrap();
        let data = unanimous(&grid, 1);
        let mut diag = Diagnostics::new();
        let err = criterion(&data, &grid, &Preferences::new(1.0, 0.0, 1.0, 1.0), &mut diag).unwrap_err();
        assert!(matches!(err, CriterionError::ParameterOutOfBounds { label: ParaLabel::R, .. }));
        let err = criterion(&data, &grid, &Preferences::new(0.0, 0.0, -0.1, 1.0), &mut diag).unwrap_err();
        assert!(matches!(err, CriterionError::ParameterOutOfBounds { label: ParaLabel::B, .. }));
        let err = criterion(&data, &grid, &Preferences::new(0.0, 0.0, 1.0, 0.001), &mut diag).unwrap_err();
        assert!(matches!(err, CriterionError::ParameterOutOfBounds { label: ParaLabel::Nu, .. }));
    }

    #[test]
    fn unknown_cells_and_empty_data_are_errors() {
        let grid = DecisionGrid::embedded().unwrap();
        let prefs = Preferences::new(0.1, 0.0, 1.0, 1.0);
        let mut diag = Diagnostics::new();
        let stray = ObservedData::new(vec![ObservedRow {
            subject: "1".into(),
            question: 1,
            m: 3.0,
            choice: 1,
        }])
        .unwrap();
        assert!(matches!(
            criterion(&stray, &grid, &prefs, &mut diag),
            Err(CriterionError::UnknownCell { question: 1, .. })
        ));
        assert!(matches!(
            criterion(&ObservedData::default(), &grid, &prefs, &mut diag),
            Err(CriterionError::EmptyData)
        ));
    }

    #[test]
    fn saturated_probabilities_are_floored() {
        let grid = DecisionGrid::embedded().unwrap();
        let mut diag = Diagnostics::new();
        let prefs = Preferences::new(-0.99, -0.99, 5.0, 0.01);
        for choice in [0, 1] {
            let value = criterion(&unanimous(&grid, choice), &grid, &prefs, &mut diag).unwrap();
            assert!(value.is_finite() && value >= 0.0);
            assert!(value <= -PROB_FLOOR.ln());
        }
    }

    proptest! {
        #[test]
        fn criterion_is_finite_and_non_negative(
            r in -0.99f64..0.99,
            eta in -0.99f64..0.99,
            b in 0.0f64..5.0,
            nu in 0.01f64..5.0,
            choice in 0u8..2,
        ) {
            let grid = DecisionGrid::embedded().unwrap();
            let data = unanimous(&grid, choice);
            let mut diag = Diagnostics::new();
            let value = criterion(&data, &grid, &Preferences::new(r, eta, b, nu), &mut diag).unwrap();
            prop_assert!(value.is_finite());
            prop_assert!(value >= 0.0);
        }
    }
}
