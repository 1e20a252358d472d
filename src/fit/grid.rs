//! Decision grid and the per-evaluation grid solve.
//!
//! Each row is one scenario `(question, x, y, i1, i2, m)`. The question number
//! selects whose account the scenario amounts go to; see [`QuestionKind`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::debug::Diagnostics;
use crate::models::{Preferences, atemporal_utility, luce_prob};

#[derive(Debug, Error)]
pub enum GridError {
    #[error("unknown question category {0}, expected 1-9")]
    UnknownQuestion(u8),
    #[error("non-finite entry in grid row (question {question}, m {m})")]
    NonFinite { question: u8, m: f64 },
    #[error("non-positive payment in grid row (question {question}, m {m})")]
    NonPositivePayment { question: u8, m: f64 },
    #[error("duplicate grid cell (question {question}, m {m})")]
    DuplicateCell { question: u8, m: f64 },
    #[error("decision grid is empty")]
    Empty,
    #[error("failed to open grid template '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse grid template: {0}")]
    Csv(#[from] csv::Error),
}

/// Which accounts the two scenario amounts are paid into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Questions 1-3: both amounts to the own account.
    Own,
    /// Questions 4-6: both amounts to the other account.
    Other,
    /// Questions 7-9: first amount to the own account, second to the other.
    Mixed,
}

impl QuestionKind {
    pub fn from_question(question: u8) -> Result<Self, GridError> {
        match question {
            1..=3 => Ok(QuestionKind::Own),
            4..=6 => Ok(QuestionKind::Other),
            7..=9 => Ok(QuestionKind::Mixed),
            other => Err(GridError::UnknownQuestion(other)),
        }
    }
}

/// `(own, other)`.
pub type PaymentPair = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub question: u8,
    pub x: f64,
    pub y: f64,
    pub i1: f64,
    pub i2: f64,
    pub m: f64,
}

impl GridRow {
    /// The two equally likely payment pairs of option A and option B.
    pub fn payments(&self) -> Result<([PaymentPair; 2], [PaymentPair; 2]), GridError> {
        let GridRow { x, y, i1, i2, m, .. } = *self;
        let pairs = match QuestionKind::from_question(self.question)? {
            QuestionKind::Own => ([(x + i1, y), (x + i2, y)], [(x + i1 + i2 + m, y), (x + m, y)]),
            QuestionKind::Other => ([(x, y + i1), (x, y + i2)], [(x, y + i1 + i2 + m), (x, y + m)]),
            QuestionKind::Mixed => ([(x + i1, y), (x, y + i2)], [(x + i1 + m, y + i2), (x + m, y)]),
        };
        Ok(pairs)
    }

    pub fn key(&self) -> CellKey {
        CellKey::new(self.question, self.m)
    }

    fn validate(&self) -> Result<(), GridError> {
        let (a, b) = self.payments()?;
        let values = [self.x, self.y, self.i1, self.i2, self.m];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GridError::NonFinite {
                question: self.question,
                m: self.m,
            });
        }
        if a.iter().chain(b.iter()).any(|&(own, other)| own <= 0.0 || other <= 0.0) {
            return Err(GridError::NonPositivePayment {
                question: self.question,
                m: self.m,
            });
        }
        Ok(())
    }
}

/// Join key for a grid cell. Amounts are matched at micro-unit resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub question: u8,
    m_micros: i64,
}

impl CellKey {
    pub fn new(question: u8, m: f64) -> Self {
        Self {
            question,
            m_micros: (m * 1e6).round() as i64,
        }
    }

    pub fn m(&self) -> f64 {
        self.m_micros as f64 / 1e6
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionGrid {
    rows: Vec<GridRow>,
}

impl DecisionGrid {
    pub fn new(rows: Vec<GridRow>) -> Result<Self, GridError> {
        if rows.is_empty() {
            return Err(GridError::Empty);
        }
        for row in &rows {
            row.validate()?;
        }
        let mut rows = rows;
        rows.sort_by_key(|r| r.key());
        for pair in rows.windows(2) {
            if pair[0].key() == pair[1].key() {
                return Err(GridError::DuplicateCell {
                    question: pair[1].question,
                    m: pair[1].m,
                });
            }
        }
        Ok(Self { rows })
    }

    /// The default 9 x 8 template shipped with the binary.
    pub fn embedded() -> Result<Self, GridError> {
        Self::from_reader(crate::data::EMBEDDED_GRID.as_bytes())
    }

    pub fn from_path(path: &Path) -> Result<Self, GridError> {
        let file = File::open(path).map_err(|source| GridError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, GridError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = Vec::new();
        for record in rdr.deserialize() {
            rows.push(record?);
        }
        Self::new(rows)
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolvedRow {
    pub row: GridRow,
    pub eu_a: f64,
    pub eu_b: f64,
    pub prob_a: f64,
    pub prob_b: f64,
}

#[derive(Debug, Clone)]
pub struct SolvedGrid {
    rows: Vec<SolvedRow>,
    index: HashMap<CellKey, usize>,
}

impl SolvedGrid {
    pub fn rows(&self) -> &[SolvedRow] {
        &self.rows
    }

    pub fn lookup(&self, key: CellKey) -> Option<&SolvedRow> {
        self.index.get(&key).map(|&i| &self.rows[i])
    }
}

fn expected_utility(pairs: &[PaymentPair; 2], prefs: &Preferences) -> f64 {
    pairs
        .iter()
        .map(|&(own, other)| 0.5 * atemporal_utility(own, other, prefs.r, prefs.eta, prefs.b))
        .sum()
}

/// Expected utilities and Luce probabilities for every row.
pub fn solve_grid(grid: &DecisionGrid, prefs: &Preferences, diag: &mut Diagnostics) -> Result<SolvedGrid, GridError> {
    let mut rows = Vec::with_capacity(grid.len());
    let mut index = HashMap::with_capacity(grid.len());
    for (i, row) in grid.rows().iter().enumerate() {
        let (a, b) = row.payments()?;
        let eu_a = expected_utility(&a, prefs);
        let eu_b = expected_utility(&b, prefs);
        let (prob_a, prob_b) = luce_prob(eu_a, eu_b, prefs.nu, diag);
        rows.push(SolvedRow {
            row: *row,
            eu_a,
            eu_b,
            prob_a,
            prob_b,
        });
        index.insert(row.key(), i);
    }
    Ok(SolvedGrid { rows, index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::Warning;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn row(question: u8, m: f64) -> GridRow {
        GridRow {
            question,
            x: 1.0,
            y: 1.0,
            i1: 2.0,
            i2: 4.0,
            m,
        }
    }

    #[test]
    fn embedded_template_covers_nine_questions() {
        let grid = DecisionGrid::embedded().unwrap();
        assert_eq!(grid.len(), 72);
        for q in 1..=9u8 {
            assert_eq!(grid.rows().iter().filter(|r| r.question == q).count(), 8);
        }
        assert!(grid.rows().windows(2).all(|w| w[0].key() < w[1].key()));
    }

    #[test]
    fn first_row_matches_reference_solution() {
        let grid = DecisionGrid::embedded().unwrap();
        let mut diag = Diagnostics::new();
        let solved = solve_grid(&grid, &Preferences::new(0.1, 0.0, 1.0, 1.0), &mut diag).unwrap();
        let first = solved.lookup(CellKey::new(1, -0.5)).unwrap();
        assert_relative_eq!(first.eu_a, 4.969208328959005, epsilon = 1e-12);
        assert_relative_eq!(first.eu_b, 4.403499712498305, epsilon = 1e-12);
        assert_relative_eq!(first.prob_a, 0.5301785041184714, epsilon = 1e-12);
        assert!(diag.is_empty());
    }

    #[test]
    fn payments_follow_question_category() {
        let (a, b) = row(8, 5.0).payments().unwrap();
        assert_eq!(a, [(3.0, 1.0), (1.0, 5.0)]);
        assert_eq!(b, [(8.0, 5.0), (6.0, 1.0)]);

        let (a, b) = row(5, 5.0).payments().unwrap();
        assert_eq!(a, [(1.0, 3.0), (1.0, 5.0)]);
        assert_eq!(b, [(1.0, 12.0), (1.0, 6.0)]);
    }

    #[test]
    fn unknown_question_is_fatal() {
        assert!(matches!(row(10, 1.0).payments(), Err(GridError::UnknownQuestion(10))));
        assert!(matches!(DecisionGrid::new(vec![row(0, 1.0)]), Err(GridError::UnknownQuestion(0))));
    }

    #[test]
    fn invalid_templates_are_rejected() {
        assert!(matches!(
            DecisionGrid::new(vec![row(1, 2.0), row(1, 2.0)]),
            Err(GridError::DuplicateCell { question: 1, .. })
        ));
        assert!(matches!(
            DecisionGrid::new(vec![row(1, -2.0)]),
            Err(GridError::NonPositivePayment { question: 1, .. })
        ));
        assert!(matches!(DecisionGrid::new(Vec::new()), Err(GridError::Empty)));
    }

    #[test]
    fn custom_template_parses_from_csv() {
        let csv = "question,x,y,i1,i2,m\n4, 1, 1, 2, 4, 3\n1,1,1,2,4,3\n";
        let grid = DecisionGrid::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(grid.rows()[0].question, 1);
        assert_eq!(grid.rows()[1].question, 4);
    }

    #[test]
    fn small_nu_overflows_but_probabilities_still_sum_to_one() {
        let grid = DecisionGrid::embedded().unwrap();
        let mut diag = Diagnostics::new();
        let solved = solve_grid(&grid, &Preferences::new(-0.99, -0.99, 5.0, 0.01), &mut diag).unwrap();
        assert!(diag.count(Warning::LuceOverflow) > 0);
        for r in solved.rows() {
            assert_eq!(r.prob_a + r.prob_b, 1.0);
            assert!((0.0..=1.0).contains(&r.prob_a));
        }
    }

    proptest! {
        #[test]
        fn probabilities_sum_to_one(
            r in -0.99f64..0.99,
            eta in -0.99f64..0.99,
            b in 0.0f64..10.0,
            nu in 0.01f64..5.0,
        ) {
            let grid = DecisionGrid::embedded().unwrap();
            let mut diag = Diagnostics::new();
            let solved = solve_grid(&grid, &Preferences::new(r, eta, b, nu), &mut diag).unwrap();
            for row in solved.rows() {
                prop_assert_eq!(row.prob_a + row.prob_b, 1.0);
                prop_assert!(row.eu_a.is_finite() && row.eu_b.is_finite());
            }
        }
    }
}
