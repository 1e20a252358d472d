//! Observed choice data ingest.
//!
//! - Strict schema: `subject`, `question`, `m` and `choice` are required; any
//!   other column (simulated annotations, `i1`, `i2`) is ignored.
//! - Rows are kept in file order. Subject order is order of first appearance,
//!   which is what [`ObservedData::subset`] uses.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fit::grid::CellKey;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("estimation dataset '{0}' does not exist")]
    Missing(String),
    #[error("failed to open '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("line {line}: invalid {column} '{value}'")]
    InvalidField {
        line: usize,
        column: &'static str,
        value: String,
    },
    #[error("requested {requested} subjects but only {available} are available")]
    NotEnoughSubjects { requested: usize, available: usize },
}

const REQUIRED: [&str; 4] = ["subject", "question", "m", "choice"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedRow {
    pub subject: String,
    pub question: u8,
    pub m: f64,
    /// 1 = option A, 0 = option B.
    pub choice: u8,
}

impl ObservedRow {
    pub fn key(&self) -> CellKey {
        CellKey::new(self.question, self.m)
    }

    pub fn chose_a(&self) -> bool {
        self.choice == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedData {
    rows: Vec<ObservedRow>,
}

impl ObservedData {
    pub fn new(rows: Vec<ObservedRow>) -> Result<Self, DataError> {
        for (i, row) in rows.iter().enumerate() {
            if row.choice > 1 {
                return Err(DataError::InvalidField {
                    line: i + 2,
                    column: "choice",
                    value: row.choice.to_string(),
                });
            }
            if !row.m.is_finite() {
                return Err(DataError::InvalidField {
                    line: i + 2,
                    column: "m",
                    value: row.m.to_string(),
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ObservedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct subjects in order of first appearance.
    pub fn subjects(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|r| seen.insert(r.subject.as_str()))
            .map(|r| r.subject.as_str())
            .collect()
    }

    /// Rows of the first `n` subjects.
    pub fn subset(&self, n: usize) -> Result<Self, DataError> {
        let subjects = self.subjects();
        if n > subjects.len() {
            return Err(DataError::NotEnoughSubjects {
                requested: n,
                available: subjects.len(),
            });
        }
        let keep: HashSet<&str> = subjects.into_iter().take(n).collect();
        let rows = self
            .rows
            .iter()
            .filter(|r| keep.contains(r.subject.as_str()))
            .cloned()
            .collect();
        Ok(Self { rows })
    }
}

/// Load observed data and keep the first `agents` subjects.
pub fn load_estimation_sample(path: &Path, agents: usize) -> Result<ObservedData, DataError> {
    if !path.exists() {
        return Err(DataError::Missing(path.display().to_string()));
    }
    let data = read_observed_csv(path)?;
    let sample = data.subset(agents)?;
    tracing::info!(
        path = %path.display(),
        subjects = agents,
        rows = sample.len(),
        "loaded estimation sample"
    );
    Ok(sample)
}

pub fn read_observed_csv(path: &Path) -> Result<ObservedData, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_observed(file)
}

pub fn read_observed<R: Read>(reader: R) -> Result<ObservedData, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let header_map = build_header_map(&headers);
    for col in REQUIRED {
        if !header_map.contains_key(col) {
            return Err(DataError::MissingColumn(col));
        }
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        rows.push(parse_row(&record, &header_map, i + 2)?);
    }
    ObservedData::new(rows)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
        .collect()
}

fn field<'r>(
    record: &'r StringRecord,
    header_map: &HashMap<String, usize>,
    column: &'static str,
    line: usize,
) -> Result<&'r str, DataError> {
    header_map
        .get(column)
        .and_then(|&i| record.get(i))
        .filter(|s| !s.is_empty())
        .ok_or(DataError::InvalidField {
            line,
            column,
            value: String::new(),
        })
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>, line: usize) -> Result<ObservedRow, DataError> {
    let invalid = |column: &'static str, value: &str| DataError::InvalidField {
        line,
        column,
        value: value.to_string(),
    };

    let subject = field(record, header_map, "subject", line)?.to_string();

    let raw = field(record, header_map, "question", line)?;
    let question = raw.parse::<u8>().map_err(|_| invalid("question", raw))?;

    let raw = field(record, header_map, "m", line)?;
    let m = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid("m", raw))?;

    let raw = field(record, header_map, "choice", line)?;
    let choice = match raw {
        "1" | "1.0" | "True" | "true" => 1,
        "0" | "0.0" | "False" | "false" => 0,
        _ => return Err(invalid("choice", raw)),
    };

    Ok(ObservedRow {
        subject,
        question,
        m,
        choice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
subject,question,i1,i2,m,choice
7,1,2,4,-0.5,1
7,1,2,4,2,0
3,1,2,4,-0.5,0
9,2,1,3,5,1
3,2,1,3,5,True
";

    #[test]
    fn reads_required_columns_and_ignores_extras() {
        let data = read_observed(SAMPLE.as_bytes()).unwrap();
        assert_eq!(data.len(), 5);
        assert_eq!(data.rows()[0].subject, "7");
        assert_eq!(data.rows()[4].choice, 1);
        assert_eq!(data.subjects(), vec!["7", "3", "9"]);
    }

    #[test]
    fn subset_keeps_first_subjects_in_order_of_appearance() {
        let data = read_observed(SAMPLE.as_bytes()).unwrap();
        let sub = data.subset(2).unwrap();
        assert_eq!(sub.subjects(), vec!["7", "3"]);
        assert_eq!(sub.len(), 4);
    }

    #[test]
    fn subset_rejects_too_many_subjects() {
        let data = read_observed(SAMPLE.as_bytes()).unwrap();
        assert!(matches!(
            data.subset(4),
            Err(DataError::NotEnoughSubjects { requested: 4, available: 3 })
        ));
    }

    #[test]
    fn bad_rows_report_line_numbers() {
        let csv = "subject,question,m,choice\n1,1,2,1\n1,1,5,2\n";
        let err = read_observed(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::InvalidField { line: 3, column: "choice", .. }));

        let csv = "subject,question,choice\n1,1,1\n";
        assert!(matches!(read_observed(csv.as_bytes()), Err(DataError::MissingColumn("m"))));
    }

    #[test]
    fn missing_file_is_a_data_error() {
        let err = load_estimation_sample(Path::new("/nonexistent/interalt/data.csv"), 1).unwrap_err();
        assert!(matches!(err, DataError::Missing(_)));
    }
}
