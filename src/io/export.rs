//! Export simulated samples (CSV), estimation results (JSON) and text reports.

use std::fs::File;
use std::path::Path;

use crate::data::SimulatedData;
use crate::fit::estimate::EstimationResult;
use crate::report::ReportError;

fn create(path: &Path) -> Result<File, ReportError> {
    File::create(path).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Write a simulated sample with its per-row annotations.
pub fn write_simulated_csv(path: &Path, data: &SimulatedData) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    for row in &data.rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn write_estimation_json(path: &Path, result: &EstimationResult) -> Result<(), ReportError> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, result)?;
    Ok(())
}

pub fn write_text(path: &Path, text: &str) -> Result<(), ReportError> {
    std::fs::write(path, text).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })
}
