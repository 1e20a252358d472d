//! Process-level error: a message plus the exit code the binary returns.
//!
//! Exit codes:
//!
//! - 2 configuration (init file, CLI overrides)
//! - 3 data (estimation sample, grid template contents)
//! - 4 estimation and integrity failures
//! - 5 I/O while writing outputs

use crate::data::SimulateError;
use crate::domain::IntegrityError;
use crate::fit::{CriterionError, EstimationError, GridError};
use crate::io::ingest::DataError;
use crate::io::init_file::ConfigError;
use crate::report::ReportError;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_DATA: u8 = 3;
pub const EXIT_ESTIMATION: u8 = 4;
pub const EXIT_IO: u8 = 5;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Integrity(_) => EXIT_ESTIMATION,
            _ => EXIT_CONFIG,
        };
        AppError::new(code, format!("Configuration error: {err}"))
    }
}

impl From<IntegrityError> for AppError {
    fn from(err: IntegrityError) -> Self {
        AppError::new(EXIT_ESTIMATION, format!("Integrity error: {err}"))
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        let code = match err {
            DataError::Io { .. } => EXIT_IO,
            _ => EXIT_DATA,
        };
        AppError::new(code, format!("Data error: {err}"))
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        let code = match err {
            ReportError::NoCommonCells => EXIT_DATA,
            _ => EXIT_IO,
        };
        AppError::new(code, format!("Output error: {err}"))
    }
}

impl From<GridError> for AppError {
    fn from(err: GridError) -> Self {
        let code = match err {
            GridError::Io { .. } => EXIT_IO,
            _ => EXIT_DATA,
        };
        AppError::new(code, format!("Grid error: {err}"))
    }
}

impl From<CriterionError> for AppError {
    fn from(err: CriterionError) -> Self {
        match err {
            CriterionError::Grid(inner) => inner.into(),
            unknown @ CriterionError::UnknownCell { .. } => AppError::new(EXIT_DATA, format!("Data error: {unknown}")),
            other => AppError::new(EXIT_ESTIMATION, format!("Criterion error: {other}")),
        }
    }
}

impl From<SimulateError> for AppError {
    fn from(err: SimulateError) -> Self {
        match err {
            SimulateError::Grid(inner) => inner.into(),
            SimulateError::Criterion(inner) => inner.into(),
            SimulateError::Data(inner) => inner.into(),
            SimulateError::Report(inner) => inner.into(),
            other => AppError::new(EXIT_ESTIMATION, format!("Simulation error: {other}")),
        }
    }
}

impl From<EstimationError> for AppError {
    fn from(err: EstimationError) -> Self {
        match err {
            EstimationError::Criterion(inner) => inner.into(),
            EstimationError::Data(inner) => inner.into(),
            EstimationError::Simulate(inner) => inner.into(),
            EstimationError::Report(inner) => inner.into(),
            EstimationError::Config(inner) => inner.into(),
            EstimationError::UnsupportedOptimizer(inner) => {
                AppError::new(EXIT_CONFIG, format!("Configuration error: {inner}"))
            }
            EstimationError::Trace(inner) => AppError::new(EXIT_IO, format!("Output error: {inner}")),
            other => AppError::new(EXIT_ESTIMATION, format!("Estimation error: {other}")),
        }
    }
}
