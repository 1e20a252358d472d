//! `est.info` / `est.log` writer used by estimation runs on disk.
//!
//! `est.info` is rewritten after every evaluation so it always shows the
//! latest state. `est.log` is appended to and keeps the full history.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::fit::tracker::{EvaluationTrace, OptimizerOutcome, Snapshot, TraceSink};
use crate::paras::ParaLabel;
use crate::report::ReportError;
use crate::report::format::{TERMINATED, format_estimation_info, format_log_entry, format_optimizer_return};

#[derive(Debug)]
pub struct FileTraceSink {
    info_path: PathBuf,
    log_path: PathBuf,
    log: File,
}

impl FileTraceSink {
    /// Start a fresh trace in `dir`, truncating any previous `est.log`.
    pub fn create(dir: &Path) -> Result<Self, ReportError> {
        let info_path = dir.join("est.info");
        let log_path = dir.join("est.log");
        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source: std::io::Error| ReportError::Io { path, source }
        };

        let mut log = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)
            .map_err(io_err(&log_path))?;
        writeln!(log, " interalt estimation log, started {}", Local::now().to_rfc3339())
            .map_err(io_err(&log_path))?;

        Ok(Self {
            info_path,
            log_path,
            log,
        })
    }

    pub fn info_path(&self) -> &Path {
        &self.info_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl TraceSink for FileTraceSink {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> std::io::Result<()> {
        std::fs::write(&self.info_path, format_estimation_info(snapshot.trace, snapshot.labels))?;
        self.log.write_all(format_log_entry(snapshot).as_bytes())?;
        self.log.flush()
    }

    fn finish(
        &mut self,
        trace: &EvaluationTrace,
        labels: &[ParaLabel],
        outcome: &OptimizerOutcome,
    ) -> std::io::Result<()> {
        let mut info = format_estimation_info(trace, labels);
        info.push_str(TERMINATED);
        std::fs::write(&self.info_path, info)?;
        self.log.write_all(format_optimizer_return(outcome).as_bytes())?;
        self.log.flush()
    }
}
