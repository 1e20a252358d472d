//! Input/output helpers.
//!
//! - initialization files (`init_file`)
//! - observed choice CSV ingest + validation (`ingest`)
//! - simulated sample and result exports (CSV/JSON) (`export`)
//! - `est.info` / `est.log` trace files (`trace_files`)

pub mod export;
pub mod ingest;
pub mod init_file;
pub mod trace_files;

pub use export::*;
pub use ingest::*;
pub use init_file::*;
pub use trace_files::*;
