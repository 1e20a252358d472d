//! Command-line parsing for the intertemporal altruism estimator.
//!
//! Argument parsing and dispatch stay here; the model code never sees clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::OptimizerKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "interalt",
    version,
    about = "Simulate and estimate an intertemporal altruism model with Luce choice"
)]
pub struct Cli {
    /// Log at debug level instead of RUST_LOG / info.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Decision grid template CSV (defaults to the embedded grid).
    #[arg(long, global = true)]
    pub grid: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate a sample at the init file's parameters.
    Simulate(SimulateArgs),
    /// Estimate the free parameters on the init file's estimation sample.
    Estimate(EstimateArgs),
    /// Evaluate the criterion once at the init file's parameters.
    Criterion(CriterionArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Initialization file.
    #[arg(long)]
    pub init: PathBuf,

    /// Directory for `<file>.csv` and `<file>.info`.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct EstimateArgs {
    /// Initialization file.
    #[arg(long)]
    pub init: PathBuf,

    /// Directory for `est.info`, `est.log` and `est.result.json`.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Override the optimizer named in the init file.
    #[arg(long, value_enum)]
    pub optimizer: Option<OptimizerKind>,

    /// Override the evaluation budget.
    #[arg(long)]
    pub maxfun: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct CriterionArgs {
    /// Initialization file.
    #[arg(long)]
    pub init: PathBuf,

    /// Observed choices CSV (defaults to the init file's estimation file).
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Number of subjects to use (defaults to the init file's estimation agents).
    #[arg(long)]
    pub agents: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn estimate_overrides_parse() {
        let cli = Cli::try_parse_from([
            "interalt",
            "estimate",
            "--init",
            "model.ini",
            "--optimizer",
            "nelder-mead",
            "--maxfun",
            "50",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Estimate(args) => {
                assert_eq!(args.optimizer, Some(OptimizerKind::NelderMead));
                assert_eq!(args.maxfun, Some(50));
                assert_eq!(args.out_dir, PathBuf::from("."));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_optimizer_is_rejected() {
        let parsed = Cli::try_parse_from(["interalt", "estimate", "--init", "m.ini", "--optimizer", "powell"]);
        assert!(parsed.is_err());
    }
}
