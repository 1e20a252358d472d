//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - loads the decision grid
//! - runs the simulate / estimate / criterion pipelines
//! - prints terminal summaries

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, CriterionArgs, EstimateArgs, SimulateArgs};
use crate::error::AppError;
use crate::fit::grid::DecisionGrid;

pub mod pipeline;

/// Entry point for the `interalt` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let grid = pipeline::load_grid(cli.grid.as_deref())?;
    match cli.command {
        Command::Simulate(args) => handle_simulate(args, &grid),
        Command::Estimate(args) => handle_estimate(args, &grid),
        Command::Criterion(args) => handle_criterion(args, &grid),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // A subscriber may already be installed when running under a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_simulate(args: SimulateArgs, grid: &DecisionGrid) -> Result<(), AppError> {
    let run = pipeline::run_simulate(&args.init, &args.out_dir, grid)?;
    println!("=== interalt - simulation ===");
    println!("Agents: {} | rows: {} | seed: {}", run.data.agents, run.data.rows.len(), run.data.seed);
    match run.criterion {
        Some(value) => println!("Criterion at true parameters: {value:.6}"),
        None => println!("Criterion at true parameters: ---"),
    }
    println!("Sample: {}", run.csv_path.display());
    println!("Info:   {}", run.info_path.display());
    Ok(())
}

fn handle_estimate(args: EstimateArgs, grid: &DecisionGrid) -> Result<(), AppError> {
    let overrides = pipeline::EstimateOverrides {
        optimizer: args.optimizer,
        maxfun: args.maxfun,
    };
    let report = pipeline::run_estimate(&args.init, &args.out_dir, overrides, grid)?;

    println!("{}", crate::report::format::format_estimation_summary(&report.result));
    if let Some(cmp) = &report.comparison {
        println!("Choice share RMSE at estimate: {:.6}", cmp.rmse);
    }
    println!("Info:   {}", report.info_path.display());
    println!("Log:    {}", report.log_path.display());
    println!("Result: {}", report.result_path.display());
    Ok(())
}

fn handle_criterion(args: CriterionArgs, grid: &DecisionGrid) -> Result<(), AppError> {
    let out = pipeline::run_criterion(&args.init, args.data.as_deref(), args.agents, grid)?;
    println!(
        "Criterion {:.15} ({} subjects, {} rows from {})",
        out.value,
        out.subjects,
        out.rows,
        out.data.display()
    );
    Ok(())
}
