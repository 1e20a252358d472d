//! Text layouts for `est.info`, `est.log`, `compare.info`, simulation `.info`
//! files and terminal summaries.

use crate::domain::{HUGE_FLOAT, ModelSpec};
use crate::fit::estimate::EstimationResult;
use crate::fit::tracker::{EvaluationTrace, OptimizerOutcome, Snapshot};
use crate::io::ingest::ObservedData;
use crate::paras::ParaLabel;
use crate::report::{ChoiceComparison, question_counts};

/// 25-wide, 15 decimals; sentinel-sized values print as `---`.
pub fn fmt_float(value: f64) -> String {
    if !value.is_finite() || value.abs() >= HUGE_FLOAT {
        format!("{:>25}", "---")
    } else {
        format!("{value:>25.15}")
    }
}

pub fn char_floats(values: &[f64]) -> Vec<String> {
    values.iter().map(|&v| fmt_float(v)).collect()
}

/// Current state of a run, rewritten after every evaluation.
pub fn format_estimation_info(trace: &EvaluationTrace, labels: &[ParaLabel]) -> String {
    let mut out = String::new();
    let header = format!("{:>14}{:>25}{:>25}{:>25}\n", "", "Start", "Step", "Current");

    out.push_str("\n Criterion Function\n\n");
    out.push_str(&header);
    out.push('\n');
    let f = char_floats(&[trace.f_start, trace.f_step, trace.f_current]);
    out.push_str(&format!("{:>14}{}{}{}\n", "", f[0], f[1], f[2]));

    out.push_str("\n Economic Parameters\n\n");
    out.push_str(&format!("{:>14}{:>25}{:>25}{:>25}\n\n", "Identifier", "Start", "Step", "Current"));
    for (i, label) in labels.iter().enumerate() {
        let x = char_floats(&[trace.x_start[i], trace.x_step[i], trace.x_current[i]]);
        out.push_str(&format!("{:>14}{}{}{}\n", label.as_str(), x[0], x[1], x[2]));
    }

    out.push_str(&format!(
        "\n Number of Evaluations {:>10}\n Number of Steps       {:>10}\n",
        trace.num_eval, trace.num_step
    ));
    out
}

pub const TERMINATED: &str = "\n TERMINATED\n";

/// One `est.log` block.
pub fn format_log_entry(snapshot: &Snapshot<'_>) -> String {
    let trace = snapshot.trace;
    let mut out = String::new();
    out.push_str(&format!(
        "\n EVALUATION {:>6} STEP {:>6}\n\n",
        trace.num_eval, trace.num_step
    ));
    out.push_str(&format!("   Criterion {}\n\n", fmt_float(trace.f_current)));
    out.push_str(&format!("{:>14}{:>25}{:>25}\n\n", "Identifier", "Economic", "Optimizer"));
    for (i, label) in snapshot.labels.iter().enumerate() {
        out.push_str(&format!(
            "{:>14}{}{}\n",
            label.as_str(),
            fmt_float(trace.x_current[i]),
            fmt_float(snapshot.optimizer_values[i])
        ));
    }
    if !snapshot.warnings.is_empty() {
        out.push_str("\n   Warnings\n\n");
        for warning in snapshot.warnings {
            out.push_str(&format!("     {warning}\n"));
        }
    }
    out
}

pub fn format_optimizer_return(outcome: &OptimizerOutcome) -> String {
    format!(
        "\n OPTIMIZER RETURN\n\n   Message  {}\n   Success  {}\n",
        outcome.message,
        if outcome.success { "True" } else { "False" }
    )
}

pub fn format_comparison(cmp: &ChoiceComparison) -> String {
    let mut out = String::new();
    out.push_str("\n Comparison of Choice Shares (option A)\n\n");
    out.push_str(&format!(
        "{:>10}{:>12}{:>14}{:>14}{:>10}{:>10}\n\n",
        "Question", "m", "Observed", "Simulated", "N Obs", "N Sim"
    ));
    for c in &cmp.cells {
        out.push_str(&format!(
            "{:>10}{:>12.2}{:>14.4}{:>14.4}{:>10}{:>10}\n",
            c.question, c.m, c.observed, c.simulated, c.n_observed, c.n_simulated
        ));
    }
    out.push_str(&format!("\n RMSE {:>14.6}\n", cmp.rmse));
    out
}

/// Contents of `<file>.info` written next to a simulated sample.
pub fn format_simulation_info(spec: &ModelSpec, observed: &ObservedData, criterion: Option<f64>) -> String {
    let mut out = String::new();
    out.push_str("\n Simulation\n\n");
    out.push_str(&format!("   Agents {:>10}\n   Seed   {:>10}\n", spec.simulation.agents, spec.simulation.seed));

    out.push_str("\n Economic Parameters\n\n");
    for para in spec.paras.iter() {
        out.push_str(&format!(
            "{:>14}{}{:>8}\n",
            para.label().as_str(),
            fmt_float(para.value()),
            if para.is_fixed() { "fixed" } else { "free" }
        ));
    }

    out.push_str("\n Criterion at True Parameters\n\n");
    match criterion {
        Some(value) => out.push_str(&format!("{:>14}{}\n", "", fmt_float(value))),
        None => out.push_str(&format!("{:>14}{:>25}\n", "", "---")),
    }

    out.push_str("\n Share of Option A by Question\n\n");
    for (question, (a, n)) in question_counts(observed) {
        out.push_str(&format!("{question:>14}{:>12.4}{n:>10}\n", a as f64 / n as f64));
    }
    out
}

/// Terminal summary of an estimation run.
pub fn format_estimation_summary(result: &EstimationResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== interalt - estimation ({}) ===\n", result.optimizer));
    out.push_str(&format!("Criterion: start={:.6} best={:.6}\n", result.f_start, result.f_step));
    out.push_str(&format!(
        "Evaluations: {} | steps: {} | success: {}\n",
        result.num_eval, result.num_step, result.success
    ));
    out.push_str(&format!("Message: {}\n", result.message));
    out.push_str("\nEstimates:\n");
    for para in result.best.iter() {
        let tag = if para.is_fixed() { " (fixed)" } else { "" };
        out.push_str(&format!("  {:<4} {:>12.6}{tag}\n", para.label().as_str(), para.value()));
    }
    out
}
