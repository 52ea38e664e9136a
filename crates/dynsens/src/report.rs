//! Rendering of run results for the terminal and for files.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use color_eyre::eyre::WrapErr;
use dynsens_core::analysis::{IndexEstimate, SensitivityReport};
use dynsens_core::diffusion::{DiffusionResult, STABILITY_LIMIT};
use dynsens_core::grid::Grid;
use serde::Serialize;

fn format_estimate(est: &IndexEstimate) -> String {
    format!("{:>7.3} [{:>6.3}, {:>6.3}]", est.estimate, est.ci[0], est.ci[1])
}

/// Plain-text tables of first-order and total-effect indices, one block per
/// metric, followed by the failure summary.
pub fn sensitivity_summary(report: &SensitivityReport) -> String {
    let mut out = String::new();
    let level = report.config.confidence_level * 100.0;
    let _ = writeln!(
        out,
        "Sobol analysis of {} ({} samples, seed {})",
        report.model, report.config.num_samples, report.seed
    );

    let width = report
        .parameters
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("parameter".len());

    for result in &report.results {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}  (variance {:.4e}, {} samples, {level:.0}% CI)",
            result.metric, result.variance, result.num_samples
        );
        let _ = writeln!(
            out,
            "  {:<width$}  {:<25}  {:<25}",
            "parameter", "first order", "total effect"
        );
        for p in &result.indices {
            let mut line = format!(
                "  {:<width$}  {:<25}  {:<25}",
                p.parameter,
                format_estimate(&p.first_order),
                format_estimate(&p.total_effect)
            );
            if p.first_order.is_significantly_negative() {
                line.push_str("  (negative first order: increase samples)");
            }
            let _ = writeln!(out, "{}", line.trim_end());
        }
        let _ = writeln!(out, "  sum of total effects: {:.3}", result.total_effect_sum());
    }

    let failures = &report.failures;
    let _ = writeln!(out);
    if failures.is_empty() {
        let _ = writeln!(out, "All {} samples evaluated", failures.total_samples);
    } else {
        let _ = writeln!(
            out,
            "{} of {} samples excluded ({:.1}%)",
            failures.failed_count(),
            failures.total_samples,
            failures.failure_rate() * 100.0
        );
        for failure in failures.failures.iter().take(5) {
            let _ = writeln!(
                out,
                "  {:?} sample {}: {}",
                failure.index.block, failure.index.sample, failure.error
            );
        }
        if failures.failures.len() > 5 {
            let _ = writeln!(out, "  ... {} more", failures.failures.len() - 5);
        }
    }
    out
}

/// Stability and conservation summary of a diffusion run.
pub fn diffusion_summary(result: &DiffusionResult) -> String {
    let config = &result.config;
    let mut out = String::new();
    let stability = config.stability_number();
    let _ = writeln!(
        out,
        "Diffusion over {} cells, {} steps of {}",
        result.num_cells(),
        result.num_steps(),
        config.step_duration
    );
    let _ = writeln!(
        out,
        "stability number: {stability:.4} (limit {STABILITY_LIMIT}){}",
        if config.is_stable() { "" } else { "  UNSTABLE" }
    );
    if let Some((lo, hi)) = result.concentration.min_max() {
        let _ = writeln!(out, "concentration range: [{lo:.6}, {hi:.6}]");
    }
    let _ = writeln!(out, "max mass drift: {:.3e}", result.max_mass_drift());
    if result.exceeds_initial_bounds() {
        let _ = writeln!(out, "overshoot: concentrations left the initial range");
    }
    if let Some(row) = result.concentration.row(result.num_steps().saturating_sub(1)) {
        let cells: Vec<String> = row.iter().map(|c| format!("{c:.4}")).collect();
        let _ = writeln!(out, "final profile: {}", cells.join(" "));
    }
    out
}

/// Render a grid as CSV with a leading `step` column.
pub fn grid_to_csv(grid: &Grid<f64>) -> String {
    let mut out = String::from("step");
    for col in 0..grid.cols() {
        let _ = write!(out, ",cell_{col}");
    }
    out.push('\n');
    for (step, row) in grid.iter_rows().enumerate() {
        let _ = write!(out, "{step}");
        for value in row {
            let _ = write!(out, ",{value}");
        }
        out.push('\n');
    }
    out
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> color_eyre::Result<()> {
    let json = serde_json::to_string_pretty(value).wrap_err("failed to serialize results")?;
    fs::write(path, json).wrap_err_with(|| format!("failed to write '{}'", path.display()))?;
    tracing::info!(path = %path.display(), "results written");
    Ok(())
}

pub fn write_csv(path: &Path, grid: &Grid<f64>) -> color_eyre::Result<()> {
    fs::write(path, grid_to_csv(grid))
        .wrap_err_with(|| format!("failed to write '{}'", path.display()))
}
