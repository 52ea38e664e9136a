//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{WrapErr, eyre};
use dynsens_core::analysis::{EvaluationProgress, SensitivityReport, run_sensitivity};
use dynsens_core::diffusion::{DiffusionConfig, DiffusionResult, simulate};

use crate::config::{SobolStudy, load_diffusion, load_sobol, to_yaml};
use crate::report::{diffusion_summary, sensitivity_summary, write_csv, write_json};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Options for the `diffuse` subcommand.
#[derive(Debug, Clone, Default)]
pub struct DiffuseOptions {
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

/// Options for the `sobol` subcommand. Set fields override the study file.
#[derive(Debug, Clone, Default)]
pub struct SobolOptions {
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub samples: Option<usize>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
}

pub fn run_diffuse(options: &DiffuseOptions) -> color_eyre::Result<DiffusionResult> {
    let config = load_diffusion(options.config.as_deref())?;
    let result = simulate(&config).wrap_err("diffusion run failed")?;

    print!("{}", diffusion_summary(&result));
    if let Some(path) = &options.output {
        write_json(path, &result)?;
    }
    if let Some(path) = &options.csv {
        write_csv(path, &result.concentration)?;
    }
    Ok(result)
}

/// Merge command-line overrides into the study.
pub fn apply_overrides(study: &mut SobolStudy, options: &SobolOptions) {
    if let Some(samples) = options.samples {
        study.analysis.num_samples = samples;
    }
    if options.seed.is_some() {
        study.analysis.seed = options.seed;
    }
    if options.workers.is_some() {
        study.analysis.workers = options.workers;
    }
}

pub fn run_sobol(options: &SobolOptions) -> color_eyre::Result<SensitivityReport> {
    let mut study = load_sobol(options.config.as_deref())?;
    apply_overrides(&mut study, options);

    let model = study.model.build();
    let progress = EvaluationProgress::default();
    let done = AtomicBool::new(false);

    let report = thread::scope(|scope| {
        scope.spawn(|| {
            let mut last = 0;
            while !done.load(Ordering::Relaxed) {
                thread::sleep(PROGRESS_INTERVAL);
                let completed = progress.completed();
                if completed != last && !done.load(Ordering::Relaxed) {
                    tracing::info!(
                        completed,
                        total = progress.total(),
                        percent = format_args!("{:.1}", progress.fraction() * 100.0),
                        "evaluating design"
                    );
                    last = completed;
                }
            }
        });
        let report = run_sensitivity(model.as_ref(), &study.analysis, Some(&progress));
        done.store(true, Ordering::Relaxed);
        report
    })
    .wrap_err("sensitivity analysis failed")?;

    print!("{}", sensitivity_summary(&report));
    if let Some(path) = &options.output {
        write_json(path, &report)?;
    }
    Ok(report)
}

/// Write a default study file for `kind` ("diffuse" or "sobol").
pub fn init_config(kind: &str, path: &Path) -> color_eyre::Result<()> {
    let yaml = match kind {
        "diffuse" => to_yaml(&DiffusionConfig::default())?,
        "sobol" => to_yaml(&SobolStudy::default())?,
        other => return Err(eyre!("unknown study kind '{other}'")),
    };
    if path.exists() {
        return Err(eyre!("'{}' already exists", path.display()));
    }
    std::fs::write(path, yaml).wrap_err_with(|| format!("failed to write '{}'", path.display()))?;
    tracing::info!(path = %path.display(), kind, "study file written");
    Ok(())
}
