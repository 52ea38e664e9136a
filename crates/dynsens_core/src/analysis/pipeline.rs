//! End-to-end sensitivity run: validate, sample, evaluate, estimate.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;

use crate::error::SensitivityError;
use crate::integrator::FixedStepIntegrator;
use crate::metrics::MetricsRecord;
use crate::model::DerivativeModel;

use super::{
    DesignIndex, DesignOutputs, EvaluationProgress, FailureReport, ModelEvaluator, SampleMatrix,
    SensitivityConfig, SensitivityResult, SobolDesign, draw_sample_matrices, estimate_indices,
    evaluate_design,
};

/// Metrics of one successful design row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    pub index: DesignIndex,
    pub metrics: MetricsRecord,
}

/// Everything a sensitivity run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityReport {
    pub model: String,
    /// Seed actually used, so the run can be repeated.
    pub seed: u64,
    pub config: SensitivityConfig,
    pub parameters: Vec<String>,
    pub metric_names: Vec<String>,
    pub output_times: Vec<f64>,
    pub sample_a: SampleMatrix,
    pub sample_b: SampleMatrix,
    /// Successful rows in design order.
    pub records: Vec<SampleRecord>,
    pub failures: FailureReport,
    /// One result per metric, in metric order.
    pub results: Vec<SensitivityResult>,
}

impl SensitivityReport {
    pub fn result(&self, metric: &str) -> Option<&SensitivityResult> {
        self.results.iter().find(|r| r.metric == metric)
    }

    pub fn retained_samples(&self) -> usize {
        self.failures.retained_count()
    }
}

/// Run the full pipeline for `model`.
///
/// Configuration problems fail before any sampling. Individual integration
/// failures are excluded and reported; the run only fails on them when the
/// failure rate exceeds `config.max_failure_rate`.
pub fn run_sensitivity(
    model: &dyn DerivativeModel,
    config: &SensitivityConfig,
    progress: Option<&EvaluationProgress>,
) -> Result<SensitivityReport, SensitivityError> {
    let output_times = config.validate(model)?;
    let schema = model.schema().clone();
    let seed = config.seed.unwrap_or_else(rand::random);
    let workers = config.worker_count();

    tracing::info!(
        model = model.name(),
        samples = config.num_samples,
        parameters = schema.len(),
        metrics = config.metrics.len(),
        workers,
        seed,
        "starting sensitivity run"
    );

    let mut rng = SmallRng::seed_from_u64(seed);
    let (a, b) = draw_sample_matrices(&schema, &config.parameters, config.num_samples, &mut rng)?;
    let design = SobolDesign::new(a, b)?;
    tracing::debug!(rows = design.num_rows(), "sampled design");

    let evaluator = ModelEvaluator {
        model,
        initial_state: &config.initial_state,
        output_times: &output_times,
        metrics: &config.metrics,
        threshold: config.threshold,
    };
    let integrator = FixedStepIntegrator::new(config.integrator.clone())?;
    let outcomes = evaluate_design(&evaluator, &integrator, &design, workers, progress)?;
    tracing::debug!(rows = outcomes.len(), "evaluated design");

    let failures = FailureReport::from_outcomes(&design, &outcomes);
    if !failures.is_empty() {
        tracing::warn!(
            failed_rows = failures.failures.len(),
            failed_samples = failures.failed_count(),
            total = failures.total_samples,
            "excluding samples with failed integrations"
        );
    }
    failures.check(config.max_failure_rate)?;

    let retained = failures.retained_samples();
    if retained.len() < 2 {
        return Err(SensitivityError::InsufficientSamples {
            retained: retained.len(),
            required: 2,
        });
    }

    let mut by_position: Vec<Option<&MetricsRecord>> = vec![None; design.num_rows()];
    for outcome in &outcomes {
        if let Ok(record) = &outcome.result {
            by_position[design.position(outcome.index)] = Some(record);
        }
    }

    let parameters = schema.names().to_vec();
    let mut results = Vec::with_capacity(config.metrics.len());
    for (m, spec) in config.metrics.iter().enumerate() {
        let outputs = DesignOutputs::gather(&design, &by_position, &retained, m)?;
        let result = estimate_indices(
            &spec.name,
            &parameters,
            &outputs,
            config.num_bootstrap,
            config.confidence_level,
            &mut rng,
        )?;
        tracing::debug!(metric = %spec.name, variance = result.variance, "estimated indices");
        results.push(result);
    }

    let records = outcomes
        .into_iter()
        .filter_map(|o| {
            o.result.ok().map(|metrics| SampleRecord {
                index: o.index,
                metrics,
            })
        })
        .collect();

    let (sample_a, sample_b) = design.into_matrices();

    tracing::info!(
        retained = retained.len(),
        failed = failures.failed_count(),
        "sensitivity run complete"
    );

    Ok(SensitivityReport {
        model: model.name().to_string(),
        seed,
        config: config.clone(),
        parameters,
        metric_names: config.metrics.names(),
        output_times,
        sample_a,
        sample_b,
        records,
        failures,
        results,
    })
}
