//! Model evaluation over a Saltelli design.
//!
//! Every design row is an independent model run, so rows are evaluated on a
//! bounded worker pool with one integrator per worker. A failing row is
//! recorded as a failed outcome and never aborts the batch; the failure
//! report then excludes the affected samples from estimation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{ConfigError, IntegrationError, SensitivityError};
use crate::integrator::Integrator;
use crate::metrics::{MetricSet, MetricsRecord};
use crate::model::DerivativeModel;

use super::{DesignIndex, SobolDesign};

/// Shared counters for one evaluation of a design.
///
/// Clones observe the same state, so a caller keeps one handle to poll or
/// cancel while the evaluation holds another. The row total is set when
/// evaluation starts; `completed` counts finished rows, failed ones
/// included.
#[derive(Debug, Clone)]
pub struct EvaluationProgress {
    state: Arc<ProgressState>,
}

#[derive(Debug)]
struct ProgressState {
    completed: AtomicUsize,
    total: AtomicUsize,
    cancelled: AtomicBool,
}

impl EvaluationProgress {
    /// Tracker expecting `total` design rows.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            state: Arc::new(ProgressState {
                completed: AtomicUsize::new(0),
                total: AtomicUsize::new(total),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Rows finished so far, successful or not.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.state.completed.load(Ordering::Relaxed)
    }

    /// Rows in the design being evaluated.
    #[must_use]
    pub fn total(&self) -> usize {
        self.state.total.load(Ordering::Relaxed)
    }

    /// Completed fraction in `[0, 1]`; zero before evaluation starts.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => (self.completed() as f64 / total as f64).min(1.0),
        }
    }

    /// Record one finished row.
    pub fn increment(&self) {
        self.state.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Start counting a fresh design of `total` rows. The cancel flag is
    /// left as is, so a cancel issued before the run still applies.
    pub fn reset(&self, total: usize) {
        self.state.completed.store(0, Ordering::Relaxed);
        self.state.total.store(total, Ordering::Relaxed);
    }

    /// Stop scheduling new rows. Rows already running finish normally and
    /// the evaluation returns [`SensitivityError::Cancelled`].
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Relaxed)
    }
}

impl Default for EvaluationProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Everything needed to turn one parameter row into a metrics record.
#[derive(Clone, Copy)]
pub struct ModelEvaluator<'a> {
    pub model: &'a dyn DerivativeModel,
    pub initial_state: &'a [f64],
    pub output_times: &'a [f64],
    pub metrics: &'a MetricSet,
    pub threshold: f64,
}

impl ModelEvaluator<'_> {
    /// Integrate one parameter row and reduce the trajectory.
    pub fn evaluate<I: Integrator>(
        &self,
        integrator: &mut I,
        values: &[f64],
    ) -> Result<MetricsRecord, IntegrationError> {
        let params = self.model.schema().bind(values)?;
        let trajectory =
            integrator.integrate(self.model, self.initial_state, self.output_times, &params)?;
        Ok(self.metrics.evaluate(&trajectory, self.threshold))
    }
}

/// Result of one design row, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleOutcome {
    pub index: DesignIndex,
    pub result: Result<MetricsRecord, IntegrationError>,
}

impl SampleOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn evaluate_row<I: Integrator>(
    evaluator: &ModelEvaluator<'_>,
    design: &SobolDesign,
    integrator: &mut I,
    row: &mut Vec<f64>,
    index: DesignIndex,
    progress: Option<&EvaluationProgress>,
) -> Option<SampleOutcome> {
    if progress.is_some_and(EvaluationProgress::is_cancelled) {
        return None;
    }

    let result = design
        .fill_row(index, row)
        .map_err(IntegrationError::from)
        .and_then(|()| evaluator.evaluate(integrator, row));

    if let Err(err) = &result {
        tracing::warn!(
            block = ?index.block,
            sample = index.sample,
            params = ?row,
            error = %err,
            "sample failed to integrate"
        );
    }
    if let Some(p) = progress {
        p.increment();
    }

    Some(SampleOutcome { index, result })
}

/// Evaluate every row of `design`, in parallel on `workers` threads when the
/// `parallel` feature is on.
///
/// Each worker clones `integrator` once. Outcomes come back sorted by
/// design index. Cancellation through `progress` stops new rows from
/// starting and returns [`SensitivityError::Cancelled`].
pub fn evaluate_design<I: Integrator + Sync>(
    evaluator: &ModelEvaluator<'_>,
    integrator: &I,
    design: &SobolDesign,
    workers: usize,
    progress: Option<&EvaluationProgress>,
) -> Result<Vec<SampleOutcome>, SensitivityError> {
    if workers == 0 {
        return Err(ConfigError::Empty { field: "workers" }.into());
    }
    if let Some(p) = progress {
        p.reset(design.num_rows());
    }

    let indices: Vec<DesignIndex> = design.indices().collect();

    #[cfg(feature = "parallel")]
    let outcomes: Vec<Option<SampleOutcome>> = {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "workers",
                reason: e.to_string(),
            })?;
        pool.install(|| {
            indices
                .par_iter()
                .map_init(
                    || (integrator.clone(), Vec::with_capacity(design.num_parameters())),
                    |(integrator, row), &index| {
                        evaluate_row(evaluator, design, integrator, row, index, progress)
                    },
                )
                .collect()
        })
    };

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<Option<SampleOutcome>> = {
        let mut integrator = integrator.clone();
        let mut row = Vec::with_capacity(design.num_parameters());
        indices
            .iter()
            .map(|&index| evaluate_row(evaluator, design, &mut integrator, &mut row, index, progress))
            .collect()
    };

    if progress.is_some_and(EvaluationProgress::is_cancelled) {
        return Err(SensitivityError::Cancelled);
    }

    let mut outcomes: Vec<SampleOutcome> = outcomes.into_iter().flatten().collect();
    outcomes.sort_by_key(|o| o.index);
    Ok(outcomes)
}

/// One failed design row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleFailure {
    pub index: DesignIndex,
    pub parameters: Vec<f64>,
    pub error: IntegrationError,
}

/// Failed rows and the samples they exclude.
///
/// A failure in any block of sample `i` excludes sample `i` entirely: the
/// estimator needs `f(A_i)`, `f(B_i)` and every `f(AB_j,i)` together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FailureReport {
    pub total_samples: usize,
    /// Excluded sample indices, ascending.
    pub failed_samples: Vec<usize>,
    pub failures: Vec<SampleFailure>,
}

impl FailureReport {
    pub fn from_outcomes(design: &SobolDesign, outcomes: &[SampleOutcome]) -> Self {
        let mut failed = BTreeSet::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            if let Err(err) = &outcome.result {
                failed.insert(outcome.index.sample);
                failures.push(SampleFailure {
                    index: outcome.index,
                    parameters: design.row(outcome.index).unwrap_or_default(),
                    error: err.clone(),
                });
            }
        }
        Self {
            total_samples: design.num_samples(),
            failed_samples: failed.into_iter().collect(),
            failures,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failed_samples.len()
    }

    pub fn retained_count(&self) -> usize {
        self.total_samples - self.failed_samples.len()
    }

    /// Fraction of samples excluded.
    pub fn failure_rate(&self) -> f64 {
        if self.total_samples == 0 {
            0.0
        } else {
            self.failed_count() as f64 / self.total_samples as f64
        }
    }

    /// Samples that survived, ascending.
    pub fn retained_samples(&self) -> Vec<usize> {
        (0..self.total_samples)
            .filter(|i| self.failed_samples.binary_search(i).is_err())
            .collect()
    }

    /// Refuse to go on when the failure rate is above `tolerance`.
    pub fn check(&self, tolerance: f64) -> Result<(), SensitivityError> {
        let rate = self.failure_rate();
        if rate > tolerance {
            return Err(SensitivityError::TooManyFailures {
                failed: self.failed_count(),
                total: self.total_samples,
                tolerance,
            });
        }
        if rate > 0.0 && rate >= 0.5 * tolerance {
            tracing::warn!(
                failed = self.failed_count(),
                total = self.total_samples,
                rate,
                tolerance,
                "failure rate is approaching the tolerance"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DesignBlock, SampleMatrix};
    use crate::grid::Grid;
    use crate::integrator::{FixedStepIntegrator, IntegratorOptions};
    use crate::model::{ExponentialGrowth, ParameterSchema};

    fn design(rates: &[f64]) -> SobolDesign {
        let schema = ParameterSchema::new(["r"]).unwrap();
        let a = Grid::from_data(rates.len(), 1, rates.to_vec()).unwrap();
        let b = Grid::from_data(rates.len(), 1, rates.iter().map(|r| r * 0.5).collect()).unwrap();
        SobolDesign::new(
            SampleMatrix::new(schema.clone(), a).unwrap(),
            SampleMatrix::new(schema, b).unwrap(),
        )
        .unwrap()
    }

    fn run(
        rates: &[f64],
        options: IntegratorOptions,
        workers: usize,
        progress: Option<&EvaluationProgress>,
    ) -> Result<(SobolDesign, Vec<SampleOutcome>), SensitivityError> {
        let model = ExponentialGrowth::new();
        let metrics = MetricSet::population();
        let times: Vec<f64> = (0..=10).map(f64::from).collect();
        let evaluator = ModelEvaluator {
            model: &model,
            initial_state: &[1.0],
            output_times: &times,
            metrics: &metrics,
            threshold: 2.0,
        };
        let integrator = FixedStepIntegrator::new(options)?;
        let design = design(rates);
        let outcomes = evaluate_design(&evaluator, &integrator, &design, workers, progress)?;
        Ok((design, outcomes))
    }

    #[test]
    fn test_outcomes_sorted_and_complete() {
        let rates: Vec<f64> = (0..40).map(|i| 0.01 * f64::from(i)).collect();
        let progress = EvaluationProgress::default();
        let (design, outcomes) =
            run(&rates, IntegratorOptions::default(), 4, Some(&progress)).unwrap();

        assert_eq!(outcomes.len(), design.num_rows());
        assert_eq!(progress.completed(), design.num_rows());
        assert_eq!(progress.fraction(), 1.0);
        for (pos, outcome) in outcomes.iter().enumerate() {
            assert_eq!(design.position(outcome.index), pos);
        }

        // each A row reflects its own rate: peak = e^(10 r)
        for outcome in outcomes.iter().filter(|o| o.index.block == DesignBlock::A) {
            let r = rates[outcome.index.sample];
            let peak = outcome.result.as_ref().unwrap().values()[0];
            assert!((peak - (10.0 * r).exp()).abs() < 1e-6 * peak);
        }
    }

    #[test]
    fn test_single_worker_matches_many() {
        let rates: Vec<f64> = (0..16).map(|i| 0.02 * f64::from(i)).collect();
        let (_, one) = run(&rates, IntegratorOptions::default(), 1, None).unwrap();
        let (_, many) = run(&rates, IntegratorOptions::default(), 8, None).unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn test_failures_are_recorded_not_fatal() {
        // r >= 2.5 grows past the bound within ten years, r <= 0.1 does not
        let rates = [0.1, 5.0, 0.1, 0.1];
        let options = IntegratorOptions {
            divergence_bound: 1e6,
            ..Default::default()
        };
        let (design, outcomes) = run(&rates, options, 2, None).unwrap();
        assert_eq!(outcomes.len(), design.num_rows());

        let report = FailureReport::from_outcomes(&design, &outcomes);
        // sample 1 fails in every block: r = 5 in A, r = 2.5 in B and AB_0
        assert_eq!(report.failed_samples, vec![1]);
        assert_eq!(report.retained_samples(), vec![0, 2, 3]);
        assert!((report.failure_rate() - 0.25).abs() < 1e-12);
        assert!(report.failures.iter().all(|f| f.index.sample == 1));
        assert!(
            report
                .failures
                .iter()
                .any(|f| f.index.block == DesignBlock::A && f.parameters == vec![5.0])
        );

        assert!(report.check(0.3).is_ok());
        assert_eq!(
            report.check(0.1),
            Err(SensitivityError::TooManyFailures {
                failed: 1,
                total: 4,
                tolerance: 0.1
            })
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let progress = EvaluationProgress::new(0);
        progress.cancel();
        let err = run(&[0.1, 0.2], IntegratorOptions::default(), 2, Some(&progress)).unwrap_err();
        assert_eq!(err, SensitivityError::Cancelled);
        assert_eq!(progress.completed(), 0);
    }

    #[test]
    fn test_progress_clones_share_state() {
        let progress = EvaluationProgress::new(4);
        let handle = progress.clone();
        handle.increment();
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.fraction(), 0.25);

        handle.cancel();
        progress.reset(10);
        assert_eq!(handle.completed(), 0);
        assert_eq!(handle.total(), 10);
        assert!(progress.is_cancelled());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(run(&[0.1], IntegratorOptions::default(), 0, None).is_err());
    }
}
