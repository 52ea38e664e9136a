//! First-order and total-effect Sobol indices with bootstrap intervals.
//!
//! For one metric with outputs `yA`, `yB` and `yAB_j` over `n` samples and
//! total variance `V` (population variance of `yA` and `yB` pooled):
//!
//! - first order (Saltelli 2010): `S_j = mean(yB * (yAB_j - yA)) / V`
//! - total effect (Jansen 1999): `T_j = mean((yA - yAB_j)^2) / (2 V)`
//!
//! Both are Monte Carlo estimators and routinely land slightly below zero or
//! above one. They are reported as computed, never clamped.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, ensure_count};
use crate::grid::Grid;

use super::{DesignBlock, DesignIndex, SobolDesign};
use crate::metrics::MetricsRecord;

/// Model outputs of one metric over the design, restricted to usable
/// samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignOutputs {
    a: Vec<f64>,
    b: Vec<f64>,
    /// One row per parameter, one column per sample.
    ab: Grid<f64>,
}

impl DesignOutputs {
    pub fn new(a: Vec<f64>, b: Vec<f64>, ab: Vec<Vec<f64>>) -> Result<Self> {
        let n = a.len();
        if b.len() != n {
            return Err(ConfigError::LengthMismatch {
                field: "outputs of B",
                expected: n,
                actual: b.len(),
            });
        }
        let ab = Grid::from_rows(n, ab).ok_or_else(|| ConfigError::Invalid {
            field: "outputs of AB",
            reason: format!("every parameter needs exactly {n} outputs"),
        })?;
        Ok(Self { a, b, ab })
    }

    /// Gather metric `metric` for `samples` from outcome records laid out in
    /// design order (`records[design.position(index)]`).
    pub fn gather(
        design: &SobolDesign,
        records: &[Option<&MetricsRecord>],
        samples: &[usize],
        metric: usize,
    ) -> Result<Self> {
        let value = |block, sample| {
            let index = DesignIndex::new(block, sample);
            records
                .get(design.position(index))
                .copied()
                .flatten()
                .and_then(|r| r.value(metric))
                .ok_or_else(|| ConfigError::Invalid {
                    field: "outputs",
                    reason: format!("no output for {block:?} sample {sample}"),
                })
        };

        let a = samples
            .iter()
            .map(|&i| value(DesignBlock::A, i))
            .collect::<Result<Vec<_>>>()?;
        let b = samples
            .iter()
            .map(|&i| value(DesignBlock::B, i))
            .collect::<Result<Vec<_>>>()?;
        let ab = (0..design.num_parameters())
            .map(|j| {
                samples
                    .iter()
                    .map(|&i| value(DesignBlock::Mixed(j), i))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(a, b, ab)
    }

    pub fn num_samples(&self) -> usize {
        self.a.len()
    }

    pub fn num_parameters(&self) -> usize {
        self.ab.rows()
    }

    /// Pooled population variance of `yA` and `yB` over `samples`.
    fn variance(&self, samples: &[usize]) -> f64 {
        let count = 2 * samples.len();
        if count == 0 {
            return 0.0;
        }
        let pooled = || samples.iter().flat_map(|&i| [self.a[i], self.b[i]]);
        let mean = pooled().sum::<f64>() / count as f64;
        pooled().map(|y| (y - mean).powi(2)).sum::<f64>() / count as f64
    }

    /// `(S_j, T_j)` for every parameter over `samples` (with repeats for
    /// bootstrap resamples). Zero variance gives zero indices.
    fn indices(&self, samples: &[usize]) -> Vec<(f64, f64)> {
        let variance = self.variance(samples);
        let n = samples.len() as f64;
        (0..self.num_parameters())
            .map(|j| {
                if variance <= 0.0 {
                    return (0.0, 0.0);
                }
                let Some(ab) = self.ab.row(j) else {
                    return (0.0, 0.0);
                };
                let mut first = 0.0;
                let mut total = 0.0;
                for &i in samples {
                    first += self.b[i] * (ab[i] - self.a[i]);
                    total += (self.a[i] - ab[i]).powi(2);
                }
                (first / n / variance, total / n / (2.0 * variance))
            })
            .collect()
    }
}

/// Point estimate with bootstrap statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexEstimate {
    pub estimate: f64,
    /// Mean of the bootstrap replicates minus the estimate.
    pub bias: f64,
    /// Standard deviation of the bootstrap replicates.
    pub std_error: f64,
    /// Percentile interval `[low, high]`.
    pub ci: [f64; 2],
}

impl IndexEstimate {
    pub fn zero() -> Self {
        Self {
            estimate: 0.0,
            bias: 0.0,
            std_error: 0.0,
            ci: [0.0, 0.0],
        }
    }

    fn from_replicates(estimate: f64, replicates: &mut [f64], confidence_level: f64) -> Self {
        let count = replicates.len() as f64;
        let mean = replicates.iter().sum::<f64>() / count;
        let std_error = if replicates.len() > 1 {
            (replicates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (count - 1.0)).sqrt()
        } else {
            0.0
        };
        replicates.sort_by(f64::total_cmp);
        let alpha = 1.0 - confidence_level;
        Self {
            estimate,
            bias: mean - estimate,
            std_error,
            ci: [
                percentile(replicates, alpha / 2.0),
                percentile(replicates, 1.0 - alpha / 2.0),
            ],
        }
    }

    pub fn ci_contains(&self, value: f64) -> bool {
        self.ci[0] <= value && value <= self.ci[1]
    }

    /// Negative estimate whose interval lies entirely below zero.
    pub fn is_significantly_negative(&self) -> bool {
        self.ci[1] < 0.0
    }
}

/// Linear-interpolated percentile of sorted values, `p` in `[0, 1]`.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let pos = p.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Indices of one parameter for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterIndices {
    pub parameter: String,
    pub first_order: IndexEstimate,
    pub total_effect: IndexEstimate,
}

/// Indices of every parameter for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub metric: String,
    /// Total output variance the indices are normalized by.
    pub variance: f64,
    pub num_samples: usize,
    pub indices: Vec<ParameterIndices>,
}

impl SensitivityResult {
    pub fn get(&self, parameter: &str) -> Option<&ParameterIndices> {
        self.indices.iter().find(|p| p.parameter == parameter)
    }

    /// Sum of total-effect estimates, roughly one for a well-resolved run.
    pub fn total_effect_sum(&self) -> f64 {
        self.indices.iter().map(|p| p.total_effect.estimate).sum()
    }
}

/// Estimate indices for one metric with `num_bootstrap` resamples.
pub fn estimate_indices<R: Rng + ?Sized>(
    metric: &str,
    parameters: &[String],
    outputs: &DesignOutputs,
    num_bootstrap: usize,
    confidence_level: f64,
    rng: &mut R,
) -> Result<SensitivityResult> {
    ensure_count("num_bootstrap", num_bootstrap)?;
    if parameters.len() != outputs.num_parameters() {
        return Err(ConfigError::LengthMismatch {
            field: "parameters",
            expected: outputs.num_parameters(),
            actual: parameters.len(),
        });
    }
    let n = outputs.num_samples();
    if n == 0 {
        return Err(ConfigError::Empty {
            field: "num_samples",
        });
    }

    let all: Vec<usize> = (0..n).collect();
    let variance = outputs.variance(&all);

    if variance <= 0.0 {
        tracing::debug!(metric, "metric has zero variance; indices are zero");
        return Ok(SensitivityResult {
            metric: metric.to_string(),
            variance,
            num_samples: n,
            indices: parameters
                .iter()
                .map(|name| ParameterIndices {
                    parameter: name.clone(),
                    first_order: IndexEstimate::zero(),
                    total_effect: IndexEstimate::zero(),
                })
                .collect(),
        });
    }

    let point = outputs.indices(&all);

    // replicates[j] = (first-order draws, total-effect draws)
    let mut replicates: Vec<(Vec<f64>, Vec<f64>)> = (0..parameters.len())
        .map(|_| (Vec::with_capacity(num_bootstrap), Vec::with_capacity(num_bootstrap)))
        .collect();
    let mut resample = vec![0usize; n];
    for _ in 0..num_bootstrap {
        for slot in &mut resample {
            *slot = rng.random_range(0..n);
        }
        for (j, (s, t)) in outputs.indices(&resample).into_iter().enumerate() {
            replicates[j].0.push(s);
            replicates[j].1.push(t);
        }
    }

    let indices = parameters
        .iter()
        .zip(point)
        .zip(replicates.iter_mut())
        .map(|((name, (s, t)), (s_reps, t_reps))| ParameterIndices {
            parameter: name.clone(),
            first_order: IndexEstimate::from_replicates(s, s_reps, confidence_level),
            total_effect: IndexEstimate::from_replicates(t, t_reps, confidence_level),
        })
        .collect();

    Ok(SensitivityResult {
        metric: metric.to_string(),
        variance,
        num_samples: n,
        indices,
    })
}
