//! Configuration types for variance-based sensitivity runs.

use rand::{Rng, distr::Distribution};
use serde::{Deserialize, Serialize};

use crate::error::{
    ConfigError, Result, ensure_count, ensure_finite, ensure_non_negative, ensure_positive,
};
use crate::integrator::IntegratorOptions;
use crate::metrics::MetricSet;
use crate::model::{DerivativeModel, ParameterSchema};
use crate::trajectory::validate_times;

/// Marginal distribution a parameter is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterDistribution {
    Normal { mean: f64, std_dev: f64 },
    Uniform { low: f64, high: f64 },
    /// Always the same value; contributes no variance.
    Fixed { value: f64 },
}

impl ParameterDistribution {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal { .. } => "normal",
            Self::Uniform { .. } => "uniform",
            Self::Fixed { .. } => "fixed",
        }
    }

    fn invalid(&self, name: &str, reason: &str) -> ConfigError {
        ConfigError::Distribution {
            name: name.to_string(),
            distribution: self.label(),
            reason: reason.to_string(),
        }
    }

    /// Check the distribution can be sampled. `name` is only used for the
    /// error message.
    pub fn validate(&self, name: &str) -> Result<()> {
        match *self {
            Self::Normal { mean, std_dev } => {
                if !mean.is_finite() {
                    return Err(self.invalid(name, "mean must be finite"));
                }
                if !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(self.invalid(name, "std_dev must be non-negative and finite"));
                }
            }
            Self::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(self.invalid(name, "bounds must be finite"));
                }
                if low >= high {
                    return Err(self.invalid(name, "low must be below high"));
                }
            }
            Self::Fixed { value } => {
                if !value.is_finite() {
                    return Err(self.invalid(name, "value must be finite"));
                }
            }
        }
        Ok(())
    }

    /// Draw one value. Negative draws are returned as-is; flooring is the
    /// sampler's job.
    pub fn sample<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> Result<f64> {
        match *self {
            Self::Normal { mean, std_dev } => rand_distr::Normal::new(mean, std_dev)
                .map(|d| d.sample(rng))
                .map_err(|_| self.invalid(name, "std_dev must be non-negative and finite")),
            Self::Uniform { low, high } => rand_distr::Uniform::new(low, high)
                .map(|d| d.sample(rng))
                .map_err(|_| self.invalid(name, "low must be below high")),
            Self::Fixed { value } => Ok(value),
        }
    }
}

/// A parameter name paired with its distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedDistribution {
    pub name: String,
    pub distribution: ParameterDistribution,
}

impl NamedDistribution {
    pub fn new(name: impl Into<String>, distribution: ParameterDistribution) -> Self {
        Self {
            name: name.into(),
            distribution,
        }
    }

    pub fn normal(name: impl Into<String>, mean: f64, std_dev: f64) -> Self {
        Self::new(name, ParameterDistribution::Normal { mean, std_dev })
    }
}

/// Upper bound on the number of points a range of output times may expand to.
pub const MAX_OUTPUT_TIMES: usize = 10_000_000;

/// Requested output times: an explicit list or an evenly spaced range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputTimes {
    List(Vec<f64>),
    /// `start, start + step, ...` up to and including `end`.
    Range { start: f64, end: f64, step: f64 },
}

impl Default for OutputTimes {
    fn default() -> Self {
        Self::Range {
            start: 1.0,
            end: 200.0,
            step: 1.0,
        }
    }
}

impl OutputTimes {
    /// Expand to a validated, strictly increasing list.
    pub fn resolve(&self) -> Result<Vec<f64>> {
        let times = match *self {
            Self::List(ref times) => times.clone(),
            Self::Range { start, end, step } => {
                ensure_finite("output_times.start", start)?;
                ensure_finite("output_times.end", end)?;
                ensure_positive("output_times.step", step)?;
                if end < start {
                    return Err(ConfigError::Invalid {
                        field: "output_times",
                        reason: format!("end ({end}) is before start ({start})"),
                    });
                }
                // small slack so `end` survives rounding in (end - start) / step
                let intervals = ((end - start) / step + 1e-9).floor();
                let count = if intervals.is_finite() && intervals < MAX_OUTPUT_TIMES as f64 {
                    (intervals as usize).checked_add(1)
                } else {
                    None
                };
                let Some(count) = count.filter(|&n| n <= MAX_OUTPUT_TIMES) else {
                    return Err(ConfigError::Invalid {
                        field: "output_times.step",
                        reason: format!(
                            "step {step} over [{start}, {end}] gives more than {MAX_OUTPUT_TIMES} output times"
                        ),
                    });
                };
                (0..count).map(|i| start + step * i as f64).collect()
            }
        };
        validate_times(&times)?;
        Ok(times)
    }
}

/// Settings for one sensitivity run.
///
/// The defaults describe the logistic-growth scenario: growth rate
/// `r ~ N(0.05, 0.01)`, capacity `K ~ N(200, 50)`, an initial population of
/// 10, a threshold of 100 and yearly output over 200 years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    /// Rows in each of the two base sample matrices.
    pub num_samples: usize,
    /// Distributions in model parameter order.
    pub parameters: Vec<NamedDistribution>,
    pub initial_state: Vec<f64>,
    pub output_times: OutputTimes,
    pub metrics: MetricSet,
    /// Run-wide threshold for time-to-threshold metrics.
    pub threshold: f64,
    pub num_bootstrap: usize,
    pub confidence_level: f64,
    /// Random seed; drawn from entropy when absent.
    pub seed: Option<u64>,
    /// Largest tolerated fraction of failed samples.
    pub max_failure_rate: f64,
    pub integrator: IntegratorOptions,
    /// Worker threads for evaluation. Defaults to the available parallelism.
    pub workers: Option<usize>,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            num_samples: 2000,
            parameters: vec![
                NamedDistribution::normal("r", 0.05, 0.01),
                NamedDistribution::normal("K", 200.0, 50.0),
            ],
            initial_state: vec![10.0],
            output_times: OutputTimes::default(),
            metrics: MetricSet::population(),
            threshold: 100.0,
            num_bootstrap: 500,
            confidence_level: 0.95,
            seed: None,
            max_failure_rate: 0.05,
            integrator: IntegratorOptions::default(),
            workers: None,
        }
    }
}

impl SensitivityConfig {
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Validate against the model that will be run. Returns the resolved
    /// output times.
    pub fn validate(&self, model: &dyn DerivativeModel) -> Result<Vec<f64>> {
        if self.num_samples < 2 {
            return Err(ConfigError::Invalid {
                field: "num_samples",
                reason: format!("at least 2 samples are needed (got {})", self.num_samples),
            });
        }
        ensure_count("num_bootstrap", self.num_bootstrap)?;
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ConfigError::Invalid {
                field: "confidence_level",
                reason: format!("must lie strictly between 0 and 1 (got {})", self.confidence_level),
            });
        }
        ensure_non_negative("max_failure_rate", self.max_failure_rate)?;
        if self.max_failure_rate > 1.0 {
            return Err(ConfigError::Invalid {
                field: "max_failure_rate",
                reason: format!("must not exceed 1 (got {})", self.max_failure_rate),
            });
        }
        ensure_finite("threshold", self.threshold)?;
        if let Some(workers) = self.workers {
            ensure_count("workers", workers)?;
        }

        model.schema().ensure_matches(&self.parameter_names())?;
        for p in &self.parameters {
            p.distribution.validate(&p.name)?;
        }

        if self.initial_state.len() != model.dimension() {
            return Err(ConfigError::LengthMismatch {
                field: "initial_state",
                expected: model.dimension(),
                actual: self.initial_state.len(),
            });
        }
        for &v in &self.initial_state {
            ensure_finite("initial_state", v)?;
        }

        self.metrics.validate(model.dimension())?;
        self.integrator.validate()?;
        self.output_times.resolve()
    }

    /// Schema the sample matrices are laid out by.
    pub fn schema(&self) -> Result<ParameterSchema> {
        ParameterSchema::new(self.parameter_names())
    }
}
