use serde::Serialize;
use thiserror::Error;

/// Invalid input shape or bounds, raised before any simulation starts.
///
/// Every variant names the configuration field at fault so callers can point
/// users at the exact setting to fix.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum ConfigError {
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be finite (got {value})")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must be at least one")]
    Empty { field: &'static str },

    #[error("{field}: index {index} is out of range for length {len}")]
    IndexOutOfRange {
        field: &'static str,
        index: usize,
        len: usize,
    },

    #[error("{field}: expected length {expected}, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} must be strictly increasing (position {position})")]
    NotIncreasing { field: &'static str, position: usize },

    #[error("parameters[{name}]: {reason}")]
    Parameter { name: String, reason: String },

    #[error("invalid {distribution} distribution for parameters[{name}]: {reason}")]
    Distribution {
        name: String,
        distribution: &'static str,
        reason: String,
    },

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// The fixed-step integrator could not produce a trajectory for one sample.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum IntegrationError {
    #[error("step budget of {max_steps} exhausted at t={time}")]
    StepBudgetExceeded { max_steps: usize, time: f64 },

    #[error("state became non-finite at t={time}")]
    NonFinite { time: f64 },

    #[error("state magnitude {magnitude:e} exceeded divergence bound {bound:e} at t={time}")]
    Diverged {
        magnitude: f64,
        bound: f64,
        time: f64,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures of the sensitivity pipeline as a whole.
///
/// Per-sample integration failures never surface here directly; they are
/// collected in a failure report and only abort the run once the failure
/// rate exceeds the configured tolerance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensitivityError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{failed} of {total} samples failed to integrate (tolerance {tolerance})")]
    TooManyFailures {
        failed: usize,
        total: usize,
        tolerance: f64,
    },

    #[error("only {retained} usable samples remain, at least {required} are needed")]
    InsufficientSamples { retained: usize, required: usize },

    #[error("sensitivity run cancelled")]
    Cancelled,
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Reject non-finite values for `field`.
pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

/// Require a finite, strictly positive value for `field`.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<f64> {
    ensure_finite(field, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

/// Require a finite, non-negative value for `field`.
pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> Result<f64> {
    ensure_finite(field, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

/// Require a non-zero count for `field`.
pub(crate) fn ensure_count(field: &'static str, value: usize) -> Result<usize> {
    if value > 0 {
        Ok(value)
    } else {
        Err(ConfigError::Empty { field })
    }
}
