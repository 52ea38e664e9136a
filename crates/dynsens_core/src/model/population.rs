use super::{DerivativeModel, ParameterSchema, ParameterSet};
use crate::error::Result;

/// Unbounded growth, `dP/dt = r P`.
#[derive(Debug, Clone)]
pub struct ExponentialGrowth {
    schema: ParameterSchema,
}

impl ExponentialGrowth {
    pub const RATE: usize = 0;

    pub fn new() -> Self {
        Self::with_names("r")
            .unwrap_or_else(|_| unreachable!("a single non-blank name is a valid schema"))
    }

    /// Use a custom name for the growth-rate parameter.
    pub fn with_names(rate: &str) -> Result<Self> {
        Ok(Self {
            schema: ParameterSchema::new([rate])?,
        })
    }
}

impl Default for ExponentialGrowth {
    fn default() -> Self {
        Self::new()
    }
}

impl DerivativeModel for ExponentialGrowth {
    fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    fn dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _time: f64, state: &[f64], params: &ParameterSet<'_>, rate: &mut [f64]) {
        rate[0] = params.value(Self::RATE) * state[0];
    }

    fn name(&self) -> &str {
        "exponential"
    }
}

/// Growth that saturates at a carrying capacity, `dP/dt = r P (1 - P/K)`.
///
/// A zero capacity (a floored negative draw) makes the logistic term
/// undefined; the population is then held constant rather than dividing by
/// zero, so the sample stays finite.
#[derive(Debug, Clone)]
pub struct LogisticGrowth {
    schema: ParameterSchema,
}

impl LogisticGrowth {
    pub const RATE: usize = 0;
    pub const CAPACITY: usize = 1;

    pub fn new() -> Self {
        Self::with_names("r", "K")
            .unwrap_or_else(|_| unreachable!("two distinct names are a valid schema"))
    }

    /// Use custom names for the rate and capacity parameters.
    pub fn with_names(rate: &str, capacity: &str) -> Result<Self> {
        Ok(Self {
            schema: ParameterSchema::new([rate, capacity])?,
        })
    }
}

impl Default for LogisticGrowth {
    fn default() -> Self {
        Self::new()
    }
}

impl DerivativeModel for LogisticGrowth {
    fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    fn dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _time: f64, state: &[f64], params: &ParameterSet<'_>, rate: &mut [f64]) {
        let r = params.value(Self::RATE);
        let k = params.value(Self::CAPACITY);
        let p = state[0];
        rate[0] = if k > 0.0 { r * p * (1.0 - p / k) } else { 0.0 };
    }

    fn name(&self) -> &str {
        "logistic"
    }
}
