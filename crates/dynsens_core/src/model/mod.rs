//! Models that can be driven by the integrator.
//!
//! A model is anything implementing [`DerivativeModel`]: a pure function of
//! `(time, state, parameters)` returning the rate of change of each state
//! component. The integrator, the evaluator and the sensitivity pipeline only
//! ever see this trait, so new models plug in without touching them.

mod params;
mod population;

pub use params::{ParameterSchema, ParameterSet};
pub use population::{ExponentialGrowth, LogisticGrowth};

/// Right-hand side `dy/dt = f(t, y; p)` of an ordinary differential equation.
///
/// Implementations must be deterministic and free of side effects. The
/// integrator calls [`derivative`](Self::derivative) at its own internal
/// time points, which may fall between (or slightly outside) the requested
/// output times.
pub trait DerivativeModel: Send + Sync {
    /// Parameter names and column order this model reads.
    fn schema(&self) -> &ParameterSchema;

    /// Number of state components.
    fn dimension(&self) -> usize;

    /// Write `dy/dt` at `(time, state)` into `rate`.
    ///
    /// `state` and `rate` both have length [`dimension`](Self::dimension).
    fn derivative(&self, time: f64, state: &[f64], params: &ParameterSet<'_>, rate: &mut [f64]);

    /// Short label for logs and reports.
    fn name(&self) -> &str {
        "model"
    }
}
