//! Time series of model state produced by the integrator.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, ensure_finite};
use crate::grid::Grid;

/// Ordered `(time, state)` points with strictly increasing times.
///
/// Always holds at least one point, so the final time is always defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrajectory")]
pub struct Trajectory {
    times: Vec<f64>,
    states: Grid<f64>,
}

/// Unchecked wire form; deserialization goes through [`Trajectory::new`].
#[derive(Deserialize)]
struct RawTrajectory {
    times: Vec<f64>,
    states: Grid<f64>,
}

impl TryFrom<RawTrajectory> for Trajectory {
    type Error = ConfigError;

    fn try_from(raw: RawTrajectory) -> Result<Self> {
        Self::new(raw.times, raw.states)
    }
}

impl Trajectory {
    /// Build from times and a `(times.len(), dimension)` state grid.
    pub fn new(times: Vec<f64>, states: Grid<f64>) -> Result<Self> {
        validate_times(&times)?;
        if states.rows() != times.len() {
            return Err(ConfigError::LengthMismatch {
                field: "states",
                expected: times.len(),
                actual: states.rows(),
            });
        }
        Ok(Self { times, states })
    }

    /// Build a one-component trajectory from parallel time and value lists.
    pub fn from_series(times: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        let rows = values.len();
        let states = Grid::from_data(rows, 1, values).ok_or(ConfigError::LengthMismatch {
            field: "values",
            expected: times.len(),
            actual: rows,
        })?;
        Self::new(times, states)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.states.cols()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &Grid<f64> {
        &self.states
    }

    /// State vector at point `index`.
    pub fn state(&self, index: usize) -> Option<&[f64]> {
        self.states.row(index)
    }

    pub fn final_time(&self) -> f64 {
        // non-empty by construction
        self.times.last().copied().unwrap_or(f64::NAN)
    }

    pub fn final_state(&self) -> &[f64] {
        self.states
            .row(self.times.len().saturating_sub(1))
            .unwrap_or(&[])
    }

    /// Values of one state component over time.
    pub fn component(&self, component: usize) -> impl Iterator<Item = f64> + '_ {
        self.states.column(component).copied()
    }

    /// `(time, value)` pairs for one state component.
    pub fn series(&self, component: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.component(component))
    }

    /// Time of the first point whose `component` strictly exceeds `threshold`.
    pub fn first_time_above(&self, component: usize, threshold: f64) -> Option<f64> {
        self.series(component)
            .find(|&(_, value)| value > threshold)
            .map(|(time, _)| time)
    }
}

/// Output times must be non-empty, finite and strictly increasing.
pub(crate) fn validate_times(times: &[f64]) -> Result<()> {
    if times.is_empty() {
        return Err(ConfigError::Empty {
            field: "output_times",
        });
    }
    for (i, &t) in times.iter().enumerate() {
        ensure_finite("output_times", t)?;
        if i > 0 && t <= times[i - 1] {
            return Err(ConfigError::NotIncreasing {
                field: "output_times",
                position: i,
            });
        }
    }
    Ok(())
}
