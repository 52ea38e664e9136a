//! Fixed-step integration of a [`DerivativeModel`] onto a requested time grid.
//!
//! Each output interval is split into `substeps` equal internal steps, so
//! the model is evaluated at times finer than the output grid. Every run is
//! capped by a step budget, and a state that turns non-finite or grows past
//! the divergence bound fails the run instead of returning garbage. These
//! failures are per-sample: the sensitivity evaluator records them and moves
//! on.

use serde::{Deserialize, Serialize};

use crate::error::{
    ConfigError, IntegrationError, ensure_count, ensure_positive,
};
use crate::grid::Grid;
use crate::model::{DerivativeModel, ParameterSet};
use crate::trajectory::{Trajectory, validate_times};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Forward Euler, first order.
    Euler,
    /// Classical fourth-order Runge-Kutta.
    #[default]
    RungeKutta4,
}

/// Settings for [`FixedStepIntegrator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorOptions {
    pub method: IntegrationMethod,
    /// Internal steps per output interval.
    pub substeps: usize,
    /// Maximum internal steps for one trajectory.
    pub max_steps: usize,
    /// Largest state magnitude accepted before the run counts as diverged.
    pub divergence_bound: f64,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::RungeKutta4,
            substeps: 10,
            max_steps: 100_000,
            divergence_bound: 1e12,
        }
    }
}

impl IntegratorOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_count("integrator.substeps", self.substeps)?;
        ensure_count("integrator.max_steps", self.max_steps)?;
        ensure_positive("integrator.divergence_bound", self.divergence_bound)?;
        Ok(())
    }
}

/// Anything that turns a model, an initial state and parameters into a
/// trajectory on the requested times.
///
/// Integrators may keep scratch state between calls, so each concurrent
/// worker needs its own instance.
pub trait Integrator: Clone + Send {
    fn integrate(
        &mut self,
        model: &dyn DerivativeModel,
        initial: &[f64],
        times: &[f64],
        params: &ParameterSet<'_>,
    ) -> Result<Trajectory, IntegrationError>;
}

/// Explicit fixed-step integrator (Euler or RK4).
#[derive(Debug, Clone)]
pub struct FixedStepIntegrator {
    options: IntegratorOptions,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    stage: Vec<f64>,
}

impl FixedStepIntegrator {
    pub fn new(options: IntegratorOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            options,
            k1: Vec::new(),
            k2: Vec::new(),
            k3: Vec::new(),
            k4: Vec::new(),
            stage: Vec::new(),
        })
    }

    pub fn options(&self) -> &IntegratorOptions {
        &self.options
    }

    fn resize(&mut self, n: usize) {
        for buf in [
            &mut self.k1,
            &mut self.k2,
            &mut self.k3,
            &mut self.k4,
            &mut self.stage,
        ] {
            buf.clear();
            buf.resize(n, 0.0);
        }
    }

    /// Advance `y` by one step of size `h` from time `t`.
    fn step(
        &mut self,
        model: &dyn DerivativeModel,
        params: &ParameterSet<'_>,
        t: f64,
        h: f64,
        y: &mut [f64],
    ) {
        match self.options.method {
            IntegrationMethod::Euler => {
                model.derivative(t, y, params, &mut self.k1);
                for (yi, k) in y.iter_mut().zip(&self.k1) {
                    *yi += h * k;
                }
            }
            IntegrationMethod::RungeKutta4 => {
                let half = 0.5 * h;

                model.derivative(t, y, params, &mut self.k1);

                for i in 0..y.len() {
                    self.stage[i] = y[i] + half * self.k1[i];
                }
                model.derivative(t + half, &self.stage, params, &mut self.k2);

                for i in 0..y.len() {
                    self.stage[i] = y[i] + half * self.k2[i];
                }
                model.derivative(t + half, &self.stage, params, &mut self.k3);

                for i in 0..y.len() {
                    self.stage[i] = y[i] + h * self.k3[i];
                }
                model.derivative(t + h, &self.stage, params, &mut self.k4);

                for i in 0..y.len() {
                    y[i] += h / 6.0 * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
                }
            }
        }
    }

    fn check_state(&self, t: f64, y: &[f64]) -> Result<(), IntegrationError> {
        let mut magnitude: f64 = 0.0;
        for &v in y {
            if !v.is_finite() {
                return Err(IntegrationError::NonFinite { time: t });
            }
            magnitude = magnitude.max(v.abs());
        }
        if magnitude > self.options.divergence_bound {
            return Err(IntegrationError::Diverged {
                magnitude,
                bound: self.options.divergence_bound,
                time: t,
            });
        }
        Ok(())
    }
}

impl Integrator for FixedStepIntegrator {
    fn integrate(
        &mut self,
        model: &dyn DerivativeModel,
        initial: &[f64],
        times: &[f64],
        params: &ParameterSet<'_>,
    ) -> Result<Trajectory, IntegrationError> {
        let n = model.dimension();
        if initial.len() != n {
            return Err(ConfigError::LengthMismatch {
                field: "initial_state",
                expected: n,
                actual: initial.len(),
            }
            .into());
        }
        if params.schema() != model.schema() {
            return Err(ConfigError::Invalid {
                field: "parameters",
                reason: format!(
                    "parameter set {:?} does not match model schema {:?}",
                    params.schema().names(),
                    model.schema().names()
                ),
            }
            .into());
        }
        validate_times(times)?;

        self.resize(n);
        let mut states = Grid::new(times.len(), n, 0.0);
        let mut y = initial.to_vec();
        self.check_state(times[0], &y)?;
        if let Some(first) = states.row_mut(0) {
            first.copy_from_slice(&y);
        }

        let substeps = self.options.substeps;
        let mut taken = 0usize;

        for (i, window) in times.windows(2).enumerate() {
            let (start, end) = (window[0], window[1]);
            let h = (end - start) / substeps as f64;
            for s in 0..substeps {
                let t = start + h * s as f64;
                if taken == self.options.max_steps {
                    return Err(IntegrationError::StepBudgetExceeded {
                        max_steps: self.options.max_steps,
                        time: t,
                    });
                }
                self.step(model, params, t, h, &mut y);
                taken += 1;
                self.check_state(t + h, &y)?;
            }
            if let Some(row) = states.row_mut(i + 1) {
                row.copy_from_slice(&y);
            }
        }

        Ok(Trajectory::new(times.to_vec(), states)?)
    }
}
