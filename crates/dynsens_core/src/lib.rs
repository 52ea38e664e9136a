//! Numerical simulation and sensitivity analysis for small dynamical models
//!
//! This crate provides:
//! - An explicit finite-difference stepper for 1-D diffusion with flux accounting
//! - A derivative-model contract with typed parameter schemas
//! - Fixed-step (Euler / RK4) integration onto requested output times
//! - Trajectory metrics (peak value, time to threshold, ...)
//! - Variance-based (Sobol) sensitivity analysis with bootstrap intervals
//!
//! # Sensitivity analysis
//!
//! ```ignore
//! use dynsens_core::{LogisticGrowth, SensitivityConfig, run_sensitivity};
//!
//! let config = SensitivityConfig { seed: Some(7), ..Default::default() };
//! let report = run_sensitivity(&LogisticGrowth::new(), &config, None)?;
//! for result in &report.results {
//!     for p in &result.indices {
//!         println!("{} {} S={:.3} T={:.3}", result.metric, p.parameter,
//!             p.first_order.estimate, p.total_effect.estimate);
//!     }
//! }
//! ```
//!
//! # Diffusion
//!
//! ```ignore
//! use dynsens_core::diffusion::{DiffusionConfig, simulate};
//!
//! let result = simulate(&DiffusionConfig::default())?;
//! let final_mass = result.total_mass(result.num_steps() - 1);
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod analysis;
pub mod diffusion;
pub mod error;
pub mod grid;
pub mod integrator;
pub mod metrics;
pub mod trajectory;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use analysis::{
    EvaluationProgress, SensitivityConfig, SensitivityReport, SensitivityResult, run_sensitivity,
};
pub use diffusion::{DiffusionConfig, DiffusionResult};
pub use error::{ConfigError, IntegrationError, SensitivityError};
pub use integrator::{FixedStepIntegrator, IntegrationMethod, IntegratorOptions};
pub use model::{DerivativeModel, ExponentialGrowth, LogisticGrowth, ParameterSchema};
pub use trajectory::Trajectory;
