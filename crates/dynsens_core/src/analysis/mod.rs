//! Variance-based global sensitivity analysis.
//!
//! The pipeline draws two base sample matrices, expands them into a Saltelli
//! design, evaluates every design row through the model and integrator,
//! reduces each trajectory to named metrics and estimates first-order and
//! total-effect Sobol indices per metric:
//!
//! ```ignore
//! use dynsens_core::analysis::{SensitivityConfig, run_sensitivity};
//! use dynsens_core::model::LogisticGrowth;
//!
//! let config = SensitivityConfig {
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let report = run_sensitivity(&LogisticGrowth::new(), &config, None)?;
//! let maxpop = report.result("maxpop").unwrap();
//! println!("S_K = {}", maxpop.get("K").unwrap().first_order.estimate);
//! ```
//!
//! The individual stages are public too, for callers that want to evaluate
//! a design with their own [`Integrator`](crate::integrator::Integrator).

mod config;
mod evaluator;
mod pipeline;
mod sampler;
mod sobol;

pub use config::*;
pub use evaluator::*;
pub use pipeline::*;
pub use sampler::*;
pub use sobol::*;
