//! Integration tests for the simulation and sensitivity pipeline
//!
//! Tests are organized by topic:
//! - `sensitivity_pipeline` - End-to-end Sobol runs on the population models
//! - `failure_policy` - Exclusion of failed samples, tolerance and cancellation
//! - `diffusion_scenarios` - Conservation and overshoot of the diffusion stepper

mod sensitivity_pipeline;
