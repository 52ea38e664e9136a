//! Command-line driver for the `dynsens_core` diffusion and sensitivity
//! engines.
//!
//! Studies are described in YAML files, run through the library, and
//! summarized on stdout with optional JSON and CSV output.

pub mod commands;
pub mod config;
pub mod logging;
pub mod report;

pub use logging::init_logging;
