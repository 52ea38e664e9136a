//! Explicit finite-difference diffusion over a one-dimensional grid of cells.
//!
//! Each step computes the flux across every interior edge from the previous
//! concentrations, books it as outflow from the donor cell and inflow to the
//! receiving cell, then updates concentrations in place of the next row:
//!
//! ```text
//! flux(x -> x+1) = D * A * (c[x] - c[x+1]) / dx
//! c'[x]          = c[x] + (inflow[x] - outflow[x]) * dt / (dx * A)
//! ```
//!
//! The first and last cells have no neighbour across their outer edge; flux
//! there is zero, so the scheme conserves mass up to rounding.
//!
//! # Stability
//!
//! The scheme is forward-in-time. When `D * dt / dx^2` exceeds
//! [`STABILITY_LIMIT`] it overshoots, producing negative concentrations or
//! cells holding more than the initial peak. That behaviour is kept as-is:
//! [`simulate`] only logs a warning, and the caller chooses `step_duration`
//! and `cell_width` to stay within the bound.

use serde::{Deserialize, Serialize};

use crate::error::{
    ConfigError, Result, ensure_count, ensure_non_negative, ensure_positive,
};
use crate::grid::Grid;

/// Classical stability bound on `D * dt / dx^2` for this discretization.
pub const STABILITY_LIMIT: f64 = 0.5;

/// How the initial concentration is placed on the grid at step 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialProfile {
    /// All of the initial concentration sits in one cell, zero elsewhere.
    SourceCell { index: usize },
    /// The initial concentration is spread evenly over every cell, so the
    /// total matches the single-source case.
    Uniform,
}

impl Default for InitialProfile {
    fn default() -> Self {
        InitialProfile::SourceCell { index: 0 }
    }
}

/// Inputs for one diffusion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    pub initial_concentration: f64,
    pub num_cells: usize,
    pub cell_width: f64,
    pub num_steps: usize,
    pub step_duration: f64,
    pub diffusivity: f64,
    pub cross_section_area: f64,
    pub initial_profile: InitialProfile,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            initial_concentration: 10.0,
            num_cells: 10,
            cell_width: 1.0,
            num_steps: 100,
            step_duration: 1.0,
            diffusivity: 0.1,
            cross_section_area: 1.0,
            initial_profile: InitialProfile::default(),
        }
    }
}

impl DiffusionConfig {
    /// Check shapes and bounds before any stepping happens.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("initial_concentration", self.initial_concentration)?;
        ensure_count("num_cells", self.num_cells)?;
        ensure_positive("cell_width", self.cell_width)?;
        ensure_count("num_steps", self.num_steps)?;
        ensure_positive("step_duration", self.step_duration)?;
        ensure_non_negative("diffusivity", self.diffusivity)?;
        ensure_positive("cross_section_area", self.cross_section_area)?;
        if let InitialProfile::SourceCell { index } = self.initial_profile
            && index >= self.num_cells
        {
            return Err(ConfigError::IndexOutOfRange {
                field: "initial_profile.index",
                index,
                len: self.num_cells,
            });
        }
        Ok(())
    }

    /// `D * dt / dx^2`, the quantity bounded by [`STABILITY_LIMIT`].
    #[must_use]
    pub fn stability_number(&self) -> f64 {
        self.diffusivity * self.step_duration / (self.cell_width * self.cell_width)
    }

    #[must_use]
    pub fn is_stable(&self) -> bool {
        self.stability_number() <= STABILITY_LIMIT
    }

    /// Volume of one cell.
    #[must_use]
    pub fn cell_volume(&self) -> f64 {
        self.cell_width * self.cross_section_area
    }

    fn initial_row(&self, row: &mut [f64]) {
        match self.initial_profile {
            InitialProfile::SourceCell { index } => row[index] = self.initial_concentration,
            InitialProfile::Uniform => {
                let share = self.initial_concentration / self.num_cells as f64;
                row.fill(share);
            }
        }
    }
}

/// Concentration, inflow and outflow, each shaped `(num_steps, num_cells)`.
///
/// Time is the outer (row) index and space the inner (column) index. Row 0
/// of `concentration` holds the initial profile; the flux rows at step `t`
/// are the fluxes computed from concentrations at step `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffusionResult {
    pub config: DiffusionConfig,
    pub concentration: Grid<f64>,
    pub inflow: Grid<f64>,
    pub outflow: Grid<f64>,
}

impl DiffusionResult {
    pub fn num_steps(&self) -> usize {
        self.concentration.rows()
    }

    pub fn num_cells(&self) -> usize {
        self.concentration.cols()
    }

    /// Sum of concentrations over all cells at `step`.
    #[must_use]
    pub fn total_concentration(&self, step: usize) -> Option<f64> {
        self.concentration.row_sum(step)
    }

    /// Total mass at `step` (concentration times cell volume, summed).
    #[must_use]
    pub fn total_mass(&self, step: usize) -> Option<f64> {
        self.total_concentration(step)
            .map(|total| total * self.config.cell_volume())
    }

    /// Largest relative deviation of total mass from its initial value over
    /// all steps.
    #[must_use]
    pub fn max_mass_drift(&self) -> f64 {
        let initial = self.total_mass(0).unwrap_or(0.0);
        let scale = initial.abs().max(f64::MIN_POSITIVE);
        (0..self.concentration.rows())
            .filter_map(|step| self.total_mass(step))
            .map(|mass| (mass - initial).abs() / scale)
            .fold(0.0, f64::max)
    }

    /// Whether any cell left the range spanned by the initial profile.
    ///
    /// A stable explicit step never does; this is how overshoot shows up.
    #[must_use]
    pub fn exceeds_initial_bounds(&self) -> bool {
        let Some(initial) = self.concentration.row(0) else {
            return false;
        };
        let lo = initial.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = initial.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let tolerance = 1e-12 * hi.abs().max(1.0);
        self.concentration
            .data()
            .iter()
            .any(|&c| c < lo - tolerance || c > hi + tolerance)
    }
}

/// Step the diffusion forward and return all three grids.
///
/// Fails only on an invalid configuration. An unstable step size produces a
/// structurally valid but physically implausible result.
pub fn simulate(config: &DiffusionConfig) -> Result<DiffusionResult> {
    config.validate()?;

    let cells = config.num_cells;
    let steps = config.num_steps;
    let stability = config.stability_number();
    if stability > STABILITY_LIMIT {
        tracing::warn!(
            stability,
            limit = STABILITY_LIMIT,
            "explicit diffusion step exceeds the stability bound; expect overshoot"
        );
    }

    let mut concentration = Grid::new(steps, cells, 0.0);
    let mut inflow = Grid::new(steps, cells, 0.0);
    let mut outflow = Grid::new(steps, cells, 0.0);

    if let Some(first) = concentration.row_mut(0) {
        config.initial_row(first);
    }

    let conductance = config.diffusivity * config.cross_section_area / config.cell_width;
    let update = config.step_duration / config.cell_volume();

    for step in 0..steps {
        let (Some(conc), Some(qin), Some(qout)) = (
            concentration.row(step),
            inflow.row_mut(step),
            outflow.row_mut(step),
        ) else {
            break;
        };
        accumulate_fluxes(conc, conductance, qin, qout);

        let Some((prev, next)) = concentration.row_pair_mut(step) else {
            continue;
        };
        let (Some(qin), Some(qout)) = (inflow.row(step), outflow.row(step)) else {
            break;
        };
        for x in 0..cells {
            next[x] = prev[x] + (qin[x] - qout[x]) * update;
        }
    }

    tracing::debug!(cells, steps, stability, "diffusion run complete");

    Ok(DiffusionResult {
        config: config.clone(),
        concentration,
        inflow,
        outflow,
    })
}

/// Book the flux across every interior edge as outflow from the donor and
/// inflow to the receiver. Outer edges carry no flux.
fn accumulate_fluxes(conc: &[f64], conductance: f64, inflow: &mut [f64], outflow: &mut [f64]) {
    for x in 0..conc.len().saturating_sub(1) {
        let flux = conductance * (conc[x] - conc[x + 1]);
        if flux >= 0.0 {
            outflow[x] += flux;
            inflow[x + 1] += flux;
        } else {
            inflow[x] -= flux;
            outflow[x + 1] -= flux;
        }
    }
}

/// Run several independent configurations, in parallel when the `parallel`
/// feature is enabled. Results keep the input order.
pub fn simulate_batch(configs: &[DiffusionConfig]) -> Vec<Result<DiffusionResult>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        configs.par_iter().map(simulate).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        configs.iter().map(simulate).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stable_config() -> DiffusionConfig {
        DiffusionConfig {
            initial_concentration: 10.0,
            num_cells: 20,
            cell_width: 1.0,
            num_steps: 200,
            step_duration: 1.0,
            diffusivity: 0.2,
            cross_section_area: 2.0,
            initial_profile: InitialProfile::SourceCell { index: 0 },
        }
    }

    #[test]
    fn test_output_shape_matches_config() {
        let config = DiffusionConfig {
            num_cells: 7,
            num_steps: 13,
            ..stable_config()
        };
        let result = simulate(&config).unwrap();
        assert_eq!(result.concentration.shape(), (13, 7));
        assert_eq!(result.inflow.shape(), (13, 7));
        assert_eq!(result.outflow.shape(), (13, 7));
    }

    #[test]
    fn test_initial_row_single_source() {
        let config = DiffusionConfig {
            initial_profile: InitialProfile::SourceCell { index: 3 },
            ..stable_config()
        };
        let result = simulate(&config).unwrap();
        let first = result.concentration.row(0).unwrap();
        for (x, &c) in first.iter().enumerate() {
            if x == 3 {
                assert_eq!(c, 10.0);
            } else {
                assert_eq!(c, 0.0);
            }
        }
    }

    #[test]
    fn test_first_step_fluxes() {
        let config = DiffusionConfig {
            initial_concentration: 10.0,
            num_cells: 3,
            cell_width: 2.0,
            num_steps: 2,
            step_duration: 1.0,
            diffusivity: 0.5,
            cross_section_area: 4.0,
            initial_profile: InitialProfile::SourceCell { index: 1 },
        };
        let result = simulate(&config).unwrap();

        // conductance = 0.5 * 4 / 2 = 1, so 10 units leave cell 1 each way
        assert_eq!(result.outflow.row(0).unwrap(), &[0.0, 20.0, 0.0]);
        assert_eq!(result.inflow.row(0).unwrap(), &[10.0, 0.0, 10.0]);

        // update factor = dt / (dx * A) = 1 / 8
        let next = result.concentration.row(1).unwrap();
        assert!((next[0] - 1.25).abs() < 1e-12);
        assert!((next[1] - 7.5).abs() < 1e-12);
        assert!((next[2] - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_boundaries_have_no_outer_flux() {
        let config = DiffusionConfig {
            initial_profile: InitialProfile::SourceCell { index: 0 },
            ..stable_config()
        };
        let result = simulate(&config).unwrap();
        // the first cell can only lose mass to the right at step 0
        assert_eq!(result.inflow.get(0, 0), Some(&0.0));
        let last = config.num_cells - 1;
        assert_eq!(result.outflow.get(0, last), Some(&0.0));
    }

    #[test]
    fn test_mass_conserved_when_stable() {
        let config = stable_config();
        assert!(config.is_stable());
        let result = simulate(&config).unwrap();
        assert!(
            result.max_mass_drift() < 1e-6,
            "mass drifted by {}",
            result.max_mass_drift()
        );
        assert!(!result.exceeds_initial_bounds());
        assert!(result.concentration.data().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_stable_run_spreads_toward_uniform() {
        let config = DiffusionConfig {
            num_cells: 5,
            num_steps: 5000,
            diffusivity: 0.4,
            ..stable_config()
        };
        let result = simulate(&config).unwrap();
        let last = result.concentration.row(config.num_steps - 1).unwrap();
        for &c in last {
            assert!((c - 2.0).abs() < 1e-3, "expected ~2.0, got {c}");
        }
    }

    #[test]
    fn test_uniform_profile_stays_uniform() {
        let config = DiffusionConfig {
            initial_profile: InitialProfile::Uniform,
            num_cells: 4,
            ..stable_config()
        };
        let result = simulate(&config).unwrap();
        for row in result.concentration.iter_rows() {
            for &c in row {
                assert!((c - 2.5).abs() < 1e-12);
            }
        }
        assert!(result.outflow.data().iter().all(|&q| q == 0.0));
    }

    #[test]
    fn test_unstable_step_overshoots() {
        let config = DiffusionConfig {
            initial_concentration: 10.0,
            num_cells: 10,
            cell_width: 1.0,
            num_steps: 3,
            step_duration: 10.0,
            diffusivity: 0.8,
            cross_section_area: 1.0,
            initial_profile: InitialProfile::SourceCell { index: 0 },
        };
        assert!(config.stability_number() > STABILITY_LIMIT);
        let result = simulate(&config).unwrap();

        assert!(result.exceeds_initial_bounds());
        // 10 - 0.8 * 10 * 10 = -70 after one step
        assert!((result.concentration.get(1, 0).unwrap() + 70.0).abs() < 1e-9);
        assert!(result.concentration.data().iter().all(|c| !c.is_nan()));
        // overshoot does not create or destroy mass
        assert!(result.max_mass_drift() < 1e-6);
    }

    #[test]
    fn test_zero_diffusivity_is_static() {
        let config = DiffusionConfig {
            diffusivity: 0.0,
            ..stable_config()
        };
        let result = simulate(&config).unwrap();
        let first = result.concentration.row(0).unwrap().to_vec();
        for row in result.concentration.iter_rows() {
            assert_eq!(row, first.as_slice());
        }
    }

    #[test]
    fn test_single_step_and_single_cell() {
        let one_step = DiffusionConfig {
            num_steps: 1,
            ..stable_config()
        };
        let result = simulate(&one_step).unwrap();
        assert_eq!(result.concentration.rows(), 1);

        let one_cell = DiffusionConfig {
            num_cells: 1,
            ..stable_config()
        };
        let result = simulate(&one_cell).unwrap();
        assert!(result.concentration.column(0).all(|&c| c == 10.0));
    }

    #[test]
    fn test_invalid_config_names_field() {
        let cases = [
            (
                DiffusionConfig {
                    num_cells: 0,
                    ..stable_config()
                },
                "num_cells",
            ),
            (
                DiffusionConfig {
                    cell_width: 0.0,
                    ..stable_config()
                },
                "cell_width",
            ),
            (
                DiffusionConfig {
                    num_steps: 0,
                    ..stable_config()
                },
                "num_steps",
            ),
            (
                DiffusionConfig {
                    diffusivity: -0.1,
                    ..stable_config()
                },
                "diffusivity",
            ),
            (
                DiffusionConfig {
                    initial_profile: InitialProfile::SourceCell { index: 99 },
                    ..stable_config()
                },
                "initial_profile.index",
            ),
        ];

        for (config, field) in cases {
            let err = simulate(&config).unwrap_err();
            assert!(
                err.to_string().contains(field),
                "error `{err}` should mention {field}"
            );
        }
    }

    #[test]
    fn test_batch_preserves_order() {
        let configs: Vec<DiffusionConfig> = (1..=4)
            .map(|n| DiffusionConfig {
                num_cells: n,
                ..stable_config()
            })
            .collect();
        let results = simulate_batch(&configs);
        for (n, result) in (1..=4).zip(results) {
            assert_eq!(result.unwrap().concentration.cols(), n);
        }
    }
}
