//! Parameter sampling and the Saltelli cross-substitution design.
//!
//! Two independent base matrices `A` and `B` (one row per sample, one column
//! per parameter) are drawn from the configured marginals. The design
//! evaluated by the model consists of `A`, `B` and, for every parameter `j`,
//! a matrix `AB_j` equal to `A` with column `j` taken from `B`. That is
//! `n * (d + 2)` model runs for `n` samples and `d` parameters.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::grid::Grid;
use crate::model::{ParameterSchema, ParameterSet};

use super::NamedDistribution;

/// A `(num_samples, num_parameters)` matrix laid out by a parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMatrix {
    schema: ParameterSchema,
    values: Grid<f64>,
}

impl SampleMatrix {
    pub fn new(schema: ParameterSchema, values: Grid<f64>) -> Result<Self> {
        if values.cols() != schema.len() {
            return Err(ConfigError::LengthMismatch {
                field: "sample matrix columns",
                expected: schema.len(),
                actual: values.cols(),
            });
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    pub fn num_samples(&self) -> usize {
        self.values.rows()
    }

    pub fn num_parameters(&self) -> usize {
        self.values.cols()
    }

    /// `(num_samples, num_parameters)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    pub fn values(&self) -> &Grid<f64> {
        &self.values
    }

    pub fn row(&self, sample: usize) -> Option<&[f64]> {
        self.values.row(sample)
    }

    pub fn column(&self, parameter: usize) -> impl Iterator<Item = f64> + '_ {
        self.values.column(parameter).copied()
    }

    /// Row `sample` bound to the schema.
    pub fn parameter_set(&self, sample: usize) -> Option<ParameterSet<'_>> {
        self.row(sample)
            .and_then(|values| self.schema.bind(values).ok())
    }
}

/// Draw one matrix. Negative draws are floored to zero, never resampled, so
/// the sample count is exact.
fn draw_matrix<R: Rng + ?Sized>(
    schema: &ParameterSchema,
    parameters: &[NamedDistribution],
    num_samples: usize,
    rng: &mut R,
) -> Result<SampleMatrix> {
    let mut values = Grid::new(num_samples, parameters.len(), 0.0);
    for row in 0..num_samples {
        for (col, param) in parameters.iter().enumerate() {
            let draw = param.distribution.sample(&param.name, rng)?;
            if let Some(cell) = values.get_mut(row, col) {
                *cell = draw.max(0.0);
            }
        }
    }
    SampleMatrix::new(schema.clone(), values)
}

/// Draw the two independent base matrices `(A, B)`.
///
/// `parameters` must list the schema's names in schema order.
pub fn draw_sample_matrices<R: Rng + ?Sized>(
    schema: &ParameterSchema,
    parameters: &[NamedDistribution],
    num_samples: usize,
    rng: &mut R,
) -> Result<(SampleMatrix, SampleMatrix)> {
    let names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
    schema.ensure_matches(&names)?;
    if num_samples == 0 {
        return Err(ConfigError::Empty {
            field: "num_samples",
        });
    }

    let a = draw_matrix(schema, parameters, num_samples, rng)?;
    let b = draw_matrix(schema, parameters, num_samples, rng)?;
    Ok((a, b))
}

/// Which design matrix a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignBlock {
    A,
    B,
    /// `AB_j`: `A` with column `j` taken from `B`.
    Mixed(usize),
}

impl DesignBlock {
    /// Position of the block in design order.
    pub fn ordinal(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::Mixed(j) => 2 + j,
        }
    }
}

/// Origin of one design row. Orders by block, then by sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DesignIndex {
    pub block: DesignBlock,
    pub sample: usize,
}

impl DesignIndex {
    pub fn new(block: DesignBlock, sample: usize) -> Self {
        Self { block, sample }
    }
}

/// Base matrices plus the cross-substituted blocks derived from them.
#[derive(Debug, Clone)]
pub struct SobolDesign {
    a: SampleMatrix,
    b: SampleMatrix,
}

impl SobolDesign {
    pub fn new(a: SampleMatrix, b: SampleMatrix) -> Result<Self> {
        if a.schema() != b.schema() {
            return Err(ConfigError::Invalid {
                field: "sample matrices",
                reason: "A and B use different parameter schemas".to_string(),
            });
        }
        if a.shape() != b.shape() {
            return Err(ConfigError::LengthMismatch {
                field: "sample matrices",
                expected: a.num_samples(),
                actual: b.num_samples(),
            });
        }
        Ok(Self { a, b })
    }

    pub fn a(&self) -> &SampleMatrix {
        &self.a
    }

    pub fn b(&self) -> &SampleMatrix {
        &self.b
    }

    pub fn schema(&self) -> &ParameterSchema {
        self.a.schema()
    }

    pub fn num_samples(&self) -> usize {
        self.a.num_samples()
    }

    pub fn num_parameters(&self) -> usize {
        self.a.num_parameters()
    }

    pub fn num_blocks(&self) -> usize {
        self.num_parameters() + 2
    }

    /// Total model runs, `n * (d + 2)`.
    pub fn num_rows(&self) -> usize {
        self.num_samples() * self.num_blocks()
    }

    pub fn blocks(&self) -> impl Iterator<Item = DesignBlock> {
        [DesignBlock::A, DesignBlock::B]
            .into_iter()
            .chain((0..self.num_parameters()).map(DesignBlock::Mixed))
    }

    /// Every design row index in design order.
    pub fn indices(&self) -> impl Iterator<Item = DesignIndex> + '_ {
        let n = self.num_samples();
        self.blocks()
            .flat_map(move |block| (0..n).map(move |sample| DesignIndex::new(block, sample)))
    }

    /// Flat position of `index` in design order.
    pub fn position(&self, index: DesignIndex) -> usize {
        index.block.ordinal() * self.num_samples() + index.sample
    }

    /// Write the parameter row for `index` into `out`.
    pub fn fill_row(&self, index: DesignIndex, out: &mut Vec<f64>) -> Result<()> {
        let out_of_range = || ConfigError::IndexOutOfRange {
            field: "design sample",
            index: index.sample,
            len: self.num_samples(),
        };
        out.clear();
        match index.block {
            DesignBlock::A => out.extend_from_slice(self.a.row(index.sample).ok_or_else(out_of_range)?),
            DesignBlock::B => out.extend_from_slice(self.b.row(index.sample).ok_or_else(out_of_range)?),
            DesignBlock::Mixed(j) => {
                if j >= self.num_parameters() {
                    return Err(ConfigError::IndexOutOfRange {
                        field: "design block",
                        index: j,
                        len: self.num_parameters(),
                    });
                }
                let a = self.a.row(index.sample).ok_or_else(out_of_range)?;
                let b = self.b.row(index.sample).ok_or_else(out_of_range)?;
                out.extend_from_slice(a);
                out[j] = b[j];
            }
        }
        Ok(())
    }

    pub fn row(&self, index: DesignIndex) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.num_parameters());
        self.fill_row(index, &mut out)?;
        Ok(out)
    }

    pub fn into_matrices(self) -> (SampleMatrix, SampleMatrix) {
        (self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ParameterDistribution;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn schema() -> ParameterSchema {
        ParameterSchema::new(["r", "K"]).unwrap()
    }

    fn matrix(rows: &[[f64; 2]]) -> SampleMatrix {
        let grid = Grid::from_rows(2, rows.iter().map(|r| r.to_vec())).unwrap();
        SampleMatrix::new(schema(), grid).unwrap()
    }

    #[test]
    fn test_shape_and_floor() {
        // N(0, 1) is negative half the time, N(-50, 1) always
        let params = vec![
            NamedDistribution::normal("r", 0.0, 1.0),
            NamedDistribution::normal("K", -50.0, 1.0),
        ];
        let mut rng = SmallRng::seed_from_u64(11);
        let (a, b) = draw_sample_matrices(&schema(), &params, 500, &mut rng).unwrap();

        assert_eq!(a.shape(), (500, 2));
        assert_eq!(b.shape(), (500, 2));
        for m in [&a, &b] {
            assert!(m.values().data().iter().all(|&v| v >= 0.0));
        }
        // floored, not discarded: the all-negative column is all zeros
        assert!(a.column(1).all(|v| v == 0.0));
        // and some positive draws survive in the other column
        assert!(a.column(0).any(|v| v > 0.0));
    }

    #[test]
    fn test_matrices_are_independent_and_seeded() {
        let params = vec![
            NamedDistribution::normal("r", 0.05, 0.01),
            NamedDistribution::new("K", ParameterDistribution::Uniform { low: 100.0, high: 300.0 }),
        ];
        let draw = |seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            draw_sample_matrices(&schema(), &params, 50, &mut rng).unwrap()
        };
        let (a1, b1) = draw(5);
        let (a2, b2) = draw(5);
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
        assert_ne!(a1, b1);
    }

    #[test]
    fn test_rejects_mismatched_parameters() {
        let params = vec![NamedDistribution::normal("r", 0.05, 0.01)];
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(draw_sample_matrices(&schema(), &params, 10, &mut rng).is_err());
    }

    #[test]
    fn test_design_rows() {
        let a = matrix(&[[1.0, 2.0], [3.0, 4.0]]);
        let b = matrix(&[[10.0, 20.0], [30.0, 40.0]]);
        let design = SobolDesign::new(a, b).unwrap();

        assert_eq!(design.num_rows(), 8);
        let indices: Vec<_> = design.indices().collect();
        assert_eq!(indices.len(), 8);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        for (pos, &index) in indices.iter().enumerate() {
            assert_eq!(design.position(index), pos);
        }

        assert_eq!(design.row(DesignIndex::new(DesignBlock::A, 1)).unwrap(), vec![3.0, 4.0]);
        assert_eq!(design.row(DesignIndex::new(DesignBlock::B, 0)).unwrap(), vec![10.0, 20.0]);
        assert_eq!(
            design.row(DesignIndex::new(DesignBlock::Mixed(0), 1)).unwrap(),
            vec![30.0, 4.0]
        );
        assert_eq!(
            design.row(DesignIndex::new(DesignBlock::Mixed(1), 0)).unwrap(),
            vec![1.0, 20.0]
        );
        assert!(design.row(DesignIndex::new(DesignBlock::Mixed(2), 0)).is_err());
        assert!(design.row(DesignIndex::new(DesignBlock::A, 2)).is_err());
    }

    #[test]
    fn test_design_rejects_mismatched_matrices() {
        let a = matrix(&[[1.0, 2.0]]);
        let b = matrix(&[[1.0, 2.0], [3.0, 4.0]]);
        assert!(SobolDesign::new(a, b).is_err());
    }
}
