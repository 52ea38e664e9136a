//! Dense two-dimensional storage shared by the diffusion stepper and the
//! sample matrices.
//!
//! Values are stored in row-major order with a flat backing vector: the
//! outer index (time step, sample) selects a row and the inner index
//! (spatial cell, parameter) varies fastest.

use serde::{Deserialize, Serialize};

/// Row-major grid with a fixed `(rows, cols)` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Clone> Grid<T> {
    /// Create a grid of the given shape filled with `fill`.
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            data: vec![fill; rows * cols],
            rows,
            cols,
        }
    }
}

impl<T> Grid<T> {
    /// Wrap existing row-major data. Returns `None` if the length does not
    /// match the shape.
    pub fn from_data(rows: usize, cols: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != rows * cols {
            return None;
        }
        Some(Self { data, rows, cols })
    }

    /// Build a grid from a sequence of equally sized rows.
    pub fn from_rows<I, R>(cols: usize, rows: I) -> Option<Self>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = T>,
    {
        let mut data = Vec::new();
        let mut count = 0;
        for row in rows {
            let before = data.len();
            data.extend(row);
            if data.len() - before != cols {
                return None;
            }
            count += 1;
        }
        Some(Self {
            data,
            rows: count,
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn flat_index(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.rows && col < self.cols {
            Some(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.flat_index(row, col).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        self.flat_index(row, col).map(|i| &mut self.data[i])
    }

    /// Borrow one row as a slice.
    pub fn row(&self, row: usize) -> Option<&[T]> {
        if row < self.rows {
            let start = row * self.cols;
            Some(&self.data[start..start + self.cols])
        } else {
            None
        }
    }

    /// Mutably borrow one row as a slice.
    pub fn row_mut(&mut self, row: usize) -> Option<&mut [T]> {
        if row < self.rows {
            let start = row * self.cols;
            Some(&mut self.data[start..start + self.cols])
        } else {
            None
        }
    }

    /// Borrow row `row` immutably and row `row + 1` mutably.
    ///
    /// Used by sweeps where each row is derived from the previous one.
    pub fn row_pair_mut(&mut self, row: usize) -> Option<(&[T], &mut [T])> {
        if row + 1 >= self.rows {
            return None;
        }
        let split = (row + 1) * self.cols;
        let (head, tail) = self.data.split_at_mut(split);
        Some((&head[split - self.cols..], &mut tail[..self.cols]))
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
        (0..self.rows).filter_map(move |r| self.row(r))
    }

    /// Iterate down one column.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &T> {
        let cols = self.cols;
        let rows = if col < cols { self.rows } else { 0 };
        (0..rows).map(move |r| &self.data[r * cols + col])
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl Grid<f64> {
    /// Sum of one row, e.g. total mass at a time step.
    pub fn row_sum(&self, row: usize) -> Option<f64> {
        self.row(row).map(|r| r.iter().sum())
    }

    /// Smallest and largest value in the grid, ignoring NaN.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
