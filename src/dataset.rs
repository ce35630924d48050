//! Per-point adaptation data extracted from the error-estimation driver.

use std::fmt;

use ndarray::{Array2, ArrayView1, Axis};

use crate::driver::ErrorEstimator;
use crate::errors::DriverError;

/// Dense `points x variables` table, row-major, one row per local point.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationDataset {
    values: Array2<f64>,
}

impl AdaptationDataset {
    /// Fill a `points x variables` table from the estimator. Each cell is
    /// fetched exactly once, row by row.
    pub fn assemble<E: ErrorEstimator + ?Sized>(
        estimator: &E,
        points: usize,
        variables: usize,
    ) -> Result<Self, DriverError> {
        let mut values = Array2::<f64>::zeros((points, variables));
        let mut scratch = vec![0.0; variables];
        for (point, mut row) in values.axis_iter_mut(Axis(0)).enumerate() {
            estimator.adaptation_row(point, &mut scratch)?;
            row.assign(&ArrayView1::from(&scratch[..]));
        }
        Ok(Self { values })
    }

    /// `(points, variables)`.
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn points(&self) -> usize {
        self.values.nrows()
    }

    pub fn variables(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, point: usize, var: usize) -> Option<f64> {
        self.values.get((point, var)).copied()
    }

    pub fn row(&self, point: usize) -> Option<ArrayView1<'_, f64>> {
        (point < self.points()).then(|| self.values.row(point))
    }

    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> {
        self.values.outer_iter()
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.values
    }
}

/// Renders a single row as `[v0 v1 ...]`.
pub struct RowDisplay<'a>(pub ArrayView1<'a, f64>);

impl fmt::Display for RowDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

/// One line per point.
impl fmt::Display for AdaptationDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            writeln!(f, "{}", RowDisplay(row))?;
        }
        Ok(())
    }
}
