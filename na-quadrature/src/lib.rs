
extern crate ndarray as nd;

use nd::{Array, ArrayBase, ArrayView, ArrayViewMut, Data, Ix1, Ix2};

pub use dopri5::{DenseStep, State, Tolerance};
pub use error::IntegrationError;

pub mod dopri5;
pub mod error;

/// Work done by one call to [`dense_trajectory_into`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrationStats {
  pub steps: u64,
  pub rejected: u64,
  pub calls: u64,
}

/// Integrates `f` from `y0` at `grid[0]` to the end of `grid` and writes the
/// solution at every grid point into the columns of `out`.
///
/// The internal steps are chosen by the error controller; the grid points are
/// filled from each step's dense output, so the grid spacing has no effect on
/// accuracy. Column 0 is a copy of `y0`.
pub fn dense_trajectory_into<F, S1, S2>(mut f: F,
                                        y0: &ArrayBase<S1, Ix1>,
                                        grid: &ArrayBase<S2, Ix1>,
                                        tolerance: Tolerance,
                                        mut out: ArrayViewMut<f64, Ix2>)
                                        -> Result<IntegrationStats, IntegrationError>
  where F: FnMut(f64, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>),
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
{
  let n = grid.len();
  if n == 0 {
    return Err(IntegrationError::EmptyGrid);
  }
  if out.dim() != (y0.len(), n) {
    return Err(IntegrationError::DimensionMismatch {
      expected: (y0.len(), n),
      found: out.dim(),
    });
  }
  for i in 1..n {
    if !(grid[i] > grid[i - 1]) {
      return Err(IntegrationError::GridNotIncreasing { index: i });
    }
  }
  if y0.iter().any(|v| !v.is_finite()) {
    return Err(IntegrationError::NonFinite { x: grid[0] });
  }

  out.column_mut(0).assign(y0);
  if n == 1 {
    return Ok(Default::default());
  }

  let end = grid[n - 1];
  let mut state = dopri5::new(grid[0], y0.to_owned(), tolerance);
  let mut idx = 1;
  while idx < n {
    let step = state.step(&mut f, end)?;
    let x_new = step.x_new();
    while idx < n && grid[idx] <= x_new {
      if grid[idx] == state.x() {
        out.column_mut(idx).assign(&state.y());
      } else {
        step.y_value(grid[idx], out.column_mut(idx));
      }
      idx += 1;
    }
  }

  Ok(IntegrationStats {
    steps: state.total_steps(),
    rejected: state.rejected_steps(),
    calls: state.total_model_calls(),
  })
}

/// Allocating form of [`dense_trajectory_into`]; the result is
/// `(y0.len(), grid.len())`.
pub fn dense_trajectory<F, S1, S2>(f: F,
                                   y0: &ArrayBase<S1, Ix1>,
                                   grid: &ArrayBase<S2, Ix1>,
                                   tolerance: Tolerance)
                                   -> Result<Array<f64, Ix2>, IntegrationError>
  where F: FnMut(f64, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>),
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
{
  let mut dest = Array::zeros((y0.len(), grid.len()));
  dense_trajectory_into(f, y0, grid, tolerance, dest.view_mut())?;
  Ok(dest)
}
