//! Common stuffs for ensembles

use std::ops::Range;

use nd::{ArrayView, ArrayViewMut, Axis, Ix1, Ix2, Ix3};
use rayon::prelude::*;

use crate::{Model, ModelStats};

/// A forecast failure, tagged with the member that caused it.
#[derive(Debug)]
pub struct MemberFailure<E> {
  pub member: usize,
  pub source: E,
}

#[derive(Debug)]
pub struct EnsemblePredictModelStuff<'a> {
  /// Member states at the start of the segment, `(n, Ne)`.
  pub ensembles: ArrayView<'a, f64, Ix2>,
  /// Trajectory slots for the segment, `(n, len, Ne)`.
  pub trajectories: ArrayViewMut<'a, f64, Ix3>,
  /// Member states at the end of the segment, `(n, Ne)`.
  pub ensemble_predict: ArrayViewMut<'a, f64, Ix2>,
  /// Member average of `trajectories`, `(n, len)`.
  pub estimator: Option<ArrayViewMut<'a, f64, Ix2>>,
}

pub trait EnsemblePredict {
  fn ensemble_predict_stuff(&mut self, steps: Range<usize>)
    -> EnsemblePredictModelStuff;

  /// Propagates every member over `time_grid` in parallel. Members only
  /// write their own trajectory slice, so the outcome does not depend on
  /// scheduling.
  fn ensemble_predict<M>(&mut self,
                         steps: Range<usize>,
                         time_grid: ArrayView<f64, Ix1>,
                         model: &mut ModelStats<M>)
                         -> Result<(), MemberFailure<M::Error>>
    where M: Model,
  {
    let EnsemblePredictModelStuff {
      ensembles, mut trajectories,
      mut ensemble_predict, estimator,
    } = self.ensemble_predict_stuff(steps);

    let n_e = ensembles.ncols();
    assert_eq!(trajectories.len_of(Axis(2)), n_e);
    assert_eq!(trajectories.len_of(Axis(1)), time_grid.len());
    assert_eq!(ensemble_predict.dim(), ensembles.dim());

    {
      let m = &model.model;
      trajectories.axis_iter_mut(Axis(2))
        .into_par_iter()
        .zip(ensembles.axis_iter(Axis(1)).into_par_iter())
        .enumerate()
        .try_for_each(|(member, (out, state))| {
          m.propagate(state, time_grid, out)
            .map_err(|source| MemberFailure { member, source })
        })?;
    }
    model.calls += n_e as u64;

    let last = time_grid.len() - 1;
    ensemble_predict.assign(&trajectories.index_axis(Axis(1), last));

    if let Some(mut estimator) = estimator {
      estimator.assign(&trajectories.sum_axis(Axis(2)));
      estimator.mapv_inplace(|v| v / n_e as f64);
    }

    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use nd::{arr1, arr2, s, Array, Array2, Array3};

  /// Moves every state by `t - t0` in each component.
  struct Drift;
  impl Model for Drift {
    type Error = ::std::fmt::Error;
    fn state_dim(&self) -> usize { 2 }
    fn propagate(&self,
                 state: ArrayView<f64, Ix1>,
                 time_grid: ArrayView<f64, Ix1>,
                 mut out: ArrayViewMut<f64, Ix2>)
                 -> Result<(), Self::Error>
    {
      for (j, &t) in time_grid.iter().enumerate() {
        let mut col = out.column_mut(j);
        col.assign(&state);
        col += t - time_grid[0];
      }
      Ok(())
    }
  }

  /// Fails on any member whose first component is negative.
  struct RejectNegative;
  impl Model for RejectNegative {
    type Error = ::std::fmt::Error;
    fn state_dim(&self) -> usize { 2 }
    fn propagate(&self,
                 state: ArrayView<f64, Ix1>,
                 _: ArrayView<f64, Ix1>,
                 mut out: ArrayViewMut<f64, Ix2>)
                 -> Result<(), Self::Error>
    {
      if state[0] < 0.0 {
        return Err(::std::fmt::Error);
      }
      out.fill(state[0]);
      Ok(())
    }
  }

  struct Ws {
    ensembles: Array2<f64>,
    trajectories: Array3<f64>,
    predict: Array2<f64>,
    mean: Array2<f64>,
  }
  impl EnsemblePredict for Ws {
    fn ensemble_predict_stuff(&mut self, steps: Range<usize>)
      -> EnsemblePredictModelStuff
    {
      EnsemblePredictModelStuff {
        ensembles: self.ensembles.view(),
        trajectories: self.trajectories.slice_mut(s![.., steps.clone(), ..]),
        ensemble_predict: self.predict.view_mut(),
        estimator: Some(self.mean.slice_mut(s![.., steps])),
      }
    }
  }

  fn ws(ensembles: Array2<f64>) -> Ws {
    let (n, n_e) = ensembles.dim();
    Ws {
      ensembles,
      trajectories: Array::zeros((n, 5, n_e)),
      predict: Array::zeros((n, n_e)),
      mean: Array::zeros((n, 5)),
    }
  }

  #[test]
  fn predicts_every_member() {
    let mut ws = ws(arr2(&[[0.0, 1.0, 2.0], [10.0, 20.0, 30.0]]));
    let mut model = ModelStats::from(Drift);
    let grid = arr1(&[1.0, 1.5, 2.0]);
    ws.ensemble_predict(2..5, grid.view(), &mut model).unwrap();

    assert_eq!(model.calls, 3);
    assert_eq!(ws.predict, arr2(&[[1.0, 2.0, 3.0], [11.0, 21.0, 31.0]]));
    assert_eq!(ws.trajectories.slice(s![.., 2, ..]), ws.ensembles);
    assert_eq!(ws.trajectories.slice(s![.., 0..2, ..]),
               Array3::<f64>::zeros((2, 2, 3)));
    assert_eq!(ws.mean.slice(s![.., 2..]),
               arr2(&[[1.0, 1.5, 2.0], [20.0, 20.5, 21.0]]));
  }

  #[test]
  fn reports_failing_member() {
    let mut ws = ws(arr2(&[[0.0, 1.0, -2.0, 3.0], [0.0, 0.0, 0.0, 0.0]]));
    let mut model = ModelStats::from(RejectNegative);
    let grid = arr1(&[0.0, 1.0]);
    let err = ws.ensemble_predict(0..2, grid.view(), &mut model).unwrap_err();
    assert_eq!(err.member, 2);
    assert_eq!(model.calls, 0);
  }
}
