//! Twin experiments: a truth integrated by the model itself, and noisy
//! observations of it.

use nd::{Array, ArrayView, Ix1, Ix2};
use rand::Rng;

use na_df::Model;
use na_df::kalman::enkf::Window;
use na_df::utils::{check_shape, colored_randn};
use nla::Cholesky;

use crate::error::DataError;

#[derive(Debug, Clone)]
pub struct Data {
  /// The time of every trajectory slot, `n_steps + 1`.
  pub x: Array<f64, Ix1>,
  /// `(n, n_steps + 1)`
  pub truth: Array<f64, Ix2>,
  /// `(m, n_obs + 1)`, one column per observation time.
  pub observations: Array<f64, Ix2>,
}

/// Integrates `truth0` over the window's fine grid and observes the truth at
/// each observation time: `y_i = H x(t_i) + L z_i`, `L` the lower Cholesky
/// factor of `obs_cov`. Draws one `(m, n_obs + 1)` block from `rand`.
pub fn generate_model_truth_and_observation<M, R>(model: &M,
                                                  truth0: ArrayView<f64, Ix1>,
                                                  window: &Window,
                                                  obs_op: ArrayView<f64, Ix2>,
                                                  obs_cov: ArrayView<f64, Ix2>,
                                                  rand: &mut R)
                                                  -> Result<Data, DataError>
  where M: Model,
        R: Rng + ?Sized,
{
  window.validate()?;
  let n = truth0.len();
  let m = obs_op.nrows();
  check_shape("model state", &[model.state_dim()], &[n])?;
  check_shape("observation operator", obs_op.shape(), &[m, n])?;
  check_shape("observation covariance", obs_cov.shape(), &[m, m])?;
  let sqrt_cov = obs_cov.lower_sqrt()?;

  let x = window.fine_grid();
  let mut truth = Array::zeros((n, x.len()));
  model.propagate(truth0, x.view(), truth.view_mut())
    .map_err(|e| DataError::Model(Box::new(e)))?;

  let steps = window.observation_steps();
  let mut observations = colored_randn(&sqrt_cov, steps, rand);
  for i in 0..steps {
    let at = window.segment(i).end - 1;
    let mut y = observations.column_mut(i);
    y += &obs_op.dot(&truth.column(at));
  }

  Ok(Data { x, truth, observations })
}
