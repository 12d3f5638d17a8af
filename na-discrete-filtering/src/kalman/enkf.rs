//! Stochastic ensemble Kalman filter with perturbed observations
//! (Burgers, van Leeuwen and Evensen, 1998).
//!
//! Each observation step is a forecast, in which every member is propagated
//! through the model up to the observation time, followed by an analysis:
//!
//! ```text
//! Pf = A Aᵀ / (Ne − 1)          A = Xf − mean(Xf) 1ᵀ
//! (H Pf Hᵀ + R) W = D − H Xf    D = y 1ᵀ + sqrt(R) Z
//! Xa = Xf + Pf Hᵀ W
//! ```

use std::ops::Range;

use nd::{s, Array, ArrayView, ArrayViewMut, Axis, Ix1, Ix2, Ix3};
use nd::linalg::general_mat_mul;
use nla::{Cholesky, LuFactorize};
use rand::Rng;
use tracing::{debug, info};

use crate::{Algorithm, Model, ModelStats, Observer, Workspace};
use crate::ensemble::{EnsemblePredict, EnsemblePredictModelStuff};
use crate::error::{Error, Result};
use crate::perturb::PerturbObservations;
use crate::utils::{check_shape, ensemble_mean, make_2d_randn,
                   sample_covariance_into};

pub use super::EnsembleInit;

/// The assimilation window: observation times and the number of trajectory
/// samples between consecutive observations.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
  pub start_time: f64,
  /// Strictly increasing, all after `start_time`.
  pub observation_times: ArrayView<'a, f64, Ix1>,
  pub steps_per_gap: usize,
}

impl<'a> Window<'a> {
  pub fn observation_steps(&self) -> usize { self.observation_times.len() }

  /// Number of trajectory intervals; trajectories hold one more sample.
  pub fn n_steps(&self) -> usize {
    self.observation_steps() * self.steps_per_gap
  }

  pub fn validate(&self) -> Result<()> {
    if self.steps_per_gap == 0 {
      return Err(Error::InvalidWindow { reason: "steps per gap must be at least 1" });
    }
    if self.observation_times.is_empty() {
      return Err(Error::InvalidWindow { reason: "no observation times" });
    }
    if !self.start_time.is_finite() {
      return Err(Error::InvalidWindow { reason: "start time is not finite" });
    }

    let mut prev = self.start_time;
    for (index, &t) in self.observation_times.iter().enumerate() {
      if !(t > prev) || !t.is_finite() {
        return Err(Error::ObservationTimesNotIncreasing { index });
      }
      prev = t;
    }
    Ok(())
  }

  /// Trajectory slots covered by the forecast to observation `obs_index`.
  /// Consecutive segments share their boundary slot.
  pub fn segment(&self, obs_index: usize) -> Range<usize> {
    let start = obs_index * self.steps_per_gap;
    start..start + self.steps_per_gap + 1
  }

  /// Evenly spaced times from the previous observation (or the start) to
  /// observation `obs_index`, `steps_per_gap + 1` of them.
  pub fn segment_grid(&self, obs_index: usize) -> Array<f64, Ix1> {
    let from = if obs_index == 0 {
      self.start_time
    } else {
      self.observation_times[obs_index - 1]
    };
    let to = self.observation_times[obs_index];
    Array::linspace(from, to, self.steps_per_gap + 1)
  }

  /// The time of every trajectory slot, `n_steps + 1` of them.
  pub fn fine_grid(&self) -> Array<f64, Ix1> {
    let mut grid = Array::zeros(self.n_steps() + 1);
    grid[0] = self.start_time;
    for i in 0..self.observation_steps() {
      grid.slice_mut(s![self.segment(i)])
        .assign(&self.segment_grid(i));
    }
    grid
  }
}

/// Uniformly spaced observation times `t_i = (i + 1) · steps_per_gap · step_size`
/// for `i = 0 ..= n_obs`.
pub fn observation_times(n_obs: usize, steps_per_gap: usize, step_size: f64)
  -> Array<f64, Ix1>
{
  (0..n_obs + 1)
    .map(|i| ((i + 1) * steps_per_gap) as f64 * step_size)
    .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Init<'a> {
  pub ensemble: EnsembleInit<'a>,
  pub window: Window<'a>,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct Trajectories {
  /// `(n, n_steps + 1)`. Samples inside a segment are the member average of
  /// the forecast; a sample at an observation time is taken from the start
  /// of the following segment, which is the post-update mean. The final
  /// sample is the last forecast average.
  pub mean: Array<f64, Ix2>,
  /// `(n, n_steps + 1, Ne)`, per-member trajectories.
  pub ensembles: Array<f64, Ix3>,
  /// `(n, n_obs + 1)`, the ensemble mean right after each update.
  pub analysis_means: Array<f64, Ix2>,
  /// `(n_obs + 1, n, n)`, `Pf` at each update.
  pub forecast_covariances: Array<f64, Ix3>,
  /// `(n, Ne)`, the ensemble after the last update.
  pub final_ensemble: Array<f64, Ix2>,
}

#[derive(Debug)]
pub struct OwnedWorkspace {
  /// X
  ensembles: Array<f64, Ix2>,
  /// Xf
  ensemble_predict: Array<f64, Ix2>,
  /// mean(Xf)
  estimator_predict: Array<f64, Ix1>,
  /// A
  centered_ensemble: Array<f64, Ix2>,
  /// Pf
  covariance_predict: Array<f64, Ix2>,
  /// D, then D − H Xf
  perturbed_observations: Array<f64, Ix2>,

  mean_trajectory: Array<f64, Ix2>,
  ensemble_trajectories: Array<f64, Ix3>,
  analysis_means: Array<f64, Ix2>,
  forecast_covariances: Array<f64, Ix3>,

  current_time: f64,
  next_step: usize,
}

impl<'a> Workspace<Init<'a>> for OwnedWorkspace {
  /// Draws the initial ensemble `x0 1ᵀ + L0 Z`, `L0` being the lower
  /// Cholesky factor of `P0`.
  fn alloc<R>(i: Init<'a>, rand: &mut R) -> Result<OwnedWorkspace>
    where R: Rng + ?Sized,
  {
    let Init { ensemble, window } = i;
    ensemble.validate()?;
    window.validate()?;

    let n = ensemble.state_dim();
    let m = ensemble.observation_dim();
    let n_e = ensemble.ensemble_count;
    let steps = window.observation_steps();
    let n_steps = window.n_steps();

    let l0 = ensemble.initial_covariance
      .lower_sqrt()
      .map_err(|source| Error::NotPositiveDefinite {
        what: "initial covariance",
        source,
      })?;
    let mut ensembles = l0.dot(&make_2d_randn((n, n_e), rand));
    ensembles += &ensemble.initial_mean.insert_axis(Axis(1));

    let mut mean_trajectory = Array::zeros((n, n_steps + 1));
    mean_trajectory.column_mut(0).assign(&ensemble_mean(&ensembles));
    let mut ensemble_trajectories = Array::zeros((n, n_steps + 1, n_e));
    ensemble_trajectories.index_axis_mut(Axis(1), 0).assign(&ensembles);

    Ok(OwnedWorkspace {
      ensemble_predict: Array::zeros((n, n_e)),
      estimator_predict: Array::zeros(n),
      centered_ensemble: Array::zeros((n, n_e)),
      covariance_predict: Array::zeros((n, n)),
      perturbed_observations: Array::zeros((m, n_e)),
      ensembles,

      mean_trajectory,
      ensemble_trajectories,
      analysis_means: Array::zeros((n, steps)),
      forecast_covariances: Array::zeros((steps, n, n)),

      current_time: window.start_time,
      next_step: 0,
    })
  }
}

impl OwnedWorkspace {
  pub fn ensembles_view(&self) -> ArrayView<f64, Ix2> { self.ensembles.view() }
  pub fn mean_trajectory_view(&self) -> ArrayView<f64, Ix2> {
    self.mean_trajectory.view()
  }
  pub fn analysis_means_view(&self) -> ArrayView<f64, Ix2> {
    self.analysis_means.view()
  }
  /// Time of the last assimilated observation, or the window start.
  pub fn current_time(&self) -> f64 { self.current_time }
  pub fn completed_steps(&self) -> usize { self.next_step }

  pub fn into_trajectories(self) -> Trajectories {
    Trajectories {
      mean: self.mean_trajectory,
      ensembles: self.ensemble_trajectories,
      analysis_means: self.analysis_means,
      forecast_covariances: self.forecast_covariances,
      final_ensemble: self.ensembles,
    }
  }
}

impl EnsemblePredict for OwnedWorkspace {
  fn ensemble_predict_stuff(&mut self, steps: Range<usize>)
    -> EnsemblePredictModelStuff
  {
    EnsemblePredictModelStuff {
      ensembles: self.ensembles.view(),
      trajectories: self.ensemble_trajectories.slice_mut(s![.., steps.clone(), ..]),
      ensemble_predict: self.ensemble_predict.view_mut(),
      estimator: Some(self.mean_trajectory.slice_mut(s![.., steps])),
    }
  }
}
impl PerturbObservations for OwnedWorkspace {
  fn perturbed_observations_view_mut(&mut self) -> ArrayViewMut<f64, Ix2> {
    self.perturbed_observations.view_mut()
  }
}

#[derive(Debug)]
pub struct Algo<'a> {
  ensemble_count: usize,
  observation_operator: ArrayView<'a, f64, Ix2>,
  observation_covariance: ArrayView<'a, f64, Ix2>,
  /// Lower Cholesky factor of R.
  observation_covariance_sqrt: Array<f64, Ix2>,
  window: Window<'a>,
}

impl<'a, M, Ob> Algorithm<M, Ob> for Algo<'a>
  where M: Model,
        Ob: Observer,
{
  type Init = Init<'a>;
  type WS = OwnedWorkspace;

  fn init(i: &Init<'a>, model: &ModelStats<M>, observer: &Ob) -> Result<Self> {
    let Init { ensemble, window } = *i;
    ensemble.validate()?;
    window.validate()?;

    let n = ensemble.state_dim();
    let m = ensemble.observation_dim();
    check_shape("model state", &[model.model.state_dim()], &[n])?;
    check_shape("observations", &[observer.observation_dim()], &[m])?;
    if let Some(count) = observer.observation_count() {
      let steps = window.observation_steps();
      if count < steps {
        return Err(Error::DimensionMismatch {
          what: "observations",
          expected: vec![m, steps],
          found: vec![m, count],
        });
      }
    }

    ensemble.initial_covariance
      .l_lstar()
      .map_err(|source| Error::NotPositiveDefinite {
        what: "initial covariance",
        source,
      })?;
    let observation_covariance_sqrt = ensemble.observation_covariance
      .lower_sqrt()
      .map_err(|source| Error::NotPositiveDefinite {
        what: "observation covariance",
        source,
      })?;

    Ok(Algo {
      ensemble_count: ensemble.ensemble_count,
      observation_operator: ensemble.observation_operator,
      observation_covariance: ensemble.observation_covariance,
      observation_covariance_sqrt,
      window,
    })
  }

  /// One forecast and analysis cycle, ending at observation `current_step`.
  /// Steps must be taken once each, in order.
  fn next_step<R>(&self,
                  current_step: usize,
                  rand: &mut R,
                  workspace: &mut OwnedWorkspace,
                  model: &mut ModelStats<M>,
                  observer: &Ob)
                  -> Result<()>
    where R: Rng + ?Sized,
  {
    let obs_index = current_step;
    if obs_index >= self.window.observation_steps() ||
      obs_index != workspace.next_step {
      return Err(Error::InvalidWindow {
        reason: "observation steps must be taken once each, in order",
      });
    }
    let t_obs = self.window.observation_times[obs_index];

    // forecast

    let grid = self.window.segment_grid(obs_index);
    workspace.ensemble_predict(self.window.segment(obs_index), grid.view(), model)
      .map_err(|f| Error::IntegrationFailure {
        obs_index,
        member: f.member,
        source: Box::new(f.source),
      })?;

    // analyze

    let mut observation = Array::zeros(self.observation_operator.nrows());
    if !observer.observe_into(obs_index, observation.view_mut()) {
      return Err(Error::MissingObservation { obs_index });
    }
    workspace.perturb_observations(observation.view(),
                                   self.observation_covariance_sqrt.view(),
                                   rand);

    let ws = workspace;
    ws.estimator_predict.assign(&ensemble_mean(&ws.ensemble_predict));
    sample_covariance_into(ws.ensemble_predict.view(),
                           ws.estimator_predict.view(),
                           ws.centered_ensemble.view_mut(),
                           &mut ws.covariance_predict.view_mut());

    let h = &self.observation_operator;
    let pf_ht = ws.covariance_predict.dot(&h.t());
    let mut innovation_cov = self.observation_covariance.to_owned();
    general_mat_mul(1.0, h, &pf_ht, 1.0, &mut innovation_cov);
    general_mat_mul(-1.0, h, &ws.ensemble_predict, 1.0,
                    &mut ws.perturbed_observations);

    let w = innovation_cov.lu()
      .and_then(|lu| lu.solve_multi(&ws.perturbed_observations))
      .map_err(|source| Error::SingularMatrix { obs_index, source })?;

    ws.ensembles.assign(&ws.ensemble_predict);
    general_mat_mul(1.0, &pf_ht, &w, 1.0, &mut ws.ensembles);

    ws.analysis_means.column_mut(obs_index)
      .assign(&ensemble_mean(&ws.ensembles));
    ws.forecast_covariances.index_axis_mut(Axis(0), obs_index)
      .assign(&ws.covariance_predict);
    ws.current_time = t_obs;
    ws.next_step += 1;

    debug!(obs_index,
           time = t_obs,
           members = self.ensemble_count,
           forecast_spread = ws.covariance_predict.diag().sum(),
           "assimilated observation");
    Ok(())
  }
}

/// Runs the filter over the whole window.
pub fn run<M, Ob, R>(init: Init,
                     model: &mut ModelStats<M>,
                     observer: &Ob,
                     rand: &mut R)
                     -> Result<Trajectories>
  where M: Model,
        Ob: Observer,
        R: Rng + ?Sized,
{
  let algo = <Algo as Algorithm<M, Ob>>::init(&init, model, observer)?;
  let steps = init.window.observation_steps();
  info!(members = init.ensemble.ensemble_count,
        observation_steps = steps,
        n_steps = init.window.n_steps(),
        "starting ensemble Kalman filter");

  let mut ws = OwnedWorkspace::alloc(init, rand)?;
  for i in 0..steps {
    algo.next_step(i, rand, &mut ws, model, observer)?;
  }

  info!(model_calls = model.calls, "ensemble Kalman filter finished");
  Ok(ws.into_trajectories())
}
