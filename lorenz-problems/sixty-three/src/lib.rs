//! The Lorenz '63 system and a twin-experiment scenario for the ensemble
//! Kalman filter.

extern crate na_discrete_filtering as na_df;
extern crate na_quadrature as na_q;
extern crate ndarray as nd;

use nd::{arr1, Array, ArrayView, ArrayViewMut, Ix1, Ix2};
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use tracing::trace;

use na_df::{Model, ModelStats};
use na_df::kalman::EnsembleInit;
use na_df::kalman::enkf::{self, observation_times, Window};
use na_q::{IntegrationError, Tolerance};
use util::data::{generate_model_truth_and_observation, Data};
use util::DataError;

#[derive(Debug, Clone, Copy)]
pub struct L63Model {
  pub sigma: f64,
  pub rho: f64,
  pub beta: f64,
  pub tolerance: Tolerance,
}

impl L63Model {
  pub fn new(sigma: f64, rho: f64, beta: f64) -> L63Model {
    L63Model {
      sigma,
      rho,
      beta,
      tolerance: Tolerance::default(),
    }
  }

  #[inline]
  pub fn rhs(&self, y: ArrayView<f64, Ix1>, mut yp: ArrayViewMut<f64, Ix1>) {
    debug_assert!(y.len() == 3);
    debug_assert!(yp.len() == 3);

    yp[0] = self.sigma * (y[1] - y[0]);
    yp[1] = y[0] * (self.rho - y[2]) - y[1];
    yp[2] = y[0] * y[1] - self.beta * y[2];
  }

  /// The solution through every point of `time_grid`, `(3, len)`.
  pub fn trajectory(&self,
                    state: ArrayView<f64, Ix1>,
                    time_grid: ArrayView<f64, Ix1>)
                    -> Result<Array<f64, Ix2>, IntegrationError>
  {
    let mut out = Array::zeros((3, time_grid.len()));
    Model::propagate(self, state, time_grid, out.view_mut())?;
    Ok(out)
  }
}

impl Default for L63Model {
  fn default() -> Self {
    L63Model::new(10.0, 28.0, 8.0 / 3.0)
  }
}

impl Model for L63Model {
  type Error = IntegrationError;

  fn state_dim(&self) -> usize { 3 }

  fn propagate(&self,
               state: ArrayView<f64, Ix1>,
               time_grid: ArrayView<f64, Ix1>,
               out: ArrayViewMut<f64, Ix2>)
               -> Result<(), IntegrationError>
  {
    let stats = na_q::dense_trajectory_into(|_, y, yp| self.rhs(y, yp),
                                            &state, &time_grid,
                                            self.tolerance, out)?;
    trace!(steps = stats.steps,
           rejected = stats.rejected,
           rhs_calls = stats.calls,
           "integrated lorenz 63");
    Ok(())
  }
}

/// Scenario parameters. The truth starts at `initial_mean + truth_offset`;
/// the filter only knows `initial_mean` and `initial_variance`.
#[derive(Copy, Clone, Debug)]
pub struct L63Setup {
  pub sigma: f64,
  pub rho: f64,
  pub beta: f64,
  pub initial_mean: [f64; 3],
  pub truth_offset: [f64; 3],
  /// P0 = initial_variance · I
  pub initial_variance: f64,
  /// R = observation_variance · I, with H = I.
  pub observation_variance: f64,
  pub ensemble_count: usize,
  /// There are `n_obs + 1` observations.
  pub n_obs: usize,
  pub steps_per_gap: usize,
  pub step_size: f64,
  pub rand_seed: u64,
}
impl Default for L63Setup {
  fn default() -> Self {
    L63Setup {
      sigma: 10.0,
      rho: 28.0,
      beta: 8.0 / 3.0,
      initial_mean: [1.0, 1.0, 1.0],
      truth_offset: [0.5, -0.5, 0.5],
      initial_variance: 0.1,
      observation_variance: 0.01,
      ensemble_count: 50,
      n_obs: 9,
      steps_per_gap: 25,
      step_size: 0.01,
      rand_seed: 1,
    }
  }
}

impl L63Setup {
  pub fn model(&self) -> L63Model {
    L63Model::new(self.sigma, self.rho, self.beta)
  }

  /// Integrates the truth and draws the observations. The returned
  /// generator continues the same seeded stream.
  pub fn generate(self) -> Result<L63Data, DataError> {
    let mut rand = Isaac64Rng::seed_from_u64(self.rand_seed);

    let observation_times = observation_times(self.n_obs,
                                              self.steps_per_gap,
                                              self.step_size);
    let initial_mean = arr1(&self.initial_mean);
    let truth0 = &initial_mean + &arr1(&self.truth_offset);
    let observation_operator = Array::eye(3);
    let observation_covariance = Array::eye(3) * self.observation_variance;

    let window = Window {
      start_time: 0.0,
      observation_times: observation_times.view(),
      steps_per_gap: self.steps_per_gap,
    };
    let data = generate_model_truth_and_observation(&self.model(),
                                                    truth0.view(),
                                                    &window,
                                                    observation_operator.view(),
                                                    observation_covariance.view(),
                                                    &mut rand)?;

    Ok(L63Data {
      rand,
      params: self,
      data,
      initial_covariance: Array::eye(3) * self.initial_variance,
      initial_mean,
      observation_times,
      observation_operator,
      observation_covariance,
    })
  }
}

#[derive(Clone, Debug)]
pub struct L63Data {
  pub rand: Isaac64Rng,
  pub params: L63Setup,
  pub data: Data,
  pub observation_times: Array<f64, Ix1>,

  pub initial_mean: Array<f64, Ix1>,
  pub initial_covariance: Array<f64, Ix2>,
  pub observation_operator: Array<f64, Ix2>,
  pub observation_covariance: Array<f64, Ix2>,
}

impl L63Data {
  pub fn window(&self) -> Window {
    Window {
      start_time: 0.0,
      observation_times: self.observation_times.view(),
      steps_per_gap: self.params.steps_per_gap,
    }
  }

  pub fn init(&self) -> enkf::Init {
    enkf::Init {
      ensemble: EnsembleInit {
        initial_mean: self.initial_mean.view(),
        initial_covariance: self.initial_covariance.view(),
        observation_operator: self.observation_operator.view(),
        observation_covariance: self.observation_covariance.view(),
        ensemble_count: self.params.ensemble_count,
      },
      window: self.window(),
    }
  }

  pub fn model(&self) -> ModelStats<L63Model> {
    ModelStats::from(self.params.model())
  }

  /// The model run from `initial_mean` with no assimilation, sampled like
  /// the truth.
  pub fn free_run(&self) -> Result<Array<f64, Ix2>, IntegrationError> {
    self.params.model()
      .trajectory(self.initial_mean.view(), self.data.x.view())
  }
}
